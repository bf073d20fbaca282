//! # Frontier Sampler
//!
//! $$
//! \mathbf w^{(k)} = \frac{\mathbf u^{(k)}}{\mathbf 1^\top\mathbf u^{(k)}},\quad
//! u^{(k)}_i \sim \mathcal U(0,1),\qquad
//! k^\* = \arg\max_k S(\mathbf w^{(k)})
//! $$
//!
//! Monte Carlo cloud of feasible portfolios in (volatility, return) space
//! and its best-Sharpe member. The cloud approximates the efficient frontier
//! for display; it is not expected to reproduce the optimizer's answer.

use ndarray::Array1;
use ndarray_stats::QuantileExt;
use rand::rngs::StdRng;
use rand::Rng;
use rand::SeedableRng;
use rayon::prelude::*;
use tracing::debug;

use super::analyzer::PerformanceAnalyzer;
use super::analyzer::TRADING_DAYS;
use super::data::AssetMoments;
use super::data::ReturnSeries;
use super::types::PerformanceResult;
use super::types::WeightVector;
use crate::error::PortfolioError;
use crate::error::Result;

/// Portfolios drawn when no sample count is configured.
pub const DEFAULT_FRONTIER_SAMPLES: usize = 10_000;

/// One random portfolio on the frontier plot.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrontierPoint {
  /// Annualized return.
  pub expected_return: f64,
  /// Annualized volatility.
  pub volatility: f64,
  /// Sharpe ratio at the sampler's risk-free rate.
  pub sharpe_ratio: f64,
}

impl From<PerformanceResult> for FrontierPoint {
  fn from(perf: PerformanceResult) -> Self {
    Self {
      expected_return: perf.annualized_return,
      volatility: perf.annualized_volatility,
      sharpe_ratio: perf.sharpe_ratio,
    }
  }
}

/// Sampled frontier in draw order.
#[derive(Clone, Debug, PartialEq)]
pub struct FrontierSample {
  /// One point per draw.
  pub points: Vec<FrontierPoint>,
  /// Index of the highest Sharpe ratio in `points`.
  pub best_index: usize,
  /// Weights drawn at `best_index`.
  pub best_weights: WeightVector,
}

impl FrontierSample {
  /// Point with the highest Sharpe ratio.
  pub fn best(&self) -> &FrontierPoint {
    &self.points[self.best_index]
  }

  /// Number of drawn portfolios.
  pub fn len(&self) -> usize {
    self.points.len()
  }

  /// True when nothing was drawn.
  pub fn is_empty(&self) -> bool {
    self.points.is_empty()
  }

  /// Annualized returns in draw order.
  pub fn returns(&self) -> Vec<f64> {
    self.points.iter().map(|p| p.expected_return).collect()
  }

  /// Annualized volatilities in draw order.
  pub fn volatilities(&self) -> Vec<f64> {
    self.points.iter().map(|p| p.volatility).collect()
  }

  /// Sharpe ratios in draw order.
  pub fn sharpe_ratios(&self) -> Vec<f64> {
    self.points.iter().map(|p| p.sharpe_ratio).collect()
  }
}

/// Monte Carlo sampler of long-only portfolios.
#[derive(Clone, Debug)]
pub struct FrontierSampler {
  risk_free_rate: f64,
  trading_days: f64,
  samples: usize,
  seed: Option<u64>,
}

impl FrontierSampler {
  /// Sampler with the default sample count and an unseeded RNG.
  pub fn new(risk_free_rate: f64) -> Self {
    Self {
      risk_free_rate,
      trading_days: TRADING_DAYS,
      samples: DEFAULT_FRONTIER_SAMPLES,
      seed: None,
    }
  }

  /// Number of portfolios to draw.
  pub fn with_samples(mut self, samples: usize) -> Self {
    self.samples = samples;
    self
  }

  /// Fix the RNG seed for a reproducible cloud.
  pub fn with_seed(mut self, seed: u64) -> Self {
    self.seed = Some(seed);
    self
  }

  /// Override the annualization factor.
  pub fn with_trading_days(mut self, trading_days: f64) -> Self {
    self.trading_days = trading_days;
    self
  }

  /// Sample the frontier of `returns`.
  pub fn sample(&self, returns: &ReturnSeries) -> Result<FrontierSample> {
    self.sample_moments(&returns.moments()?)
  }

  /// Draw and evaluate `samples` long-only portfolios.
  ///
  /// Weights are drawn sequentially from one RNG, then evaluated in parallel
  /// through the analyzer's immutable-weights path.
  pub fn sample_moments(&self, moments: &AssetMoments) -> Result<FrontierSample> {
    if self.samples == 0 {
      return Err(PortfolioError::InvalidParameter(
        "frontier sample count must be positive".to_string(),
      ));
    }
    let n = moments.num_assets();
    if n == 0 {
      return Err(PortfolioError::EmptyData("return series"));
    }

    let mut rng = match self.seed {
      Some(seed) => StdRng::seed_from_u64(seed),
      None => StdRng::from_os_rng(),
    };
    let mut draws: Vec<WeightVector> = (0..self.samples)
      .map(|_| random_weights(&mut rng, n))
      .collect();

    let analyzer =
      PerformanceAnalyzer::new(self.risk_free_rate).with_trading_days(self.trading_days);
    let points = draws
      .par_iter()
      .map(|w| analyzer.evaluate(moments, w).map(FrontierPoint::from))
      .collect::<Result<Vec<_>>>()?;

    let sharpe: Array1<f64> = points.iter().map(|p| p.sharpe_ratio).collect();
    let best_index = sharpe
      .argmax()
      .map_err(|_| PortfolioError::EmptyData("frontier sharpe ratios"))?;
    let best_weights = draws.swap_remove(best_index);

    debug!(
      samples = points.len(),
      best_index,
      best_sharpe = points[best_index].sharpe_ratio,
      "frontier sampled"
    );

    Ok(FrontierSample {
      points,
      best_index,
      best_weights,
    })
  }
}

/// Uniform draws normalized by their sum.
fn random_weights<R: Rng + ?Sized>(rng: &mut R, n: usize) -> WeightVector {
  loop {
    let raw: Vec<f64> = (0..n).map(|_| rng.random::<f64>()).collect();
    if raw.iter().sum::<f64>() > 0.0 {
      return WeightVector::from_nonnegative(raw);
    }
  }
}

#[cfg(test)]
mod tests {
  use approx::assert_relative_eq;
  use ndarray::array;
  use ndarray::Array2;
  use rand_distr::Distribution;
  use rand_distr::Normal;

  use super::*;
  use crate::portfolio::optimizers::PortfolioOptimizer;
  use crate::portfolio::types::Objective;

  fn three_assets(seed: u64) -> ReturnSeries {
    let mut rng = StdRng::seed_from_u64(seed);
    let dists = [
      Normal::new(0.0012, 0.015).unwrap(),
      Normal::new(0.0009, 0.010).unwrap(),
      Normal::new(0.0006, 0.007).unwrap(),
    ];
    let values = Array2::from_shape_fn((2000, 3), |(_, j)| dists[j].sample(&mut rng));
    ReturnSeries::new(vec!["AAA".into(), "BBB".into(), "CCC".into()], values).unwrap()
  }

  #[test]
  fn draws_are_feasible_weights() {
    let mut rng = StdRng::seed_from_u64(3);
    for _ in 0..100 {
      let w = random_weights(&mut rng, 5);
      assert!(w.is_long_only());
      assert_relative_eq!(w.iter().sum::<f64>(), 1.0, epsilon = 1e-12);
    }
  }

  #[test]
  fn best_index_points_at_the_max_sharpe() {
    let returns = three_assets(1);
    let frontier = FrontierSampler::new(0.02)
      .with_samples(500)
      .with_seed(7)
      .sample(&returns)
      .unwrap();

    assert_eq!(frontier.len(), 500);
    let max = frontier
      .sharpe_ratios()
      .into_iter()
      .fold(f64::NEG_INFINITY, f64::max);
    assert_eq!(frontier.best().sharpe_ratio, max);

    let analyzer = PerformanceAnalyzer::new(0.02);
    let perf = analyzer.performance_with(&returns, &frontier.best_weights).unwrap();
    assert_relative_eq!(perf.sharpe_ratio, max, epsilon = 1e-12);
  }

  #[test]
  fn seeded_frontier_is_reproducible() {
    let returns = three_assets(2);
    let sampler = FrontierSampler::new(0.0).with_samples(200).with_seed(99);

    assert_eq!(sampler.sample(&returns).unwrap(), sampler.sample(&returns).unwrap());
  }

  #[test]
  fn monte_carlo_optimum_approaches_the_optimizer() {
    let returns = three_assets(42);
    let rf = 0.02;
    let optimizer = PortfolioOptimizer::new(&returns, rf).unwrap();
    let weights = optimizer.optimize(Objective::MaxSharpe).unwrap();
    let optimum = PerformanceAnalyzer::new(rf)
      .performance_with(&returns, &weights)
      .unwrap()
      .sharpe_ratio;

    let frontier = FrontierSampler::new(rf)
      .with_samples(10_000)
      .with_seed(42)
      .sample(&returns)
      .unwrap();
    let sampled = frontier.best().sharpe_ratio;

    assert!(optimum > 0.0);
    assert!(sampled <= optimum + 1e-6, "sampled {sampled} above optimum {optimum}");
    assert!(sampled >= 0.95 * optimum, "sampled {sampled} too far below {optimum}");
  }

  #[test]
  fn zero_samples_is_rejected() {
    let moments = AssetMoments {
      mean: array![0.001],
      covariance: array![[0.0001]],
    };
    assert!(matches!(
      FrontierSampler::new(0.0).with_samples(0).sample_moments(&moments),
      Err(PortfolioError::InvalidParameter(_))
    ));
  }
}
