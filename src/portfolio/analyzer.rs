//! # Performance Analyzer
//!
//! $$
//! \mu_p = 252\,\bar{\mathbf r}^\top\mathbf w,\qquad
//! \sigma_p = \sqrt{\mathbf w^\top (252\,\Sigma)\,\mathbf w},\qquad
//! S = \frac{\mu_p - r_f}{\sigma_p}
//! $$
//!
//! Annualized return/volatility, Sharpe ratio, historical Value-at-Risk and
//! single-market beta of a weighted portfolio.

use ndarray::Array1;
use ndarray::ArrayView1;

use super::data::check_dimension;
use super::data::population_covariance;
use super::data::quadratic_form;
use super::data::AssetMoments;
use super::data::ReturnSeries;
use super::types::PerformanceResult;
use super::types::WeightVector;
use crate::error::PortfolioError;
use crate::error::Result;

/// Trading days used to annualize daily moments.
pub const TRADING_DAYS: f64 = 252.0;
/// Default confidence level for [`PerformanceAnalyzer::value_at_risk`].
pub const DEFAULT_VAR_CONFIDENCE: f64 = 0.95;
/// Volatilities at or below this are treated as zero.
pub const VOLATILITY_EPSILON: f64 = 1e-12;

/// Per-asset and portfolio beta against a market series.
#[derive(Clone, Debug, PartialEq)]
pub struct BetaEstimate {
  /// Beta of the weighted portfolio.
  pub portfolio: f64,
  /// Per-asset betas in column order.
  pub assets: Array1<f64>,
}

/// Portfolio analytics under a fixed risk-free rate.
///
/// The analyzer keeps an optional weight slot for the two-step
/// `set_weights` / `performance` protocol. Writing the slot takes `&mut self`,
/// so one analyzer has a single writer; code that evaluates many weight
/// vectors (possibly on several threads) should call the `*_with` methods,
/// which never read or write the slot.
#[derive(Clone, Debug)]
pub struct PerformanceAnalyzer {
  risk_free_rate: f64,
  trading_days: f64,
  weights: Option<WeightVector>,
}

impl Default for PerformanceAnalyzer {
  fn default() -> Self {
    Self::new(0.0)
  }
}

impl PerformanceAnalyzer {
  /// Analyzer with no weights set and 252 trading days.
  pub fn new(risk_free_rate: f64) -> Self {
    Self {
      risk_free_rate,
      trading_days: TRADING_DAYS,
      weights: None,
    }
  }

  /// Override the annualization factor.
  pub fn with_trading_days(mut self, trading_days: f64) -> Self {
    self.trading_days = trading_days;
    self
  }

  /// Annual risk-free rate.
  pub fn risk_free_rate(&self) -> f64 {
    self.risk_free_rate
  }

  /// Trading days per year used for annualization.
  pub fn trading_days(&self) -> f64 {
    self.trading_days
  }

  /// Weights stored by [`Self::set_weights`], if any.
  pub fn weights(&self) -> Option<&WeightVector> {
    self.weights.as_ref()
  }

  /// Store weights for later calls. Fails unless they sum to one.
  pub fn set_weights(&mut self, weights: &[f64]) -> Result<()> {
    self.weights = Some(WeightVector::new(weights.to_vec())?);
    Ok(())
  }

  fn current_weights(&self) -> Result<&WeightVector> {
    self.weights.as_ref().ok_or(PortfolioError::WeightsNotSet)
  }

  /// Performance of the stored weights.
  pub fn performance(&self, returns: &ReturnSeries) -> Result<PerformanceResult> {
    self.performance_with(returns, self.current_weights()?)
  }

  /// Performance of explicit `weights`; the stored slot is ignored.
  pub fn performance_with(
    &self,
    returns: &ReturnSeries,
    weights: &WeightVector,
  ) -> Result<PerformanceResult> {
    let moments = returns.moments()?;
    self.evaluate(&moments, weights)
  }

  /// Performance from precomputed moments; the hot path of frontier sampling.
  pub fn evaluate(
    &self,
    moments: &AssetMoments,
    weights: &WeightVector,
  ) -> Result<PerformanceResult> {
    let annualized_return = self.annualized_return(moments, weights)?;
    let annualized_volatility = self.annualized_volatility(moments, weights)?;
    let sharpe_ratio = sharpe_ratio(annualized_return, annualized_volatility, self.risk_free_rate)?;

    Ok(PerformanceResult {
      annualized_return,
      annualized_volatility,
      sharpe_ratio,
    })
  }

  /// Mean daily portfolio return times the trading-day count.
  pub fn annualized_return(&self, moments: &AssetMoments, weights: &WeightVector) -> Result<f64> {
    check_dimension(moments.num_assets(), weights.len())?;
    Ok(moments.mean.dot(&ArrayView1::from(weights.as_slice())) * self.trading_days)
  }

  /// Square root of the annualized portfolio variance.
  pub fn annualized_volatility(
    &self,
    moments: &AssetMoments,
    weights: &WeightVector,
  ) -> Result<f64> {
    check_dimension(moments.num_assets(), weights.len())?;
    let variance =
      quadratic_form(&moments.covariance, ArrayView1::from(weights.as_slice())) * self.trading_days;
    Ok(variance.max(0.0).sqrt())
  }

  /// Daily historical VaR of the stored weights.
  ///
  /// Returns the `(1 - confidence)` percentile of realized portfolio returns,
  /// so a loss shows up as a negative number.
  pub fn value_at_risk(&self, returns: &ReturnSeries, confidence: f64) -> Result<f64> {
    self.value_at_risk_with(returns, self.current_weights()?, confidence)
  }

  /// Daily historical VaR of explicit `weights`.
  pub fn value_at_risk_with(
    &self,
    returns: &ReturnSeries,
    weights: &WeightVector,
    confidence: f64,
  ) -> Result<f64> {
    if !(confidence > 0.0 && confidence < 1.0) {
      return Err(PortfolioError::InvalidParameter(format!(
        "confidence level must lie in (0, 1), got {confidence}"
      )));
    }
    if returns.is_empty() {
      return Err(PortfolioError::EmptyData("return series"));
    }

    let portfolio = returns.portfolio_returns(weights.as_slice())?.to_vec();
    percentile(&portfolio, 1.0 - confidence)
  }

  /// Beta of the stored weights against daily market returns.
  pub fn beta(&self, returns: &ReturnSeries, market_returns: &[f64]) -> Result<BetaEstimate> {
    self.beta_with(returns, self.current_weights()?, market_returns)
  }

  /// Beta of explicit `weights` against daily market returns.
  pub fn beta_with(
    &self,
    returns: &ReturnSeries,
    weights: &WeightVector,
    market_returns: &[f64],
  ) -> Result<BetaEstimate> {
    check_dimension(returns.num_assets(), weights.len())?;
    check_dimension(returns.len(), market_returns.len())?;
    if returns.is_empty() {
      return Err(PortfolioError::EmptyData("return series"));
    }

    let market = ArrayView1::from(market_returns);
    let market_variance = population_covariance(market, market);
    if market_variance <= VOLATILITY_EPSILON * VOLATILITY_EPSILON {
      return Err(PortfolioError::DegenerateVolatility);
    }

    let assets: Array1<f64> = returns
      .values()
      .columns()
      .into_iter()
      .map(|asset| population_covariance(asset, market) / market_variance)
      .collect();
    let portfolio = assets.dot(&ArrayView1::from(weights.as_slice()));

    Ok(BetaEstimate { portfolio, assets })
  }
}

pub(crate) fn sharpe_ratio(
  annualized_return: f64,
  annualized_volatility: f64,
  risk_free: f64,
) -> Result<f64> {
  if annualized_volatility > VOLATILITY_EPSILON {
    Ok((annualized_return - risk_free) / annualized_volatility)
  } else {
    Err(PortfolioError::DegenerateVolatility)
  }
}

/// Empirical quantile with linear interpolation between order statistics.
///
/// `q` is a fraction in `[0, 1]`; the rank is `q (n - 1)` on the sorted sample.
pub fn percentile(values: &[f64], q: f64) -> Result<f64> {
  if values.is_empty() {
    return Err(PortfolioError::EmptyData("percentile sample"));
  }
  if !(0.0..=1.0).contains(&q) {
    return Err(PortfolioError::InvalidParameter(format!(
      "quantile must lie in [0, 1], got {q}"
    )));
  }

  let mut sorted = values.to_vec();
  sorted.sort_by(|a, b| a.total_cmp(b));

  let rank = q * (sorted.len() - 1) as f64;
  let lo = rank.floor() as usize;
  let hi = rank.ceil() as usize;
  let frac = rank - lo as f64;

  Ok(sorted[lo] + frac * (sorted[hi] - sorted[lo]))
}

#[cfg(test)]
mod tests {
  use approx::assert_abs_diff_eq;
  use approx::assert_relative_eq;
  use ndarray::Array2;
  use rand::rngs::StdRng;
  use rand::SeedableRng;
  use rand_distr::Distribution;
  use rand_distr::Normal;

  use super::*;

  fn names(n: usize) -> Vec<String> {
    (0..n).map(|i| format!("A{i}")).collect()
  }

  fn random_returns(rows: usize, cols: usize, seed: u64) -> ReturnSeries {
    let mut rng = StdRng::seed_from_u64(seed);
    let normal = Normal::new(0.0005, 0.01).unwrap();
    let values = Array2::from_shape_simple_fn((rows, cols), || normal.sample(&mut rng));
    ReturnSeries::new(names(cols), values).unwrap()
  }

  #[test]
  fn performance_requires_weights() {
    let analyzer = PerformanceAnalyzer::new(0.02);
    let returns = random_returns(50, 2, 1);

    assert_eq!(
      analyzer.performance(&returns),
      Err(PortfolioError::WeightsNotSet)
    );
    assert_eq!(
      analyzer.value_at_risk(&returns, DEFAULT_VAR_CONFIDENCE),
      Err(PortfolioError::WeightsNotSet)
    );
    assert_eq!(
      analyzer.beta(&returns, &[0.0; 50]),
      Err(PortfolioError::WeightsNotSet)
    );
  }

  #[test]
  fn set_weights_rejects_bad_budget_and_keeps_previous_slot() {
    let mut analyzer = PerformanceAnalyzer::new(0.0);
    analyzer.set_weights(&[0.6, 0.4]).unwrap();

    assert!(matches!(
      analyzer.set_weights(&[0.6, 0.41]),
      Err(PortfolioError::InvalidWeights { .. })
    ));
    assert_eq!(analyzer.weights().unwrap().as_slice(), &[0.6, 0.4]);
  }

  #[test]
  fn constant_returns_have_degenerate_volatility() {
    let mut values = Array2::zeros((100, 2));
    values.column_mut(0).fill(0.001);
    values.column_mut(1).fill(0.002);
    let returns = ReturnSeries::new(names(2), values).unwrap();
    let moments = returns.moments().unwrap();

    let mut analyzer = PerformanceAnalyzer::new(0.02);
    analyzer.set_weights(&[0.5, 0.5]).unwrap();
    let weights = analyzer.weights().unwrap().clone();

    assert_relative_eq!(
      analyzer.annualized_return(&moments, &weights).unwrap(),
      0.378,
      epsilon = 1e-12
    );
    assert!(analyzer.annualized_volatility(&moments, &weights).unwrap() < 1e-10);
    assert_eq!(
      analyzer.performance(&returns),
      Err(PortfolioError::DegenerateVolatility)
    );
  }

  #[test]
  fn performance_is_permutation_equivariant() {
    let returns = random_returns(250, 3, 7);
    let weights = WeightVector::new(vec![0.5, 0.3, 0.2]).unwrap();
    let analyzer = PerformanceAnalyzer::new(0.01);
    let base = analyzer.performance_with(&returns, &weights).unwrap();

    let order = [2, 0, 1];
    let permuted_values = returns.values().select(ndarray::Axis(1), &order);
    let permuted = ReturnSeries::new(names(3), permuted_values).unwrap();
    let permuted_weights =
      WeightVector::new(order.iter().map(|&i| weights.as_slice()[i]).collect()).unwrap();
    let other = analyzer.performance_with(&permuted, &permuted_weights).unwrap();

    assert_relative_eq!(base.annualized_return, other.annualized_return, epsilon = 1e-12);
    assert_relative_eq!(
      base.annualized_volatility,
      other.annualized_volatility,
      epsilon = 1e-12
    );
    assert_relative_eq!(base.sharpe_ratio, other.sharpe_ratio, epsilon = 1e-9);
  }

  #[test]
  fn equal_weights_diversify_uncorrelated_assets() {
    // identical mean/variance, zero sample covariance
    let pattern = [0.01, -0.01, 0.01, -0.01];
    let other = [0.01, 0.01, -0.01, -0.01];
    let mut values = Array2::zeros((4, 2));
    for t in 0..4 {
      values[[t, 0]] = pattern[t];
      values[[t, 1]] = other[t];
    }
    let returns = ReturnSeries::new(names(2), values).unwrap();
    let moments = returns.moments().unwrap();
    assert_abs_diff_eq!(moments.covariance[[0, 1]], 0.0, epsilon = 1e-18);

    let analyzer = PerformanceAnalyzer::new(0.0);
    let equal = analyzer
      .annualized_volatility(&moments, &WeightVector::equal(2).unwrap())
      .unwrap();
    for single in [vec![1.0, 0.0], vec![0.0, 1.0]] {
      let vol = analyzer
        .annualized_volatility(&moments, &WeightVector::new(single).unwrap())
        .unwrap();
      assert!(equal < vol);
    }
  }

  #[test]
  fn value_at_risk_is_the_interpolated_percentile() {
    let values = Array2::from_shape_fn((21, 1), |(t, _)| (t as f64 - 10.0) / 100.0);
    let returns = ReturnSeries::new(names(1), values).unwrap();
    let mut analyzer = PerformanceAnalyzer::new(0.0);
    analyzer.set_weights(&[1.0]).unwrap();

    // sorted sample -0.10..=0.10, rank 0.05 * 20 = 1 -> -0.09
    assert_relative_eq!(
      analyzer.value_at_risk(&returns, 0.95).unwrap(),
      -0.09,
      epsilon = 1e-12
    );
    // rank 0.1 * 20 = 2 -> -0.08
    assert_relative_eq!(
      analyzer.value_at_risk(&returns, 0.90).unwrap(),
      -0.08,
      epsilon = 1e-12
    );
    assert!(matches!(
      analyzer.value_at_risk(&returns, 1.0),
      Err(PortfolioError::InvalidParameter(_))
    ));
  }

  #[test]
  fn percentile_interpolates_between_order_statistics() {
    let sample = [4.0, 1.0, 3.0, 2.0];
    // rank 0.05 * 3 = 0.15
    assert_relative_eq!(percentile(&sample, 0.05).unwrap(), 1.15, epsilon = 1e-12);
    assert_relative_eq!(percentile(&sample, 0.5).unwrap(), 2.5, epsilon = 1e-12);
    assert_relative_eq!(percentile(&sample, 1.0).unwrap(), 4.0, epsilon = 1e-12);
    assert_eq!(
      percentile(&[], 0.5),
      Err(PortfolioError::EmptyData("percentile sample"))
    );
  }

  #[test]
  fn beta_of_the_market_itself_is_one() {
    let returns = random_returns(300, 2, 11);
    let market: Vec<f64> = returns.values().column(0).to_vec();
    let mut analyzer = PerformanceAnalyzer::new(0.0);
    analyzer.set_weights(&[0.25, 0.75]).unwrap();

    let beta = analyzer.beta(&returns, &market).unwrap();
    assert_relative_eq!(beta.assets[0], 1.0, epsilon = 1e-12);
    assert_relative_eq!(
      beta.portfolio,
      0.25 + 0.75 * beta.assets[1],
      epsilon = 1e-12
    );
  }

  #[test]
  fn beta_rejects_misaligned_market_series() {
    let returns = random_returns(30, 2, 3);
    let analyzer = PerformanceAnalyzer::new(0.0);
    let weights = WeightVector::equal(2).unwrap();

    assert_eq!(
      analyzer.beta_with(&returns, &weights, &[0.0; 29]),
      Err(PortfolioError::LengthMismatch {
        expected: 30,
        actual: 29
      })
    );
    assert_eq!(
      analyzer.beta_with(&returns, &weights, &[0.01; 30]),
      Err(PortfolioError::DegenerateVolatility)
    );
  }

  #[test]
  fn weight_length_must_match_assets() {
    let returns = random_returns(30, 3, 5);
    let analyzer = PerformanceAnalyzer::new(0.0);

    assert_eq!(
      analyzer.performance_with(&returns, &WeightVector::equal(2).unwrap()),
      Err(PortfolioError::LengthMismatch {
        expected: 3,
        actual: 2
      })
    );
  }
}
