//! # Portfolio Engine
//!
//! $$
//! P \to (r, R) \to \{\mathbf w_{eq}, \mathbf w_{S}, \mathbf w_{\sigma}\} \to \text{report}
//! $$
//!
//! End-to-end analysis of a price table: equal-weight benchmark with its
//! risk measures, both optimized allocations, and the sampled frontier.

use tracing::info;

use super::analyzer::BetaEstimate;
use super::analyzer::PerformanceAnalyzer;
use super::analyzer::DEFAULT_VAR_CONFIDENCE;
use super::analyzer::TRADING_DAYS;
use super::data::simple_returns;
use super::data::CumulativeReturnSeries;
use super::data::PriceTable;
use super::data::ReturnSeries;
use super::frontier::FrontierSample;
use super::frontier::FrontierSampler;
use super::frontier::DEFAULT_FRONTIER_SAMPLES;
use super::optimizers::PortfolioOptimizer;
use super::sqp::SqpSettings;
use super::types::Allocation;
use super::types::Objective;
use super::types::WeightVector;
use crate::error::PortfolioError;
use crate::error::Result;

/// Annual risk-free rate used when none is configured.
pub const DEFAULT_RISK_FREE_RATE: f64 = 0.02;

/// Runtime configuration for [`PortfolioEngine`].
#[derive(Clone, Debug, PartialEq)]
pub struct PortfolioEngineConfig {
  /// Annual risk-free rate.
  pub risk_free: f64,
  /// Confidence level of the reported VaR.
  pub var_confidence: f64,
  /// Trading days per year used for annualization.
  pub trading_days: f64,
  /// Random portfolios drawn for the frontier.
  pub frontier_samples: usize,
  /// `None` draws the frontier from OS entropy.
  pub frontier_seed: Option<u64>,
  /// Stopping rules of both optimizations.
  pub solver: SqpSettings,
}

impl Default for PortfolioEngineConfig {
  fn default() -> Self {
    Self {
      risk_free: DEFAULT_RISK_FREE_RATE,
      var_confidence: DEFAULT_VAR_CONFIDENCE,
      trading_days: TRADING_DAYS,
      frontier_samples: DEFAULT_FRONTIER_SAMPLES,
      frontier_seed: None,
      solver: SqpSettings::default(),
    }
  }
}

/// Everything [`PortfolioEngine::analyze`] derives from one price table.
#[derive(Clone, Debug)]
pub struct AnalysisReport {
  /// Ticker per column, shared by every allocation.
  pub tickers: Vec<String>,
  /// Growth factor of each ticker over the window.
  pub cumulative: CumulativeReturnSeries,
  /// Equal-weight benchmark.
  pub equal_weight: Allocation,
  /// Daily historical VaR of the equal-weight portfolio.
  pub value_at_risk: f64,
  /// Confidence level `value_at_risk` was computed at.
  pub var_confidence: f64,
  /// Present only when market prices were supplied.
  pub beta: Option<BetaEstimate>,
  /// Maximum Sharpe ratio allocation.
  pub max_sharpe: Allocation,
  /// Minimum variance allocation.
  pub min_variance: Allocation,
  /// Monte Carlo cloud of random portfolios.
  pub frontier: FrontierSample,
}

/// Runs the full analysis of a price table.
#[derive(Clone, Debug, Default)]
pub struct PortfolioEngine {
  config: PortfolioEngineConfig,
}

impl PortfolioEngine {
  /// Construct a new engine with explicit configuration.
  pub fn new(config: PortfolioEngineConfig) -> Self {
    Self { config }
  }

  /// Borrow engine configuration.
  pub fn config(&self) -> &PortfolioEngineConfig {
    &self.config
  }

  /// Analyzer configured with the engine's rate and trading days.
  pub fn analyzer(&self) -> PerformanceAnalyzer {
    PerformanceAnalyzer::new(self.config.risk_free).with_trading_days(self.config.trading_days)
  }

  /// Optimizer over `returns` configured from the engine.
  pub fn optimizer(&self, returns: &ReturnSeries) -> Result<PortfolioOptimizer> {
    Ok(
      PortfolioOptimizer::new(returns, self.config.risk_free)?
        .with_trading_days(self.config.trading_days)
        .with_settings(self.config.solver.clone()),
    )
  }

  /// Frontier sampler configured from the engine.
  pub fn sampler(&self) -> FrontierSampler {
    let sampler = FrontierSampler::new(self.config.risk_free)
      .with_samples(self.config.frontier_samples)
      .with_trading_days(self.config.trading_days);
    match self.config.frontier_seed {
      Some(seed) => sampler.with_seed(seed),
      None => sampler,
    }
  }

  /// Label `weights` and attach their performance on `returns`.
  pub fn allocation(
    &self,
    label: &str,
    returns: &ReturnSeries,
    weights: WeightVector,
  ) -> Result<Allocation> {
    let performance = self.analyzer().performance_with(returns, &weights)?;
    Ok(Allocation {
      label: label.to_string(),
      tickers: returns.tickers().to_vec(),
      weights,
      performance,
    })
  }

  /// Run the full analysis.
  ///
  /// `market_prices`, when given, must cover the same dates as `prices`;
  /// beta is then reported for the equal-weight portfolio.
  pub fn analyze(
    &self,
    prices: &PriceTable,
    market_prices: Option<&[f64]>,
  ) -> Result<AnalysisReport> {
    let (returns, cumulative) = prices.returns()?;
    info!(assets = returns.num_assets(), days = returns.len(), "computed daily returns");

    let mut analyzer = self.analyzer();
    analyzer.set_weights(WeightVector::equal(returns.num_assets())?.as_slice())?;
    let equal_perf = analyzer.performance(&returns)?;
    let value_at_risk = analyzer.value_at_risk(&returns, self.config.var_confidence)?;

    let beta = match market_prices {
      Some(market) => {
        if market.len() != prices.len() {
          return Err(PortfolioError::LengthMismatch {
            expected: prices.len(),
            actual: market.len(),
          });
        }
        let market_returns = simple_returns(market)?;
        Some(analyzer.beta(&returns, &market_returns.to_vec())?)
      }
      None => None,
    };
    info!(
      sharpe = equal_perf.sharpe_ratio,
      value_at_risk,
      beta = beta.as_ref().map(|b| b.portfolio),
      "equal-weight portfolio analyzed"
    );

    let equal_weight = Allocation {
      label: "Equal weight".to_string(),
      tickers: returns.tickers().to_vec(),
      weights: analyzer
        .weights()
        .cloned()
        .ok_or(PortfolioError::WeightsNotSet)?,
      performance: equal_perf,
    };

    let optimizer = self.optimizer(&returns)?;
    let max_sharpe = self.allocation(
      "Max Sharpe",
      &returns,
      optimizer.optimize(Objective::MaxSharpe)?,
    )?;
    let min_variance = self.allocation(
      "Min variance",
      &returns,
      optimizer.optimize(Objective::MinVariance)?,
    )?;

    let frontier = self.sampler().sample_moments(optimizer.moments())?;
    info!(
      samples = frontier.len(),
      best_sharpe = frontier.best().sharpe_ratio,
      "efficient frontier sampled"
    );

    Ok(AnalysisReport {
      tickers: returns.tickers().to_vec(),
      cumulative,
      equal_weight,
      value_at_risk,
      var_confidence: self.config.var_confidence,
      beta,
      max_sharpe,
      min_variance,
      frontier,
    })
  }
}

#[cfg(test)]
mod tests {
  use approx::assert_relative_eq;
  use chrono::NaiveDate;
  use tracing_test::traced_test;

  use super::*;
  use crate::portfolio::synthetic::simulate_price_table;
  use crate::portfolio::synthetic::weekdays;
  use crate::portfolio::synthetic::SyntheticAsset;

  fn asset(ticker: &str, drift: f64, volatility: f64) -> SyntheticAsset {
    SyntheticAsset {
      ticker: ticker.to_string(),
      drift,
      volatility,
      initial_price: 50.0,
    }
  }

  fn prices() -> PriceTable {
    let start = NaiveDate::from_ymd_opt(2012, 1, 2).unwrap();
    let end = NaiveDate::from_ymd_opt(2023, 12, 31).unwrap();
    let assets = [
      asset("AAA", 0.12, 0.12),
      asset("BBB", 0.09, 0.08),
      asset("CCC", 0.06, 0.05),
    ];
    simulate_price_table(&assets, weekdays(start, end), 11).unwrap()
  }

  fn engine() -> PortfolioEngine {
    PortfolioEngine::new(PortfolioEngineConfig {
      frontier_samples: 2_000,
      frontier_seed: Some(5),
      ..PortfolioEngineConfig::default()
    })
  }

  #[test]
  #[traced_test]
  fn analysis_covers_every_stage() {
    let prices = prices();
    let report = engine().analyze(&prices, None).unwrap();

    assert_eq!(report.tickers, prices.tickers());
    assert_eq!(report.frontier.len(), 2_000);
    assert!(report.beta.is_none());
    assert!(report.value_at_risk < 0.0);
    assert_eq!(report.cumulative.values().nrows(), prices.len() - 1);

    let eq = &report.equal_weight;
    assert!(report.max_sharpe.performance.sharpe_ratio >= eq.performance.sharpe_ratio - 1e-9);
    assert!(
      report.min_variance.performance.annualized_volatility
        <= eq.performance.annualized_volatility + 1e-9
    );
    let optimum = report.max_sharpe.performance.sharpe_ratio;
    assert!(report.frontier.best().sharpe_ratio <= optimum + 1e-6);
    assert!(logs_contain("efficient frontier sampled"));
  }

  #[test]
  fn beta_against_a_constituent_portfolio() {
    let prices = prices();
    // market equal to the equal-weight basket's own price path
    let returns = prices.daily_returns().unwrap();
    let basket = returns.portfolio_returns(&[1.0 / 3.0; 3]).unwrap();
    let mut market = vec![100.0];
    for r in basket.iter() {
      let last = market[market.len() - 1];
      market.push(last * (1.0 + r));
    }

    let report = engine().analyze(&prices, Some(&market)).unwrap();
    let beta = report.beta.unwrap();
    assert_relative_eq!(beta.portfolio, 1.0, epsilon = 1e-9);
  }

  #[test]
  fn market_prices_must_align() {
    let prices = prices();
    let market = vec![100.0; prices.len() - 1];

    assert!(matches!(
      engine().analyze(&prices, Some(&market)),
      Err(PortfolioError::LengthMismatch { .. })
    ));
  }

  #[test]
  fn invalid_confidence_surfaces() {
    let engine = PortfolioEngine::new(PortfolioEngineConfig {
      var_confidence: 1.5,
      frontier_samples: 10,
      ..PortfolioEngineConfig::default()
    });

    assert!(matches!(
      engine.analyze(&prices(), None),
      Err(PortfolioError::InvalidParameter(_))
    ));
  }
}
