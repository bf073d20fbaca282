//! # Portfolio Optimizers
//!
//! $$
//! \min_{\mathbf w\in\Delta}\ -\frac{\mu^\top\mathbf w - r_f}{\sqrt{\mathbf w^\top\Sigma\mathbf w}}
//! \qquad\text{or}\qquad
//! \min_{\mathbf w\in\Delta}\ \mathbf w^\top\Sigma\mathbf w
//! $$
//!
//! Long-only, fully invested maximum-Sharpe and minimum-variance allocations.

use argmin::core::CostFunction;
use argmin::core::Gradient;
use argmin::core::State;
use ndarray::Array1;
use ndarray::Array2;
use ndarray::ArrayView1;
use tracing::info;
use tracing::warn;

use super::analyzer::TRADING_DAYS;
use super::analyzer::VOLATILITY_EPSILON;
use super::data::quadratic_form;
use super::data::AssetMoments;
use super::data::ReturnSeries;
use super::sqp::SimplexSqp;
use super::sqp::SqpSettings;
use super::sqp::SqpState;
use super::sqp::converged;
use super::types::Objective;
use super::types::WeightVector;
use crate::error::PortfolioError;
use crate::error::Result;

/// Annualized portfolio variance `w' (252 Σ) w`.
struct VarianceCost {
  covariance: Array2<f64>,
}

impl CostFunction for VarianceCost {
  type Param = Vec<f64>;
  type Output = f64;

  fn cost(&self, x: &Self::Param) -> std::result::Result<Self::Output, argmin::core::Error> {
    Ok(quadratic_form(&self.covariance, ArrayView1::from(x.as_slice())))
  }
}

impl Gradient for VarianceCost {
  type Param = Vec<f64>;
  type Gradient = Vec<f64>;

  fn gradient(&self, x: &Self::Param) -> std::result::Result<Self::Gradient, argmin::core::Error> {
    let w = ArrayView1::from(x.as_slice());
    Ok((self.covariance.dot(&w) * 2.0).to_vec())
  }
}

/// Negated annualized Sharpe ratio.
struct NegativeSharpeCost {
  mean: Array1<f64>,
  covariance: Array2<f64>,
  risk_free: f64,
}

impl NegativeSharpeCost {
  /// `(excess return, Σw, volatility)`
  fn parts(&self, x: &[f64]) -> std::result::Result<(f64, Array1<f64>, f64), PortfolioError> {
    let w = ArrayView1::from(x);
    let excess = self.mean.dot(&w) - self.risk_free;
    let sigma_w = self.covariance.dot(&w);
    let volatility = w.dot(&sigma_w).max(0.0).sqrt();
    if volatility <= VOLATILITY_EPSILON {
      return Err(PortfolioError::DegenerateVolatility);
    }
    Ok((excess, sigma_w, volatility))
  }
}

impl CostFunction for NegativeSharpeCost {
  type Param = Vec<f64>;
  type Output = f64;

  fn cost(&self, x: &Self::Param) -> std::result::Result<Self::Output, argmin::core::Error> {
    let (excess, _, volatility) = self.parts(x)?;
    Ok(-excess / volatility)
  }
}

impl Gradient for NegativeSharpeCost {
  type Param = Vec<f64>;
  type Gradient = Vec<f64>;

  fn gradient(&self, x: &Self::Param) -> std::result::Result<Self::Gradient, argmin::core::Error> {
    let (excess, sigma_w, volatility) = self.parts(x)?;
    let grad = &sigma_w * (excess / volatility.powi(3)) - &self.mean / volatility;
    Ok(grad.to_vec())
  }
}

/// Long-only optimizer over a fixed return history.
///
/// Every call starts from equal weights, so results are local optima of a
/// deterministic search and repeat exactly across calls.
#[derive(Clone, Debug)]
pub struct PortfolioOptimizer {
  moments: AssetMoments,
  risk_free_rate: f64,
  trading_days: f64,
  solver: SimplexSqp,
}

impl PortfolioOptimizer {
  /// Optimizer over the moments of `returns`.
  pub fn new(returns: &ReturnSeries, risk_free_rate: f64) -> Result<Self> {
    Ok(Self::from_moments(returns.moments()?, risk_free_rate))
  }

  /// Optimizer over precomputed daily moments.
  pub fn from_moments(moments: AssetMoments, risk_free_rate: f64) -> Self {
    Self {
      moments,
      risk_free_rate,
      trading_days: TRADING_DAYS,
      solver: SimplexSqp::default(),
    }
  }

  /// Override the annualization factor.
  pub fn with_trading_days(mut self, trading_days: f64) -> Self {
    self.trading_days = trading_days;
    self
  }

  /// Replace the solver's stopping rules.
  pub fn with_settings(mut self, settings: SqpSettings) -> Self {
    self.solver = SimplexSqp::new(settings);
    self
  }

  /// Number of assets being allocated.
  pub fn num_assets(&self) -> usize {
    self.moments.num_assets()
  }

  /// Daily moments the objectives are built from.
  pub fn moments(&self) -> &AssetMoments {
    &self.moments
  }

  /// Optimal long-only weights for `objective`.
  ///
  /// Fails with [`PortfolioError::OptimizationFailed`] when the solver stops
  /// without meeting its convergence criteria.
  pub fn optimize(&self, objective: Objective) -> Result<WeightVector> {
    let n = self.num_assets();
    if n == 0 {
      return Err(PortfolioError::EmptyData("return series"));
    }

    let x0 = WeightVector::equal(n)?.into_inner();
    let covariance = &self.moments.covariance * self.trading_days;
    let state = match objective {
      Objective::MaxSharpe => self.solver.minimize(
        NegativeSharpeCost {
          mean: &self.moments.mean * self.trading_days,
          covariance,
          risk_free: self.risk_free_rate,
        },
        x0,
      ),
      Objective::MinVariance => self.solver.minimize(VarianceCost { covariance }, x0),
    }
    .map_err(into_portfolio_error)?;

    accept(objective, state)
  }

  /// Parse a textual objective tag and optimize for it.
  pub fn optimize_named(&self, objective: &str) -> Result<WeightVector> {
    self.optimize(objective.parse()?)
  }
}

fn accept(objective: Objective, mut state: SqpState) -> Result<WeightVector> {
  let iterations = state.get_iter();
  let status = state.get_termination_status().to_string();

  let param = match state.take_param() {
    Some(param) if converged(&state) => param,
    _ => {
      warn!(%objective, iterations, %status, "optimization failed");
      return Err(PortfolioError::OptimizationFailed {
        iterations,
        reason: status,
      });
    }
  };

  info!(%objective, iterations, cost = state.get_cost(), "optimization converged");
  Ok(WeightVector::from_nonnegative(param))
}

fn into_portfolio_error(err: argmin::core::Error) -> PortfolioError {
  match err.downcast::<PortfolioError>() {
    Ok(err) => err,
    Err(other) => PortfolioError::OptimizationFailed {
      iterations: 0,
      reason: other.to_string(),
    },
  }
}
