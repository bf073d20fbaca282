//! # Portfolio Types
//!
//! $$
//! \mathbf{w}\in\mathbb R^n,\quad \sum_i w_i = 1
//! $$
//!
//! Shared weight, objective and result containers.

use std::fmt;
use std::str::FromStr;

use ndarray::Array1;

use crate::error::PortfolioError;
use crate::error::Result;

/// Accepted distance of `sum(w)` from one.
pub const WEIGHT_SUM_TOLERANCE: f64 = 1e-6;

/// Portfolio weights, one per asset in return-series column order.
///
/// Only the budget `sum(w) = 1` is enforced. Entries outside `[0, 1]` are
/// accepted and simply evaluated; long-only bounds are the optimizer's job.
#[derive(Clone, Debug, PartialEq)]
pub struct WeightVector(Vec<f64>);

impl WeightVector {
  /// Validate finiteness and the unit budget.
  pub fn new(weights: Vec<f64>) -> Result<Self> {
    if weights.is_empty() {
      return Err(PortfolioError::EmptyData("weights"));
    }

    let sum: f64 = weights.iter().sum();
    if weights.iter().any(|w| !w.is_finite()) || (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
      return Err(PortfolioError::InvalidWeights { sum });
    }

    Ok(Self(weights))
  }

  /// `1/n` in every slot.
  pub fn equal(n: usize) -> Result<Self> {
    if n == 0 {
      return Err(PortfolioError::EmptyData("weights"));
    }
    Ok(Self(vec![1.0 / n as f64; n]))
  }

  /// Clip to `[0, 1]` and rescale to unit sum. Callers guarantee a positive total.
  pub(crate) fn from_nonnegative(raw: Vec<f64>) -> Self {
    let clipped: Vec<f64> = raw.into_iter().map(|w| w.clamp(0.0, 1.0)).collect();
    let total: f64 = clipped.iter().sum();
    Self(clipped.into_iter().map(|w| w / total).collect())
  }

  /// Weights as a slice.
  pub fn as_slice(&self) -> &[f64] {
    &self.0
  }

  /// Number of weights.
  pub fn len(&self) -> usize {
    self.0.len()
  }

  /// True when there are no weights.
  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }

  /// Iterate the weights in column order.
  pub fn iter(&self) -> std::slice::Iter<'_, f64> {
    self.0.iter()
  }

  /// Copy into an ndarray vector.
  pub fn to_array(&self) -> Array1<f64> {
    Array1::from(self.0.clone())
  }

  /// Unwrap the weights.
  pub fn into_inner(self) -> Vec<f64> {
    self.0
  }

  /// True when every entry lies in `[0, 1]`.
  pub fn is_long_only(&self) -> bool {
    self.0.iter().all(|w| (0.0..=1.0).contains(w))
  }
}

impl AsRef<[f64]> for WeightVector {
  fn as_ref(&self) -> &[f64] {
    &self.0
  }
}

impl TryFrom<Vec<f64>> for WeightVector {
  type Error = PortfolioError;

  fn try_from(weights: Vec<f64>) -> Result<Self> {
    Self::new(weights)
  }
}

/// Annualized performance of a weighted portfolio.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PerformanceResult {
  /// Mean daily return times the trading-day count.
  pub annualized_return: f64,
  /// Daily volatility times the square root of the trading-day count.
  pub annualized_volatility: f64,
  /// `(annualized_return - risk_free) / annualized_volatility`.
  pub sharpe_ratio: f64,
}

/// Optimization target over the long-only simplex.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Objective {
  /// Maximize the Sharpe ratio (minimize its negation).
  MaxSharpe,
  /// Minimize annualized portfolio variance.
  MinVariance,
}

impl FromStr for Objective {
  type Err = PortfolioError;

  fn from_str(s: &str) -> Result<Self> {
    match s.trim().to_lowercase().as_str() {
      "sharpe" | "max-sharpe" | "max_sharpe" | "maxsharpe" => Ok(Self::MaxSharpe),
      "min_variance" | "min-variance" | "minvariance" | "min-var" | "minvar" => {
        Ok(Self::MinVariance)
      }
      _ => Err(PortfolioError::InvalidObjective(s.to_string())),
    }
  }
}

impl fmt::Display for Objective {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Objective::MaxSharpe => write!(f, "max Sharpe ratio"),
      Objective::MinVariance => write!(f, "minimum variance"),
    }
  }
}

/// Labelled weights with their tickers, ready for presentation.
#[derive(Clone, Debug, PartialEq)]
pub struct Allocation {
  /// Display name of the allocation.
  pub label: String,
  /// Ticker per weight.
  pub tickers: Vec<String>,
  /// Weights in ticker order.
  pub weights: WeightVector,
  /// Performance of `weights` on the analyzed returns.
  pub performance: PerformanceResult,
}

impl Allocation {
  /// `(ticker, weight)` pairs in column order.
  pub fn holdings(&self) -> impl Iterator<Item = (&str, f64)> + '_ {
    self
      .tickers
      .iter()
      .map(String::as_str)
      .zip(self.weights.iter().copied())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn weights_summing_to_one_are_accepted() {
    assert!(WeightVector::new(vec![0.2, 0.3, 0.5]).is_ok());
    assert!(WeightVector::new(vec![1.0]).is_ok());
    assert!(WeightVector::new(vec![0.5, 0.5 + 5e-7]).is_ok());
    // bounds are not checked here
    assert!(WeightVector::new(vec![1.5, -0.5]).is_ok());
  }

  #[test]
  fn weights_off_by_a_percent_are_rejected() {
    for weights in [vec![0.5, 0.51], vec![0.5, 0.49], vec![0.3, 0.3, 0.3]] {
      assert!(matches!(
        WeightVector::new(weights),
        Err(PortfolioError::InvalidWeights { .. })
      ));
    }
    assert!(matches!(
      WeightVector::new(vec![f64::NAN, 1.0]),
      Err(PortfolioError::InvalidWeights { .. })
    ));
    assert_eq!(
      WeightVector::new(vec![]),
      Err(PortfolioError::EmptyData("weights"))
    );
  }

  #[test]
  fn objective_parses_known_tags_only() {
    assert_eq!("sharpe".parse::<Objective>(), Ok(Objective::MaxSharpe));
    assert_eq!("min_variance".parse::<Objective>(), Ok(Objective::MinVariance));
    assert_eq!(" Min-Variance ".parse::<Objective>(), Ok(Objective::MinVariance));
    assert_eq!(
      "max_return".parse::<Objective>(),
      Err(PortfolioError::InvalidObjective("max_return".to_string()))
    );
  }

  #[test]
  fn nonnegative_weights_are_clipped_and_rescaled() {
    let w = WeightVector::from_nonnegative(vec![0.5, -1e-12, 0.5000001]);
    let sum: f64 = w.iter().sum();

    assert!(w.is_long_only());
    assert!((sum - 1.0).abs() < 1e-12);
  }
}
