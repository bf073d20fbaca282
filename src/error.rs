//! # Errors
//!
//! $$
//! \text{op}:\ \text{inputs}\to\text{Result}\langle T,\ \text{PortfolioError}\rangle
//! $$
//!
//! Every fallible operation in the crate reports one of these kinds. Errors
//! are raised where they are detected and never recovered internally.

use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, PortfolioError>;

/// Failure kinds of every fallible portfolio operation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PortfolioError {
  #[error("weights must sum to 1 (got {sum})")]
  InvalidWeights { sum: f64 },

  #[error("weights not set")]
  WeightsNotSet,

  #[error("portfolio volatility is zero, Sharpe ratio is undefined")]
  DegenerateVolatility,

  #[error("length mismatch: expected {expected}, got {actual}")]
  LengthMismatch { expected: usize, actual: usize },

  #[error("invalid optimization objective '{0}', use 'sharpe' or 'min_variance'")]
  InvalidObjective(String),

  #[error("optimization failed after {iterations} iterations: {reason}")]
  OptimizationFailed { iterations: u64, reason: String },

  #[error("no data available: {0}")]
  EmptyData(&'static str),

  #[error("insufficient data: need at least {required} observations, got {actual}")]
  InsufficientData { required: usize, actual: usize },

  #[error("invalid price table: {0}")]
  InvalidPriceTable(String),

  #[error("invalid parameter: {0}")]
  InvalidParameter(String),

  #[error("no saved data found for {0}")]
  NotFound(String),
}
