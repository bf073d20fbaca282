//! # stochastic-portfolio
//!
//! $$
//! \max_{\mathbf{w}\in\Delta^{n-1}} \frac{\mu^\top \mathbf{w} - r_f}{\sqrt{\mathbf{w}^\top \Sigma \mathbf{w}}}
//! $$
//!
//! Portfolio analytics and long-only optimization over historical daily
//! returns: annualized performance, Value-at-Risk, market beta, maximum
//! Sharpe and minimum variance allocations, and a Monte Carlo frontier.

pub mod error;
pub mod portfolio;

pub use error::PortfolioError;
pub use error::Result;
