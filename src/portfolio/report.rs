//! # Text Report
//!
//! Plain-text tables for an [`AnalysisReport`].

use std::fmt;

use prettytable::format;
use prettytable::row;
use prettytable::Table;

use super::engine::AnalysisReport;
use super::types::Allocation;

fn percent(value: f64) -> String {
  format!("{:.2}%", value * 100.0)
}

fn table() -> Table {
  let mut table = Table::new();
  table.set_format(*format::consts::FORMAT_NO_BORDER_LINE_SEPARATOR);
  table
}

impl AnalysisReport {
  /// Return, volatility and Sharpe of each allocation side by side.
  pub fn performance_table(&self) -> Table {
    let mut table = table();
    table.set_titles(row!["Portfolio", "Return", "Volatility", "Sharpe"]);
    for allocation in self.allocations() {
      let perf = &allocation.performance;
      table.add_row(row![
        allocation.label,
        r->percent(perf.annualized_return),
        r->percent(perf.annualized_volatility),
        r->format!("{:.2}", perf.sharpe_ratio)
      ]);
    }
    let best = self.frontier.best();
    table.add_row(row![
      "Frontier best",
      r->percent(best.expected_return),
      r->percent(best.volatility),
      r->format!("{:.2}", best.sharpe_ratio)
    ]);
    table
  }

  /// One row per ticker, one weight column per allocation.
  pub fn weights_table(&self) -> Table {
    let mut table = table();
    table.set_titles(row![
      "Ticker",
      self.equal_weight.label,
      self.max_sharpe.label,
      self.min_variance.label,
      "Frontier best"
    ]);
    for (i, ticker) in self.tickers.iter().enumerate() {
      table.add_row(row![
        ticker,
        r->percent(self.equal_weight.weights.as_slice()[i]),
        r->percent(self.max_sharpe.weights.as_slice()[i]),
        r->percent(self.min_variance.weights.as_slice()[i]),
        r->percent(self.frontier.best_weights.as_slice()[i])
      ]);
    }
    table
  }

  /// Equal-weight risk measures and total return per ticker over the window.
  pub fn risk_table(&self) -> Table {
    let mut table = table();
    table.add_row(row![
      format!("VaR ({:.0}%, daily)", self.var_confidence * 100.0),
      r->percent(self.value_at_risk)
    ]);
    if let Some(beta) = &self.beta {
      table.add_row(row!["Beta", r->format!("{:.3}", beta.portfolio)]);
    }
    if let Some(last) = self.cumulative.final_values() {
      for (ticker, growth) in self.tickers.iter().zip(last.iter()) {
        table.add_row(row![format!("Total return {ticker}"), r->percent(growth - 1.0)]);
      }
    }
    table
  }

  /// Equal-weight, max-Sharpe and min-variance allocations in display order.
  pub fn allocations(&self) -> [&Allocation; 3] {
    [&self.equal_weight, &self.max_sharpe, &self.min_variance]
  }
}

impl fmt::Display for AnalysisReport {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    writeln!(f, "Performance")?;
    write!(f, "{}", self.performance_table())?;
    writeln!(f)?;
    writeln!(f, "Weights")?;
    write!(f, "{}", self.weights_table())?;
    writeln!(f)?;
    writeln!(f, "Risk")?;
    write!(f, "{}", self.risk_table())
  }
}

#[cfg(test)]
mod tests {
  use chrono::NaiveDate;

  use super::*;
  use crate::portfolio::engine::PortfolioEngine;
  use crate::portfolio::engine::PortfolioEngineConfig;
  use crate::portfolio::source::PriceProvider;
  use crate::portfolio::source::PriceRequest;
  use crate::portfolio::synthetic::SyntheticProvider;

  fn report() -> AnalysisReport {
    let request = PriceRequest::new(
      vec!["AAA".to_string(), "BBB".to_string()],
      NaiveDate::from_ymd_opt(2015, 1, 1).unwrap(),
      NaiveDate::from_ymd_opt(2024, 12, 31).unwrap(),
    );
    let prices = SyntheticProvider::new(3).fetch(&request).unwrap();
    PortfolioEngine::new(PortfolioEngineConfig {
      frontier_samples: 500,
      frontier_seed: Some(1),
      ..PortfolioEngineConfig::default()
    })
    .analyze(&prices, None)
    .unwrap()
  }

  #[test]
  fn report_lists_every_allocation_and_ticker() {
    let text = report().to_string();

    for needle in ["Equal weight", "Max Sharpe", "Min variance", "Frontier best", "AAA", "BBB"] {
      assert!(text.contains(needle), "missing {needle} in\n{text}");
    }
    assert!(text.contains("VaR (95%, daily)"));
    assert!(text.contains("50.00%"));
  }

  #[test]
  fn total_return_row_is_growth_minus_one() {
    let report = report();
    let growth = report.cumulative.final_values().unwrap()[0];
    let text = report.risk_table().to_string();

    let row = text
      .lines()
      .find(|line| line.contains("Total return AAA"))
      .unwrap();
    assert!(row.contains(&percent(growth - 1.0)), "{row}");
  }

  #[test]
  fn percent_keeps_two_decimals() {
    assert_eq!(percent(0.5), "50.00%");
    assert_eq!(percent(-0.01234), "-1.23%");
  }

  #[test]
  fn weights_table_has_a_row_per_ticker() {
    assert_eq!(report().weights_table().len(), 2);
  }
}
