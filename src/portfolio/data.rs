//! # Portfolio Data
//!
//! $$
//! r_{t,i} = \frac{P_{t,i}}{P_{t-1,i}} - 1,\qquad
//! \Sigma_{ij} = \frac{1}{T-1}\sum_t (r_{t,i}-\bar r_i)(r_{t,j}-\bar r_j)
//! $$
//!
//! Price tables, daily/cumulative return series and the sample moments
//! every analytics component consumes.

use std::collections::HashSet;

use chrono::NaiveDate;
use ndarray::s;
use ndarray::Array1;
use ndarray::Array2;
use ndarray::ArrayView1;
use ndarray::Axis;

use crate::error::PortfolioError;
use crate::error::Result;

/// Adjusted closing prices, one row per date and one column per ticker.
#[derive(Clone, Debug, PartialEq)]
pub struct PriceTable {
  tickers: Vec<String>,
  dates: Vec<NaiveDate>,
  prices: Array2<f64>,
}

impl PriceTable {
  /// Build a validated table. `prices` is laid out `dates x tickers`.
  pub fn new(tickers: Vec<String>, dates: Vec<NaiveDate>, prices: Array2<f64>) -> Result<Self> {
    if prices.nrows() != dates.len() {
      return Err(PortfolioError::InvalidPriceTable(format!(
        "{} dates but {} price rows",
        dates.len(),
        prices.nrows()
      )));
    }
    if prices.ncols() != tickers.len() {
      return Err(PortfolioError::InvalidPriceTable(format!(
        "{} tickers but {} price columns",
        tickers.len(),
        prices.ncols()
      )));
    }

    let mut seen = HashSet::with_capacity(tickers.len());
    for ticker in &tickers {
      if !seen.insert(ticker.as_str()) {
        return Err(PortfolioError::InvalidPriceTable(format!(
          "duplicate ticker {ticker}"
        )));
      }
    }

    if let Some(pair) = dates.windows(2).find(|pair| pair[0] >= pair[1]) {
      return Err(PortfolioError::InvalidPriceTable(format!(
        "dates must be strictly increasing ({} then {})",
        pair[0], pair[1]
      )));
    }

    if let Some(((row, col), price)) = prices
      .indexed_iter()
      .find(|(_, p)| !(p.is_finite() && **p > 0.0))
    {
      return Err(PortfolioError::InvalidPriceTable(format!(
        "price {price} for {} on {} is not a positive number",
        tickers[col], dates[row]
      )));
    }

    Ok(Self {
      tickers,
      dates,
      prices,
    })
  }

  /// Build a table from per-ticker price columns sharing one calendar.
  pub fn from_columns(dates: Vec<NaiveDate>, columns: Vec<(String, Vec<f64>)>) -> Result<Self> {
    if let Some((ticker, column)) = columns.iter().find(|(_, c)| c.len() != dates.len()) {
      return Err(PortfolioError::InvalidPriceTable(format!(
        "column {ticker} has {} prices for {} dates",
        column.len(),
        dates.len()
      )));
    }

    let prices = Array2::from_shape_fn((dates.len(), columns.len()), |(i, j)| columns[j].1[i]);
    let tickers = columns.into_iter().map(|(ticker, _)| ticker).collect();
    Self::new(tickers, dates, prices)
  }

  /// Ticker per column.
  pub fn tickers(&self) -> &[String] {
    &self.tickers
  }

  /// Observation date per row.
  pub fn dates(&self) -> &[NaiveDate] {
    &self.dates
  }

  /// Prices, one row per date and one column per ticker.
  pub fn prices(&self) -> &Array2<f64> {
    &self.prices
  }

  /// Number of tickers.
  pub fn num_assets(&self) -> usize {
    self.tickers.len()
  }

  /// Number of dated rows.
  pub fn len(&self) -> usize {
    self.dates.len()
  }

  /// True when the table has no rows.
  pub fn is_empty(&self) -> bool {
    self.dates.is_empty() || self.tickers.is_empty()
  }

  /// Price history of a single ticker.
  pub fn column(&self, ticker: &str) -> Option<ArrayView1<'_, f64>> {
    self
      .tickers
      .iter()
      .position(|t| t == ticker)
      .map(|idx| self.prices.column(idx))
  }

  /// Simple daily returns; the first row has no predecessor and is dropped.
  pub fn daily_returns(&self) -> Result<ReturnSeries> {
    if self.is_empty() {
      return Err(PortfolioError::EmptyData("price table"));
    }
    if self.len() < 2 {
      return Err(PortfolioError::EmptyData(
        "price table needs at least two rows to form a return",
      ));
    }

    let prev = self.prices.slice(s![..-1, ..]);
    let next = self.prices.slice(s![1.., ..]);
    let returns = &next / &prev - 1.0;

    Ok(ReturnSeries {
      tickers: self.tickers.clone(),
      dates: self.dates[1..].to_vec(),
      returns,
    })
  }

  /// Daily and cumulative returns in one pass.
  pub fn returns(&self) -> Result<(ReturnSeries, CumulativeReturnSeries)> {
    let daily = self.daily_returns()?;
    let cumulative = daily.cumulative();
    Ok((daily, cumulative))
  }
}

/// Simple returns of a single price path (e.g. a market index).
pub fn simple_returns(prices: &[f64]) -> Result<Array1<f64>> {
  if prices.len() < 2 {
    return Err(PortfolioError::EmptyData(
      "price path needs at least two observations",
    ));
  }
  if let Some(price) = prices.iter().find(|p| !(p.is_finite() && **p > 0.0)) {
    return Err(PortfolioError::InvalidPriceTable(format!(
      "price {price} is not a positive number"
    )));
  }

  Ok(prices.windows(2).map(|pair| pair[1] / pair[0] - 1.0).collect())
}

/// Daily simple returns, `dates x tickers`.
#[derive(Clone, Debug, PartialEq)]
pub struct ReturnSeries {
  tickers: Vec<String>,
  dates: Vec<NaiveDate>,
  returns: Array2<f64>,
}

impl ReturnSeries {
  /// Wrap a bare return matrix that has no calendar attached.
  pub fn new(tickers: Vec<String>, returns: Array2<f64>) -> Result<Self> {
    if returns.ncols() != tickers.len() {
      return Err(PortfolioError::LengthMismatch {
        expected: tickers.len(),
        actual: returns.ncols(),
      });
    }
    if returns.iter().any(|r| !r.is_finite()) {
      return Err(PortfolioError::InvalidParameter(
        "return series contains non-finite values".to_string(),
      ));
    }

    Ok(Self {
      tickers,
      dates: Vec::new(),
      returns,
    })
  }

  /// Attach a calendar, one date per row.
  pub fn with_dates(mut self, dates: Vec<NaiveDate>) -> Result<Self> {
    if dates.len() != self.returns.nrows() {
      return Err(PortfolioError::LengthMismatch {
        expected: self.returns.nrows(),
        actual: dates.len(),
      });
    }
    self.dates = dates;
    Ok(self)
  }

  /// Ticker per column.
  pub fn tickers(&self) -> &[String] {
    &self.tickers
  }

  /// Row dates; empty when the series was built from a bare matrix.
  pub fn dates(&self) -> &[NaiveDate] {
    &self.dates
  }

  /// Daily returns, one row per day and one column per ticker.
  pub fn values(&self) -> &Array2<f64> {
    &self.returns
  }

  /// Number of tickers.
  pub fn num_assets(&self) -> usize {
    self.tickers.len()
  }

  /// Number of return observations.
  pub fn len(&self) -> usize {
    self.returns.nrows()
  }

  /// True when there are no return rows.
  pub fn is_empty(&self) -> bool {
    self.returns.is_empty()
  }

  /// Realized portfolio return per row, `R w`.
  pub fn portfolio_returns(&self, weights: &[f64]) -> Result<Array1<f64>> {
    check_dimension(self.num_assets(), weights.len())?;
    Ok(self.returns.dot(&ArrayView1::from(weights)))
  }

  /// Running product of `1 + r` per column.
  pub fn cumulative(&self) -> CumulativeReturnSeries {
    let mut values = self.returns.mapv(|r| 1.0 + r);
    values.accumulate_axis_inplace(Axis(0), |&prev, curr| *curr *= prev);

    CumulativeReturnSeries {
      tickers: self.tickers.clone(),
      dates: self.dates.clone(),
      values,
    }
  }

  /// Daily mean vector and sample covariance matrix.
  pub fn moments(&self) -> Result<AssetMoments> {
    if self.is_empty() {
      return Err(PortfolioError::EmptyData("return series"));
    }
    let n = self.len();
    if n < 2 {
      return Err(PortfolioError::InsufficientData {
        required: 2,
        actual: n,
      });
    }

    let mean = self
      .returns
      .mean_axis(Axis(0))
      .ok_or(PortfolioError::EmptyData("return series"))?;
    let centered = &self.returns - &mean;
    let covariance = centered.t().dot(&centered) / (n - 1) as f64;

    Ok(AssetMoments { mean, covariance })
  }
}

/// Growth of one unit invested at the start of the return series.
#[derive(Clone, Debug, PartialEq)]
pub struct CumulativeReturnSeries {
  tickers: Vec<String>,
  dates: Vec<NaiveDate>,
  values: Array2<f64>,
}

impl CumulativeReturnSeries {
  /// Ticker per column.
  pub fn tickers(&self) -> &[String] {
    &self.tickers
  }

  /// Date per row, empty when the source had none.
  pub fn dates(&self) -> &[NaiveDate] {
    &self.dates
  }

  /// Growth factors `prod(1 + r)`, one column per ticker.
  pub fn values(&self) -> &Array2<f64> {
    &self.values
  }

  /// Terminal growth factor per ticker.
  pub fn final_values(&self) -> Option<ArrayView1<'_, f64>> {
    let rows = self.values.nrows();
    (rows > 0).then(|| self.values.row(rows - 1))
  }
}

/// Daily first and second moments of a return series.
#[derive(Clone, Debug, PartialEq)]
pub struct AssetMoments {
  /// Mean daily return per asset.
  pub mean: Array1<f64>,
  /// Sample covariance of daily returns (`ddof = 1`).
  pub covariance: Array2<f64>,
}

impl AssetMoments {
  /// Number of assets covered.
  pub fn num_assets(&self) -> usize {
    self.mean.len()
  }
}

/// `w' A w`.
pub(crate) fn quadratic_form(matrix: &Array2<f64>, w: ArrayView1<'_, f64>) -> f64 {
  w.dot(&matrix.dot(&w))
}

/// Population covariance of two equally long series.
pub(crate) fn population_covariance(x: ArrayView1<'_, f64>, y: ArrayView1<'_, f64>) -> f64 {
  let n = x.len().min(y.len());
  if n == 0 {
    return 0.0;
  }

  let mx = x.sum() / n as f64;
  let my = y.sum() / n as f64;
  x.iter()
    .zip(y.iter())
    .map(|(a, b)| (a - mx) * (b - my))
    .sum::<f64>()
    / n as f64
}

pub(crate) fn check_dimension(expected: usize, actual: usize) -> Result<()> {
  if expected == actual {
    Ok(())
  } else {
    Err(PortfolioError::LengthMismatch { expected, actual })
  }
}
