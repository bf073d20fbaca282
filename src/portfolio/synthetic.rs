//! # Synthetic Prices
//!
//! $$
//! S_{t+1} = S_t \exp\!\Big(\big(\mu - \tfrac12\sigma^2\big)\Delta t + \sigma\sqrt{\Delta t}\,Z_t\Big),\quad Z_t\sim\mathcal N(0,1)
//! $$
//!
//! Seeded geometric Brownian motion price tables on a weekday calendar.
//! Used by the demo binary and tests in place of a market-data provider.

use chrono::Datelike;
use chrono::NaiveDate;
use chrono::Weekday;
use ndarray::Array2;
use rand::rngs::StdRng;
use rand::Rng;
use rand::SeedableRng;
use rand_distr::StandardNormal;

use super::analyzer::TRADING_DAYS;
use super::data::PriceTable;
use super::source::PriceProvider;
use super::source::PriceRequest;
use crate::error::PortfolioError;
use crate::error::Result;

/// Annualized GBM parameters of one simulated ticker.
#[derive(Clone, Debug, PartialEq)]
pub struct SyntheticAsset {
  /// Column name of the simulated series.
  pub ticker: String,
  /// Annual drift.
  pub drift: f64,
  /// Annual volatility.
  pub volatility: f64,
  /// Price on the first date.
  pub initial_price: f64,
}

/// Weekdays in `[start, end]`.
pub fn weekdays(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
  start
    .iter_days()
    .take_while(|d| *d <= end)
    .filter(|d| !matches!(d.weekday(), Weekday::Sat | Weekday::Sun))
    .collect()
}

/// Simulate one price column per asset over `dates`.
pub fn simulate_price_table(
  assets: &[SyntheticAsset],
  dates: Vec<NaiveDate>,
  seed: u64,
) -> Result<PriceTable> {
  if let Some(asset) = assets
    .iter()
    .find(|a| !(a.volatility >= 0.0 && a.initial_price > 0.0 && a.drift.is_finite()))
  {
    return Err(PortfolioError::InvalidParameter(format!(
      "invalid GBM parameters for {}",
      asset.ticker
    )));
  }

  let dt = 1.0 / TRADING_DAYS;
  let mut rng = StdRng::seed_from_u64(seed);
  let mut prices = Array2::<f64>::zeros((dates.len(), assets.len()));

  for (j, asset) in assets.iter().enumerate() {
    let drift = (asset.drift - 0.5 * asset.volatility.powi(2)) * dt;
    let diffusion = asset.volatility * dt.sqrt();
    let mut price = asset.initial_price;

    for t in 0..dates.len() {
      if t > 0 {
        let z: f64 = rng.sample(StandardNormal);
        price *= (drift + diffusion * z).exp();
      }
      prices[[t, j]] = price;
    }
  }

  let tickers = assets.iter().map(|a| a.ticker.clone()).collect();
  PriceTable::new(tickers, dates, prices)
}

/// [`PriceProvider`] that simulates every requested ticker.
///
/// Parameters are spread deterministically over the ticker list so each
/// symbol gets a distinct risk/return profile.
#[derive(Clone, Debug)]
pub struct SyntheticProvider {
  seed: u64,
}

impl SyntheticProvider {
  /// Provider whose simulations all start from `seed`.
  pub fn new(seed: u64) -> Self {
    Self { seed }
  }

  /// GBM parameters assigned to each ticker, by position.
  pub fn assets_for(tickers: &[String]) -> Vec<SyntheticAsset> {
    tickers
      .iter()
      .enumerate()
      .map(|(i, ticker)| {
        let step = i as f64;
        SyntheticAsset {
          ticker: ticker.clone(),
          drift: 0.06 + 0.03 * (step % 4.0),
          volatility: 0.15 + 0.05 * (step % 3.0),
          initial_price: 100.0,
        }
      })
      .collect()
  }
}

impl PriceProvider for SyntheticProvider {
  fn fetch(&self, request: &PriceRequest) -> Result<PriceTable> {
    if request.tickers.is_empty() {
      return Err(PortfolioError::EmptyData("tickers"));
    }

    let dates = weekdays(request.start, request.end);
    simulate_price_table(&Self::assets_for(&request.tickers), dates, self.seed)
  }
}
