//! # Price Sources
//!
//! $$
//! \text{load}(q)\ \|\ \text{fetch}(q)\ \to\ P_{t,i}
//! $$
//!
//! Seams to the data collaborators outside the core: a provider that fetches
//! price history and a store that caches it. A missing cache entry is
//! reported as [`PortfolioError::NotFound`], which is the only error that
//! triggers a fresh fetch.

use std::cell::RefCell;
use std::collections::HashMap;

use chrono::NaiveDate;
use chrono::TimeDelta;
use impl_new_derive::ImplNew;
use tracing::info;

use super::data::PriceTable;
use crate::error::PortfolioError;
use crate::error::Result;

/// Tickers and date window to load.
#[derive(ImplNew, Clone, Debug, PartialEq, Eq, Hash)]
pub struct PriceRequest {
  /// Ticker symbols, in the column order wanted.
  pub tickers: Vec<String>,
  /// First date, inclusive.
  pub start: NaiveDate,
  /// Last date, inclusive.
  pub end: NaiveDate,
}

impl PriceRequest {
  /// Window of `years` (365-day years) ending at `end`.
  pub fn trailing_years(tickers: Vec<String>, years: f64, end: NaiveDate) -> Result<Self> {
    if tickers.is_empty() {
      return Err(PortfolioError::EmptyData("tickers"));
    }
    if !(years.is_finite() && years > 0.0) {
      return Err(PortfolioError::InvalidParameter(format!(
        "history length must be a positive number of years, got {years}"
      )));
    }

    let start = TimeDelta::try_days((365.0 * years).round() as i64)
      .and_then(|window| end.checked_sub_signed(window))
      .ok_or_else(|| {
        PortfolioError::InvalidParameter(format!("{years} years of history runs past the calendar"))
      })?;
    Ok(Self::new(tickers, start, end))
  }

  /// Cache key, stable across ticker order.
  fn key(&self) -> String {
    let mut tickers = self.tickers.clone();
    tickers.sort();
    format!("{}:{}:{}", tickers.join(","), self.start, self.end)
  }
}

/// Upstream source of historical prices.
pub trait PriceProvider {
  fn fetch(&self, request: &PriceRequest) -> Result<PriceTable>;
}

/// Cache of previously fetched price tables.
pub trait PriceStore {
  /// Fails with [`PortfolioError::NotFound`] when nothing is cached for `request`.
  fn load(&self, request: &PriceRequest) -> Result<PriceTable>;
  fn store(&self, request: &PriceRequest, table: &PriceTable) -> Result<()>;
}

/// Where [`load_or_fetch`] found its table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PriceOrigin {
  Cache,
  Provider,
}

/// Load from the store, falling back to the provider on a cache miss.
///
/// Fresh tables are written back to the store. Any store error other than
/// `NotFound` (a corrupt or invalid entry) is returned as is.
pub fn load_or_fetch<S, P>(
  store: &S,
  provider: &P,
  request: &PriceRequest,
) -> Result<(PriceTable, PriceOrigin)>
where
  S: PriceStore + ?Sized,
  P: PriceProvider + ?Sized,
{
  match store.load(request) {
    Ok(table) => {
      info!(rows = table.len(), "loaded saved data");
      Ok((table, PriceOrigin::Cache))
    }
    Err(PortfolioError::NotFound(_)) => {
      let table = provider.fetch(request)?;
      store.store(request, &table)?;
      info!(rows = table.len(), "fetched new data");
      Ok((table, PriceOrigin::Provider))
    }
    Err(err) => Err(err),
  }
}

/// In-process [`PriceStore`] keyed by request.
#[derive(Debug, Default)]
pub struct MemoryStore {
  tables: RefCell<HashMap<String, PriceTable>>,
}

impl MemoryStore {
  /// Number of cached tables.
  pub fn len(&self) -> usize {
    self.tables.borrow().len()
  }

  /// True when nothing is cached.
  pub fn is_empty(&self) -> bool {
    self.tables.borrow().is_empty()
  }
}

impl PriceStore for MemoryStore {
  fn load(&self, request: &PriceRequest) -> Result<PriceTable> {
    let key = request.key();
    self
      .tables
      .borrow()
      .get(&key)
      .cloned()
      .ok_or(PortfolioError::NotFound(key))
  }

  fn store(&self, request: &PriceRequest, table: &PriceTable) -> Result<()> {
    if table.is_empty() {
      return Err(PortfolioError::EmptyData("price table"));
    }
    self.tables.borrow_mut().insert(request.key(), table.clone());
    Ok(())
  }
}

/// Split comma separated tickers, trimming and upper-casing each, dropping blanks.
pub fn parse_tickers(input: &str) -> Vec<String> {
  input
    .split(',')
    .map(str::trim)
    .filter(|t| !t.is_empty())
    .map(str::to_uppercase)
    .collect()
}
