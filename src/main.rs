use anyhow::bail;
use anyhow::Result;
use clap::Parser;
use stochastic_portfolio::portfolio::engine::DEFAULT_RISK_FREE_RATE;
use stochastic_portfolio::portfolio::load_or_fetch;
use stochastic_portfolio::portfolio::source::parse_tickers;
use stochastic_portfolio::portfolio::synthetic::SyntheticProvider;
use stochastic_portfolio::portfolio::MemoryStore;
use stochastic_portfolio::portfolio::PortfolioEngine;
use stochastic_portfolio::portfolio::PortfolioEngineConfig;
use stochastic_portfolio::portfolio::PriceRequest;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Analyze and optimize a long-only portfolio over simulated daily prices.
///
/// Prices come from a seeded GBM provider behind an in-process cache that
/// lives for a single run, so every invocation fetches fresh data.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
  /// Comma separated ticker symbols.
  #[arg(long, default_value = "AAPL,MSFT,GOOG")]
  tickers: String,
  /// Years of history ending today.
  #[arg(long, default_value_t = 5.0)]
  years: f64,
  /// Annual risk-free rate used in Sharpe ratios.
  #[arg(long, default_value_t = DEFAULT_RISK_FREE_RATE)]
  risk_free: f64,
  /// VaR confidence level.
  #[arg(long, default_value_t = 0.95)]
  confidence: f64,
  /// Random portfolios drawn for the frontier.
  #[arg(long, default_value_t = 10_000)]
  samples: usize,
  /// Seed for the simulated prices and the frontier draws.
  #[arg(long, default_value_t = 42)]
  seed: u64,
}

fn main() -> Result<()> {
  tracing_subscriber::registry()
    .with(tracing_subscriber::fmt::layer().with_target(false))
    .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .init();

  let cli = Cli::parse();
  let tickers = parse_tickers(&cli.tickers);
  if tickers.is_empty() {
    bail!("no tickers given");
  }

  let today = chrono::Local::now().date_naive();
  let request = PriceRequest::trailing_years(tickers, cli.years, today)?;
  info!(tickers = ?request.tickers, start = %request.start, end = %request.end, "loading prices");

  let store = MemoryStore::default();
  let (prices, origin) = load_or_fetch(&store, &SyntheticProvider::new(cli.seed), &request)?;
  info!(?origin, rows = prices.len(), "prices ready");

  let engine = PortfolioEngine::new(PortfolioEngineConfig {
    risk_free: cli.risk_free,
    var_confidence: cli.confidence,
    frontier_samples: cli.samples,
    frontier_seed: Some(cli.seed),
    ..PortfolioEngineConfig::default()
  });
  let report = engine.analyze(&prices, None)?;
  println!("{report}");

  Ok(())
}
