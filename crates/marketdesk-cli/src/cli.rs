//! CLI argument definitions for marketdesk.
//!
//! # Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `check` | Provider connectivity check |
//! | `quote` | Latest quote for a ticker |
//! | `bars` | Canonical OHLCV series for a range |
//! | `watch` | Poll quotes at the range's cadence |
//! | `stream` | Trades from the Finnhub socket |
//! | `order` | Simulated order against the live quote |
//!
//! # Global Options
//!
//! | Option | Default | Description |
//! |--------|---------|-------------|
//! | `--provider` | from environment | Market data provider |
//! | `--token` | `MARKETDESK_API_TOKEN` | Session credential |
//! | `--pretty` | `false` | Pretty-print JSON output |
//!
//! # Examples
//!
//! ```bash
//! marketdesk quote AAPL
//! marketdesk bars MSFT --range 1Y --pretty
//! marketdesk --provider synthetic watch TSLA --range 1D --ticks 5
//! marketdesk --token "$TOKEN" order IBM --side buy --quantity 10
//! ```

use clap::{Args, Parser, Subcommand, ValueEnum};
use marketdesk_core::{OrderSide, ProviderId};

/// Market data desk: quotes, charts and simulated orders.
#[derive(Debug, Parser)]
#[command(
    name = "marketdesk",
    author,
    version,
    about = "Market data desk: quotes, ranged OHLCV series and simulated orders",
    long_about = "marketdesk resolves chart ranges (1D, 1W, 1M, 3M, 1Y, MAX) against New York \
market hours, fetches bars and quotes from Alpaca, Polygon, Finnhub or an offline synthetic \
generator, and prints one canonical JSON envelope per command.\n\
\n\
Credentials are read from MARKETDESK_* environment variables or a .env file."
)]
pub struct Cli {
    /// Market data provider; defaults to the first one with credentials.
    #[arg(long, global = true, value_enum)]
    pub provider: Option<ProviderSelector>,

    /// API token for the session (overrides MARKETDESK_API_TOKEN).
    #[arg(long, global = true)]
    pub token: Option<String>,

    /// Pretty-print JSON output with indentation.
    #[arg(long, global = true, default_value_t = false)]
    pub pretty: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ProviderSelector {
    Alpaca,
    Polygon,
    Finnhub,
    /// Offline seeded random walk.
    #[value(alias = "mock")]
    Synthetic,
}

impl From<ProviderSelector> for ProviderId {
    fn from(value: ProviderSelector) -> Self {
        match value {
            ProviderSelector::Alpaca => Self::Alpaca,
            ProviderSelector::Polygon => Self::Polygon,
            ProviderSelector::Finnhub => Self::Finnhub,
            ProviderSelector::Synthetic => Self::Synthetic,
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Check that the provider answers.
    Check,

    /// Fetch the latest quote.
    ///
    ///   marketdesk quote AAPL
    Quote(QuoteArgs),

    /// Fetch the canonical bar series for a range.
    ///
    ///   marketdesk bars AAPL --range 3M
    Bars(BarsArgs),

    /// Poll quotes at the cadence of a range (2 s intraday, 60 s otherwise).
    Watch(WatchArgs),

    /// Collect trades from the Finnhub socket.
    Stream(StreamArgs),

    /// Price a simulated order. Requires a session token.
    Order(OrderArgs),
}

#[derive(Debug, Args)]
pub struct QuoteArgs {
    pub symbol: String,
}

#[derive(Debug, Args)]
pub struct BarsArgs {
    pub symbol: String,

    /// Range label; unknown labels fall back to 1M.
    #[arg(long, default_value = "1M")]
    pub range: String,
}

#[derive(Debug, Args)]
pub struct WatchArgs {
    pub symbol: String,

    #[arg(long, default_value = "1D")]
    pub range: String,

    /// Number of price updates to collect.
    #[arg(long, default_value_t = 3, value_parser = clap::value_parser!(u32).range(1..))]
    pub ticks: u32,
}

#[derive(Debug, Args)]
pub struct StreamArgs {
    pub symbol: String,

    /// Number of trades to collect.
    #[arg(long, default_value_t = 10)]
    pub trades: usize,

    /// Give up after this many seconds.
    #[arg(long, default_value_t = 30)]
    pub timeout_secs: u64,
}

#[derive(Debug, Args)]
pub struct OrderArgs {
    pub symbol: String,

    #[arg(long, value_enum)]
    pub side: SideArg,

    /// Whole number of shares.
    #[arg(long)]
    pub quantity: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SideArg {
    Buy,
    Sell,
}

impl From<SideArg> for OrderSide {
    fn from(value: SideArg) -> Self {
        match value {
            SideArg::Buy => Self::Buy,
            SideArg::Sell => Self::Sell,
        }
    }
}
