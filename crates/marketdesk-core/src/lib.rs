//! # Marketdesk Core
//!
//! Market-data layer for the marketdesk dashboard.
//!
//! ## Overview
//!
//! - **Range resolution**: `1D`/`1W`/`1M`/`3M`/`1Y`/`MAX` become a concrete
//!   window and bar resolution aligned to New York market hours
//! - **Provider adapters** for Alpaca, Polygon, Finnhub and an offline
//!   synthetic generator behind one capability trait
//! - **Normalization** of heterogeneous provider bars into one canonical,
//!   ascending OHLCV series
//! - **Live updates** through a cancellable poller and a Finnhub trade socket
//! - **Market desk**: the view state a dashboard renders, with stale-response
//!   protection and simulated orders
//!
//! ## Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`adapters`] | Provider adapters (Alpaca, Polygon, Finnhub, synthetic) |
//! | [`config`] | Environment configuration and provider selection |
//! | [`desk`] | View state for one ticker, search and range switching |
//! | [`domain`] | Symbols, timestamps, ranges, bars, series, quotes |
//! | [`error`] | Validation and wrapper errors |
//! | [`http_client`] | HTTP transport abstraction |
//! | [`market_hours`] | New York exchange clock |
//! | [`normalizer`] | Provider bars to canonical series, quote derivation |
//! | [`order`] | Simulated order pricing |
//! | [`poller`] | Repeating quote fetch with cancellation |
//! | [`provider`] | Provider trait and error taxonomy |
//! | [`provider_policy`] | Per-provider request budgets and timeouts |
//! | [`resolver`] | Symbolic range to concrete window |
//! | [`session`] | API credential lifecycle |
//! | [`source`] | Provider identifiers |
//! | [`stream`] | Trade socket connection manager |
//! | [`throttling`] | Client-side rate limiting |
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use marketdesk_core::{normalize, resolve, MarketDataProvider, Symbol, SymbolicRange, SyntheticProvider, UtcDateTime};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let provider = SyntheticProvider::default();
//!     let ticker = Symbol::parse("AAPL")?;
//!     let range = resolve(SymbolicRange::OneMonth, UtcDateTime::now());
//!
//!     let series = normalize(&provider.fetch_bars(&ticker, &range).await?);
//!     if let Some(bar) = series.last() {
//!         println!("AAPL close: ${:.2}", bar.close);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Error Handling
//!
//! ```rust
//! use marketdesk_core::{ProviderError, ProviderErrorKind};
//!
//! fn handle_error(error: ProviderError) {
//!     match error.kind() {
//!         ProviderErrorKind::RateLimited => {
//!             // Wait for the next poll tick
//!         }
//!         ProviderErrorKind::Unauthorized => {
//!             // Ask for new credentials
//!         }
//!         _ => eprintln!("{}", error.user_message()),
//!     }
//! }
//! ```

pub mod adapters;
pub mod config;
pub mod desk;
pub mod domain;
pub mod error;
pub mod http_client;
pub mod market_hours;
pub mod normalizer;
pub mod order;
pub mod poller;
pub mod provider;
pub mod provider_policy;
pub mod resolver;
pub mod session;
pub mod source;
pub mod stream;
pub mod throttling;

// Adapter implementations
pub use adapters::{base_price, AlpacaAdapter, FinnhubAdapter, PolygonAdapter, SyntheticProvider};

// Configuration
pub use config::{Config, ConfigError};

// Desk
pub use desk::{DeskError, DeskSnapshot, LoadOutcome, MarketDesk};

// Domain models
pub use domain::{
    Bar, BarResolution, CanonicalSeries, LatestTrade, ProviderBar, Quote, QuoteInputs, RangeSpec,
    RawTimestamp, Symbol, SymbolicRange, UtcDateTime,
};

// Error types
pub use error::{CoreError, ValidationError};

// HTTP client types
pub use http_client::{
    HttpAuth, HttpClient, HttpError, HttpErrorKind, HttpFuture, HttpRequest, HttpResponse,
    ReqwestHttpClient, ScriptedHttpClient,
};

// Normalization
pub use normalizer::{derive_quote, normalize, normalize_at};

// Orders
pub use order::{parse_quantity, simulate_fill, OrderSide, SimulatedFill};

// Polling
pub use poller::{PollHandle, Poller};

// Provider trait and errors
pub use provider::{ErrorContext, MarketDataProvider, ProviderError, ProviderErrorKind, ProviderFuture};

// Provider policies
pub use provider_policy::ProviderPolicy;

// Range resolution
pub use resolver::{resolve, resolve_label, subtract_months, PollIntervals};

// Session
pub use session::{ApiToken, SessionStore};

// Source identifiers
pub use source::ProviderId;

// Trade stream
pub use stream::{
    ControlFrame, ReconnectPolicy, StreamConfig, TradeStreamManager, TradeSubscription, TradeTick,
};

// Throttling
pub use throttling::RequestBudget;
