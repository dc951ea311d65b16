//! # Domain Models
//!
//! Canonical market-data types shared by the resolver, adapters and desk.
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Symbol`] | Validated ticker |
//! | [`UtcDateTime`] | UTC instant |
//! | [`SymbolicRange`] | Dashboard range label (`1D` .. `MAX`) |
//! | [`RangeSpec`] | Resolved resolution + window |
//! | [`BarResolution`] | Bar granularity |
//! | [`Bar`] / [`CanonicalSeries`] | Validated candles, strictly ordered |
//! | [`Quote`] | Price snapshot with derived change |
//! | [`ProviderBar`] / [`RawTimestamp`] | Upstream records before normalization |
//!
//! Construction validates invariants:
//!
//! ```rust
//! use marketdesk_core::{Bar, UtcDateTime, ValidationError};
//!
//! let ts = UtcDateTime::parse("2024-01-02T14:30:00Z").unwrap();
//! let invalid = Bar::new(ts, 100.0, 95.0, 105.0, 102.0, Some(1000));
//! assert!(matches!(invalid, Err(ValidationError::InvalidBarRange)));
//! ```

mod models;
mod range;
mod raw;
mod resolution;
mod symbol;
mod timestamp;

pub use models::{Bar, CanonicalSeries, Quote};
pub use range::{RangeSpec, SymbolicRange};
pub use raw::{LatestTrade, ProviderBar, QuoteInputs, RawTimestamp};
pub use resolution::BarResolution;
pub use symbol::Symbol;
pub use timestamp::UtcDateTime;
