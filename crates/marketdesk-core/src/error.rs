use thiserror::Error;

/// Validation and contract errors exposed by `marketdesk-core`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("symbol cannot be empty")]
    EmptySymbol,
    #[error("symbol length {len} exceeds max {max}")]
    SymbolTooLong { len: usize, max: usize },
    #[error("symbol must start with an ASCII letter: '{ch}'")]
    SymbolInvalidStart { ch: char },
    #[error("symbol contains invalid character '{ch}' at index {index}")]
    SymbolInvalidChar { ch: char, index: usize },

    #[error("invalid provider '{value}', expected one of alpaca, polygon, finnhub, synthetic")]
    InvalidProvider { value: String },

    #[error("timestamp must be RFC3339 or epoch based: '{value}'")]
    InvalidTimestamp { value: String },

    #[error("field '{field}' must be finite")]
    NonFiniteValue { field: &'static str },
    #[error("field '{field}' must be positive")]
    NonPositiveValue { field: &'static str },

    #[error("bar high must be >= low")]
    InvalidBarRange,
    #[error("bar open/close must be within high/low range")]
    InvalidBarBounds,
    #[error("series timestamps must be strictly increasing (index {index})")]
    UnorderedSeries { index: usize },
    #[error("range start must be before range end")]
    InvalidWindow,

    #[error("api token cannot be empty")]
    EmptyCredential,

    #[error("quantity must be a positive whole number: '{value}'")]
    InvalidQuantity { value: String },
    #[error("order side must be buy or sell: '{value}'")]
    InvalidOrderSide { value: String },
}

/// Top-level error type for core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Provider(#[from] crate::provider::ProviderError),

    #[error(transparent)]
    Config(#[from] crate::config::ConfigError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
