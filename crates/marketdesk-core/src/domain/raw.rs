use serde::{Deserialize, Serialize};

use crate::{Bar, UtcDateTime, ValidationError};

/// Timestamp exactly as an upstream delivered it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum RawTimestamp {
    Rfc3339(String),
    EpochSeconds(i64),
    EpochMillis(i64),
    EpochNanos(i128),
}

impl RawTimestamp {
    pub fn parse(&self) -> Result<UtcDateTime, ValidationError> {
        match self {
            Self::Rfc3339(text) => UtcDateTime::parse(text),
            Self::EpochSeconds(seconds) => UtcDateTime::from_unix_seconds(*seconds),
            Self::EpochMillis(millis) => UtcDateTime::from_unix_millis(*millis),
            Self::EpochNanos(nanos) => UtcDateTime::from_unix_nanos(*nanos),
        }
    }
}

impl From<UtcDateTime> for RawTimestamp {
    fn from(value: UtcDateTime) -> Self {
        Self::EpochNanos(value.into_inner().unix_timestamp_nanos())
    }
}

/// Provider-native bar record, not yet validated or ordered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderBar {
    pub timestamp: RawTimestamp,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: Option<u64>,
}

impl ProviderBar {
    pub fn new(
        timestamp: RawTimestamp,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: Option<u64>,
    ) -> Self {
        Self {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
        }
    }
}

impl From<Bar> for ProviderBar {
    fn from(bar: Bar) -> Self {
        Self::new(
            bar.timestamp.into(),
            bar.open,
            bar.high,
            bar.low,
            bar.close,
            bar.volume,
        )
    }
}

/// Last reported trade print.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatestTrade {
    pub price: f64,
    pub timestamp: RawTimestamp,
}

/// Provider-neutral ingredients a quote is derived from.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct QuoteInputs {
    pub trade: Option<LatestTrade>,
    pub latest_bar: Option<ProviderBar>,
    pub previous_bar: Option<ProviderBar>,
}
