use serde::{Deserialize, Serialize};

use crate::{Symbol, UtcDateTime, ValidationError};

/// One OHLCV candle in canonical form.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: UtcDateTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: Option<u64>,
}

impl Bar {
    pub fn new(
        timestamp: UtcDateTime,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: Option<u64>,
    ) -> Result<Self, ValidationError> {
        validate_positive("open", open)?;
        validate_positive("high", high)?;
        validate_positive("low", low)?;
        validate_positive("close", close)?;

        if high < low {
            return Err(ValidationError::InvalidBarRange);
        }

        if open < low || open > high || close < low || close > high {
            return Err(ValidationError::InvalidBarBounds);
        }

        Ok(Self {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
        })
    }
}

/// Bars ordered strictly by timestamp. Empty means "no data".
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(try_from = "Vec<Bar>", into = "Vec<Bar>")]
pub struct CanonicalSeries {
    bars: Vec<Bar>,
}

impl CanonicalSeries {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Accepts bars that are already strictly increasing by timestamp.
    pub fn from_ordered(bars: Vec<Bar>) -> Result<Self, ValidationError> {
        if let Some(index) = bars
            .windows(2)
            .position(|pair| pair[0].timestamp >= pair[1].timestamp)
        {
            return Err(ValidationError::UnorderedSeries { index: index + 1 });
        }

        Ok(Self { bars })
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn first(&self) -> Option<&Bar> {
        self.bars.first()
    }

    pub fn last(&self) -> Option<&Bar> {
        self.bars.last()
    }

    pub fn into_bars(self) -> Vec<Bar> {
        self.bars
    }
}

impl TryFrom<Vec<Bar>> for CanonicalSeries {
    type Error = ValidationError;

    fn try_from(value: Vec<Bar>) -> Result<Self, Self::Error> {
        Self::from_ordered(value)
    }
}

impl From<CanonicalSeries> for Vec<Bar> {
    fn from(value: CanonicalSeries) -> Self {
        value.bars
    }
}

/// Point-in-time quote snapshot. A new value is produced on every poll.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub ticker: Symbol,
    pub price: f64,
    pub timestamp: UtcDateTime,
    pub change: f64,
    pub change_percent: f64,
    pub previous_close: f64,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub volume: Option<u64>,
}

impl Quote {
    /// Builds a quote and derives `change`/`change_percent` from `previous_close`.
    pub fn new(
        ticker: Symbol,
        price: f64,
        previous_close: f64,
        timestamp: UtcDateTime,
    ) -> Result<Self, ValidationError> {
        validate_positive("price", price)?;
        validate_non_negative("previous_close", previous_close)?;

        let change = price - previous_close;
        let change_percent = if previous_close == 0.0 {
            0.0
        } else {
            let percent = change / previous_close * 100.0;
            if percent.is_finite() {
                percent
            } else {
                0.0
            }
        };

        Ok(Self {
            ticker,
            price,
            timestamp,
            change,
            change_percent,
            previous_close,
            open: None,
            high: None,
            low: None,
            volume: None,
        })
    }

    pub fn with_session_stats(
        mut self,
        open: Option<f64>,
        high: Option<f64>,
        low: Option<f64>,
        volume: Option<u64>,
    ) -> Self {
        self.open = open.filter(|value| value.is_finite());
        self.high = high.filter(|value| value.is_finite());
        self.low = low.filter(|value| value.is_finite());
        self.volume = volume;
        self
    }
}

fn validate_positive(field: &'static str, value: f64) -> Result<(), ValidationError> {
    if !value.is_finite() {
        return Err(ValidationError::NonFiniteValue { field });
    }
    if value <= 0.0 {
        return Err(ValidationError::NonPositiveValue { field });
    }
    Ok(())
}

fn validate_non_negative(field: &'static str, value: f64) -> Result<(), ValidationError> {
    if !value.is_finite() {
        return Err(ValidationError::NonFiniteValue { field });
    }
    if value < 0.0 {
        return Err(ValidationError::NonPositiveValue { field });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(value: &str) -> UtcDateTime {
        UtcDateTime::parse(value).expect("valid timestamp")
    }

    #[test]
    fn bar_rejects_close_above_high() {
        let err = Bar::new(ts("2024-01-02T14:30:00Z"), 10.0, 11.0, 9.0, 12.0, None)
            .expect_err("must fail");
        assert_eq!(err, ValidationError::InvalidBarBounds);
    }

    #[test]
    fn bar_rejects_zero_price() {
        let err = Bar::new(ts("2024-01-02T14:30:00Z"), 0.0, 11.0, 0.0, 10.0, None)
            .expect_err("must fail");
        assert!(matches!(err, ValidationError::NonPositiveValue { field: "open" }));
    }

    #[test]
    fn series_rejects_duplicate_timestamps() {
        let bar = Bar::new(ts("2024-01-02T14:30:00Z"), 10.0, 11.0, 9.0, 10.5, Some(5))
            .expect("valid bar");
        let err = CanonicalSeries::from_ordered(vec![bar, bar]).expect_err("must fail");
        assert_eq!(err, ValidationError::UnorderedSeries { index: 1 });
    }

    #[test]
    fn quote_derives_change_from_previous_close() {
        let ticker = Symbol::parse("AAPL").expect("valid symbol");
        let quote = Quote::new(ticker, 110.0, 100.0, ts("2024-01-02T15:00:00Z")).expect("quote");
        assert!((quote.change - 10.0).abs() < 1e-9);
        assert!((quote.change_percent - 10.0).abs() < 1e-9);
    }

    #[test]
    fn quote_with_zero_previous_close_has_zero_percent() {
        let ticker = Symbol::parse("NEWCO").expect("valid symbol");
        let quote = Quote::new(ticker, 12.5, 0.0, ts("2024-01-02T15:00:00Z")).expect("quote");
        assert_eq!(quote.change_percent, 0.0);
        assert_eq!(quote.change, 12.5);
    }
}
