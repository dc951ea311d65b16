//! Provider records to canonical series and quotes.
//!
//! Bad records never fail a whole response: unparseable timestamps are
//! replaced with "now" and invalid candles are dropped, both reported on the
//! `marketdesk::data_quality` tracing target.

use std::collections::BTreeMap;

use tracing::warn;

use crate::provider::ProviderError;
use crate::{Bar, CanonicalSeries, ProviderBar, Quote, QuoteInputs, Symbol, UtcDateTime};

const DATA_QUALITY: &str = "marketdesk::data_quality";

pub fn normalize(bars: &[ProviderBar]) -> CanonicalSeries {
    normalize_at(bars, UtcDateTime::now())
}

/// Like [`normalize`] with a fixed substitute for unparseable timestamps.
pub fn normalize_at(bars: &[ProviderBar], now: UtcDateTime) -> CanonicalSeries {
    // Later records overwrite earlier ones on equal timestamps.
    let mut by_timestamp = BTreeMap::new();

    for (index, raw) in bars.iter().enumerate() {
        let timestamp = match raw.timestamp.parse() {
            Ok(timestamp) => timestamp,
            Err(error) => {
                warn!(
                    target: DATA_QUALITY,
                    index,
                    raw = ?raw.timestamp,
                    substitute = %now,
                    %error,
                    "unparseable bar timestamp replaced with current time"
                );
                now
            }
        };

        match Bar::new(timestamp, raw.open, raw.high, raw.low, raw.close, raw.volume) {
            Ok(bar) => {
                by_timestamp.insert(timestamp, bar);
            }
            Err(error) => {
                warn!(
                    target: DATA_QUALITY,
                    index,
                    %timestamp,
                    %error,
                    "invalid bar dropped"
                );
            }
        }
    }

    // BTreeMap iteration is ascending and unique, which is exactly the series invariant.
    CanonicalSeries::from_ordered(by_timestamp.into_values().collect()).unwrap_or_default()
}

/// Combine trade, latest bar and previous-session bar into a quote.
///
/// Price is the trade price, else the latest bar close. Previous close is the
/// previous bar close, else the latest bar open, else zero.
pub fn derive_quote(
    ticker: &Symbol,
    inputs: &QuoteInputs,
    now: UtcDateTime,
) -> Result<Quote, ProviderError> {
    let trade = inputs
        .trade
        .as_ref()
        .filter(|trade| trade.price.is_finite() && trade.price > 0.0);

    let (price, raw_timestamp) = match (trade, inputs.latest_bar.as_ref()) {
        (Some(trade), _) => (trade.price, Some(&trade.timestamp)),
        (None, Some(bar)) => (bar.close, Some(&bar.timestamp)),
        (None, None) => {
            return Err(ProviderError::not_found(format!(
                "no price available for {ticker}"
            )))
        }
    };

    let timestamp = match raw_timestamp.map(|raw| raw.parse()) {
        Some(Ok(timestamp)) => timestamp,
        Some(Err(error)) => {
            warn!(
                target: DATA_QUALITY,
                %ticker,
                %error,
                "unparseable quote timestamp replaced with current time"
            );
            now
        }
        None => now,
    };

    let previous_close = inputs
        .previous_bar
        .as_ref()
        .map(|bar| bar.close)
        .or_else(|| inputs.latest_bar.as_ref().map(|bar| bar.open))
        .filter(|value| value.is_finite() && *value >= 0.0)
        .unwrap_or(0.0);

    let stats = inputs.latest_bar.as_ref().or(inputs.previous_bar.as_ref());

    let quote = Quote::new(ticker.clone(), price, previous_close, timestamp)
        .map_err(|error| ProviderError::malformed(format!("{ticker} quote: {error}")))?;

    Ok(match stats {
        Some(bar) => quote.with_session_stats(Some(bar.open), Some(bar.high), Some(bar.low), bar.volume),
        None => quote,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::ProviderErrorKind;
    use crate::{LatestTrade, RawTimestamp};

    fn bar(ts: RawTimestamp, close: f64) -> ProviderBar {
        ProviderBar::new(ts, close, close + 1.0, close - 1.0, close, Some(100))
    }

    fn now() -> UtcDateTime {
        UtcDateTime::parse("2024-06-03T18:00:00Z").expect("valid")
    }

    #[test]
    fn sorts_out_of_order_input() {
        let series = normalize_at(
            &[
                bar(RawTimestamp::EpochSeconds(300), 12.0),
                bar(RawTimestamp::EpochSeconds(100), 10.0),
                bar(RawTimestamp::EpochSeconds(200), 11.0),
            ],
            now(),
        );
        let closes: Vec<f64> = series.bars().iter().map(|bar| bar.close).collect();
        assert_eq!(closes, vec![10.0, 11.0, 12.0]);
    }

    #[test]
    fn duplicate_timestamp_keeps_last_record() {
        let series = normalize_at(
            &[
                bar(RawTimestamp::EpochSeconds(100), 10.0),
                bar(RawTimestamp::EpochMillis(100_000), 20.0),
            ],
            now(),
        );
        assert_eq!(series.len(), 1);
        assert_eq!(series.bars()[0].close, 20.0);
    }

    #[test]
    fn invalid_bar_is_dropped() {
        let mut broken = bar(RawTimestamp::EpochSeconds(100), 10.0);
        broken.high = 5.0;
        let series = normalize_at(&[broken, bar(RawTimestamp::EpochSeconds(200), 11.0)], now());
        assert_eq!(series.len(), 1);
    }

    #[test]
    fn unparseable_timestamp_becomes_now() {
        let series = normalize_at(
            &[bar(RawTimestamp::Rfc3339(String::from("not-a-date")), 10.0)],
            now(),
        );
        assert_eq!(series.bars()[0].timestamp, now());
    }

    #[test]
    fn quote_prefers_trade_price() {
        let ticker = Symbol::parse("MSFT").expect("valid");
        let inputs = QuoteInputs {
            trade: Some(LatestTrade {
                price: 105.0,
                timestamp: RawTimestamp::EpochSeconds(1_717_430_400),
            }),
            latest_bar: Some(bar(RawTimestamp::EpochSeconds(1_717_430_000), 104.0)),
            previous_bar: Some(bar(RawTimestamp::EpochSeconds(1_717_340_000), 100.0)),
        };

        let quote = derive_quote(&ticker, &inputs, now()).expect("quote");
        assert_eq!(quote.price, 105.0);
        assert_eq!(quote.previous_close, 100.0);
        assert!((quote.change_percent - 5.0).abs() < 1e-9);
        assert_eq!(quote.open, Some(104.0));
    }

    #[test]
    fn quote_falls_back_to_bar_close_and_open() {
        let ticker = Symbol::parse("MSFT").expect("valid");
        let mut latest = bar(RawTimestamp::EpochSeconds(1_717_430_000), 104.0);
        latest.open = 102.0;
        let inputs = QuoteInputs {
            trade: None,
            latest_bar: Some(latest),
            previous_bar: None,
        };

        let quote = derive_quote(&ticker, &inputs, now()).expect("quote");
        assert_eq!(quote.price, 104.0);
        assert_eq!(quote.previous_close, 102.0);
    }

    #[test]
    fn quote_without_any_price_is_not_found() {
        let ticker = Symbol::parse("ZZZZ").expect("valid");
        let error = derive_quote(&ticker, &QuoteInputs::default(), now()).expect_err("must fail");
        assert_eq!(error.kind(), ProviderErrorKind::NotFound);
    }
}
