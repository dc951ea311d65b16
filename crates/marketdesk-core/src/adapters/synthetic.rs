use time::macros::time;
use time::{Date, Weekday};

use super::symbol_seed;
use crate::market_hours::{
    exchange_local_to_utc, is_trading_day, session_close_on, session_open_on, to_exchange_time,
};
use crate::normalizer::derive_quote;
use crate::provider::{MarketDataProvider, ProviderError, ProviderFuture};
use crate::resolver::resolve;
use crate::{
    BarResolution, ProviderBar, ProviderId, Quote, QuoteInputs, RangeSpec, Symbol, SymbolicRange,
    UtcDateTime,
};

pub const DEFAULT_SEED: u64 = 42;
const MAX_BARS: usize = 1_000;
const DEFAULT_BASE_PRICE: f64 = 100.0;

/// Reference price the walk for `ticker` starts around.
pub fn base_price(ticker: &Symbol) -> f64 {
    match ticker.as_str() {
        "AAPL" => 180.5,
        "MSFT" => 340.2,
        "AMZN" => 135.7,
        "GOOGL" => 140.8,
        "META" => 300.5,
        "TSLA" => 220.3,
        "NVDA" => 450.9,
        "AMD" => 120.4,
        "INTC" => 35.8,
        "IBM" => 145.6,
        _ => DEFAULT_BASE_PRICE,
    }
}

/// Offline provider producing a seeded random walk per ticker.
///
/// Output is a pure function of `(seed, ticker, range)`. Bars sit on the
/// resolution grid: intraday bars only inside the regular session, daily bars
/// only on weekdays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyntheticProvider {
    seed: u64,
}

impl Default for SyntheticProvider {
    fn default() -> Self {
        Self::new(DEFAULT_SEED)
    }
}

impl SyntheticProvider {
    pub const fn new(seed: u64) -> Self {
        Self { seed }
    }

    pub const fn seed(&self) -> u64 {
        self.seed
    }

    pub fn bars_for(&self, ticker: &Symbol, range: &RangeSpec) -> Vec<ProviderBar> {
        let grid = grid(range);
        let mut rng = fastrand::Rng::with_seed(
            self.seed ^ symbol_seed(ticker) ^ range.start.unix_seconds() as u64,
        );
        let volatility = volatility(range.resolution);
        let bias = (rng.f64() - 0.5) * 0.2;
        let mut price = base_price(ticker) * (1.0 + (rng.f64() - 0.5) * 0.2);

        grid.into_iter()
            .map(|timestamp| {
                let open = price;
                let movement = (rng.f64() - 0.5 + bias) * 2.0 * volatility * open;
                let close = (open + movement).max(0.01);
                let high = open.max(close) * (1.0 + rng.f64() * volatility / 2.0);
                let low = (open.min(close) * (1.0 - rng.f64() * volatility / 2.0)).max(0.005);
                price = close;

                ProviderBar::new(
                    timestamp.into(),
                    open,
                    high,
                    low,
                    close,
                    Some(rng.u64(100_000..10_100_000)),
                )
            })
            .collect()
    }

    pub fn quote_at(&self, ticker: &Symbol, now: UtcDateTime) -> Result<Quote, ProviderError> {
        let session = resolve(SymbolicRange::OneDay, now);
        let bars = self.bars_for(ticker, &session);

        let previous_bar = bars.first().map(|first| {
            let mut rng = fastrand::Rng::with_seed(self.seed ^ symbol_seed(ticker));
            let close = first.open * (1.0 + (rng.f64() - 0.5) * 0.03);
            let timestamp = session.start - time::Duration::days(1);
            ProviderBar::new(timestamp.into(), close, close, close, close, None)
        });

        // No trade feed here; the quote always takes the latest-bar path.
        derive_quote(
            ticker,
            &QuoteInputs {
                trade: None,
                latest_bar: bars.last().cloned(),
                previous_bar,
            },
            now,
        )
    }
}

impl MarketDataProvider for SyntheticProvider {
    fn id(&self) -> ProviderId {
        ProviderId::Synthetic
    }

    fn check_connectivity<'a>(&'a self) -> ProviderFuture<'a, bool> {
        Box::pin(async move { true })
    }

    fn fetch_quote<'a>(&'a self, ticker: &'a Symbol) -> ProviderFuture<'a, Result<Quote, ProviderError>> {
        Box::pin(async move { self.quote_at(ticker, UtcDateTime::now()) })
    }

    fn fetch_bars<'a>(
        &'a self,
        ticker: &'a Symbol,
        range: &'a RangeSpec,
    ) -> ProviderFuture<'a, Result<Vec<ProviderBar>, ProviderError>> {
        Box::pin(async move {
            let bars = self.bars_for(ticker, range);
            if bars.is_empty() {
                return Err(ProviderError::not_found(format!(
                    "no synthetic bars for {ticker} in the requested window"
                )));
            }
            Ok(bars)
        })
    }
}

fn volatility(resolution: BarResolution) -> f64 {
    match resolution {
        BarResolution::Minutes(_) => 0.002,
        BarResolution::Hours(_) => 0.004,
        BarResolution::Day => 0.012,
        BarResolution::Week => 0.03,
        BarResolution::Month => 0.06,
    }
}

/// Bar timestamps inside `range`, newest `MAX_BARS` kept.
fn grid(range: &RangeSpec) -> Vec<UtcDateTime> {
    let first_day = to_exchange_time(range.start).date();
    let last_day = to_exchange_time(range.end).date();
    let mut stamps = Vec::new();

    let mut day = Some(first_day);
    while let Some(date) = day.filter(|date| *date <= last_day) {
        stamps.extend(
            stamps_on(date, range.resolution)
                .into_iter()
                .filter(|stamp| range.contains(*stamp)),
        );
        day = date.next_day();
    }

    if stamps.len() > MAX_BARS {
        stamps.drain(..stamps.len() - MAX_BARS);
    }
    stamps
}

fn stamps_on(date: Date, resolution: BarResolution) -> Vec<UtcDateTime> {
    let midnight = || exchange_local_to_utc(date, time!(00:00));

    match resolution {
        BarResolution::Minutes(_) | BarResolution::Hours(_) => {
            if !is_trading_day(date) {
                return Vec::new();
            }
            let Some(step) = resolution.step() else {
                return Vec::new();
            };
            let close = session_close_on(date);
            let mut stamp = session_open_on(date);
            let mut stamps = Vec::new();
            while stamp < close {
                stamps.push(stamp);
                stamp = stamp + step;
            }
            stamps
        }
        BarResolution::Day if is_trading_day(date) => vec![midnight()],
        BarResolution::Week if date.weekday() == Weekday::Monday => vec![midnight()],
        BarResolution::Month if date.day() == 1 => vec![midnight()],
        BarResolution::Day | BarResolution::Week | BarResolution::Month => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;
    use crate::market_hours::is_regular_session;
    use crate::normalizer::normalize_at;

    fn ticker(value: &str) -> Symbol {
        Symbol::parse(value).expect("valid symbol")
    }

    #[test]
    fn intraday_bars_stay_inside_the_session() {
        let now = UtcDateTime::from(datetime!(2024-07-09 18:02 UTC));
        let range = resolve(SymbolicRange::OneDay, now);
        let bars = SyntheticProvider::default().bars_for(&ticker("AAPL"), &range);

        // 13:30Z through 18:00Z on a 5 minute grid.
        assert_eq!(bars.len(), 55);
        let series = normalize_at(&bars, now);
        assert_eq!(series.len(), bars.len());
        assert!(series.bars().iter().all(|bar| is_regular_session(bar.timestamp)));
    }

    #[test]
    fn daily_bars_skip_weekends() {
        let now = UtcDateTime::from(datetime!(2024-07-15 12:00 UTC));
        let range = resolve(SymbolicRange::OneMonth, now);
        let bars = SyntheticProvider::default().bars_for(&ticker("MSFT"), &range);
        let series = normalize_at(&bars, now);

        assert!(!series.is_empty());
        for bar in series.bars() {
            let weekday = to_exchange_time(bar.timestamp).weekday();
            assert!(!matches!(weekday, Weekday::Saturday | Weekday::Sunday));
        }
    }

    #[test]
    fn same_seed_same_walk() {
        let now = UtcDateTime::from(datetime!(2024-07-15 12:00 UTC));
        let range = resolve(SymbolicRange::OneYear, now);
        let a = SyntheticProvider::new(7).bars_for(&ticker("TSLA"), &range);
        let b = SyntheticProvider::new(7).bars_for(&ticker("TSLA"), &range);
        let c = SyntheticProvider::new(8).bars_for(&ticker("TSLA"), &range);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn quote_starts_near_base_price() {
        let now = UtcDateTime::from(datetime!(2024-07-09 18:02 UTC));
        let quote = SyntheticProvider::default()
            .quote_at(&ticker("INTC"), now)
            .expect("quote");

        assert!(quote.price > 35.8 * 0.7 && quote.price < 35.8 * 1.3, "{}", quote.price);
        assert!(quote.previous_close > 0.0);
        assert!(quote.change_percent.is_finite());
    }

    #[test]
    fn unknown_ticker_uses_default_base() {
        assert_eq!(base_price(&ticker("ZZZ")), 100.0);
        assert_eq!(base_price(&ticker("NVDA")), 450.9);
    }
}
