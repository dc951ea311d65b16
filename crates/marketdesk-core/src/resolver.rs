//! Symbolic range to concrete query window.

use std::time::Duration as StdDuration;

use serde::{Deserialize, Serialize};
use time::{util, Date, Duration, Month};

use crate::market_hours::{roll_back_to_trading_day, session_open_on, to_exchange_time, SESSION_OPEN};
use crate::{BarResolution, RangeSpec, SymbolicRange, UtcDateTime};

/// Resolve a range label against `now`. Total: every label yields a window.
pub fn resolve(range: SymbolicRange, now: UtcDateTime) -> RangeSpec {
    let (resolution, start) = match range {
        SymbolicRange::OneDay => (BarResolution::Minutes(5), last_session_open(now)),
        SymbolicRange::OneWeek => (BarResolution::Hours(1), now - Duration::days(7)),
        SymbolicRange::OneMonth => (BarResolution::Day, subtract_months(now, 1)),
        SymbolicRange::ThreeMonths => (BarResolution::Day, subtract_months(now, 3)),
        SymbolicRange::OneYear => (BarResolution::Day, subtract_months(now, 12)),
        SymbolicRange::Max => (BarResolution::Week, subtract_months(now, 60)),
    };

    RangeSpec {
        resolution,
        start,
        end: now,
    }
}

/// Resolve free-form range text; unknown labels resolve as `1M`.
pub fn resolve_label(label: &str, now: UtcDateTime) -> RangeSpec {
    resolve(SymbolicRange::parse_lenient(label), now)
}

/// Most recent 09:30 exchange time strictly before `now`, moved back to a weekday.
fn last_session_open(now: UtcDateTime) -> UtcDateTime {
    let local = to_exchange_time(now);
    let mut date = local.date();
    if local.time() <= SESSION_OPEN {
        date = date.previous_day().unwrap_or(date);
    }

    let start = session_open_on(roll_back_to_trading_day(date));
    if start < now {
        start
    } else {
        now - Duration::days(1)
    }
}

/// Calendar month subtraction keeping the time of day. The day is clamped to
/// the end of the target month.
pub fn subtract_months(instant: UtcDateTime, months: u32) -> UtcDateTime {
    let value = instant.into_inner();
    let total = value.year() * 12 + i32::from(u8::from(value.month())) - 1 - months as i32;
    let year = total.div_euclid(12);
    let month_number = (total.rem_euclid(12) + 1) as u8;

    let Ok(month) = Month::try_from(month_number) else {
        return instant;
    };
    let day = value.day().min(util::days_in_year_month(year, month));

    match Date::from_calendar_date(year, month, day) {
        Ok(date) => UtcDateTime::from_offset_datetime(value.replace_date(date)),
        Err(_) => instant,
    }
}

/// Refresh cadence for the polling updater.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollIntervals {
    #[serde(with = "millis")]
    pub intraday: StdDuration,
    #[serde(with = "millis")]
    pub default: StdDuration,
}

impl Default for PollIntervals {
    fn default() -> Self {
        Self {
            intraday: StdDuration::from_millis(2_000),
            default: StdDuration::from_millis(60_000),
        }
    }
}

impl PollIntervals {
    pub fn for_range(&self, range: SymbolicRange) -> StdDuration {
        if range.is_intraday() {
            self.intraday
        } else {
            self.default
        }
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;

    fn at(value: time::OffsetDateTime) -> UtcDateTime {
        UtcDateTime::from(value)
    }

    #[test]
    fn one_day_during_session_starts_at_todays_open() {
        let now = at(datetime!(2024-07-10 17:00 UTC));
        let spec = resolve(SymbolicRange::OneDay, now);
        assert_eq!(spec.resolution, BarResolution::Minutes(5));
        assert_eq!(spec.start, at(datetime!(2024-07-10 13:30 UTC)));
        assert_eq!(spec.end, now);
    }

    #[test]
    fn one_day_exactly_at_open_uses_previous_session() {
        let now = at(datetime!(2024-07-10 13:30 UTC));
        let spec = resolve(SymbolicRange::OneDay, now);
        assert_eq!(spec.start, at(datetime!(2024-07-09 13:30 UTC)));
    }

    #[test]
    fn one_week_is_hourly() {
        let now = at(datetime!(2024-07-10 17:00 UTC));
        let spec = resolve(SymbolicRange::OneWeek, now);
        assert_eq!(spec.resolution, BarResolution::Hours(1));
        assert_eq!(spec.start, at(datetime!(2024-07-03 17:00 UTC)));
    }

    #[test]
    fn month_subtraction_clamps_day() {
        let now = at(datetime!(2023-05-31 08:15 UTC));
        assert_eq!(subtract_months(now, 1), at(datetime!(2023-04-30 08:15 UTC)));
        assert_eq!(subtract_months(now, 3), at(datetime!(2023-02-28 08:15 UTC)));
        assert_eq!(subtract_months(now, 5), at(datetime!(2022-12-31 08:15 UTC)));
    }

    #[test]
    fn year_and_max_use_calendar_years() {
        let now = at(datetime!(2024-02-29 12:00 UTC));
        assert_eq!(
            resolve(SymbolicRange::OneYear, now).start,
            at(datetime!(2023-02-28 12:00 UTC))
        );
        let max = resolve(SymbolicRange::Max, now);
        assert_eq!(max.resolution, BarResolution::Week);
        assert_eq!(max.start, at(datetime!(2019-02-28 12:00 UTC)));
    }

    #[test]
    fn unknown_label_resolves_like_one_month() {
        let now = at(datetime!(2024-06-15 12:00 UTC));
        assert_eq!(resolve_label("6M", now), resolve(SymbolicRange::OneMonth, now));
    }

    #[test]
    fn poll_interval_follows_range() {
        let intervals = PollIntervals::default();
        assert_eq!(intervals.for_range(SymbolicRange::OneDay), StdDuration::from_secs(2));
        assert_eq!(intervals.for_range(SymbolicRange::Max), StdDuration::from_secs(60));
    }
}
