//! US equities session calendar.
//!
//! Exchange time is America/New_York: UTC-5, or UTC-4 between the second
//! Sunday of March 02:00 local and the first Sunday of November 02:00 local.
//! The regular session runs 09:30-16:00 local on weekdays. Exchange holidays
//! are not modelled.

use time::macros::{offset, time};
use time::{Date, Month, OffsetDateTime, PrimitiveDateTime, Time, UtcOffset, Weekday};

use crate::UtcDateTime;

const EASTERN_STANDARD: UtcOffset = offset!(-5);
const EASTERN_DAYLIGHT: UtcOffset = offset!(-4);
const TRANSITION_TIME: Time = time!(02:00);

pub const SESSION_OPEN: Time = time!(09:30);
pub const SESSION_CLOSE: Time = time!(16:00);

/// Exchange UTC offset in effect at `instant`.
pub fn exchange_offset(instant: UtcDateTime) -> UtcOffset {
    let utc = instant.into_inner();
    let year = utc.year();
    let Some((dst_start, dst_end)) = dst_bounds_utc(year) else {
        return EASTERN_STANDARD;
    };

    if utc >= dst_start && utc < dst_end {
        EASTERN_DAYLIGHT
    } else {
        EASTERN_STANDARD
    }
}

/// `instant` expressed in exchange local time.
pub fn to_exchange_time(instant: UtcDateTime) -> OffsetDateTime {
    instant.into_inner().to_offset(exchange_offset(instant))
}

/// Converts an exchange-local wall clock reading to a UTC instant.
pub fn exchange_local_to_utc(date: Date, at: Time) -> UtcDateTime {
    let offset = local_offset(date, at);
    UtcDateTime::from_offset_datetime(PrimitiveDateTime::new(date, at).assume_offset(offset))
}

pub fn session_open_on(date: Date) -> UtcDateTime {
    exchange_local_to_utc(date, SESSION_OPEN)
}

pub fn session_close_on(date: Date) -> UtcDateTime {
    exchange_local_to_utc(date, SESSION_CLOSE)
}

pub fn is_trading_day(date: Date) -> bool {
    !matches!(date.weekday(), Weekday::Saturday | Weekday::Sunday)
}

/// Whether `instant` falls inside a regular trading session.
pub fn is_regular_session(instant: UtcDateTime) -> bool {
    let local = to_exchange_time(instant);
    is_trading_day(local.date()) && local.time() >= SESSION_OPEN && local.time() < SESSION_CLOSE
}

/// Steps back from `date` to the closest trading day (inclusive).
pub fn roll_back_to_trading_day(mut date: Date) -> Date {
    while !is_trading_day(date) {
        match date.previous_day() {
            Some(previous) => date = previous,
            None => break,
        }
    }
    date
}

fn local_offset(date: Date, at: Time) -> UtcOffset {
    let year = date.year();
    let (Some(start), Some(end)) = (
        nth_sunday(year, Month::March, 2),
        nth_sunday(year, Month::November, 1),
    ) else {
        return EASTERN_STANDARD;
    };

    let local = PrimitiveDateTime::new(date, at);
    let dst_start = PrimitiveDateTime::new(start, TRANSITION_TIME);
    // 01:00-02:00 on the November switch happens twice; the later (standard) reading wins.
    let dst_end = PrimitiveDateTime::new(end, time!(01:00));

    if local >= dst_start && local < dst_end {
        EASTERN_DAYLIGHT
    } else {
        EASTERN_STANDARD
    }
}

fn dst_bounds_utc(year: i32) -> Option<(OffsetDateTime, OffsetDateTime)> {
    let start = nth_sunday(year, Month::March, 2)?;
    let end = nth_sunday(year, Month::November, 1)?;

    Some((
        PrimitiveDateTime::new(start, TRANSITION_TIME).assume_offset(EASTERN_STANDARD),
        PrimitiveDateTime::new(end, TRANSITION_TIME).assume_offset(EASTERN_DAYLIGHT),
    ))
}

fn nth_sunday(year: i32, month: Month, n: u8) -> Option<Date> {
    let first = Date::from_calendar_date(year, month, 1).ok()?;
    let until_sunday = first.weekday().number_days_from_sunday();
    let first_sunday = if until_sunday == 0 { 1 } else { 8 - until_sunday };
    Date::from_calendar_date(year, month, first_sunday + 7 * (n - 1)).ok()
}
