//! Epoch-millisecond clock helpers.
//!
//! Timestamps are stored as epoch milliseconds; calendar questions ("is this
//! due today?", "which archive year?") are answered in the local time zone.

use chrono::{Datelike, Local, NaiveDate, TimeZone, Utc};

pub const MILLIS_PER_DAY: i64 = 24 * 60 * 60 * 1000;

/// Current time as epoch milliseconds.
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Today's date in the local time zone.
pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

pub fn current_year() -> i32 {
    today().year()
}

/// Local calendar date of an epoch-millisecond timestamp.
///
/// Returns `None` for timestamps chrono can't represent.
pub fn local_date(epoch_millis: i64) -> Option<NaiveDate> {
    Local
        .timestamp_millis_opt(epoch_millis)
        .earliest()
        .map(|dt| dt.date_naive())
}

/// Epoch milliseconds of local noon on `date`. Handy for picking a
/// timestamp that lands on a given calendar day.
pub fn local_noon_millis(date: NaiveDate) -> Option<i64> {
    let noon = date.and_hms_opt(12, 0, 0)?;
    Local
        .from_local_datetime(&noon)
        .earliest()
        .map(|dt| dt.timestamp_millis())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn now_maps_to_today() {
        assert_eq!(local_date(now_millis()), Some(today()));
    }

    #[test]
    fn noon_roundtrips_to_same_date() {
        let date = NaiveDate::from_ymd_opt(2025, 12, 21).unwrap();
        let millis = local_noon_millis(date).unwrap();
        assert_eq!(local_date(millis), Some(date));
    }

    #[test]
    fn one_day_is_86_400_000_ms() {
        assert_eq!(MILLIS_PER_DAY, 86_400_000);
    }
}
