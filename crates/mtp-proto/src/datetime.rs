//! The `YYYYMMDDThhmmss` timestamp strings carried by object datasets.
//! Always UTC; sub-second and zone suffixes are not produced and are ignored
//! on input.

use time::{Date, Month, OffsetDateTime, PrimitiveDateTime, Time};

/// Fallback emitted for objects with no usable timestamp.
const EPOCH_FALLBACK: &str = "20010101T000000";

/// Formats an epoch-seconds timestamp as `YYYYMMDDThhmmss`.
pub fn format_timestamp(epoch: i64) -> String {
    match OffsetDateTime::from_unix_timestamp(epoch) {
        Ok(t) => format!(
            "{:04}{:02}{:02}T{:02}{:02}{:02}",
            t.year(),
            u8::from(t.month()),
            t.day(),
            t.hour(),
            t.minute(),
            t.second()
        ),
        Err(_) => EPOCH_FALLBACK.to_string(),
    }
}

/// Parses the first 15 characters of a dataset timestamp back to epoch
/// seconds. Returns `None` for anything that is not a calendar date.
pub fn parse_timestamp(s: &str) -> Option<i64> {
    let b = s.as_bytes();
    if b.len() < 15 || b[8] != b'T' {
        return None;
    }
    let num = |range: std::ops::Range<usize>| -> Option<u32> {
        s.get(range)?.parse().ok()
    };

    let year = num(0..4)? as i32;
    let month = Month::try_from(num(4..6)? as u8).ok()?;
    let day = num(6..8)? as u8;
    let date = Date::from_calendar_date(year, month, day).ok()?;
    let tod = Time::from_hms(num(9..11)? as u8, num(11..13)? as u8, num(13..15)? as u8).ok()?;
    Some(PrimitiveDateTime::new(date, tod).assume_utc().unix_timestamp())
}
