//! Date-key parsing for object keys.
//!
//! Each parser returns `None` when the key does not carry a date in the
//! expected position. Callers decide the fallback.

use chrono::NaiveDate;

use super::{BucketKey, Granularity, Tier};

/// Parse the bucket an object of `source` tier rolls up into.
///
/// - raw: `raw/YYYY/MM/DD/HH...` → hour bucket
/// - hour: `hours/YYYY-MM-DD...` → day bucket (the hour is ignored)
/// - day: `days/YYYY-MM...` → month bucket (the day is ignored)
/// - month: terminal, always `None`
pub fn parse_bucket_key(object_key: &str, source: Tier) -> Option<BucketKey> {
    let name = object_key.strip_prefix(source.prefix())?;

    match source {
        Tier::Raw => {
            let (year, rest) = number(name, 4)?;
            let (month, rest) = number(rest.strip_prefix('/')?, 2)?;
            let (day, rest) = number(rest.strip_prefix('/')?, 2)?;
            let (hour, _) = number(rest.strip_prefix('/')?, 2)?;
            let date = NaiveDate::from_ymd_opt(year as i32, month, day)?;
            BucketKey::from_date(Granularity::Hour, date, hour)
        }
        Tier::Hour => {
            let date = dashed_date(name)?;
            BucketKey::from_date(Granularity::Day, date, 0)
        }
        Tier::Day => {
            let (year, rest) = number(name, 4)?;
            let (month, _) = number(rest.strip_prefix('-')?, 2)?;
            let date = NaiveDate::from_ymd_opt(year as i32, month, 1)?;
            BucketKey::from_date(Granularity::Month, date, 0)
        }
        Tier::Month => None,
    }
}

/// `YYYY-MM-DD` at the start of `s`.
fn dashed_date(s: &str) -> Option<NaiveDate> {
    let (year, rest) = number(s, 4)?;
    let (month, rest) = number(rest.strip_prefix('-')?, 2)?;
    let (day, _) = number(rest.strip_prefix('-')?, 2)?;
    NaiveDate::from_ymd_opt(year as i32, month, day)
}

/// Exactly `width` ASCII digits at the start of `s`.
fn number(s: &str, width: usize) -> Option<(u32, &str)> {
    let digits = s.get(..width)?;
    if !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some((digits.parse().ok()?, &s[width..]))
}
