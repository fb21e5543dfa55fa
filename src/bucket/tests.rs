use super::*;
use chrono::TimeZone;

use crate::store::ObjectMeta;

fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
}

fn raw() -> Bucketer {
    Bucketer::for_source(Tier::Raw).unwrap()
}

// ============================================================================
// Parsing
// ============================================================================

#[test]
fn test_parse_raw_key() {
    let key = parse_bucket_key("raw/2023/05/01/10/device-1.json", Tier::Raw).unwrap();
    assert_eq!(key.granularity(), Granularity::Hour);
    assert_eq!(key.to_string(), "2023-05-01T10");
}

#[test]
fn test_parse_raw_key_without_trailing_segment() {
    let key = parse_bucket_key("raw/2023/12/31/23", Tier::Raw).unwrap();
    assert_eq!(key.to_string(), "2023-12-31T23");
}

#[test]
fn test_parse_raw_key_rejects_malformed() {
    assert!(parse_bucket_key("raw/device-1.json", Tier::Raw).is_none());
    assert!(parse_bucket_key("raw/2023/5/01/10/x", Tier::Raw).is_none());
    assert!(parse_bucket_key("raw/2023/02/30/10/x", Tier::Raw).is_none());
    assert!(parse_bucket_key("raw/2023/05/01/24/x", Tier::Raw).is_none());
    assert!(parse_bucket_key("hours/2023/05/01/10/x", Tier::Raw).is_none());
}

#[test]
fn test_parse_hour_aggregate_truncates_to_day() {
    let key = parse_bucket_key("hours/2023-05-01T10-0f3a", Tier::Hour).unwrap();
    assert_eq!(key.granularity(), Granularity::Day);
    assert_eq!(key.to_string(), "2023-05-01");
}

#[test]
fn test_parse_day_aggregate_truncates_to_month() {
    let key = parse_bucket_key("days/2023-05-17-0f3a", Tier::Day).unwrap();
    assert_eq!(key.granularity(), Granularity::Month);
    assert_eq!(key.to_string(), "2023-05");
}

#[test]
fn test_parse_month_is_terminal() {
    assert!(parse_bucket_key("months/2023-05-0f3a", Tier::Month).is_none());
    assert!(Bucketer::for_source(Tier::Month).is_none());
}

// ============================================================================
// Bucket keys
// ============================================================================

#[test]
fn test_destination_key_format() {
    let hour = BucketKey::open(Granularity::Hour, at(2023, 5, 1, 10, 42));
    let day = BucketKey::open(Granularity::Day, at(2023, 5, 1, 10, 42));
    let month = BucketKey::open(Granularity::Month, at(2023, 5, 1, 10, 42));

    assert_eq!(hour.destination_key("abc"), "hours/2023-05-01T10-abc");
    assert_eq!(day.destination_key("abc"), "days/2023-05-01-abc");
    assert_eq!(month.destination_key("abc"), "months/2023-05-abc");
}

#[test]
fn test_destination_keys_parse_back_at_next_tier() {
    let hour = BucketKey::open(Granularity::Hour, at(2023, 5, 17, 10, 0));
    let day_key = parse_bucket_key(&hour.destination_key("t1"), Tier::Hour).unwrap();
    assert_eq!(day_key.to_string(), "2023-05-17");

    let month_key = parse_bucket_key(&day_key.destination_key("t2"), Tier::Day).unwrap();
    assert_eq!(month_key.to_string(), "2023-05");
}

#[test]
fn test_tier_from_str() {
    assert_eq!("hours".parse::<Tier>().unwrap(), Tier::Hour);
    assert_eq!("Day".parse::<Tier>().unwrap(), Tier::Day);
    assert!("week".parse::<Tier>().is_err());
}

// ============================================================================
// Eligibility
// ============================================================================

#[test]
fn test_objects_before_open_hour_are_eligible() {
    let now = at(2023, 5, 1, 11, 5);
    assert!(raw().is_eligible("raw/2023/05/01/10/a", None, now));
    assert!(raw().is_eligible("raw/2022/12/31/23/a", None, now));
}

#[test]
fn test_objects_in_open_hour_are_not_eligible() {
    let now = at(2023, 5, 1, 10, 59);
    assert!(!raw().is_eligible("raw/2023/05/01/10/a", None, now));
}

#[test]
fn test_future_objects_are_not_eligible() {
    let now = at(2023, 5, 1, 10, 0);
    assert!(!raw().is_eligible("raw/2023/05/01/12/a", None, now));
}

#[test]
fn test_unparseable_key_without_timestamp_joins_open_bucket() {
    let now = at(2023, 5, 1, 10, 30);
    let bucket = raw().bucket_key_of("raw/unsorted/device-1.json", None, now);

    assert_eq!(bucket, raw().open_bucket(now));
    assert!(!raw().is_eligible("raw/unsorted/device-1.json", None, now));
}

#[test]
fn test_unparseable_key_waits_for_its_hour_to_close() {
    let written = Some(at(2023, 5, 1, 10, 20));
    let key = "raw/unsorted/device-1.json";

    assert!(!raw().is_eligible(key, written, at(2023, 5, 1, 10, 50)));
    assert!(raw().is_eligible(key, written, at(2023, 5, 1, 11, 50)));
    assert_eq!(
        raw().bucket_key_of(key, written, at(2023, 5, 1, 11, 50)).to_string(),
        "2023-05-01T10"
    );
}

#[test]
fn test_future_modification_time_is_clamped_to_open_bucket() {
    let now = at(2023, 5, 1, 10, 30);
    let bucket = raw().bucket_key_of("raw/x", Some(at(2023, 5, 1, 14, 0)), now);
    assert_eq!(bucket, raw().open_bucket(now));
}

#[test]
fn test_key_date_wins_over_modification_time() {
    let object = ObjectMeta {
        key: "raw/2023/05/01/08/a".to_string(),
        size: 1,
        last_modified: Some(at(2023, 5, 1, 10, 0)),
    };
    let bucket = raw().bucket_of(&object, at(2023, 5, 1, 10, 30));
    assert_eq!(bucket.to_string(), "2023-05-01T08");
}

#[test]
fn test_day_eligibility_uses_current_day() {
    let hours = Bucketer::for_source(Tier::Hour).unwrap();
    let now = at(2023, 5, 2, 0, 10);

    assert!(hours.is_eligible("hours/2023-05-01T23-a", None, now));
    assert!(!hours.is_eligible("hours/2023-05-02T00-a", None, now));
}

#[test]
fn test_month_eligibility_uses_current_month() {
    let days = Bucketer::for_source(Tier::Day).unwrap();
    let now = at(2023, 6, 1, 0, 0);

    assert!(days.is_eligible("days/2023-05-31-a", None, now));
    assert!(!days.is_eligible("days/2023-06-01-a", None, now));
}

#[test]
fn test_bucket_order_is_chronological() {
    let a = BucketKey::open(Granularity::Hour, at(2023, 5, 1, 9, 0));
    let b = BucketKey::open(Granularity::Hour, at(2023, 5, 1, 10, 0));
    assert!(a < b);
}
