//! Tiers, time buckets and bucket assignment.
//!
//! Every object in the store belongs to one tier of the rollup chain. Rolling
//! a tier up means grouping its objects into buckets of the next tier's
//! granularity:
//!
//! | source tier | key format                     | bucket granularity |
//! |-------------|--------------------------------|--------------------|
//! | raw         | `raw/YYYY/MM/DD/HH/...`        | hour `YYYY-MM-DDTHH` |
//! | hour        | `hours/YYYY-MM-DDTHH-<token>`  | day `YYYY-MM-DD`   |
//! | day         | `days/YYYY-MM-DD-<token>`      | month `YYYY-MM`    |
//! | month       | `months/YYYY-MM-<token>`       | terminal           |
//!
//! The bucket containing "now" is the open bucket: producers may still be
//! writing into it, so its members are never eligible.

mod parse;

pub use parse::parse_bucket_key;

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, NaiveTime, Timelike, Utc};
use tracing::warn;

use crate::store::ObjectMeta;

/// One level of the rollup chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Tier {
    Raw,
    Hour,
    Day,
    Month,
}

impl Tier {
    /// Aggregate tiers, in rollup order.
    pub const AGGREGATES: [Tier; 3] = [Tier::Hour, Tier::Day, Tier::Month];

    /// Key prefix under which this tier's objects live.
    pub fn prefix(&self) -> &'static str {
        match self {
            Tier::Raw => "raw/",
            Tier::Hour => "hours/",
            Tier::Day => "days/",
            Tier::Month => "months/",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Tier::Raw => "raw",
            Tier::Hour => "hour",
            Tier::Day => "day",
            Tier::Month => "month",
        }
    }

    /// Granularity this tier's objects are bucketed by when rolled up.
    ///
    /// `None` for the month tier, which is terminal.
    pub fn rollup(&self) -> Option<Granularity> {
        match self {
            Tier::Raw => Some(Granularity::Hour),
            Tier::Hour => Some(Granularity::Day),
            Tier::Day => Some(Granularity::Month),
            Tier::Month => None,
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Tier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "raw" => Ok(Tier::Raw),
            "hour" | "hours" => Ok(Tier::Hour),
            "day" | "days" => Ok(Tier::Day),
            "month" | "months" => Ok(Tier::Month),
            other => Err(format!("unknown tier: {}", other)),
        }
    }
}

/// Width of a time bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Granularity {
    Hour,
    Day,
    Month,
}

impl Granularity {
    /// Tier that buckets of this granularity are written to.
    pub fn destination(&self) -> Tier {
        match self {
            Granularity::Hour => Tier::Hour,
            Granularity::Day => Tier::Day,
            Granularity::Month => Tier::Month,
        }
    }

    /// Start of the bucket containing `at`.
    pub fn truncate(&self, at: NaiveDateTime) -> NaiveDateTime {
        let date = at.date();
        match self {
            Granularity::Hour => date
                .and_hms_opt(at.hour(), 0, 0)
                .unwrap_or_else(|| date.and_time(NaiveTime::MIN)),
            Granularity::Day => date.and_time(NaiveTime::MIN),
            Granularity::Month => date
                .with_day(1)
                .unwrap_or(date)
                .and_time(NaiveTime::MIN),
        }
    }

    fn format(&self) -> &'static str {
        match self {
            Granularity::Hour => "%Y-%m-%dT%H",
            Granularity::Day => "%Y-%m-%d",
            Granularity::Month => "%Y-%m",
        }
    }
}

/// A time bucket: granularity plus the bucket's start (UTC).
///
/// Displays as the date key used in destination object names, e.g.
/// `2023-05-01T10`, `2023-05-01` or `2023-05`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BucketKey {
    granularity: Granularity,
    start: NaiveDateTime,
}

impl BucketKey {
    /// Bucket of the given granularity containing `at`.
    pub fn containing(granularity: Granularity, at: NaiveDateTime) -> Self {
        Self {
            granularity,
            start: granularity.truncate(at),
        }
    }

    /// The open bucket: the one containing `now`.
    pub fn open(granularity: Granularity, now: DateTime<Utc>) -> Self {
        Self::containing(granularity, now.naive_utc())
    }

    pub(crate) fn from_date(granularity: Granularity, date: NaiveDate, hour: u32) -> Option<Self> {
        let at = date.and_hms_opt(hour, 0, 0)?;
        Some(Self::containing(granularity, at))
    }

    pub fn granularity(&self) -> Granularity {
        self.granularity
    }

    pub fn start(&self) -> NaiveDateTime {
        self.start
    }

    /// Destination object key for this bucket with a unique token suffix.
    pub fn destination_key(&self, token: &str) -> String {
        format!("{}{}-{}", self.granularity.destination().prefix(), self, token)
    }
}

impl fmt::Display for BucketKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.start.format(self.granularity.format()))
    }
}

/// Assigns objects of one source tier to buckets and decides eligibility.
#[derive(Debug, Clone, Copy)]
pub struct Bucketer {
    source: Tier,
    granularity: Granularity,
}

impl Bucketer {
    /// Bucketer for rolling up `source`. `None` for the terminal tier.
    pub fn for_source(source: Tier) -> Option<Self> {
        source.rollup().map(|granularity| Self {
            source,
            granularity,
        })
    }

    pub fn source(&self) -> Tier {
        self.source
    }

    pub fn granularity(&self) -> Granularity {
        self.granularity
    }

    /// Bucket still open at `now`.
    pub fn open_bucket(&self, now: DateTime<Utc>) -> BucketKey {
        BucketKey::open(self.granularity, now)
    }

    /// Bucket an object belongs to.
    ///
    /// The date comes from the object key. When the key carries no date the
    /// object's last-modified time stands in, and failing that the open
    /// bucket: such objects are held back until their period has passed,
    /// never dropped.
    pub fn bucket_key_of(
        &self,
        object_key: &str,
        last_modified: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> BucketKey {
        if let Some(key) = parse_bucket_key(object_key, self.source) {
            return key;
        }

        let open = self.open_bucket(now);
        let fallback = last_modified
            .map(|modified| BucketKey::open(self.granularity, modified))
            .filter(|bucket| *bucket <= open)
            .unwrap_or(open);
        warn!(
            key = %object_key,
            tier = %self.source,
            bucket = %fallback,
            "No date found in object key"
        );
        fallback
    }

    /// Bucket of a listed object.
    pub fn bucket_of(&self, object: &ObjectMeta, now: DateTime<Utc>) -> BucketKey {
        self.bucket_key_of(&object.key, object.last_modified, now)
    }

    /// Whether `bucket` has closed at `now`.
    ///
    /// Only buckets strictly before the open bucket are closed; buckets in
    /// the future stay held back until their period has passed.
    pub fn is_closed(&self, bucket: &BucketKey, now: DateTime<Utc>) -> bool {
        *bucket < self.open_bucket(now)
    }

    /// Whether an object may be rolled up at `now`.
    pub fn is_eligible(
        &self,
        object_key: &str,
        last_modified: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> bool {
        self.is_closed(&self.bucket_key_of(object_key, last_modified, now), now)
    }
}

#[cfg(test)]
mod tests;
