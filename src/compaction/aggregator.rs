//! Bucket aggregation: read members, concatenate, write, retire.
//!
//! For each closed bucket the aggregator reads every member in listing
//! order, splits it into lines, drops blank lines, passes each line through
//! the stage's transform and writes the result as one newline-joined object
//! under a fresh token. Members are deleted only after that write returned.
//!
//! Lines that are not valid UTF-8 bypass the transform and are copied
//! byte for byte.

use std::sync::Arc;

use futures::stream::{self, StreamExt};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use super::collector::Buckets;
use super::config::{CompactionConfig, MemberFailurePolicy};
use super::naming::TokenSource;
use crate::bucket::BucketKey;
use crate::enrich::LineTransform;
use crate::store::{ObjectMeta, ObjectStore, StoreError};
use crate::utils::retry::with_store_retry;

/// Why a bucket was abandoned.
#[derive(Debug, Error)]
pub enum BucketError {
    #[error("Member {key} could not be read: {source}")]
    Member {
        key: String,
        #[source]
        source: StoreError,
    },

    #[error("Aggregate {key} could not be written: {source}")]
    Write {
        key: String,
        #[source]
        source: StoreError,
    },
}

/// Totals for one aggregation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AggregateReport {
    /// Buckets attempted.
    pub buckets: usize,
    /// Keys of aggregates written, in bucket order.
    pub written: Vec<String>,
    /// Members read and folded into an aggregate.
    pub objects_read: usize,
    /// Members left in place because they could not be read.
    pub objects_skipped: Vec<String>,
    /// Members deleted after their aggregate was written.
    pub objects_retired: usize,
    /// Members whose delete failed after their aggregate was written.
    pub retire_failures: Vec<String>,
    /// Lines written across all aggregates.
    pub lines: usize,
    /// Buckets abandoned without writing or retiring anything.
    pub failed_buckets: Vec<BucketKey>,
}

#[derive(Debug, Default)]
struct BucketOutcome {
    written: Option<String>,
    read: usize,
    skipped: Vec<String>,
    retired: usize,
    retire_failures: Vec<String>,
    lines: usize,
}

/// Aggregates closed buckets into destination objects.
pub struct Aggregator {
    store: Arc<dyn ObjectStore>,
    tokens: Arc<dyn TokenSource>,
    config: CompactionConfig,
}

impl Aggregator {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        tokens: Arc<dyn TokenSource>,
        config: CompactionConfig,
    ) -> Self {
        Self {
            store,
            tokens,
            config,
        }
    }

    /// Aggregate every bucket, up to `bucket_concurrency` at a time.
    ///
    /// Buckets are independent: a failed bucket is recorded in the report
    /// and does not stop the others.
    pub async fn aggregate(
        &self,
        buckets: Buckets,
        transform: Arc<dyn LineTransform>,
    ) -> AggregateReport {
        let mut report = AggregateReport {
            buckets: buckets.len(),
            ..Default::default()
        };

        let mut outcomes: Vec<(BucketKey, Result<BucketOutcome, BucketError>)> =
            stream::iter(buckets)
                .map(|(bucket, members)| {
                    let transform = Arc::clone(&transform);
                    async move {
                        let outcome = self
                            .aggregate_bucket(bucket, &members, transform.as_ref())
                            .await;
                        (bucket, outcome)
                    }
                })
                .buffer_unordered(self.config.bucket_concurrency.max(1))
                .collect()
                .await;
        outcomes.sort_by_key(|(bucket, _)| *bucket);

        for (bucket, outcome) in outcomes {
            match outcome {
                Ok(outcome) => {
                    report.written.extend(outcome.written);
                    report.objects_read += outcome.read;
                    report.objects_skipped.extend(outcome.skipped);
                    report.objects_retired += outcome.retired;
                    report.retire_failures.extend(outcome.retire_failures);
                    report.lines += outcome.lines;
                }
                Err(e) => {
                    error!(bucket = %bucket, error = %e, "Bucket aggregation failed");
                    report.failed_buckets.push(bucket);
                }
            }
        }

        report
    }

    async fn aggregate_bucket(
        &self,
        bucket: BucketKey,
        members: &[ObjectMeta],
        transform: &dyn LineTransform,
    ) -> Result<BucketOutcome, BucketError> {
        let retry = &self.config.retry;
        let mut outcome = BucketOutcome::default();
        let mut consumed: Vec<&str> = Vec::with_capacity(members.len());
        let mut body: Vec<u8> = Vec::new();

        for member in members {
            let key = member.key.as_str();
            let content = match with_store_retry(retry, "get", key, || self.store.get(key)).await {
                Ok(content) => content,
                Err(StoreError::NotFound(_)) => {
                    // Retired by an overlapping run after our listing.
                    debug!(bucket = %bucket, key = %key, "Member vanished before read");
                    continue;
                }
                Err(e) => match self.config.member_failure {
                    MemberFailurePolicy::Skip => {
                        warn!(
                            bucket = %bucket,
                            key = %key,
                            error = %e,
                            "Skipping unreadable member"
                        );
                        outcome.skipped.push(key.to_string());
                        continue;
                    }
                    MemberFailurePolicy::Abort => {
                        Self::record(bucket, "aborted");
                        return Err(BucketError::Member {
                            key: key.to_string(),
                            source: e,
                        });
                    }
                },
            };

            outcome.lines += append_lines(&mut body, &content, transform);
            consumed.push(key);
        }
        outcome.read = consumed.len();

        if consumed.is_empty() {
            Self::record(bucket, "empty");
            return Ok(outcome);
        }

        if outcome.lines > 0 {
            let destination = bucket.destination_key(&self.tokens.next_token());
            with_store_retry(retry, "put", &destination, || {
                self.store.put(&destination, body.clone())
            })
            .await
            .map_err(|source| {
                Self::record(bucket, "failed");
                BucketError::Write {
                    key: destination.clone(),
                    source,
                }
            })?;
            info!(
                bucket = %bucket,
                destination = %destination,
                members = consumed.len(),
                lines = outcome.lines,
                "Wrote aggregate"
            );
            outcome.written = Some(destination);
        } else {
            debug!(bucket = %bucket, members = consumed.len(), "Bucket has no records");
        }

        for key in consumed {
            match with_store_retry(retry, "delete", key, || self.store.delete(key)).await {
                Ok(()) => outcome.retired += 1,
                Err(e) => {
                    warn!(
                        bucket = %bucket,
                        key = %key,
                        error = %e,
                        "Failed to retire member; its records are now also in the aggregate"
                    );
                    outcome.retire_failures.push(key.to_string());
                }
            }
        }

        #[cfg(feature = "otel")]
        crate::utils::metrics::OBJECTS_RETIRED_TOTAL.add(outcome.retired as u64, &[]);
        Self::record(
            bucket,
            if outcome.written.is_some() { "written" } else { "empty" },
        );

        Ok(outcome)
    }

    #[allow(unused_variables)]
    fn record(bucket: BucketKey, outcome: &str) {
        #[cfg(feature = "otel")]
        {
            use crate::utils::metrics::{self, AGGREGATE_TOTAL};
            AGGREGATE_TOTAL.add(
                1,
                &[
                    metrics::outcome_attr(outcome),
                    opentelemetry::KeyValue::new(
                        "tier",
                        bucket.granularity().destination().name(),
                    ),
                ],
            );
        }
    }
}

/// Append the non-blank lines of `content` to `body`, newline-separated.
///
/// Returns the number of lines appended.
fn append_lines(body: &mut Vec<u8>, content: &[u8], transform: &dyn LineTransform) -> usize {
    let mut appended = 0;
    for line in content.split(|b| *b == b'\n') {
        if line.iter().all(u8::is_ascii_whitespace) {
            continue;
        }
        if !body.is_empty() {
            body.push(b'\n');
        }
        match std::str::from_utf8(line) {
            Ok(text) => body.extend_from_slice(transform.transform(text).as_bytes()),
            Err(_) => body.extend_from_slice(line),
        }
        appended += 1;
    }
    appended
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enrich::Identity;
    use std::borrow::Cow;

    struct Upper;

    impl LineTransform for Upper {
        fn transform<'a>(&self, line: &'a str) -> Cow<'a, str> {
            Cow::Owned(line.to_uppercase())
        }
    }

    #[test]
    fn test_append_lines_drops_blank_lines() {
        let mut body = Vec::new();
        let n = append_lines(&mut body, b"a\n\n  \nb\n", &Identity);
        assert_eq!(n, 2);
        assert_eq!(body, b"a\nb");
    }

    #[test]
    fn test_append_lines_joins_across_members() {
        let mut body = Vec::new();
        append_lines(&mut body, b"a\n", &Identity);
        append_lines(&mut body, b"b", &Identity);
        assert_eq!(body, b"a\nb");
    }

    #[test]
    fn test_append_lines_applies_transform() {
        let mut body = Vec::new();
        append_lines(&mut body, b"x\ny", &Upper);
        assert_eq!(body, b"X\nY");
    }

    #[test]
    fn test_append_lines_copies_invalid_utf8_verbatim() {
        let mut body = Vec::new();
        append_lines(&mut body, b"ok\n\xff\xfe", &Upper);
        assert_eq!(body, b"OK\n\xff\xfe");
    }

    #[test]
    fn test_append_lines_keeps_carriage_returns() {
        let mut body = Vec::new();
        append_lines(&mut body, b"a\r\nb", &Identity);
        assert_eq!(body, b"a\r\nb");
    }
}
