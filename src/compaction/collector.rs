//! Groups eligible objects of a source tier into closed buckets.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use super::StageError;
use crate::bucket::{BucketKey, Bucketer, Tier};
use crate::store::{ObjectMeta, ObjectStore};
use crate::utils::retry::{with_store_retry, RetryConfig};

/// Closed buckets and their members, members in listing order.
pub type Buckets = BTreeMap<BucketKey, Vec<ObjectMeta>>;

/// Lists a tier and groups its eligible objects by bucket.
pub struct Collector {
    store: Arc<dyn ObjectStore>,
    retry: RetryConfig,
}

impl Collector {
    pub fn new(store: Arc<dyn ObjectStore>, retry: RetryConfig) -> Self {
        Self { store, retry }
    }

    /// Collect the closed buckets of `source` at `now`.
    pub async fn collect(&self, source: Tier, now: DateTime<Utc>) -> Result<Buckets, StageError> {
        self.collect_prefix(source, source.prefix(), now).await
    }

    /// Collect closed buckets from objects under `prefix`.
    ///
    /// `prefix` narrows the listing; bucket assignment still follows the
    /// key format of `source`. Objects in the open bucket, or in buckets
    /// after it, are left out. A listing failure fails the whole collection
    /// so a partial listing is never treated as a complete bucket.
    pub async fn collect_prefix(
        &self,
        source: Tier,
        prefix: &str,
        now: DateTime<Utc>,
    ) -> Result<Buckets, StageError> {
        let bucketer = Bucketer::for_source(source).ok_or(StageError::Terminal(source))?;

        let objects = with_store_retry(&self.retry, "list", prefix, || self.store.list(prefix))
            .await
            .map_err(|source| StageError::List {
                prefix: prefix.to_string(),
                source,
            })?;

        let listed = objects.len();
        let mut held = 0usize;
        let mut buckets = Buckets::new();
        for object in objects {
            if object.key.ends_with('/') {
                debug!(key = %object.key, "Skipping directory marker");
                continue;
            }

            let bucket = bucketer.bucket_of(&object, now);
            if !bucketer.is_closed(&bucket, now) {
                held += 1;
                continue;
            }
            buckets.entry(bucket).or_default().push(object);
        }

        info!(
            tier = %source,
            prefix = %prefix,
            listed,
            held,
            buckets = buckets.len(),
            "Collected closed buckets"
        );
        Ok(buckets)
    }
}
