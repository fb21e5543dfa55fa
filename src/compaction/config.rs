//! Compaction configuration.

use serde::Deserialize;

use crate::utils::retry::RetryConfig;

/// What to do when a bucket member cannot be read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemberFailurePolicy {
    /// Log and leave the member in place; aggregate the rest of the bucket.
    /// The member is picked up again by a later run.
    #[default]
    Skip,
    /// Abandon the whole bucket; nothing is written or retired.
    Abort,
}

/// Configuration for compaction passes.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CompactionConfig {
    /// Buckets aggregated concurrently within a stage.
    pub bucket_concurrency: usize,

    /// Policy for unreadable bucket members.
    pub member_failure: MemberFailurePolicy,

    /// Retry policy for store operations.
    pub retry: RetryConfig,
}

impl Default for CompactionConfig {
    fn default() -> Self {
        Self {
            bucket_concurrency: 4,
            member_failure: MemberFailurePolicy::default(),
            retry: RetryConfig::default(),
        }
    }
}
