//! Retroactive enrichment of existing aggregates.
//!
//! Records written before enrichment was enabled, or before the issuer table
//! knew their prefix, sit in the aggregate tiers without an issuer. The
//! backfill walks a tier, enriches every line that lacks the issuer field
//! and rewrites the object under its own key.
//!
//! Objects are rewritten only when at least one line changed, so a second
//! pass over the same tier performs no writes. Blank lines and lines that
//! cannot be enriched are kept exactly as they were.
//!
//! Backfill rewrites objects in place: do not run it against a tier that a
//! compaction run is rolling up at the same time, or a retired object could
//! be written back.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::bucket::Tier;
use crate::enrich::{Enricher, Unenriched};
use crate::store::{ObjectStore, StoreError};
use crate::utils::retry::{with_store_retry, RetryConfig};

/// Errors that stop a backfill pass.
#[derive(Debug, Error)]
pub enum BackfillError {
    #[error("Listing {prefix} failed: {source}")]
    List {
        prefix: String,
        #[source]
        source: StoreError,
    },
}

/// Totals for a backfill pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BackfillReport {
    /// Objects listed and read.
    pub scanned: usize,
    /// Objects rewritten (or that would be, in a dry run).
    pub rewritten: Vec<String>,
    /// Lines that gained the issuer field.
    pub lines_enriched: usize,
    /// Lines already carrying the issuer field.
    pub lines_already_enriched: usize,
    /// Non-blank lines that could not be enriched.
    pub lines_unresolved: usize,
    /// Objects that could not be read or written.
    pub failed: Vec<String>,
}

impl BackfillReport {
    fn merge(&mut self, other: BackfillReport) {
        self.scanned += other.scanned;
        self.rewritten.extend(other.rewritten);
        self.lines_enriched += other.lines_enriched;
        self.lines_already_enriched += other.lines_already_enriched;
        self.lines_unresolved += other.lines_unresolved;
        self.failed.extend(other.failed);
    }
}

#[derive(Debug, Default)]
struct Rewrite {
    body: Vec<u8>,
    enriched: usize,
    already: usize,
    unresolved: usize,
}

/// Re-enriches objects already in the store.
pub struct Backfill {
    store: Arc<dyn ObjectStore>,
    enricher: Arc<Enricher>,
    retry: RetryConfig,
    dry_run: bool,
}

impl Backfill {
    pub fn new(store: Arc<dyn ObjectStore>, enricher: Arc<Enricher>, retry: RetryConfig) -> Self {
        Self {
            store,
            enricher,
            retry,
            dry_run: false,
        }
    }

    /// Report what would change without writing anything.
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Backfill every aggregate tier: hours, days, months.
    pub async fn run_aggregates(&self) -> Result<BackfillReport, BackfillError> {
        self.run_tiers(&Tier::AGGREGATES).await
    }

    /// Backfill the given tiers in order.
    pub async fn run_tiers(&self, tiers: &[Tier]) -> Result<BackfillReport, BackfillError> {
        let mut report = BackfillReport::default();
        for tier in tiers {
            report.merge(self.run(tier.prefix()).await?);
        }
        Ok(report)
    }

    /// Backfill every object under `prefix`.
    ///
    /// A listing failure stops the pass. Per-object read or write failures
    /// are logged and recorded; the pass moves on to the next object.
    pub async fn run(&self, prefix: &str) -> Result<BackfillReport, BackfillError> {
        info!(prefix = %prefix, dry_run = self.dry_run, "Starting backfill");

        let objects = with_store_retry(&self.retry, "list", prefix, || self.store.list(prefix))
            .await
            .map_err(|source| BackfillError::List {
                prefix: prefix.to_string(),
                source,
            })?;

        let mut report = BackfillReport::default();
        for object in objects {
            let key = object.key.as_str();
            let content =
                match with_store_retry(&self.retry, "get", key, || self.store.get(key)).await {
                    Ok(content) => content,
                    Err(e) => {
                        error!(key = %key, error = %e, "Failed to read object for backfill");
                        report.failed.push(key.to_string());
                        continue;
                    }
                };
            report.scanned += 1;

            let rewrite = self.rewrite(&content);
            report.lines_already_enriched += rewrite.already;
            report.lines_unresolved += rewrite.unresolved;
            if rewrite.enriched == 0 {
                debug!(key = %key, "Nothing to backfill");
                continue;
            }

            if !self.dry_run {
                let body = rewrite.body;
                let written =
                    with_store_retry(&self.retry, "put", key, || self.store.put(key, body.clone()))
                        .await;
                if let Err(e) = written {
                    error!(key = %key, error = %e, "Failed to rewrite object");
                    report.failed.push(key.to_string());
                    continue;
                }
            }

            info!(
                key = %key,
                lines = rewrite.enriched,
                dry_run = self.dry_run,
                "Backfilled object"
            );
            report.lines_enriched += rewrite.enriched;
            report.rewritten.push(key.to_string());
        }

        if !report.failed.is_empty() {
            warn!(
                prefix = %prefix,
                failed = report.failed.len(),
                "Backfill finished with failures"
            );
        }
        info!(
            prefix = %prefix,
            scanned = report.scanned,
            rewritten = report.rewritten.len(),
            lines_enriched = report.lines_enriched,
            lines_unresolved = report.lines_unresolved,
            "Backfill complete"
        );
        Ok(report)
    }

    /// Enrich each line of `content`, keeping line structure intact.
    fn rewrite(&self, content: &[u8]) -> Rewrite {
        let mut rewrite = Rewrite::default();
        let mut first = true;
        for line in content.split(|b| *b == b'\n') {
            if !first {
                rewrite.body.push(b'\n');
            }
            first = false;

            if line.iter().all(u8::is_ascii_whitespace) {
                rewrite.body.extend_from_slice(line);
                continue;
            }
            let Ok(text) = std::str::from_utf8(line) else {
                rewrite.unresolved += 1;
                rewrite.body.extend_from_slice(line);
                continue;
            };
            match self.enricher.try_enrich(text) {
                Ok(enriched) => {
                    rewrite.enriched += 1;
                    rewrite.body.extend_from_slice(enriched.as_bytes());
                }
                Err(Unenriched::AlreadyEnriched) => {
                    rewrite.already += 1;
                    rewrite.body.extend_from_slice(line);
                }
                Err(reason) => {
                    debug!(reason = reason.reason(), "Line left unenriched");
                    rewrite.unresolved += 1;
                    rewrite.body.extend_from_slice(line);
                }
            }
        }
        rewrite
    }
}
