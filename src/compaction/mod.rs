//! Compaction orchestration.
//!
//! One invocation runs three stages in order:
//!
//! 1. raw → hours, enriching every record
//! 2. hours → days
//! 3. days → months
//!
//! Each stage collects the closed buckets of its source tier, aggregates
//! them and retires the sources. A later stage only starts once the earlier
//! one finished, so aggregates written by stage N are visible to stage N+1
//! in the same invocation. A stage that fails halts the chain; objects it
//! left behind are picked up by the next invocation.
//!
//! ## Convergence
//!
//! Stages never modify an object in place. Sources are deleted only after
//! the aggregate holding their records has been written, so an interrupted
//! run may leave records duplicated across tiers but never loses them.

mod aggregator;
mod collector;
mod config;
mod naming;

pub use aggregator::{AggregateReport, Aggregator, BucketError};
pub use collector::{Buckets, Collector};
pub use config::{CompactionConfig, MemberFailurePolicy};
pub use naming::{SequentialTokens, TokenSource, UuidTokens};

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::time::{interval, Interval, MissedTickBehavior};
use tracing::{error, info, warn};

use crate::bucket::Tier;
use crate::enrich::{Identity, LineTransform};
use crate::store::{ObjectStore, StoreError};

/// One step of the rollup chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    RawToHour,
    HourToDay,
    DayToMonth,
}

impl Stage {
    /// All stages, in execution order.
    pub const ALL: [Stage; 3] = [Stage::RawToHour, Stage::HourToDay, Stage::DayToMonth];

    pub fn source(&self) -> Tier {
        match self {
            Stage::RawToHour => Tier::Raw,
            Stage::HourToDay => Tier::Hour,
            Stage::DayToMonth => Tier::Day,
        }
    }

    pub fn destination(&self) -> Tier {
        match self {
            Stage::RawToHour => Tier::Hour,
            Stage::HourToDay => Tier::Day,
            Stage::DayToMonth => Tier::Month,
        }
    }

    /// Stage that runs after this one, if any.
    pub fn next(&self) -> Option<Stage> {
        match self {
            Stage::RawToHour => Some(Stage::HourToDay),
            Stage::HourToDay => Some(Stage::DayToMonth),
            Stage::DayToMonth => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Stage::RawToHour => "raw_to_hour",
            Stage::HourToDay => "hour_to_day",
            Stage::DayToMonth => "day_to_month",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Why a stage did not complete.
#[derive(Debug, Error)]
pub enum StageError {
    #[error("Listing {prefix} failed: {source}")]
    List {
        prefix: String,
        #[source]
        source: StoreError,
    },

    #[error("{failed} of {total} buckets failed")]
    BucketsFailed {
        failed: usize,
        total: usize,
        /// What the stage's other buckets wrote and retired.
        partial: Box<AggregateReport>,
    },

    #[error("Tier {0} is terminal and has no rollup")]
    Terminal(Tier),
}

/// Errors from a compaction run.
#[derive(Debug, Error)]
pub enum CompactionError {
    #[error("Stage {stage} failed: {source}")]
    Stage {
        stage: Stage,
        #[source]
        source: StageError,
        /// Stages that completed before the failure.
        completed: Vec<StageReport>,
    },
}

/// Outcome of one completed stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageReport {
    pub stage: Stage,
    pub aggregate: AggregateReport,
}

/// Outcome of a full compaction run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompactionReport {
    pub stages: Vec<StageReport>,
}

impl CompactionReport {
    /// Report for `stage`, if it ran.
    pub fn stage(&self, stage: Stage) -> Option<&StageReport> {
        self.stages.iter().find(|report| report.stage == stage)
    }

    /// Aggregates written across all stages.
    pub fn written(&self) -> usize {
        self.stages.iter().map(|s| s.aggregate.written.len()).sum()
    }

    /// Source objects retired across all stages.
    pub fn retired(&self) -> usize {
        self.stages.iter().map(|s| s.aggregate.objects_retired).sum()
    }
}

/// Runs the rollup chain against one object store.
pub struct Compactor {
    collector: Collector,
    aggregator: Aggregator,
    enricher: Arc<dyn LineTransform>,
}

impl Compactor {
    /// Create a compactor that enriches raw records with `enricher`.
    pub fn new(
        store: Arc<dyn ObjectStore>,
        enricher: Arc<dyn LineTransform>,
        config: CompactionConfig,
    ) -> Self {
        Self::with_tokens(store, enricher, Arc::new(UuidTokens), config)
    }

    /// Create a compactor with a custom aggregate naming source.
    pub fn with_tokens(
        store: Arc<dyn ObjectStore>,
        enricher: Arc<dyn LineTransform>,
        tokens: Arc<dyn TokenSource>,
        config: CompactionConfig,
    ) -> Self {
        info!(
            backend = store.backend(),
            bucket_concurrency = config.bucket_concurrency,
            member_failure = ?config.member_failure,
            "Compactor configured"
        );
        Self {
            collector: Collector::new(Arc::clone(&store), config.retry.clone()),
            aggregator: Aggregator::new(store, tokens, config),
            enricher,
        }
    }

    /// Run every stage once, in order, against the clock reading `now`.
    ///
    /// Halts at the first failed stage; later stages do not run.
    pub async fn run(&self, now: DateTime<Utc>) -> Result<CompactionReport, CompactionError> {
        let mut report = CompactionReport::default();
        let mut next = Some(Stage::RawToHour);

        while let Some(stage) = next {
            match self.run_stage(stage, now).await {
                Ok(stage_report) => report.stages.push(stage_report),
                Err(source) => {
                    error!(stage = %stage, error = %source, "Stage failed, halting run");
                    return Err(CompactionError::Stage {
                        stage,
                        source,
                        completed: report.stages,
                    });
                }
            }
            next = stage.next();
        }

        info!(
            written = report.written(),
            retired = report.retired(),
            "Compaction run complete"
        );
        Ok(report)
    }

    /// Run a single stage.
    ///
    /// Buckets are aggregated independently; the stage fails if any of them
    /// failed, after the others have finished.
    pub async fn run_stage(
        &self,
        stage: Stage,
        now: DateTime<Utc>,
    ) -> Result<StageReport, StageError> {
        let started = Instant::now();
        let source = stage.source();

        let buckets = self.collector.collect(source, now).await?;
        let aggregate = self
            .aggregator
            .aggregate(buckets, self.transform_for(stage))
            .await;

        #[cfg(feature = "otel")]
        crate::utils::metrics::STAGE_DURATION.record(
            started.elapsed().as_secs_f64(),
            &[crate::utils::metrics::stage_attr(stage.name())],
        );

        info!(
            stage = %stage,
            buckets = aggregate.buckets,
            written = aggregate.written.len(),
            read = aggregate.objects_read,
            retired = aggregate.objects_retired,
            skipped = aggregate.objects_skipped.len(),
            retire_failures = aggregate.retire_failures.len(),
            failed = aggregate.failed_buckets.len(),
            lines = aggregate.lines,
            elapsed = ?started.elapsed(),
            "Stage complete"
        );

        if !aggregate.failed_buckets.is_empty() {
            return Err(StageError::BucketsFailed {
                failed: aggregate.failed_buckets.len(),
                total: aggregate.buckets,
                partial: Box::new(aggregate),
            });
        }

        Ok(StageReport { stage, aggregate })
    }

    /// Run the chain every `every`, forever.
    ///
    /// Failed runs are logged; the next tick starts a fresh run.
    pub async fn run_periodically(&self, every: Duration) {
        info!(interval = ?every, "Starting periodic compaction");

        let mut ticker = pass_ticker(every);
        loop {
            ticker.tick().await;

            if let Err(e) = self.run(Utc::now()).await {
                warn!(error = %e, "Compaction run failed, retrying next tick");
            }
        }
    }

    fn transform_for(&self, stage: Stage) -> Arc<dyn LineTransform> {
        match stage {
            Stage::RawToHour => Arc::clone(&self.enricher),
            Stage::HourToDay | Stage::DayToMonth => Arc::new(Identity),
        }
    }
}

/// Ticker for periodic passes. A pass that overruns the interval delays
/// the next one; missed ticks are not replayed.
fn pass_ticker(every: Duration) -> Interval {
    let mut ticker = interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}
