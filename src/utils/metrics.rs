//! OTel-native metrics instruments.
//!
//! Centralized metric definitions using OpenTelemetry meters.
//! All instruments are lazily initialized and feature-gated behind `otel`.
//!
//! Naming follows OTel semantic conventions (dot-separated).

use std::sync::LazyLock;

use opentelemetry::metrics::{Counter, Histogram, Meter};
use opentelemetry::{global, KeyValue};

static METER: LazyLock<Meter> = LazyLock::new(|| global::meter("logroll"));

// ============================================================================
// Compaction
// ============================================================================

/// Duration of one compaction stage (collect + aggregate).
pub static STAGE_DURATION: LazyLock<Histogram<f64>> = LazyLock::new(|| {
    METER
        .f64_histogram("logroll.stage.duration")
        .with_description("Compaction stage duration")
        .with_unit("s")
        .build()
});

/// Total bucket aggregations attempted.
pub static AGGREGATE_TOTAL: LazyLock<Counter<u64>> = LazyLock::new(|| {
    METER
        .u64_counter("logroll.aggregate.total")
        .with_description("Total bucket aggregations")
        .build()
});

/// Total source objects retired after a successful aggregate write.
pub static OBJECTS_RETIRED_TOTAL: LazyLock<Counter<u64>> = LazyLock::new(|| {
    METER
        .u64_counter("logroll.objects.retired.total")
        .with_description("Total source objects retired")
        .build()
});

// ============================================================================
// Enrichment
// ============================================================================

/// Total records passed through the enricher.
pub static RECORDS_ENRICHED_TOTAL: LazyLock<Counter<u64>> = LazyLock::new(|| {
    METER
        .u64_counter("logroll.records.enriched.total")
        .with_description("Total records seen by the enricher")
        .build()
});

// ============================================================================
// Helper
// ============================================================================

/// Create an outcome label.
pub fn outcome_attr(outcome: &str) -> KeyValue {
    KeyValue::new("outcome", outcome.to_string())
}

/// Create a stage label (raw_to_hour, hour_to_day, day_to_month).
pub fn stage_attr(stage: &str) -> KeyValue {
    KeyValue::new("stage", stage.to_string())
}
