//! Logroll - time-bucketed log compaction for object storage
//!
//! Producers drop small raw log objects under `raw/YYYY/MM/DD/HH/`. Logroll
//! rolls them up into one object per hour, the hours into days and the days
//! into months, enriching raw records with their SIM issuer on the way.
//!
//! - [`bucket`] - tiers, time buckets and eligibility
//! - [`compaction`] - collector, aggregator and the stage orchestrator
//! - [`enrich`] - per-record issuer enrichment
//! - [`backfill`] - retroactive enrichment of existing aggregates
//! - [`store`] - the object store contract and its backends

pub mod backfill;
pub mod bucket;
pub mod compaction;
pub mod config;
pub mod enrich;
pub mod store;
pub mod utils;
