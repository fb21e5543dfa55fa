//! logroll-backfill: adds the SIM issuer to already-compacted records
//!
//! Walks the hour, day and month tiers (or the tiers / prefix given on the
//! command line) and rewrites every object holding records that lack the
//! issuer field. Safe to re-run: objects with nothing to add are left alone.
//!
//! Do not run against a tier that logroll-compact is rolling up at the same
//! time.

use std::sync::Arc;

use clap::Parser;
use tracing::{error, info, warn};

use logroll::backfill::Backfill;
use logroll::bucket::Tier;
use logroll::config::Config;
use logroll::enrich::Enricher;
use logroll::store::init_object_store;

#[derive(Parser, Debug)]
#[command(name = "logroll-backfill", version, about = "Enrich existing aggregates with SIM issuers")]
struct Args {
    /// Path to the YAML configuration file.
    #[arg(short, long)]
    config: Option<String>,

    /// Tier to backfill; repeat for several. Defaults to hour, day and month.
    #[arg(long = "tier", value_name = "TIER")]
    tiers: Vec<Tier>,

    /// Backfill only objects under this key prefix.
    #[arg(long, conflicts_with = "tiers")]
    prefix: Option<String>,

    /// Report what would change without writing.
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    logroll::utils::bootstrap::init_tracing();

    let args = Args::parse();
    let config = Config::load(args.config.as_deref()).map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;

    if config.enrichment.issuer_table.is_none() {
        return Err("Backfill requires 'enrichment.issuer_table' configuration".into());
    }

    info!(dry_run = args.dry_run, "Starting logroll-backfill");

    let store = init_object_store(&config.store).await?;
    let enricher = Arc::new(Enricher::from_config(&config.enrichment)?);
    let backfill =
        Backfill::new(store, enricher, config.compaction.retry.clone()).dry_run(args.dry_run);

    let report = match (&args.prefix, args.tiers.is_empty()) {
        (Some(prefix), _) => backfill.run(prefix).await?,
        (None, true) => backfill.run_aggregates().await?,
        (None, false) => backfill.run_tiers(&args.tiers).await?,
    };

    info!(
        scanned = report.scanned,
        rewritten = report.rewritten.len(),
        lines_enriched = report.lines_enriched,
        lines_unresolved = report.lines_unresolved,
        "Backfill summary"
    );

    if !report.failed.is_empty() {
        warn!(failed = ?report.failed, "Some objects could not be backfilled");
        return Err(format!("{} objects failed", report.failed.len()).into());
    }

    Ok(())
}
