//! logroll-compact: rolls raw logs up into hourly, daily and monthly objects
//!
//! Runs the three compaction stages once and exits, or keeps running them
//! on a fixed interval with `--interval`.
//!
//! ## Configuration
//! - `--config` or LOGROLL_CONFIG: YAML configuration file
//! - LOGROLL__STORE__TYPE: filesystem | memory | s3
//! - LOGROLL__ENRICHMENT__ISSUER_TABLE: issuer table used for enrichment
//! - LOGROLL_LOG: log filter (default "info")
//!
//! Exits non-zero if any stage failed.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use clap::Parser;
use tracing::{error, info};

use logroll::compaction::Compactor;
use logroll::config::Config;
use logroll::enrich::{Enricher, Identity, LineTransform};
use logroll::store::init_object_store;

#[derive(Parser, Debug)]
#[command(name = "logroll-compact", version, about = "Compact raw logs into hourly, daily and monthly rollups")]
struct Args {
    /// Path to the YAML configuration file.
    #[arg(short, long)]
    config: Option<String>,

    /// Keep running, starting a compaction pass every SECS seconds.
    #[arg(long, value_name = "SECS")]
    interval: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    logroll::utils::bootstrap::init_tracing();

    let args = Args::parse();
    let config = Config::load(args.config.as_deref()).map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;

    info!("Starting logroll-compact");

    let store = init_object_store(&config.store).await?;

    let enricher: Arc<dyn LineTransform> = if config.enrichment.enabled {
        Arc::new(Enricher::from_config(&config.enrichment)?)
    } else {
        info!("Enrichment disabled, raw records are copied verbatim");
        Arc::new(Identity)
    };

    let compactor = Compactor::new(store, enricher, config.compaction.clone());

    match args.interval {
        Some(secs) => {
            tokio::select! {
                _ = compactor.run_periodically(Duration::from_secs(secs.max(1))) => {}
                _ = tokio::signal::ctrl_c() => {
                    info!("Shutdown signal received");
                }
            }
        }
        None => {
            let report = compactor.run(Utc::now()).await?;
            for stage in &report.stages {
                info!(
                    stage = %stage.stage,
                    written = stage.aggregate.written.len(),
                    retired = stage.aggregate.objects_retired,
                    "Stage summary"
                );
            }
        }
    }

    Ok(())
}
