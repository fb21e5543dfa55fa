//! Application configuration.
//!
//! Aggregates configuration from all modules into a single Config struct
//! that can be loaded from YAML files or environment variables.
//!
//! Sources, later overriding earlier:
//!
//! 1. `logroll.yaml` in the working directory, if present
//! 2. the file passed on the command line
//! 3. the file named by `LOGROLL_CONFIG`
//! 4. `LOGROLL__SECTION__KEY` environment variables

use serde::Deserialize;

use crate::compaction::CompactionConfig;
use crate::enrich::EnrichmentConfig;
use crate::store::StoreConfig;

/// Default configuration file name.
pub const DEFAULT_CONFIG_FILE: &str = "logroll.yaml";
/// Environment variable for configuration file path.
pub const CONFIG_ENV_VAR: &str = "LOGROLL_CONFIG";
/// Prefix for environment variable overrides.
pub const CONFIG_ENV_PREFIX: &str = "LOGROLL";
/// Environment variable for logging configuration.
pub const LOG_ENV_VAR: &str = "LOGROLL_LOG";

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Object store holding every tier.
    pub store: StoreConfig,
    /// Compaction passes.
    pub compaction: CompactionConfig,
    /// Raw record enrichment.
    pub enrichment: EnrichmentConfig,
}

impl Config {
    /// Load configuration from files and environment.
    pub fn load(path: Option<&str>) -> Result<Self, Box<dyn std::error::Error>> {
        use ::config::{Config as ConfigLib, Environment, File, FileFormat};

        let mut builder = ConfigLib::builder()
            .add_source(File::new(DEFAULT_CONFIG_FILE, FileFormat::Yaml).required(false));

        if let Some(config_path) = path {
            builder = builder.add_source(File::new(config_path, FileFormat::Yaml).required(true));
        }

        if let Ok(config_path) = std::env::var(CONFIG_ENV_VAR) {
            builder = builder.add_source(File::new(&config_path, FileFormat::Yaml).required(true));
        }

        let config = builder
            .add_source(
                Environment::with_prefix(CONFIG_ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Config = config.try_deserialize()?;
        Ok(config)
    }
}
