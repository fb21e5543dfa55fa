//! Enrichment configuration.

use std::path::PathBuf;

use serde::Deserialize;

use super::{DEFAULT_ENRICHMENT_FIELD, DEFAULT_IDENTIFIER_POINTER};

/// Configuration for issuer enrichment during the raw→hour stage.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EnrichmentConfig {
    /// Enrich records during raw→hour aggregation.
    /// When false, raw lines are concatenated verbatim.
    pub enabled: bool,

    /// JSON pointer (RFC 6901) to the device identifier in a record.
    pub identifier_pointer: String,

    /// Name of the field added to enriched records.
    pub field: String,

    /// Path to the IIN issuer table (YAML or JSON list of issuers).
    pub issuer_table: Option<PathBuf>,
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            identifier_pointer: DEFAULT_IDENTIFIER_POINTER.to_string(),
            field: DEFAULT_ENRICHMENT_FIELD.to_string(),
            issuer_table: None,
        }
    }
}
