//! Per-record transforms applied while aggregating.
//!
//! Aggregation runs every line of every member object through a
//! `LineTransform`. The raw→hour stage uses the `Enricher`, which attaches
//! the SIM issuer of the device's ICCID; later stages use `Identity`.
//!
//! Enrichment is additive: the issuer field is spliced into the original
//! line text, so every other byte of the record is preserved. Any failure
//! (not JSON, no ICCID, unknown issuer) returns the line untouched and logs
//! a diagnostic.

mod config;
mod issuer;

pub use config::EnrichmentConfig;
pub use issuer::{IinTable, Issuer, IssuerLookup, IssuerTableError};

use std::borrow::Cow;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};

/// Default JSON pointer to the device identifier inside a record.
pub const DEFAULT_IDENTIFIER_POINTER: &str = "/Message/iccid";
/// Default name of the field carrying the issuer.
pub const DEFAULT_ENRICHMENT_FIELD: &str = "simIssuer";

/// Pure per-line transform.
///
/// Implementations must be safe to call concurrently and must return the
/// input unchanged when they have nothing to add.
pub trait LineTransform: Send + Sync {
    fn transform<'a>(&self, line: &'a str) -> Cow<'a, str>;
}

/// Pass-through transform.
#[derive(Debug, Clone, Copy, Default)]
pub struct Identity;

impl LineTransform for Identity {
    fn transform<'a>(&self, line: &'a str) -> Cow<'a, str> {
        Cow::Borrowed(line)
    }
}

/// Why a line was left unenriched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Unenriched {
    /// Line is not valid JSON.
    NotJson,
    /// Line is JSON but not an object.
    NotObject,
    /// Record already carries the enrichment field.
    AlreadyEnriched,
    /// No identifier at the configured pointer.
    MissingIdentifier,
    /// Identifier did not resolve to an issuer.
    UnknownIssuer(String),
}

impl Unenriched {
    pub fn reason(&self) -> &'static str {
        match self {
            Unenriched::NotJson => "not_json",
            Unenriched::NotObject => "not_object",
            Unenriched::AlreadyEnriched => "already_enriched",
            Unenriched::MissingIdentifier => "missing_identifier",
            Unenriched::UnknownIssuer(_) => "unknown_issuer",
        }
    }
}

/// Attaches the SIM issuer to records that carry an ICCID.
#[derive(Clone)]
pub struct Enricher {
    lookup: Arc<dyn IssuerLookup>,
    identifier_pointer: String,
    field: String,
}

impl Enricher {
    pub fn new(lookup: Arc<dyn IssuerLookup>) -> Self {
        Self {
            lookup,
            identifier_pointer: DEFAULT_IDENTIFIER_POINTER.to_string(),
            field: DEFAULT_ENRICHMENT_FIELD.to_string(),
        }
    }

    /// Build from configuration, loading the issuer table if one is named.
    ///
    /// Without a table every lookup misses and records pass through.
    pub fn from_config(config: &EnrichmentConfig) -> Result<Self, IssuerTableError> {
        let table = match &config.issuer_table {
            Some(path) => IinTable::load(path)?,
            None => {
                warn!("No issuer table configured, records will not be enriched");
                IinTable::new()
            }
        };

        Ok(Self::new(Arc::new(table))
            .with_identifier_pointer(&config.identifier_pointer)
            .with_field(&config.field))
    }

    pub fn with_identifier_pointer(mut self, pointer: impl Into<String>) -> Self {
        self.identifier_pointer = pointer.into();
        self
    }

    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = field.into();
        self
    }

    /// Enrich a line, or explain why it was left alone.
    pub fn try_enrich(&self, line: &str) -> Result<String, Unenriched> {
        let record: Value = serde_json::from_str(line).map_err(|_| Unenriched::NotJson)?;
        let Value::Object(map) = &record else {
            return Err(Unenriched::NotObject);
        };
        if map.contains_key(&self.field) {
            return Err(Unenriched::AlreadyEnriched);
        }

        let identifier = match record.pointer(&self.identifier_pointer) {
            Some(Value::String(s)) if !s.is_empty() => s.clone(),
            // Numbers keep their literal digits, so 20-digit ICCIDs survive.
            Some(Value::Number(n)) => n.to_string(),
            _ => return Err(Unenriched::MissingIdentifier),
        };

        let issuer = self
            .lookup
            .lookup(&identifier)
            .ok_or_else(|| Unenriched::UnknownIssuer(identifier.clone()))?;

        // Serializing a plain struct and a str cannot fail.
        let value = serde_json::to_string(&issuer).map_err(|_| Unenriched::NotObject)?;
        let name = serde_json::to_string(&self.field).map_err(|_| Unenriched::NotObject)?;

        // A parsed object always ends in '}' once trailing whitespace is gone.
        let close = line.trim_end().len() - 1;
        let separator = if map.is_empty() { "" } else { "," };
        Ok(format!(
            "{}{}{}:{}{}",
            &line[..close],
            separator,
            name,
            value,
            &line[close..]
        ))
    }

    /// Enrich a line, returning it unchanged on any failure.
    pub fn enrich<'a>(&self, line: &'a str) -> Cow<'a, str> {
        let outcome = self.try_enrich(line);

        #[cfg(feature = "otel")]
        {
            use crate::utils::metrics::{self, RECORDS_ENRICHED_TOTAL};
            let outcome = match &outcome {
                Ok(_) => "enriched",
                Err(reason) => reason.reason(),
            };
            RECORDS_ENRICHED_TOTAL.add(1, &[metrics::outcome_attr(outcome)]);
        }

        match outcome {
            Ok(enriched) => Cow::Owned(enriched),
            Err(Unenriched::AlreadyEnriched) => {
                debug!(field = %self.field, "Record already enriched");
                Cow::Borrowed(line)
            }
            Err(Unenriched::UnknownIssuer(identifier)) => {
                warn!(
                    reason = "unknown_issuer",
                    identifier = %identifier,
                    "Could not identify issuer for identifier"
                );
                Cow::Borrowed(line)
            }
            Err(other) => {
                warn!(
                    reason = other.reason(),
                    pointer = %self.identifier_pointer,
                    body = %line,
                    "Record not enriched"
                );
                Cow::Borrowed(line)
            }
        }
    }
}

impl LineTransform for Enricher {
    fn transform<'a>(&self, line: &'a str) -> Cow<'a, str> {
        self.enrich(line)
    }
}
