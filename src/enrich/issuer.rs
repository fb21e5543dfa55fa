//! SIM issuer identification.
//!
//! An ICCID starts with an Issuer Identification Number (IIN): the telecom
//! major industry identifier `89`, a country calling code and an issuer code.
//! `IinTable` resolves an ICCID to its issuer by longest-prefix match over a
//! reference table loaded from YAML or JSON.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors loading an issuer table.
#[derive(Debug, Error)]
pub enum IssuerTableError {
    #[error("Failed to read issuer table {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse issuer table {path}: {message}")]
    Parse { path: String, message: String },

    #[error("Invalid IIN prefix {0:?}: must be ASCII digits")]
    InvalidPrefix(String),
}

/// Issuing organization of a SIM card.
///
/// Serialized as the enrichment value attached to a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Issuer {
    /// IIN prefix that matched, e.g. `894450`.
    pub iin: String,
    pub country_code: u16,
    pub country_name: String,
    pub company_name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub company_urls: Vec<String>,
}

/// Reference lookup from identifier to issuing organization.
pub trait IssuerLookup: Send + Sync {
    /// Issuer of `identifier`, or `None` if no entry matches.
    fn lookup(&self, identifier: &str) -> Option<Issuer>;
}

/// Longest-prefix-match table of IINs.
#[derive(Debug, Clone, Default)]
pub struct IinTable {
    entries: HashMap<String, Issuer>,
    max_prefix_len: usize,
}

impl IinTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a table from issuer entries keyed by their `iin`.
    pub fn from_issuers(
        issuers: impl IntoIterator<Item = Issuer>,
    ) -> Result<Self, IssuerTableError> {
        let mut table = Self::new();
        for issuer in issuers {
            table.insert(issuer)?;
        }
        Ok(table)
    }

    /// Load a table from a YAML or JSON file holding a list of issuers.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, IssuerTableError> {
        let path = path.as_ref();
        let display = path.display().to_string();
        let raw = std::fs::read_to_string(path).map_err(|source| IssuerTableError::Read {
            path: display.clone(),
            source,
        })?;

        // YAML is a superset of JSON, one parser covers both formats.
        let issuers: Vec<Issuer> =
            serde_yaml::from_str(&raw).map_err(|e| IssuerTableError::Parse {
                path: display,
                message: e.to_string(),
            })?;

        Self::from_issuers(issuers)
    }

    pub fn insert(&mut self, issuer: Issuer) -> Result<(), IssuerTableError> {
        if issuer.iin.is_empty() || !issuer.iin.bytes().all(|b| b.is_ascii_digit()) {
            return Err(IssuerTableError::InvalidPrefix(issuer.iin));
        }
        self.max_prefix_len = self.max_prefix_len.max(issuer.iin.len());
        self.entries.insert(issuer.iin.clone(), issuer);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl IssuerLookup for IinTable {
    fn lookup(&self, identifier: &str) -> Option<Issuer> {
        // ICCIDs may carry a trailing hex filler (`F`), only digits count.
        let digits_len = identifier
            .bytes()
            .take_while(|b| b.is_ascii_digit())
            .count();
        let digits = &identifier[..digits_len];

        (1..=digits_len.min(self.max_prefix_len))
            .rev()
            .find_map(|len| self.entries.get(&digits[..len]))
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn issuer(iin: &str, company: &str) -> Issuer {
        Issuer {
            iin: iin.to_string(),
            country_code: 44,
            country_name: "United Kingdom".to_string(),
            company_name: company.to_string(),
            company_urls: vec![],
        }
    }

    #[test]
    fn test_longest_prefix_wins() {
        let table = IinTable::from_issuers([
            issuer("8944", "Generic UK"),
            issuer("894450", "Carrier A"),
        ])
        .unwrap();

        assert_eq!(
            table.lookup("8944500000000000001").unwrap().company_name,
            "Carrier A"
        );
        assert_eq!(
            table.lookup("8944100000000000001").unwrap().company_name,
            "Generic UK"
        );
    }

    #[test]
    fn test_unknown_prefix_is_none() {
        let table = IinTable::from_issuers([issuer("8944", "Generic UK")]).unwrap();
        assert!(table.lookup("8949000000000000000").is_none());
        assert!(table.lookup("").is_none());
        assert!(table.lookup("not-an-iccid").is_none());
    }

    #[test]
    fn test_trailing_filler_is_ignored() {
        let table = IinTable::from_issuers([issuer("894450", "Carrier A")]).unwrap();
        assert!(table.lookup("894450000000000001F").is_some());
    }

    #[test]
    fn test_rejects_non_digit_prefix() {
        let result = IinTable::from_issuers([issuer("89AB", "Bad")]);
        assert!(matches!(result, Err(IssuerTableError::InvalidPrefix(_))));
    }

    #[test]
    fn test_load_yaml_table() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
- iin: "894450"
  countryCode: 44
  countryName: United Kingdom
  companyName: Carrier A
  companyUrls: ["https://carrier-a.example"]
- iin: "8946"
  countryCode: 46
  countryName: Sweden
  companyName: Carrier B
"#
        )
        .unwrap();

        let table = IinTable::load(file.path()).unwrap();

        assert_eq!(table.len(), 2);
        let found = table.lookup("8946000000000000000").unwrap();
        assert_eq!(found.country_code, 46);
        assert!(found.company_urls.is_empty());
    }

    #[test]
    fn test_load_json_table() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[{{"iin":"8944","countryCode":44,"countryName":"United Kingdom","companyName":"Generic UK"}}]"#
        )
        .unwrap();

        let table = IinTable::load(file.path()).unwrap();
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_load_missing_file() {
        let result = IinTable::load("/nonexistent/iin.yaml");
        assert!(matches!(result, Err(IssuerTableError::Read { .. })));
    }

    #[test]
    fn test_issuer_serializes_camel_case() {
        let json = serde_json::to_string(&issuer("8944", "Generic UK")).unwrap();
        assert_eq!(
            json,
            r#"{"iin":"8944","countryCode":44,"countryName":"United Kingdom","companyName":"Generic UK"}"#
        );
    }
}
