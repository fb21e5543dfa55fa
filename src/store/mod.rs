//! Object storage for log tiers.
//!
//! Every tier of the rollup chain (raw, hours, days, months) lives in a single
//! key/value blob store addressed by slash-separated keys. This module defines
//! the `ObjectStore` contract the compaction pipeline consumes and the
//! backends that fulfil it.
//!
//! ## Storage Backends
//!
//! - `MemoryObjectStore` - In-process map, with failure injection for tests
//! - `FilesystemObjectStore` - Local filesystem storage
//! - `S3ObjectStore` (feature: s3) - Amazon S3 and S3-compatible services
//!
//! ## Consistency
//!
//! Backends must provide read-after-write consistent listing: an object
//! written by one stage must appear in the next stage's listing within the
//! same invocation, and a deleted object must not.

mod config;
mod filesystem;
mod memory;
#[cfg(feature = "s3")]
mod s3;

#[cfg(feature = "s3")]
pub use config::S3StoreConfig;
pub use config::{FilesystemStoreConfig, ObjectStoreType, StoreConfig};
pub use filesystem::FilesystemObjectStore;
pub use memory::MemoryObjectStore;
#[cfg(feature = "s3")]
pub use s3::S3ObjectStore;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Errors that can occur during object store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Invalid object key: {0}")]
    InvalidKey(String),

    #[error("Failed to list objects under {prefix}: {message}")]
    ListFailed { prefix: String, message: String },

    #[error("Failed to read object {key}: {message}")]
    ReadFailed { key: String, message: String },

    #[error("Failed to write object {key}: {message}")]
    WriteFailed { key: String, message: String },

    #[error("Failed to delete object {key}: {message}")]
    DeleteFailed { key: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    /// Whether retrying the same operation may succeed.
    ///
    /// Missing objects and malformed keys are permanent; everything else is
    /// treated as a transient backend failure.
    pub fn is_transient(&self) -> bool {
        !matches!(self, StoreError::NotFound(_) | StoreError::InvalidKey(_))
    }
}

/// Result type for object store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Listing entry for a stored object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectMeta {
    /// Full object key, e.g. `raw/2023/05/01/10/device-1.json`.
    pub key: String,
    /// Size in bytes.
    pub size: u64,
    /// Last modification time, when the backend reports one.
    pub last_modified: Option<DateTime<Utc>>,
}

/// Blob store holding every tier of the rollup chain.
///
/// `list` returns entries sorted by key. Keys are ASCII and slash-separated;
/// the key format of each tier embeds its timestamp so key order is also
/// chronological order.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// List all objects whose key starts with `prefix`, sorted by key.
    async fn list(&self, prefix: &str) -> Result<Vec<ObjectMeta>>;

    /// Read an object's full content.
    async fn get(&self, key: &str) -> Result<Vec<u8>>;

    /// Create or replace an object.
    ///
    /// Returns only once the write is durable.
    async fn put(&self, key: &str, body: Vec<u8>) -> Result<()>;

    /// Remove an object. Deleting a missing key is not an error.
    async fn delete(&self, key: &str) -> Result<()>;

    /// Short backend name for logs.
    fn backend(&self) -> &'static str;
}

/// Reject keys that could escape a backend's namespace.
pub(crate) fn validate_key(key: &str) -> Result<()> {
    if key.is_empty()
        || key.starts_with('/')
        || key.split('/').any(|segment| segment == ".." || segment == ".")
    {
        return Err(StoreError::InvalidKey(key.to_string()));
    }
    Ok(())
}

// ============================================================================
// Factory
// ============================================================================

/// Initialize an object store based on configuration.
///
/// # Errors
///
/// Returns error if the backend cannot be constructed (unwritable base
/// directory, missing AWS configuration).
pub async fn init_object_store(
    config: &StoreConfig,
) -> std::result::Result<Arc<dyn ObjectStore>, Box<dyn std::error::Error>> {
    use tracing::info;

    match config.store_type {
        ObjectStoreType::Filesystem => {
            info!(
                path = %config.filesystem.base_path.display(),
                "ObjectStore: filesystem"
            );
            let store = FilesystemObjectStore::new(&config.filesystem.base_path).await?;
            Ok(Arc::new(store))
        }
        ObjectStoreType::Memory => {
            info!("ObjectStore: memory");
            Ok(Arc::new(MemoryObjectStore::new()))
        }
        #[cfg(feature = "s3")]
        ObjectStoreType::S3 => {
            info!(
                bucket = %config.s3.bucket,
                prefix = ?config.s3.prefix,
                region = ?config.s3.region,
                endpoint = ?config.s3.endpoint,
                "ObjectStore: s3"
            );
            let store = match &config.s3.endpoint {
                Some(endpoint) => {
                    S3ObjectStore::with_endpoint(
                        &config.s3.bucket,
                        config.s3.prefix.clone(),
                        endpoint,
                        config.s3.region.as_deref(),
                    )
                    .await
                }
                None => S3ObjectStore::new(&config.s3.bucket, config.s3.prefix.clone()).await,
            };
            Ok(Arc::new(store))
        }
    }
}
