//! In-memory object store.
//!
//! Used for tests and dry runs. Supports failure injection so pipeline tests
//! can exercise listing, read, write and delete failures.

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use super::{validate_key, ObjectMeta, ObjectStore, Result, StoreError};

struct StoredObject {
    body: Vec<u8>,
    last_modified: DateTime<Utc>,
}

/// Object store that keeps objects in a sorted in-process map.
#[derive(Default)]
pub struct MemoryObjectStore {
    objects: RwLock<BTreeMap<String, StoredObject>>,
    fail_on_list: RwLock<bool>,
    fail_on_put: RwLock<bool>,
    fail_on_delete: RwLock<bool>,
    fail_get_keys: RwLock<HashSet<String>>,
    puts: AtomicUsize,
    deletes: AtomicUsize,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_fail_on_list(&self, fail: bool) {
        *self.fail_on_list.write().await = fail;
    }

    pub async fn set_fail_on_put(&self, fail: bool) {
        *self.fail_on_put.write().await = fail;
    }

    pub async fn set_fail_on_delete(&self, fail: bool) {
        *self.fail_on_delete.write().await = fail;
    }

    /// Make reads of `key` fail until cleared.
    pub async fn fail_get(&self, key: &str) {
        self.fail_get_keys.write().await.insert(key.to_string());
    }

    pub async fn clear_get_failures(&self) {
        self.fail_get_keys.write().await.clear();
    }

    /// Number of successful `put` calls so far.
    pub fn put_count(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }

    /// Number of successful `delete` calls so far.
    pub fn delete_count(&self) -> usize {
        self.deletes.load(Ordering::SeqCst)
    }

    /// Snapshot of all keys, sorted.
    pub async fn keys(&self) -> Vec<String> {
        self.objects.read().await.keys().cloned().collect()
    }

    /// Read an object as UTF-8 text, for assertions.
    pub async fn text(&self, key: &str) -> Option<String> {
        self.objects
            .read()
            .await
            .get(key)
            .map(|o| String::from_utf8_lossy(&o.body).into_owned())
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn list(&self, prefix: &str) -> Result<Vec<ObjectMeta>> {
        if *self.fail_on_list.read().await {
            return Err(StoreError::ListFailed {
                prefix: prefix.to_string(),
                message: "injected list failure".to_string(),
            });
        }

        let objects = self.objects.read().await;
        Ok(objects
            .range(prefix.to_string()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, object)| ObjectMeta {
                key: key.clone(),
                size: object.body.len() as u64,
                last_modified: Some(object.last_modified),
            })
            .collect())
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>> {
        if self.fail_get_keys.read().await.contains(key) {
            return Err(StoreError::ReadFailed {
                key: key.to_string(),
                message: "injected read failure".to_string(),
            });
        }

        self.objects
            .read()
            .await
            .get(key)
            .map(|o| o.body.clone())
            .ok_or_else(|| StoreError::NotFound(key.to_string()))
    }

    async fn put(&self, key: &str, body: Vec<u8>) -> Result<()> {
        validate_key(key)?;
        if *self.fail_on_put.read().await {
            return Err(StoreError::WriteFailed {
                key: key.to_string(),
                message: "injected write failure".to_string(),
            });
        }

        self.objects.write().await.insert(
            key.to_string(),
            StoredObject {
                body,
                last_modified: Utc::now(),
            },
        );
        self.puts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        if *self.fail_on_delete.read().await {
            return Err(StoreError::DeleteFailed {
                key: key.to_string(),
                message: "injected delete failure".to_string(),
            });
        }

        self.objects.write().await.remove(key);
        self.deletes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}
