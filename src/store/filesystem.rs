//! Filesystem-based object storage.
//!
//! Object keys map directly onto relative paths below a base directory:
//! ```text
//! {base_path}/
//!   raw/2023/05/01/10/{producer-file}
//!   hours/2023-05-01T10-{token}
//!   days/2023-05-01-{token}
//!   months/2023-05-{token}
//! ```
//!
//! Writes go to a hidden temporary sibling which is synced and then renamed
//! over the destination, so a listing never observes a half-written object.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use super::{validate_key, ObjectMeta, ObjectStore, Result, StoreError};

const TEMP_SUFFIX: &str = ".tmp";

/// Filesystem-based object store.
pub struct FilesystemObjectStore {
    base_path: PathBuf,
}

impl FilesystemObjectStore {
    /// Create a new filesystem object store.
    ///
    /// Creates the base directory if it doesn't exist.
    pub async fn new(base_path: impl AsRef<Path>) -> Result<Self> {
        let base_path = base_path.as_ref().to_path_buf();
        fs::create_dir_all(&base_path).await?;
        Ok(Self { base_path })
    }

    /// Get the file path for a given key.
    fn path_for_key(&self, key: &str) -> Result<PathBuf> {
        validate_key(key)?;
        Ok(key
            .split('/')
            .fold(self.base_path.clone(), |path, segment| path.join(segment)))
    }

    /// Rebuild the object key for a path below the base directory.
    fn key_for_path(&self, path: &Path) -> Option<String> {
        let relative = path.strip_prefix(&self.base_path).ok()?;
        let segments: Option<Vec<&str>> = relative
            .components()
            .map(|c| c.as_os_str().to_str())
            .collect();
        Some(segments?.join("/"))
    }

    /// Directory to start walking from for a listing prefix.
    ///
    /// Only the part of the prefix up to its last `/` names a directory;
    /// the remainder is a partial file or directory name.
    fn walk_root(&self, prefix: &str) -> PathBuf {
        match prefix.rfind('/') {
            Some(idx) => prefix[..idx]
                .split('/')
                .filter(|s| !s.is_empty())
                .fold(self.base_path.clone(), |path, segment| path.join(segment)),
            None => self.base_path.clone(),
        }
    }
}

fn is_temp_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with('.') && n.ends_with(TEMP_SUFFIX))
}

#[async_trait]
impl ObjectStore for FilesystemObjectStore {
    async fn list(&self, prefix: &str) -> Result<Vec<ObjectMeta>> {
        let root = self.walk_root(prefix);
        let mut objects = Vec::new();
        let mut pending = vec![root];

        while let Some(dir) = pending.pop() {
            let mut entries = match fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => {
                    return Err(StoreError::ListFailed {
                        prefix: prefix.to_string(),
                        message: e.to_string(),
                    })
                }
            };

            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                let file_type = entry.file_type().await?;

                if file_type.is_dir() {
                    pending.push(path);
                    continue;
                }
                if !file_type.is_file() || is_temp_file(&path) {
                    continue;
                }

                let Some(key) = self.key_for_path(&path) else {
                    continue;
                };
                if !key.starts_with(prefix) {
                    continue;
                }

                let metadata = entry.metadata().await?;
                objects.push(ObjectMeta {
                    key,
                    size: metadata.len(),
                    last_modified: metadata.modified().ok().map(DateTime::<Utc>::from),
                });
            }
        }

        objects.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(objects)
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>> {
        let path = self.path_for_key(key)?;

        match fs::read(&path).await {
            Ok(body) => Ok(body),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(StoreError::NotFound(key.to_string())),
            Err(e) => Err(StoreError::ReadFailed {
                key: key.to_string(),
                message: e.to_string(),
            }),
        }
    }

    async fn put(&self, key: &str, body: Vec<u8>) -> Result<()> {
        let path = self.path_for_key(key)?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        // Write atomically using a hidden temp file + rename
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| StoreError::InvalidKey(key.to_string()))?;
        let temp_path = path.with_file_name(format!(".{}{}", file_name, TEMP_SUFFIX));

        let write = async {
            let mut file = fs::File::create(&temp_path).await?;
            file.write_all(&body).await?;
            file.sync_all().await?;
            fs::rename(&temp_path, &path).await
        };

        if let Err(e) = write.await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(StoreError::WriteFailed {
                key: key.to_string(),
                message: e.to_string(),
            });
        }

        debug!(key = %key, size = body.len(), "Stored object");
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let path = self.path_for_key(key)?;

        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::DeleteFailed {
                key: key.to_string(),
                message: e.to_string(),
            }),
        }
    }

    fn backend(&self) -> &'static str {
        "filesystem"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn create_temp_store() -> (FilesystemObjectStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let store = FilesystemObjectStore::new(temp_dir.path()).await.unwrap();
        (store, temp_dir)
    }

    #[tokio::test]
    async fn test_put_creates_nested_directories() {
        let (store, temp) = create_temp_store().await;

        store
            .put("raw/2023/05/01/10/device-1.json", b"line".to_vec())
            .await
            .unwrap();

        let on_disk = temp.path().join("raw/2023/05/01/10/device-1.json");
        assert!(on_disk.exists());
    }

    #[tokio::test]
    async fn test_list_partial_file_name_prefix() {
        let (store, _temp) = create_temp_store().await;
        store
            .put("hours/2023-05-01T10-a", b"1".to_vec())
            .await
            .unwrap();
        store
            .put("hours/2023-05-02T10-b", b"2".to_vec())
            .await
            .unwrap();
        store
            .put("hours/2023-06-01T00-c", b"3".to_vec())
            .await
            .unwrap();

        let keys: Vec<String> = store
            .list("hours/2023-05")
            .await
            .unwrap()
            .into_iter()
            .map(|o| o.key)
            .collect();

        assert_eq!(keys, vec!["hours/2023-05-01T10-a", "hours/2023-05-02T10-b"]);
    }

    #[tokio::test]
    async fn test_list_skips_temp_files() {
        let (store, temp) = create_temp_store().await;
        store.put("days/2023-05-01-a", b"x".to_vec()).await.unwrap();
        std::fs::write(temp.path().join("days/.2023-05-02-b.tmp"), b"partial").unwrap();

        let listed = store.list("days/").await.unwrap();

        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].key, "days/2023-05-01-a");
        assert_eq!(listed[0].size, 1);
        assert!(listed[0].last_modified.is_some());
    }

    #[tokio::test]
    async fn test_list_missing_prefix_is_empty() {
        let (store, _temp) = create_temp_store().await;
        assert!(store.list("months/").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_get_not_found() {
        let (store, _temp) = create_temp_store().await;
        let result = store.get("raw/nope").await;
        assert!(matches!(result, Err(StoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_delete_missing_is_ok() {
        let (store, _temp) = create_temp_store().await;
        assert!(store.delete("raw/never-written").await.is_ok());
    }

    #[tokio::test]
    async fn test_rejects_escaping_keys() {
        let (store, _temp) = create_temp_store().await;
        let result = store.put("../outside", b"x".to_vec()).await;
        assert!(matches!(result, Err(StoreError::InvalidKey(_))));
    }
}
