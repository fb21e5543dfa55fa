//! Amazon S3 object store.
//!
//! Objects are stored under an optional key prefix inside the bucket:
//! ```text
//! s3://{bucket}/{prefix}/{key}
//! ```

use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use chrono::{DateTime, Utc};
use tracing::debug;

use super::{validate_key, ObjectMeta, ObjectStore, Result, StoreError};

/// S3-based object store.
pub struct S3ObjectStore {
    client: Client,
    bucket: String,
    prefix: Option<String>,
}

impl S3ObjectStore {
    /// Create a new S3 object store.
    ///
    /// Uses default credentials from the environment (AWS_ACCESS_KEY_ID,
    /// AWS_SECRET_ACCESS_KEY, or IAM role).
    pub async fn new(bucket: impl Into<String>, prefix: Option<String>) -> Self {
        let config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
        Self::with_client(Client::new(&config), bucket, prefix)
    }

    /// Create with custom endpoint (for S3-compatible services like MinIO).
    pub async fn with_endpoint(
        bucket: impl Into<String>,
        prefix: Option<String>,
        endpoint: &str,
        region: Option<&str>,
    ) -> Self {
        let mut config_loader = aws_config::defaults(aws_config::BehaviorVersion::latest());

        if let Some(region) = region {
            config_loader = config_loader.region(aws_config::Region::new(region.to_string()));
        }

        let config = config_loader.load().await;

        let s3_config = aws_sdk_s3::config::Builder::from(&config)
            .endpoint_url(endpoint)
            .force_path_style(true) // Required for MinIO and most S3-compatible services
            .build();

        Self::with_client(Client::from_conf(s3_config), bucket, prefix)
    }

    /// Create with explicit client (for testing).
    pub fn with_client(client: Client, bucket: impl Into<String>, prefix: Option<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
            prefix: prefix.map(|p| p.trim_end_matches('/').to_string()),
        }
    }

    /// Bucket-level key for an object key.
    fn full_key(&self, key: &str) -> String {
        match &self.prefix {
            Some(prefix) => format!("{}/{}", prefix, key),
            None => key.to_string(),
        }
    }

    /// Object key for a bucket-level key, if it lies under our prefix.
    fn strip_prefix<'a>(&self, full_key: &'a str) -> Option<&'a str> {
        match &self.prefix {
            Some(prefix) => full_key
                .strip_prefix(prefix.as_str())
                .and_then(|rest| rest.strip_prefix('/')),
            None => Some(full_key),
        }
    }
}

fn to_chrono(ts: &aws_sdk_s3::primitives::DateTime) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(ts.secs(), ts.subsec_nanos())
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn list(&self, prefix: &str) -> Result<Vec<ObjectMeta>> {
        let full_prefix = self.full_key(prefix);
        let mut objects = Vec::new();
        let mut continuation_token: Option<String> = None;

        loop {
            let mut request = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .prefix(&full_prefix);

            if let Some(token) = &continuation_token {
                request = request.continuation_token(token);
            }

            let response = request.send().await.map_err(|e| StoreError::ListFailed {
                prefix: prefix.to_string(),
                message: e.to_string(),
            })?;

            for object in response.contents() {
                let Some(key) = object.key().and_then(|k| self.strip_prefix(k)) else {
                    continue;
                };
                objects.push(ObjectMeta {
                    key: key.to_string(),
                    size: object.size().unwrap_or_default().max(0) as u64,
                    last_modified: object.last_modified().and_then(to_chrono),
                });
            }

            continuation_token = response.next_continuation_token().map(|s| s.to_string());
            if continuation_token.is_none() {
                break;
            }
        }

        objects.sort_by(|a, b| a.key.cmp(&b.key));
        debug!(
            bucket = %self.bucket,
            prefix = %prefix,
            count = objects.len(),
            "Listed objects in S3"
        );
        Ok(objects)
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>> {
        validate_key(key)?;

        let response = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(self.full_key(key))
            .send()
            .await
            .map_err(|e| {
                let service = e.into_service_error();
                if service.is_no_such_key() {
                    StoreError::NotFound(key.to_string())
                } else {
                    StoreError::ReadFailed {
                        key: key.to_string(),
                        message: format!("S3 download failed: {}", service),
                    }
                }
            })?;

        let body = response
            .body
            .collect()
            .await
            .map_err(|e| StoreError::ReadFailed {
                key: key.to_string(),
                message: format!("S3 body read failed: {}", e),
            })?
            .into_bytes()
            .to_vec();

        Ok(body)
    }

    async fn put(&self, key: &str, body: Vec<u8>) -> Result<()> {
        validate_key(key)?;
        let size = body.len();

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(self.full_key(key))
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(|e| StoreError::WriteFailed {
                key: key.to_string(),
                message: format!("S3 upload failed: {}", e),
            })?;

        debug!(
            key = %key,
            size = size,
            bucket = %self.bucket,
            "Stored object in S3"
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        validate_key(key)?;

        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(self.full_key(key))
            .send()
            .await
            .map_err(|e| StoreError::DeleteFailed {
                key: key.to_string(),
                message: e.to_string(),
            })?;

        Ok(())
    }

    fn backend(&self) -> &'static str {
        "s3"
    }
}
