//! Object storage interface for rendered maps (MinIO/S3 compatible).

use bytes::Bytes;
use object_store::{aws::AmazonS3Builder, path::Path, ObjectStore};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, instrument};

use map_common::{MapError, MapResult};

/// Configuration for the object storage connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectStorageConfig {
    /// S3/MinIO endpoint URL
    pub endpoint: String,
    /// Bucket name
    pub bucket: String,
    /// Access key ID
    pub access_key_id: String,
    /// Secret access key
    pub secret_access_key: String,
    /// AWS region (use "us-east-1" for MinIO)
    pub region: String,
    /// Allow HTTP (for local MinIO)
    pub allow_http: bool,
}

impl Default for ObjectStorageConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://minio:9000".to_string(),
            bucket: "weather-maps".to_string(),
            access_key_id: "minioadmin".to_string(),
            secret_access_key: "minioadmin".to_string(),
            region: "us-east-1".to_string(),
            allow_http: true,
        }
    }
}

/// Object storage client for published map images.
pub struct ObjectStorage {
    store: Arc<dyn ObjectStore>,
    endpoint: String,
    bucket: String,
}

impl ObjectStorage {
    /// Create a new object storage client from config.
    pub fn new(config: &ObjectStorageConfig) -> MapResult<Self> {
        let mut builder = AmazonS3Builder::new()
            .with_endpoint(&config.endpoint)
            .with_bucket_name(&config.bucket)
            .with_access_key_id(&config.access_key_id)
            .with_secret_access_key(&config.secret_access_key)
            .with_region(&config.region);

        if config.allow_http {
            builder = builder.with_allow_http(true);
        }

        let store = builder
            .build()
            .map_err(|e| MapError::StorageError(format!("Failed to create S3 client: {}", e)))?;

        Ok(Self {
            store: Arc::new(store),
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            bucket: config.bucket.clone(),
        })
    }

    /// Write bytes to a key in the bucket.
    #[instrument(skip(self, data), fields(bucket = %self.bucket, key = %key))]
    pub async fn put(&self, key: &str, data: Bytes) -> MapResult<()> {
        let location = Path::from(key);
        debug!(size = data.len(), "Writing object");

        self.store
            .put(&location, data.into())
            .await
            .map_err(|e| MapError::StorageError(format!("Failed to write {}: {}", key, e)))?;

        Ok(())
    }

    /// Delete an object.
    #[instrument(skip(self), fields(bucket = %self.bucket, key = %key))]
    pub async fn delete(&self, key: &str) -> MapResult<()> {
        let location = Path::from(key);

        self.store
            .delete(&location)
            .await
            .map_err(|e| MapError::StorageError(format!("Failed to delete {}: {}", key, e)))?;

        Ok(())
    }

    /// Confirm the bucket is reachable by requesting a single list page.
    ///
    /// Called once at worker startup so a bad endpoint or credentials fail
    /// loudly instead of surfacing on the first upload.
    pub async fn verify(&self) -> MapResult<()> {
        use futures::TryStreamExt;

        let mut stream = self.store.list(None);
        stream.try_next().await.map_err(|e| {
            MapError::StorageError(format!("bucket {} is not reachable: {}", self.bucket, e))
        })?;
        Ok(())
    }

    /// Browser-facing URL for a stored key.
    pub fn public_url(&self, key: &str) -> String {
        format!("{}/{}/{}", self.endpoint, self.bucket, key)
    }

    /// Recover the storage key from a published URL.
    ///
    /// Matches on the bucket path segment rather than the endpoint, so URLs
    /// published under a different hostname for the same bucket still
    /// resolve.
    pub fn key_from_url(&self, url: &str) -> Option<String> {
        let marker = format!("/{}/", self.bucket);
        let idx = url.find(&marker)?;
        let key = &url[idx + marker.len()..];
        if key.is_empty() {
            None
        } else {
            Some(key.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn storage() -> ObjectStorage {
        ObjectStorage::new(&ObjectStorageConfig::default()).unwrap()
    }

    #[test]
    fn test_public_url_layout() {
        let storage = storage();
        assert_eq!(
            storage.public_url("gfs/20250101/00/t2m/024_israel.png"),
            "http://minio:9000/weather-maps/gfs/20250101/00/t2m/024_israel.png"
        );
    }

    #[test]
    fn test_key_from_url_round_trip() {
        let storage = storage();
        let key = "gfs/20250101/06/apcp/003_europe.png";
        let url = storage.public_url(key);
        assert_eq!(storage.key_from_url(&url).as_deref(), Some(key));
    }

    #[test]
    fn test_key_from_url_accepts_other_hostnames() {
        let storage = storage();
        let url = "https://maps.example.com/weather-maps/gfs/20250101/00/t2m/000_israel.png";
        assert_eq!(
            storage.key_from_url(url).as_deref(),
            Some("gfs/20250101/00/t2m/000_israel.png")
        );
    }

    #[test]
    fn test_key_from_url_rejects_foreign_urls() {
        let storage = storage();
        assert_eq!(storage.key_from_url("http://minio:9000/other-bucket/a.png"), None);
        assert_eq!(storage.key_from_url("http://minio:9000/weather-maps/"), None);
    }
}
