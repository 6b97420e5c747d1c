/// Object storage abstraction
///
/// Media uploads and derivatives are written through a [`StorageBackend`];
/// deployments choose the local-disk backend or any S3-compatible store
/// (R2 via a custom endpoint) in configuration.
mod local;
mod s3;

pub use local::LocalStorage;
pub use s3::S3Storage;

use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;

use crate::config::StorageConfig;
use crate::error::{AppError, Result};

#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Write an object, replacing any existing one at `key`.
    async fn put(&self, key: &str, data: Bytes, content_type: &str) -> Result<()>;

    /// Read an object's bytes.
    async fn get(&self, key: &str) -> Result<Bytes>;

    /// Remove an object. Deleting a missing object is not an error.
    async fn delete(&self, key: &str) -> Result<()>;

    /// Whether an object exists at `key`.
    async fn exists(&self, key: &str) -> Result<bool>;

    /// Public URL under which the object is served.
    fn public_url(&self, key: &str) -> String;
}

/// Keys come from user-supplied file names; refuse anything that could walk
/// out of the storage root.
pub(crate) fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() || key.starts_with('/') || key.split('/').any(|s| s == ".." || s.is_empty()) {
        return Err(AppError::BadRequest(format!("invalid storage key '{}'", key)));
    }
    Ok(())
}

/// Build the configured backend.
pub async fn init_storage(config: &StorageConfig) -> Result<Arc<dyn StorageBackend>> {
    match config.backend.as_str() {
        "local" => Ok(Arc::new(LocalStorage::new(
            &config.local_root,
            &config.local_base_url,
        ))),
        "s3" => Ok(Arc::new(S3Storage::from_config(config).await)),
        other => Err(AppError::Internal(format!(
            "unknown storage backend '{}'",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_key_rejects_traversal() {
        assert!(validate_key("uploads/../secrets").is_err());
        assert!(validate_key("/etc/passwd").is_err());
        assert!(validate_key("").is_err());
        assert!(validate_key("uploads//double").is_err());
        assert!(validate_key("uploads/2025/photo.jpg").is_ok());
    }
}
