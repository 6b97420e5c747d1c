/// Local-disk storage backend
///
/// Objects live under a configured root directory and are served by the HTTP
/// layer (or a reverse proxy) from the configured base URL.
use async_trait::async_trait;
use bytes::Bytes;
use std::path::PathBuf;
use tracing::debug;

use super::{validate_key, StorageBackend};
use crate::error::{AppError, Result};

pub struct LocalStorage {
    root: PathBuf,
    base_url: String,
}

impl LocalStorage {
    pub fn new(root: &str, base_url: &str) -> Self {
        Self {
            root: PathBuf::from(root),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn object_path(&self, key: &str) -> Result<PathBuf> {
        validate_key(key)?;
        Ok(self.root.join(key))
    }
}

#[async_trait]
impl StorageBackend for LocalStorage {
    async fn put(&self, key: &str, data: Bytes, _content_type: &str) -> Result<()> {
        let path = self.object_path(key)?;

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| AppError::StorageError(format!("mkdir {}: {}", parent.display(), e)))?;
        }

        tokio::fs::write(&path, &data)
            .await
            .map_err(|e| AppError::StorageError(format!("write {}: {}", path.display(), e)))?;

        debug!(key, size = data.len(), "stored object on local disk");
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Bytes> {
        let path = self.object_path(key)?;
        let data = tokio::fs::read(&path)
            .await
            .map_err(|e| AppError::StorageError(format!("read {}: {}", path.display(), e)))?;
        Ok(Bytes::from(data))
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let path = self.object_path(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AppError::StorageError(format!(
                "remove {}: {}",
                path.display(),
                e
            ))),
        }
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        let path = self.object_path(key)?;
        Ok(tokio::fs::try_exists(&path)
            .await
            .map_err(|e| AppError::StorageError(format!("stat {}: {}", path.display(), e)))?)
    }

    fn public_url(&self, key: &str) -> String {
        format!("{}/{}", self.base_url, key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_get_exists_delete_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path().to_str().unwrap(), "/media");

        let key = "uploads/2025/test.txt";
        assert!(!storage.exists(key).await.unwrap());

        storage
            .put(key, Bytes::from_static(b"hello"), "text/plain")
            .await
            .unwrap();
        assert!(storage.exists(key).await.unwrap());
        assert_eq!(storage.get(key).await.unwrap(), Bytes::from_static(b"hello"));

        storage.delete(key).await.unwrap();
        assert!(!storage.exists(key).await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_missing_object_is_ok() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path().to_str().unwrap(), "/media");
        assert!(storage.delete("uploads/nothing.bin").await.is_ok());
    }

    #[test]
    fn test_public_url_joins_base() {
        let storage = LocalStorage::new("/tmp/media", "/media/");
        assert_eq!(
            storage.public_url("uploads/a.jpg"),
            "/media/uploads/a.jpg"
        );
    }
}
