/// S3-compatible storage backend
///
/// Works against AWS S3 and R2 (set a custom endpoint). Credentials come from
/// the standard AWS environment/config chain.
use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use bytes::Bytes;
use tracing::{debug, info};

use super::{validate_key, StorageBackend};
use crate::config::StorageConfig;
use crate::error::{AppError, Result};

pub struct S3Storage {
    client: Client,
    bucket: String,
    public_url: String,
}

impl S3Storage {
    pub async fn from_config(config: &StorageConfig) -> Self {
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_sdk_s3::config::Region::new(config.s3_region.clone()));

        if let Some(endpoint) = &config.s3_endpoint {
            loader = loader.endpoint_url(endpoint.clone());
        }

        let sdk_config = loader.load().await;

        // R2 and MinIO expect path-style addressing
        let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(config.s3_endpoint.is_some())
            .build();

        info!(bucket = %config.s3_bucket, "S3 storage backend initialized");

        Self {
            client: Client::from_conf(s3_config),
            bucket: config.s3_bucket.clone(),
            public_url: config.s3_public_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl StorageBackend for S3Storage {
    async fn put(&self, key: &str, data: Bytes, content_type: &str) -> Result<()> {
        validate_key(key)?;

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .body(ByteStream::from(data.clone()))
            .send()
            .await
            .map_err(|e| AppError::StorageError(format!("put {}: {}", key, e)))?;

        debug!(key, size = data.len(), "stored object in bucket");
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Bytes> {
        validate_key(key)?;

        let output = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| AppError::StorageError(format!("get {}: {}", key, e)))?;

        let data = output
            .body
            .collect()
            .await
            .map_err(|e| AppError::StorageError(format!("read {}: {}", key, e)))?;

        Ok(data.into_bytes())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        validate_key(key)?;

        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| AppError::StorageError(format!("delete {}: {}", key, e)))?;

        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        validate_key(key)?;

        match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(e) => {
                let service_error = e.into_service_error();
                if service_error.is_not_found() {
                    Ok(false)
                } else {
                    Err(AppError::StorageError(format!(
                        "head {}: {}",
                        key, service_error
                    )))
                }
            }
        }
    }

    fn public_url(&self, key: &str) -> String {
        format!("{}/{}", self.public_url, key)
    }
}
