use redis::AsyncCommands;
use sha2::{Digest, Sha256};
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::{AppError, Result};
use crate::metrics::PAGE_CACHE_EVENTS;
use crate::models::ComposedPost;
use redis_utils::SharedConnectionManager;

/// Rendered-page cache over Redis.
///
/// Stores the composed JSON document the SSR layer consumes, keyed by a hash
/// of the request path plus the settings revision. Each locale carries a
/// generation counter folded into the key; bumping it invalidates every page
/// of that locale without scanning keys.
#[derive(Clone)]
pub struct PageCache {
    redis: SharedConnectionManager,
    default_ttl: Duration,
}

impl PageCache {
    pub fn new(redis: SharedConnectionManager, default_ttl_secs: u64) -> Self {
        Self {
            redis,
            default_ttl: Duration::from_secs(default_ttl_secs),
        }
    }

    fn generation_key(locale: &str) -> String {
        format!("page:gen:{}", locale)
    }

    fn page_key(locale: &str, generation: u64, path: &str, settings_rev: u64) -> String {
        let mut hasher = Sha256::new();
        hasher.update(path.as_bytes());
        hasher.update(b"|");
        hasher.update(settings_rev.to_le_bytes());
        let digest = hex::encode(hasher.finalize());
        format!("page:v1:{}:{}:{}", locale, generation, digest)
    }

    async fn current_generation(&self, locale: &str) -> Result<u64> {
        let mut conn = self.redis.lock().await.clone();
        let generation: Option<u64> = conn.get(Self::generation_key(locale)).await?;
        Ok(generation.unwrap_or(0))
    }

    pub async fn read_page(
        &self,
        locale: &str,
        path: &str,
        settings_rev: u64,
    ) -> Result<Option<ComposedPost>> {
        let generation = self.current_generation(locale).await?;
        let key = Self::page_key(locale, generation, path, settings_rev);
        let mut conn = self.redis.lock().await.clone();

        match conn.get::<_, Option<String>>(&key).await {
            Ok(Some(data)) => {
                debug!(%path, "page cache HIT");
                PAGE_CACHE_EVENTS.with_label_values(&["hit"]).inc();
                serde_json::from_str::<ComposedPost>(&data)
                    .map(Some)
                    .map_err(|e| {
                        PAGE_CACHE_EVENTS.with_label_values(&["error"]).inc();
                        AppError::Internal(format!("Cache deserialization error: {}", e))
                    })
            }
            Ok(None) => {
                debug!(%path, "page cache MISS");
                PAGE_CACHE_EVENTS.with_label_values(&["miss"]).inc();
                Ok(None)
            }
            Err(e) => {
                warn!("Redis read error for page cache: {}", e);
                PAGE_CACHE_EVENTS.with_label_values(&["error"]).inc();
                Err(AppError::CacheError(e.to_string()))
            }
        }
    }

    pub async fn write_page(
        &self,
        locale: &str,
        path: &str,
        settings_rev: u64,
        page: &ComposedPost,
    ) -> Result<()> {
        let generation = self.current_generation(locale).await?;
        let key = Self::page_key(locale, generation, path, settings_rev);

        let data = serde_json::to_string(page)
            .map_err(|e| AppError::Internal(format!("Cache serialization error: {}", e)))?;

        // Jitter the TTL so a popular locale doesn't expire all at once
        let jitter = (rand::random::<u32>() % 10) as f64 / 100.0;
        let jitter_secs = (self.default_ttl.as_secs_f64() * jitter).round() as u64;
        let final_ttl = self.default_ttl + Duration::from_secs(jitter_secs);

        let mut conn = self.redis.lock().await.clone();
        conn.set_ex::<_, _, ()>(&key, data, final_ttl.as_secs())
            .await
            .map_err(|e| {
                warn!("Failed to write page cache: {}", e);
                AppError::CacheError(e.to_string())
            })?;

        debug!(%path, ttl = ?final_ttl, "page cache WRITE");
        Ok(())
    }

    /// Invalidate every cached page of a locale
    pub async fn invalidate_locale(&self, locale: &str) -> Result<()> {
        let mut conn = self.redis.lock().await.clone();
        conn.incr::<_, _, u64>(Self::generation_key(locale), 1)
            .await
            .map_err(|e| AppError::CacheError(e.to_string()))?;

        debug!(%locale, "page cache INVALIDATE locale");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generation_key_format() {
        assert_eq!(PageCache::generation_key("en"), "page:gen:en");
    }

    #[test]
    fn test_page_key_changes_with_generation_and_revision() {
        let a = PageCache::page_key("en", 0, "/en/hello", 1);
        let b = PageCache::page_key("en", 1, "/en/hello", 1);
        let c = PageCache::page_key("en", 0, "/en/hello", 2);
        assert_ne!(a, b);
        assert_ne!(a, c);
        assert!(a.starts_with("page:v1:en:0:"));
    }

    #[test]
    fn test_page_key_is_stable_for_same_inputs() {
        let a = PageCache::page_key("de", 4, "/de/impressum", 7);
        let b = PageCache::page_key("de", 4, "/de/impressum", 7);
        assert_eq!(a, b);
    }
}
