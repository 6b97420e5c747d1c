/// Site settings service - cached key/value configuration
///
/// Settings are read on nearly every public request, so rows are held in an
/// in-process map reloaded on write. A monotonically increasing revision is
/// folded into page-cache keys so cached pages age out with setting changes.
use serde_json::Value;
use sqlx::PgPool;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;
use tracing::info;

use crate::db::settings_repo;
use crate::error::Result;
use crate::models::SiteSetting;

pub struct SettingsService {
    pool: PgPool,
    cache: RwLock<HashMap<String, Value>>,
    revision: AtomicU64,
}

impl SettingsService {
    /// Load all settings into the cache.
    pub async fn load(pool: PgPool) -> Result<Self> {
        let rows = settings_repo::list(&pool).await?;
        let cache: HashMap<String, Value> =
            rows.into_iter().map(|row| (row.key, row.value)).collect();

        info!(count = cache.len(), "site settings loaded");

        Ok(Self {
            pool,
            cache: RwLock::new(cache),
            revision: AtomicU64::new(0),
        })
    }

    pub async fn get(&self, key: &str) -> Option<Value> {
        self.cache.read().await.get(key).cloned()
    }

    pub async fn all(&self) -> HashMap<String, Value> {
        self.cache.read().await.clone()
    }

    /// Write through to the database and refresh the cache.
    pub async fn put(&self, key: &str, value: Value) -> Result<SiteSetting> {
        let row = settings_repo::upsert(&self.pool, key, &value).await?;

        self.cache
            .write()
            .await
            .insert(row.key.clone(), row.value.clone());
        self.revision.fetch_add(1, Ordering::SeqCst);

        Ok(row)
    }

    /// Revision counter folded into page-cache keys
    pub fn revision(&self) -> u64 {
        self.revision.load(Ordering::SeqCst)
    }

    // Typed accessors for well-known keys

    pub async fn site_title(&self) -> String {
        self.get("site.title")
            .await
            .and_then(|v| v.as_str().map(String::from))
            .unwrap_or_else(|| "Lattice".to_string())
    }

    pub async fn default_locale(&self) -> String {
        self.get("site.default_locale")
            .await
            .and_then(|v| v.as_str().map(String::from))
            .unwrap_or_else(|| "en".to_string())
    }

    pub async fn locales(&self) -> Vec<String> {
        self.get("site.locales")
            .await
            .and_then(|v| {
                v.as_array().map(|list| {
                    list.iter()
                        .filter_map(|l| l.as_str().map(String::from))
                        .collect()
                })
            })
            .unwrap_or_else(|| vec!["en".to_string()])
    }
}
