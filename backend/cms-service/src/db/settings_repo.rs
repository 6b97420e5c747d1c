/// Site settings repository - key/value configuration rows
use serde_json::Value;
use sqlx::PgPool;

use crate::models::SiteSetting;

const SETTING_COLUMNS: &str = "key, value, updated_at";

pub async fn list(pool: &PgPool) -> Result<Vec<SiteSetting>, sqlx::Error> {
    let query = format!("SELECT {SETTING_COLUMNS} FROM site_settings ORDER BY key");
    sqlx::query_as::<_, SiteSetting>(&query).fetch_all(pool).await
}

pub async fn upsert(pool: &PgPool, key: &str, value: &Value) -> Result<SiteSetting, sqlx::Error> {
    let query = format!(
        r#"
        INSERT INTO site_settings (key, value)
        VALUES ($1, $2)
        ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value, updated_at = NOW()
        RETURNING {SETTING_COLUMNS}
        "#
    );
    sqlx::query_as::<_, SiteSetting>(&query)
        .bind(key)
        .bind(value)
        .fetch_one(pool)
        .await
}
