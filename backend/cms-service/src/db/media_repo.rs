/// Media repository - database operations for media assets
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::MediaAsset;

const MEDIA_COLUMNS: &str = "id, file_name, path, url, mime_type, size, width, height, \
     alt_text, focal_x, focal_y, optimized_url, optimized_size, metadata, uploaded_by, \
     created_at, updated_at";

/// Fields for a new media asset row
pub struct NewMediaAsset<'a> {
    pub file_name: &'a str,
    pub path: &'a str,
    pub url: &'a str,
    pub mime_type: &'a str,
    pub size: i64,
    pub width: Option<i32>,
    pub height: Option<i32>,
    pub uploaded_by: Uuid,
}

pub async fn create(pool: &PgPool, new: NewMediaAsset<'_>) -> Result<MediaAsset, sqlx::Error> {
    let query = format!(
        r#"
        INSERT INTO media_assets (file_name, path, url, mime_type, size, width, height, uploaded_by)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING {MEDIA_COLUMNS}
        "#
    );

    sqlx::query_as::<_, MediaAsset>(&query)
        .bind(new.file_name)
        .bind(new.path)
        .bind(new.url)
        .bind(new.mime_type)
        .bind(new.size)
        .bind(new.width)
        .bind(new.height)
        .bind(new.uploaded_by)
        .fetch_one(pool)
        .await
}

pub async fn find_by_id(pool: &PgPool, asset_id: Uuid) -> Result<Option<MediaAsset>, sqlx::Error> {
    let query = format!("SELECT {MEDIA_COLUMNS} FROM media_assets WHERE id = $1");
    sqlx::query_as::<_, MediaAsset>(&query)
        .bind(asset_id)
        .fetch_optional(pool)
        .await
}

pub async fn list(
    pool: &PgPool,
    mime_prefix: Option<&str>,
    limit: i64,
    offset: i64,
) -> Result<Vec<MediaAsset>, sqlx::Error> {
    let query = format!(
        r#"
        SELECT {MEDIA_COLUMNS} FROM media_assets
        WHERE ($1::text IS NULL OR mime_type LIKE $1 || '%')
        ORDER BY created_at DESC
        LIMIT $2 OFFSET $3
        "#
    );
    sqlx::query_as::<_, MediaAsset>(&query)
        .bind(mime_prefix)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await
}

/// Update editable descriptive fields
pub async fn update_details(
    pool: &PgPool,
    asset_id: Uuid,
    alt_text: Option<Option<&str>>,
    focal_x: Option<f32>,
    focal_y: Option<f32>,
) -> Result<Option<MediaAsset>, sqlx::Error> {
    let query = format!(
        r#"
        UPDATE media_assets SET
            alt_text = CASE WHEN $2 THEN $3 ELSE alt_text END,
            focal_x = COALESCE($4, focal_x),
            focal_y = COALESCE($5, focal_y),
            updated_at = NOW()
        WHERE id = $1
        RETURNING {MEDIA_COLUMNS}
        "#
    );
    sqlx::query_as::<_, MediaAsset>(&query)
        .bind(asset_id)
        .bind(alt_text.is_some())
        .bind(alt_text.flatten())
        .bind(focal_x)
        .bind(focal_y)
        .fetch_optional(pool)
        .await
}

/// Record the optimized (WebP) derivative
pub async fn set_optimized(
    pool: &PgPool,
    asset_id: Uuid,
    optimized_url: &str,
    optimized_size: i64,
) -> Result<Option<MediaAsset>, sqlx::Error> {
    let query = format!(
        r#"
        UPDATE media_assets SET optimized_url = $2, optimized_size = $3, updated_at = NOW()
        WHERE id = $1
        RETURNING {MEDIA_COLUMNS}
        "#
    );
    sqlx::query_as::<_, MediaAsset>(&query)
        .bind(asset_id)
        .bind(optimized_url)
        .bind(optimized_size)
        .fetch_optional(pool)
        .await
}

/// Replace the metadata blob (variants live under metadata.variants)
pub async fn set_metadata(
    pool: &PgPool,
    asset_id: Uuid,
    metadata: &Value,
) -> Result<Option<MediaAsset>, sqlx::Error> {
    let query = format!(
        r#"
        UPDATE media_assets SET metadata = $2, updated_at = NOW()
        WHERE id = $1
        RETURNING {MEDIA_COLUMNS}
        "#
    );
    sqlx::query_as::<_, MediaAsset>(&query)
        .bind(asset_id)
        .bind(metadata)
        .fetch_optional(pool)
        .await
}

/// Point an asset at its renamed storage location
pub async fn rename(
    pool: &PgPool,
    asset_id: Uuid,
    file_name: &str,
    path: &str,
    url: &str,
) -> Result<Option<MediaAsset>, sqlx::Error> {
    let query = format!(
        r#"
        UPDATE media_assets SET file_name = $2, path = $3, url = $4, updated_at = NOW()
        WHERE id = $1
        RETURNING {MEDIA_COLUMNS}
        "#
    );
    sqlx::query_as::<_, MediaAsset>(&query)
        .bind(asset_id)
        .bind(file_name)
        .bind(path)
        .bind(url)
        .fetch_optional(pool)
        .await
}

pub async fn delete(pool: &PgPool, asset_id: Uuid) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM media_assets WHERE id = $1")
        .bind(asset_id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

/// Whether any asset already occupies a storage path
pub async fn path_exists(pool: &PgPool, path: &str) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM media_assets WHERE path = $1)")
        .bind(path)
        .fetch_one(pool)
        .await
}
