/// Media handlers - uploads, optimization, variants, renames
use actix_multipart::Multipart;
use actix_web::{web, HttpResponse};
use bytes::BytesMut;
use futures_util::{StreamExt, TryStreamExt};
use serde::Deserialize;
use serde_json::json;
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

use crate::config::MediaConfig;
use crate::error::{AppError, Result};
use crate::middleware::{require, AuthenticatedUser};
use crate::registry::Permission;
use crate::services::{activity, MediaService};
use crate::storage::StorageBackend;

/// Shared state for media handlers
pub struct MediaState {
    pub storage: Arc<dyn StorageBackend>,
    pub config: MediaConfig,
}

impl MediaState {
    fn service(&self, pool: &PgPool) -> MediaService {
        MediaService::new(pool.clone(), self.storage.clone(), self.config.clone())
    }
}

/// Upload a file via multipart form data
pub async fn upload_media(
    pool: web::Data<PgPool>,
    state: web::Data<MediaState>,
    user: AuthenticatedUser,
    mut payload: Multipart,
) -> Result<HttpResponse> {
    require(&user, Permission::MediaWrite)?;

    let mut uploaded = None;

    while let Some(field) = payload.next().await {
        let mut field =
            field.map_err(|e| AppError::BadRequest(format!("malformed multipart body: {}", e)))?;

        let file_name = field
            .content_disposition()
            .and_then(|cd| cd.get_filename().map(str::to_string));
        let Some(file_name) = file_name else {
            // Skip non-file fields
            continue;
        };

        let mime_type = field
            .content_type()
            .map(|m| m.to_string())
            .unwrap_or_else(|| mime::APPLICATION_OCTET_STREAM.to_string());

        let mut data = BytesMut::new();
        while let Some(chunk) = field
            .try_next()
            .await
            .map_err(|e| AppError::BadRequest(format!("upload stream failed: {}", e)))?
        {
            if data.len() + chunk.len() > state.config.max_upload_bytes {
                return Err(AppError::BadRequest(format!(
                    "upload exceeds the {} byte limit",
                    state.config.max_upload_bytes
                )));
            }
            data.extend_from_slice(&chunk);
        }

        let asset = state
            .service(pool.get_ref())
            .upload(user.id, &file_name, &mime_type, data.freeze())
            .await?;

        activity::record(
            pool.get_ref(),
            user.id,
            "media.upload",
            "media_asset",
            Some(asset.id),
            json!({ "file_name": asset.file_name, "size": asset.size }),
        )
        .await;

        uploaded = Some(asset);
        break;
    }

    match uploaded {
        Some(asset) => Ok(HttpResponse::Created().json(asset)),
        None => Err(AppError::BadRequest(
            "multipart body contained no file field".to_string(),
        )),
    }
}

#[derive(Debug, Deserialize)]
pub struct ListMediaQuery {
    /// Filter by MIME prefix, e.g. "image"
    pub kind: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    50
}

/// List media assets
pub async fn list_media(
    pool: web::Data<PgPool>,
    state: web::Data<MediaState>,
    user: AuthenticatedUser,
    query: web::Query<ListMediaQuery>,
) -> Result<HttpResponse> {
    require(&user, Permission::PostsRead)?;

    let assets = state
        .service(pool.get_ref())
        .list(
            query.kind.as_deref(),
            query.limit.clamp(1, 200),
            query.offset.max(0),
        )
        .await?;

    Ok(HttpResponse::Ok().json(assets))
}

/// Get a media asset
pub async fn get_media(
    pool: web::Data<PgPool>,
    state: web::Data<MediaState>,
    user: AuthenticatedUser,
    asset_id: web::Path<Uuid>,
) -> Result<HttpResponse> {
    require(&user, Permission::PostsRead)?;

    match state.service(pool.get_ref()).get(*asset_id).await? {
        Some(asset) => Ok(HttpResponse::Ok().json(asset)),
        None => Ok(HttpResponse::NotFound().finish()),
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateMediaRequest {
    #[serde(default, deserialize_with = "super::double_option")]
    pub alt_text: Option<Option<String>>,
    pub focal_x: Option<f32>,
    pub focal_y: Option<f32>,
}

/// Update descriptive fields (alt text, focal point)
pub async fn update_media(
    pool: web::Data<PgPool>,
    state: web::Data<MediaState>,
    user: AuthenticatedUser,
    asset_id: web::Path<Uuid>,
    req: web::Json<UpdateMediaRequest>,
) -> Result<HttpResponse> {
    require(&user, Permission::MediaWrite)?;

    let asset = state
        .service(pool.get_ref())
        .update_details(
            *asset_id,
            req.alt_text.as_ref().map(|a| a.as_deref()),
            req.focal_x,
            req.focal_y,
        )
        .await?;

    Ok(HttpResponse::Ok().json(asset))
}

/// Delete a media asset and its stored objects
pub async fn delete_media(
    pool: web::Data<PgPool>,
    state: web::Data<MediaState>,
    user: AuthenticatedUser,
    asset_id: web::Path<Uuid>,
) -> Result<HttpResponse> {
    require(&user, Permission::MediaWrite)?;

    state.service(pool.get_ref()).delete(*asset_id).await?;

    activity::record(
        pool.get_ref(),
        user.id,
        "media.delete",
        "media_asset",
        Some(*asset_id),
        json!({}),
    )
    .await;

    Ok(HttpResponse::NoContent().finish())
}

/// Produce the optimized WebP derivative
pub async fn optimize_media(
    pool: web::Data<PgPool>,
    state: web::Data<MediaState>,
    user: AuthenticatedUser,
    asset_id: web::Path<Uuid>,
) -> Result<HttpResponse> {
    require(&user, Permission::MediaWrite)?;

    let asset = state.service(pool.get_ref()).optimize(*asset_id).await?;

    activity::record(
        pool.get_ref(),
        user.id,
        "media.optimize",
        "media_asset",
        Some(asset.id),
        json!({ "optimized_size": asset.optimized_size }),
    )
    .await;

    Ok(HttpResponse::Ok().json(asset))
}

#[derive(Debug, Deserialize)]
pub struct VariantsRequest {
    /// Derivative spec, e.g. "thumb:200x200_crop,preview:640x0"
    pub spec: String,
}

/// Generate resized derivatives from a spec string
pub async fn generate_variants(
    pool: web::Data<PgPool>,
    state: web::Data<MediaState>,
    user: AuthenticatedUser,
    asset_id: web::Path<Uuid>,
    req: web::Json<VariantsRequest>,
) -> Result<HttpResponse> {
    require(&user, Permission::MediaWrite)?;

    let asset = state
        .service(pool.get_ref())
        .generate_variants(*asset_id, &req.spec)
        .await?;

    Ok(HttpResponse::Ok().json(asset))
}

#[derive(Debug, Deserialize)]
pub struct RenameRequest {
    pub name: String,
}

/// Rename an asset, probing for a free name
pub async fn rename_media(
    pool: web::Data<PgPool>,
    state: web::Data<MediaState>,
    user: AuthenticatedUser,
    asset_id: web::Path<Uuid>,
    req: web::Json<RenameRequest>,
) -> Result<HttpResponse> {
    require(&user, Permission::MediaWrite)?;

    let asset = state
        .service(pool.get_ref())
        .rename(*asset_id, &req.name)
        .await?;

    activity::record(
        pool.get_ref(),
        user.id,
        "media.rename",
        "media_asset",
        Some(asset.id),
        json!({ "file_name": asset.file_name }),
    )
    .await;

    Ok(HttpResponse::Ok().json(asset))
}
