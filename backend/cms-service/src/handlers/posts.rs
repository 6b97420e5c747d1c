/// Post handlers - HTTP endpoints for post operations
use actix_web::{web, HttpResponse};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

use crate::cache::PageCache;
use crate::db::post_repo::PostFilter;
use crate::error::{AppError, Result};
use crate::middleware::{check_post_write, require, AuthenticatedUser};
use crate::models::{CanonicalDocument, OverrideMode};
use crate::registry::Permission;
use crate::services::posts::{CreatePostInput, UpdatePostInput};
use crate::services::{activity, composition, CanonicalService, PostService};

#[derive(Debug, Deserialize)]
pub struct CreatePostRequest {
    pub post_type: String,
    pub locale: String,
    pub title: String,
    pub slug: Option<String>,
    pub status: Option<String>,
    pub translation_of_id: Option<Uuid>,
    pub parent_id: Option<Uuid>,
    pub excerpt: Option<String>,
    #[serde(default)]
    pub meta: Value,
    pub scheduled_at: Option<DateTime<Utc>>,
}

/// Create a new post
pub async fn create_post(
    pool: web::Data<PgPool>,
    cache: web::Data<Arc<PageCache>>,
    user: AuthenticatedUser,
    req: web::Json<CreatePostRequest>,
) -> Result<HttpResponse> {
    require(&user, Permission::PostsWrite)?;

    let req = req.into_inner();
    let meta = if req.meta.is_object() {
        req.meta
    } else {
        json!({})
    };

    let service = PostService::with_cache((**pool).clone(), cache.get_ref().clone());
    let post = service
        .create_post(
            user.id,
            CreatePostInput {
                post_type: req.post_type,
                locale: req.locale,
                title: req.title,
                slug: req.slug,
                status: req.status,
                translation_of_id: req.translation_of_id,
                parent_id: req.parent_id,
                excerpt: req.excerpt,
                meta,
                scheduled_at: req.scheduled_at,
            },
        )
        .await?;

    activity::record(
        pool.get_ref(),
        user.id,
        "post.create",
        "post",
        Some(post.id),
        json!({ "slug": post.slug, "locale": post.locale }),
    )
    .await;

    Ok(HttpResponse::Created().json(post))
}

/// Listing query parameters
#[derive(Debug, Deserialize)]
pub struct ListPostsQuery {
    pub post_type: Option<String>,
    pub locale: Option<String>,
    pub status: Option<String>,
    pub parent_id: Option<Uuid>,
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    50
}

/// List posts with filters
pub async fn list_posts(
    pool: web::Data<PgPool>,
    user: AuthenticatedUser,
    query: web::Query<ListPostsQuery>,
) -> Result<HttpResponse> {
    require(&user, Permission::PostsRead)?;

    let service = PostService::new((**pool).clone());
    let filter = PostFilter {
        post_type: query.post_type.clone(),
        locale: query.locale.clone(),
        status: query.status.clone(),
        parent_id: query.parent_id,
        include_deleted: false,
    };

    let posts = service
        .list_posts(&filter, query.limit.clamp(1, 200), query.offset.max(0))
        .await?;

    Ok(HttpResponse::Ok().json(posts))
}

/// Get a post by ID
pub async fn get_post(
    pool: web::Data<PgPool>,
    user: AuthenticatedUser,
    post_id: web::Path<Uuid>,
) -> Result<HttpResponse> {
    require(&user, Permission::PostsRead)?;

    let service = PostService::new((**pool).clone());
    match service.get_post(*post_id).await? {
        Some(post) => Ok(HttpResponse::Ok().json(post)),
        None => Ok(HttpResponse::NotFound().finish()),
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdatePostRequest {
    pub title: Option<String>,
    pub slug: Option<String>,
    /// Present-but-null clears the excerpt
    #[serde(default, deserialize_with = "super::double_option")]
    pub excerpt: Option<Option<String>>,
    pub meta: Option<Value>,
    #[serde(default, deserialize_with = "super::double_option")]
    pub parent_id: Option<Option<Uuid>>,
    pub order_index: Option<i32>,
    #[serde(default, deserialize_with = "super::double_option")]
    pub scheduled_at: Option<Option<DateTime<Utc>>>,
}

/// Update a post's fields
pub async fn update_post(
    pool: web::Data<PgPool>,
    cache: web::Data<Arc<PageCache>>,
    user: AuthenticatedUser,
    post_id: web::Path<Uuid>,
    req: web::Json<UpdatePostRequest>,
) -> Result<HttpResponse> {
    let service = PostService::with_cache((**pool).clone(), cache.get_ref().clone());

    let current = service
        .get_post(*post_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("post {} not found", post_id)))?;
    check_post_write(&user, &current)?;

    let req = req.into_inner();
    let updated = service
        .update_post(
            *post_id,
            UpdatePostInput {
                title: req.title,
                slug: req.slug,
                excerpt: req.excerpt,
                meta: req.meta,
                parent_id: req.parent_id,
                order_index: req.order_index,
                scheduled_at: req.scheduled_at,
            },
        )
        .await?;

    activity::record(
        pool.get_ref(),
        user.id,
        "post.update",
        "post",
        Some(updated.id),
        json!({ "slug": updated.slug }),
    )
    .await;

    Ok(HttpResponse::Ok().json(updated))
}

/// Publish a post immediately, or schedule it when the body carries a time
#[derive(Debug, Deserialize, Default)]
pub struct PublishRequest {
    pub scheduled_at: Option<DateTime<Utc>>,
}

pub async fn publish_post(
    pool: web::Data<PgPool>,
    cache: web::Data<Arc<PageCache>>,
    user: AuthenticatedUser,
    post_id: web::Path<Uuid>,
    req: Option<web::Json<PublishRequest>>,
) -> Result<HttpResponse> {
    require(&user, Permission::PostsPublish)?;

    let service = PostService::with_cache((**pool).clone(), cache.get_ref().clone());
    let post = match req.and_then(|r| r.into_inner().scheduled_at) {
        Some(at) => service.schedule(*post_id, at).await?,
        None => service.publish(*post_id).await?,
    };

    activity::record(
        pool.get_ref(),
        user.id,
        "post.publish",
        "post",
        Some(post.id),
        json!({ "status": post.status }),
    )
    .await;

    Ok(HttpResponse::Ok().json(post))
}

pub async fn archive_post(
    pool: web::Data<PgPool>,
    cache: web::Data<Arc<PageCache>>,
    user: AuthenticatedUser,
    post_id: web::Path<Uuid>,
) -> Result<HttpResponse> {
    require(&user, Permission::PostsPublish)?;

    let service = PostService::with_cache((**pool).clone(), cache.get_ref().clone());
    let post = service.archive(*post_id).await?;

    activity::record(
        pool.get_ref(),
        user.id,
        "post.archive",
        "post",
        Some(post.id),
        json!({}),
    )
    .await;

    Ok(HttpResponse::Ok().json(post))
}

pub async fn restore_post(
    pool: web::Data<PgPool>,
    user: AuthenticatedUser,
    post_id: web::Path<Uuid>,
) -> Result<HttpResponse> {
    require(&user, Permission::PostsPublish)?;

    let service = PostService::new((**pool).clone());
    let post = service.restore(*post_id).await?;

    activity::record(
        pool.get_ref(),
        user.id,
        "post.restore",
        "post",
        Some(post.id),
        json!({}),
    )
    .await;

    Ok(HttpResponse::Ok().json(post))
}

/// Soft delete a post
pub async fn delete_post(
    pool: web::Data<PgPool>,
    cache: web::Data<Arc<PageCache>>,
    user: AuthenticatedUser,
    post_id: web::Path<Uuid>,
) -> Result<HttpResponse> {
    require(&user, Permission::PostsDelete)?;

    let service = PostService::with_cache((**pool).clone(), cache.get_ref().clone());
    service.soft_delete(*post_id).await?;

    activity::record(
        pool.get_ref(),
        user.id,
        "post.delete",
        "post",
        Some(*post_id),
        json!({}),
    )
    .await;

    Ok(HttpResponse::NoContent().finish())
}

/// Hard delete an archived post (admin)
pub async fn purge_post(
    pool: web::Data<PgPool>,
    user: AuthenticatedUser,
    post_id: web::Path<Uuid>,
) -> Result<HttpResponse> {
    require(&user, Permission::PostsPurge)?;

    let service = PostService::new((**pool).clone());
    service.purge(*post_id).await?;

    activity::record(
        pool.get_ref(),
        user.id,
        "post.purge",
        "post",
        Some(*post_id),
        json!({}),
    )
    .await;

    Ok(HttpResponse::NoContent().finish())
}

/// List a post's translation family
pub async fn list_translations(
    pool: web::Data<PgPool>,
    user: AuthenticatedUser,
    post_id: web::Path<Uuid>,
) -> Result<HttpResponse> {
    require(&user, Permission::PostsRead)?;

    let service = PostService::new((**pool).clone());
    let translations = service.list_translations(*post_id).await?;

    Ok(HttpResponse::Ok().json(translations))
}

#[derive(Debug, Deserialize)]
pub struct CreateTranslationRequest {
    pub locale: String,
    pub title: String,
    pub slug: Option<String>,
}

/// Create a translation of a post in a new locale
pub async fn create_translation(
    pool: web::Data<PgPool>,
    cache: web::Data<Arc<PageCache>>,
    user: AuthenticatedUser,
    post_id: web::Path<Uuid>,
    req: web::Json<CreateTranslationRequest>,
) -> Result<HttpResponse> {
    require(&user, Permission::PostsWrite)?;

    let req = req.into_inner();
    let service = PostService::with_cache((**pool).clone(), cache.get_ref().clone());
    let translation = service
        .create_translation(*post_id, user.id, req.locale, req.title, req.slug)
        .await?;

    activity::record(
        pool.get_ref(),
        user.id,
        "post.translate",
        "post",
        Some(translation.id),
        json!({ "locale": translation.locale }),
    )
    .await;

    Ok(HttpResponse::Created().json(translation))
}

#[derive(Debug, Deserialize)]
pub struct ComposeQuery {
    pub mode: Option<String>,
}

/// Compose a post's modules under an editing mode
pub async fn compose_post(
    pool: web::Data<PgPool>,
    user: AuthenticatedUser,
    post_id: web::Path<Uuid>,
    query: web::Query<ComposeQuery>,
) -> Result<HttpResponse> {
    require(&user, Permission::PostsRead)?;

    let mode = match query.mode.as_deref() {
        Some(raw) => OverrideMode::from_str(raw)
            .ok_or_else(|| AppError::BadRequest(format!("unknown mode '{}'", raw)))?,
        None => OverrideMode::Published,
    };

    let composed = composition::compose_post(pool.get_ref(), *post_id, mode).await?;
    Ok(HttpResponse::Ok().json(composed))
}

/// Export a post as its canonical document
pub async fn export_post(
    pool: web::Data<PgPool>,
    user: AuthenticatedUser,
    post_id: web::Path<Uuid>,
) -> Result<HttpResponse> {
    require(&user, Permission::PostsRead)?;

    let service = CanonicalService::new((**pool).clone());
    let document = service.export(*post_id).await?;

    Ok(HttpResponse::Ok().json(document))
}

/// Import a canonical document
pub async fn import_post(
    pool: web::Data<PgPool>,
    cache: web::Data<Arc<PageCache>>,
    user: AuthenticatedUser,
    req: web::Json<CanonicalDocument>,
) -> Result<HttpResponse> {
    require(&user, Permission::PostsWrite)?;

    let service = CanonicalService::new((**pool).clone());
    let post = service.import(user.id, req.into_inner()).await?;

    if let Err(err) = cache.invalidate_locale(&post.locale).await {
        tracing::debug!(locale = %post.locale, "page cache invalidation failed: {}", err);
    }

    activity::record(
        pool.get_ref(),
        user.id,
        "post.import",
        "post",
        Some(post.id),
        json!({ "slug": post.slug }),
    )
    .await;

    Ok(HttpResponse::Created().json(post))
}
