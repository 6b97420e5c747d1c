/// Public site handlers - path resolution, robots.txt, sitemap.xml
///
/// These endpoints are unauthenticated and sit behind the rate limiter. The
/// resolve endpoint serves the composed JSON document the SSR layer renders,
/// through the Redis page cache.
use actix_web::{web, HttpResponse};
use serde::Deserialize;
use sqlx::PgPool;
use std::sync::Arc;
use tracing::debug;

use crate::cache::PageCache;
use crate::db::post_repo;
use crate::error::{AppError, Result};
use crate::models::OverrideMode;
use crate::registry;
use crate::services::{composition, SettingsService};

/// Shared state for public handlers
pub struct PublicState {
    /// Absolute site origin used in sitemap URLs
    pub base_url: String,
}

#[derive(Debug, Deserialize)]
pub struct ResolveQuery {
    pub path: String,
}

/// Resolve a public path to a composed, published post
pub async fn resolve(
    pool: web::Data<PgPool>,
    cache: web::Data<Arc<PageCache>>,
    settings: web::Data<Arc<SettingsService>>,
    query: web::Query<ResolveQuery>,
) -> Result<HttpResponse> {
    let resolved = registry::resolve_path(&query.path)
        .ok_or_else(|| AppError::NotFound(format!("no page at '{}'", query.path)))?;

    let settings_rev = settings.revision();

    // Cache outages degrade to direct composition
    match cache
        .read_page(&resolved.locale, &query.path, settings_rev)
        .await
    {
        Ok(Some(page)) => return Ok(HttpResponse::Ok().json(page)),
        Ok(None) => {}
        Err(err) => debug!("page cache read failed: {}", err),
    }

    let post = post_repo::find_published(
        pool.get_ref(),
        &resolved.post_type,
        &resolved.locale,
        &resolved.slug,
    )
    .await?
    .ok_or_else(|| AppError::NotFound(format!("no page at '{}'", query.path)))?;

    let composed = composition::compose_post(pool.get_ref(), post.id, OverrideMode::Published).await?;

    if let Err(err) = cache
        .write_page(&resolved.locale, &query.path, settings_rev, &composed)
        .await
    {
        debug!("page cache write failed: {}", err);
    }

    Ok(HttpResponse::Ok().json(composed))
}

/// robots.txt pointing crawlers at the sitemap
pub async fn robots(state: web::Data<PublicState>) -> HttpResponse {
    let body = format!(
        "User-agent: *\nAllow: /\n\nSitemap: {}/sitemap.xml\n",
        state.base_url.trim_end_matches('/')
    );

    HttpResponse::Ok().content_type("text/plain").body(body)
}

/// sitemap.xml of every published post, built from the URL pattern registry
pub async fn sitemap(pool: web::Data<PgPool>, state: web::Data<PublicState>) -> Result<HttpResponse> {
    let posts = post_repo::list_published(pool.get_ref()).await?;
    let base = state.base_url.trim_end_matches('/');

    let mut body = String::from(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
         <urlset xmlns=\"http://www.sitemaps.org/schemas/sitemap/0.9\">\n",
    );

    for post in &posts {
        // Posts of types without a registered pattern have no public URL
        let Ok(path) = registry::build_path(post) else {
            continue;
        };
        let lastmod = post
            .published_at
            .unwrap_or(post.updated_at)
            .format("%Y-%m-%d");
        body.push_str(&format!(
            "  <url><loc>{}{}</loc><lastmod>{}</lastmod></url>\n",
            base, path, lastmod
        ));
    }

    body.push_str("</urlset>\n");

    Ok(HttpResponse::Ok()
        .content_type("application/xml")
        .body(body))
}
