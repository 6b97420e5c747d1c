/// Post service - post lifecycle, slugs, translations, and module seeding
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::{PgConnection, PgPool};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use crate::cache::PageCache;
use crate::db::{module_group_repo, module_repo, post_repo};
use crate::error::{AppError, Result};
use crate::models::{Post, PostStatus};
use crate::registry;

/// Attempts before giving up on finding a free slug
const SLUG_PROBE_LIMIT: u32 = 100;

/// Turn arbitrary text into a URL-safe slug.
pub fn slugify(input: &str) -> String {
    let mut slug = String::with_capacity(input.len());
    let mut last_dash = true;

    for c in input.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
            last_dash = false;
        } else if !last_dash {
            slug.push('-');
            last_dash = true;
        }
    }

    let slug = slug.trim_matches('-').to_string();
    if slug.is_empty() {
        "post".to_string()
    } else {
        slug
    }
}

/// Find a free (slug, locale) by probing `base`, `base-1`, `base-2`, …
pub async fn unique_slug(
    conn: &mut PgConnection,
    base: &str,
    locale: &str,
    exclude_id: Option<Uuid>,
) -> Result<String> {
    for attempt in 0..SLUG_PROBE_LIMIT {
        let candidate = if attempt == 0 {
            base.to_string()
        } else {
            format!("{}-{}", base, attempt)
        };

        if !post_repo::slug_exists(conn, &candidate, locale, exclude_id).await? {
            return Ok(candidate);
        }
    }

    Err(AppError::Internal(format!(
        "no free slug found for '{}' in locale '{}'",
        base, locale
    )))
}

/// Fields accepted when creating a post
#[derive(Debug)]
pub struct CreatePostInput {
    pub post_type: String,
    pub locale: String,
    pub title: String,
    /// Explicit slug (validated) or None to derive one from the title (probed)
    pub slug: Option<String>,
    pub status: Option<String>,
    pub translation_of_id: Option<Uuid>,
    pub parent_id: Option<Uuid>,
    pub excerpt: Option<String>,
    pub meta: Value,
    pub scheduled_at: Option<DateTime<Utc>>,
}

/// Fields accepted when updating a post
#[derive(Debug, Default)]
pub struct UpdatePostInput {
    pub title: Option<String>,
    pub slug: Option<String>,
    pub excerpt: Option<Option<String>>,
    pub meta: Option<Value>,
    pub parent_id: Option<Option<Uuid>>,
    pub order_index: Option<i32>,
    pub scheduled_at: Option<Option<DateTime<Utc>>>,
}

pub struct PostService {
    pool: PgPool,
    cache: Option<Arc<PageCache>>,
}

impl PostService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool, cache: None }
    }

    pub fn with_cache(pool: PgPool, cache: Arc<PageCache>) -> Self {
        Self {
            pool,
            cache: Some(cache),
        }
    }

    async fn invalidate_locale(&self, locale: &str) {
        if let Some(cache) = &self.cache {
            if let Err(err) = cache.invalidate_locale(locale).await {
                debug!(%locale, "page cache invalidation failed: {}", err);
            }
        }
    }

    /// Create a post and seed its default modules in one transaction.
    pub async fn create_post(&self, author_id: Uuid, input: CreatePostInput) -> Result<Post> {
        let status = match &input.status {
            Some(s) => PostStatus::from_str(s)
                .ok_or_else(|| AppError::BadRequest(format!("unknown status '{}'", s)))?,
            None => PostStatus::Draft,
        };

        if status == PostStatus::Scheduled {
            match input.scheduled_at {
                Some(at) if at > Utc::now() => {}
                _ => {
                    return Err(AppError::BadRequest(
                        "scheduled posts require a future scheduled_at".to_string(),
                    ))
                }
            }
        }

        if let Some(parent_id) = input.parent_id {
            post_repo::find_by_id(&self.pool, parent_id)
                .await?
                .ok_or_else(|| {
                    AppError::BadRequest(format!("parent post {} not found", parent_id))
                })?;
        }

        if let Some(root_id) = input.translation_of_id {
            self.validate_translation_root(root_id, &input.locale).await?;
        }

        let mut tx = self.pool.begin().await?;

        let slug = match &input.slug {
            Some(explicit) => {
                let explicit = slugify(explicit);
                if post_repo::slug_exists(&mut tx, &explicit, &input.locale, None).await? {
                    return Err(AppError::Conflict(format!(
                        "slug '{}' already in use for locale '{}'",
                        explicit, input.locale
                    )));
                }
                explicit
            }
            None => unique_slug(&mut tx, &slugify(&input.title), &input.locale, None).await?,
        };

        let post = post_repo::create_post(
            &mut tx,
            post_repo::NewPost {
                post_type: &input.post_type,
                locale: &input.locale,
                slug: &slug,
                title: &input.title,
                status: status.as_str(),
                translation_of_id: input.translation_of_id,
                parent_id: input.parent_id,
                author_id,
                excerpt: input.excerpt.as_deref(),
                meta: input.meta,
                scheduled_at: input.scheduled_at,
            },
        )
        .await?;

        self.seed_default_modules(&mut tx, &post).await?;

        tx.commit().await?;

        if status.is_public() {
            self.invalidate_locale(&post.locale).await;
        }

        Ok(post)
    }

    /// Seed the post type's default module group onto a fresh post
    async fn seed_default_modules(&self, conn: &mut PgConnection, post: &Post) -> Result<()> {
        let Some(group) =
            module_group_repo::find_group_for_post_type(conn, &post.post_type).await?
        else {
            return Ok(());
        };

        let templates = module_group_repo::list_group_modules(conn, group.id).await?;
        for template in templates {
            let instance = module_repo::create_instance(
                conn,
                &template.module_type,
                "post",
                None,
                &template.default_props,
            )
            .await?;
            module_repo::attach(conn, post.id, instance.id).await?;
        }

        debug!(post_id = %post.id, group = %group.name, "seeded default modules");
        Ok(())
    }

    async fn validate_translation_root(&self, root_id: Uuid, locale: &str) -> Result<()> {
        let root = post_repo::find_by_id(&self.pool, root_id)
            .await?
            .ok_or_else(|| {
                AppError::BadRequest(format!("translation root {} not found", root_id))
            })?;

        if root.is_translation() {
            return Err(AppError::BadRequest(
                "translations must reference the family root, not another translation".to_string(),
            ));
        }
        if root.locale == locale {
            return Err(AppError::BadRequest(format!(
                "translation locale '{}' matches the root post's locale",
                locale
            )));
        }

        let family = post_repo::list_translations(&self.pool, root_id).await?;
        if family.iter().any(|p| p.locale == locale) {
            return Err(AppError::Conflict(format!(
                "a translation for locale '{}' already exists",
                locale
            )));
        }

        Ok(())
    }

    pub async fn get_post(&self, post_id: Uuid) -> Result<Option<Post>> {
        Ok(post_repo::find_by_id(&self.pool, post_id).await?)
    }

    pub async fn list_posts(
        &self,
        filter: &post_repo::PostFilter,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Post>> {
        Ok(post_repo::list(&self.pool, filter, limit, offset).await?)
    }

    pub async fn update_post(&self, post_id: Uuid, input: UpdatePostInput) -> Result<Post> {
        let post = post_repo::find_by_id(&self.pool, post_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("post {} not found", post_id)))?;

        let mut tx = self.pool.begin().await?;

        let slug = match &input.slug {
            Some(requested) => {
                let requested = slugify(requested);
                if requested != post.slug
                    && post_repo::slug_exists(&mut tx, &requested, &post.locale, Some(post.id))
                        .await?
                {
                    return Err(AppError::Conflict(format!(
                        "slug '{}' already in use for locale '{}'",
                        requested, post.locale
                    )));
                }
                Some(requested)
            }
            None => None,
        };

        if let Some(Some(new_parent)) = input.parent_id {
            if post_repo::is_self_or_descendant(&mut tx, post.id, new_parent).await? {
                return Err(AppError::BadRequest(
                    "a post cannot become a child of itself or of its own subtree".to_string(),
                ));
            }
            post_repo::find_by_id(&self.pool, new_parent)
                .await?
                .ok_or_else(|| {
                    AppError::BadRequest(format!("parent post {} not found", new_parent))
                })?;
        }

        let updated = post_repo::update_post(
            &mut tx,
            post_id,
            post_repo::PostChanges {
                slug: slug.as_deref(),
                title: input.title.as_deref(),
                excerpt: input.excerpt.as_ref().map(|e| e.as_deref()),
                meta: input.meta,
                parent_id: input.parent_id,
                order_index: input.order_index,
                scheduled_at: input.scheduled_at,
            },
        )
        .await?
        .ok_or_else(|| AppError::NotFound(format!("post {} not found", post_id)))?;

        tx.commit().await?;

        if updated.status().map(|s| s.is_public()).unwrap_or(false) {
            self.invalidate_locale(&updated.locale).await;
        }

        Ok(updated)
    }

    pub async fn publish(&self, post_id: Uuid) -> Result<Post> {
        let post = post_repo::find_by_id(&self.pool, post_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("post {} not found", post_id)))?;

        if post.status() == Some(PostStatus::Archived) {
            return Err(AppError::BadRequest(
                "archived posts must be restored before publishing".to_string(),
            ));
        }

        let mut tx = self.pool.begin().await?;
        let published = post_repo::set_status(&mut tx, post_id, PostStatus::Published.as_str())
            .await?
            .ok_or_else(|| AppError::NotFound(format!("post {} not found", post_id)))?;
        tx.commit().await?;

        self.invalidate_locale(&published.locale).await;
        Ok(published)
    }

    pub async fn schedule(&self, post_id: Uuid, at: DateTime<Utc>) -> Result<Post> {
        if at <= Utc::now() {
            return Err(AppError::BadRequest(
                "scheduled_at must be in the future".to_string(),
            ));
        }

        let mut tx = self.pool.begin().await?;
        post_repo::update_post(
            &mut tx,
            post_id,
            post_repo::PostChanges {
                scheduled_at: Some(Some(at)),
                ..Default::default()
            },
        )
        .await?
        .ok_or_else(|| AppError::NotFound(format!("post {} not found", post_id)))?;

        let scheduled = post_repo::set_status(&mut tx, post_id, PostStatus::Scheduled.as_str())
            .await?
            .ok_or_else(|| AppError::NotFound(format!("post {} not found", post_id)))?;
        tx.commit().await?;

        Ok(scheduled)
    }

    pub async fn archive(&self, post_id: Uuid) -> Result<Post> {
        let mut tx = self.pool.begin().await?;
        let archived = post_repo::set_status(&mut tx, post_id, PostStatus::Archived.as_str())
            .await?
            .ok_or_else(|| AppError::NotFound(format!("post {} not found", post_id)))?;
        tx.commit().await?;

        self.invalidate_locale(&archived.locale).await;
        Ok(archived)
    }

    /// Bring back a soft-deleted or archived post as a draft
    pub async fn restore(&self, post_id: Uuid) -> Result<Post> {
        let post = post_repo::find_by_id_any(&self.pool, post_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("post {} not found", post_id)))?;

        let mut tx = self.pool.begin().await?;

        let restored = if post.deleted_at.is_some() {
            // Another live post may have claimed the slug in the meantime
            if post_repo::slug_exists(&mut tx, &post.slug, &post.locale, Some(post.id)).await? {
                let free = unique_slug(&mut tx, &post.slug, &post.locale, Some(post.id)).await?;
                sqlx::query("UPDATE posts SET slug = $2 WHERE id = $1")
                    .bind(post.id)
                    .bind(&free)
                    .execute(&mut *tx)
                    .await?;
            }
            post_repo::restore(&mut tx, post_id)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("post {} not found", post_id)))?
        } else if post.status() == Some(PostStatus::Archived) {
            post_repo::set_status(&mut tx, post_id, PostStatus::Draft.as_str())
                .await?
                .ok_or_else(|| AppError::NotFound(format!("post {} not found", post_id)))?
        } else {
            return Err(AppError::BadRequest(
                "only deleted or archived posts can be restored".to_string(),
            ));
        };

        tx.commit().await?;
        Ok(restored)
    }

    pub async fn soft_delete(&self, post_id: Uuid) -> Result<()> {
        let post = post_repo::find_by_id(&self.pool, post_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("post {} not found", post_id)))?;

        if !post_repo::soft_delete(&self.pool, post_id).await? {
            return Err(AppError::NotFound(format!("post {} not found", post_id)));
        }

        if post.status().map(|s| s.is_public()).unwrap_or(false) {
            self.invalidate_locale(&post.locale).await;
        }

        Ok(())
    }

    /// Hard delete an archived post and clean up its orphaned module instances
    pub async fn purge(&self, post_id: Uuid) -> Result<()> {
        let post = post_repo::find_by_id_any(&self.pool, post_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("post {} not found", post_id)))?;

        if post.status() != Some(PostStatus::Archived) {
            return Err(AppError::BadRequest(
                "only archived posts can be permanently deleted".to_string(),
            ));
        }

        if !post_repo::hard_delete(&self.pool, post_id).await? {
            return Err(AppError::NotFound(format!("post {} not found", post_id)));
        }

        let mut tx = self.pool.begin().await?;
        let removed = module_repo::delete_orphaned_post_instances(&mut tx).await?;
        tx.commit().await?;
        if removed > 0 {
            debug!(post_id = %post_id, removed, "cleaned up orphaned module instances");
        }

        Ok(())
    }

    pub async fn list_translations(&self, post_id: Uuid) -> Result<Vec<Post>> {
        let post = post_repo::find_by_id(&self.pool, post_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("post {} not found", post_id)))?;

        let root_id = post.translation_of_id.unwrap_or(post.id);
        Ok(post_repo::list_translations(&self.pool, root_id).await?)
    }

    /// Create a translation of an existing post in a new locale
    pub async fn create_translation(
        &self,
        post_id: Uuid,
        author_id: Uuid,
        locale: String,
        title: String,
        slug: Option<String>,
    ) -> Result<Post> {
        let source = post_repo::find_by_id(&self.pool, post_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("post {} not found", post_id)))?;

        // Translations always hang off the family root
        let root_id = source.translation_of_id.unwrap_or(source.id);

        self.create_post(
            author_id,
            CreatePostInput {
                post_type: source.post_type.clone(),
                locale,
                title,
                slug,
                status: None,
                translation_of_id: Some(root_id),
                parent_id: None,
                excerpt: None,
                meta: source.meta.clone(),
                scheduled_at: None,
            },
        )
        .await
    }

    /// Public path for a post via the URL pattern registry
    pub fn public_path(&self, post: &Post) -> Result<String> {
        registry::build_path(post)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slugify_basics() {
        assert_eq!(slugify("Hello, World!"), "hello-world");
        assert_eq!(slugify("  Launch Notes 2025  "), "launch-notes-2025");
        assert_eq!(slugify("Déjà vu"), "d-j-vu");
    }

    #[test]
    fn test_slugify_collapses_runs_and_trims() {
        assert_eq!(slugify("a -- b"), "a-b");
        assert_eq!(slugify("---"), "post");
        assert_eq!(slugify(""), "post");
    }

    #[test]
    fn test_slugify_is_idempotent() {
        let once = slugify("Some Page Title");
        assert_eq!(slugify(&once), once);
    }
}
