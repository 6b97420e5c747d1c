/// Post repository - database operations for posts
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::models::Post;

const POST_COLUMNS: &str = "id, post_type, locale, slug, title, status, translation_of_id, \
     parent_id, order_index, author_id, excerpt, meta, scheduled_at, published_at, \
     created_at, updated_at, deleted_at";

/// Fields for a new post row
pub struct NewPost<'a> {
    pub post_type: &'a str,
    pub locale: &'a str,
    pub slug: &'a str,
    pub title: &'a str,
    pub status: &'a str,
    pub translation_of_id: Option<Uuid>,
    pub parent_id: Option<Uuid>,
    pub author_id: Uuid,
    pub excerpt: Option<&'a str>,
    pub meta: Value,
    pub scheduled_at: Option<DateTime<Utc>>,
}

/// Insert a post. Runs inside the caller's transaction so module seeding can
/// join it.
pub async fn create_post(conn: &mut PgConnection, new: NewPost<'_>) -> Result<Post, sqlx::Error> {
    let query = format!(
        r#"
        INSERT INTO posts (post_type, locale, slug, title, status, translation_of_id,
                           parent_id, order_index, author_id, excerpt, meta, scheduled_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7,
                COALESCE((SELECT MAX(order_index) + 1 FROM posts
                          WHERE parent_id IS NOT DISTINCT FROM $7 AND deleted_at IS NULL), 0),
                $8, $9, $10, $11)
        RETURNING {POST_COLUMNS}
        "#
    );

    sqlx::query_as::<_, Post>(&query)
        .bind(new.post_type)
        .bind(new.locale)
        .bind(new.slug)
        .bind(new.title)
        .bind(new.status)
        .bind(new.translation_of_id)
        .bind(new.parent_id)
        .bind(new.author_id)
        .bind(new.excerpt)
        .bind(new.meta)
        .bind(new.scheduled_at)
        .fetch_one(conn)
        .await
}

/// Find a post by ID (excluding soft-deleted posts)
pub async fn find_by_id(pool: &PgPool, post_id: Uuid) -> Result<Option<Post>, sqlx::Error> {
    let query = format!("SELECT {POST_COLUMNS} FROM posts WHERE id = $1 AND deleted_at IS NULL");
    sqlx::query_as::<_, Post>(&query)
        .bind(post_id)
        .fetch_optional(pool)
        .await
}

/// Find a post by ID including soft-deleted rows (restore, purge)
pub async fn find_by_id_any(pool: &PgPool, post_id: Uuid) -> Result<Option<Post>, sqlx::Error> {
    let query = format!("SELECT {POST_COLUMNS} FROM posts WHERE id = $1");
    sqlx::query_as::<_, Post>(&query)
        .bind(post_id)
        .fetch_optional(pool)
        .await
}

/// Whether a live post already uses (slug, locale), optionally excluding one id
pub async fn slug_exists(
    conn: &mut PgConnection,
    slug: &str,
    locale: &str,
    exclude_id: Option<Uuid>,
) -> Result<bool, sqlx::Error> {
    let exists: bool = sqlx::query_scalar(
        r#"
        SELECT EXISTS (
            SELECT 1 FROM posts
            WHERE slug = $1 AND locale = $2 AND deleted_at IS NULL
              AND ($3::uuid IS NULL OR id <> $3)
        )
        "#,
    )
    .bind(slug)
    .bind(locale)
    .bind(exclude_id)
    .fetch_one(conn)
    .await?;

    Ok(exists)
}

/// Published post lookup for public path resolution
pub async fn find_published(
    pool: &PgPool,
    post_type: &str,
    locale: &str,
    slug: &str,
) -> Result<Option<Post>, sqlx::Error> {
    let query = format!(
        r#"
        SELECT {POST_COLUMNS} FROM posts
        WHERE post_type = $1 AND locale = $2 AND slug = $3
          AND status = 'published' AND deleted_at IS NULL
        "#
    );
    sqlx::query_as::<_, Post>(&query)
        .bind(post_type)
        .bind(locale)
        .bind(slug)
        .fetch_optional(pool)
        .await
}

/// Listing filter; all fields optional
#[derive(Debug, Default)]
pub struct PostFilter {
    pub post_type: Option<String>,
    pub locale: Option<String>,
    pub status: Option<String>,
    pub parent_id: Option<Uuid>,
    pub include_deleted: bool,
}

/// List posts with optional filters, newest first
pub async fn list(
    pool: &PgPool,
    filter: &PostFilter,
    limit: i64,
    offset: i64,
) -> Result<Vec<Post>, sqlx::Error> {
    let mut builder: QueryBuilder<Postgres> =
        QueryBuilder::new(format!("SELECT {POST_COLUMNS} FROM posts WHERE TRUE"));

    if !filter.include_deleted {
        builder.push(" AND deleted_at IS NULL");
    }
    if let Some(post_type) = &filter.post_type {
        builder.push(" AND post_type = ").push_bind(post_type);
    }
    if let Some(locale) = &filter.locale {
        builder.push(" AND locale = ").push_bind(locale);
    }
    if let Some(status) = &filter.status {
        builder.push(" AND status = ").push_bind(status);
    }
    if let Some(parent_id) = filter.parent_id {
        builder.push(" AND parent_id = ").push_bind(parent_id);
    }

    builder
        .push(" ORDER BY created_at DESC LIMIT ")
        .push_bind(limit)
        .push(" OFFSET ")
        .push_bind(offset);

    builder.build_query_as::<Post>().fetch_all(pool).await
}

/// Patch for mutable post fields; `None` leaves a column untouched
#[derive(Debug, Default)]
pub struct PostChanges<'a> {
    pub slug: Option<&'a str>,
    pub title: Option<&'a str>,
    pub excerpt: Option<Option<&'a str>>,
    pub meta: Option<Value>,
    pub parent_id: Option<Option<Uuid>>,
    pub order_index: Option<i32>,
    pub scheduled_at: Option<Option<DateTime<Utc>>>,
}

/// Apply field updates to a live post
pub async fn update_post(
    conn: &mut PgConnection,
    post_id: Uuid,
    changes: PostChanges<'_>,
) -> Result<Option<Post>, sqlx::Error> {
    let query = format!(
        r#"
        UPDATE posts SET
            slug = COALESCE($2, slug),
            title = COALESCE($3, title),
            excerpt = CASE WHEN $4 THEN $5 ELSE excerpt END,
            meta = COALESCE($6, meta),
            parent_id = CASE WHEN $7 THEN $8 ELSE parent_id END,
            order_index = COALESCE($9, order_index),
            scheduled_at = CASE WHEN $10 THEN $11 ELSE scheduled_at END,
            updated_at = NOW()
        WHERE id = $1 AND deleted_at IS NULL
        RETURNING {POST_COLUMNS}
        "#
    );

    sqlx::query_as::<_, Post>(&query)
        .bind(post_id)
        .bind(changes.slug)
        .bind(changes.title)
        .bind(changes.excerpt.is_some())
        .bind(changes.excerpt.flatten())
        .bind(changes.meta)
        .bind(changes.parent_id.is_some())
        .bind(changes.parent_id.flatten())
        .bind(changes.order_index)
        .bind(changes.scheduled_at.is_some())
        .bind(changes.scheduled_at.flatten())
        .fetch_optional(conn)
        .await
}

/// Set a post's status; stamps published_at on first publish
pub async fn set_status(
    conn: &mut PgConnection,
    post_id: Uuid,
    status: &str,
) -> Result<Option<Post>, sqlx::Error> {
    let query = format!(
        r#"
        UPDATE posts SET
            status = $2,
            published_at = CASE WHEN $2 = 'published' THEN COALESCE(published_at, NOW())
                                ELSE published_at END,
            updated_at = NOW()
        WHERE id = $1 AND deleted_at IS NULL
        RETURNING {POST_COLUMNS}
        "#
    );

    sqlx::query_as::<_, Post>(&query)
        .bind(post_id)
        .bind(status)
        .fetch_optional(conn)
        .await
}

/// Soft delete a post
pub async fn soft_delete(pool: &PgPool, post_id: Uuid) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE posts SET deleted_at = NOW(), updated_at = NOW() WHERE id = $1 AND deleted_at IS NULL",
    )
    .bind(post_id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Bring a soft-deleted post back as a draft. The caller re-checks slug
/// uniqueness before calling this.
pub async fn restore(conn: &mut PgConnection, post_id: Uuid) -> Result<Option<Post>, sqlx::Error> {
    let query = format!(
        r#"
        UPDATE posts SET deleted_at = NULL, status = 'draft', updated_at = NOW()
        WHERE id = $1 AND deleted_at IS NOT NULL
        RETURNING {POST_COLUMNS}
        "#
    );
    sqlx::query_as::<_, Post>(&query)
        .bind(post_id)
        .fetch_optional(conn)
        .await
}

/// Hard delete. Restricted to archived posts; post_modules cascade.
pub async fn hard_delete(pool: &PgPool, post_id: Uuid) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM posts WHERE id = $1 AND status = 'archived'")
        .bind(post_id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

/// All live members of a translation family (root plus translations)
pub async fn list_translations(pool: &PgPool, root_id: Uuid) -> Result<Vec<Post>, sqlx::Error> {
    let query = format!(
        r#"
        SELECT {POST_COLUMNS} FROM posts
        WHERE (id = $1 OR translation_of_id = $1) AND deleted_at IS NULL
        ORDER BY locale
        "#
    );
    sqlx::query_as::<_, Post>(&query)
        .bind(root_id)
        .fetch_all(pool)
        .await
}

/// Whether `candidate` is `post_id` itself or one of its descendants.
/// Used to reject parent assignments that would create a cycle.
pub async fn is_self_or_descendant(
    conn: &mut PgConnection,
    post_id: Uuid,
    candidate: Uuid,
) -> Result<bool, sqlx::Error> {
    let found: bool = sqlx::query_scalar(
        r#"
        WITH RECURSIVE subtree AS (
            SELECT id FROM posts WHERE id = $1
            UNION ALL
            SELECT p.id FROM posts p JOIN subtree s ON p.parent_id = s.id
        )
        SELECT EXISTS (SELECT 1 FROM subtree WHERE id = $2)
        "#,
    )
    .bind(post_id)
    .bind(candidate)
    .fetch_one(conn)
    .await?;

    Ok(found)
}

/// Publish every scheduled post whose time has come; returns the published rows
pub async fn publish_due(
    conn: &mut PgConnection,
    now: DateTime<Utc>,
) -> Result<Vec<Post>, sqlx::Error> {
    let query = format!(
        r#"
        UPDATE posts SET
            status = 'published',
            published_at = COALESCE(published_at, NOW()),
            updated_at = NOW()
        WHERE status = 'scheduled' AND scheduled_at <= $1 AND deleted_at IS NULL
        RETURNING {POST_COLUMNS}
        "#
    );
    sqlx::query_as::<_, Post>(&query)
        .bind(now)
        .fetch_all(conn)
        .await
}

/// Published posts for the sitemap, oldest first for stable output
pub async fn list_published(pool: &PgPool) -> Result<Vec<Post>, sqlx::Error> {
    let query = format!(
        r#"
        SELECT {POST_COLUMNS} FROM posts
        WHERE status = 'published' AND deleted_at IS NULL
        ORDER BY published_at ASC NULLS LAST
        "#
    );
    sqlx::query_as::<_, Post>(&query).fetch_all(pool).await
}
