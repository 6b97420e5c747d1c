/// Module repository - database operations for module instances and
/// post-module attachments
use serde_json::Value;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::models::{ModuleInstance, PostModule};

const INSTANCE_COLUMNS: &str =
    "id, module_type, scope, global_slug, props, created_at, updated_at";

const POST_MODULE_COLUMNS: &str = "id, post_id, module_instance_id, order_index, overrides, \
     review_overrides, ai_review_overrides, locked, created_at, updated_at";

// ========================================
// Module instances
// ========================================

pub async fn create_instance(
    conn: &mut PgConnection,
    module_type: &str,
    scope: &str,
    global_slug: Option<&str>,
    props: &Value,
) -> Result<ModuleInstance, sqlx::Error> {
    let query = format!(
        r#"
        INSERT INTO module_instances (module_type, scope, global_slug, props)
        VALUES ($1, $2, $3, $4)
        RETURNING {INSTANCE_COLUMNS}
        "#
    );

    sqlx::query_as::<_, ModuleInstance>(&query)
        .bind(module_type)
        .bind(scope)
        .bind(global_slug)
        .bind(props)
        .fetch_one(conn)
        .await
}

pub async fn find_instance(
    pool: &PgPool,
    instance_id: Uuid,
) -> Result<Option<ModuleInstance>, sqlx::Error> {
    let query = format!("SELECT {INSTANCE_COLUMNS} FROM module_instances WHERE id = $1");
    sqlx::query_as::<_, ModuleInstance>(&query)
        .bind(instance_id)
        .fetch_optional(pool)
        .await
}

pub async fn find_instance_by_global_slug(
    conn: &mut PgConnection,
    global_slug: &str,
) -> Result<Option<ModuleInstance>, sqlx::Error> {
    let query =
        format!("SELECT {INSTANCE_COLUMNS} FROM module_instances WHERE global_slug = $1");
    sqlx::query_as::<_, ModuleInstance>(&query)
        .bind(global_slug)
        .fetch_optional(conn)
        .await
}

/// List shared instances (global and static scope)
pub async fn list_shared_instances(pool: &PgPool) -> Result<Vec<ModuleInstance>, sqlx::Error> {
    let query = format!(
        r#"
        SELECT {INSTANCE_COLUMNS} FROM module_instances
        WHERE scope IN ('global', 'static')
        ORDER BY global_slug NULLS LAST, created_at
        "#
    );
    sqlx::query_as::<_, ModuleInstance>(&query).fetch_all(pool).await
}

pub async fn update_instance_props(
    pool: &PgPool,
    instance_id: Uuid,
    props: &Value,
) -> Result<Option<ModuleInstance>, sqlx::Error> {
    let query = format!(
        r#"
        UPDATE module_instances SET props = $2, updated_at = NOW()
        WHERE id = $1
        RETURNING {INSTANCE_COLUMNS}
        "#
    );
    sqlx::query_as::<_, ModuleInstance>(&query)
        .bind(instance_id)
        .bind(props)
        .fetch_optional(pool)
        .await
}

/// Number of post_modules rows referencing an instance
pub async fn count_references(
    conn: &mut PgConnection,
    instance_id: Uuid,
) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar("SELECT COUNT(*) FROM post_modules WHERE module_instance_id = $1")
        .bind(instance_id)
        .fetch_one(conn)
        .await
}

/// Delete an instance. The caller verifies it is unreferenced first.
pub async fn delete_instance(
    conn: &mut PgConnection,
    instance_id: Uuid,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM module_instances WHERE id = $1")
        .bind(instance_id)
        .execute(conn)
        .await?;

    Ok(result.rows_affected() > 0)
}

/// Delete post-scoped instances left orphaned after their attachment rows
/// went away (detach, post purge).
pub async fn delete_orphaned_post_instances(
    conn: &mut PgConnection,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        r#"
        DELETE FROM module_instances mi
        WHERE mi.scope = 'post'
          AND NOT EXISTS (SELECT 1 FROM post_modules pm WHERE pm.module_instance_id = mi.id)
        "#,
    )
    .execute(conn)
    .await?;

    Ok(result.rows_affected())
}

// ========================================
// Post-module attachments
// ========================================

/// Attach an instance to a post at the end of its module list
pub async fn attach(
    conn: &mut PgConnection,
    post_id: Uuid,
    instance_id: Uuid,
) -> Result<PostModule, sqlx::Error> {
    let query = format!(
        r#"
        INSERT INTO post_modules (post_id, module_instance_id, order_index)
        VALUES ($1, $2,
                COALESCE((SELECT MAX(order_index) + 1 FROM post_modules WHERE post_id = $1), 0))
        RETURNING {POST_MODULE_COLUMNS}
        "#
    );

    sqlx::query_as::<_, PostModule>(&query)
        .bind(post_id)
        .bind(instance_id)
        .fetch_one(conn)
        .await
}

pub async fn find_post_module(
    pool: &PgPool,
    post_module_id: Uuid,
) -> Result<Option<PostModule>, sqlx::Error> {
    let query = format!("SELECT {POST_MODULE_COLUMNS} FROM post_modules WHERE id = $1");
    sqlx::query_as::<_, PostModule>(&query)
        .bind(post_module_id)
        .fetch_optional(pool)
        .await
}

/// A post's attachments in display order
pub async fn list_for_post(pool: &PgPool, post_id: Uuid) -> Result<Vec<PostModule>, sqlx::Error> {
    let query = format!(
        r#"
        SELECT {POST_MODULE_COLUMNS} FROM post_modules
        WHERE post_id = $1
        ORDER BY order_index, created_at
        "#
    );
    sqlx::query_as::<_, PostModule>(&query)
        .bind(post_id)
        .fetch_all(pool)
        .await
}

/// Instances for a set of attachment rows, fetched in one round trip
pub async fn instances_by_ids(
    pool: &PgPool,
    ids: &[Uuid],
) -> Result<Vec<ModuleInstance>, sqlx::Error> {
    let query = format!("SELECT {INSTANCE_COLUMNS} FROM module_instances WHERE id = ANY($1)");
    sqlx::query_as::<_, ModuleInstance>(&query)
        .bind(ids)
        .fetch_all(pool)
        .await
}

/// Replace all three override columns at once (staging, promote, discard)
pub async fn set_override_columns(
    conn: &mut PgConnection,
    post_module_id: Uuid,
    overrides: &Value,
    review_overrides: &Value,
    ai_review_overrides: &Value,
) -> Result<Option<PostModule>, sqlx::Error> {
    let query = format!(
        r#"
        UPDATE post_modules SET
            overrides = $2,
            review_overrides = $3,
            ai_review_overrides = $4,
            updated_at = NOW()
        WHERE id = $1
        RETURNING {POST_MODULE_COLUMNS}
        "#
    );

    sqlx::query_as::<_, PostModule>(&query)
        .bind(post_module_id)
        .bind(overrides)
        .bind(review_overrides)
        .bind(ai_review_overrides)
        .fetch_optional(conn)
        .await
}

pub async fn set_locked(
    pool: &PgPool,
    post_module_id: Uuid,
    locked: bool,
) -> Result<Option<PostModule>, sqlx::Error> {
    let query = format!(
        r#"
        UPDATE post_modules SET locked = $2, updated_at = NOW()
        WHERE id = $1
        RETURNING {POST_MODULE_COLUMNS}
        "#
    );
    sqlx::query_as::<_, PostModule>(&query)
        .bind(post_module_id)
        .bind(locked)
        .fetch_optional(pool)
        .await
}

pub async fn detach(conn: &mut PgConnection, post_module_id: Uuid) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM post_modules WHERE id = $1")
        .bind(post_module_id)
        .execute(conn)
        .await?;

    Ok(result.rows_affected() > 0)
}

/// Apply a full reorder permutation for one post
pub async fn set_order(
    conn: &mut PgConnection,
    post_id: Uuid,
    ordered_ids: &[Uuid],
) -> Result<(), sqlx::Error> {
    for (index, post_module_id) in ordered_ids.iter().enumerate() {
        sqlx::query(
            "UPDATE post_modules SET order_index = $3, updated_at = NOW()
             WHERE id = $1 AND post_id = $2",
        )
        .bind(post_module_id)
        .bind(post_id)
        .bind(index as i32)
        .execute(&mut *conn)
        .await?;
    }

    Ok(())
}

/// Detach every module from a post (canonical import rebuilds from scratch)
pub async fn detach_all_for_post(
    conn: &mut PgConnection,
    post_id: Uuid,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM post_modules WHERE post_id = $1")
        .bind(post_id)
        .execute(conn)
        .await?;

    Ok(result.rows_affected())
}
