/// Module group repository - reusable module templates
use serde_json::Value;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::models::{ModuleGroup, ModuleGroupModule};

const GROUP_COLUMNS: &str = "id, name, post_type, description, created_at, updated_at";
const GROUP_MODULE_COLUMNS: &str =
    "id, module_group_id, module_type, default_props, order_index";

pub async fn create_group(
    conn: &mut PgConnection,
    name: &str,
    post_type: Option<&str>,
    description: Option<&str>,
) -> Result<ModuleGroup, sqlx::Error> {
    let query = format!(
        r#"
        INSERT INTO module_groups (name, post_type, description)
        VALUES ($1, $2, $3)
        RETURNING {GROUP_COLUMNS}
        "#
    );
    sqlx::query_as::<_, ModuleGroup>(&query)
        .bind(name)
        .bind(post_type)
        .bind(description)
        .fetch_one(conn)
        .await
}

pub async fn find_group(pool: &PgPool, group_id: Uuid) -> Result<Option<ModuleGroup>, sqlx::Error> {
    let query = format!("SELECT {GROUP_COLUMNS} FROM module_groups WHERE id = $1");
    sqlx::query_as::<_, ModuleGroup>(&query)
        .bind(group_id)
        .fetch_optional(pool)
        .await
}

pub async fn list_groups(pool: &PgPool) -> Result<Vec<ModuleGroup>, sqlx::Error> {
    let query = format!("SELECT {GROUP_COLUMNS} FROM module_groups ORDER BY name");
    sqlx::query_as::<_, ModuleGroup>(&query).fetch_all(pool).await
}

/// The default group for a post type, when one is registered
pub async fn find_group_for_post_type(
    conn: &mut PgConnection,
    post_type: &str,
) -> Result<Option<ModuleGroup>, sqlx::Error> {
    let query = format!(
        r#"
        SELECT {GROUP_COLUMNS} FROM module_groups
        WHERE post_type = $1
        ORDER BY created_at
        LIMIT 1
        "#
    );
    sqlx::query_as::<_, ModuleGroup>(&query)
        .bind(post_type)
        .fetch_optional(conn)
        .await
}

pub async fn update_group(
    pool: &PgPool,
    group_id: Uuid,
    name: Option<&str>,
    post_type: Option<Option<&str>>,
    description: Option<Option<&str>>,
) -> Result<Option<ModuleGroup>, sqlx::Error> {
    let query = format!(
        r#"
        UPDATE module_groups SET
            name = COALESCE($2, name),
            post_type = CASE WHEN $3 THEN $4 ELSE post_type END,
            description = CASE WHEN $5 THEN $6 ELSE description END,
            updated_at = NOW()
        WHERE id = $1
        RETURNING {GROUP_COLUMNS}
        "#
    );
    sqlx::query_as::<_, ModuleGroup>(&query)
        .bind(group_id)
        .bind(name)
        .bind(post_type.is_some())
        .bind(post_type.flatten())
        .bind(description.is_some())
        .bind(description.flatten())
        .fetch_optional(pool)
        .await
}

pub async fn delete_group(pool: &PgPool, group_id: Uuid) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM module_groups WHERE id = $1")
        .bind(group_id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn add_group_module(
    conn: &mut PgConnection,
    group_id: Uuid,
    module_type: &str,
    default_props: &Value,
    order_index: i32,
) -> Result<ModuleGroupModule, sqlx::Error> {
    let query = format!(
        r#"
        INSERT INTO module_group_modules (module_group_id, module_type, default_props, order_index)
        VALUES ($1, $2, $3, $4)
        RETURNING {GROUP_MODULE_COLUMNS}
        "#
    );
    sqlx::query_as::<_, ModuleGroupModule>(&query)
        .bind(group_id)
        .bind(module_type)
        .bind(default_props)
        .bind(order_index)
        .fetch_one(conn)
        .await
}

pub async fn list_group_modules(
    conn: &mut PgConnection,
    group_id: Uuid,
) -> Result<Vec<ModuleGroupModule>, sqlx::Error> {
    let query = format!(
        r#"
        SELECT {GROUP_MODULE_COLUMNS} FROM module_group_modules
        WHERE module_group_id = $1
        ORDER BY order_index
        "#
    );
    sqlx::query_as::<_, ModuleGroupModule>(&query)
        .bind(group_id)
        .fetch_all(conn)
        .await
}

/// Replace a group's template rows wholesale
pub async fn replace_group_modules(
    conn: &mut PgConnection,
    group_id: Uuid,
    modules: &[(String, Value)],
) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM module_group_modules WHERE module_group_id = $1")
        .bind(group_id)
        .execute(&mut *conn)
        .await?;

    for (index, (module_type, default_props)) in modules.iter().enumerate() {
        sqlx::query(
            "INSERT INTO module_group_modules (module_group_id, module_type, default_props, order_index)
             VALUES ($1, $2, $3, $4)",
        )
        .bind(group_id)
        .bind(module_type)
        .bind(default_props)
        .bind(index as i32)
        .execute(&mut *conn)
        .await?;
    }

    Ok(())
}
