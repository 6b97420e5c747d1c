/// Menu repository - database operations for navigation menus
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::Menu;

const MENU_COLUMNS: &str = "id, name, locale, items, created_at, updated_at";

pub async fn create(
    pool: &PgPool,
    name: &str,
    locale: &str,
    items: &Value,
) -> Result<Menu, sqlx::Error> {
    let query = format!(
        r#"
        INSERT INTO menus (name, locale, items)
        VALUES ($1, $2, $3)
        RETURNING {MENU_COLUMNS}
        "#
    );
    sqlx::query_as::<_, Menu>(&query)
        .bind(name)
        .bind(locale)
        .bind(items)
        .fetch_one(pool)
        .await
}

pub async fn find_by_id(pool: &PgPool, menu_id: Uuid) -> Result<Option<Menu>, sqlx::Error> {
    let query = format!("SELECT {MENU_COLUMNS} FROM menus WHERE id = $1");
    sqlx::query_as::<_, Menu>(&query)
        .bind(menu_id)
        .fetch_optional(pool)
        .await
}

pub async fn list(pool: &PgPool, locale: Option<&str>) -> Result<Vec<Menu>, sqlx::Error> {
    let query = format!(
        r#"
        SELECT {MENU_COLUMNS} FROM menus
        WHERE ($1::text IS NULL OR locale = $1)
        ORDER BY name, locale
        "#
    );
    sqlx::query_as::<_, Menu>(&query)
        .bind(locale)
        .fetch_all(pool)
        .await
}

pub async fn update(
    pool: &PgPool,
    menu_id: Uuid,
    name: Option<&str>,
    items: Option<&Value>,
) -> Result<Option<Menu>, sqlx::Error> {
    let query = format!(
        r#"
        UPDATE menus SET
            name = COALESCE($2, name),
            items = COALESCE($3, items),
            updated_at = NOW()
        WHERE id = $1
        RETURNING {MENU_COLUMNS}
        "#
    );
    sqlx::query_as::<_, Menu>(&query)
        .bind(menu_id)
        .bind(name)
        .bind(items)
        .fetch_optional(pool)
        .await
}

pub async fn delete(pool: &PgPool, menu_id: Uuid) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM menus WHERE id = $1")
        .bind(menu_id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}
