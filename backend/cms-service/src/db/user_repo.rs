/// User repository - authorship and role lookup
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::User;

const USER_COLUMNS: &str = "id, email, display_name, role, active, created_at, updated_at";

pub async fn create(
    pool: &PgPool,
    email: &str,
    display_name: &str,
    role: &str,
) -> Result<User, sqlx::Error> {
    let query = format!(
        r#"
        INSERT INTO users (email, display_name, role)
        VALUES ($1, $2, $3)
        RETURNING {USER_COLUMNS}
        "#
    );
    sqlx::query_as::<_, User>(&query)
        .bind(email)
        .bind(display_name)
        .bind(role)
        .fetch_one(pool)
        .await
}

pub async fn find_by_id(pool: &PgPool, user_id: Uuid) -> Result<Option<User>, sqlx::Error> {
    let query = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
    sqlx::query_as::<_, User>(&query)
        .bind(user_id)
        .fetch_optional(pool)
        .await
}

pub async fn list(pool: &PgPool) -> Result<Vec<User>, sqlx::Error> {
    let query = format!("SELECT {USER_COLUMNS} FROM users ORDER BY email");
    sqlx::query_as::<_, User>(&query).fetch_all(pool).await
}

pub async fn update(
    pool: &PgPool,
    user_id: Uuid,
    display_name: Option<&str>,
    role: Option<&str>,
    active: Option<bool>,
) -> Result<Option<User>, sqlx::Error> {
    let query = format!(
        r#"
        UPDATE users SET
            display_name = COALESCE($2, display_name),
            role = COALESCE($3, role),
            active = COALESCE($4, active),
            updated_at = NOW()
        WHERE id = $1
        RETURNING {USER_COLUMNS}
        "#
    );
    sqlx::query_as::<_, User>(&query)
        .bind(user_id)
        .bind(display_name)
        .bind(role)
        .bind(active)
        .fetch_optional(pool)
        .await
}
