/// Agent repository - declarative content-assistant configurations
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::Agent;

const AGENT_COLUMNS: &str = "id, name, kind, config, enabled, created_at, updated_at";

pub async fn create(
    pool: &PgPool,
    name: &str,
    kind: &str,
    config: &Value,
) -> Result<Agent, sqlx::Error> {
    let query = format!(
        r#"
        INSERT INTO agents (name, kind, config)
        VALUES ($1, $2, $3)
        RETURNING {AGENT_COLUMNS}
        "#
    );
    sqlx::query_as::<_, Agent>(&query)
        .bind(name)
        .bind(kind)
        .bind(config)
        .fetch_one(pool)
        .await
}

pub async fn find_by_id(pool: &PgPool, agent_id: Uuid) -> Result<Option<Agent>, sqlx::Error> {
    let query = format!("SELECT {AGENT_COLUMNS} FROM agents WHERE id = $1");
    sqlx::query_as::<_, Agent>(&query)
        .bind(agent_id)
        .fetch_optional(pool)
        .await
}

pub async fn list(pool: &PgPool) -> Result<Vec<Agent>, sqlx::Error> {
    let query = format!("SELECT {AGENT_COLUMNS} FROM agents ORDER BY name");
    sqlx::query_as::<_, Agent>(&query).fetch_all(pool).await
}

pub async fn update(
    pool: &PgPool,
    agent_id: Uuid,
    name: Option<&str>,
    config: Option<&Value>,
    enabled: Option<bool>,
) -> Result<Option<Agent>, sqlx::Error> {
    let query = format!(
        r#"
        UPDATE agents SET
            name = COALESCE($2, name),
            config = COALESCE($3, config),
            enabled = COALESCE($4, enabled),
            updated_at = NOW()
        WHERE id = $1
        RETURNING {AGENT_COLUMNS}
        "#
    );
    sqlx::query_as::<_, Agent>(&query)
        .bind(agent_id)
        .bind(name)
        .bind(config)
        .bind(enabled)
        .fetch_optional(pool)
        .await
}

pub async fn delete(pool: &PgPool, agent_id: Uuid) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM agents WHERE id = $1")
        .bind(agent_id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}
