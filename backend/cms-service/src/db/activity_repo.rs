/// Activity log repository - best-effort audit trail
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::ActivityLog;

const ACTIVITY_COLUMNS: &str = "id, user_id, action, subject_type, subject_id, detail, created_at";

pub async fn insert(
    pool: &PgPool,
    user_id: Uuid,
    action: &str,
    subject_type: &str,
    subject_id: Option<Uuid>,
    detail: &Value,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO activity_log (user_id, action, subject_type, subject_id, detail)
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(user_id)
    .bind(action)
    .bind(subject_type)
    .bind(subject_id)
    .bind(detail)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn list(
    pool: &PgPool,
    limit: i64,
    offset: i64,
) -> Result<Vec<ActivityLog>, sqlx::Error> {
    let query = format!(
        r#"
        SELECT {ACTIVITY_COLUMNS} FROM activity_log
        ORDER BY created_at DESC
        LIMIT $1 OFFSET $2
        "#
    );
    sqlx::query_as::<_, ActivityLog>(&query)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await
}
