/// Form repository - database operations for forms and submissions
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{Form, FormSubmission};

const FORM_COLUMNS: &str = "id, name, fields, notify_email, created_at, updated_at";
const SUBMISSION_COLUMNS: &str = "id, form_id, data, ip, submitted_at";

pub async fn create(
    pool: &PgPool,
    name: &str,
    fields: &Value,
    notify_email: Option<&str>,
) -> Result<Form, sqlx::Error> {
    let query = format!(
        r#"
        INSERT INTO forms (name, fields, notify_email)
        VALUES ($1, $2, $3)
        RETURNING {FORM_COLUMNS}
        "#
    );
    sqlx::query_as::<_, Form>(&query)
        .bind(name)
        .bind(fields)
        .bind(notify_email)
        .fetch_one(pool)
        .await
}

pub async fn find_by_id(pool: &PgPool, form_id: Uuid) -> Result<Option<Form>, sqlx::Error> {
    let query = format!("SELECT {FORM_COLUMNS} FROM forms WHERE id = $1");
    sqlx::query_as::<_, Form>(&query)
        .bind(form_id)
        .fetch_optional(pool)
        .await
}

pub async fn list(pool: &PgPool) -> Result<Vec<Form>, sqlx::Error> {
    let query = format!("SELECT {FORM_COLUMNS} FROM forms ORDER BY name");
    sqlx::query_as::<_, Form>(&query).fetch_all(pool).await
}

pub async fn update(
    pool: &PgPool,
    form_id: Uuid,
    name: Option<&str>,
    fields: Option<&Value>,
    notify_email: Option<Option<&str>>,
) -> Result<Option<Form>, sqlx::Error> {
    let query = format!(
        r#"
        UPDATE forms SET
            name = COALESCE($2, name),
            fields = COALESCE($3, fields),
            notify_email = CASE WHEN $4 THEN $5 ELSE notify_email END,
            updated_at = NOW()
        WHERE id = $1
        RETURNING {FORM_COLUMNS}
        "#
    );
    sqlx::query_as::<_, Form>(&query)
        .bind(form_id)
        .bind(name)
        .bind(fields)
        .bind(notify_email.is_some())
        .bind(notify_email.flatten())
        .fetch_optional(pool)
        .await
}

pub async fn delete(pool: &PgPool, form_id: Uuid) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM forms WHERE id = $1")
        .bind(form_id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn create_submission(
    pool: &PgPool,
    form_id: Uuid,
    data: &Value,
    ip: Option<&str>,
) -> Result<FormSubmission, sqlx::Error> {
    let query = format!(
        r#"
        INSERT INTO form_submissions (form_id, data, ip)
        VALUES ($1, $2, $3)
        RETURNING {SUBMISSION_COLUMNS}
        "#
    );
    sqlx::query_as::<_, FormSubmission>(&query)
        .bind(form_id)
        .bind(data)
        .bind(ip)
        .fetch_one(pool)
        .await
}

pub async fn list_submissions(
    pool: &PgPool,
    form_id: Uuid,
    limit: i64,
    offset: i64,
) -> Result<Vec<FormSubmission>, sqlx::Error> {
    let query = format!(
        r#"
        SELECT {SUBMISSION_COLUMNS} FROM form_submissions
        WHERE form_id = $1
        ORDER BY submitted_at DESC
        LIMIT $2 OFFSET $3
        "#
    );
    sqlx::query_as::<_, FormSubmission>(&query)
        .bind(form_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await
}
