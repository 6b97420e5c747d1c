/// Activity trail - best-effort audit logging
///
/// A failed log write must never fail the operation it documents, so errors
/// are swallowed after a debug line.
use serde_json::Value;
use sqlx::PgPool;
use tracing::debug;
use uuid::Uuid;

use crate::db::activity_repo;
use crate::error::Result;
use crate::models::ActivityLog;

pub async fn record(
    pool: &PgPool,
    user_id: Uuid,
    action: &str,
    subject_type: &str,
    subject_id: Option<Uuid>,
    detail: Value,
) {
    if let Err(err) =
        activity_repo::insert(pool, user_id, action, subject_type, subject_id, &detail).await
    {
        debug!(%action, %subject_type, "activity log write failed: {}", err);
    }
}

pub async fn list(pool: &PgPool, limit: i64, offset: i64) -> Result<Vec<ActivityLog>> {
    Ok(activity_repo::list(pool, limit, offset).await?)
}
