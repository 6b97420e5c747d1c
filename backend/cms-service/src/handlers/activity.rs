/// Activity handlers - audit trail listing
use actix_web::{web, HttpResponse};
use serde::Deserialize;
use sqlx::PgPool;

use crate::error::Result;
use crate::middleware::{require, AuthenticatedUser};
use crate::registry::Permission;
use crate::services::activity;

#[derive(Debug, Deserialize)]
pub struct ListActivityQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    100
}

pub async fn list_activity(
    pool: web::Data<PgPool>,
    user: AuthenticatedUser,
    query: web::Query<ListActivityQuery>,
) -> Result<HttpResponse> {
    require(&user, Permission::UsersManage)?;

    let entries = activity::list(
        pool.get_ref(),
        query.limit.clamp(1, 500),
        query.offset.max(0),
    )
    .await?;

    Ok(HttpResponse::Ok().json(entries))
}
