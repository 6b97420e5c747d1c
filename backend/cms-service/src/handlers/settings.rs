/// Settings handlers - cached site configuration
use actix_web::{web, HttpResponse};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::error::Result;
use crate::middleware::{require, AuthenticatedUser};
use crate::registry::Permission;
use crate::services::SettingsService;

pub async fn list_settings(
    settings: web::Data<Arc<SettingsService>>,
    user: AuthenticatedUser,
) -> Result<HttpResponse> {
    require(&user, Permission::PostsRead)?;

    Ok(HttpResponse::Ok().json(settings.all().await))
}

pub async fn put_setting(
    settings: web::Data<Arc<SettingsService>>,
    user: AuthenticatedUser,
    key: web::Path<String>,
    value: web::Json<Value>,
) -> Result<HttpResponse> {
    require(&user, Permission::SettingsManage)?;

    let row = settings.put(&key, value.into_inner()).await?;
    Ok(HttpResponse::Ok().json(json!({
        "key": row.key,
        "value": row.value,
        "updated_at": row.updated_at,
    })))
}
