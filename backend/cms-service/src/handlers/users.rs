/// User handlers - account listing and role administration
use actix_web::{web, HttpResponse};
use serde::Deserialize;
use serde_json::json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::db::user_repo;
use crate::error::{AppError, Result};
use crate::middleware::{require, AuthenticatedUser};
use crate::registry::{permissions_for, Permission};
use crate::services::activity;

pub async fn list_users(pool: web::Data<PgPool>, user: AuthenticatedUser) -> Result<HttpResponse> {
    require(&user, Permission::UsersManage)?;

    let users = user_repo::list(pool.get_ref()).await?;
    Ok(HttpResponse::Ok().json(users))
}

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub email: String,
    pub display_name: String,
    pub role: String,
}

pub async fn create_user(
    pool: web::Data<PgPool>,
    user: AuthenticatedUser,
    req: web::Json<CreateUserRequest>,
) -> Result<HttpResponse> {
    require(&user, Permission::UsersManage)?;

    if permissions_for(&req.role).is_empty() {
        return Err(AppError::BadRequest(format!(
            "unknown role '{}'",
            req.role
        )));
    }

    let created =
        user_repo::create(pool.get_ref(), &req.email, &req.display_name, &req.role).await?;

    activity::record(
        pool.get_ref(),
        user.id,
        "user.create",
        "user",
        Some(created.id),
        json!({ "email": created.email, "role": created.role }),
    )
    .await;

    Ok(HttpResponse::Created().json(created))
}

#[derive(Debug, Deserialize)]
pub struct UpdateUserRequest {
    pub display_name: Option<String>,
    pub role: Option<String>,
    pub active: Option<bool>,
}

pub async fn update_user(
    pool: web::Data<PgPool>,
    user: AuthenticatedUser,
    user_id: web::Path<Uuid>,
    req: web::Json<UpdateUserRequest>,
) -> Result<HttpResponse> {
    require(&user, Permission::UsersManage)?;

    if let Some(role) = &req.role {
        if permissions_for(role).is_empty() {
            return Err(AppError::BadRequest(format!("unknown role '{}'", role)));
        }
    }

    let updated = user_repo::update(
        pool.get_ref(),
        *user_id,
        req.display_name.as_deref(),
        req.role.as_deref(),
        req.active,
    )
    .await?
    .ok_or_else(|| AppError::NotFound(format!("user {} not found", user_id)))?;

    Ok(HttpResponse::Ok().json(updated))
}
