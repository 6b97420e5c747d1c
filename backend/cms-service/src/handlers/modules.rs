/// Module handlers - attachments, overrides, and shared instances
use actix_web::{web, HttpResponse};
use serde::Deserialize;
use serde_json::{json, Value};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::middleware::{holds, require, AuthenticatedUser};
use crate::models::OverrideMode;
use crate::registry::{self, Permission};
use crate::services::modules::AttachSource;
use crate::services::{activity, ModuleService};

/// List registered module types with their schemas
pub async fn list_module_types(user: AuthenticatedUser) -> Result<HttpResponse> {
    require(&user, Permission::PostsRead)?;
    Ok(HttpResponse::Ok().json(registry::module_types()))
}

#[derive(Debug, Deserialize)]
pub struct AttachModuleRequest {
    pub module_type: Option<String>,
    pub props: Option<Value>,
    pub global_slug: Option<String>,
    pub module_instance_id: Option<Uuid>,
}

/// Attach a module to a post
pub async fn attach_module(
    pool: web::Data<PgPool>,
    user: AuthenticatedUser,
    post_id: web::Path<Uuid>,
    req: web::Json<AttachModuleRequest>,
) -> Result<HttpResponse> {
    require(&user, Permission::PostsWrite)?;

    let req = req.into_inner();
    let source = match (req.module_type, req.global_slug, req.module_instance_id) {
        (Some(module_type), None, None) => AttachSource::New {
            module_type,
            props: req.props,
        },
        (None, Some(global_slug), None) => AttachSource::Global { global_slug },
        (None, None, Some(module_instance_id)) => AttachSource::Existing { module_instance_id },
        _ => {
            return Err(AppError::BadRequest(
                "provide exactly one of module_type, global_slug, or module_instance_id"
                    .to_string(),
            ))
        }
    };

    let service = ModuleService::new((**pool).clone());
    let attached = service.attach_module(*post_id, source).await?;

    activity::record(
        pool.get_ref(),
        user.id,
        "module.attach",
        "post_module",
        Some(attached.id),
        json!({ "post_id": *post_id }),
    )
    .await;

    Ok(HttpResponse::Created().json(attached))
}

#[derive(Debug, Deserialize)]
pub struct PatchModuleRequest {
    /// Override patch to stage; replaces the selected column
    pub overrides: Option<Value>,
    /// Which staging column the patch targets (default published)
    pub mode: Option<String>,
    pub locked: Option<bool>,
}

fn parse_mode(raw: Option<&str>) -> Result<OverrideMode> {
    match raw {
        Some(raw) => OverrideMode::from_str(raw)
            .ok_or_else(|| AppError::BadRequest(format!("unknown mode '{}'", raw))),
        None => Ok(OverrideMode::Published),
    }
}

/// Stage overrides and/or toggle the lock on an attachment
pub async fn patch_post_module(
    pool: web::Data<PgPool>,
    user: AuthenticatedUser,
    post_module_id: web::Path<Uuid>,
    req: web::Json<PatchModuleRequest>,
) -> Result<HttpResponse> {
    require(&user, Permission::PostsWrite)?;

    let req = req.into_inner();
    let service = ModuleService::new((**pool).clone());
    let can_manage = holds(&user, Permission::ModulesManage);

    let mut row = None;

    if let Some(locked) = req.locked {
        if !can_manage {
            return Err(AppError::Forbidden(
                "locking modules requires module management rights".to_string(),
            ));
        }
        row = Some(service.set_locked(*post_module_id, locked).await?);
    }

    if let Some(patch) = req.overrides {
        let mode = parse_mode(req.mode.as_deref())?;
        row = Some(
            service
                .stage_overrides(*post_module_id, mode, patch, can_manage)
                .await?,
        );
    }

    let row = match row {
        Some(row) => row,
        None => {
            return Err(AppError::BadRequest(
                "nothing to update: provide overrides and/or locked".to_string(),
            ))
        }
    };

    activity::record(
        pool.get_ref(),
        user.id,
        "module.update",
        "post_module",
        Some(row.id),
        json!({}),
    )
    .await;

    Ok(HttpResponse::Ok().json(row))
}

/// Detach a module from its post
pub async fn detach_module(
    pool: web::Data<PgPool>,
    user: AuthenticatedUser,
    post_module_id: web::Path<Uuid>,
) -> Result<HttpResponse> {
    require(&user, Permission::PostsWrite)?;

    let service = ModuleService::new((**pool).clone());
    service.detach_module(*post_module_id).await?;

    activity::record(
        pool.get_ref(),
        user.id,
        "module.detach",
        "post_module",
        Some(*post_module_id),
        json!({}),
    )
    .await;

    Ok(HttpResponse::NoContent().finish())
}

#[derive(Debug, Deserialize)]
pub struct ReorderRequest {
    pub ordered_ids: Vec<Uuid>,
}

/// Reorder a post's modules
pub async fn reorder_modules(
    pool: web::Data<PgPool>,
    user: AuthenticatedUser,
    post_id: web::Path<Uuid>,
    req: web::Json<ReorderRequest>,
) -> Result<HttpResponse> {
    require(&user, Permission::PostsWrite)?;

    let service = ModuleService::new((**pool).clone());
    service.reorder_modules(*post_id, &req.ordered_ids).await?;

    Ok(HttpResponse::Ok().finish())
}

#[derive(Debug, Deserialize)]
pub struct StageActionRequest {
    pub mode: String,
}

/// Promote a staged override column into the layer below it
pub async fn promote_overrides(
    pool: web::Data<PgPool>,
    user: AuthenticatedUser,
    post_module_id: web::Path<Uuid>,
    req: web::Json<StageActionRequest>,
) -> Result<HttpResponse> {
    require(&user, Permission::PostsPublish)?;

    let mode = parse_mode(Some(&req.mode))?;
    let service = ModuleService::new((**pool).clone());
    let row = service.promote_overrides(*post_module_id, mode).await?;

    activity::record(
        pool.get_ref(),
        user.id,
        "module.promote",
        "post_module",
        Some(row.id),
        json!({ "mode": req.mode }),
    )
    .await;

    Ok(HttpResponse::Ok().json(row))
}

/// Discard a staged override column
pub async fn discard_overrides(
    pool: web::Data<PgPool>,
    user: AuthenticatedUser,
    post_module_id: web::Path<Uuid>,
    req: web::Json<StageActionRequest>,
) -> Result<HttpResponse> {
    require(&user, Permission::PostsWrite)?;

    let mode = parse_mode(Some(&req.mode))?;
    let service = ModuleService::new((**pool).clone());
    let row = service.discard_overrides(*post_module_id, mode).await?;

    Ok(HttpResponse::Ok().json(row))
}

// ========================================
// Shared (global/static) instances
// ========================================

/// List global and static module instances
pub async fn list_instances(
    pool: web::Data<PgPool>,
    user: AuthenticatedUser,
) -> Result<HttpResponse> {
    require(&user, Permission::PostsRead)?;

    let service = ModuleService::new((**pool).clone());
    let instances = service.list_shared_instances().await?;

    Ok(HttpResponse::Ok().json(instances))
}

pub async fn get_instance(
    pool: web::Data<PgPool>,
    user: AuthenticatedUser,
    instance_id: web::Path<Uuid>,
) -> Result<HttpResponse> {
    require(&user, Permission::PostsRead)?;

    let service = ModuleService::new((**pool).clone());
    match service.get_instance(*instance_id).await? {
        Some(instance) => Ok(HttpResponse::Ok().json(instance)),
        None => Ok(HttpResponse::NotFound().finish()),
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateGlobalInstanceRequest {
    pub module_type: String,
    pub global_slug: String,
    pub props: Option<Value>,
}

/// Create a global module instance
pub async fn create_global_instance(
    pool: web::Data<PgPool>,
    user: AuthenticatedUser,
    req: web::Json<CreateGlobalInstanceRequest>,
) -> Result<HttpResponse> {
    require(&user, Permission::ModulesManage)?;

    let service = ModuleService::new((**pool).clone());
    let instance = service
        .create_global_instance(&req.module_type, &req.global_slug, req.props.clone())
        .await?;

    activity::record(
        pool.get_ref(),
        user.id,
        "module.create_global",
        "module_instance",
        Some(instance.id),
        json!({ "global_slug": instance.global_slug }),
    )
    .await;

    Ok(HttpResponse::Created().json(instance))
}

#[derive(Debug, Deserialize)]
pub struct UpdateInstanceRequest {
    pub props: Value,
}

/// Replace an instance's base props
pub async fn update_instance(
    pool: web::Data<PgPool>,
    user: AuthenticatedUser,
    instance_id: web::Path<Uuid>,
    req: web::Json<UpdateInstanceRequest>,
) -> Result<HttpResponse> {
    require(&user, Permission::ModulesManage)?;

    let service = ModuleService::new((**pool).clone());
    let instance = service
        .update_instance_props(*instance_id, req.props.clone())
        .await?;

    Ok(HttpResponse::Ok().json(instance))
}

/// Delete an unreferenced shared instance
pub async fn delete_instance(
    pool: web::Data<PgPool>,
    user: AuthenticatedUser,
    instance_id: web::Path<Uuid>,
) -> Result<HttpResponse> {
    require(&user, Permission::ModulesManage)?;

    let service = ModuleService::new((**pool).clone());
    service.delete_instance(*instance_id).await?;

    activity::record(
        pool.get_ref(),
        user.id,
        "module.delete_instance",
        "module_instance",
        Some(*instance_id),
        json!({}),
    )
    .await;

    Ok(HttpResponse::NoContent().finish())
}
