/// Module group handlers - reusable module templates
use actix_web::{web, HttpResponse};
use serde::Deserialize;
use serde_json::{json, Value};
use sqlx::PgPool;
use uuid::Uuid;

use crate::db::module_group_repo;
use crate::error::{AppError, Result};
use crate::middleware::{require, AuthenticatedUser};
use crate::registry::{self, Permission};
use crate::services::activity;

#[derive(Debug, Deserialize)]
pub struct GroupModuleSpec {
    pub module_type: String,
    #[serde(default)]
    pub default_props: Value,
}

#[derive(Debug, Deserialize)]
pub struct CreateGroupRequest {
    pub name: String,
    pub post_type: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub modules: Vec<GroupModuleSpec>,
}

/// Validate the template rows of a group request
fn validate_group_modules(modules: &[GroupModuleSpec]) -> Result<Vec<(String, Value)>> {
    let mut validated = Vec::with_capacity(modules.len());
    for spec in modules {
        let config = registry::module_type(&spec.module_type)?;
        let props = if spec.default_props.is_null() {
            config.defaults.clone()
        } else {
            spec.default_props.clone()
        };
        registry::validate_props(&spec.module_type, &props)?;
        validated.push((spec.module_type.clone(), props));
    }
    Ok(validated)
}

/// Create a module group with its templates
pub async fn create_group(
    pool: web::Data<PgPool>,
    user: AuthenticatedUser,
    req: web::Json<CreateGroupRequest>,
) -> Result<HttpResponse> {
    require(&user, Permission::ModulesManage)?;

    let req = req.into_inner();
    let modules = validate_group_modules(&req.modules)?;

    let mut tx = pool.begin().await.map_err(AppError::from)?;
    let group = module_group_repo::create_group(
        &mut tx,
        &req.name,
        req.post_type.as_deref(),
        req.description.as_deref(),
    )
    .await?;

    for (index, (module_type, props)) in modules.iter().enumerate() {
        module_group_repo::add_group_module(&mut tx, group.id, module_type, props, index as i32)
            .await?;
    }
    tx.commit().await.map_err(AppError::from)?;

    activity::record(
        pool.get_ref(),
        user.id,
        "module_group.create",
        "module_group",
        Some(group.id),
        json!({ "name": group.name }),
    )
    .await;

    Ok(HttpResponse::Created().json(group))
}

/// List module groups
pub async fn list_groups(pool: web::Data<PgPool>, user: AuthenticatedUser) -> Result<HttpResponse> {
    require(&user, Permission::PostsRead)?;

    let groups = module_group_repo::list_groups(pool.get_ref()).await?;
    Ok(HttpResponse::Ok().json(groups))
}

/// Get a group with its template rows
pub async fn get_group(
    pool: web::Data<PgPool>,
    user: AuthenticatedUser,
    group_id: web::Path<Uuid>,
) -> Result<HttpResponse> {
    require(&user, Permission::PostsRead)?;

    let Some(group) = module_group_repo::find_group(pool.get_ref(), *group_id).await? else {
        return Ok(HttpResponse::NotFound().finish());
    };

    let mut conn = pool.acquire().await.map_err(AppError::from)?;
    let modules = module_group_repo::list_group_modules(&mut conn, group.id).await?;

    Ok(HttpResponse::Ok().json(json!({
        "id": group.id,
        "name": group.name,
        "post_type": group.post_type,
        "description": group.description,
        "modules": modules,
        "created_at": group.created_at,
        "updated_at": group.updated_at,
    })))
}

#[derive(Debug, Deserialize)]
pub struct UpdateGroupRequest {
    pub name: Option<String>,
    #[serde(default, deserialize_with = "super::double_option")]
    pub post_type: Option<Option<String>>,
    #[serde(default, deserialize_with = "super::double_option")]
    pub description: Option<Option<String>>,
    pub modules: Option<Vec<GroupModuleSpec>>,
}

/// Update a group; a modules list replaces the templates wholesale
pub async fn update_group(
    pool: web::Data<PgPool>,
    user: AuthenticatedUser,
    group_id: web::Path<Uuid>,
    req: web::Json<UpdateGroupRequest>,
) -> Result<HttpResponse> {
    require(&user, Permission::ModulesManage)?;

    let req = req.into_inner();

    let group = module_group_repo::update_group(
        pool.get_ref(),
        *group_id,
        req.name.as_deref(),
        req.post_type.as_ref().map(|p| p.as_deref()),
        req.description.as_ref().map(|d| d.as_deref()),
    )
    .await?
    .ok_or_else(|| AppError::NotFound(format!("module group {} not found", group_id)))?;

    if let Some(modules) = &req.modules {
        let validated = validate_group_modules(modules)?;
        let mut tx = pool.begin().await.map_err(AppError::from)?;
        module_group_repo::replace_group_modules(&mut tx, group.id, &validated).await?;
        tx.commit().await.map_err(AppError::from)?;
    }

    Ok(HttpResponse::Ok().json(group))
}

/// Delete a module group (templates cascade)
pub async fn delete_group(
    pool: web::Data<PgPool>,
    user: AuthenticatedUser,
    group_id: web::Path<Uuid>,
) -> Result<HttpResponse> {
    require(&user, Permission::ModulesManage)?;

    if !module_group_repo::delete_group(pool.get_ref(), *group_id).await? {
        return Ok(HttpResponse::NotFound().finish());
    }

    activity::record(
        pool.get_ref(),
        user.id,
        "module_group.delete",
        "module_group",
        Some(*group_id),
        json!({}),
    )
    .await;

    Ok(HttpResponse::NoContent().finish())
}
