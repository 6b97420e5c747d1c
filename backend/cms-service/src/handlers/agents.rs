/// Agent handlers - assistant configuration and invocation
use actix_web::{web, HttpResponse};
use serde::Deserialize;
use serde_json::{json, Value};
use sqlx::PgPool;
use uuid::Uuid;

use crate::db::agent_repo;
use crate::error::{AppError, Result};
use crate::middleware::{require, AuthenticatedUser};
use crate::models::AgentKind;
use crate::registry::Permission;
use crate::services::{activity, AgentService};

#[derive(Debug, Deserialize)]
pub struct CreateAgentRequest {
    pub name: String,
    pub kind: String,
    pub config: Value,
}

pub async fn create_agent(
    pool: web::Data<PgPool>,
    user: AuthenticatedUser,
    req: web::Json<CreateAgentRequest>,
) -> Result<HttpResponse> {
    require(&user, Permission::SettingsManage)?;

    if AgentKind::from_str(&req.kind).is_none() {
        return Err(AppError::BadRequest(format!(
            "unknown agent kind '{}'",
            req.kind
        )));
    }

    let agent = agent_repo::create(pool.get_ref(), &req.name, &req.kind, &req.config).await?;

    activity::record(
        pool.get_ref(),
        user.id,
        "agent.create",
        "agent",
        Some(agent.id),
        json!({ "name": agent.name, "kind": agent.kind }),
    )
    .await;

    Ok(HttpResponse::Created().json(agent))
}

pub async fn list_agents(pool: web::Data<PgPool>, user: AuthenticatedUser) -> Result<HttpResponse> {
    require(&user, Permission::AgentsInvoke)?;

    let agents = agent_repo::list(pool.get_ref()).await?;
    Ok(HttpResponse::Ok().json(agents))
}

pub async fn get_agent(
    pool: web::Data<PgPool>,
    user: AuthenticatedUser,
    agent_id: web::Path<Uuid>,
) -> Result<HttpResponse> {
    require(&user, Permission::AgentsInvoke)?;

    match agent_repo::find_by_id(pool.get_ref(), *agent_id).await? {
        Some(agent) => Ok(HttpResponse::Ok().json(agent)),
        None => Ok(HttpResponse::NotFound().finish()),
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateAgentRequest {
    pub name: Option<String>,
    pub config: Option<Value>,
    pub enabled: Option<bool>,
}

pub async fn update_agent(
    pool: web::Data<PgPool>,
    user: AuthenticatedUser,
    agent_id: web::Path<Uuid>,
    req: web::Json<UpdateAgentRequest>,
) -> Result<HttpResponse> {
    require(&user, Permission::SettingsManage)?;

    let agent = agent_repo::update(
        pool.get_ref(),
        *agent_id,
        req.name.as_deref(),
        req.config.as_ref(),
        req.enabled,
    )
    .await?
    .ok_or_else(|| AppError::NotFound(format!("agent {} not found", agent_id)))?;

    Ok(HttpResponse::Ok().json(agent))
}

pub async fn delete_agent(
    pool: web::Data<PgPool>,
    user: AuthenticatedUser,
    agent_id: web::Path<Uuid>,
) -> Result<HttpResponse> {
    require(&user, Permission::SettingsManage)?;

    if !agent_repo::delete(pool.get_ref(), *agent_id).await? {
        return Ok(HttpResponse::NotFound().finish());
    }

    Ok(HttpResponse::NoContent().finish())
}

#[derive(Debug, Deserialize)]
pub struct InvokeAgentRequest {
    pub post_id: Uuid,
}

/// Invoke an agent on a post; patches land in AI-review staging
pub async fn invoke_agent(
    pool: web::Data<PgPool>,
    user: AuthenticatedUser,
    agent_id: web::Path<Uuid>,
    req: web::Json<InvokeAgentRequest>,
) -> Result<HttpResponse> {
    require(&user, Permission::AgentsInvoke)?;

    let service = AgentService::new((**pool).clone());
    let report = service.invoke(*agent_id, req.post_id).await?;

    activity::record(
        pool.get_ref(),
        user.id,
        "agent.invoke",
        "agent",
        Some(*agent_id),
        json!({
            "post_id": req.post_id,
            "staged": report.staged.len(),
            "errors": report.errors.len(),
        }),
    )
    .await;

    Ok(HttpResponse::Ok().json(report))
}
