/// Form handlers - form CRUD and public submissions
use actix_web::{web, HttpRequest, HttpResponse};
use serde::Deserialize;
use serde_json::{json, Value};
use sqlx::PgPool;
use uuid::Uuid;

use crate::db::form_repo;
use crate::error::Result;
use crate::middleware::{require, AuthenticatedUser};
use crate::registry::Permission;
use crate::services::{activity, forms};

#[derive(Debug, Deserialize)]
pub struct CreateFormRequest {
    pub name: String,
    pub fields: Value,
    pub notify_email: Option<String>,
}

pub async fn create_form(
    pool: web::Data<PgPool>,
    user: AuthenticatedUser,
    req: web::Json<CreateFormRequest>,
) -> Result<HttpResponse> {
    require(&user, Permission::FormsManage)?;

    let form = forms::create_form(
        pool.get_ref(),
        &req.name,
        &req.fields,
        req.notify_email.as_deref(),
    )
    .await?;

    activity::record(
        pool.get_ref(),
        user.id,
        "form.create",
        "form",
        Some(form.id),
        json!({ "name": form.name }),
    )
    .await;

    Ok(HttpResponse::Created().json(form))
}

pub async fn list_forms(pool: web::Data<PgPool>, user: AuthenticatedUser) -> Result<HttpResponse> {
    require(&user, Permission::PostsRead)?;

    let forms = form_repo::list(pool.get_ref()).await?;
    Ok(HttpResponse::Ok().json(forms))
}

pub async fn get_form(
    pool: web::Data<PgPool>,
    user: AuthenticatedUser,
    form_id: web::Path<Uuid>,
) -> Result<HttpResponse> {
    require(&user, Permission::PostsRead)?;

    match form_repo::find_by_id(pool.get_ref(), *form_id).await? {
        Some(form) => Ok(HttpResponse::Ok().json(form)),
        None => Ok(HttpResponse::NotFound().finish()),
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateFormRequest {
    pub name: Option<String>,
    pub fields: Option<Value>,
    #[serde(default, deserialize_with = "super::double_option")]
    pub notify_email: Option<Option<String>>,
}

pub async fn update_form(
    pool: web::Data<PgPool>,
    user: AuthenticatedUser,
    form_id: web::Path<Uuid>,
    req: web::Json<UpdateFormRequest>,
) -> Result<HttpResponse> {
    require(&user, Permission::FormsManage)?;

    let form = forms::update_form(
        pool.get_ref(),
        *form_id,
        req.name.as_deref(),
        req.fields.as_ref(),
        req.notify_email.as_ref().map(|n| n.as_deref()),
    )
    .await?;

    Ok(HttpResponse::Ok().json(form))
}

pub async fn delete_form(
    pool: web::Data<PgPool>,
    user: AuthenticatedUser,
    form_id: web::Path<Uuid>,
) -> Result<HttpResponse> {
    require(&user, Permission::FormsManage)?;

    if !form_repo::delete(pool.get_ref(), *form_id).await? {
        return Ok(HttpResponse::NotFound().finish());
    }

    Ok(HttpResponse::NoContent().finish())
}

/// Accept a public form submission (rate limited at the scope level)
pub async fn submit_form(
    pool: web::Data<PgPool>,
    form_id: web::Path<Uuid>,
    req: HttpRequest,
    body: web::Json<Value>,
) -> Result<HttpResponse> {
    let ip = req
        .connection_info()
        .realip_remote_addr()
        .map(str::to_string);

    let submission =
        forms::submit(pool.get_ref(), *form_id, body.into_inner(), ip.as_deref()).await?;

    Ok(HttpResponse::Created().json(json!({ "id": submission.id })))
}

#[derive(Debug, Deserialize)]
pub struct ListSubmissionsQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    50
}

pub async fn list_submissions(
    pool: web::Data<PgPool>,
    user: AuthenticatedUser,
    form_id: web::Path<Uuid>,
    query: web::Query<ListSubmissionsQuery>,
) -> Result<HttpResponse> {
    require(&user, Permission::FormsManage)?;

    let submissions = form_repo::list_submissions(
        pool.get_ref(),
        *form_id,
        query.limit.clamp(1, 200),
        query.offset.max(0),
    )
    .await?;

    Ok(HttpResponse::Ok().json(submissions))
}
