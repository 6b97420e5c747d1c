/// Menu handlers - navigation menu CRUD and resolution
use actix_web::{web, HttpResponse};
use serde::Deserialize;
use serde_json::{json, Value};
use sqlx::PgPool;
use uuid::Uuid;

use crate::db::menu_repo;
use crate::error::Result;
use crate::middleware::{require, AuthenticatedUser};
use crate::registry::Permission;
use crate::services::{activity, menus};

#[derive(Debug, Deserialize)]
pub struct CreateMenuRequest {
    pub name: String,
    pub locale: String,
    #[serde(default = "empty_items")]
    pub items: Value,
}

fn empty_items() -> Value {
    json!([])
}

pub async fn create_menu(
    pool: web::Data<PgPool>,
    user: AuthenticatedUser,
    req: web::Json<CreateMenuRequest>,
) -> Result<HttpResponse> {
    require(&user, Permission::MenusManage)?;

    let menu = menus::create_menu(pool.get_ref(), &req.name, &req.locale, &req.items).await?;

    activity::record(
        pool.get_ref(),
        user.id,
        "menu.create",
        "menu",
        Some(menu.id),
        json!({ "name": menu.name, "locale": menu.locale }),
    )
    .await;

    Ok(HttpResponse::Created().json(menu))
}

#[derive(Debug, Deserialize)]
pub struct ListMenusQuery {
    pub locale: Option<String>,
}

pub async fn list_menus(
    pool: web::Data<PgPool>,
    user: AuthenticatedUser,
    query: web::Query<ListMenusQuery>,
) -> Result<HttpResponse> {
    require(&user, Permission::PostsRead)?;

    let menus = menu_repo::list(pool.get_ref(), query.locale.as_deref()).await?;
    Ok(HttpResponse::Ok().json(menus))
}

#[derive(Debug, Deserialize)]
pub struct GetMenuQuery {
    /// Resolve post links to current public URLs
    #[serde(default)]
    pub resolve: bool,
}

pub async fn get_menu(
    pool: web::Data<PgPool>,
    user: AuthenticatedUser,
    menu_id: web::Path<Uuid>,
    query: web::Query<GetMenuQuery>,
) -> Result<HttpResponse> {
    require(&user, Permission::PostsRead)?;

    if query.resolve {
        let resolved = menus::resolve_menu(pool.get_ref(), *menu_id).await?;
        return Ok(HttpResponse::Ok().json(resolved));
    }

    match menu_repo::find_by_id(pool.get_ref(), *menu_id).await? {
        Some(menu) => Ok(HttpResponse::Ok().json(menu)),
        None => Ok(HttpResponse::NotFound().finish()),
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateMenuRequest {
    pub name: Option<String>,
    pub items: Option<Value>,
}

pub async fn update_menu(
    pool: web::Data<PgPool>,
    user: AuthenticatedUser,
    menu_id: web::Path<Uuid>,
    req: web::Json<UpdateMenuRequest>,
) -> Result<HttpResponse> {
    require(&user, Permission::MenusManage)?;

    let menu = menus::update_menu(
        pool.get_ref(),
        *menu_id,
        req.name.as_deref(),
        req.items.as_ref(),
    )
    .await?;

    Ok(HttpResponse::Ok().json(menu))
}

pub async fn delete_menu(
    pool: web::Data<PgPool>,
    user: AuthenticatedUser,
    menu_id: web::Path<Uuid>,
) -> Result<HttpResponse> {
    require(&user, Permission::MenusManage)?;

    if !menu_repo::delete(pool.get_ref(), *menu_id).await? {
        return Ok(HttpResponse::NotFound().finish());
    }

    activity::record(
        pool.get_ref(),
        user.id,
        "menu.delete",
        "menu",
        Some(*menu_id),
        json!({}),
    )
    .await;

    Ok(HttpResponse::NoContent().finish())
}
