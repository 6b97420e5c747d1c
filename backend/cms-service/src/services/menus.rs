/// Menu service - navigation trees with post-link resolution
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use crate::db::{menu_repo, post_repo};
use crate::error::{AppError, Result};
use crate::models::Menu;
use crate::registry;

/// Depth guard for item trees; deeper nestings are configuration mistakes
const MAX_MENU_DEPTH: usize = 6;

/// Validate a menu item tree.
///
/// Each item is `{label, url | post_id, children?}`; exactly one of `url` and
/// `post_id` must be present.
pub fn validate_items(items: &Value) -> Result<()> {
    validate_level(items, 0)
}

fn validate_level(items: &Value, depth: usize) -> Result<()> {
    if depth >= MAX_MENU_DEPTH {
        return Err(AppError::ValidationError(format!(
            "menu items nest deeper than {} levels",
            MAX_MENU_DEPTH
        )));
    }

    let array = items
        .as_array()
        .ok_or_else(|| AppError::ValidationError("menu items must be an array".to_string()))?;

    for item in array {
        let object = item.as_object().ok_or_else(|| {
            AppError::ValidationError("each menu item must be an object".to_string())
        })?;

        match object.get("label").and_then(|l| l.as_str()) {
            Some(label) if !label.trim().is_empty() => {}
            _ => {
                return Err(AppError::ValidationError(
                    "each menu item needs a non-empty label".to_string(),
                ))
            }
        }

        let has_url = object.get("url").map(|u| u.is_string()).unwrap_or(false);
        let has_post = object.get("post_id").is_some();
        if has_url == has_post {
            return Err(AppError::ValidationError(
                "each menu item needs exactly one of url or post_id".to_string(),
            ));
        }

        if has_post {
            let raw = object.get("post_id").and_then(|p| p.as_str()).unwrap_or("");
            Uuid::parse_str(raw).map_err(|_| {
                AppError::ValidationError(format!("menu item post_id '{}' is not a UUID", raw))
            })?;
        }

        if let Some(children) = object.get("children") {
            validate_level(children, depth + 1)?;
        }
    }

    Ok(())
}

pub async fn create_menu(pool: &PgPool, name: &str, locale: &str, items: &Value) -> Result<Menu> {
    validate_items(items)?;
    Ok(menu_repo::create(pool, name, locale, items).await?)
}

pub async fn update_menu(
    pool: &PgPool,
    menu_id: Uuid,
    name: Option<&str>,
    items: Option<&Value>,
) -> Result<Menu> {
    if let Some(items) = items {
        validate_items(items)?;
    }
    menu_repo::update(pool, menu_id, name, items)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("menu {} not found", menu_id)))
}

/// Fetch a menu with `post_id` entries resolved to current public URLs.
///
/// Items pointing at missing or unpublished posts keep their label but
/// resolve to no URL, letting the front end drop or grey them out.
pub async fn resolve_menu(pool: &PgPool, menu_id: Uuid) -> Result<Value> {
    let menu = menu_repo::find_by_id(pool, menu_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("menu {} not found", menu_id)))?;

    let items = resolve_level(pool, &menu.items).await?;
    Ok(serde_json::json!({
        "id": menu.id,
        "name": menu.name,
        "locale": menu.locale,
        "items": items,
    }))
}

fn resolve_level<'a>(
    pool: &'a PgPool,
    items: &'a Value,
) -> futures::future::BoxFuture<'a, Result<Value>> {
    Box::pin(async move {
        let Some(array) = items.as_array() else {
            return Ok(Value::Array(vec![]));
        };

        let mut resolved = Vec::with_capacity(array.len());
        for item in array {
            let mut entry = item.clone();

            if let Some(raw) = item.get("post_id").and_then(|p| p.as_str()) {
                let url = match Uuid::parse_str(raw) {
                    Ok(post_id) => match post_repo::find_by_id(pool, post_id).await? {
                        Some(post) if post.status().map(|s| s.is_public()).unwrap_or(false) => {
                            registry::build_path(&post).ok()
                        }
                        _ => None,
                    },
                    Err(_) => None,
                };
                entry["url"] = match url {
                    Some(url) => Value::String(url),
                    None => Value::Null,
                };
            }

            if let Some(children) = item.get("children") {
                entry["children"] = resolve_level(pool, children).await?;
            }

            resolved.push(entry);
        }

        Ok(Value::Array(resolved))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_validate_items_accepts_url_and_post_entries() {
        let items = json!([
            { "label": "Home", "url": "/en" },
            {
                "label": "Docs",
                "url": "/en/docs",
                "children": [
                    { "label": "Guide", "post_id": "8e7b2f90-3c0e-4f43-9e25-58641e9e6f40" }
                ]
            }
        ]);
        assert!(validate_items(&items).is_ok());
    }

    #[test]
    fn test_validate_items_rejects_both_or_neither_target() {
        assert!(validate_items(&json!([{ "label": "X" }])).is_err());
        assert!(validate_items(&json!([
            { "label": "X", "url": "/a", "post_id": "8e7b2f90-3c0e-4f43-9e25-58641e9e6f40" }
        ]))
        .is_err());
    }

    #[test]
    fn test_validate_items_rejects_bad_post_id_and_label() {
        assert!(validate_items(&json!([{ "label": "X", "post_id": "nope" }])).is_err());
        assert!(validate_items(&json!([{ "label": "  ", "url": "/a" }])).is_err());
        assert!(validate_items(&json!({ "label": "X" })).is_err());
    }

    #[test]
    fn test_validate_items_depth_guard() {
        let mut items = json!([{ "label": "leaf", "url": "/x" }]);
        for _ in 0..MAX_MENU_DEPTH {
            items = json!([{ "label": "nest", "url": "/x", "children": items }]);
        }
        assert!(validate_items(&items).is_err());
    }
}
