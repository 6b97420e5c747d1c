/// Module composition - resolves effective props from base props plus the
/// staged override columns selected by editing mode.
use serde_json::{Map, Value};
use sqlx::PgPool;
use std::collections::HashMap;
use uuid::Uuid;

use crate::db::{module_repo, post_repo};
use crate::error::{AppError, Result};
use crate::models::{ComposedModule, ComposedPost, ModuleInstance, OverrideMode, PostModule};

/// Merge an override patch over base props.
///
/// Objects merge recursively; arrays and scalars replace wholesale; an
/// explicit JSON `null` in the patch deletes the key.
pub fn merge_props(base: &Value, patch: &Value) -> Value {
    let Some(patch_map) = patch.as_object() else {
        return if patch.is_null() {
            base.clone()
        } else {
            patch.clone()
        };
    };

    let mut merged: Map<String, Value> = base.as_object().cloned().unwrap_or_default();

    for (key, value) in patch_map {
        match value {
            Value::Null => {
                merged.remove(key);
            }
            Value::Object(_) => {
                let nested_base = merged.get(key).cloned().unwrap_or(Value::Object(Map::new()));
                merged.insert(key.clone(), merge_props(&nested_base, value));
            }
            other => {
                merged.insert(key.clone(), other.clone());
            }
        }
    }

    Value::Object(merged)
}

/// Effective props for one attachment under the given mode.
///
/// Review mode stacks on published overrides, AI-review stacks on both, so
/// each staging layer only needs to carry its own edits.
pub fn effective_props(base: &Value, row: &PostModule, mode: OverrideMode) -> Value {
    let published = merge_props(base, &row.overrides);
    match mode {
        OverrideMode::Published => published,
        OverrideMode::Review => merge_props(&published, &row.review_overrides),
        OverrideMode::AiReview => {
            let review = merge_props(&published, &row.review_overrides);
            merge_props(&review, &row.ai_review_overrides)
        }
    }
}

/// Build one composed module from its attachment and instance rows
pub fn compose_module(
    row: &PostModule,
    instance: &ModuleInstance,
    mode: OverrideMode,
) -> ComposedModule {
    ComposedModule {
        post_module_id: row.id,
        module_instance_id: instance.id,
        module_type: instance.module_type.clone(),
        scope: instance.scope.clone(),
        global_slug: instance.global_slug.clone(),
        order_index: row.order_index,
        locked: row.locked,
        props: effective_props(&instance.props, row, mode),
    }
}

/// Load a post and compose its modules in display order
pub async fn compose_post(pool: &PgPool, post_id: Uuid, mode: OverrideMode) -> Result<ComposedPost> {
    let post = post_repo::find_by_id(pool, post_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("post {} not found", post_id)))?;

    let rows = module_repo::list_for_post(pool, post_id).await?;
    let instance_ids: Vec<Uuid> = rows.iter().map(|r| r.module_instance_id).collect();
    let instances = module_repo::instances_by_ids(pool, &instance_ids).await?;
    let by_id: HashMap<Uuid, &ModuleInstance> =
        instances.iter().map(|i| (i.id, i)).collect();

    let mut modules = Vec::with_capacity(rows.len());
    for row in &rows {
        let instance = by_id.get(&row.module_instance_id).ok_or_else(|| {
            AppError::Internal(format!(
                "post_module {} references missing instance {}",
                row.id, row.module_instance_id
            ))
        })?;
        modules.push(compose_module(row, instance, mode));
    }

    Ok(ComposedPost { post, modules })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;

    fn row_with(overrides: Value, review: Value, ai: Value) -> PostModule {
        PostModule {
            id: Uuid::new_v4(),
            post_id: Uuid::new_v4(),
            module_instance_id: Uuid::new_v4(),
            order_index: 0,
            overrides,
            review_overrides: review,
            ai_review_overrides: ai,
            locked: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_merge_scalars_replace() {
        let merged = merge_props(&json!({ "a": 1, "b": 2 }), &json!({ "b": 3 }));
        assert_eq!(merged, json!({ "a": 1, "b": 3 }));
    }

    #[test]
    fn test_merge_objects_recurse() {
        let base = json!({ "layout": { "cols": 2, "gap": 8 }, "title": "x" });
        let patch = json!({ "layout": { "cols": 3 } });
        assert_eq!(
            merge_props(&base, &patch),
            json!({ "layout": { "cols": 3, "gap": 8 }, "title": "x" })
        );
    }

    #[test]
    fn test_merge_arrays_replace_wholesale() {
        let base = json!({ "images": ["a", "b", "c"] });
        let patch = json!({ "images": ["z"] });
        assert_eq!(merge_props(&base, &patch), json!({ "images": ["z"] }));
    }

    #[test]
    fn test_merge_null_deletes_key() {
        let merged = merge_props(&json!({ "a": 1, "b": 2 }), &json!({ "b": null }));
        assert_eq!(merged, json!({ "a": 1 }));
    }

    #[test]
    fn test_merge_empty_patch_is_identity() {
        let base = json!({ "a": { "b": [1, 2] } });
        assert_eq!(merge_props(&base, &json!({})), base);
    }

    #[test]
    fn test_effective_props_published_ignores_staged() {
        let row = row_with(
            json!({ "heading": "Live" }),
            json!({ "heading": "Draft edit" }),
            json!({ "heading": "AI edit" }),
        );
        let props = effective_props(&json!({ "heading": "Base" }), &row, OverrideMode::Published);
        assert_eq!(props, json!({ "heading": "Live" }));
    }

    #[test]
    fn test_effective_props_review_stacks_on_published() {
        let row = row_with(
            json!({ "heading": "Live", "cta_label": "Go" }),
            json!({ "heading": "Draft edit" }),
            json!({}),
        );
        let props = effective_props(&json!({ "heading": "Base" }), &row, OverrideMode::Review);
        assert_eq!(props, json!({ "heading": "Draft edit", "cta_label": "Go" }));
    }

    #[test]
    fn test_effective_props_ai_review_stacks_on_review() {
        let row = row_with(
            json!({ "heading": "Live" }),
            json!({ "subheading": "Reviewed" }),
            json!({ "heading": "AI heading" }),
        );
        let props = effective_props(&json!({}), &row, OverrideMode::AiReview);
        assert_eq!(
            props,
            json!({ "heading": "AI heading", "subheading": "Reviewed" })
        );
    }

    #[test]
    fn test_compose_module_carries_order_and_lock() {
        let mut row = row_with(json!({}), json!({}), json!({}));
        row.order_index = 4;
        row.locked = true;
        let instance = ModuleInstance {
            id: row.module_instance_id,
            module_type: "hero".into(),
            scope: "post".into(),
            global_slug: None,
            props: json!({ "heading": "Hi" }),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let composed = compose_module(&row, &instance, OverrideMode::Published);
        assert_eq!(composed.order_index, 4);
        assert!(composed.locked);
        assert_eq!(composed.props, json!({ "heading": "Hi" }));
    }
}
