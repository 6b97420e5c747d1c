/// Module type registry
///
/// Maps each module type to its field schema and default props. Instances and
/// overrides are validated against this table before they reach the database.
use once_cell::sync::Lazy;
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::HashMap;

use crate::error::{AppError, Result};

/// Kind of a module field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Text,
    RichText,
    Number,
    Boolean,
    Url,
    /// Media asset id as a string
    Media,
    /// Arbitrary JSON object
    Object,
    /// JSON array
    Array,
}

impl FieldKind {
    fn accepts(&self, value: &Value) -> bool {
        match self {
            Self::Text | Self::RichText | Self::Url | Self::Media => value.is_string(),
            Self::Number => value.is_number(),
            Self::Boolean => value.is_boolean(),
            Self::Object => value.is_object(),
            Self::Array => value.is_array(),
        }
    }
}

/// One field in a module schema
#[derive(Debug, Clone, Serialize)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
    pub required: bool,
}

const fn field(name: &'static str, kind: FieldKind, required: bool) -> FieldSpec {
    FieldSpec {
        name,
        kind,
        required,
    }
}

/// Registered module type
#[derive(Debug, Clone, Serialize)]
pub struct ModuleTypeConfig {
    pub name: &'static str,
    pub title: &'static str,
    pub description: &'static str,
    pub fields: Vec<FieldSpec>,
    pub defaults: Value,
}

static REGISTRY: Lazy<HashMap<&'static str, ModuleTypeConfig>> = Lazy::new(|| {
    let configs = vec![
        ModuleTypeConfig {
            name: "hero",
            title: "Hero",
            description: "Full-width banner with heading and optional call to action",
            fields: vec![
                field("heading", FieldKind::Text, true),
                field("subheading", FieldKind::Text, false),
                field("background", FieldKind::Media, false),
                field("cta_label", FieldKind::Text, false),
                field("cta_url", FieldKind::Url, false),
            ],
            defaults: json!({ "heading": "Untitled" }),
        },
        ModuleTypeConfig {
            name: "prose",
            title: "Prose",
            description: "Rich text body",
            fields: vec![field("body", FieldKind::RichText, true)],
            defaults: json!({ "body": "" }),
        },
        ModuleTypeConfig {
            name: "gallery",
            title: "Gallery",
            description: "Ordered list of media asset references",
            fields: vec![
                field("images", FieldKind::Array, true),
                field("caption", FieldKind::Text, false),
            ],
            defaults: json!({ "images": [] }),
        },
        ModuleTypeConfig {
            name: "cta",
            title: "Call to action",
            description: "Button-style link",
            fields: vec![
                field("label", FieldKind::Text, true),
                field("url", FieldKind::Url, true),
                field("style", FieldKind::Text, false),
            ],
            defaults: json!({ "label": "Learn more", "url": "/" }),
        },
        ModuleTypeConfig {
            name: "quote",
            title: "Quote",
            description: "Pull quote with optional attribution",
            fields: vec![
                field("text", FieldKind::Text, true),
                field("attribution", FieldKind::Text, false),
            ],
            defaults: json!({ "text": "" }),
        },
        ModuleTypeConfig {
            name: "embed",
            title: "Embed",
            description: "Third-party embed by URL",
            fields: vec![
                field("url", FieldKind::Url, true),
                field("provider", FieldKind::Text, false),
            ],
            defaults: json!({ "url": "" }),
        },
        ModuleTypeConfig {
            name: "form_embed",
            title: "Form",
            description: "Renders a registered form",
            fields: vec![field("form_id", FieldKind::Text, true)],
            defaults: json!({ "form_id": "" }),
        },
        ModuleTypeConfig {
            name: "menu_embed",
            title: "Menu",
            description: "Renders a navigation menu",
            fields: vec![field("menu_id", FieldKind::Text, true)],
            defaults: json!({ "menu_id": "" }),
        },
        ModuleTypeConfig {
            name: "spacer",
            title: "Spacer",
            description: "Vertical spacing block",
            fields: vec![field("height", FieldKind::Number, false)],
            defaults: json!({ "height": 32 }),
        },
    ];

    configs.into_iter().map(|c| (c.name, c)).collect()
});

/// Look up a module type, erroring on unknown types.
pub fn module_type(name: &str) -> Result<&'static ModuleTypeConfig> {
    REGISTRY
        .get(name)
        .ok_or_else(|| AppError::BadRequest(format!("unknown module type '{}'", name)))
}

/// All registered module types, sorted by name for stable listings.
pub fn module_types() -> Vec<&'static ModuleTypeConfig> {
    let mut all: Vec<_> = REGISTRY.values().collect();
    all.sort_by_key(|c| c.name);
    all
}

/// Validate a full props object against a module type schema.
///
/// Required fields must be present, every present field must match its
/// declared kind, and unknown keys are rejected.
pub fn validate_props(module_type_name: &str, props: &Value) -> Result<()> {
    let config = module_type(module_type_name)?;
    let object = props.as_object().ok_or_else(|| {
        AppError::ValidationError(format!(
            "props for module '{}' must be a JSON object",
            module_type_name
        ))
    })?;

    for spec in &config.fields {
        match object.get(spec.name) {
            Some(value) if value.is_null() => {
                if spec.required {
                    return Err(AppError::ValidationError(format!(
                        "module '{}': required field '{}' is null",
                        module_type_name, spec.name
                    )));
                }
            }
            Some(value) => {
                if !spec.kind.accepts(value) {
                    return Err(AppError::ValidationError(format!(
                        "module '{}': field '{}' has the wrong type",
                        module_type_name, spec.name
                    )));
                }
            }
            None => {
                if spec.required {
                    return Err(AppError::ValidationError(format!(
                        "module '{}': required field '{}' is missing",
                        module_type_name, spec.name
                    )));
                }
            }
        }
    }

    for key in object.keys() {
        if !config.fields.iter().any(|f| f.name == key.as_str()) {
            return Err(AppError::ValidationError(format!(
                "module '{}': unknown field '{}'",
                module_type_name, key
            )));
        }
    }

    Ok(())
}

/// Validate an override patch against a module type schema.
///
/// A patch may touch any subset of fields; `null` values (key deletions) are
/// allowed everywhere, and required-field presence is not enforced because the
/// patch is merged over complete base props.
pub fn validate_patch(module_type_name: &str, patch: &Value) -> Result<()> {
    let config = module_type(module_type_name)?;
    let object = patch.as_object().ok_or_else(|| {
        AppError::ValidationError(format!(
            "overrides for module '{}' must be a JSON object",
            module_type_name
        ))
    })?;

    for (key, value) in object {
        let spec = config
            .fields
            .iter()
            .find(|f| f.name == key.as_str())
            .ok_or_else(|| {
                AppError::ValidationError(format!(
                    "module '{}': unknown field '{}'",
                    module_type_name, key
                ))
            })?;

        if !value.is_null() && !spec.kind.accepts(value) {
            return Err(AppError::ValidationError(format!(
                "module '{}': field '{}' has the wrong type",
                module_type_name, key
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_contains_core_types() {
        for name in ["hero", "prose", "gallery", "cta", "quote"] {
            assert!(module_type(name).is_ok(), "missing module type {}", name);
        }
        assert!(module_type("carousel").is_err());
    }

    #[test]
    fn test_defaults_pass_their_own_schema() {
        for config in module_types() {
            validate_props(config.name, &config.defaults)
                .unwrap_or_else(|e| panic!("defaults for {} invalid: {}", config.name, e));
        }
    }

    #[test]
    fn test_validate_props_rejects_missing_required() {
        let err = validate_props("cta", &json!({ "label": "Go" })).unwrap_err();
        assert!(err.to_string().contains("url"));
    }

    #[test]
    fn test_validate_props_rejects_unknown_field() {
        let err = validate_props("prose", &json!({ "body": "x", "color": "red" })).unwrap_err();
        assert!(err.to_string().contains("unknown field"));
    }

    #[test]
    fn test_validate_props_rejects_wrong_kind() {
        assert!(validate_props("spacer", &json!({ "height": "tall" })).is_err());
        assert!(validate_props("spacer", &json!({ "height": 64 })).is_ok());
    }

    #[test]
    fn test_validate_patch_allows_partial_and_null() {
        // No required fields enforced, null deletes a key.
        assert!(validate_patch("hero", &json!({ "subheading": null })).is_ok());
        assert!(validate_patch("hero", &json!({ "heading": "New" })).is_ok());
        assert!(validate_patch("hero", &json!({ "bogus": 1 })).is_err());
    }
}
