/// Form service - declarative field definitions and submission validation
use serde_json::Value;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::db::form_repo;
use crate::error::{AppError, Result};
use crate::models::{Form, FormSubmission};

const FIELD_KINDS: &[&str] = &["text", "textarea", "email", "number", "boolean"];

/// Validate a form's field definition array:
/// `[{name, label, kind, required?}, …]` with unique names and known kinds.
pub fn validate_fields(fields: &Value) -> Result<()> {
    let array = fields
        .as_array()
        .ok_or_else(|| AppError::ValidationError("form fields must be an array".to_string()))?;

    if array.is_empty() {
        return Err(AppError::ValidationError(
            "forms need at least one field".to_string(),
        ));
    }

    let mut seen = std::collections::HashSet::new();
    for field in array {
        let object = field.as_object().ok_or_else(|| {
            AppError::ValidationError("each form field must be an object".to_string())
        })?;

        let name = object
            .get("name")
            .and_then(|n| n.as_str())
            .filter(|n| !n.trim().is_empty())
            .ok_or_else(|| {
                AppError::ValidationError("each form field needs a name".to_string())
            })?;

        if !seen.insert(name.to_string()) {
            return Err(AppError::ValidationError(format!(
                "duplicate form field '{}'",
                name
            )));
        }

        let kind = object
            .get("kind")
            .and_then(|k| k.as_str())
            .unwrap_or("text");
        if !FIELD_KINDS.contains(&kind) {
            return Err(AppError::ValidationError(format!(
                "form field '{}' has unknown kind '{}'",
                name, kind
            )));
        }
    }

    Ok(())
}

/// Validate a submission payload against a form's field definitions.
///
/// Required fields must be present and non-empty, unknown fields are
/// rejected, and values must match their field kind.
pub fn validate_submission(fields: &Value, data: &Value) -> Result<()> {
    let definitions = fields
        .as_array()
        .ok_or_else(|| AppError::Internal("form has malformed field definitions".to_string()))?;
    let payload = data.as_object().ok_or_else(|| {
        AppError::ValidationError("submission data must be a JSON object".to_string())
    })?;

    for definition in definitions {
        let name = definition.get("name").and_then(|n| n.as_str()).unwrap_or("");
        let kind = definition
            .get("kind")
            .and_then(|k| k.as_str())
            .unwrap_or("text");
        let required = definition
            .get("required")
            .and_then(|r| r.as_bool())
            .unwrap_or(false);

        match payload.get(name) {
            None | Some(Value::Null) => {
                if required {
                    return Err(AppError::ValidationError(format!(
                        "field '{}' is required",
                        name
                    )));
                }
            }
            Some(value) => validate_field_value(name, kind, required, value)?,
        }
    }

    for key in payload.keys() {
        let known = definitions
            .iter()
            .any(|d| d.get("name").and_then(|n| n.as_str()) == Some(key.as_str()));
        if !known {
            return Err(AppError::ValidationError(format!(
                "unknown field '{}'",
                key
            )));
        }
    }

    Ok(())
}

fn validate_field_value(name: &str, kind: &str, required: bool, value: &Value) -> Result<()> {
    match kind {
        "text" | "textarea" => {
            let text = value.as_str().ok_or_else(|| {
                AppError::ValidationError(format!("field '{}' must be a string", name))
            })?;
            if required && text.trim().is_empty() {
                return Err(AppError::ValidationError(format!(
                    "field '{}' is required",
                    name
                )));
            }
        }
        "email" => {
            let text = value.as_str().ok_or_else(|| {
                AppError::ValidationError(format!("field '{}' must be a string", name))
            })?;
            if !validator::ValidateEmail::validate_email(&text) {
                return Err(AppError::ValidationError(format!(
                    "field '{}' is not a valid email address",
                    name
                )));
            }
        }
        "number" => {
            if !value.is_number() {
                return Err(AppError::ValidationError(format!(
                    "field '{}' must be a number",
                    name
                )));
            }
        }
        "boolean" => {
            if !value.is_boolean() {
                return Err(AppError::ValidationError(format!(
                    "field '{}' must be a boolean",
                    name
                )));
            }
        }
        _ => {
            return Err(AppError::Internal(format!(
                "form field '{}' has unknown kind '{}'",
                name, kind
            )))
        }
    }

    Ok(())
}

pub async fn create_form(
    pool: &PgPool,
    name: &str,
    fields: &Value,
    notify_email: Option<&str>,
) -> Result<Form> {
    validate_fields(fields)?;
    Ok(form_repo::create(pool, name, fields, notify_email).await?)
}

pub async fn update_form(
    pool: &PgPool,
    form_id: Uuid,
    name: Option<&str>,
    fields: Option<&Value>,
    notify_email: Option<Option<&str>>,
) -> Result<Form> {
    if let Some(fields) = fields {
        validate_fields(fields)?;
    }
    form_repo::update(pool, form_id, name, fields, notify_email)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("form {} not found", form_id)))
}

/// Validate and record a submission.
pub async fn submit(
    pool: &PgPool,
    form_id: Uuid,
    data: Value,
    ip: Option<&str>,
) -> Result<FormSubmission> {
    let form = form_repo::find_by_id(pool, form_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("form {} not found", form_id)))?;

    validate_submission(&form.fields, &data)?;

    let submission = form_repo::create_submission(pool, form_id, &data, ip).await?;

    if let Some(notify) = &form.notify_email {
        // Outbound mail is handled by a separate notification pipeline
        info!(form = %form.name, %notify, submission_id = %submission.id, "submission notification queued");
    }

    Ok(submission)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn contact_fields() -> Value {
        json!([
            { "name": "name", "label": "Name", "kind": "text", "required": true },
            { "name": "email", "label": "Email", "kind": "email", "required": true },
            { "name": "message", "label": "Message", "kind": "textarea", "required": false },
            { "name": "subscribe", "label": "Subscribe", "kind": "boolean" }
        ])
    }

    #[test]
    fn test_validate_fields_accepts_contact_form() {
        assert!(validate_fields(&contact_fields()).is_ok());
    }

    #[test]
    fn test_validate_fields_rejects_duplicates_and_unknown_kinds() {
        assert!(validate_fields(&json!([
            { "name": "a", "kind": "text" },
            { "name": "a", "kind": "text" }
        ]))
        .is_err());
        assert!(validate_fields(&json!([{ "name": "a", "kind": "dropdown" }])).is_err());
        assert!(validate_fields(&json!([])).is_err());
    }

    #[test]
    fn test_validate_submission_happy_path() {
        let data = json!({
            "name": "Ada",
            "email": "ada@example.com",
            "subscribe": true
        });
        assert!(validate_submission(&contact_fields(), &data).is_ok());
    }

    #[test]
    fn test_validate_submission_missing_required() {
        let data = json!({ "email": "ada@example.com" });
        let err = validate_submission(&contact_fields(), &data).unwrap_err();
        assert!(err.to_string().contains("name"));
    }

    #[test]
    fn test_validate_submission_rejects_unknown_and_bad_email() {
        let unknown = json!({ "name": "A", "email": "a@example.com", "phone": "123" });
        assert!(validate_submission(&contact_fields(), &unknown).is_err());

        let bad_email = json!({ "name": "A", "email": "not-an-email" });
        assert!(validate_submission(&contact_fields(), &bad_email).is_err());
    }

    #[test]
    fn test_validate_submission_required_blank_text() {
        let data = json!({ "name": "   ", "email": "a@example.com" });
        assert!(validate_submission(&contact_fields(), &data).is_err());
    }
}
