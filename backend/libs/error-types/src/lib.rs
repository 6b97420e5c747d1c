//! Shared error response types
//!
//! Provides the JSON error envelope returned by every Lattice service and the
//! stable machine-readable error codes clients switch on.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// JSON error envelope returned from HTTP handlers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Short human-readable status line, e.g. "Not Found"
    pub error: String,
    /// Detailed error message
    pub message: String,
    /// HTTP status code
    pub status: u16,
    /// Error category, e.g. "validation_error", "server_error"
    #[serde(rename = "type")]
    pub error_type: String,
    /// Stable machine-readable code from [`error_codes`]
    pub code: String,
    /// Optional structured metadata (e.g. referencing ids on a conflict)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<serde_json::Value>,
    /// When the error response was produced
    pub timestamp: DateTime<Utc>,
}

impl ErrorResponse {
    pub fn new(error: &str, message: &str, status: u16, error_type: &str, code: &str) -> Self {
        Self {
            error: error.to_string(),
            message: message.to_string(),
            status,
            error_type: error_type.to_string(),
            code: code.to_string(),
            detail: None,
            timestamp: Utc::now(),
        }
    }

    pub fn with_detail(mut self, detail: serde_json::Value) -> Self {
        self.detail = Some(detail);
        self
    }
}

/// Stable error codes shared across services.
pub mod error_codes {
    pub const DATABASE_ERROR: &str = "DATABASE_ERROR";
    pub const CACHE_ERROR: &str = "CACHE_ERROR";
    pub const INTERNAL_SERVER_ERROR: &str = "INTERNAL_SERVER_ERROR";
    pub const INVALID_CREDENTIALS: &str = "INVALID_CREDENTIALS";
    pub const PERMISSION_DENIED: &str = "PERMISSION_DENIED";
    pub const RATE_LIMITED: &str = "RATE_LIMITED";

    pub const POST_NOT_FOUND: &str = "POST_NOT_FOUND";
    pub const SLUG_TAKEN: &str = "SLUG_TAKEN";
    pub const INVALID_STATUS_TRANSITION: &str = "INVALID_STATUS_TRANSITION";
    pub const TRANSLATION_TARGET_INVALID: &str = "TRANSLATION_TARGET_INVALID";

    pub const MODULE_TYPE_UNKNOWN: &str = "MODULE_TYPE_UNKNOWN";
    pub const MODULE_PROPS_INVALID: &str = "MODULE_PROPS_INVALID";
    pub const MODULE_LOCKED: &str = "MODULE_LOCKED";
    pub const GLOBAL_MODULE_IN_USE: &str = "GLOBAL_MODULE_IN_USE";

    pub const MEDIA_NOT_FOUND: &str = "MEDIA_NOT_FOUND";
    pub const STORAGE_ERROR: &str = "STORAGE_ERROR";
    pub const DERIVATIVE_SPEC_INVALID: &str = "DERIVATIVE_SPEC_INVALID";

    pub const AGENT_UPSTREAM_ERROR: &str = "AGENT_UPSTREAM_ERROR";
    pub const AGENT_RESPONSE_INVALID: &str = "AGENT_RESPONSE_INVALID";

    pub const IMPORT_DOCUMENT_INVALID: &str = "IMPORT_DOCUMENT_INVALID";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_response_serializes_type_field() {
        let resp = ErrorResponse::new(
            "Conflict",
            "slug already in use",
            409,
            "conflict_error",
            error_codes::SLUG_TAKEN,
        );
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["type"], "conflict_error");
        assert_eq!(json["code"], "SLUG_TAKEN");
        assert_eq!(json["status"], 409);
        assert!(json.get("detail").is_none());
    }

    #[test]
    fn test_error_response_detail_round_trip() {
        let resp = ErrorResponse::new(
            "Conflict",
            "global module referenced by 3 posts",
            409,
            "conflict_error",
            error_codes::GLOBAL_MODULE_IN_USE,
        )
        .with_detail(serde_json::json!({ "references": 3 }));

        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["detail"]["references"], 3);
    }
}
