/// Data models for cms-service
///
/// This module defines structures for:
/// - Post: localized content documents with a tree hierarchy and translations
/// - ModuleInstance / PostModule: typed content blocks and their attachments
/// - ModuleGroup: reusable module templates seeded into new posts
/// - MediaAsset: uploaded files plus optimized/derivative variants
/// - Menu, Form, FormSubmission, SiteSetting, Agent, ActivityLog, User
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

// ========================================
// Post Models
// ========================================

/// Post status in the publishing lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostStatus {
    Draft,
    Review,
    Scheduled,
    Published,
    Private,
    Protected,
    Archived,
}

impl PostStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Review => "review",
            Self::Scheduled => "scheduled",
            Self::Published => "published",
            Self::Private => "private",
            Self::Protected => "protected",
            Self::Archived => "archived",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "draft" => Some(Self::Draft),
            "review" => Some(Self::Review),
            "scheduled" => Some(Self::Scheduled),
            "published" => Some(Self::Published),
            "private" => Some(Self::Private),
            "protected" => Some(Self::Protected),
            "archived" => Some(Self::Archived),
            _ => None,
        }
    }

    /// Statuses visible on the public site
    pub fn is_public(&self) -> bool {
        matches!(self, Self::Published)
    }
}

/// Post database entity
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Post {
    pub id: Uuid,
    pub post_type: String,
    pub locale: String,
    pub slug: String,
    pub title: String,
    pub status: String,
    pub translation_of_id: Option<Uuid>,
    pub parent_id: Option<Uuid>,
    pub order_index: i32,
    pub author_id: Uuid,
    pub excerpt: Option<String>,
    pub meta: Value,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub published_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Post {
    pub fn status(&self) -> Option<PostStatus> {
        PostStatus::from_str(&self.status)
    }

    /// A post is a translation when it points at a family root.
    pub fn is_translation(&self) -> bool {
        self.translation_of_id.is_some()
    }
}

// ========================================
// Module Models
// ========================================

/// Scope of a module instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModuleScope {
    /// Owned by exactly one post
    Post,
    /// Shared across posts, addressed by global_slug
    Global,
    /// Defined in code, props read-only through the API
    Static,
}

impl ModuleScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Post => "post",
            Self::Global => "global",
            Self::Static => "static",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "post" => Some(Self::Post),
            "global" => Some(Self::Global),
            "static" => Some(Self::Static),
            _ => None,
        }
    }
}

/// Stored props payload for one module
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ModuleInstance {
    pub id: Uuid,
    pub module_type: String,
    pub scope: String,
    pub global_slug: Option<String>,
    pub props: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ModuleInstance {
    pub fn scope(&self) -> Option<ModuleScope> {
        ModuleScope::from_str(&self.scope)
    }
}

/// Editing mode selecting which override column applies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverrideMode {
    Published,
    Review,
    AiReview,
}

impl OverrideMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Published => "published",
            Self::Review => "review",
            Self::AiReview => "ai_review",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "published" => Some(Self::Published),
            "review" => Some(Self::Review),
            "ai_review" => Some(Self::AiReview),
            _ => None,
        }
    }
}

/// Join row attaching a module instance to a post
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct PostModule {
    pub id: Uuid,
    pub post_id: Uuid,
    pub module_instance_id: Uuid,
    pub order_index: i32,
    pub overrides: Value,
    pub review_overrides: Value,
    pub ai_review_overrides: Value,
    pub locked: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Named, reusable set of default modules for a post type
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ModuleGroup {
    pub id: Uuid,
    pub name: String,
    pub post_type: Option<String>,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One module template inside a module group
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ModuleGroupModule {
    pub id: Uuid,
    pub module_group_id: Uuid,
    pub module_type: String,
    pub default_props: Value,
    pub order_index: i32,
}

/// A module with its effective props after override resolution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComposedModule {
    pub post_module_id: Uuid,
    pub module_instance_id: Uuid,
    pub module_type: String,
    pub scope: String,
    pub global_slug: Option<String>,
    pub order_index: i32,
    pub locked: bool,
    pub props: Value,
}

/// A post together with its composed modules
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComposedPost {
    pub post: Post,
    pub modules: Vec<ComposedModule>,
}

// ========================================
// Media Models
// ========================================

/// A generated resized derivative of a media asset
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaVariant {
    pub name: String,
    pub url: String,
    pub width: u32,
    pub height: u32,
    pub size: u64,
}

/// Uploaded file metadata
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct MediaAsset {
    pub id: Uuid,
    pub file_name: String,
    pub path: String,
    pub url: String,
    pub mime_type: String,
    pub size: i64,
    pub width: Option<i32>,
    pub height: Option<i32>,
    pub alt_text: Option<String>,
    pub focal_x: Option<f32>,
    pub focal_y: Option<f32>,
    pub optimized_url: Option<String>,
    pub optimized_size: Option<i64>,
    pub metadata: Value,
    pub uploaded_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MediaAsset {
    /// Variants recorded under metadata.variants
    pub fn variants(&self) -> Vec<MediaVariant> {
        self.metadata
            .get("variants")
            .and_then(|v| serde_json::from_value(v.clone()).ok())
            .unwrap_or_default()
    }
}

// ========================================
// Menu / Form Models
// ========================================

/// Navigation menu with an ordered item tree stored as JSON
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Menu {
    pub id: Uuid,
    pub name: String,
    pub locale: String,
    pub items: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Form definition with declarative field list
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Form {
    pub id: Uuid,
    pub name: String,
    pub fields: Value,
    pub notify_email: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One submitted form payload
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct FormSubmission {
    pub id: Uuid,
    pub form_id: Uuid,
    pub data: Value,
    pub ip: Option<String>,
    pub submitted_at: DateTime<Utc>,
}

// ========================================
// User / Settings / Activity Models
// ========================================

/// CMS user (authentication is external; this backs authorship and roles)
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub display_name: String,
    pub role: String,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Key/value site setting
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct SiteSetting {
    pub key: String,
    pub value: Value,
    pub updated_at: DateTime<Utc>,
}

/// Best-effort audit trail entry
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ActivityLog {
    pub id: Uuid,
    pub user_id: Uuid,
    pub action: String,
    pub subject_type: String,
    pub subject_id: Option<Uuid>,
    pub detail: Value,
    pub created_at: DateTime<Utc>,
}

// ========================================
// Agent Models
// ========================================

/// Kind of content assistant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentKind {
    Webhook,
    Llm,
}

impl AgentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Webhook => "webhook",
            Self::Llm => "llm",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "webhook" => Some(Self::Webhook),
            "llm" => Some(Self::Llm),
            _ => None,
        }
    }
}

/// Declarative content-assistant configuration
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Agent {
    pub id: Uuid,
    pub name: String,
    pub kind: String,
    pub config: Value,
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Agent {
    pub fn kind(&self) -> Option<AgentKind> {
        AgentKind::from_str(&self.kind)
    }
}

// ========================================
// Canonical Document Models
// ========================================

/// Current canonical export format version
pub const CANONICAL_VERSION: u32 = 1;

/// One module inside a canonical document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanonicalModule {
    pub module_type: String,
    pub scope: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub global_slug: Option<String>,
    pub order_index: i32,
    pub props: Value,
    pub locked: bool,
}

/// Post fields carried by a canonical document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanonicalPost {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Uuid>,
    pub post_type: String,
    pub locale: String,
    pub slug: String,
    pub title: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub excerpt: Option<String>,
    #[serde(default)]
    pub meta: Value,
}

/// Versioned JSON serialization of a post plus its modules.
///
/// Used for export/import and as the payload handed to agents.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanonicalDocument {
    pub version: u32,
    pub post: CanonicalPost,
    pub modules: Vec<CanonicalModule>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_post_status_round_trip() {
        for status in [
            PostStatus::Draft,
            PostStatus::Review,
            PostStatus::Scheduled,
            PostStatus::Published,
            PostStatus::Private,
            PostStatus::Protected,
            PostStatus::Archived,
        ] {
            assert_eq!(PostStatus::from_str(status.as_str()), Some(status));
        }
        assert_eq!(PostStatus::from_str("trashed"), None);
    }

    #[test]
    fn test_only_published_is_public() {
        assert!(PostStatus::Published.is_public());
        assert!(!PostStatus::Private.is_public());
        assert!(!PostStatus::Scheduled.is_public());
    }

    #[test]
    fn test_override_mode_uses_snake_case() {
        assert_eq!(OverrideMode::from_str("ai_review"), Some(OverrideMode::AiReview));
        assert_eq!(
            serde_json::to_value(OverrideMode::AiReview).unwrap(),
            serde_json::json!("ai_review")
        );
    }

    #[test]
    fn test_media_variants_tolerate_missing_metadata() {
        let asset = MediaAsset {
            id: Uuid::new_v4(),
            file_name: "a.jpg".into(),
            path: "uploads/a.jpg".into(),
            url: "/media/uploads/a.jpg".into(),
            mime_type: "image/jpeg".into(),
            size: 10,
            width: None,
            height: None,
            alt_text: None,
            focal_x: None,
            focal_y: None,
            optimized_url: None,
            optimized_size: None,
            metadata: serde_json::json!({}),
            uploaded_by: Uuid::new_v4(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert!(asset.variants().is_empty());
    }
}
