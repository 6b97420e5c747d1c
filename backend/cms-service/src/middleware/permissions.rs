/// Authorization module for cms-service
///
/// Role-based permission checks resolved against the static role registry,
/// plus ownership rules for authors editing their own posts.
use super::AuthenticatedUser;
use crate::error::{AppError, Result};
use crate::models::Post;
use crate::registry::{role_has, Permission};

/// Result type for permission checks
pub type PermissionResult = Result<()>;

/// Require a registry permission on the caller's role
pub fn require(user: &AuthenticatedUser, permission: Permission) -> PermissionResult {
    if role_has(&user.role, permission) {
        Ok(())
    } else {
        Err(AppError::Forbidden(format!(
            "role '{}' lacks the {} permission",
            user.role,
            permission.as_str()
        )))
    }
}

/// Whether the caller holds a permission, for branch decisions
pub fn holds(user: &AuthenticatedUser, permission: Permission) -> bool {
    role_has(&user.role, permission)
}

/// Authors may edit their own posts; editors and admins may edit any.
pub fn check_post_write(user: &AuthenticatedUser, post: &Post) -> PermissionResult {
    require(user, Permission::PostsWrite)?;

    if post.author_id == user.id || holds(user, Permission::PostsPublish) {
        Ok(())
    } else {
        Err(AppError::Forbidden(
            "you don't have permission to modify this post".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn user(role: &str) -> AuthenticatedUser {
        AuthenticatedUser {
            id: Uuid::new_v4(),
            role: role.to_string(),
        }
    }

    fn post_by(author_id: Uuid) -> Post {
        Post {
            id: Uuid::new_v4(),
            post_type: "page".into(),
            locale: "en".into(),
            slug: "s".into(),
            title: "T".into(),
            status: "draft".into(),
            translation_of_id: None,
            parent_id: None,
            order_index: 0,
            author_id,
            excerpt: None,
            meta: serde_json::json!({}),
            scheduled_at: None,
            published_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            deleted_at: None,
        }
    }

    #[test]
    fn test_require_respects_role_registry() {
        assert!(require(&user("admin"), Permission::UsersManage).is_ok());
        assert!(require(&user("viewer"), Permission::PostsWrite).is_err());
        assert!(require(&user("ghost"), Permission::PostsRead).is_err());
    }

    #[test]
    fn test_denied_permission_maps_to_forbidden() {
        let err = require(&user("viewer"), Permission::PostsWrite).unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }

    #[test]
    fn test_author_can_write_own_post_only() {
        let author = user("author");
        assert!(check_post_write(&author, &post_by(author.id)).is_ok());
        assert!(check_post_write(&author, &post_by(Uuid::new_v4())).is_err());
    }

    #[test]
    fn test_editor_can_write_any_post() {
        let editor = user("editor");
        assert!(check_post_write(&editor, &post_by(Uuid::new_v4())).is_ok());
    }
}
