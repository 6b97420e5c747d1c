/// Role registry
///
/// Static role-to-permission table. Roles are stored as plain strings on the
/// user row and resolved here; unknown roles carry no permissions.
use once_cell::sync::Lazy;
use std::collections::HashMap;

/// Permission names checked by handlers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Permission {
    PostsRead,
    PostsWrite,
    PostsPublish,
    PostsDelete,
    /// Hard deletion of archived posts; admin only
    PostsPurge,
    ModulesManage,
    MediaWrite,
    MenusManage,
    FormsManage,
    AgentsInvoke,
    SettingsManage,
    UsersManage,
}

impl Permission {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PostsRead => "posts:read",
            Self::PostsWrite => "posts:write",
            Self::PostsPublish => "posts:publish",
            Self::PostsDelete => "posts:delete",
            Self::PostsPurge => "posts:purge",
            Self::ModulesManage => "modules:manage",
            Self::MediaWrite => "media:write",
            Self::MenusManage => "menus:manage",
            Self::FormsManage => "forms:manage",
            Self::AgentsInvoke => "agents:invoke",
            Self::SettingsManage => "settings:manage",
            Self::UsersManage => "users:manage",
        }
    }
}

const ALL: &[Permission] = &[
    Permission::PostsRead,
    Permission::PostsWrite,
    Permission::PostsPublish,
    Permission::PostsDelete,
    Permission::PostsPurge,
    Permission::ModulesManage,
    Permission::MediaWrite,
    Permission::MenusManage,
    Permission::FormsManage,
    Permission::AgentsInvoke,
    Permission::SettingsManage,
    Permission::UsersManage,
];

const EDITOR: &[Permission] = &[
    Permission::PostsRead,
    Permission::PostsWrite,
    Permission::PostsPublish,
    Permission::PostsDelete,
    Permission::ModulesManage,
    Permission::MediaWrite,
    Permission::MenusManage,
    Permission::FormsManage,
    Permission::AgentsInvoke,
];

const AUTHOR: &[Permission] = &[
    Permission::PostsRead,
    Permission::PostsWrite,
    Permission::MediaWrite,
];

const VIEWER: &[Permission] = &[Permission::PostsRead];

static ROLES: Lazy<HashMap<&'static str, &'static [Permission]>> = Lazy::new(|| {
    HashMap::from([
        ("admin", ALL),
        ("editor", EDITOR),
        ("author", AUTHOR),
        ("viewer", VIEWER),
    ])
});

/// Permissions granted to a role. Unknown roles get none.
pub fn permissions_for(role: &str) -> &'static [Permission] {
    ROLES.get(role).copied().unwrap_or(&[])
}

/// Whether `role` holds `permission`.
pub fn role_has(role: &str, permission: Permission) -> bool {
    permissions_for(role).contains(&permission)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admin_holds_every_permission() {
        for permission in ALL {
            assert!(role_has("admin", *permission), "{:?}", permission);
        }
    }

    #[test]
    fn test_author_cannot_publish() {
        assert!(role_has("author", Permission::PostsWrite));
        assert!(!role_has("author", Permission::PostsPublish));
        assert!(!role_has("author", Permission::UsersManage));
    }

    #[test]
    fn test_unknown_role_has_no_permissions() {
        assert!(permissions_for("superuser").is_empty());
        assert!(!role_has("superuser", Permission::PostsRead));
    }
}
