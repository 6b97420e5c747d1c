/// In-process registries
///
/// Declarative configuration resolved at startup:
/// - `modules`: module type definitions and props validation
/// - `roles`: role-to-permission table
/// - `url_patterns`: post-type URL templates and path resolution
pub mod modules;
pub mod roles;
pub mod url_patterns;

pub use modules::{module_type, module_types, validate_patch, validate_props, ModuleTypeConfig};
pub use roles::{permissions_for, role_has, Permission};
pub use url_patterns::{build_path, resolve_path, ResolvedPath};
