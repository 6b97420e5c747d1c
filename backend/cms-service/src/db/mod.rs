/// Database access layer
///
/// Repository modules with one free function per query, all taking an
/// executor so multi-step operations can share a transaction.
pub mod activity_repo;
pub mod agent_repo;
pub mod form_repo;
pub mod media_repo;
pub mod menu_repo;
pub mod module_group_repo;
pub mod module_repo;
pub mod post_repo;
pub mod settings_repo;
pub mod user_repo;
