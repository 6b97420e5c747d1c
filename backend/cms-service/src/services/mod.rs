/// Business logic layer
///
/// Services own the transactional operations behind the HTTP handlers:
/// posts, module attachment and override staging, composition, canonical
/// export/import, media processing, menus, forms, agents, settings, and the
/// best-effort activity trail.
pub mod activity;
pub mod agents;
pub mod canonical;
pub mod composition;
pub mod forms;
pub mod media;
pub mod menus;
pub mod modules;
pub mod posts;
pub mod settings;

pub use agents::AgentService;
pub use canonical::CanonicalService;
pub use media::MediaService;
pub use modules::ModuleService;
pub use posts::PostService;
pub use settings::SettingsService;
