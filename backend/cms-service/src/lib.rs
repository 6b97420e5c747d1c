/// CMS Service Library
///
/// Headless content-management backend for the Lattice platform: posts with
/// locales, translations, and a tree hierarchy; a typed module-block system
/// with global instances, per-post overrides, and review/AI-review staging;
/// media management with an optimization pipeline; menus, forms, settings,
/// and webhook/LLM content assistants.
///
/// # Modules
///
/// - `handlers`: HTTP request handlers
/// - `models`: Data structures for posts, modules, media, and the rest
/// - `services`: Business logic layer
/// - `db`: Database access layer and repositories
/// - `registry`: In-process module-type, role, and URL-pattern tables
/// - `storage`: Local-disk and S3-compatible object storage
/// - `cache`: Redis-backed rendered-page cache
/// - `middleware`: Authentication, rate limiting, permissions, metrics
/// - `jobs`: Scheduled-post publisher
/// - `error`: Error types and handling
/// - `config`: Configuration management
/// - `metrics`: Observability and metrics collection
pub mod cache;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod jobs;
pub mod metrics;
pub mod middleware;
pub mod models;
pub mod openapi;
pub mod registry;
pub mod services;
pub mod storage;

pub use config::Config;
pub use error::{AppError, Result};
