/// HTTP handlers for cms-service
///
/// Thin request/response layer: deserialize, check permissions, call a
/// service, shape the response.
pub mod activity;
pub mod agents;
pub mod forms;
pub mod media;
pub mod menus;
pub mod module_groups;
pub mod modules;
pub mod posts;
pub mod public;
pub mod settings;
pub mod users;

use serde::{Deserialize, Deserializer};

/// Distinguish "field absent" from "field present but null" in PATCH bodies.
///
/// Use with `#[serde(default, deserialize_with = "double_option")]` on an
/// `Option<Option<T>>`: absent stays `None`, an explicit `null` becomes
/// `Some(None)` and clears the column.
pub(crate) fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Deserialize::deserialize(deserializer).map(Some)
}
