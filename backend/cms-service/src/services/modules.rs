/// Module service - attachments, staged overrides, and shared instances
use serde_json::{json, Value};
use sqlx::PgPool;
use std::collections::HashSet;
use tracing::debug;
use uuid::Uuid;

use crate::db::{module_repo, post_repo};
use crate::error::{AppError, Result};
use crate::models::{ModuleInstance, ModuleScope, OverrideMode, PostModule};
use crate::registry;
use crate::services::composition::merge_props;

/// How a module arrives on a post: a fresh post-scoped instance, or a
/// reference to a shared global instance.
#[derive(Debug)]
pub enum AttachSource {
    New {
        module_type: String,
        props: Option<Value>,
    },
    Global {
        global_slug: String,
    },
    Existing {
        module_instance_id: Uuid,
    },
}

pub struct ModuleService {
    pool: PgPool,
}

impl ModuleService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Attach a module to a post, creating the instance when needed.
    pub async fn attach_module(&self, post_id: Uuid, source: AttachSource) -> Result<PostModule> {
        post_repo::find_by_id(&self.pool, post_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("post {} not found", post_id)))?;

        let mut tx = self.pool.begin().await?;

        let instance = match source {
            AttachSource::New { module_type, props } => {
                let config = registry::module_type(&module_type)?;
                let props = props.unwrap_or_else(|| config.defaults.clone());
                registry::validate_props(&module_type, &props)?;
                module_repo::create_instance(&mut tx, &module_type, "post", None, &props).await?
            }
            AttachSource::Global { global_slug } => {
                module_repo::find_instance_by_global_slug(&mut tx, &global_slug)
                    .await?
                    .ok_or_else(|| {
                        AppError::NotFound(format!(
                            "global module '{}' not found",
                            global_slug
                        ))
                    })?
            }
            AttachSource::Existing { module_instance_id } => {
                let instance = module_repo::find_instance(&self.pool, module_instance_id)
                    .await?
                    .ok_or_else(|| {
                        AppError::NotFound(format!(
                            "module instance {} not found",
                            module_instance_id
                        ))
                    })?;
                // Post-scoped instances belong to exactly one post
                if instance.scope() == Some(ModuleScope::Post) {
                    let references =
                        module_repo::count_references(&mut tx, module_instance_id).await?;
                    if references > 0 {
                        return Err(AppError::Conflict(
                            "post-scoped module instances cannot be attached twice".to_string(),
                        ));
                    }
                }
                instance
            }
        };

        let attached = module_repo::attach(&mut tx, post_id, instance.id).await?;
        tx.commit().await?;

        debug!(post_id = %post_id, instance_id = %instance.id, "module attached");
        Ok(attached)
    }

    async fn load_attachment(&self, post_module_id: Uuid) -> Result<(PostModule, ModuleInstance)> {
        let row = module_repo::find_post_module(&self.pool, post_module_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("post module {} not found", post_module_id))
            })?;
        let instance = module_repo::find_instance(&self.pool, row.module_instance_id)
            .await?
            .ok_or_else(|| {
                AppError::Internal(format!(
                    "post_module {} references missing instance",
                    post_module_id
                ))
            })?;
        Ok((row, instance))
    }

    /// Replace one staged override column.
    ///
    /// Locked attachments only accept writes from callers holding the module
    /// management permission; the handler passes that down as `can_manage`.
    pub async fn stage_overrides(
        &self,
        post_module_id: Uuid,
        mode: OverrideMode,
        patch: Value,
        can_manage: bool,
    ) -> Result<PostModule> {
        let (row, instance) = self.load_attachment(post_module_id).await?;

        if row.locked && !can_manage {
            return Err(AppError::Forbidden(
                "this module is locked; override changes require module management rights"
                    .to_string(),
            ));
        }

        registry::validate_patch(&instance.module_type, &patch)?;

        let (overrides, review, ai) = match mode {
            OverrideMode::Published => (patch, row.review_overrides, row.ai_review_overrides),
            OverrideMode::Review => (row.overrides, patch, row.ai_review_overrides),
            OverrideMode::AiReview => (row.overrides, row.review_overrides, patch),
        };

        let mut tx = self.pool.begin().await?;
        let updated =
            module_repo::set_override_columns(&mut tx, post_module_id, &overrides, &review, &ai)
                .await?
                .ok_or_else(|| {
                    AppError::NotFound(format!("post module {} not found", post_module_id))
                })?;
        tx.commit().await?;

        Ok(updated)
    }

    /// Fold a staged column into the layer below it and clear the stage.
    ///
    /// `ai_review` promotes into `review_overrides`; `review` promotes into
    /// the published `overrides`.
    pub async fn promote_overrides(
        &self,
        post_module_id: Uuid,
        mode: OverrideMode,
    ) -> Result<PostModule> {
        let (row, _) = self.load_attachment(post_module_id).await?;

        let empty = json!({});
        let (overrides, review, ai) = match mode {
            OverrideMode::AiReview => {
                let review = merge_props(&row.review_overrides, &row.ai_review_overrides);
                (row.overrides, review, empty)
            }
            OverrideMode::Review => {
                let overrides = merge_props(&row.overrides, &row.review_overrides);
                (overrides, empty.clone(), row.ai_review_overrides)
            }
            OverrideMode::Published => {
                return Err(AppError::BadRequest(
                    "published overrides are not a staging layer".to_string(),
                ))
            }
        };

        let mut tx = self.pool.begin().await?;
        let updated =
            module_repo::set_override_columns(&mut tx, post_module_id, &overrides, &review, &ai)
                .await?
                .ok_or_else(|| {
                    AppError::NotFound(format!("post module {} not found", post_module_id))
                })?;
        tx.commit().await?;

        Ok(updated)
    }

    /// Throw away a staged column
    pub async fn discard_overrides(
        &self,
        post_module_id: Uuid,
        mode: OverrideMode,
    ) -> Result<PostModule> {
        let (row, _) = self.load_attachment(post_module_id).await?;

        let empty = json!({});
        let (overrides, review, ai) = match mode {
            OverrideMode::Published => (empty, row.review_overrides, row.ai_review_overrides),
            OverrideMode::Review => (row.overrides, empty, row.ai_review_overrides),
            OverrideMode::AiReview => (row.overrides, row.review_overrides, empty),
        };

        let mut tx = self.pool.begin().await?;
        let updated =
            module_repo::set_override_columns(&mut tx, post_module_id, &overrides, &review, &ai)
                .await?
                .ok_or_else(|| {
                    AppError::NotFound(format!("post module {} not found", post_module_id))
                })?;
        tx.commit().await?;

        Ok(updated)
    }

    pub async fn set_locked(&self, post_module_id: Uuid, locked: bool) -> Result<PostModule> {
        module_repo::set_locked(&self.pool, post_module_id, locked)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("post module {} not found", post_module_id)))
    }

    /// Detach a module; orphaned post-scoped instances are removed with it.
    pub async fn detach_module(&self, post_module_id: Uuid) -> Result<()> {
        let (row, instance) = self.load_attachment(post_module_id).await?;

        let mut tx = self.pool.begin().await?;
        if !module_repo::detach(&mut tx, row.id).await? {
            return Err(AppError::NotFound(format!(
                "post module {} not found",
                post_module_id
            )));
        }

        if instance.scope() == Some(ModuleScope::Post) {
            let remaining = module_repo::count_references(&mut tx, instance.id).await?;
            if remaining == 0 {
                module_repo::delete_instance(&mut tx, instance.id).await?;
            }
        }
        tx.commit().await?;

        Ok(())
    }

    /// Apply a full reorder permutation for a post's modules.
    pub async fn reorder_modules(&self, post_id: Uuid, ordered_ids: &[Uuid]) -> Result<()> {
        let current = module_repo::list_for_post(&self.pool, post_id).await?;

        let current_set: HashSet<Uuid> = current.iter().map(|m| m.id).collect();
        let requested_set: HashSet<Uuid> = ordered_ids.iter().copied().collect();

        if requested_set.len() != ordered_ids.len() {
            return Err(AppError::BadRequest(
                "reorder list contains duplicate ids".to_string(),
            ));
        }
        if current_set != requested_set {
            return Err(AppError::BadRequest(
                "reorder list must contain exactly the post's module attachments".to_string(),
            ));
        }

        let mut tx = self.pool.begin().await?;
        module_repo::set_order(&mut tx, post_id, ordered_ids).await?;
        tx.commit().await?;

        Ok(())
    }

    // ========================================
    // Shared (global/static) instances
    // ========================================

    pub async fn list_shared_instances(&self) -> Result<Vec<ModuleInstance>> {
        Ok(module_repo::list_shared_instances(&self.pool).await?)
    }

    pub async fn get_instance(&self, instance_id: Uuid) -> Result<Option<ModuleInstance>> {
        Ok(module_repo::find_instance(&self.pool, instance_id).await?)
    }

    pub async fn create_global_instance(
        &self,
        module_type: &str,
        global_slug: &str,
        props: Option<Value>,
    ) -> Result<ModuleInstance> {
        let config = registry::module_type(module_type)?;
        let props = props.unwrap_or_else(|| config.defaults.clone());
        registry::validate_props(module_type, &props)?;

        if global_slug.trim().is_empty() {
            return Err(AppError::BadRequest(
                "global modules require a global_slug".to_string(),
            ));
        }

        let mut tx = self.pool.begin().await?;
        if module_repo::find_instance_by_global_slug(&mut tx, global_slug)
            .await?
            .is_some()
        {
            return Err(AppError::Conflict(format!(
                "global module '{}' already exists",
                global_slug
            )));
        }

        let instance =
            module_repo::create_instance(&mut tx, module_type, "global", Some(global_slug), &props)
                .await?;
        tx.commit().await?;

        Ok(instance)
    }

    /// Update an instance's base props. Static instances are read-only.
    pub async fn update_instance_props(
        &self,
        instance_id: Uuid,
        props: Value,
    ) -> Result<ModuleInstance> {
        let instance = module_repo::find_instance(&self.pool, instance_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("module instance {} not found", instance_id))
            })?;

        if instance.scope() == Some(ModuleScope::Static) {
            return Err(AppError::Forbidden(
                "static module instances are read-only".to_string(),
            ));
        }

        registry::validate_props(&instance.module_type, &props)?;

        module_repo::update_instance_props(&self.pool, instance_id, &props)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("module instance {} not found", instance_id)))
    }

    /// Delete a shared instance; refuses while posts still reference it.
    pub async fn delete_instance(&self, instance_id: Uuid) -> Result<()> {
        let instance = module_repo::find_instance(&self.pool, instance_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("module instance {} not found", instance_id))
            })?;

        if instance.scope() == Some(ModuleScope::Static) {
            return Err(AppError::Forbidden(
                "static module instances are read-only".to_string(),
            ));
        }

        let mut tx = self.pool.begin().await?;
        let references = module_repo::count_references(&mut tx, instance_id).await?;
        if references > 0 {
            return Err(AppError::Conflict(format!(
                "module instance is referenced by {} post(s)",
                references
            )));
        }

        module_repo::delete_instance(&mut tx, instance_id).await?;
        tx.commit().await?;

        Ok(())
    }
}
