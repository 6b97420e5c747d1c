/// Canonical document service - versioned JSON export/import of a post plus
/// its modules. The same document shape feeds agent invocations.
use sqlx::PgPool;
use tracing::debug;
use uuid::Uuid;

use crate::db::{module_repo, post_repo};
use crate::error::{AppError, Result};
use crate::models::{
    CanonicalDocument, CanonicalModule, CanonicalPost, ModuleScope, OverrideMode, Post,
    PostStatus, CANONICAL_VERSION,
};
use crate::registry;
use crate::services::composition;
use crate::services::posts::{slugify, unique_slug};

pub struct CanonicalService {
    pool: PgPool,
}

impl CanonicalService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Export a post as a canonical document.
    ///
    /// Module props are the effective published-mode props, so the document
    /// is self-contained and staging columns never leak out.
    pub async fn export(&self, post_id: Uuid) -> Result<CanonicalDocument> {
        let composed =
            composition::compose_post(&self.pool, post_id, OverrideMode::Published).await?;

        let modules = composed
            .modules
            .iter()
            .map(|m| CanonicalModule {
                module_type: m.module_type.clone(),
                scope: m.scope.clone(),
                global_slug: m.global_slug.clone(),
                order_index: m.order_index,
                props: m.props.clone(),
                locked: m.locked,
            })
            .collect();

        let post = composed.post;
        Ok(CanonicalDocument {
            version: CANONICAL_VERSION,
            post: CanonicalPost {
                id: Some(post.id),
                post_type: post.post_type,
                locale: post.locale,
                slug: post.slug,
                title: post.title,
                status: post.status,
                excerpt: post.excerpt,
                meta: post.meta,
            },
            modules,
        })
    }

    /// Import a canonical document.
    ///
    /// A document carrying the id of an existing post updates it in place and
    /// rebuilds its module attachments; otherwise a new post is created with
    /// a collision-probed slug. Global modules are matched by global_slug and
    /// created when missing. Everything runs in one transaction.
    pub async fn import(&self, author_id: Uuid, doc: CanonicalDocument) -> Result<Post> {
        if doc.version != CANONICAL_VERSION {
            return Err(AppError::BadRequest(format!(
                "unsupported canonical document version {} (expected {})",
                doc.version, CANONICAL_VERSION
            )));
        }

        let status = PostStatus::from_str(&doc.post.status).ok_or_else(|| {
            AppError::BadRequest(format!("unknown status '{}'", doc.post.status))
        })?;

        // Validate every module before touching the database
        for module in &doc.modules {
            registry::validate_props(&module.module_type, &module.props)?;
            let scope = ModuleScope::from_str(&module.scope).ok_or_else(|| {
                AppError::BadRequest(format!("unknown module scope '{}'", module.scope))
            })?;
            if scope == ModuleScope::Global && module.global_slug.is_none() {
                return Err(AppError::BadRequest(
                    "global modules in a canonical document require a global_slug".to_string(),
                ));
            }
        }

        let existing = match doc.post.id {
            Some(id) => post_repo::find_by_id(&self.pool, id).await?,
            None => None,
        };

        let mut tx = self.pool.begin().await?;

        let post = match existing {
            Some(current) => {
                let slug = if current.slug == doc.post.slug {
                    current.slug.clone()
                } else {
                    unique_slug(
                        &mut tx,
                        &slugify(&doc.post.slug),
                        &current.locale,
                        Some(current.id),
                    )
                    .await?
                };

                post_repo::update_post(
                    &mut tx,
                    current.id,
                    post_repo::PostChanges {
                        slug: Some(&slug),
                        title: Some(&doc.post.title),
                        excerpt: Some(doc.post.excerpt.as_deref()),
                        meta: Some(doc.post.meta.clone()),
                        ..Default::default()
                    },
                )
                .await?
                .ok_or_else(|| AppError::NotFound(format!("post {} not found", current.id)))?;

                module_repo::detach_all_for_post(&mut tx, current.id).await?;
                module_repo::delete_orphaned_post_instances(&mut tx).await?;
                current
            }
            None => {
                let slug =
                    unique_slug(&mut tx, &slugify(&doc.post.slug), &doc.post.locale, None).await?;
                post_repo::create_post(
                    &mut tx,
                    post_repo::NewPost {
                        post_type: &doc.post.post_type,
                        locale: &doc.post.locale,
                        slug: &slug,
                        title: &doc.post.title,
                        status: status.as_str(),
                        translation_of_id: None,
                        parent_id: None,
                        author_id,
                        excerpt: doc.post.excerpt.as_deref(),
                        meta: doc.post.meta.clone(),
                        scheduled_at: None,
                    },
                )
                .await?
            }
        };

        let mut modules = doc.modules;
        modules.sort_by_key(|m| m.order_index);

        for module in &modules {
            let instance = match ModuleScope::from_str(&module.scope) {
                Some(ModuleScope::Global) => {
                    let slug = module.global_slug.as_deref().unwrap_or_default();
                    match module_repo::find_instance_by_global_slug(&mut tx, slug).await? {
                        Some(existing) => existing,
                        None => {
                            module_repo::create_instance(
                                &mut tx,
                                &module.module_type,
                                "global",
                                Some(slug),
                                &module.props,
                            )
                            .await?
                        }
                    }
                }
                _ => {
                    // Post and static scopes both materialize as post-owned
                    // copies on import; effective props become the base.
                    module_repo::create_instance(
                        &mut tx,
                        &module.module_type,
                        "post",
                        None,
                        &module.props,
                    )
                    .await?
                }
            };

            let attached = module_repo::attach(&mut tx, post.id, instance.id).await?;
            if module.locked {
                sqlx::query("UPDATE post_modules SET locked = TRUE WHERE id = $1")
                    .bind(attached.id)
                    .execute(&mut *tx)
                    .await?;
            }
        }

        tx.commit().await?;

        let imported = post_repo::find_by_id(&self.pool, post.id)
            .await?
            .ok_or_else(|| AppError::Internal("imported post vanished".to_string()))?;

        debug!(post_id = %imported.id, modules = modules.len(), "canonical import complete");
        Ok(imported)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_canonical_document_round_trips_through_json() {
        let doc = CanonicalDocument {
            version: CANONICAL_VERSION,
            post: CanonicalPost {
                id: None,
                post_type: "page".into(),
                locale: "en".into(),
                slug: "about".into(),
                title: "About".into(),
                status: "draft".into(),
                excerpt: None,
                meta: json!({}),
            },
            modules: vec![CanonicalModule {
                module_type: "hero".into(),
                scope: "post".into(),
                global_slug: None,
                order_index: 0,
                props: json!({ "heading": "Hi" }),
                locked: false,
            }],
        };

        let value = serde_json::to_value(&doc).unwrap();
        assert_eq!(value["version"], 1);
        assert!(value["post"].get("id").is_none());

        let parsed: CanonicalDocument = serde_json::from_value(value).unwrap();
        assert_eq!(parsed.modules.len(), 1);
        assert_eq!(parsed.modules[0].module_type, "hero");
    }
}
