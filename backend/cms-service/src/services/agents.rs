/// Agent service - webhook and LLM content assistants
///
/// An invocation sends the target post's canonical document to the configured
/// assistant and stages every returned module patch into the AI-review
/// override column, where editors accept or discard it.
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sha2::Sha256;
use sqlx::PgPool;
use std::time::Duration;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::db::{agent_repo, module_repo};
use crate::error::{AppError, Result};
use crate::metrics::AGENT_INVOCATIONS;
use crate::models::{Agent, AgentKind, OverrideMode};
use crate::registry;
use crate::services::canonical::CanonicalService;
use crate::services::modules::ModuleService;

const DEFAULT_WEBHOOK_TIMEOUT_SECS: u64 = 15;
const DEFAULT_LLM_TIMEOUT_SECS: u64 = 60;

/// Signature header carried on signed webhook calls
pub const SIGNATURE_HEADER: &str = "X-Lattice-Signature";

#[derive(Debug, Deserialize)]
struct WebhookAgentConfig {
    url: String,
    secret: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct LlmAgentConfig {
    endpoint: String,
    model: String,
    /// Name of the environment variable holding the API key
    api_key_env: String,
    system_prompt: Option<String>,
    max_tokens: Option<u32>,
}

/// One module patch returned by an assistant
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentPatch {
    pub post_module_id: Uuid,
    pub props: Value,
}

/// The response shape every assistant must produce
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentPatchSet {
    pub modules: Vec<AgentPatch>,
}

/// Outcome of one invocation
#[derive(Debug, Serialize)]
pub struct InvocationReport {
    pub agent_id: Uuid,
    pub agent_name: String,
    pub kind: String,
    /// post_module ids whose AI-review overrides were staged
    pub staged: Vec<Uuid>,
    /// Per-module failures; an empty list means a clean run
    pub errors: Vec<String>,
}

/// Hex-encoded HMAC-SHA256 of the request body
pub fn sign_body(secret: &str, body: &[u8]) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
        .expect("HMAC accepts keys of any length");
    mac.update(body);
    format!("sha256={}", hex::encode(mac.finalize().into_bytes()))
}

/// LLM responses often wrap JSON in markdown fences; strip them.
fn strip_code_fences(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

pub struct AgentService {
    pool: PgPool,
    http: reqwest::Client,
}

impl AgentService {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            http: reqwest::Client::new(),
        }
    }

    /// Invoke an agent against a post.
    pub async fn invoke(&self, agent_id: Uuid, post_id: Uuid) -> Result<InvocationReport> {
        let agent = agent_repo::find_by_id(&self.pool, agent_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("agent {} not found", agent_id)))?;

        if !agent.enabled {
            return Err(AppError::BadRequest(format!(
                "agent '{}' is disabled",
                agent.name
            )));
        }

        let kind = agent
            .kind()
            .ok_or_else(|| AppError::Internal(format!("agent '{}' has unknown kind", agent.name)))?;

        let document = CanonicalService::new(self.pool.clone())
            .export(post_id)
            .await?;
        let payload = serde_json::to_value(&document)?;

        let patch_set = match kind {
            AgentKind::Webhook => self.call_webhook(&agent, &payload).await,
            AgentKind::Llm => self.call_llm(&agent, &payload).await,
        };

        let patch_set = match patch_set {
            Ok(set) => {
                AGENT_INVOCATIONS
                    .with_label_values(&[kind.as_str(), "success"])
                    .inc();
                set
            }
            Err(e) => {
                AGENT_INVOCATIONS
                    .with_label_values(&[kind.as_str(), "error"])
                    .inc();
                return Err(e);
            }
        };

        let (staged, errors) = self.stage_patches(post_id, patch_set).await?;

        debug!(
            agent = %agent.name,
            %post_id,
            staged = staged.len(),
            errors = errors.len(),
            "agent invocation complete"
        );

        Ok(InvocationReport {
            agent_id: agent.id,
            agent_name: agent.name,
            kind: kind.as_str().to_string(),
            staged,
            errors,
        })
    }

    async fn call_webhook(&self, agent: &Agent, payload: &Value) -> Result<AgentPatchSet> {
        let config: WebhookAgentConfig = serde_json::from_value(agent.config.clone())
            .map_err(|e| AppError::Internal(format!("agent '{}' has invalid config: {}", agent.name, e)))?;

        let body = serde_json::to_vec(payload)?;
        let timeout = Duration::from_secs(config.timeout_secs.unwrap_or(DEFAULT_WEBHOOK_TIMEOUT_SECS));

        let mut request = self
            .http
            .post(&config.url)
            .timeout(timeout)
            .header("Content-Type", "application/json");

        if let Some(secret) = &config.secret {
            request = request.header(SIGNATURE_HEADER, sign_body(secret, &body));
        }

        let response = request.body(body).send().await?;

        if !response.status().is_success() {
            return Err(AppError::Upstream(format!(
                "webhook '{}' returned {}",
                agent.name,
                response.status()
            )));
        }

        let patch_set: AgentPatchSet = response.json().await.map_err(|e| {
            AppError::Upstream(format!(
                "webhook '{}' returned an invalid patch set: {}",
                agent.name, e
            ))
        })?;

        Ok(patch_set)
    }

    async fn call_llm(&self, agent: &Agent, payload: &Value) -> Result<AgentPatchSet> {
        let config: LlmAgentConfig = serde_json::from_value(agent.config.clone())
            .map_err(|e| AppError::Internal(format!("agent '{}' has invalid config: {}", agent.name, e)))?;

        let api_key = std::env::var(&config.api_key_env).map_err(|_| {
            AppError::Internal(format!(
                "agent '{}': environment variable {} is not set",
                agent.name, config.api_key_env
            ))
        })?;

        let system_prompt = config.system_prompt.clone().unwrap_or_else(|| {
            "You are a CMS content assistant. Respond with a JSON object of the form \
             {\"modules\": [{\"post_module_id\": \"<uuid>\", \"props\": {…}}]} proposing \
             improved props for the modules of the document you receive."
                .to_string()
        });

        let body = json!({
            "model": config.model,
            "max_tokens": config.max_tokens.unwrap_or(2048),
            "messages": [
                { "role": "system", "content": system_prompt },
                { "role": "user", "content": payload.to_string() },
            ],
        });

        let response = self
            .http
            .post(&config.endpoint)
            .timeout(Duration::from_secs(DEFAULT_LLM_TIMEOUT_SECS))
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(AppError::Upstream(format!(
                "LLM endpoint for '{}' returned {}",
                agent.name,
                response.status()
            )));
        }

        let completion: Value = response.json().await?;
        let content = completion
            .pointer("/choices/0/message/content")
            .and_then(|c| c.as_str())
            .ok_or_else(|| {
                AppError::Upstream(format!(
                    "LLM endpoint for '{}' returned no completion content",
                    agent.name
                ))
            })?;

        let patch_set: AgentPatchSet =
            serde_json::from_str(strip_code_fences(content)).map_err(|e| {
                AppError::Upstream(format!(
                    "LLM response for '{}' is not a valid patch set: {}",
                    agent.name, e
                ))
            })?;

        Ok(patch_set)
    }

    /// Stage each patch into its module's AI-review override column.
    /// Per-module failures are collected, not fatal.
    async fn stage_patches(
        &self,
        post_id: Uuid,
        patch_set: AgentPatchSet,
    ) -> Result<(Vec<Uuid>, Vec<String>)> {
        let module_service = ModuleService::new(self.pool.clone());
        let mut staged = Vec::new();
        let mut errors = Vec::new();

        for patch in patch_set.modules {
            let row = match module_repo::find_post_module(&self.pool, patch.post_module_id).await? {
                Some(row) => row,
                None => {
                    errors.push(format!("module {} not found", patch.post_module_id));
                    continue;
                }
            };

            if row.post_id != post_id {
                errors.push(format!(
                    "module {} belongs to a different post",
                    patch.post_module_id
                ));
                continue;
            }

            let instance = match module_repo::find_instance(&self.pool, row.module_instance_id)
                .await?
            {
                Some(instance) => instance,
                None => {
                    errors.push(format!(
                        "module {} references a missing instance",
                        patch.post_module_id
                    ));
                    continue;
                }
            };

            if let Err(e) = registry::validate_patch(&instance.module_type, &patch.props) {
                errors.push(format!("module {}: {}", patch.post_module_id, e));
                continue;
            }

            // AI patches land in the AI-review stage regardless of lock state;
            // promoting them out still requires an editor.
            match module_service
                .stage_overrides(patch.post_module_id, OverrideMode::AiReview, patch.props, true)
                .await
            {
                Ok(_) => staged.push(patch.post_module_id),
                Err(e) => {
                    warn!(module = %patch.post_module_id, "failed to stage agent patch: {}", e);
                    errors.push(format!("module {}: {}", patch.post_module_id, e));
                }
            }
        }

        Ok((staged, errors))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_body_is_stable_and_keyed() {
        let a = sign_body("secret", b"payload");
        let b = sign_body("secret", b"payload");
        let c = sign_body("other", b"payload");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a.starts_with("sha256="));
    }

    #[test]
    fn test_strip_code_fences() {
        assert_eq!(strip_code_fences("{\"a\":1}"), "{\"a\":1}");
        assert_eq!(strip_code_fences("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fences("```\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fences("  {\"a\":1}  "), "{\"a\":1}");
    }

    #[test]
    fn test_patch_set_parses_from_agent_response() {
        let raw = r#"{"modules": [{"post_module_id": "8e7b2f90-3c0e-4f43-9e25-58641e9e6f40", "props": {"heading": "Better"}}]}"#;
        let parsed: AgentPatchSet = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.modules.len(), 1);
        assert_eq!(parsed.modules[0].props["heading"], "Better");
    }
}
