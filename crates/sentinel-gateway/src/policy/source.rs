//! Where policy configurations come from.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use sentinel_core::error::{Result, SentinelError};
use sentinel_core::{DefaultEffect, Effect, Glob};

use super::rules::{PolicyConfig, PolicyRule, RuleConditions};

/// Supplies a whole `PolicyConfig`, at startup and on reload.
#[async_trait]
pub trait PolicySource: Send + Sync {
    async fn load(&self) -> Result<PolicyConfig>;
    fn describe(&self) -> String;
}

/// JSON or YAML document on disk (`.yaml`/`.yml` → YAML, anything else JSON).
#[derive(Debug, Clone)]
pub struct FilePolicySource {
    path: PathBuf,
}

impl FilePolicySource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn is_yaml(&self) -> bool {
        matches!(
            self.path.extension().and_then(|e| e.to_str()),
            Some("yaml") | Some("yml")
        )
    }
}

#[async_trait]
impl PolicySource for FilePolicySource {
    async fn load(&self) -> Result<PolicyConfig> {
        let s = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            SentinelError::InvalidPolicy(format!("read {} failed: {e}", self.path.display()))
        })?;
        if self.is_yaml() {
            PolicyConfig::parse_yaml(&s)
        } else {
            PolicyConfig::parse_json(&s)
        }
    }

    fn describe(&self) -> String {
        format!("file:{}", self.path.display())
    }
}

/// Fixed in-process configuration.
#[derive(Debug, Clone)]
pub struct StaticPolicySource {
    config: PolicyConfig,
}

impl StaticPolicySource {
    pub fn new(config: PolicyConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl PolicySource for StaticPolicySource {
    async fn load(&self) -> Result<PolicyConfig> {
        self.config.validate()?;
        Ok(self.config.clone())
    }

    fn describe(&self) -> String {
        "static".to_string()
    }
}

/// Load from `source`, falling back to `default_policy()` on any failure.
pub async fn load_or_default(source: &dyn PolicySource) -> PolicyConfig {
    match source.load().await {
        Ok(cfg) => {
            tracing::info!(source = %source.describe(), rules = cfg.rules.len(), "policy loaded");
            cfg
        }
        Err(e) => {
            tracing::warn!(source = %source.describe(), error = %e, "policy load failed, using built-in default");
            default_policy()
        }
    }
}

/// Built-in policy for common agent actions.
pub fn default_policy() -> PolicyConfig {
    PolicyConfig::new(
        DefaultEffect::Allow,
        vec![
            rule("block_system_files", "delete_file", Effect::Deny)
                .with_conditions(path_condition("/etc/*"))
                .with_reason("System files are protected"),
            rule("block_root_files", "delete_file", Effect::Deny)
                .with_conditions(path_condition("/sys/*"))
                .with_reason("System files are protected"),
            rule("warn_shell_execution", "execute_shell", Effect::Warn)
                .with_reason("Shell execution is logged for audit"),
            rule("limit_expensive_llm_calls", "llm_call", Effect::Allow)
                .with_conditions(RuleConditions {
                    max_cost: Some(0.1),
                    ..RuleConditions::default()
                })
                .with_reason("LLM calls above $0.10 require review"),
        ],
    )
}

// Built-in patterns are non-empty, so this never falls back.
fn glob(pattern: &str) -> Glob {
    Glob::new(pattern).unwrap_or_else(|_| Glob::any())
}

fn rule(id: &str, action: &str, effect: Effect) -> PolicyRule {
    PolicyRule::new(id, glob(action), effect)
}

fn path_condition(pattern: &str) -> RuleConditions {
    RuleConditions {
        path_pattern: Some(glob(pattern)),
        ..RuleConditions::default()
    }
}
