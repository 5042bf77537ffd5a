//! Decision types produced once per evaluation.

use serde::{Deserialize, Serialize};

/// Categorical outcome of a policy rule or of an overall decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Effect {
    Allow,
    Deny,
    Warn,
}

impl Effect {
    pub fn as_str(self) -> &'static str {
        match self {
            Effect::Allow => "allow",
            Effect::Deny => "deny",
            Effect::Warn => "warn",
        }
    }
}

/// Fallback effect when no rule matches. `warn` is not a valid default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DefaultEffect {
    #[default]
    Allow,
    Deny,
}

impl From<DefaultEffect> for Effect {
    fn from(value: DefaultEffect) -> Self {
        match value {
            DefaultEffect::Allow => Effect::Allow,
            DefaultEffect::Deny => Effect::Deny,
        }
    }
}

/// Final verdict for one evaluate call. Immutable once returned; the engine
/// keeps no copy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Decision {
    pub allowed: bool,
    pub effect: Effect,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matched_rule_id: Option<String>,
    pub reasons: Vec<String>,
    pub warnings: Vec<String>,
}

impl Decision {
    /// Blocked decision with a single reason.
    pub fn blocked(reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            effect: Effect::Deny,
            matched_rule_id: None,
            reasons: vec![reason.into()],
            warnings: Vec::new(),
        }
    }

    /// Granted decision carrying any warnings collected on the way.
    pub fn granted(effect: Effect, matched_rule_id: Option<String>, warnings: Vec<String>) -> Self {
        Self {
            allowed: true,
            effect,
            matched_rule_id,
            reasons: Vec::new(),
            warnings,
        }
    }

    pub fn with_rule(mut self, rule_id: Option<String>) -> Self {
        self.matched_rule_id = rule_id;
        self
    }
}
