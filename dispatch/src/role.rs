//! Role-based model resolution: the `fast | mid | intelligent | verifier` tiers
//! that agent kinds are mapped onto, and the per-role `(provider, model,
//! max_tokens, temperature)` configuration the dispatcher resolves against.

use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Capability tier a model call is dispatched under.
///
/// Agent kinds are mapped to a role by `vantage_mission::config::MissionConfig`;
/// the dispatcher resolves a role to a concrete `(provider, model)` pair via
/// [`RoleTable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum AgentRole {
    /// Cheap, low-latency model for classification-style calls (messenger, note assignment).
    Fast,
    /// Balanced model for most research/reflection calls.
    Mid,
    /// Highest-quality model for writing prose that ends up in the final report.
    Intelligent,
    /// A model used to check/verify another model's output (writing reflection).
    Verifier,
}

impl AgentRole {
    /// All roles, in resolution order.
    pub const ALL: [Self; 4] = [Self::Fast, Self::Mid, Self::Intelligent, Self::Verifier];

    /// The environment variable name carrying this role's provider selection
    /// (`FAST_LLM_PROVIDER`, `MID_LLM_PROVIDER`, ...).
    #[must_use]
    pub const fn provider_env_var(self) -> &'static str {
        match self {
            Self::Fast => "FAST_LLM_PROVIDER",
            Self::Mid => "MID_LLM_PROVIDER",
            Self::Intelligent => "INTELLIGENT_LLM_PROVIDER",
            Self::Verifier => "VERIFIER_LLM_PROVIDER",
        }
    }

    #[must_use]
    pub const fn model_env_var(self) -> &'static str {
        match self {
            Self::Fast => "FAST_LLM_MODEL",
            Self::Mid => "MID_LLM_MODEL",
            Self::Intelligent => "INTELLIGENT_LLM_MODEL",
            Self::Verifier => "VERIFIER_LLM_MODEL",
        }
    }

    #[must_use]
    pub const fn max_tokens_env_var(self) -> &'static str {
        match self {
            Self::Fast => "AGENT_ROLE_MAX_TOKENS_FAST",
            Self::Mid => "AGENT_ROLE_MAX_TOKENS_MID",
            Self::Intelligent => "AGENT_ROLE_MAX_TOKENS_INTELLIGENT",
            Self::Verifier => "AGENT_ROLE_MAX_TOKENS_VERIFIER",
        }
    }

    #[must_use]
    pub const fn temperature_env_var(self) -> &'static str {
        match self {
            Self::Fast => "AGENT_ROLE_TEMPERATURE_FAST",
            Self::Mid => "AGENT_ROLE_TEMPERATURE_MID",
            Self::Intelligent => "AGENT_ROLE_TEMPERATURE_INTELLIGENT",
            Self::Verifier => "AGENT_ROLE_TEMPERATURE_VERIFIER",
        }
    }
}

/// Resolved `(provider, model, max_tokens, temperature)` for one [`AgentRole`].
#[derive(Debug, Clone)]
pub struct RoleModelConfig {
    /// Provider identifier (`"openai"`, `"deepseek"`, `"openrouter"`, ...).
    pub provider: String,
    /// Model id as passed to the provider's API.
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl RoleModelConfig {
    #[must_use]
    pub fn new(provider: impl Into<String>, model: impl Into<String>, max_tokens: u32, temperature: f32) -> Self {
        Self {
            provider: provider.into(),
            model: model.into(),
            max_tokens,
            temperature,
        }
    }
}

/// `AgentRole -> RoleModelConfig` resolution table.
///
/// Built once at startup (typically via [`RoleTable::from_env`]) and shared by the
/// [`crate::dispatcher::ModelDispatcher`] for the lifetime of the process.
#[derive(Debug, Clone)]
pub struct RoleTable {
    entries: BTreeMap<AgentRole, RoleModelConfig>,
}

impl RoleTable {
    /// Builds a table with the same model configuration for every role.
    #[must_use]
    pub fn uniform(config: RoleModelConfig) -> Self {
        let mut entries = BTreeMap::new();
        for role in AgentRole::ALL {
            entries.insert(role, config.clone());
        }
        Self { entries }
    }

    #[must_use]
    pub fn with_role(mut self, role: AgentRole, config: RoleModelConfig) -> Self {
        self.entries.insert(role, config);
        self
    }

    /// Looks up the config for a role. Every role must be present; callers build the
    /// table exhaustively (via [`RoleTable::uniform`] plus overrides, or
    /// [`RoleTable::from_env`]).
    #[must_use]
    pub fn get(&self, role: AgentRole) -> Option<&RoleModelConfig> {
        self.entries.get(&role)
    }

    /// Builds a table from environment variables, falling back to `default_provider`/
    /// `default_model` for any role whose variables are unset.
    #[must_use]
    pub fn from_env(default_provider: &str, default_model: &str) -> Self {
        let mut entries = BTreeMap::new();
        for role in AgentRole::ALL {
            let provider = std::env::var(role.provider_env_var()).unwrap_or_else(|_| default_provider.to_string());
            let model = std::env::var(role.model_env_var()).unwrap_or_else(|_| default_model.to_string());
            let max_tokens = std::env::var(role.max_tokens_env_var())
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default_max_tokens(role));
            let temperature = std::env::var(role.temperature_env_var())
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default_temperature(role));
            entries.insert(role, RoleModelConfig::new(provider, model, max_tokens, temperature));
        }
        Self { entries }
    }
}

const fn default_max_tokens(role: AgentRole) -> u32 {
    match role {
        AgentRole::Fast => 1024,
        AgentRole::Mid => 4096,
        AgentRole::Intelligent => 8192,
        AgentRole::Verifier => 2048,
    }
}

const fn default_temperature(role: AgentRole) -> f32 {
    match role {
        AgentRole::Fast => 0.2,
        AgentRole::Mid => 0.4,
        AgentRole::Intelligent => 0.7,
        AgentRole::Verifier => 0.1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniform_covers_all_roles() {
        let table = RoleTable::uniform(RoleModelConfig::new("openai", "gpt-5-mini", 2048, 0.3));
        for role in AgentRole::ALL {
            assert!(table.get(role).is_some());
        }
    }

    #[test]
    fn override_replaces_single_role() {
        let table = RoleTable::uniform(RoleModelConfig::new("openai", "gpt-5-mini", 2048, 0.3))
            .with_role(AgentRole::Intelligent, RoleModelConfig::new("openai", "gpt-5", 8192, 0.7));
        assert_eq!(table.get(AgentRole::Intelligent).unwrap().model, "gpt-5");
        assert_eq!(table.get(AgentRole::Fast).unwrap().model, "gpt-5-mini");
    }
}
