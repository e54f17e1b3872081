//! Mission-engine configuration.
//!
//! Mirrors the recognized options from the design's external-interfaces section:
//! per-role model selection, retry/timeout policy, outline and research bounds,
//! content-window limits, and concurrency caps. Values are plain structs with
//! `Default` impls rather than a config-file parser; callers that want
//! environment or TOML-driven overrides apply them before constructing
//! [`MissionConfig`] (see [`MissionConfig::from_env`]).

use std::collections::BTreeMap;
use std::time::Duration;

use vantage_dispatch::AgentRole;

/// Per-role retry/timeout and model-tier configuration, plus research pipeline bounds.
#[derive(Debug, Clone)]
pub struct MissionConfig {
    /// Model role assigned to each agent kind.
    pub agent_roles: BTreeMap<String, AgentRole>,
    /// Max retries for transient LLM failures.
    pub max_retries: u32,
    /// Base retry delay before exponential backoff + jitter.
    pub retry_delay: Duration,
    /// Per-call LLM request timeout.
    pub llm_request_timeout: Duration,

    /// Outline max depth, root counted as depth 0.
    pub max_total_depth: usize,
    /// Bounds for the initial-exploration BFS.
    pub initial_research_max_depth: usize,
    pub initial_research_max_questions: usize,
    /// Result counts used during initial exploration.
    pub initial_exploration_doc_results: usize,
    pub initial_exploration_web_results: usize,
    pub initial_exploration_use_reranker: bool,

    /// Result counts used during structured research rounds.
    pub main_research_doc_results: usize,
    pub main_research_web_results: usize,
    pub structured_research_rounds: usize,
    pub writing_passes: usize,

    /// Content-window sizing for note generation.
    pub research_note_content_limit: usize,
    pub max_planning_context_chars: usize,
    pub writing_previous_content_preview_chars: usize,
    pub thought_pad_context_limit: usize,

    pub max_notes_for_assignment_reranking: usize,
    pub max_concurrent_requests: usize,

    pub skip_final_replanning: bool,
    pub auto_optimize_params: bool,

    /// Max characters for a web-search query; longer queries are refined.
    pub max_query_length: usize,

    pub embedding_batch_size: usize,
    pub embedding_max_concurrent_queries: usize,

    /// Min/max notes a section may be assigned by NoteAssignment.
    pub min_notes_per_section: usize,
    pub max_notes_per_section: usize,

    /// Vector-store advisory-lock wait bound, polled every 100ms.
    pub lock_timeout: Duration,
}

impl Default for MissionConfig {
    fn default() -> Self {
        let mut agent_roles = BTreeMap::new();
        agent_roles.insert("messenger".to_string(), AgentRole::Fast);
        agent_roles.insert("planning".to_string(), AgentRole::Mid);
        agent_roles.insert("research".to_string(), AgentRole::Mid);
        agent_roles.insert("reflection".to_string(), AgentRole::Mid);
        agent_roles.insert("writing".to_string(), AgentRole::Intelligent);
        agent_roles.insert("writing_reflection".to_string(), AgentRole::Verifier);
        agent_roles.insert("note_assignment".to_string(), AgentRole::Fast);
        agent_roles.insert("query_preparer".to_string(), AgentRole::Fast);

        Self {
            agent_roles,
            max_retries: 3,
            retry_delay: Duration::from_secs(1),
            llm_request_timeout: Duration::from_secs(120),

            max_total_depth: 2,
            initial_research_max_depth: 2,
            initial_research_max_questions: 8,
            initial_exploration_doc_results: 5,
            initial_exploration_web_results: 5,
            initial_exploration_use_reranker: false,

            main_research_doc_results: 8,
            main_research_web_results: 5,
            structured_research_rounds: 2,
            writing_passes: 2,

            research_note_content_limit: 2000,
            max_planning_context_chars: 12_000,
            writing_previous_content_preview_chars: 1500,
            thought_pad_context_limit: 20,

            max_notes_for_assignment_reranking: 200,
            max_concurrent_requests: 6,

            skip_final_replanning: false,
            auto_optimize_params: false,

            max_query_length: 350,

            embedding_batch_size: 32,
            embedding_max_concurrent_queries: 4,

            min_notes_per_section: 2,
            max_notes_per_section: 8,

            lock_timeout: Duration::from_secs(300),
        }
    }
}

impl MissionConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the configured role for an agent kind, defaulting to `Mid` for
    /// agent kinds with no explicit entry.
    #[must_use]
    pub fn role_for(&self, agent_kind: &str) -> AgentRole {
        self.agent_roles.get(agent_kind).copied().unwrap_or(AgentRole::Mid)
    }

    /// Builds a configuration from environment variables, falling back to
    /// defaults for anything unset or unparseable. Recognized variables follow
    /// the external-interfaces configuration surface (`MAX_RETRIES`,
    /// `MAX_TOTAL_DEPTH`, `STRUCTURED_RESEARCH_ROUNDS`, etc).
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(v) = env_usize("MAX_RETRIES") {
            config.max_retries = v as u32;
        }
        if let Some(v) = env_u64("RETRY_DELAY") {
            config.retry_delay = Duration::from_secs(v);
        }
        if let Some(v) = env_u64("LLM_REQUEST_TIMEOUT") {
            config.llm_request_timeout = Duration::from_secs(v);
        }
        if let Some(v) = env_usize("MAX_TOTAL_DEPTH") {
            config.max_total_depth = v;
        }
        if let Some(v) = env_usize("INITIAL_RESEARCH_MAX_DEPTH") {
            config.initial_research_max_depth = v;
        }
        if let Some(v) = env_usize("INITIAL_RESEARCH_MAX_QUESTIONS") {
            config.initial_research_max_questions = v;
        }
        if let Some(v) = env_usize("STRUCTURED_RESEARCH_ROUNDS") {
            config.structured_research_rounds = v;
        }
        if let Some(v) = env_usize("WRITING_PASSES") {
            config.writing_passes = v;
        }
        if let Some(v) = env_usize("RESEARCH_NOTE_CONTENT_LIMIT") {
            config.research_note_content_limit = v;
        }
        if let Some(v) = env_usize("MAX_PLANNING_CONTEXT_CHARS") {
            config.max_planning_context_chars = v;
        }
        if let Some(v) = env_usize("WRITING_PREVIOUS_CONTENT_PREVIEW_CHARS") {
            config.writing_previous_content_preview_chars = v;
        }
        if let Some(v) = env_usize("THOUGHT_PAD_CONTEXT_LIMIT") {
            config.thought_pad_context_limit = v;
        }
        if let Some(v) = env_usize("MAX_NOTES_FOR_ASSIGNMENT_RERANKING") {
            config.max_notes_for_assignment_reranking = v;
        }
        if let Some(v) = env_usize("MAX_CONCURRENT_REQUESTS") {
            config.max_concurrent_requests = v;
        }
        if let Some(v) = env_bool("SKIP_FINAL_REPLANNING") {
            config.skip_final_replanning = v;
        }
        if let Some(v) = env_bool("AUTO_OPTIMIZE_PARAMS") {
            config.auto_optimize_params = v;
        }
        if let Some(v) = env_usize("MAX_QUERY_LENGTH") {
            config.max_query_length = v;
        }
        if let Some(v) = env_usize("EMBEDDING_BATCH_SIZE") {
            config.embedding_batch_size = v;
        }
        if let Some(v) = env_usize("EMBEDDING_MAX_CONCURRENT_QUERIES") {
            config.embedding_max_concurrent_queries = v;
        }
        config
    }
}

fn env_usize(name: &str) -> Option<usize> {
    std::env::var(name).ok().and_then(|v| v.parse().ok())
}

fn env_u64(name: &str) -> Option<u64> {
    std::env::var(name).ok().and_then(|v| v.parse().ok())
}

fn env_bool(name: &str) -> Option<bool> {
    std::env::var(name).ok().and_then(|v| v.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_sane() {
        let config = MissionConfig::default();
        assert_eq!(config.max_total_depth, 2);
        assert_eq!(config.max_query_length, 350);
        assert!(config.structured_research_rounds >= 1);
    }

    #[test]
    fn role_lookup_falls_back_to_mid() {
        let config = MissionConfig::default();
        assert_eq!(config.role_for("writing"), AgentRole::Intelligent);
        assert_eq!(config.role_for("unknown_agent"), AgentRole::Mid);
    }
}
