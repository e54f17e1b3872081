//! Mission-engine error types.

use thiserror::Error;

/// Errors surfaced by mission orchestration: agents, the tool registry, the
/// context manager, and the controller itself.
///
/// Most of these are non-fatal on their own — see each agent/controller
/// method's own recovery behavior (malformed structured output retries and
/// falls back to a best-effort default; a timed-out store lock fails just the
/// one query). [`MissionError::Fatal`] is the only variant the controller
/// treats as a reason to move a mission to `failed`.
#[derive(Debug, Error)]
pub enum MissionError {
    /// The model dispatcher failed in a way that survived its own retries.
    #[error("dispatch failed: {0}")]
    Dispatch(#[from] vantage_dispatch::DispatchError),

    /// A tool call failed; callers may substitute an empty result and continue.
    #[error("tool '{name}' failed: {error}")]
    ToolExecution { name: String, error: String },

    /// No tool with this name is registered.
    #[error("tool '{name}' not found")]
    ToolNotFound { name: String },

    /// An agent produced structured output that failed to parse after its
    /// retry budget, or parsed but violated an invariant that cannot be
    /// repaired in place (e.g. no research_based section anywhere in an outline).
    #[error("agent '{agent}' produced invalid output: {reason}")]
    InvalidAgentOutput { agent: String, reason: String },

    /// A RAG-layer operation (embedding, index, store lock) failed.
    #[error("retrieval error: {0}")]
    Retrieval(#[from] vantage_rag::RagError),

    /// Persistence (`rusqlite`) failed in a way that is not recoverable by retry.
    #[error("persistence error: {0}")]
    Persistence(String),

    /// An operation was attempted against a mission already in a terminal status.
    #[error("mission '{mission_id}' is already {status} and rejects further mutation")]
    TerminalMission { mission_id: String, status: String },

    /// Required mission metadata (e.g. `document_group_id`) was absent when a
    /// tool needed it; the caller degrades rather than failing outright.
    #[error("missing mission metadata: {0}")]
    MissingMetadata(String),

    /// Configuration is invalid (e.g. an agent role with no provider configured).
    #[error("configuration error: {0}")]
    Config(String),

    /// Unrecoverable condition that moves the mission to `failed`: no outline
    /// could be produced after the reflection loop, writing returned empty
    /// output repeatedly for the same section, or persistence failed
    /// unrecoverably.
    #[error("fatal mission error: {0}")]
    Fatal(String),
}

impl MissionError {
    /// Whether this error should move the owning mission to `failed` rather
    /// than being absorbed by the caller's own recovery path.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::Fatal(_) | Self::TerminalMission { .. })
    }
}

pub type Result<T> = std::result::Result<T, MissionError>;
