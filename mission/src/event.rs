//! Events published by the Controller to a live-updates sink.
//!
//! Each variant corresponds to one thing a transport layer (a chat UI, a
//! CLI progress view) would want to react to as a mission runs. Publishing
//! happens over a `tokio::sync::broadcast` channel owned by the mission
//! context manager (see `crate::store`); subscribers that fall behind miss
//! the oldest events rather than blocking the mission.

use vantage_dispatch::ModelCallDetails;

use crate::domain::{ExecutionLogEntry, MissionStatus, Note};

/// One event published while a mission runs.
#[derive(Debug, Clone)]
pub enum MissionEvent {
    /// A model call completed; carries the dispatcher's own accounting record.
    ModelCall(ModelCallDetails),

    /// A tool was invoked.
    ToolCall {
        mission_id: String,
        agent_name: String,
        tool_name: String,
        arguments: String,
        result: Result<String, String>,
    },

    /// A new note was added to the mission.
    NoteGenerated { mission_id: String, note: Box<Note> },

    /// An existing note was replaced after a full-page fetch produced a
    /// richer version than the original snippet-based extraction.
    NoteUpdatedFromFullContent { mission_id: String, note_id: String },

    /// The mission's overall status changed.
    AgentStatus { mission_id: String, status: MissionStatus },

    /// A step was appended to the execution log.
    ExecutionLog { mission_id: String, entry: Box<ExecutionLogEntry> },
}

impl MissionEvent {
    #[must_use]
    pub fn mission_id(&self) -> Option<&str> {
        match self {
            Self::ModelCall(_) => None,
            Self::ToolCall { mission_id, .. }
            | Self::NoteGenerated { mission_id, .. }
            | Self::NoteUpdatedFromFullContent { mission_id, .. }
            | Self::AgentStatus { mission_id, .. }
            | Self::ExecutionLog { mission_id, .. } => Some(mission_id),
        }
    }
}
