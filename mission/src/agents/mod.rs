//! The agent roster (component C6): one struct per single-purpose agent,
//! each wrapping a [`ModelDispatcher`] reference and a prompt template from
//! [`crate::prompts`]. Every agent follows the same shape `vantage_rag`'s
//! own `QueryPreparer` established: a private `#[derive(Deserialize,
//! JsonSchema)]` response type per distinct call, a rendered template sent
//! as a single user message, and a `(value, ModelCallDetails)` return so
//! callers can fold cost accounting into mission stats themselves.

pub mod messenger;
pub mod note_assignment;
pub mod planning;
pub mod reflection;
pub mod research;
pub mod writing;
pub mod writing_reflection;

pub use messenger::{Intent, MessengerAgent, MessengerOutput};
pub use note_assignment::{NoteAssignmentAgent, NoteAssignmentOutput};
pub use planning::PlanningAgent;
pub use reflection::{ReflectionAgent, ReflectionOutput};
pub use research::{ContentWindow, ExploreOutcome, ExtractedNote, ResearchAgent, ResearchConfig, ResearchRoundOutput};
pub use writing::WritingAgent;
pub use writing_reflection::{ChangeSuggestion, Priority, WritingReflectionAgent, WritingReflectionOutput};

use vantage_core::llm::Message;
use vantage_dispatch::{AgentRole, DispatchCall, MissionStatusSource};

use crate::domain::{GoalEntry, Note, ReportSection};

/// The handful of things every agent call needs beyond its own prompt: which
/// mission it runs under (for cost attribution and cancellation) and where
/// to poll for cancellation.
#[derive(Clone, Copy, Default)]
pub struct AgentCtx<'a> {
    pub mission_id: Option<&'a str>,
    pub status: Option<&'a dyn MissionStatusSource>,
}

impl<'a> AgentCtx<'a> {
    #[must_use]
    pub fn new(mission_id: Option<&'a str>, status: Option<&'a dyn MissionStatusSource>) -> Self {
        Self { mission_id, status }
    }
}

/// Builds a single-user-message [`DispatchCall`] from a rendered template,
/// matching the one-shot-prompt convention `vantage_rag::QueryPreparer` uses.
pub(crate) fn call(role: AgentRole, agent_name: &str, rendered: String, ctx: AgentCtx<'_>) -> DispatchCall {
    let mut call = DispatchCall::new(role, agent_name.to_string(), vec![Message::user(rendered)]);
    if let Some(mission_id) = ctx.mission_id {
        call = call.with_mission(mission_id);
    }
    call
}

/// Renders a bullet list, one item per line, or a placeholder when empty.
pub(crate) fn bullet_list<I, S>(items: I, empty_placeholder: &str) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut lines: Vec<String> = items.into_iter().map(|s| format!("- {}", s.as_ref())).collect();
    if lines.is_empty() {
        lines.push(empty_placeholder.to_string());
    }
    lines.join("\n")
}

/// Formats active goals as `(kind) text [status]` bullet lines, for prompts
/// that need the mission's standing tone/audience/length/format constraints.
pub(crate) fn goals_summary(goals: &[GoalEntry]) -> String {
    bullet_list(
        goals.iter().map(|g| format!("({:?}) {} [{:?}]", g.kind, g.text, g.status)),
        "(none)",
    )
}

/// Formats notes as `id (source_type source_id): content preview` bullet
/// lines, truncating content to keep prompts within budget.
pub(crate) fn notes_summary(notes: &[Note], preview_chars: usize) -> String {
    bullet_list(
        notes.iter().map(|n| {
            format!(
                "{} ({:?} {}): {}",
                n.note_id,
                n.source_type,
                n.source_id,
                truncate_chars(&n.content, preview_chars)
            )
        }),
        "(no notes yet)",
    )
}

/// Renders an outline as an indented bullet tree, one line per section,
/// carrying id/strategy so planning and reflection prompts can reference a
/// section precisely.
pub(crate) fn outline_summary(sections: &[ReportSection]) -> String {
    let mut out = String::new();
    fn walk(sections: &[ReportSection], depth: usize, out: &mut String) {
        for section in sections {
            out.push_str(&"  ".repeat(depth));
            out.push_str(&format!(
                "- [{}] {} ({:?}): {}\n",
                section.section_id, section.title, section.research_strategy, section.description
            ));
            walk(&section.subsections, depth + 1, out);
        }
    }
    walk(sections, 0, &mut out);
    if out.is_empty() {
        out.push_str("(no outline yet)");
    }
    out
}

/// Truncates `text` to at most `limit` characters on a char boundary,
/// appending an ellipsis when it was cut short.
pub(crate) fn truncate_chars(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        return text.to_string();
    }
    let truncated: String = text.chars().take(limit).collect();
    format!("{truncated}…")
}
