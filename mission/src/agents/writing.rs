//! The Writing agent (design §4.7, Writing): drafts section bodies,
//! synthesizes parent-section intros from their subsections, and revises
//! drafts against WritingReflection feedback. Unlike the other agents, its
//! calls return plain Markdown prose rather than structured JSON, so they go
//! through [`ModelDispatcher::dispatch_text`] and are post-processed rather
//! than parsed.

use regex::Regex;
use std::sync::OnceLock;
use vantage_dispatch::{ModelCallDetails, ModelDispatcher};

use super::{AgentCtx, call, goals_summary, notes_summary};
use crate::config::MissionConfig;
use crate::domain::{GoalEntry, Note, ReportSection};
use crate::prompts;

pub struct WritingAgent<'a> {
    dispatcher: &'a ModelDispatcher,
    config: &'a MissionConfig,
}

impl<'a> WritingAgent<'a> {
    #[must_use]
    pub fn new(dispatcher: &'a ModelDispatcher, config: &'a MissionConfig) -> Self {
        Self { dispatcher, config }
    }

    /// Drafts the body text of a `research_based` or `content_based` leaf
    /// section from its assigned notes.
    pub async fn draft_section(
        &self,
        section: &ReportSection,
        outline_context: &str,
        previous_sections_preview: &str,
        notes: &[Note],
        active_goals: &[GoalEntry],
        active_thoughts: &str,
        ctx: AgentCtx<'_>,
    ) -> crate::error::Result<(String, ModelCallDetails)> {
        let rendered = prompts::writing_section().render(&[
            ("section_title", &section.title),
            ("section_description", &section.description),
            ("outline_context", outline_context),
            ("previous_sections_preview", previous_sections_preview),
            ("notes_summary", &notes_summary(notes, self.config.research_note_content_limit)),
            ("active_goals", &goals_summary(active_goals)),
            ("active_thoughts", active_thoughts),
        ]);
        self.draft("writing", rendered, ctx).await
    }

    /// Synthesizes a short introductory paragraph for a
    /// `synthesize_from_subsections` section from its already-written
    /// subsections, without repeating their content.
    pub async fn synthesize_intro(
        &self,
        section: &ReportSection,
        subsections_content: &str,
        ctx: AgentCtx<'_>,
    ) -> crate::error::Result<(String, ModelCallDetails)> {
        let rendered = prompts::writing_synthesize_intro().render(&[
            ("section_title", &section.title),
            ("section_description", &section.description),
            ("subsections_content", subsections_content),
        ]);
        self.draft("writing", rendered, ctx).await
    }

    /// Revises a drafted section's body based on WritingReflection feedback.
    pub async fn revise_section(
        &self,
        section: &ReportSection,
        current_draft: &str,
        revision_suggestions: &str,
        notes: &[Note],
        ctx: AgentCtx<'_>,
    ) -> crate::error::Result<(String, ModelCallDetails)> {
        let rendered = prompts::writing_revise_section().render(&[
            ("section_title", &section.title),
            ("section_description", &section.description),
            ("current_draft", current_draft),
            ("revision_suggestions", revision_suggestions),
            ("notes_summary", &notes_summary(notes, self.config.research_note_content_limit)),
        ]);
        self.draft("writing", rendered, ctx).await
    }

    async fn draft(
        &self,
        agent_name: &str,
        rendered: String,
        ctx: AgentCtx<'_>,
    ) -> crate::error::Result<(String, ModelCallDetails)> {
        let role = self.config.role_for("writing");
        let dispatch = call(role, agent_name, rendered, ctx);
        let (text, details) = self.dispatcher.dispatch_text(dispatch, ctx.status).await?;
        Ok((sort_citation_brackets(text.trim()), details))
    }
}

/// Sorts the citation keys within a multi-citation bracket group (e.g.
/// `[doc2, doc1]` -> `[doc1, doc2]`) so the same evidence set always renders
/// the same way regardless of which order the model happened to cite it in.
/// Single-citation brackets are left untouched.
fn sort_citation_brackets(text: &str) -> String {
    fn pattern() -> &'static Regex {
        static CELL: OnceLock<Regex> = OnceLock::new();
        CELL.get_or_init(|| Regex::new(r"\[([^\[\]]+)\]").expect("static citation bracket pattern"))
    }
    pattern()
        .replace_all(text, |caps: &regex::Captures<'_>| {
            let inner = &caps[1];
            if !inner.contains(',') {
                return format!("[{inner}]");
            }
            let mut parts: Vec<&str> = inner.split(',').map(str::trim).collect();
            parts.sort_unstable();
            format!("[{}]", parts.join(", "))
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sorts_multi_citation_brackets() {
        let text = "Some claim [doc2, doc1] and another [web-b, web-a].";
        let sorted = sort_citation_brackets(text);
        assert!(sorted.contains("[doc1, doc2]"));
        assert!(sorted.contains("[web-a, web-b]"));
    }

    #[test]
    fn leaves_single_citation_brackets_untouched() {
        let text = "A claim [doc1] here.";
        assert_eq!(sort_citation_brackets(text), text);
    }
}
