//! The Reflection agent (design §4.7, Reflection): reviews the notes
//! gathered for one section between structured research rounds and
//! proposes follow-up questions, outline changes, and notes to discard.
//!
//! Per-section review requests for other sections are deliberately not
//! acted on: the Controller never re-opens a section mid-round, so
//! `sections_needing_review`-style cross-section signals are not part of
//! this agent's contract (see DESIGN.md).

use schemars::JsonSchema;
use serde::Deserialize;
use vantage_dispatch::{ModelCallDetails, ModelDispatcher};

use super::{AgentCtx, call, notes_summary};
use crate::config::MissionConfig;
use crate::domain::{GoalEntry, Note, ReportSection};
use crate::prompts;

#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct ReflectionOutput {
    #[serde(default)]
    pub new_questions: Vec<String>,
    #[serde(default)]
    pub suggested_subsection_topics: Vec<String>,
    #[serde(default)]
    pub proposed_modifications: String,
    #[serde(default)]
    pub discard_note_ids: Vec<String>,
    #[serde(default)]
    pub critical_issues_summary: Option<String>,
    #[serde(default)]
    pub generated_thought: Option<String>,
}

impl ReflectionOutput {
    /// Whether the reflecting agent considers the section's current notes
    /// sufficient: no follow-up questions and no reported critical issue.
    #[must_use]
    pub fn is_well_covered(&self) -> bool {
        self.new_questions.is_empty() && self.critical_issues_summary.is_none()
    }
}

pub struct ReflectionAgent<'a> {
    dispatcher: &'a ModelDispatcher,
    config: &'a MissionConfig,
}

impl<'a> ReflectionAgent<'a> {
    #[must_use]
    pub fn new(dispatcher: &'a ModelDispatcher, config: &'a MissionConfig) -> Self {
        Self { dispatcher, config }
    }

    pub async fn review(
        &self,
        section: &ReportSection,
        section_notes: &[Note],
        active_goals: &[GoalEntry],
        active_thoughts: &str,
        ctx: AgentCtx<'_>,
    ) -> crate::error::Result<(ReflectionOutput, ModelCallDetails)> {
        let rendered = prompts::reflection_section().render(&[
            ("section_title", &section.title),
            ("section_description", &section.description),
            ("notes_summary", &notes_summary(section_notes, self.config.research_note_content_limit.min(400))),
            ("active_goals", &super::goals_summary(active_goals)),
            ("active_thoughts", active_thoughts),
        ]);
        let role = self.config.role_for("reflection");
        let dispatch = call(role, "reflection", rendered, ctx);
        let (output, details) = self.dispatcher.dispatch_structured(dispatch, ctx.status).await?;
        Ok((output, details))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn well_covered_requires_no_questions_and_no_issues() {
        let output = ReflectionOutput::default();
        assert!(output.is_well_covered());

        let mut needs_more = ReflectionOutput::default();
        needs_more.new_questions.push("what about X?".to_string());
        assert!(!needs_more.is_well_covered());
    }
}
