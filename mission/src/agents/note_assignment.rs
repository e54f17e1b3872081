//! The NoteAssignment agent (design §4.7, NoteAssignment): chooses which
//! gathered notes best support one report section.

use schemars::JsonSchema;
use serde::Deserialize;
use vantage_dispatch::{ModelCallDetails, ModelDispatcher};

use super::{AgentCtx, call, notes_summary};
use crate::config::MissionConfig;
use crate::domain::{Note, ReportSection};
use crate::prompts;

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct NoteAssignmentOutput {
    pub note_ids: Vec<String>,
    pub reasoning: String,
}

pub struct NoteAssignmentAgent<'a> {
    dispatcher: &'a ModelDispatcher,
    config: &'a MissionConfig,
}

impl<'a> NoteAssignmentAgent<'a> {
    #[must_use]
    pub fn new(dispatcher: &'a ModelDispatcher, config: &'a MissionConfig) -> Self {
        Self { dispatcher, config }
    }

    /// Chooses between `min_notes_per_section` and `max_notes_per_section`
    /// note ids for `section` out of `all_notes`, filtering out ids the
    /// model invents that aren't in `all_notes`.
    pub async fn assign(
        &self,
        section: &ReportSection,
        all_notes: &[Note],
        already_assigned: &[String],
        ctx: AgentCtx<'_>,
    ) -> crate::error::Result<(Vec<String>, ModelCallDetails)> {
        let preview_chars = self.config.writing_previous_content_preview_chars.min(400);
        let rendered = prompts::note_assignment_assign().render(&[
            ("section_title", &section.title),
            ("section_description", &section.description),
            ("notes_summary", &notes_summary(all_notes, preview_chars)),
            ("already_assigned", &super::bullet_list(already_assigned, "(none)")),
            ("min_notes", &self.config.min_notes_per_section.to_string()),
            ("max_notes", &self.config.max_notes_per_section.to_string()),
        ]);
        let role = self.config.role_for("note_assignment");
        let dispatch = call(role, "note_assignment", rendered, ctx);
        let (output, details): (NoteAssignmentOutput, ModelCallDetails) =
            self.dispatcher.dispatch_structured(dispatch, ctx.status).await?;

        let valid: std::collections::BTreeSet<&str> = all_notes.iter().map(|n| n.note_id.as_str()).collect();
        let note_ids = output.note_ids.into_iter().filter(|id| valid.contains(id.as_str())).collect();
        Ok((note_ids, details))
    }
}
