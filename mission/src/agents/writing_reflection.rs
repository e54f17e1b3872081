//! The WritingReflection agent (design §4.7, WritingReflection): reviews one
//! drafted section before it's finalized and proposes concrete revisions.
//! Dispatched under the `Verifier` role, distinct from the `Intelligent`
//! role Writing itself drafts under.

use schemars::JsonSchema;
use serde::Deserialize;
use vantage_dispatch::{ModelCallDetails, ModelDispatcher};

use super::{AgentCtx, call};
use crate::config::MissionConfig;
use crate::domain::{GoalEntry, ReportSection};
use crate::prompts;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ChangeSuggestion {
    pub section_id: String,
    pub issue_description: String,
    pub suggested_change: String,
    pub priority: Priority,
}

#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct WritingReflectionOutput {
    #[serde(default)]
    pub change_suggestions: Vec<ChangeSuggestion>,
    #[serde(default)]
    pub scratchpad_update: Option<String>,
}

impl WritingReflectionOutput {
    #[must_use]
    pub fn has_high_priority_issues(&self) -> bool {
        self.change_suggestions.iter().any(|s| s.priority == Priority::High)
    }
}

pub struct WritingReflectionAgent<'a> {
    dispatcher: &'a ModelDispatcher,
    config: &'a MissionConfig,
}

impl<'a> WritingReflectionAgent<'a> {
    #[must_use]
    pub fn new(dispatcher: &'a ModelDispatcher, config: &'a MissionConfig) -> Self {
        Self { dispatcher, config }
    }

    pub async fn review(
        &self,
        section: &ReportSection,
        current_draft: &str,
        active_goals: &[GoalEntry],
        ctx: AgentCtx<'_>,
    ) -> crate::error::Result<(WritingReflectionOutput, ModelCallDetails)> {
        let rendered = prompts::writing_reflection_review().render(&[
            ("section_title", &section.title),
            ("section_description", &section.description),
            ("current_draft", current_draft),
            ("active_goals", &super::goals_summary(active_goals)),
        ]);
        let role = self.config.role_for("writing_reflection");
        let dispatch = call(role, "writing_reflection", rendered, ctx);
        let (output, details) = self.dispatcher.dispatch_structured(dispatch, ctx.status).await?;
        Ok((output, details))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn high_priority_detection() {
        let mut output = WritingReflectionOutput::default();
        output.change_suggestions.push(ChangeSuggestion {
            section_id: "s1".to_string(),
            issue_description: "missing citation".to_string(),
            suggested_change: "cite source".to_string(),
            priority: Priority::High,
        });
        assert!(output.has_high_priority_issues());
    }
}
