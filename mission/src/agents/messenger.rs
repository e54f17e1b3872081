//! The Messenger agent: classifies the user's latest chat turn into one of
//! five intents and extracts structured content from it (design §4.7,
//! Messenger). Never writes report content itself.

use schemars::JsonSchema;
use serde::Deserialize;
use vantage_dispatch::{ModelCallDetails, ModelDispatcher};

use super::{AgentCtx, call};
use crate::config::MissionConfig;
use crate::prompts;

/// One of the five intents the Messenger classifies a chat turn into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    StartResearch,
    RefineQuestions,
    RefineGoal,
    ApproveQuestions,
    Chat,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct MessengerOutput {
    pub intent: Intent,
    #[serde(default)]
    pub extracted_content: Option<String>,
    #[serde(default)]
    pub formatting_preferences: Option<String>,
    pub response_to_user: String,
    #[serde(default)]
    pub thoughts: String,
}

pub struct MessengerAgent<'a> {
    dispatcher: &'a ModelDispatcher,
    config: &'a MissionConfig,
}

impl<'a> MessengerAgent<'a> {
    #[must_use]
    pub fn new(dispatcher: &'a ModelDispatcher, config: &'a MissionConfig) -> Self {
        Self { dispatcher, config }
    }

    /// Classifies `user_message` in the context of the mission's running
    /// state, returning the structured intent plus its model accounting.
    pub async fn classify(
        &self,
        user_message: &str,
        chat_history: &str,
        mission_context_summary: &str,
        active_thoughts: &str,
        agent_scratchpad: &str,
        ctx: AgentCtx<'_>,
    ) -> crate::error::Result<(MessengerOutput, ModelCallDetails)> {
        let rendered = prompts::messenger_system().render(&[
            ("mission_context_summary", mission_context_summary),
            ("active_thoughts", active_thoughts),
            ("chat_history", chat_history),
            ("agent_scratchpad", agent_scratchpad),
            ("user_message", user_message),
        ]);
        let role = self.config.role_for("messenger");
        let dispatch = call(role, "messenger", rendered, ctx);
        let (output, details) = self.dispatcher.dispatch_structured(dispatch, ctx.status).await?;
        Ok((output, details))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intent_round_trips_through_json() {
        let json = r#"{"intent":"start_research","response_to_user":"ok","thoughts":""}"#;
        let parsed: MessengerOutput = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.intent, Intent::StartResearch);
        assert!(parsed.extracted_content.is_none());
    }
}
