use serde::Deserialize;
use vantage_core::llm::Usage;

#[derive(Debug, Deserialize)]
pub struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<UsagePayload>,
}

impl ChatCompletionResponse {
    pub(crate) fn into_primary(self) -> Option<(ChatMessage, Option<Usage>)> {
        let usage = self.usage.map(UsagePayload::into_usage);
        self.choices
            .into_iter()
            .next()
            .map(|choice| (choice.message, usage))
    }
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize, Default)]
pub struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<ChatToolCall>,
}

impl ChatMessage {
    pub(crate) fn into_parts(self) -> (Option<String>, Vec<ChatToolCall>) {
        (self.content, self.tool_calls)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChatToolCall {
    pub(crate) id: String,
    pub(crate) function: ChatToolFunction,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChatToolFunction {
    pub(crate) name: String,
    pub(crate) arguments: String,
}

#[derive(Debug, Deserialize)]
struct UsagePayload {
    #[serde(default)]
    prompt_tokens: Option<u32>,
    #[serde(default)]
    completion_tokens: Option<u32>,
    #[serde(default)]
    total_tokens: Option<u32>,
}

impl UsagePayload {
    fn into_usage(self) -> Usage {
        let total = self
            .total_tokens
            .or_else(|| match (self.prompt_tokens, self.completion_tokens) {
                (Some(p), Some(c)) => Some(p + c),
                _ => None,
            });
        Usage {
            prompt_tokens: self.prompt_tokens,
            completion_tokens: self.completion_tokens,
            total_tokens: total,
            cost_usd: None,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ErrorEnvelope {
    pub error: ErrorBody,
}

#[derive(Debug, Deserialize)]
pub struct ErrorBody {
    pub message: String,
}
