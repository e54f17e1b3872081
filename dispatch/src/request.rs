use vantage_core::llm::{
    Message, Role,
    model::{Parameters, ToolChoice},
    tool::ToolDefinition,
};
use serde::Serialize;
use serde_json::Value;

/// Owned snapshot of [`Parameters`] taken at request-build time.
///
/// Decoupling this from `&Parameters` lets the request builders stay `'static` and
/// keeps the wire payload construction independent of the caller's borrow.
#[derive(Clone)]
pub struct ParameterSnapshot {
    pub(crate) temperature: Option<f32>,
    pub(crate) max_tokens: Option<u32>,
    pub(crate) tool_choice: ToolChoice,
    pub(crate) include_reasoning: bool,
    pub(crate) structured_outputs: bool,
    pub(crate) websearch: bool,
    pub(crate) code_execution: bool,
}

impl From<&Parameters> for ParameterSnapshot {
    fn from(value: &Parameters) -> Self {
        Self {
            temperature: value.temperature,
            max_tokens: value.max_tokens,
            tool_choice: value.tool_choice.clone(),
            include_reasoning: value.include_reasoning,
            structured_outputs: value.structured_outputs,
            websearch: value.websearch,
            code_execution: value.code_execution,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessagePayload>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_completion_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<ToolPayload>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<ToolChoicePayload>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormatPayload>,
}

impl ChatCompletionRequest {
    pub(crate) fn new(
        model: String,
        messages: Vec<ChatMessagePayload>,
        params: &ParameterSnapshot,
        tools: Option<Vec<ToolPayload>>,
    ) -> Self {
        let has_tools = tools.as_ref().is_some_and(|t| !t.is_empty());
        Self {
            model,
            messages,
            stream: false,
            temperature: params.temperature,
            max_completion_tokens: params.max_tokens,
            tools,
            tool_choice: tool_choice(params, has_tools),
            response_format: response_format(params),
        }
    }
}

#[derive(Debug, Serialize, Clone)]
pub struct ChatMessagePayload {
    role: &'static str,
    content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<ChatToolCallPayload>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

#[derive(Debug, Serialize, Clone)]
pub struct ToolPayload {
    r#type: &'static str,
    function: ToolFunction,
}

#[derive(Debug, Serialize, Clone)]
struct ToolFunction {
    name: String,
    description: String,
    parameters: Value,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum ToolChoicePayload {
    Mode(&'static str),
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ResponseFormatPayload {
    JsonObject,
}

pub fn to_chat_messages(messages: &[Message]) -> Vec<ChatMessagePayload> {
    messages
        .iter()
        .map(|message| ChatMessagePayload {
            role: match message.role() {
                Role::User => "user",
                Role::Assistant => "assistant",
                Role::System => "system",
                Role::Tool => "tool",
            },
            content: flatten_content(message),
            tool_calls: if message.tool_calls().is_empty() {
                None
            } else {
                Some(
                    message
                        .tool_calls()
                        .iter()
                        .map(|call| ChatToolCallPayload {
                            id: call.id.clone(),
                            kind: "function",
                            function: ChatToolFunctionPayload {
                                name: call.name.clone(),
                                arguments: call.arguments_json(),
                            },
                        })
                        .collect(),
                )
            },
            tool_call_id: message.tool_call_id().map(ToOwned::to_owned),
        })
        .collect()
}

fn flatten_content(message: &Message) -> String {
    let mut content = message.content().to_owned();
    if !message.attachments().is_empty() {
        content.push_str("\n\nAttachments:\n");
        for attachment in message.attachments() {
            content.push_str("- ");
            content.push_str(attachment.as_str());
            content.push('\n');
        }
    }
    content
}

pub fn convert_tools(definitions: &[ToolDefinition]) -> Vec<ToolPayload> {
    definitions
        .iter()
        .map(|tool| ToolPayload {
            r#type: "function",
            function: ToolFunction {
                name: tool.name().to_string(),
                description: tool.description().to_string(),
                parameters: serde_json::to_value(tool.arguments_schema())
                    .unwrap_or(Value::Object(serde_json::Map::new())),
            },
        })
        .collect()
}

fn tool_choice(params: &ParameterSnapshot, has_tools: bool) -> Option<ToolChoicePayload> {
    if !has_tools {
        return None;
    }
    match &params.tool_choice {
        ToolChoice::Auto => None,
        ToolChoice::None => Some(ToolChoicePayload::Mode("none")),
        ToolChoice::Required => Some(ToolChoicePayload::Mode("required")),
        ToolChoice::Named(_) => None,
    }
}

fn response_format(params: &ParameterSnapshot) -> Option<ResponseFormatPayload> {
    if params.structured_outputs {
        Some(ResponseFormatPayload::JsonObject)
    } else {
        None
    }
}

#[derive(Debug, Serialize, Clone)]
pub struct ChatToolCallPayload {
    pub(crate) id: String,
    #[serde(rename = "type")]
    pub(crate) kind: &'static str,
    pub(crate) function: ChatToolFunctionPayload,
}

#[derive(Debug, Serialize, Clone)]
pub struct ChatToolFunctionPayload {
    pub(crate) name: String,
    pub(crate) arguments: String,
}

impl ChatMessagePayload {
    pub(crate) fn tool_output(call_id: String, output: String) -> Self {
        Self {
            role: "tool",
            content: output,
            tool_calls: None,
            tool_call_id: Some(call_id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vantage_core::llm::model::Parameters;

    #[test]
    fn json_object_when_structured_outputs_requested() {
        let params = Parameters {
            structured_outputs: true,
            ..Parameters::default()
        };
        let snapshot = ParameterSnapshot::from(&params);
        let req = ChatCompletionRequest::new("gpt-5".into(), Vec::new(), &snapshot, None);
        let value = serde_json::to_value(&req).expect("serialize chat request");
        assert_eq!(value["response_format"]["type"], "json_object");
    }

    #[test]
    fn tool_choice_omitted_without_tools() {
        let params = Parameters::default();
        let snapshot = ParameterSnapshot::from(&params);
        let req = ChatCompletionRequest::new("gpt-5".into(), Vec::new(), &snapshot, None);
        let value = serde_json::to_value(&req).expect("serialize chat request");
        assert!(value.get("tool_choice").is_none());
    }
}
