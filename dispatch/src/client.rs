use crate::{
    DEEPSEEK_BASE_URL, DEFAULT_BASE_URL, DEFAULT_EMBEDDING_DIM, DEFAULT_EMBEDDING_MODEL,
    DEFAULT_MODEL, OPENROUTER_BASE_URL,
    error::DispatchError,
    request::{ChatCompletionRequest, ChatMessagePayload, ChatToolCallPayload, ChatToolFunctionPayload, convert_tools, to_chat_messages},
    response::{ChatCompletionResponse, ErrorEnvelope},
};
use vantage_core::{
    LanguageModel,
    llm::{
        Event, LLMRequest, LLMRequestWithTools, Usage,
        model::{Ability, Profile as ModelProfile},
        oneshot,
        tool::{ToolDefinition, Tools},
    },
};
use futures_core::Stream;
use reqwest::{Client, StatusCode};
use std::{future::Future, pin::Pin, sync::Arc};

const MAX_TOOL_ITERATIONS: usize = 8;

type BoxedEventStream<'a> = Pin<Box<dyn Stream<Item = Result<Event, DispatchError>> + Send + 'a>>;

/// `OpenAI`-compatible chat completions client.
///
/// Streaming token-by-token output is a non-goal of this dispatcher: each call buffers
/// the full completion and replays it as a small, bounded number of [`Event`]s so the
/// [`LanguageModel`] interface stays uniform across providers.
#[derive(Clone, Debug)]
pub struct OpenAI {
    inner: Arc<Config>,
}

/// Which `OpenAI`-compatible API surface to call. Only `ChatCompletions` is implemented;
/// the variant exists so a future Responses-API backend can be added without breaking
/// callers that match on it.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ApiKind {
    /// Legacy (but universally supported) `chat/completions` endpoint.
    ChatCompletions,
}

impl OpenAI {
    /// Creates a new client using the provided API key and default model.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::builder(api_key).build()
    }

    /// Creates a client configured for [`Deepseek`](https://api-docs.deepseek.com)'s endpoint.
    pub fn deepseek(api_key: impl Into<String>) -> Self {
        Self::builder(api_key).base_url(DEEPSEEK_BASE_URL).build()
    }

    /// Creates a client configured for [`OpenRouter`](https://openrouter.ai)'s endpoint.
    pub fn openrouter(api_key: impl Into<String>) -> Self {
        Self::builder(api_key).base_url(OPENROUTER_BASE_URL).build()
    }

    /// Starts building an [`OpenAI`] client with custom configuration.
    #[must_use]
    pub fn builder(api_key: impl Into<String>) -> Builder {
        Builder::new(api_key)
    }

    /// Overrides the default chat model in-place.
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        Arc::make_mut(&mut self.inner).chat_model = sanitize_model(model);
        self
    }

    /// Overrides the REST base URL (useful for OpenAI-compatible endpoints).
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        Arc::make_mut(&mut self.inner).base_url = base_url.into();
        self
    }

    /// Overrides the embeddings model identifier.
    #[must_use]
    pub fn with_embedding_model(mut self, model: impl Into<String>) -> Self {
        let model = sanitize_model(model);
        let cfg = Arc::make_mut(&mut self.inner);
        cfg.embedding_model = model;
        if let Some(dim) = infer_embedding_dim(&cfg.embedding_model) {
            cfg.embedding_dimensions = dim;
        }
        self
    }

    /// Overrides the embedding vector dimension (defaults depend on model).
    #[must_use]
    pub fn with_embedding_dimensions(mut self, dimensions: usize) -> Self {
        Arc::make_mut(&mut self.inner).embedding_dimensions = dimensions;
        self
    }

    pub(crate) fn config(&self) -> Arc<Config> {
        self.inner.clone()
    }
}

impl LanguageModel for OpenAI {
    type Error = DispatchError;

    fn respond(&self, request: LLMRequest) -> impl Stream<Item = Result<Event, Self::Error>> + Send {
        let cfg = self.inner.clone();
        let (messages, parameters, tool_definitions) = request.into_parts();
        let snapshot = crate::request::ParameterSnapshot::from(&parameters);
        let payload_messages = to_chat_messages(&messages);
        let stream: BoxedEventStream<'_> = Box::pin(chat_completions_tool_loop(
            cfg,
            payload_messages,
            snapshot,
            tool_definitions,
            None,
        ));
        stream
    }

    fn respond_with_tools(
        &self,
        request: LLMRequestWithTools<'_>,
    ) -> impl Stream<Item = Result<Event, Self::Error>> + Send {
        let cfg = self.inner.clone();
        let (inner, tools) = request.into_parts();
        let (messages, parameters, tool_definitions) = inner.into_parts();
        let snapshot = crate::request::ParameterSnapshot::from(&parameters);
        let payload_messages = to_chat_messages(&messages);
        let stream: BoxedEventStream<'_> = Box::pin(chat_completions_tool_loop(
            cfg,
            payload_messages,
            snapshot,
            tool_definitions,
            Some(tools),
        ));
        stream
    }

    fn complete(&self, prefix: &str) -> impl Stream<Item = Result<Event, Self::Error>> + Send {
        self.respond(oneshot(
            "Continue the user provided text without additional commentary.",
            prefix,
        ))
    }

    fn profile(&self) -> impl Future<Output = ModelProfile> + Send {
        let cfg = self.inner.clone();
        async move {
            let mut profile = ModelProfile::new(
                cfg.chat_model.clone(),
                "openai",
                cfg.chat_model.clone(),
                "OpenAI-compatible chat model",
                128_000,
            )
            .with_ability(Ability::ToolUse);
            for ability in &cfg.native_abilities {
                if !profile.abilities.contains(ability) {
                    profile = profile.with_ability(*ability);
                }
            }
            profile
        }
    }
}

/// Drives a single-conversation tool-calling loop against `/chat/completions`.
///
/// Each iteration sends the accumulated conversation, and if the model responds with
/// tool calls, executes them against `tools` and feeds the results back for another
/// round. Bails out after [`MAX_TOOL_ITERATIONS`] so a misbehaving model (or a tool
/// stuck producing calls) can't loop forever.
fn chat_completions_tool_loop<'tools>(
    cfg: Arc<Config>,
    payload_messages: Vec<ChatMessagePayload>,
    snapshot: crate::request::ParameterSnapshot,
    tool_definitions: Vec<ToolDefinition>,
    tools: Option<&'tools mut Tools>,
) -> impl Stream<Item = Result<Event, DispatchError>> + Send + 'tools {
    enum State<'tools> {
        Processing {
            iterations: usize,
            messages: Vec<ChatMessagePayload>,
            tools: Option<&'tools mut Tools>,
        },
        ReplayUsage(Usage),
        Done,
    }

    let openai_tools = if tool_definitions.is_empty() {
        None
    } else {
        Some(convert_tools(&tool_definitions))
    };

    futures_lite::stream::unfold(
        State::Processing {
            iterations: 0,
            messages: payload_messages,
            tools,
        },
        move |state| {
            let cfg = cfg.clone();
            let snapshot = snapshot.clone();
            let openai_tools = openai_tools.clone();

            async move {
                let (iterations, mut messages, mut tools) = match state {
                    State::Processing {
                        iterations,
                        messages,
                        tools,
                    } => (iterations, messages, tools),
                    State::ReplayUsage(usage) => {
                        return Some((Ok(Event::Usage(usage)), State::Done));
                    }
                    State::Done => return None,
                };

                let next_iteration = iterations + 1;
                if next_iteration > MAX_TOOL_ITERATIONS {
                    return Some((
                        Err(DispatchError::Api(
                            "exceeded tool calling iteration limit".into(),
                        )),
                        State::Done,
                    ));
                }

                let request = ChatCompletionRequest::new(
                    cfg.chat_model.clone(),
                    messages.clone(),
                    &snapshot,
                    openai_tools.clone(),
                );

                let response = match send_chat_completion(&cfg, &request).await {
                    Ok(response) => response,
                    Err(err) => return Some((Err(err), State::Done)),
                };

                let Some((message, usage)) = response.into_primary() else {
                    return Some((
                        Err(DispatchError::Api(
                            "chat completion response missing message".into(),
                        )),
                        State::Done,
                    ));
                };

                let (content, tool_calls) = message.into_parts();

                if !tool_calls.is_empty() {
                    let Some(tool_registry) = &mut tools else {
                        return Some((
                            Err(DispatchError::Api(
                                "tool call requested but no tools available".into(),
                            )),
                            State::Done,
                        ));
                    };

                    let tool_payloads: Vec<ChatToolCallPayload> = tool_calls
                        .iter()
                        .map(|call| ChatToolCallPayload {
                            id: call.id.clone(),
                            kind: "function",
                            function: ChatToolFunctionPayload {
                                name: call.function.name.clone(),
                                arguments: call.function.arguments.clone(),
                            },
                        })
                        .collect();

                    messages.push(ChatMessagePayload::assistant_tool_calls(
                        content.unwrap_or_default(),
                        tool_payloads,
                    ));

                    for call in tool_calls {
                        let output = match tool_registry
                            .call(&call.function.name, &call.function.arguments)
                            .await
                        {
                            Ok(output) => output,
                            Err(err) => {
                                return Some((Err(DispatchError::Api(err.to_string())), State::Done));
                            }
                        };
                        messages.push(ChatMessagePayload::tool_output(call.id, output));
                    }

                    return Some((
                        Ok(Event::text("")),
                        State::Processing {
                            iterations: next_iteration,
                            messages,
                            tools,
                        },
                    ));
                }

                let text_event = Ok(Event::text(content.unwrap_or_default()));
                if let Some(usage) = usage {
                    return Some((text_event, State::ReplayUsage(usage)));
                }

                Some((text_event, State::Done))
            }
        },
    )
}

impl Builder {}

/// Builder for [`OpenAI`] clients.
#[derive(Debug)]
pub struct Builder {
    api_key: String,
    base_url: String,
    api_kind: ApiKind,
    chat_model: String,
    embedding_model: String,
    embedding_dimensions: usize,
    organization: Option<String>,
    native_abilities: Vec<Ability>,
}

impl Builder {
    fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            api_kind: ApiKind::ChatCompletions,
            chat_model: DEFAULT_MODEL.to_string(),
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
            embedding_dimensions: DEFAULT_EMBEDDING_DIM,
            organization: None,
            native_abilities: Vec::new(),
        }
    }

    /// Sets a custom API base URL.
    #[must_use]
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Selects a model identifier (e.g., `gpt-5-mini`, `o1-mini`).
    #[must_use]
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.chat_model = sanitize_model(model);
        self
    }

    /// Selects the embeddings model identifier.
    #[must_use]
    pub fn embedding_model(mut self, model: impl Into<String>) -> Self {
        let model = sanitize_model(model);
        if let Some(dim) = infer_embedding_dim(&model) {
            self.embedding_dimensions = dim;
        }
        self.embedding_model = model;
        self
    }

    /// Overrides the embedding vector dimension.
    #[must_use]
    pub const fn embedding_dimensions(mut self, dimensions: usize) -> Self {
        self.embedding_dimensions = dimensions;
        self
    }

    /// Attaches an `OpenAI` organization header.
    #[must_use]
    pub fn organization(mut self, organization: impl Into<String>) -> Self {
        self.organization = Some(organization.into());
        self
    }

    /// Declares extra native capabilities (e.g., web search) supported by the upstream model.
    #[must_use]
    pub fn native_capabilities(mut self, abilities: impl IntoIterator<Item = Ability>) -> Self {
        for ability in abilities {
            if !self.native_abilities.contains(&ability) {
                self.native_abilities.push(ability);
            }
        }
        self
    }

    /// Marks this model as having built-in web search support.
    #[must_use]
    pub fn enable_native_web_search(self) -> Self {
        self.native_capabilities([Ability::WebSearch])
    }

    /// Consumes the builder and creates an [`OpenAI`] client.
    #[must_use]
    pub fn build(self) -> OpenAI {
        OpenAI {
            inner: Arc::new(Config {
                http: Client::new(),
                api_key: self.api_key,
                base_url: self.base_url,
                api_kind: self.api_kind,
                chat_model: self.chat_model,
                embedding_model: self.embedding_model,
                embedding_dimensions: self.embedding_dimensions,
                organization: self.organization,
                native_abilities: self.native_abilities,
            }),
        }
    }
}

#[derive(Debug)]
pub struct Config {
    http: Client,
    pub(crate) api_key: String,
    pub(crate) base_url: String,
    #[allow(dead_code)]
    pub(crate) api_kind: ApiKind,
    pub(crate) chat_model: String,
    pub(crate) embedding_model: String,
    pub(crate) embedding_dimensions: usize,
    pub(crate) organization: Option<String>,
    pub(crate) native_abilities: Vec<Ability>,
}

impl Clone for Config {
    fn clone(&self) -> Self {
        Self {
            http: self.http.clone(),
            api_key: self.api_key.clone(),
            base_url: self.base_url.clone(),
            api_kind: self.api_kind,
            chat_model: self.chat_model.clone(),
            embedding_model: self.embedding_model.clone(),
            embedding_dimensions: self.embedding_dimensions,
            organization: self.organization.clone(),
            native_abilities: self.native_abilities.clone(),
        }
    }
}

impl Config {
    pub(crate) fn request_url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    pub(crate) fn request_auth(&self) -> String {
        format!("Bearer {}", self.api_key)
    }

    pub(crate) fn http(&self) -> &Client {
        &self.http
    }
}

pub(crate) async fn send_chat_completion(
    cfg: &Config,
    request: &ChatCompletionRequest,
) -> Result<ChatCompletionResponse, DispatchError> {
    let mut builder = cfg
        .http
        .post(cfg.request_url("/chat/completions"))
        .header(reqwest::header::AUTHORIZATION, cfg.request_auth())
        .header(reqwest::header::USER_AGENT, "vantage-dispatch/0.1")
        .json(request);
    if let Some(org) = &cfg.organization {
        builder = builder.header("OpenAI-Organization", org.clone());
    }

    let response = builder.send().await?;
    let status = response.status();
    if status.is_success() {
        return Ok(response.json::<ChatCompletionResponse>().await?);
    }

    let retry_after = response
        .headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok())
        .map(std::time::Duration::from_secs);
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorEnvelope>(&body)
        .map(|envelope| envelope.error.message)
        .unwrap_or(body);

    Err(match status {
        StatusCode::TOO_MANY_REQUESTS => DispatchError::RateLimit { message, retry_after },
        s if s.is_server_error() => DispatchError::ServerError { status: s.as_u16(), message },
        s => DispatchError::ClientError { status: s.as_u16(), message },
    })
}

fn sanitize_model(model: impl Into<String>) -> String {
    model.into().trim().to_string()
}

fn infer_embedding_dim(model: &str) -> Option<usize> {
    match model {
        "text-embedding-3-large" => Some(3072),
        "text-embedding-3-small" | "text-embedding-ada-002" => Some(1536),
        _ => None,
    }
}
