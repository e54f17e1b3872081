//! The Model Dispatcher (design §4.2): a role-based façade over one or more
//! `OpenAI`-compatible endpoints, with retry/backoff, cooperative
//! cancellation, and cost accounting.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_lite::StreamExt;
use rand::Rng;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use schemars::JsonSchema;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tokio::sync::OnceCell;
use vantage_core::LanguageModel;
use vantage_core::llm::provider::LanguageModelProvider;
use vantage_core::llm::{Event, LLMRequest, Message, Usage, model::Parameters, tool::ToolDefinition};

use crate::error::DispatchError;
use crate::provider::OpenAIProvider;
use crate::role::{AgentRole, RoleModelConfig, RoleTable};

/// Token/cost accounting for one model call — the `model_call_details` object
/// design §4.2 asks the dispatcher to emit.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct ModelCallDetails {
    pub agent_name: String,
    pub role: String,
    pub model: String,
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub native_tokens: u32,
    pub cost_usd: f64,
    pub duration_sec: f64,
}

/// Cooperative-cancellation hook: polled before every dispatched call so a
/// stopped/failed mission doesn't spend further money. Implemented by
/// `vantage_mission::store::MissionStore`; defined here so this crate never
/// has to depend back on `vantage-mission`.
pub trait MissionStatusSource: Send + Sync {
    /// Returns `false` once the named mission has left the running state.
    fn is_running(&self, mission_id: &str) -> bool;
}

/// A chat-completion call to dispatch, already resolved against an [`AgentRole`].
#[derive(Debug, Clone)]
pub struct DispatchCall {
    pub role: AgentRole,
    pub agent_name: String,
    pub mission_id: Option<String>,
    pub messages: Vec<Message>,
    pub tool_definitions: Vec<ToolDefinition>,
}

impl DispatchCall {
    #[must_use]
    pub fn new(role: AgentRole, agent_name: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            role,
            agent_name: agent_name.into(),
            mission_id: None,
            messages,
            tool_definitions: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_mission(mut self, mission_id: impl Into<String>) -> Self {
        self.mission_id = Some(mission_id.into());
        self
    }

    #[must_use]
    pub fn with_tools(mut self, tool_definitions: Vec<ToolDefinition>) -> Self {
        self.tool_definitions = tool_definitions;
        self
    }
}

/// Retry/timeout policy applied uniformly across roles.
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    pub max_retries: u32,
    pub retry_delay: Duration,
    pub request_timeout: Duration,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_delay: Duration::from_secs(1),
            request_timeout: Duration::from_secs(120),
        }
    }
}

type PriceMap = BTreeMap<String, ModelPrice>;

#[derive(Debug, Clone, Copy, Deserialize)]
struct ModelPrice {
    /// USD per input token.
    prompt: f64,
    /// USD per output token.
    completion: f64,
}

/// Lazily-fetched, cached `model -> price` table for providers that expose a
/// pricing endpoint (design §4.2.4: "lazily fetch a models→price map").
#[derive(Default)]
struct PriceCache {
    by_provider: tokio::sync::Mutex<BTreeMap<String, Arc<OnceCell<PriceMap>>>>,
}

impl PriceCache {
    async fn get_or_fetch(&self, client: &reqwest::Client, provider: &OpenAIProvider) -> Option<Arc<PriceMap>> {
        if provider.name() != "openrouter" {
            // Only the pricing-capable provider in this stack exposes a models→price map.
            return None;
        }
        let cell = {
            let mut guard = self.by_provider.lock().await;
            guard
                .entry(provider.name().to_string())
                .or_insert_with(|| Arc::new(OnceCell::new()))
                .clone()
        };
        let map = cell
            .get_or_init(|| fetch_price_map(client, provider.base_url()))
            .await;
        Some(Arc::new(map.clone()))
    }
}

async fn fetch_price_map(client: &reqwest::Client, base_url: &str) -> PriceMap {
    #[derive(Deserialize)]
    struct ModelsResponse {
        data: Vec<ModelEntry>,
    }
    #[derive(Deserialize)]
    struct ModelEntry {
        id: String,
        pricing: Option<ModelPrice>,
    }

    let url = format!("{base_url}/models");
    let fetched = async {
        let response = client.get(&url).send().await.ok()?;
        let body: ModelsResponse = response.json().await.ok()?;
        Some(body)
    }
    .await;

    fetched
        .map(|body| {
            body.data
                .into_iter()
                .filter_map(|entry| entry.pricing.map(|p| (entry.id, p)))
                .collect()
        })
        .unwrap_or_default()
}

/// Role-based LLM invocation façade (design §4.2, component C1).
///
/// Resolves `agent_mode -> (provider, model, max_tokens, temperature)` via a
/// [`RoleTable`], issues the call against the matching [`OpenAIProvider`],
/// retries transient failures with exponential backoff and jitter, and
/// returns `(text, ModelCallDetails)` so callers can both parse the response
/// and fold the accounting into mission stats.
pub struct ModelDispatcher {
    role_table: RoleTable,
    providers: BTreeMap<String, OpenAIProvider>,
    config: DispatcherConfig,
    prices: PriceCache,
    http: reqwest::Client,
}

impl ModelDispatcher {
    #[must_use]
    pub fn new(role_table: RoleTable, providers: Vec<OpenAIProvider>, config: DispatcherConfig) -> Self {
        let providers = providers.into_iter().map(|p| (p.name().to_string(), p)).collect();
        Self {
            role_table,
            providers,
            config,
            prices: PriceCache::default(),
            http: reqwest::Client::new(),
        }
    }

    /// Dispatches a call and returns the raw text content alongside accounting.
    ///
    /// Retries transient failures ([`DispatchError::is_transient`]) up to
    /// `max_retries` times with exponential backoff plus 0–10% jitter. Definite
    /// 4xx errors and a mission observed as no-longer-running are surfaced
    /// immediately without retrying.
    pub async fn dispatch_text(
        &self,
        call: DispatchCall,
        status: Option<&dyn MissionStatusSource>,
    ) -> Result<(String, ModelCallDetails), DispatchError> {
        let role_config = self
            .role_table
            .get(call.role)
            .ok_or(DispatchError::UnconfiguredRole(call.role))?;
        let provider = self
            .providers
            .get(&role_config.provider)
            .ok_or_else(|| DispatchError::UnknownProvider(role_config.provider.clone()))?;
        let model = provider.model(role_config.model.clone());

        let mut attempt: u32 = 0;
        loop {
            if let Some(mission_id) = &call.mission_id {
                if let Some(status) = status {
                    if !status.is_running(mission_id) {
                        return Err(DispatchError::Cancelled(mission_id.clone()));
                    }
                }
            }

            let started = Instant::now();
            let outcome = self.call_once(&model, &call, role_config).await;
            let duration_sec = started.elapsed().as_secs_f64();

            match outcome {
                Ok((text, usage)) => {
                    let prices = self.prices.get_or_fetch(&self.http, provider).await;
                    let cost_usd = prices
                        .as_ref()
                        .and_then(|prices| prices.get(&role_config.model))
                        .and_then(|price| compute_cost(price, &usage))
                        .unwrap_or(0.0);

                    let details = ModelCallDetails {
                        agent_name: call.agent_name.clone(),
                        role: format!("{:?}", call.role).to_lowercase(),
                        model: role_config.model.clone(),
                        prompt_tokens: usage.prompt_tokens.unwrap_or(0),
                        completion_tokens: usage.completion_tokens.unwrap_or(0),
                        native_tokens: usage.total_tokens.unwrap_or(0),
                        cost_usd,
                        duration_sec,
                    };
                    return Ok((text, details));
                }
                Err(err) if err.is_transient() && attempt < self.config.max_retries => {
                    attempt += 1;
                    tokio::time::sleep(backoff_with_jitter(self.config.retry_delay, attempt)).await;
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Dispatches a call and deserializes the response as `T`, using the same
    /// recovery strategies as [`vantage_core::LanguageModel::generate`]
    /// (code-fence stripping, embedded-block extraction) since this dispatcher
    /// buffers raw text rather than delegating to `generate` (which would
    /// discard the [`Usage`] event needed for accounting).
    pub async fn dispatch_structured<T>(
        &self,
        call: DispatchCall,
        status: Option<&dyn MissionStatusSource>,
    ) -> Result<(T, ModelCallDetails), DispatchError>
    where
        T: JsonSchema + DeserializeOwned + 'static,
    {
        let (text, details) = self.dispatch_text(call, status).await?;
        let value = parse_structured::<T>(&text).map_err(DispatchError::StructuredOutput)?;
        Ok((value, details))
    }

    async fn call_once(
        &self,
        model: &crate::client::OpenAI,
        call: &DispatchCall,
        role_config: &RoleModelConfig,
    ) -> Result<(String, Usage), DispatchError> {
        let parameters = Parameters::default()
            .with_temperature(role_config.temperature)
            .with_max_tokens(role_config.max_tokens);
        let request = LLMRequest::new(call.messages.clone())
            .with_tool_definitions(call.tool_definitions.clone())
            .with_parameters(parameters);

        let response = tokio::time::timeout(self.config.request_timeout, collect_with_usage(model, request))
            .await
            .map_err(|_| DispatchError::Timeout)??;

        let (text, usage, has_tool_call) = response;
        if text.trim().is_empty() && !has_tool_call {
            return Err(DispatchError::EmptyResponse);
        }
        Ok((text, usage.unwrap_or(Usage::new(0, 0))))
    }
}

async fn collect_with_usage(
    model: &crate::client::OpenAI,
    request: LLMRequest,
) -> Result<(String, Option<Usage>, bool), DispatchError> {
    let mut stream = Box::pin(model.respond(request));
    let mut text = String::new();
    let mut usage = None;
    let mut has_tool_call = false;
    while let Some(event) = stream.next().await {
        match event? {
            Event::Text(chunk) => text.push_str(&chunk),
            Event::Usage(u) => usage = Some(u),
            Event::ToolCall(_) => has_tool_call = true,
            Event::Reasoning(_) | Event::BuiltInToolResult { .. } => {}
        }
    }
    Ok((text, usage, has_tool_call))
}

/// Exponential backoff with 0-10% jitter, matching design §4.2's retry policy.
fn backoff_with_jitter(base: Duration, attempt: u32) -> Duration {
    let exponent = attempt.saturating_sub(1).min(6);
    let backoff = base.saturating_mul(1u32 << exponent);
    let jitter_fraction = rand::thread_rng().gen_range(0.0..0.10);
    backoff.mul_f64(1.0 + jitter_fraction)
}

fn compute_cost(price: &ModelPrice, usage: &Usage) -> Option<f64> {
    let prompt = Decimal::from_f64_retain(price.prompt)?;
    let completion = Decimal::from_f64_retain(price.completion)?;
    let prompt_tokens = Decimal::from(usage.prompt_tokens.unwrap_or(0));
    let completion_tokens = Decimal::from(usage.completion_tokens.unwrap_or(0));
    let total = prompt * prompt_tokens + completion * completion_tokens;
    total.to_f64()
}

/// Parses structured JSON output, with the same fallback ladder `vantage-core`
/// applies internally: raw parse, code-fence-stripped, embedded `{...}`/`[...]`
/// block, dequoted string.
fn parse_structured<T: DeserializeOwned>(raw: &str) -> Result<T, String> {
    let trimmed = raw.trim();
    let mut candidates = vec![trimmed.to_string()];
    if let Some(fenced) = strip_code_fence(trimmed) {
        candidates.push(fenced);
    }
    if let Some(block) = extract_json_block(trimmed) {
        candidates.push(block);
    }

    let mut last_err = None;
    for candidate in candidates {
        match serde_json::from_str::<T>(&candidate) {
            Ok(value) => return Ok(value),
            Err(err) => last_err = Some(err),
        }
    }
    Err(last_err.map_or_else(
        || "empty structured output".to_string(),
        |err| format!("{err} (sample: {:.200})", trimmed),
    ))
}

fn strip_code_fence(raw: &str) -> Option<String> {
    let start = raw.find("```")?;
    let after = &raw[start + 3..];
    let body = after.splitn(2, '\n').nth(1)?;
    let end = body.rfind("```").unwrap_or(body.len());
    let content = body[..end].trim();
    (!content.is_empty()).then(|| content.to_string())
}

fn extract_json_block(raw: &str) -> Option<String> {
    let (open, close) = if raw.contains('{') { ('{', '}') } else { ('[', ']') };
    let start = raw.find(open)?;
    let end = raw.rfind(close)?;
    (end >= start).then(|| raw[start..=end].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Deserialize, JsonSchema, PartialEq)]
    struct Foo {
        a: u8,
    }

    #[test]
    fn backoff_grows_and_jitters_within_bounds() {
        let base = Duration::from_millis(100);
        let d1 = backoff_with_jitter(base, 1);
        let d3 = backoff_with_jitter(base, 3);
        assert!(d1 >= base && d1 <= base.mul_f64(1.10));
        assert!(d3 > d1);
    }

    #[test]
    fn parses_plain_and_fenced_json() {
        let foo: Foo = parse_structured(r#"{"a": 1}"#).unwrap();
        assert_eq!(foo, Foo { a: 1 });

        let foo: Foo = parse_structured("```json\n{\"a\": 2}\n```").unwrap();
        assert_eq!(foo, Foo { a: 2 });

        let foo: Foo = parse_structured("here you go: {\"a\": 3} thanks").unwrap();
        assert_eq!(foo, Foo { a: 3 });
    }

    #[test]
    fn cost_computation_uses_decimal_precision() {
        let price = ModelPrice { prompt: 0.000_001_5, completion: 0.000_006 };
        let usage = Usage::new(1000, 500);
        let cost = compute_cost(&price, &usage).unwrap();
        assert!((cost - (0.000_001_5 * 1000.0 + 0.000_006 * 500.0)).abs() < 1e-9);
    }
}
