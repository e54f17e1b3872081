//! Model capability profiles and per-call sampling parameters.

use alloc::{
    string::{String, ToString},
    vec::Vec,
};

/// A capability a language model may natively support.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Ability {
    /// Function/tool calling.
    ToolUse,
    /// Native structured (JSON schema-constrained) output.
    StructuredOutput,
    /// Built-in web search.
    WebSearch,
    /// Built-in code execution / interpreter.
    CodeExecution,
    /// Native PDF/document understanding.
    Pdf,
    /// Vision / image understanding.
    Vision,
}

/// Static metadata describing a model: identity, context window, and abilities.
#[derive(Debug, Clone)]
pub struct Profile {
    /// Canonical model identifier as used in API calls.
    pub id: String,
    /// Name of the provider serving this model.
    pub provider: String,
    /// Human-readable display name.
    pub name: String,
    /// One-line description of the model.
    pub description: String,
    /// Maximum context window in tokens.
    pub context_window: u32,
    /// Abilities this model natively supports.
    pub abilities: Vec<Ability>,
}

impl Profile {
    /// Creates a new profile with no abilities set.
    pub fn new(
        id: impl Into<String>,
        provider: impl Into<String>,
        name: impl Into<String>,
        description: impl Into<String>,
        context_window: u32,
    ) -> Self {
        Self {
            id: id.into(),
            provider: provider.into(),
            name: name.into(),
            description: description.into(),
            context_window,
            abilities: Vec::new(),
        }
    }

    /// Adds an ability to this profile, builder-style.
    #[must_use]
    pub fn with_ability(mut self, ability: Ability) -> Self {
        if !self.abilities.contains(&ability) {
            self.abilities.push(ability);
        }
        self
    }

    /// Returns `true` if this model advertises the given ability.
    #[must_use]
    pub fn supports(&self, ability: Ability) -> bool {
        self.abilities.contains(&ability)
    }
}

impl ToString for Ability {
    fn to_string(&self) -> String {
        match self {
            Self::ToolUse => "tool_use",
            Self::StructuredOutput => "structured_output",
            Self::WebSearch => "web_search",
            Self::CodeExecution => "code_execution",
            Self::Pdf => "pdf",
            Self::Vision => "vision",
        }
        .to_string()
    }
}

/// How the model should choose whether/which tool to call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ToolChoice {
    /// Let the model decide.
    #[default]
    Auto,
    /// Disallow tool calls entirely.
    None,
    /// Force the model to call a tool.
    Required,
    /// Force a specific named tool.
    Named(String),
}

/// Sampling and generation parameters for a single [`super::LLMRequest`].
#[derive(Debug, Clone)]
pub struct Parameters {
    /// Sampling temperature, typically `0.0..=2.0`.
    pub temperature: Option<f32>,
    /// Maximum tokens to generate.
    pub max_tokens: Option<u32>,
    /// Whether to ask the provider to emit a reasoning/thinking trace.
    pub include_reasoning: bool,
    /// Whether this call requires schema-constrained structured output.
    pub structured_outputs: bool,
    /// Whether to enable the provider's built-in web search tool.
    pub websearch: bool,
    /// Whether to enable the provider's built-in code execution tool.
    pub code_execution: bool,
    /// Tool selection strategy.
    pub tool_choice: ToolChoice,
}

impl Default for Parameters {
    fn default() -> Self {
        Self {
            temperature: None,
            max_tokens: None,
            include_reasoning: false,
            structured_outputs: false,
            websearch: false,
            code_execution: false,
            tool_choice: ToolChoice::Auto,
        }
    }
}

impl Parameters {
    /// Sets the sampling temperature.
    #[must_use]
    pub const fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Sets the max output tokens.
    #[must_use]
    pub const fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Requests a reasoning trace alongside the answer, if the model supports it.
    #[must_use]
    pub const fn include_reasoning(mut self, include: bool) -> Self {
        self.include_reasoning = include;
        self
    }

    /// Requests the provider's built-in web search tool.
    #[must_use]
    pub const fn with_websearch(mut self, enabled: bool) -> Self {
        self.websearch = enabled;
        self
    }

    /// Requests the provider's built-in code execution tool.
    #[must_use]
    pub const fn with_code_execution(mut self, enabled: bool) -> Self {
        self.code_execution = enabled;
        self
    }

    /// Sets the tool choice strategy.
    #[must_use]
    pub fn with_tool_choice(mut self, choice: ToolChoice) -> Self {
        self.tool_choice = choice;
        self
    }
}
