//! Provider-level metadata, distinct from a single model [`super::model::Profile`].

use alloc::string::String;

/// A named backend that serves one or more language models (e.g. an OpenAI-compatible
/// HTTP endpoint). Distinct from [`super::LanguageModel`], which represents one bound
/// model; a `LanguageModelProvider` is the thing you ask for a model by id.
pub trait LanguageModelProvider: Send + Sync {
    /// Stable identifier for this provider (`"openai"`, `"openrouter"`, ...).
    fn name(&self) -> &str;

    /// Base URL this provider sends requests to.
    fn base_url(&self) -> &str;
}

/// A minimal, owned [`LanguageModelProvider`] implementation for providers that are
/// fully described by a name and base URL (the common case for OpenAI-compatible
/// endpoints dispatched to by model identifier).
#[derive(Debug, Clone)]
pub struct NamedProvider {
    name: String,
    base_url: String,
}

impl NamedProvider {
    /// Creates a new named provider descriptor.
    pub fn new(name: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.into(),
        }
    }
}

impl LanguageModelProvider for NamedProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn base_url(&self) -> &str {
        &self.base_url
    }
}
