use crate::{DEEPSEEK_BASE_URL, DEFAULT_BASE_URL, OPENROUTER_BASE_URL, client::OpenAI};
use vantage_core::llm::LanguageModelProvider;
use std::sync::Arc;

/// Named `OpenAI`-compatible endpoint, capable of minting clients bound to a model id.
#[derive(Clone, Debug)]
pub struct OpenAIProvider {
    inner: Arc<ProviderConfig>,
}

impl OpenAIProvider {
    /// Creates a new provider targeting the official `OpenAI` API.
    #[must_use]
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(ProviderConfig {
                name: "openai".to_string(),
                api_key: api_key.into(),
                base_url: DEFAULT_BASE_URL.to_string(),
                organization: None,
            }),
        }
    }

    /// Convenience constructor targeting [`Deepseek`](https://api-docs.deepseek.com)'s API.
    #[must_use]
    pub fn deepseek(api_key: impl Into<String>) -> Self {
        Self::new(api_key)
            .base_url(DEEPSEEK_BASE_URL)
            .named("deepseek")
    }

    /// Convenience constructor targeting [`OpenRouter`](https://openrouter.ai)'s API.
    #[must_use]
    pub fn openrouter(api_key: impl Into<String>) -> Self {
        Self::new(api_key)
            .base_url(OPENROUTER_BASE_URL)
            .named("openrouter")
    }

    /// Overrides the provider's stable identifier (defaults to `"openai"`).
    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        Arc::make_mut(&mut self.inner).name = name.into();
        self
    }

    /// Overrides the REST base URL (useful for Azure or self-hosted gateways).
    #[must_use]
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        Arc::make_mut(&mut self.inner).base_url = url.into();
        self
    }

    /// Attaches an organization header to requests made by minted clients.
    #[must_use]
    pub fn organization(mut self, organization: impl Into<String>) -> Self {
        Arc::make_mut(&mut self.inner).organization = Some(organization.into());
        self
    }

    /// Mints a client bound to the given model id.
    #[must_use]
    pub fn model(&self, model: impl Into<String>) -> OpenAI {
        let mut builder = OpenAI::builder(self.inner.api_key.clone())
            .base_url(self.inner.base_url.clone())
            .model(model);
        if let Some(org) = &self.inner.organization {
            builder = builder.organization(org.clone());
        }
        builder.build()
    }
}

impl LanguageModelProvider for OpenAIProvider {
    fn name(&self) -> &str {
        &self.inner.name
    }

    fn base_url(&self) -> &str {
        &self.inner.base_url
    }
}

#[derive(Debug, Clone)]
struct ProviderConfig {
    name: String,
    api_key: String,
    base_url: String,
    organization: Option<String>,
}
