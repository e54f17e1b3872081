//! Builds the set of named [`OpenAIProvider`]s the dispatcher can route
//! role calls to, one per API key found in the environment.
//!
//! Each role's provider name (resolved by
//! [`RoleTable::from_env`](vantage_dispatch::RoleTable::from_env) from e.g.
//! `FAST_LLM_PROVIDER`) must match one of these providers' `name()`, or
//! dispatch fails with `DispatchError::UnknownProvider`.

use vantage_dispatch::OpenAIProvider;

/// Collects every provider this process has credentials for.
///
/// `OPENAI_API_KEY` registers `"openai"`, `DEEPSEEK_API_KEY` registers
/// `"deepseek"`, `OPENROUTER_API_KEY` registers `"openrouter"`. At least one
/// must be set for the dispatcher to have anywhere to send a call.
#[must_use]
pub fn from_env() -> Vec<OpenAIProvider> {
    let mut providers = Vec::new();
    if let Ok(key) = std::env::var("OPENAI_API_KEY") {
        providers.push(OpenAIProvider::new(key));
    }
    if let Ok(key) = std::env::var("DEEPSEEK_API_KEY") {
        providers.push(OpenAIProvider::deepseek(key));
    }
    if let Ok(key) = std::env::var("OPENROUTER_API_KEY") {
        providers.push(OpenAIProvider::openrouter(key));
    }
    providers
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_environment_yields_no_providers() {
        for key in ["OPENAI_API_KEY", "DEEPSEEK_API_KEY", "OPENROUTER_API_KEY"] {
            unsafe { std::env::remove_var(key) };
        }
        assert!(from_env().is_empty());
    }
}
