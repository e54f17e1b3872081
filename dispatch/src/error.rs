use std::time::Duration;

/// Errors that can arise when calling an `OpenAI`-compatible chat completions endpoint.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// Transport-level failure (connection refused, DNS, TLS, timeout).
    #[error("HTTP transport error: {0}")]
    Http(#[from] reqwest::Error),

    /// Response body was not valid JSON, or didn't match the expected shape.
    #[error("response parsing error: {0}")]
    Json(#[from] serde_json::Error),

    /// API contract violations or unsupported operations.
    #[error("{0}")]
    Api(String),

    /// Rate limit exceeded (HTTP 429). Transient; the dispatcher retries these.
    #[error("rate limited: {message}")]
    RateLimit {
        /// Message from the API.
        message: String,
        /// Suggested retry delay from the `Retry-After` header, if present.
        retry_after: Option<Duration>,
    },

    /// Server error (HTTP 5xx). Transient; the dispatcher retries these.
    #[error("server error {status}: {message}")]
    ServerError {
        /// HTTP status code.
        status: u16,
        /// Error message.
        message: String,
    },

    /// Client error (HTTP 4xx other than 429). Not retried.
    #[error("client error {status}: {message}")]
    ClientError {
        /// HTTP status code.
        status: u16,
        /// Error message.
        message: String,
    },

    /// Every model in the role's fallback chain was exhausted or failed.
    #[error("all models for this role are exhausted or failing")]
    AllModelsExhausted,

    /// Request timed out.
    #[error("request timed out")]
    Timeout,

    /// The response had neither message content nor a tool call.
    #[error("model returned an empty response")]
    EmptyResponse,

    /// The owning mission left the running state before or during this call.
    #[error("mission '{0}' is no longer running")]
    Cancelled(String),

    /// No [`crate::role::RoleModelConfig`] is registered for the requested role.
    #[error("no model configured for role {0:?}")]
    UnconfiguredRole(crate::role::AgentRole),

    /// No provider registered under this name.
    #[error("no provider registered under name '{0}'")]
    UnknownProvider(String),

    /// Structured output could not be parsed as JSON after all recovery attempts.
    #[error("failed to parse structured output: {0}")]
    StructuredOutput(String),
}

impl DispatchError {
    /// Returns `true` if retrying the same request (possibly after a backoff) may succeed.
    ///
    /// Transient failures (rate limits, server errors, timeouts, transport hiccups) are
    /// retryable; a 4xx other than 429 indicates a malformed request and is not.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::RateLimit { .. }
                | Self::ServerError { .. }
                | Self::Timeout
                | Self::Http(_)
                | Self::EmptyResponse
        )
    }
}
