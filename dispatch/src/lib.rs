//! `OpenAI`-compatible chat completions client, plus the role-tiered
//! [`ModelDispatcher`] that wraps it with retry, backoff, cost accounting and
//! cooperative cancellation for long-running missions.
//!
//! [`OpenAI`] talks to any provider exposing the `chat.completions` wire
//! format (OpenAI itself, DeepSeek, OpenRouter, ...); [`OpenAIProvider`] is a
//! builder for naming and configuring one of those endpoints.
//!
//! ```no_run
//! use vantage_core::llm::{LLMRequest, Message, event::Event};
//! use vantage_core::LanguageModel;
//! use vantage_dispatch::OpenAI;
//! use futures_lite::StreamExt;
//!
//! # async fn demo() -> anyhow::Result<()> {
//! let model = OpenAI::new(std::env::var("OPENAI_API_KEY")?)
//!     .with_model("gpt-4o-mini");
//!
//! let messages = vec![
//!     Message::system("You are a concise assistant."),
//!     Message::user("Explain the Rust ownership model in one paragraph."),
//! ];
//! let request = LLMRequest::new(messages);
//! let mut stream = model.respond(request);
//! let mut collected = String::new();
//! while let Some(event) = stream.next().await {
//!     if let Event::Text(text) = event? {
//!         collected.push_str(&text);
//!     }
//! }
//! println!("{collected}");
//! # Ok(()) }
//! ```

mod client;
mod dispatcher;
mod embedding;
mod error;
mod provider;
mod request;
mod response;
mod role;

pub use client::{ApiKind, Builder, OpenAI};
pub use dispatcher::{DispatchCall, DispatcherConfig, ModelCallDetails, ModelDispatcher, MissionStatusSource};
pub use error::DispatchError;
pub use provider::OpenAIProvider;
pub use role::{AgentRole, RoleModelConfig, RoleTable};

mod constant;
pub use constant::*;

pub(crate) const DEFAULT_MODEL: &str = GPT5_2;
pub(crate) const DEFAULT_BASE_URL: &str = OPENAI_BASE_URL;
pub(crate) const DEFAULT_EMBEDDING_MODEL: &str = EMBEDDING_SMALL;
pub(crate) const DEFAULT_EMBEDDING_DIM: usize = 1536;
