//! # vantage-core
//!
//! no-std trait abstractions shared by every crate in the workspace: a provider-agnostic
//! [`LanguageModel`], an [`EmbeddingModel`], and the [`llm::tool`] function-calling system.
//! Concrete providers (the dispatcher, the hybrid retrieval store) implement these traits;
//! nothing in this crate knows about HTTP, SQLite, or any specific model vendor.
//!
//! ```text
//! ┌─────────────────┐    ┌──────────────────┐    ┌─────────────────┐
//! │  vantage-mission │───▶│   vantage-core   │◀───│ vantage-dispatch│
//! │  (the agents)    │    │   (this crate)   │    │  (the provider) │
//! └─────────────────┘    └──────────────────┘    └─────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`llm`] — request builders, messages, the tool registry, provider traits.
//! - [`embedding`] — turn text into dense vectors.

#![doc(html_logo_url = "https://raw.githubusercontent.com/vantage-rs/vantage/main/logo.svg")]
#![no_std]
extern crate alloc;

/// Text embeddings.
pub mod embedding;
pub mod llm;

use alloc::string::String;

#[doc(inline)]
pub use embedding::EmbeddingModel;
#[doc(inline)]
pub use llm::LanguageModel;

/// Result type used throughout the crate.
///
/// Type alias for [`anyhow::Result<T>`](anyhow::Result) with [`String`] as default success type.
pub type Result<T = String> = anyhow::Result<T>;

pub use anyhow::Error;

// Re-export procedural macros
#[cfg(feature = "derive")]
pub use crate::llm::tool::tool;
