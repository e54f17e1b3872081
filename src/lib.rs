#![no_std]
//! # vantage
//!
//! High level façade crate re-exporting [`vantage_core`] plus the `#[tool]` derive, and,
//! behind feature flags, the dispatcher, hybrid retrieval store, mission orchestration
//! engine, and concrete tool implementations that together make up an autonomous research
//! agent.
//!
//! ## Modules
//!
//! - [`vantage_core::llm`] — language model requests, responses, tool registries.
//! - [`vantage_core::embedding`] — dense embedding model abstraction.
//! - `dispatch` — role-tiered model dispatch with retry/fallback and cost accounting.
//! - `rag` — hybrid dense + sparse vector store, query preparation, and retrieval.
//! - `mission` — mission context manager, agent controller, and the research agent roster.

extern crate alloc;

pub use vantage_core::*;
pub use vantage_derive::tool;

#[cfg(feature = "dispatch")]
pub use vantage_dispatch as dispatch;

#[cfg(feature = "rag")]
pub use vantage_rag as rag;

#[cfg(feature = "mission")]
pub use vantage_mission as mission;

#[cfg(feature = "websearch")]
pub use vantage_websearch as websearch;

#[cfg(feature = "webfetch")]
pub use vantage_webfetch as webfetch;

#[cfg(feature = "fs")]
pub use vantage_fs as fs;

#[doc(hidden)]
/// For internal use only.
pub mod __hidden {
    pub type CowStr = alloc::borrow::Cow<'static, str>;
}
