//! Thin command-line front end for the vantage mission orchestration engine.
//!
//! Wires together [`vantage_mission::MissionConfig`], a role-tiered
//! [`vantage_dispatch::ModelDispatcher`], a [`vantage_mission::tools::ToolRegistry`]
//! and a [`vantage_mission::MissionStore`] into a [`vantage_mission::MissionController`],
//! then drives it through a single mission's chat turns from stdin. See
//! `src/main.rs` for the run loop itself; the modules here just do the
//! wiring.
//!
//! # Usage
//!
//! ```bash
//! OPENAI_API_KEY=sk-... cargo run -p vantage-cli -- "Research the state of fusion energy funding"
//! ```

pub mod config;
pub mod events;
pub mod provider;
pub mod tools;
