//! Builds the [`ToolRegistry`] the CLI hands to [`MissionController`](vantage_mission::MissionController).
//!
//! Document search is intentionally left unregistered here: wiring the
//! hybrid vector store needs an embedding model and a document upload path,
//! neither of which this thin CLI front end has a surface for yet (see
//! DESIGN.md). Web search, page fetch and local-file reading need no such
//! setup, so they're always registered when their crate feature is on.

use vantage_mission::tools::ToolRegistry;
use vantage_websearch::{BraveSearch, DuckDuckGo, SearXNG};

const DEFAULT_MAX_QUERY_LENGTH: usize = 400;
const DEFAULT_MAX_RESULTS: usize = 8;

/// Assembles the registry from whatever search backend the environment
/// selects: `SEARXNG_URL` first, then `BRAVE_API_KEY`, falling back to the
/// key-free DuckDuckGo instant-answer API.
#[must_use]
pub fn build() -> ToolRegistry {
    let mut registry = ToolRegistry::new();

    if let Ok(url) = std::env::var("SEARXNG_URL") {
        registry.register(Box::new(vantage_mission::tools::WebSearchTool::new(
            SearXNG::new(url),
            DEFAULT_MAX_QUERY_LENGTH,
            DEFAULT_MAX_RESULTS,
        )));
    } else if let Ok(key) = std::env::var("BRAVE_API_KEY") {
        registry.register(Box::new(vantage_mission::tools::WebSearchTool::new(
            BraveSearch::new(key),
            DEFAULT_MAX_QUERY_LENGTH,
            DEFAULT_MAX_RESULTS,
        )));
    } else {
        registry.register(Box::new(vantage_mission::tools::WebSearchTool::new(
            DuckDuckGo::new(),
            DEFAULT_MAX_QUERY_LENGTH,
            DEFAULT_MAX_RESULTS,
        )));
    }

    registry.register(Box::<vantage_mission::tools::FetchWebPageTool>::default());
    registry.register(Box::<vantage_mission::tools::ReadFullDocumentTool>::default());

    registry
}
