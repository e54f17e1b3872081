//! Tool registry and tool implementations (component C5).
//!
//! A tool is `(name, description, schema, implementation)`, matching
//! `vantage_core::llm::tool::{Tool, ToolDefinition}` — but unlike that
//! trait's `call(&mut self, args)`, a mission tool needs per-call context
//! (which mission it runs under, who's calling it, where to log, where to
//! publish live events) rather than mutable state on the tool itself, so
//! [`MissionTool::call`] takes an explicit [`ToolCallContext`] instead.
//! [`ToolContextNeeds`] lets a tool declare which pieces of that context it
//! actually needs; the registry only builds and passes what's declared.

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::future::Future;
use std::ops::{BitOr, BitOrAssign};
use std::path::Path;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use vantage_core::EmbeddingModel;
use vantage_core::llm::Tool as CoreTool;
use vantage_core::llm::tool::ToolDefinition;
use vantage_dispatch::MissionStatusSource;
use vantage_rag::retriever::{Reranker, Retriever};
use vantage_rag::{Metadata, SparseEmbeddingModel};

use crate::domain::{ExecutionLogEntry, MissionId};
use crate::error::{MissionError, Result};
use crate::event::MissionEvent;

/// Bitset of context pieces a tool declares it needs. The registry only
/// constructs and threads the pieces actually requested, mirroring the
/// design's "injects context ... if the tool declares them".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ToolContextNeeds(u8);

impl ToolContextNeeds {
    pub const NONE: Self = Self(0);
    pub const MISSION_ID: Self = Self(1 << 0);
    pub const CONTROLLER_HANDLE: Self = Self(1 << 1);
    pub const LOG_SINK: Self = Self(1 << 2);
    pub const UPDATE_SINK: Self = Self(1 << 3);
    pub const AGENT_NAME: Self = Self(1 << 4);

    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for ToolContextNeeds {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for ToolContextNeeds {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

/// Queues one completed execution-log entry for the mission context manager
/// to persist. Declared by tools that set [`ToolContextNeeds::LOG_SINK`].
pub type LogSink = Arc<dyn Fn(ExecutionLogEntry) + Send + Sync>;

/// Context threaded through one tool call, assembled by the registry from
/// whatever the caller (the controller) has on hand.
#[derive(Clone)]
pub struct ToolCallContext {
    pub mission_id: MissionId,
    pub agent_name: String,
    /// Resolved from mission metadata by the controller before dispatch, so
    /// `document_search` never has to look the mission up itself.
    pub document_group_id: Option<String>,
    pub status: Option<Arc<dyn MissionStatusSource>>,
    pub log_sink: Option<LogSink>,
    pub update_sink: Option<broadcast::Sender<MissionEvent>>,
}

impl ToolCallContext {
    #[must_use]
    pub fn new(mission_id: impl Into<MissionId>, agent_name: impl Into<String>) -> Self {
        Self {
            mission_id: mission_id.into(),
            agent_name: agent_name.into(),
            document_group_id: None,
            status: None,
            log_sink: None,
            update_sink: None,
        }
    }

    #[must_use]
    pub fn with_document_group_id(mut self, id: impl Into<String>) -> Self {
        self.document_group_id = Some(id.into());
        self
    }

    #[must_use]
    pub fn with_status(mut self, status: Arc<dyn MissionStatusSource>) -> Self {
        self.status = Some(status);
        self
    }

    #[must_use]
    pub fn with_log_sink(mut self, sink: LogSink) -> Self {
        self.log_sink = Some(sink);
        self
    }

    #[must_use]
    pub fn with_update_sink(mut self, sink: broadcast::Sender<MissionEvent>) -> Self {
        self.update_sink = Some(sink);
        self
    }
}

/// A named, schema-typed tool a mission agent can invoke.
pub trait MissionTool: Send + Sync {
    fn name(&self) -> &str;
    fn needs_context(&self) -> ToolContextNeeds {
        ToolContextNeeds::NONE
    }
    fn definition(&self) -> ToolDefinition;

    /// Runs the tool against raw JSON arguments, returning the tool's raw
    /// text output (JSON-encoded where the result is structured).
    fn call<'a>(
        &'a self,
        arguments: &'a str,
        ctx: &'a ToolCallContext,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<String>> + Send + 'a>>;
}

/// Registers the four built-in mission tools and dispatches by name,
/// recording an execution-log entry and a [`MissionEvent::ToolCall`] for
/// every invocation regardless of whether a tool declared those sinks —
/// counters like `web_search_count` depend on every call being observable.
#[derive(Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, Box<dyn MissionTool>>,
}

impl ToolRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tool: Box<dyn MissionTool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    #[must_use]
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.values().map(|t| t.definition()).collect()
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Calls a registered tool by name, logging and publishing the
    /// invocation unconditionally.
    pub async fn call(&self, name: &str, arguments: &str, ctx: &ToolCallContext) -> Result<String> {
        let Some(tool) = self.tools.get(name) else {
            return Err(MissionError::ToolNotFound { name: name.to_string() });
        };

        let started = Instant::now();
        let outcome = tool.call(arguments, ctx).await;
        let elapsed_ms = started.elapsed().as_millis();

        let entry = match &outcome {
            Ok(output) => {
                ExecutionLogEntry::success(ctx.agent_name.clone(), format!("tool call: {name}"), truncate_for_log(output))
            }
            Err(err) => ExecutionLogEntry::failure(ctx.agent_name.clone(), format!("tool call: {name}"), err.to_string()),
        };
        tracing::info!(mission_id = %ctx.mission_id, tool = name, elapsed_ms, ok = outcome.is_ok(), "tool call");
        if let Some(sink) = &ctx.log_sink {
            sink(entry);
        }
        if let Some(events) = &ctx.update_sink {
            let _ = events.send(MissionEvent::ToolCall {
                mission_id: ctx.mission_id.clone(),
                agent_name: ctx.agent_name.clone(),
                tool_name: name.to_string(),
                arguments: arguments.to_string(),
                result: outcome.as_ref().map(Clone::clone).map_err(ToString::to_string),
            });
        }

        outcome.map_err(|error| MissionError::ToolExecution { name: name.to_string(), error: error.to_string() })
    }
}

/// Keeps execution-log summaries short without splitting a multi-byte char.
fn truncate_for_log(output: &str) -> String {
    const LIMIT: usize = 200;
    match output.char_indices().nth(LIMIT) {
        Some((byte_idx, _)) => format!("{}…", &output[..byte_idx]),
        None => output.to_string(),
    }
}

/// Bridges a mission tool's schema to `vantage_core`'s tool-definition type,
/// which only exposes a constructor taking a `Tool` impl. `call` is never
/// actually invoked through this path — dispatch always goes through
/// [`MissionTool::call`] — so it just reports that misuse as an error rather
/// than doing anything real.
macro_rules! definition_marker {
    ($marker:ident, $args:ty, $name:literal, $description:expr) => {
        struct $marker;
        impl CoreTool for $marker {
            fn name(&self) -> Cow<'static, str> {
                Cow::Borrowed($name)
            }
            fn description(&self) -> Cow<'static, str> {
                Cow::Borrowed($description)
            }
            type Arguments = $args;
            async fn call(&mut self, _arguments: Self::Arguments) -> vantage_core::Result {
                Err(anyhow::anyhow!("{} is dispatched through the mission tool registry, not directly", $name))
            }
        }
    };
}

// --- document_search ---

#[derive(Debug, Deserialize, JsonSchema)]
pub struct DocumentSearchArgs {
    /// Search query against the mission's uploaded documents.
    pub query: String,
    /// How many chunks to return; falls back to the tool's configured default.
    #[serde(default)]
    pub n_results: Option<usize>,
    /// Whether to rerank the initial hybrid-search hits with a cross-encoder.
    #[serde(default)]
    pub use_reranker: bool,
}

definition_marker!(
    DocumentSearchMarker,
    DocumentSearchArgs,
    "document_search",
    "Searches the mission's uploaded documents (hybrid dense+sparse retrieval) for passages relevant to a query."
);

#[derive(Debug, Serialize, Deserialize)]
struct DocumentSearchHit {
    id: String,
    text: String,
    metadata: Metadata,
    score: f32,
}

pub struct DocumentSearchTool<D, S> {
    retriever: Arc<Retriever<D, S>>,
    reranker: Option<Arc<dyn Reranker>>,
    default_n_results: usize,
    dense_weight: f32,
    sparse_weight: f32,
}

impl<D, S> DocumentSearchTool<D, S> {
    #[must_use]
    pub fn new(
        retriever: Arc<Retriever<D, S>>,
        reranker: Option<Arc<dyn Reranker>>,
        default_n_results: usize,
        dense_weight: f32,
        sparse_weight: f32,
    ) -> Self {
        Self { retriever, reranker, default_n_results, dense_weight, sparse_weight }
    }
}

impl<D, S> MissionTool for DocumentSearchTool<D, S>
where
    D: EmbeddingModel + Send + Sync + 'static,
    S: SparseEmbeddingModel + Send + Sync + 'static,
{
    fn name(&self) -> &str {
        "document_search"
    }

    fn needs_context(&self) -> ToolContextNeeds {
        ToolContextNeeds::MISSION_ID
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(&DocumentSearchMarker)
    }

    fn call<'a>(
        &'a self,
        arguments: &'a str,
        ctx: &'a ToolCallContext,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<String>> + Send + 'a>> {
        Box::pin(async move {
            // Missing `document_group_id` means the mission has no document
            // scope to search: downgrade to a no-op rather than searching
            // every mission's documents unscoped.
            let Some(group) = &ctx.document_group_id else {
                return Ok(serde_json::to_string(&Vec::<DocumentSearchHit>::new())?);
            };

            let args: DocumentSearchArgs = serde_json::from_str(arguments)?;
            let n_results = args.n_results.unwrap_or(self.default_n_results).max(1);
            let reranker = args.use_reranker.then(|| self.reranker.as_deref()).flatten();

            let mut filter = Metadata::new();
            filter.insert("document_group_id".to_string(), group.clone());

            let hits = self
                .retriever
                .retrieve(&args.query, n_results, Some(&filter), self.dense_weight, self.sparse_weight, reranker)
                .await?;

            let scoped: Vec<DocumentSearchHit> = hits
                .into_iter()
                .map(|hit| DocumentSearchHit { id: hit.id, text: hit.text, metadata: hit.metadata, score: hit.score })
                .collect();

            Ok(serde_json::to_string(&scoped)?)
        })
    }
}

// --- web_search ---

#[cfg(feature = "websearch")]
mod web_search_tool {
    use super::{CoreTool, Cow, JsonSchema, MissionTool, Pin, ToolCallContext, ToolContextNeeds, ToolDefinition, definition_marker};
    use std::future::Future;
    use serde::Deserialize;
    use vantage_websearch::SearchProvider;

    #[derive(Debug, Deserialize, JsonSchema)]
    pub struct WebSearchArgs {
        /// Search query. Queries longer than the configured limit are rejected;
        /// refine them with the query preparer before calling this tool.
        pub query: String,
        /// Maximum results to return.
        #[serde(default)]
        pub max_results: Option<usize>,
    }

    definition_marker!(
        WebSearchMarker,
        WebSearchArgs,
        "web_search",
        "Searches the public web for a query and returns titled result snippets with URLs."
    );

    pub struct WebSearchTool<P> {
        provider: P,
        max_query_length: usize,
        default_max_results: usize,
    }

    impl<P> WebSearchTool<P> {
        #[must_use]
        pub fn new(provider: P, max_query_length: usize, default_max_results: usize) -> Self {
            Self { provider, max_query_length, default_max_results }
        }
    }

    impl<P> MissionTool for WebSearchTool<P>
    where
        P: SearchProvider + Send + Sync + 'static,
    {
        fn name(&self) -> &str {
            "web_search"
        }

        fn needs_context(&self) -> ToolContextNeeds {
            ToolContextNeeds::NONE
        }

        fn definition(&self) -> ToolDefinition {
            ToolDefinition::new(&WebSearchMarker)
        }

        fn call<'a>(
            &'a self,
            arguments: &'a str,
            _ctx: &'a ToolCallContext,
        ) -> Pin<Box<dyn Future<Output = anyhow::Result<String>> + Send + 'a>> {
            Box::pin(async move {
                let args: WebSearchArgs = serde_json::from_str(arguments)?;
                if args.query.chars().count() > self.max_query_length {
                    anyhow::bail!(
                        "query is {} characters, over the {} character limit; refine it first",
                        args.query.chars().count(),
                        self.max_query_length
                    );
                }
                let limit = args.max_results.unwrap_or(self.default_max_results).clamp(1, 20);
                let results = self.provider.search(&args.query, limit).await?;
                Ok(serde_json::to_string(&results)?)
            })
        }
    }
}

#[cfg(feature = "websearch")]
pub use web_search_tool::{WebSearchArgs, WebSearchTool};

// --- fetch_web_page_content ---

#[cfg(feature = "webfetch")]
mod fetch_tool {
    use super::{CoreTool, Cow, JsonSchema, Metadata, MissionTool, Pin, ToolCallContext, ToolContextNeeds, ToolDefinition, definition_marker};
    use std::future::Future;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Deserialize, JsonSchema)]
    pub struct FetchWebPageArgs {
        pub url: String,
    }

    definition_marker!(
        FetchWebPageMarker,
        FetchWebPageArgs,
        "fetch_web_page_content",
        "Fetches a web page and returns its content as markdown text, with its title and response metadata."
    );

    #[derive(Debug, Serialize)]
    struct FetchWebPageOutput {
        text: String,
        title: Option<String>,
        metadata: Metadata,
    }

    #[derive(Default)]
    pub struct FetchWebPageTool;

    impl MissionTool for FetchWebPageTool {
        fn name(&self) -> &str {
            "fetch_web_page_content"
        }

        fn definition(&self) -> ToolDefinition {
            ToolDefinition::new(&FetchWebPageMarker)
        }

        fn call<'a>(
            &'a self,
            arguments: &'a str,
            _ctx: &'a ToolCallContext,
        ) -> Pin<Box<dyn Future<Output = anyhow::Result<String>> + Send + 'a>> {
            Box::pin(async move {
                let args: FetchWebPageArgs = serde_json::from_str(arguments)?;
                let result = vantage_webfetch::fetch(&args.url).await?;

                let mut metadata = Metadata::new();
                metadata.insert("url".to_string(), result.url.clone());
                if let Some(content_type) = result.content_type {
                    metadata.insert("content_type".to_string(), content_type);
                }
                if let Some(tokens) = result.markdown_tokens {
                    metadata.insert("markdown_tokens".to_string(), tokens.to_string());
                }
                if let Some(signal) = result.content_signal {
                    metadata.insert("content_signal".to_string(), signal);
                }

                let output = FetchWebPageOutput { text: result.content, title: result.title, metadata };
                Ok(serde_json::to_string(&output)?)
            })
        }
    }
}

#[cfg(feature = "webfetch")]
pub use fetch_tool::{FetchWebPageArgs, FetchWebPageTool};

// --- read_full_document ---

#[cfg(feature = "filesystem")]
mod read_document_tool {
    use super::{CoreTool, Cow, JsonSchema, MissionTool, Path, Pin, ToolCallContext, ToolContextNeeds, ToolDefinition, definition_marker};
    use std::future::Future;
    use serde::Deserialize;
    use vantage_fs::{FileSystem, LocalFileSystem};

    #[derive(Debug, Deserialize, JsonSchema)]
    pub struct ReadFullDocumentArgs {
        /// Path relative to `allowed_base_path`.
        pub filepath: String,
        /// Root directory the resolved path must stay beneath.
        pub allowed_base_path: String,
        /// Original filename, carried through for citation labeling only.
        pub original_filename: String,
    }

    definition_marker!(
        ReadFullDocumentMarker,
        ReadFullDocumentArgs,
        "read_full_document",
        "Reads the full text of a previously uploaded document by path, rejecting paths outside the allowed base directory."
    );

    #[derive(Default)]
    pub struct ReadFullDocumentTool;

    impl MissionTool for ReadFullDocumentTool {
        fn name(&self) -> &str {
            "read_full_document"
        }

        fn definition(&self) -> ToolDefinition {
            ToolDefinition::new(&ReadFullDocumentMarker)
        }

        fn call<'a>(
            &'a self,
            arguments: &'a str,
            _ctx: &'a ToolCallContext,
        ) -> Pin<Box<dyn Future<Output = anyhow::Result<String>> + Send + 'a>> {
            Box::pin(async move {
                let args: ReadFullDocumentArgs = serde_json::from_str(arguments)?;
                let fs = LocalFileSystem::read_only(&args.allowed_base_path)?;
                let contents = fs.read_file(Path::new(&args.filepath)).await.map_err(|error| {
                    anyhow::anyhow!(
                        "failed to read '{}' (original name '{}') beneath '{}': {error}",
                        args.filepath,
                        args.original_filename,
                        args.allowed_base_path
                    )
                })?;
                Ok(contents)
            })
        }
    }
}

#[cfg(feature = "filesystem")]
pub use read_document_tool::{ReadFullDocumentArgs, ReadFullDocumentTool};

#[cfg(test)]
mod tests {
    use super::*;
    use vantage_rag::hybrid::{HybridChunk, HybridEmbeddings, HybridStore};
    use vantage_rag::retriever::RetrieverConfig;
    use vantage_rag::types::Chunk;
    use std::time::Duration;

    struct MockDense;
    impl EmbeddingModel for MockDense {
        fn dim(&self) -> usize {
            4
        }
        async fn embed(&self, _text: &str) -> vantage_core::Result<Vec<f32>> {
            Ok(vec![1.0, 0.0, 0.0, 0.0])
        }
    }

    struct MockSparse;
    impl SparseEmbeddingModel for MockSparse {
        async fn embed_sparse(&self, _text: &str) -> anyhow::Result<vantage_rag::hybrid::SparseWeights> {
            let mut weights = vantage_rag::hybrid::SparseWeights::new();
            weights.insert(1, 1.0);
            Ok(weights)
        }
    }

    fn ctx(mission_id: &str) -> ToolCallContext {
        ToolCallContext::new(mission_id, "research")
    }

    #[tokio::test]
    async fn document_search_scopes_by_document_group() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(HybridStore::open(dir.path(), 4, Duration::from_secs(1)).unwrap());
        let mut sparse = vantage_rag::hybrid::SparseWeights::new();
        sparse.insert(1, 1.0);

        let mut metadata_a = Metadata::new();
        metadata_a.insert("document_group_id".to_string(), "group-a".to_string());
        let mut metadata_b = Metadata::new();
        metadata_b.insert("document_group_id".to_string(), "group-b".to_string());

        store
            .add_chunks(vec![
                HybridChunk {
                    chunk: Chunk::with_metadata("doc1_0", "alpha content", "doc1", 0, 0, metadata_a),
                    embeddings: HybridEmbeddings { dense: vec![1.0, 0.0, 0.0, 0.0], sparse: sparse.clone() },
                },
                HybridChunk {
                    chunk: Chunk::with_metadata("doc2_0", "alpha content too", "doc2", 0, 0, metadata_b),
                    embeddings: HybridEmbeddings { dense: vec![1.0, 0.0, 0.0, 0.0], sparse },
                },
            ])
            .unwrap();

        let retriever = Arc::new(Retriever::new(store, MockDense, MockSparse, RetrieverConfig::new(4)));
        let tool = DocumentSearchTool::new(retriever, None, 5, 0.5, 0.5);

        let args = r#"{"query": "alpha"}"#;
        let mut context = ctx("mission-1");
        context.document_group_id = Some("group-a".to_string());

        let raw = tool.call(args, &context).await.unwrap();
        let hits: Vec<DocumentSearchHit> = serde_json::from_str(&raw).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "doc1_0");
    }

    #[tokio::test]
    async fn document_search_is_no_op_without_document_group_id() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(HybridStore::open(dir.path(), 4, Duration::from_secs(1)).unwrap());
        let mut sparse = vantage_rag::hybrid::SparseWeights::new();
        sparse.insert(1, 1.0);

        let mut metadata_a = Metadata::new();
        metadata_a.insert("document_group_id".to_string(), "group-a".to_string());

        store
            .add_chunks(vec![HybridChunk {
                chunk: Chunk::with_metadata("doc1_0", "alpha content", "doc1", 0, 0, metadata_a),
                embeddings: HybridEmbeddings { dense: vec![1.0, 0.0, 0.0, 0.0], sparse },
            }])
            .unwrap();

        let retriever = Arc::new(Retriever::new(store, MockDense, MockSparse, RetrieverConfig::new(4)));
        let tool = DocumentSearchTool::new(retriever, None, 5, 0.5, 0.5);

        let args = r#"{"query": "alpha"}"#;
        let context = ctx("mission-1");
        assert!(context.document_group_id.is_none());

        let raw = tool.call(args, &context).await.unwrap();
        let hits: Vec<DocumentSearchHit> = serde_json::from_str(&raw).unwrap();
        assert!(hits.is_empty());
    }

    #[test]
    fn context_needs_compose() {
        let needs = ToolContextNeeds::MISSION_ID | ToolContextNeeds::LOG_SINK;
        assert!(needs.contains(ToolContextNeeds::MISSION_ID));
        assert!(needs.contains(ToolContextNeeds::LOG_SINK));
        assert!(!needs.contains(ToolContextNeeds::UPDATE_SINK));
    }

    #[tokio::test]
    async fn registry_reports_tool_not_found() {
        let registry = ToolRegistry::new();
        let err = registry.call("nonexistent", "{}", &ctx("mission-1")).await.unwrap_err();
        assert!(matches!(err, MissionError::ToolNotFound { .. }));
    }
}
