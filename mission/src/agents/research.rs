//! The Research agent (design §4.7, Research): explores questions during
//! initial BFS exploration and gathers focused evidence during structured
//! research rounds, turning retrieved material into grounded [`Note`]s.
//!
//! Initial exploration searches with the raw question text (breadth over
//! precision, budget-bounded BFS); structured research rounds run each focus
//! question through [`QueryPreparer`] first (precision over breadth, since
//! these notes go straight into the written report). See DESIGN.md.

use std::collections::{BTreeMap, BTreeSet};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use vantage_dispatch::{ModelCallDetails, ModelDispatcher};
use vantage_rag::{QueryPreparer, QueryTechnique};

use super::{AgentCtx, call};
use crate::config::MissionConfig;
use crate::domain::{ReportSection, SourceMetadata, SourceType};
use crate::error::{MissionError, Result};
use crate::prompts;
use crate::tools::{ToolCallContext, ToolRegistry};

const NOT_RELEVANT_MARKER: &str = "NOT_RELEVANT";

/// Bounds specific to the Research agent that aren't part of the shared
/// [`MissionConfig`] surface (see its Open Question note in DESIGN.md).
#[derive(Debug, Clone, Copy)]
pub struct ResearchConfig {
    /// Caps how many web hits per round get upgraded from snippet to a full
    /// `fetch_web_page_content` read, since a full fetch is much costlier
    /// than reading the search snippet.
    pub max_web_fetch_per_round: usize,
}

impl Default for ResearchConfig {
    fn default() -> Self {
        Self { max_web_fetch_per_round: 5 }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct DocHit {
    id: String,
    text: String,
    #[serde(default)]
    metadata: SourceMetadata,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
struct WebHit {
    title: String,
    url: String,
    snippet: String,
}

#[derive(Debug, Clone, Deserialize)]
struct FetchedPage {
    text: String,
    #[serde(default)]
    title: Option<String>,
}

/// One piece of source material materialized for note extraction: either a
/// content window built from one or more retrieved document chunks (see
/// [`group_into_windows`] — hits are grouped by `original_filename`, windows
/// capped to `research_note_content_limit` per chunk, overlapping/adjacent
/// chunks merged up to `max_planning_context_chars`, oversized merges split
/// back down) or a web search hit's snippet/full text.
#[derive(Debug, Clone)]
pub struct ContentWindow {
    pub source_type: SourceType,
    pub source_id: String,
    pub text: String,
    pub metadata: SourceMetadata,
}

/// A grounded extract pulled from one [`ContentWindow`], not yet assigned a
/// note id or mission-scoped bookkeeping — [`crate::store::MissionStore`]
/// turns these into full [`crate::domain::Note`]s on insert.
#[derive(Debug, Clone)]
pub struct ExtractedNote {
    pub content: String,
    pub source_type: SourceType,
    pub source_id: String,
    pub source_metadata: SourceMetadata,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct ExtractNoteResponse {
    note_content: String,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
struct ExploreNote {
    content: String,
    source_id: String,
    #[serde(default)]
    source_type: Option<SourceType>,
}

#[derive(Debug, Default, Deserialize, JsonSchema)]
struct ExploreQuestionResponse {
    #[serde(default)]
    notes: Vec<ExploreNote>,
    #[serde(default)]
    new_sub_questions: Vec<String>,
    #[serde(default)]
    updated_scratchpad: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct InitialQuestionsResponse {
    questions: Vec<String>,
}

/// Outcome of exploring one question during initial BFS exploration.
#[derive(Debug, Default)]
pub struct ExploreOutcome {
    pub notes: Vec<ExtractedNote>,
    pub new_sub_questions: Vec<String>,
    pub updated_scratchpad: String,
    pub model_call_details: Vec<ModelCallDetails>,
    pub web_search_count: u64,
}

/// Outcome of one structured research round over a single section.
#[derive(Debug, Default)]
pub struct ResearchRoundOutput {
    pub notes: Vec<ExtractedNote>,
    pub model_call_details: Vec<ModelCallDetails>,
    pub web_search_count: u64,
}

pub struct ResearchAgent<'a> {
    dispatcher: &'a ModelDispatcher,
    tools: &'a ToolRegistry,
    config: &'a MissionConfig,
    research_config: ResearchConfig,
}

impl<'a> ResearchAgent<'a> {
    #[must_use]
    pub fn new(
        dispatcher: &'a ModelDispatcher,
        tools: &'a ToolRegistry,
        config: &'a MissionConfig,
        research_config: ResearchConfig,
    ) -> Self {
        Self { dispatcher, tools, config, research_config }
    }

    /// Generates the first wave of exploratory questions for a brand new
    /// mission, before any outline exists.
    pub async fn generate_initial_questions(
        &self,
        user_request: &str,
        active_goals: &str,
        ctx: AgentCtx<'_>,
    ) -> Result<(Vec<String>, ModelCallDetails)> {
        let rendered = prompts::research_initial_questions()
            .render(&[("user_request", user_request), ("active_goals", active_goals)]);
        let role = self.config.role_for("research");
        let dispatch = call(role, "research", rendered, ctx);
        let (response, details): (InitialQuestionsResponse, ModelCallDetails) =
            self.dispatcher.dispatch_structured(dispatch, ctx.status).await?;
        Ok((response.questions, details))
    }

    /// Explores one question during initial BFS exploration: searches with
    /// the raw question text (refined first if it is over the web-search
    /// length limit, since the raw `user_request` itself can seed this BFS),
    /// then asks the model to extract notes and propose follow-up
    /// sub-questions from whatever came back.
    pub async fn explore_question(
        &self,
        question: &str,
        depth: usize,
        max_depth: usize,
        max_questions: usize,
        scratchpad: &str,
        tool_ctx: &ToolCallContext,
        ctx: AgentCtx<'_>,
    ) -> Result<ExploreOutcome> {
        let doc_hits = self.search_documents(question, self.config.initial_exploration_doc_results, tool_ctx).await?;

        let preparer = QueryPreparer::new(self.dispatcher, "research", 3);
        let (web_query, refine_details) = preparer
            .refine_if_too_long(question, self.config.max_query_length, ctx.mission_id, ctx.status)
            .await?;
        let (web_hits, web_search_count) =
            self.search_web(&web_query, self.config.initial_exploration_web_results, tool_ctx).await?;

        let retrieved_material = format_retrieved_material(&doc_hits, &web_hits);
        let rendered = prompts::research_explore_question().render(&[
            ("depth", &depth.to_string()),
            ("max_depth", &max_depth.to_string()),
            ("question", question),
            ("scratchpad", scratchpad),
            ("retrieved_material", &retrieved_material),
            ("max_questions", &max_questions.to_string()),
        ]);
        let role = self.config.role_for("research");
        let dispatch = call(role, "research", rendered, ctx);
        let (mut response, details): (ExploreQuestionResponse, ModelCallDetails) =
            self.dispatcher.dispatch_structured(dispatch, ctx.status).await?;
        response.new_sub_questions.truncate(max_questions);

        let notes = response
            .notes
            .into_iter()
            .map(|note| {
                let source_type = note.source_type.unwrap_or_else(|| classify_source(&note.source_id, &doc_hits));
                let source_metadata = doc_hits
                    .iter()
                    .find(|hit| hit.id == note.source_id)
                    .map(|hit| hit.metadata.clone())
                    .unwrap_or_default();
                ExtractedNote { content: note.content, source_type, source_id: note.source_id, source_metadata }
            })
            .collect();

        let mut model_call_details = refine_details;
        model_call_details.push(details);

        Ok(ExploreOutcome {
            notes,
            new_sub_questions: response.new_sub_questions,
            updated_scratchpad: response.updated_scratchpad,
            model_call_details,
            web_search_count,
        })
    }

    /// Runs one structured research round for `section`: prepares queries
    /// from `focus_questions` (or the section's own description if none were
    /// given — "synthesis mode"), retrieves, and extracts one note per
    /// content window that proves relevant.
    pub async fn research_round(
        &self,
        section: &ReportSection,
        focus_questions: &[String],
        tool_ctx: &ToolCallContext,
        ctx: AgentCtx<'_>,
    ) -> Result<ResearchRoundOutput> {
        let basis: Vec<String> =
            if focus_questions.is_empty() { vec![section.description.clone()] } else { focus_questions.to_vec() };

        let preparer = QueryPreparer::new(self.dispatcher, "research", 3);
        let mut model_call_details = Vec::new();
        let mut doc_hits = Vec::new();
        let mut web_hits = Vec::new();
        let mut web_search_count = 0u64;
        let mut seen_docs = BTreeSet::new();
        let mut seen_urls = BTreeSet::new();

        for question in &basis {
            let prepared = preparer
                .prepare_queries(
                    question,
                    &[QueryTechnique::ZeroShotRewrite],
                    &section.description,
                    ctx.mission_id,
                    self.config.max_query_length,
                    ctx.status,
                )
                .await?;
            model_call_details.extend(prepared.model_call_details);

            for query in &prepared.queries {
                for hit in self.search_documents(query, self.config.main_research_doc_results, tool_ctx).await? {
                    if seen_docs.insert(hit.id.clone()) {
                        doc_hits.push(hit);
                    }
                }
                let (hits, count) =
                    self.search_web(query, self.config.main_research_web_results, tool_ctx).await?;
                web_search_count += count;
                for hit in hits {
                    if seen_urls.insert(hit.url.clone()) {
                        web_hits.push(hit);
                    }
                }
            }
        }

        let mut windows: Vec<ContentWindow> = group_into_windows(
            doc_hits,
            self.config.research_note_content_limit,
            self.config.max_planning_context_chars,
        );

        let focus_text = super::bullet_list(&basis, "(none)");
        let mut notes = Vec::new();
        let mut fetches_used = 0;
        for hit in web_hits {
            let mut window = ContentWindow {
                source_type: SourceType::Web,
                source_id: hit.url.clone(),
                text: hit.snippet.clone(),
                metadata: web_source_metadata(&hit),
            };
            if fetches_used < self.research_config.max_web_fetch_per_round {
                if let Some(full_text) = self.fetch_page(&hit.url, tool_ctx).await {
                    window.text = truncate(&full_text, self.config.research_note_content_limit);
                    fetches_used += 1;
                }
            }
            windows.push(window);
        }

        for window in windows.drain(..) {
            let extraction = self.extract_note(section, &focus_text, &window, ctx).await?;
            model_call_details.push(extraction.1);
            if let Some(content) = extraction.0 {
                notes.push(ExtractedNote {
                    content,
                    source_type: window.source_type,
                    source_id: window.source_id,
                    source_metadata: window.metadata,
                });
            }
        }

        Ok(ResearchRoundOutput { notes, model_call_details, web_search_count })
    }

    async fn extract_note(
        &self,
        section: &ReportSection,
        focus_questions: &str,
        window: &ContentWindow,
        ctx: AgentCtx<'_>,
    ) -> Result<(Option<String>, ModelCallDetails)> {
        let source_kind = match window.source_type {
            SourceType::Document => "document",
            SourceType::Web => "web",
            SourceType::Internal => "internal",
        };
        let rendered = prompts::research_extract_note().render(&[
            ("section_title", &section.title),
            ("section_description", &section.description),
            ("focus_questions", focus_questions),
            ("source_kind", source_kind),
            ("source_id", &window.source_id),
            ("source_text", &window.text),
        ]);
        let role = self.config.role_for("research");
        let dispatch = call(role, "research", rendered, ctx);
        let (text, details) = self.dispatcher.dispatch_text(dispatch, ctx.status).await?;

        let trimmed = text.trim();
        if trimmed == NOT_RELEVANT_MARKER {
            return Ok((None, details));
        }
        let content = serde_json::from_str::<ExtractNoteResponse>(trimmed)
            .map(|parsed| parsed.note_content)
            .unwrap_or_else(|_| trimmed.to_string());
        Ok((Some(content), details))
    }

    async fn search_documents(&self, query: &str, n_results: usize, tool_ctx: &ToolCallContext) -> Result<Vec<DocHit>> {
        if !self.tools.contains("document_search") {
            return Ok(Vec::new());
        }
        let args = serde_json::json!({ "query": query, "n_results": n_results });
        let raw = self.tools.call("document_search", &args.to_string(), tool_ctx).await?;
        serde_json::from_str(&raw)
            .map_err(|err| MissionError::InvalidAgentOutput { agent: "research".to_string(), reason: err.to_string() })
    }

    async fn search_web(&self, query: &str, max_results: usize, tool_ctx: &ToolCallContext) -> Result<(Vec<WebHit>, u64)> {
        if !self.tools.contains("web_search") {
            return Ok((Vec::new(), 0));
        }
        let args = serde_json::json!({ "query": query, "max_results": max_results });
        let raw = self.tools.call("web_search", &args.to_string(), tool_ctx).await?;
        let hits = serde_json::from_str(&raw)
            .map_err(|err| MissionError::InvalidAgentOutput { agent: "research".to_string(), reason: err.to_string() })?;
        Ok((hits, 1))
    }

    async fn fetch_page(&self, url: &str, tool_ctx: &ToolCallContext) -> Option<String> {
        if !self.tools.contains("fetch_web_page_content") {
            return None;
        }
        let args = serde_json::json!({ "url": url });
        let raw = self.tools.call("fetch_web_page_content", &args.to_string(), tool_ctx).await.ok()?;
        let fetched: FetchedPage = serde_json::from_str(&raw).ok()?;
        Some(fetched.text)
    }
}

fn classify_source(source_id: &str, doc_hits: &[DocHit]) -> SourceType {
    if doc_hits.iter().any(|hit| hit.id == source_id) {
        SourceType::Document
    } else if source_id.starts_with("http://") || source_id.starts_with("https://") {
        SourceType::Web
    } else {
        SourceType::Internal
    }
}

fn web_source_metadata(hit: &WebHit) -> SourceMetadata {
    let mut metadata = SourceMetadata::new();
    metadata.insert("url".to_string(), hit.url.clone());
    metadata.insert("title".to_string(), hit.title.clone());
    metadata
}

fn format_retrieved_material(doc_hits: &[DocHit], web_hits: &[WebHit]) -> String {
    let mut blocks = Vec::new();
    for hit in doc_hits {
        blocks.push(format!("[doc:{}] {}", hit.id, hit.text));
    }
    for hit in web_hits {
        blocks.push(format!("[web:{}] {} - {}", crate::domain::web_citation_key(&hit.url), hit.title, hit.snippet));
    }
    if blocks.is_empty() {
        "(nothing retrieved)".to_string()
    } else {
        blocks.join("\n\n")
    }
}

/// Groups retrieved document hits by `original_filename`, materializes a
/// per-chunk window capped to `window_size` chars, merges windows whose
/// paragraph ranges overlap or are adjacent (as long as the merge stays
/// within `max_context_chars`), and splits any window that still exceeds
/// `max_context_chars` back into `max_context_chars`-sized pieces.
///
/// Hits lacking `original_filename`/paragraph-index metadata fall back to
/// one window per hit (their own chunk id as the grouping key), matching
/// the pre-grouping behavior for chunks the ingestion pipeline didn't tag.
fn group_into_windows(doc_hits: Vec<DocHit>, window_size: usize, max_context_chars: usize) -> Vec<ContentWindow> {
    let mut groups: BTreeMap<String, Vec<DocHit>> = BTreeMap::new();
    for hit in doc_hits {
        let key = hit.metadata.get("original_filename").cloned().unwrap_or_else(|| hit.id.clone());
        groups.entry(key).or_default().push(hit);
    }

    let mut windows = Vec::new();
    for (_, mut hits) in groups {
        hits.sort_by(|a, b| {
            paragraph_index(a, "start_paragraph_index").cmp(&paragraph_index(b, "start_paragraph_index")).then_with(|| a.id.cmp(&b.id))
        });

        let mut current: Option<MergingWindow> = None;
        for hit in hits {
            let start = paragraph_index(&hit, "start_paragraph_index");
            let end = paragraph_index(&hit, "end_paragraph_index").max(start);
            let chunk_text = truncate(&hit.text, window_size);

            let merges = current
                .as_ref()
                .is_some_and(|w| start <= w.end_paragraph + 1 && w.text.chars().count() + chunk_text.chars().count() <= max_context_chars);

            if merges {
                let window = current.as_mut().expect("checked by `merges`");
                window.text.push('\n');
                window.text.push_str(&chunk_text);
                window.end_paragraph = window.end_paragraph.max(end);
            } else {
                if let Some(finished) = current.take() {
                    windows.extend(finished.finish(max_context_chars));
                }
                current = Some(MergingWindow {
                    source_id: hit.id,
                    metadata: hit.metadata,
                    text: chunk_text,
                    end_paragraph: end,
                });
            }
        }
        if let Some(finished) = current.take() {
            windows.extend(finished.finish(max_context_chars));
        }
    }
    windows
}

fn paragraph_index(hit: &DocHit, key: &str) -> usize {
    hit.metadata.get(key).and_then(|v| v.parse().ok()).unwrap_or(0)
}

/// In-progress merged window for [`group_into_windows`].
struct MergingWindow {
    source_id: String,
    metadata: SourceMetadata,
    text: String,
    end_paragraph: usize,
}

impl MergingWindow {
    /// Converts into one or more [`ContentWindow`]s, splitting `text` into
    /// `max_context_chars`-sized pieces if the merge grew past the limit.
    fn finish(self, max_context_chars: usize) -> Vec<ContentWindow> {
        split_text(&self.text, max_context_chars)
            .into_iter()
            .map(|text| ContentWindow {
                source_type: SourceType::Document,
                source_id: self.source_id.clone(),
                text,
                metadata: self.metadata.clone(),
            })
            .collect()
    }
}

/// Splits `text` into consecutive pieces of at most `max_len` characters.
fn split_text(text: &str, max_len: usize) -> Vec<String> {
    if max_len == 0 || text.chars().count() <= max_len {
        return vec![text.to_string()];
    }
    text.chars()
        .collect::<Vec<char>>()
        .chunks(max_len)
        .map(|chunk| chunk.iter().collect())
        .collect()
}

fn truncate(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        return text.to_string();
    }
    let truncated: String = text.chars().take(limit).collect();
    format!("{truncated}…")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retrieved_material_labels_each_source() {
        let doc_hits = vec![DocHit { id: "doc1_0".to_string(), text: "alpha".to_string(), metadata: SourceMetadata::new() }];
        let web_hits =
            vec![WebHit { title: "Title".to_string(), url: "https://example.com".to_string(), snippet: "snip".to_string() }];
        let formatted = format_retrieved_material(&doc_hits, &web_hits);
        assert!(formatted.contains("[doc:doc1_0]"));
        assert!(formatted.contains("Title"));
    }

    #[test]
    fn classify_source_detects_web_urls() {
        assert_eq!(classify_source("https://example.com", &[]), SourceType::Web);
        assert_eq!(classify_source("agent-note", &[]), SourceType::Internal);
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        let text = "hello world";
        assert_eq!(truncate(text, 5), "hello…");
        assert_eq!(truncate(text, 100), text);
    }

    fn doc_hit(id: &str, text: &str, filename: &str, start: usize, end: usize) -> DocHit {
        let mut metadata = SourceMetadata::new();
        metadata.insert("original_filename".to_string(), filename.to_string());
        metadata.insert("start_paragraph_index".to_string(), start.to_string());
        metadata.insert("end_paragraph_index".to_string(), end.to_string());
        DocHit { id: id.to_string(), text: text.to_string(), metadata }
    }

    #[test]
    fn group_into_windows_merges_overlapping_chunks_from_same_file() {
        let hits = vec![
            doc_hit("a_0", "first paragraph", "report.pdf", 0, 1),
            doc_hit("a_1", "second paragraph", "report.pdf", 1, 2),
        ];
        let windows = group_into_windows(hits, 1000, 1000);
        assert_eq!(windows.len(), 1);
        assert!(windows[0].text.contains("first paragraph"));
        assert!(windows[0].text.contains("second paragraph"));
    }

    #[test]
    fn group_into_windows_keeps_non_adjacent_chunks_separate() {
        let hits = vec![
            doc_hit("a_0", "first paragraph", "report.pdf", 0, 0),
            doc_hit("a_5", "far away paragraph", "report.pdf", 5, 5),
        ];
        let windows = group_into_windows(hits, 1000, 1000);
        assert_eq!(windows.len(), 2);
    }

    #[test]
    fn group_into_windows_groups_by_filename_separately() {
        let hits = vec![
            doc_hit("a_0", "from report one", "report1.pdf", 0, 0),
            doc_hit("b_0", "from report two", "report2.pdf", 0, 0),
        ];
        let windows = group_into_windows(hits, 1000, 1000);
        assert_eq!(windows.len(), 2);
    }

    #[test]
    fn group_into_windows_falls_back_to_chunk_id_without_filename() {
        let hits = vec![
            DocHit { id: "x_0".to_string(), text: "no metadata here".to_string(), metadata: SourceMetadata::new() },
            DocHit { id: "x_1".to_string(), text: "also no metadata".to_string(), metadata: SourceMetadata::new() },
        ];
        let windows = group_into_windows(hits, 1000, 1000);
        assert_eq!(windows.len(), 2);
    }

    #[test]
    fn group_into_windows_splits_merges_exceeding_max_context_chars() {
        let hits = vec![
            doc_hit("a_0", &"x".repeat(30), "report.pdf", 0, 0),
            doc_hit("a_1", &"y".repeat(30), "report.pdf", 1, 1),
        ];
        let windows = group_into_windows(hits, 1000, 40);
        assert!(windows.len() >= 2);
        for window in &windows {
            assert!(window.text.chars().count() <= 40);
        }
    }
}
