//! Rewrites a user question into a set of search queries (component C2).
//!
//! Runs ahead of [`crate::retriever::Retriever`]: the retriever and the
//! external search tool both want queries that are short, self-contained and
//! unambiguous, which a raw user message frequently is not (anaphora, run-on
//! compound questions, narrow literal phrasing).

use std::collections::BTreeSet;

use schemars::JsonSchema;
use serde::Deserialize;
use unicode_segmentation::UnicodeSegmentation;
use vantage_dispatch::{AgentRole, DispatchCall, ModelCallDetails, ModelDispatcher, MissionStatusSource};

/// Rewriting strategy to apply to the original query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum QueryTechnique {
    /// One concise, specific rewrite; anaphora expanded using `domain_context`.
    ZeroShotRewrite,
    /// Decompose into independently answerable sub-questions.
    SubQuery,
    /// Emit one broader question preserving named entities.
    StepBack,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct ZeroShotRewriteResponse {
    rewritten_query: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct SubQueryResponse {
    sub_queries: Vec<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct StepBackResponse {
    broader_question: String,
}

/// The queries produced by [`QueryPreparer::prepare_queries`] plus every model
/// call spent producing them, so callers can fold cost/token accounting into
/// mission stats.
#[derive(Debug, Clone, Default)]
pub struct PreparedQuery {
    pub queries: Vec<String>,
    pub model_call_details: Vec<ModelCallDetails>,
}

/// Rewrites queries ahead of retrieval, backed by the shared model dispatcher.
pub struct QueryPreparer<'a> {
    dispatcher: &'a ModelDispatcher,
    agent_name: String,
    max_subqueries: usize,
}

impl<'a> QueryPreparer<'a> {
    #[must_use]
    pub fn new(dispatcher: &'a ModelDispatcher, agent_name: impl Into<String>, max_subqueries: usize) -> Self {
        Self {
            dispatcher,
            agent_name: agent_name.into(),
            max_subqueries: max_subqueries.max(1),
        }
    }

    /// Runs every requested technique, deduplicates the results preserving
    /// first-seen order, then refines any query exceeding `max_length`.
    pub async fn prepare_queries(
        &self,
        original_query: &str,
        techniques: &[QueryTechnique],
        domain_context: &str,
        mission_id: Option<&str>,
        max_length: usize,
        status: Option<&dyn MissionStatusSource>,
    ) -> Result<PreparedQuery, vantage_dispatch::DispatchError> {
        let mut out = PreparedQuery::default();

        for technique in techniques {
            let produced = match technique {
                QueryTechnique::ZeroShotRewrite => {
                    self.zero_shot_rewrite(original_query, domain_context, mission_id, status).await?
                }
                QueryTechnique::SubQuery => self.sub_query(original_query, mission_id, status).await?,
                QueryTechnique::StepBack => self.step_back(original_query, mission_id, status).await?,
            };
            out.queries.extend(produced.queries);
            out.model_call_details.extend(produced.model_call_details);
        }

        out.queries = dedup_preserve_order(out.queries);

        let mut refined = Vec::with_capacity(out.queries.len());
        for query in out.queries {
            if query.chars().count() <= max_length {
                refined.push(query);
                continue;
            }
            let (text, details) = self
                .refine_long_query(&query, max_length, mission_id, status)
                .await?;
            out.model_call_details.extend(details);
            refined.push(text);
        }
        out.queries = refined;

        Ok(out)
    }

    async fn zero_shot_rewrite(
        &self,
        original_query: &str,
        domain_context: &str,
        mission_id: Option<&str>,
        status: Option<&dyn MissionStatusSource>,
    ) -> Result<PreparedQuery, vantage_dispatch::DispatchError> {
        let prompt = format!(
            "Rewrite the following question into one concise, specific search query. \
             Expand any vague references (\"these\", \"those\", \"it\") using the named \
             entities available in the domain context below. Return JSON matching the schema.\n\n\
             Domain context:\n{domain_context}\n\nQuestion:\n{original_query}"
        );
        let call = self.call(prompt, mission_id);
        let (response, details): (ZeroShotRewriteResponse, ModelCallDetails) =
            self.dispatcher.dispatch_structured(call, status).await?;
        Ok(PreparedQuery {
            queries: vec![response.rewritten_query],
            model_call_details: vec![details],
        })
    }

    async fn sub_query(
        &self,
        original_query: &str,
        mission_id: Option<&str>,
        status: Option<&dyn MissionStatusSource>,
    ) -> Result<PreparedQuery, vantage_dispatch::DispatchError> {
        let prompt = format!(
            "Decompose the following question into at most {} independently answerable \
             sub-questions. Return JSON matching the schema.\n\nQuestion:\n{original_query}",
            self.max_subqueries
        );
        let call = self.call(prompt, mission_id);
        let (mut response, details): (SubQueryResponse, ModelCallDetails) =
            self.dispatcher.dispatch_structured(call, status).await?;
        response.sub_queries.truncate(self.max_subqueries);
        Ok(PreparedQuery {
            queries: response.sub_queries,
            model_call_details: vec![details],
        })
    }

    async fn step_back(
        &self,
        original_query: &str,
        mission_id: Option<&str>,
        status: Option<&dyn MissionStatusSource>,
    ) -> Result<PreparedQuery, vantage_dispatch::DispatchError> {
        let prompt = format!(
            "Emit exactly one broader question that generalizes the following question \
             while preserving its named entities. Return JSON matching the schema.\n\n\
             Question:\n{original_query}"
        );
        let call = self.call(prompt, mission_id);
        let (response, details): (StepBackResponse, ModelCallDetails) =
            self.dispatcher.dispatch_structured(call, status).await?;
        Ok(PreparedQuery {
            queries: vec![response.broader_question],
            model_call_details: vec![details],
        })
    }

    /// Refines `query` to fit `max_length` if (and only if) it exceeds it;
    /// otherwise returns it unchanged. Exposed for call sites that need
    /// length-safety ahead of a length-limited tool (e.g. `web_search`)
    /// without running a full rewrite/sub-query/step-back pass first.
    pub async fn refine_if_too_long(
        &self,
        query: &str,
        max_length: usize,
        mission_id: Option<&str>,
        status: Option<&dyn MissionStatusSource>,
    ) -> Result<(String, Vec<ModelCallDetails>), vantage_dispatch::DispatchError> {
        if query.chars().count() <= max_length {
            return Ok((query.to_string(), Vec::new()));
        }
        self.refine_long_query(query, max_length, mission_id, status).await
    }

    /// Asks the model to shorten a query that exceeds `max_length`, retrying
    /// up to 3 times, and falls back to word-boundary truncation with an
    /// ellipsis if the model keeps producing an oversized query.
    async fn refine_long_query(
        &self,
        query: &str,
        max_length: usize,
        mission_id: Option<&str>,
        status: Option<&dyn MissionStatusSource>,
    ) -> Result<(String, Vec<ModelCallDetails>), vantage_dispatch::DispatchError> {
        let mut details = Vec::new();
        for _ in 0..3 {
            let prompt = format!(
                "Shorten the following search query to at most {max_length} characters \
                 without losing its key terms. Return JSON matching the schema.\n\nQuery:\n{query}"
            );
            let call = self.call(prompt, mission_id);
            let (response, call_details): (ZeroShotRewriteResponse, ModelCallDetails) =
                self.dispatcher.dispatch_structured(call, status).await?;
            details.push(call_details);
            if response.rewritten_query.chars().count() <= max_length {
                return Ok((response.rewritten_query, details));
            }
        }
        Ok((truncate_on_word_boundary(query, max_length), details))
    }

    fn call(&self, prompt: String, mission_id: Option<&str>) -> DispatchCall {
        let mut call = DispatchCall::new(
            AgentRole::Fast,
            self.agent_name.clone(),
            vec![vantage_core::llm::Message::user(prompt)],
        );
        if let Some(mission_id) = mission_id {
            call = call.with_mission(mission_id);
        }
        call
    }
}

fn dedup_preserve_order(queries: Vec<String>) -> Vec<String> {
    let mut seen = BTreeSet::new();
    let mut out = Vec::with_capacity(queries.len());
    for query in queries {
        let key = query.trim().to_lowercase();
        if seen.insert(key) {
            out.push(query);
        }
    }
    out
}

/// Truncates on a Unicode word boundary at or before `max_length` characters,
/// appending an ellipsis.
fn truncate_on_word_boundary(text: &str, max_length: usize) -> String {
    if max_length == 0 {
        return String::new();
    }
    let budget = max_length.saturating_sub(1);
    let words: Vec<&str> = text.split_word_bounds().collect();
    let mut out = String::new();
    for word in words {
        if out.chars().count() + word.chars().count() > budget {
            break;
        }
        out.push_str(word);
    }
    if out.trim().is_empty() {
        out = text.chars().take(budget).collect();
    }
    format!("{}…", out.trim_end())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dedup_preserves_first_seen_casing_and_order() {
        let queries = vec!["Rust ownership".to_string(), "rust ownership".to_string(), "borrow checker".to_string()];
        let deduped = dedup_preserve_order(queries);
        assert_eq!(deduped, vec!["Rust ownership".to_string(), "borrow checker".to_string()]);
    }

    #[test]
    fn truncation_breaks_on_word_boundaries() {
        let text = "the quick brown fox jumps over the lazy dog";
        let truncated = truncate_on_word_boundary(text, 15);
        assert!(truncated.ends_with('…'));
        assert!(truncated.chars().count() <= 15);
    }

    #[test]
    fn truncation_handles_zero_length() {
        assert_eq!(truncate_on_word_boundary("anything", 0), "");
    }
}
