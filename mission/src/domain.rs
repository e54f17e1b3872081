//! Mission-scoped data model: missions, plans, report sections, notes, goals,
//! thoughts, execution log entries, and aggregate stats.
//!
//! These types are owned exclusively by the [`crate::store::MissionStore`] (the
//! Mission Context Manager); agents only ever see read-only snapshots built from
//! them and report changes back through the store's API.

use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};

/// Opaque identifier type alias; all mission-scoped ids are short, unique strings.
pub type MissionId = String;

/// Current lifecycle status of a mission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum MissionStatus {
    Pending,
    Planning,
    Researching,
    Writing,
    Completed,
    Failed,
    Paused,
    Stopped,
}

impl MissionStatus {
    /// Terminal statuses reject any further mutation.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Stopped)
    }

    /// Whether an in-flight agent should keep running under this status.
    #[must_use]
    pub const fn is_running(self) -> bool {
        !self.is_terminal() && !matches!(self, Self::Paused)
    }

    /// Returns `true` if transitioning from `self` to `next` is a legal status change.
    ///
    /// Terminal states never transition. `Paused` may only resume to the status it was
    /// paused from, which callers track separately (see [`crate::store::MissionStore`]).
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        if self.is_terminal() {
            return false;
        }
        match (self, next) {
            (Self::Pending, Self::Planning | Self::Stopped | Self::Failed) => true,
            (
                Self::Planning,
                Self::Researching | Self::Planning | Self::Stopped | Self::Failed,
            ) => true,
            (
                Self::Researching,
                Self::Writing | Self::Researching | Self::Stopped | Self::Failed,
            ) => true,
            (Self::Writing, Self::Completed | Self::Writing | Self::Stopped | Self::Failed) => {
                true
            }
            (_, Self::Paused) => true,
            (Self::Paused, _) => true,
            _ => false,
        }
    }
}

/// Free-form mission metadata (document group id, original settings echo, etc.).
pub type MissionMetadata = BTreeMap<String, String>;

/// One research task: its own state, notes, outline, and report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Mission {
    pub mission_id: MissionId,
    pub user_request: String,
    pub status: MissionStatus,
    pub metadata: MissionMetadata,
    pub created_at: u64,
    pub updated_at: u64,
}

impl Mission {
    #[must_use]
    pub fn new(mission_id: impl Into<MissionId>, user_request: impl Into<String>) -> Self {
        let now = unix_now();
        Self {
            mission_id: mission_id.into(),
            user_request: user_request.into(),
            status: MissionStatus::Pending,
            metadata: MissionMetadata::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Returns the mission's document group id, if one was set in metadata.
    #[must_use]
    pub fn document_group_id(&self) -> Option<&str> {
        self.metadata.get("document_group_id").map(String::as_str)
    }
}

#[must_use]
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// How a section's text is produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ResearchStrategy {
    /// Gathers its own notes through research.
    ResearchBased,
    /// Written from other already-written sections; no own research.
    ContentBased,
    /// Derived by synthesizing its subsections.
    SynthesizeFromSubsections,
}

/// One node in the `report_outline` tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportSection {
    pub section_id: String,
    pub title: String,
    pub description: String,
    pub research_strategy: ResearchStrategy,
    pub associated_note_ids: Vec<String>,
    pub subsections: Vec<ReportSection>,
}

impl ReportSection {
    #[must_use]
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            section_id: String::new(),
            title: title.into(),
            description: description.into(),
            research_strategy: ResearchStrategy::ResearchBased,
            associated_note_ids: Vec::new(),
            subsections: Vec::new(),
        }
    }

    #[must_use]
    pub fn is_leaf(&self) -> bool {
        self.subsections.is_empty()
    }

    /// Greatest depth of this subtree, with a lone root section counting as depth 0.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.subsections
            .iter()
            .map(|s| 1 + s.depth())
            .max()
            .unwrap_or(0)
    }

    /// Depth-first traversal yielding every section in the subtree, root first.
    pub fn walk(&self) -> impl Iterator<Item = &ReportSection> {
        let mut stack = vec![self];
        std::iter::from_fn(move || {
            let node = stack.pop()?;
            stack.extend(node.subsections.iter().rev());
            Some(node)
        })
    }

    /// Applies `f` to every section in the subtree, root first.
    pub fn for_each_mut(&mut self, f: &mut impl FnMut(&mut ReportSection)) {
        f(self);
        for child in &mut self.subsections {
            child.for_each_mut(f);
        }
    }
}

/// Heuristic classification of an intro/conclusion-like title, case-insensitive.
#[must_use]
pub fn looks_like_intro_or_conclusion(title: &str) -> bool {
    const MARKERS: &[&str] = &[
        "introduction",
        "intro",
        "conclusion",
        "concluding",
        "summary",
        "overview",
        "closing remarks",
    ];
    let lower = title.to_lowercase();
    MARKERS.iter().any(|m| lower.contains(m))
}

/// Mission-level plan: the goal statement and the outline tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    pub mission_goal: String,
    pub report_outline: Vec<ReportSection>,
    pub generated_thought: Option<String>,
}

impl Plan {
    #[must_use]
    pub fn new(mission_goal: impl Into<String>, report_outline: Vec<ReportSection>) -> Self {
        Self {
            mission_goal: mission_goal.into(),
            report_outline,
            generated_thought: None,
        }
    }

    /// Max depth across all top-level sections (root counts as depth 0).
    #[must_use]
    pub fn depth(&self) -> usize {
        self.report_outline.iter().map(ReportSection::depth).max().unwrap_or(0)
    }

    /// `true` if at least one leaf anywhere in the outline is `research_based`.
    #[must_use]
    pub fn has_research_based_leaf(&self) -> bool {
        self.report_outline.iter().any(|s| {
            s.walk()
                .any(|n| n.is_leaf() && n.research_strategy == ResearchStrategy::ResearchBased)
        })
    }
}

/// Where a Note's content came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    Document,
    Web,
    Internal,
}

/// Free-form source metadata: title, authors, year, URL, original filename, doc_id, ...
pub type SourceMetadata = BTreeMap<String, String>;

/// A factual extract grounded in a specific source; the unit of evidence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Note {
    pub note_id: String,
    pub content: String,
    pub source_type: SourceType,
    /// `doc_id` | URL | agent_name, depending on `source_type`.
    pub source_id: String,
    pub source_metadata: SourceMetadata,
    pub potential_sections: Vec<String>,
    pub is_relevant: bool,
    pub created_at: u64,
    /// For notes built by aggregating other notes (internal synthesis), the
    /// original sources they trace back to. Attached eagerly at creation time
    /// so writing-time citation lookups never need to follow pointers.
    pub aggregated_original_sources: Vec<String>,
}

impl Note {
    #[must_use]
    pub fn new(
        note_id: impl Into<String>,
        content: impl Into<String>,
        source_type: SourceType,
        source_id: impl Into<String>,
    ) -> Self {
        Self {
            note_id: note_id.into(),
            content: content.into(),
            source_type,
            source_id: source_id.into(),
            source_metadata: SourceMetadata::new(),
            potential_sections: Vec::new(),
            is_relevant: true,
            created_at: unix_now(),
            aggregated_original_sources: Vec::new(),
        }
    }

    /// Citable identifiers for this note: its own source, plus any aggregated ones.
    #[must_use]
    pub fn citable_source_ids(&self) -> Vec<&str> {
        if self.aggregated_original_sources.is_empty() {
            vec![self.source_id.as_str()]
        } else {
            self.aggregated_original_sources.iter().map(String::as_str).collect()
        }
    }

    /// Citation keys as they should appear in a bracketed citation: document
    /// ids pass through verbatim, web URLs collapse to their 8-hex digest, and
    /// already-aggregated sources (resolved at creation time) pass through too.
    #[must_use]
    pub fn citation_keys(&self) -> Vec<String> {
        if !self.aggregated_original_sources.is_empty() {
            return self.aggregated_original_sources.clone();
        }
        match self.source_type {
            SourceType::Web => vec![web_citation_key(&self.source_id)],
            SourceType::Document | SourceType::Internal => vec![self.source_id.clone()],
        }
    }
}

/// First 8 hex characters of the SHA-1 digest of a (trimmed, lowercased)
/// URL; the bracketed citation key for web sources, `[hash8(url)]`.
/// Collisions are accepted, not handled: 8 hex chars is a UI-sized key, not a
/// uniqueness guarantee.
#[must_use]
pub fn web_citation_key(url: &str) -> String {
    let digest = Sha1::digest(url.trim().to_lowercase().as_bytes());
    digest.iter().take(4).map(|b| format!("{b:02x}")).collect()
}

/// Status of a goal constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum GoalStatus {
    Active,
    Addressed,
    Obsolete,
}

/// Advisory classification of what a goal is about. Never a closed vocabulary:
/// `Other` always accepts free text, so this tags goals for UI/analytics only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum GoalKind {
    Tone,
    Audience,
    Length,
    Format,
    SourcePreference,
    Other,
}

/// A user- or agent-asserted constraint (tone, audience, length, format, preferred source type).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoalEntry {
    pub goal_id: String,
    pub text: String,
    pub status: GoalStatus,
    pub kind: GoalKind,
    pub source_agent: String,
    pub timestamp: u64,
}

impl GoalEntry {
    #[must_use]
    pub fn new(goal_id: impl Into<String>, text: impl Into<String>, source_agent: impl Into<String>) -> Self {
        Self {
            goal_id: goal_id.into(),
            text: text.into(),
            status: GoalStatus::Active,
            kind: GoalKind::Other,
            source_agent: source_agent.into(),
            timestamp: unix_now(),
        }
    }

    #[must_use]
    pub fn with_kind(mut self, kind: GoalKind) -> Self {
        self.kind = kind;
        self
    }
}

/// A short, FIFO-bounded mental-state trace carried across agent calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThoughtEntry {
    pub agent_name: String,
    pub content: String,
    pub timestamp: u64,
}

impl ThoughtEntry {
    #[must_use]
    pub fn new(agent_name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            agent_name: agent_name.into(),
            content: content.into(),
            timestamp: unix_now(),
        }
    }
}

/// Outcome of one execution step, for the live UI feed and the durable log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Success,
    Failure,
}

/// Token/cost accounting attached to one model call.
///
/// This is the Model Dispatcher's own output contract, not a mission-specific
/// type; re-exported here so callers that only see mission types never need to
/// reach into `vantage_dispatch` directly.
pub use vantage_dispatch::ModelCallDetails;

/// One append-only entry in a mission's execution log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionLogEntry {
    pub timestamp: u64,
    /// Monotonic insertion sequence, used to break ties within the same wall-clock second.
    pub sequence: u64,
    pub agent_name: String,
    pub action: String,
    pub status: ExecutionStatus,
    pub input_summary: String,
    pub output_summary: String,
    pub full_input: Option<String>,
    pub full_output: Option<String>,
    pub error_message: Option<String>,
    pub model_details: Option<ModelCallDetails>,
    pub tool_calls: Vec<String>,
}

impl ExecutionLogEntry {
    #[must_use]
    pub fn success(agent_name: impl Into<String>, action: impl Into<String>, output_summary: impl Into<String>) -> Self {
        Self {
            timestamp: unix_now(),
            sequence: 0,
            agent_name: agent_name.into(),
            action: action.into(),
            status: ExecutionStatus::Success,
            input_summary: String::new(),
            output_summary: output_summary.into(),
            full_input: None,
            full_output: None,
            error_message: None,
            model_details: None,
            tool_calls: Vec::new(),
        }
    }

    #[must_use]
    pub fn failure(agent_name: impl Into<String>, action: impl Into<String>, error_message: impl Into<String>) -> Self {
        Self {
            timestamp: unix_now(),
            sequence: 0,
            agent_name: agent_name.into(),
            action: action.into(),
            status: ExecutionStatus::Failure,
            input_summary: String::new(),
            output_summary: String::new(),
            full_input: None,
            full_output: None,
            error_message: Some(error_message.into()),
            model_details: None,
            tool_calls: Vec::new(),
        }
    }
}

/// Cumulative token/cost/tool-call counters for a mission, including per-agent breakdowns.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MissionStats {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub native_tokens: u64,
    pub cost_usd: f64,
    pub web_search_count: u64,
    pub per_agent: BTreeMap<String, AgentStats>,
}

/// Per-agent slice of [`MissionStats`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentStats {
    pub calls: u64,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub cost_usd: f64,
}

impl MissionStats {
    /// Atomically folds one model call's accounting into the running totals.
    pub fn record_call(&mut self, details: &ModelCallDetails) {
        self.prompt_tokens += u64::from(details.prompt_tokens);
        self.completion_tokens += u64::from(details.completion_tokens);
        self.native_tokens += u64::from(details.native_tokens);
        self.cost_usd += details.cost_usd;

        let agent = self.per_agent.entry(details.agent_name.clone()).or_default();
        agent.calls += 1;
        agent.prompt_tokens += u64::from(details.prompt_tokens);
        agent.completion_tokens += u64::from(details.completion_tokens);
        agent.cost_usd += details.cost_usd;
    }

    pub fn record_web_search(&mut self) {
        self.web_search_count += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_transitions() {
        assert!(MissionStatus::Pending.can_transition_to(MissionStatus::Planning));
        assert!(!MissionStatus::Completed.can_transition_to(MissionStatus::Researching));
        assert!(MissionStatus::Researching.can_transition_to(MissionStatus::Paused));
    }

    #[test]
    fn outline_depth() {
        let leaf = ReportSection::new("Methods", "How the study was run");
        let mut root = ReportSection::new("Background", "Context for the study");
        root.subsections.push(leaf);
        assert_eq!(root.depth(), 1);

        let plan = Plan::new("goal", vec![root]);
        assert_eq!(plan.depth(), 1);
    }

    #[test]
    fn research_based_leaf_detection() {
        let mut leaf = ReportSection::new("Methods", "How the study was run");
        leaf.research_strategy = ResearchStrategy::ResearchBased;
        let plan = Plan::new("goal", vec![leaf]);
        assert!(plan.has_research_based_leaf());
    }

    #[test]
    fn intro_conclusion_detection() {
        assert!(looks_like_intro_or_conclusion("Introduction"));
        assert!(looks_like_intro_or_conclusion("Concluding Remarks"));
        assert!(!looks_like_intro_or_conclusion("Methods"));
    }

    #[test]
    fn note_citable_sources_fall_back_to_own_id() {
        let note = Note::new("n1", "text", SourceType::Document, "doc-42");
        assert_eq!(note.citable_source_ids(), vec!["doc-42"]);
    }

    #[test]
    fn note_citable_sources_prefer_aggregated() {
        let mut note = Note::new("n1", "text", SourceType::Internal, "synth-agent");
        note.aggregated_original_sources = vec!["doc-1".into(), "doc-2".into()];
        assert_eq!(note.citable_source_ids(), vec!["doc-1", "doc-2"]);
    }

    #[test]
    fn web_citation_key_is_stable_and_case_insensitive() {
        let a = web_citation_key("https://Example.com/Page");
        let b = web_citation_key("https://example.com/page");
        assert_eq!(a, b);
        assert_eq!(a.len(), 8);
    }

    #[test]
    fn note_citation_keys_hash_web_sources() {
        let note = Note::new("n1", "text", SourceType::Web, "https://example.com/page");
        let keys = note.citation_keys();
        assert_eq!(keys, vec![web_citation_key("https://example.com/page")]);
    }

    #[test]
    fn note_citation_keys_pass_through_documents() {
        let note = Note::new("n1", "text", SourceType::Document, "doc-42");
        assert_eq!(note.citation_keys(), vec!["doc-42".to_string()]);
    }

    #[test]
    fn stats_accumulate_per_agent() {
        let mut stats = MissionStats::default();
        stats.record_call(&ModelCallDetails {
            agent_name: "research".into(),
            prompt_tokens: 100,
            completion_tokens: 50,
            cost_usd: 0.01,
            ..Default::default()
        });
        stats.record_call(&ModelCallDetails {
            agent_name: "research".into(),
            prompt_tokens: 20,
            completion_tokens: 10,
            cost_usd: 0.002,
            ..Default::default()
        });
        assert_eq!(stats.prompt_tokens, 120);
        assert_eq!(stats.per_agent["research"].calls, 2);
    }
}
