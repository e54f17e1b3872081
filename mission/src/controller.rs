//! The Agent Controller (design §4.8, component C8): the state machine that
//! drives one mission from a user's first message through to a finished,
//! cited report. Every other component in this crate is a tool the
//! Controller reaches for at the right moment — it owns no domain state of
//! its own beyond a per-mission chat transcript, deferring everything
//! durable to [`MissionStore`].
//!
//! Concurrency is bounded by a single [`Semaphore`] sized to
//! `max_concurrent_requests`; within that budget, independent work (sections
//! of a structured research round) runs concurrently via
//! [`futures::future::join_all`] rather than `tokio::spawn`, matching the
//! single-threaded cooperative scheduling model described in design §5 —
//! tasks interleave at `.await` points but never run on separate OS threads
//! from the Controller's point of view.

use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::sync::Arc;
use std::sync::OnceLock;

use futures::future::{join_all, BoxFuture};
use regex::{Captures, Regex};
use tokio::sync::{Mutex, Semaphore};
use vantage_core::llm::{Message, Role};
use vantage_dispatch::{ModelCallDetails, ModelDispatcher, MissionStatusSource};

use crate::agents::{
    ExtractedNote, Intent, MessengerAgent, MessengerOutput, NoteAssignmentAgent, PlanningAgent, ReflectionAgent,
    ResearchAgent, ResearchConfig, WritingAgent, WritingReflectionAgent,
};
use crate::agents::{goals_summary, notes_summary, outline_summary, truncate_chars, AgentCtx};
use crate::config::MissionConfig;
use crate::context::ConversationMemory;
use crate::domain::{
    GoalEntry, GoalKind, MissionId, MissionMetadata, MissionStatus, Note, Plan, ReportSection, ResearchStrategy,
    SourceType, ThoughtEntry,
};
use crate::error::Result;
use crate::store::{MissionContext, MissionStore};
use crate::tools::{ToolCallContext, ToolRegistry};

/// Caps how many of a Reflection pass's `new_questions` feed the next
/// structured research round. No [`MissionConfig`] field covers this (see
/// DESIGN.md); unbounded carry-over would let one badly-behaved reflection
/// blow up round N+1's fan-out.
const NEW_QUESTIONS_PER_ROUND_CAP: usize = 5;

/// Metadata key the Controller uses to park the Messenger-surfaced initial
/// exploratory questions between `start_research` and `approve_questions`.
const PENDING_QUESTIONS_KEY: &str = "pending_questions";

/// Presentation-level view over [`MissionStatus`]: one variant per node in
/// the mission lifecycle diagram. `questioning` has no dedicated
/// [`MissionStatus`] of its own — it reuses `Planning`, since both are "the
/// mission is still being shaped by conversation" states from the store's
/// point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissionPhase {
    Idle,
    Questioning,
    Researching,
    Writing,
    Completed,
    Failed,
    Paused,
    Stopped,
}

impl MissionPhase {
    #[must_use]
    pub const fn from_status(status: MissionStatus) -> Self {
        match status {
            MissionStatus::Pending => Self::Idle,
            MissionStatus::Planning => Self::Questioning,
            MissionStatus::Researching => Self::Researching,
            MissionStatus::Writing => Self::Writing,
            MissionStatus::Completed => Self::Completed,
            MissionStatus::Failed => Self::Failed,
            MissionStatus::Paused => Self::Paused,
            MissionStatus::Stopped => Self::Stopped,
        }
    }
}

/// What a single chat turn produced: the text to show the user, and the
/// phase the mission is in once the turn (and anything it kicked off) settles.
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    pub response_to_user: String,
    pub phase: MissionPhase,
}

/// Drives missions through their full lifecycle: Messenger-routed chat,
/// initial exploration, structured research, note assignment, writing, and
/// citation finalization.
pub struct MissionController {
    store: Arc<MissionStore>,
    dispatcher: Arc<ModelDispatcher>,
    tools: Arc<ToolRegistry>,
    config: MissionConfig,
    research_config: ResearchConfig,
    semaphore: Arc<Semaphore>,
    chat_histories: Mutex<HashMap<MissionId, ConversationMemory>>,
}

impl MissionController {
    #[must_use]
    pub fn new(store: Arc<MissionStore>, dispatcher: Arc<ModelDispatcher>, tools: Arc<ToolRegistry>, config: MissionConfig) -> Self {
        let semaphore = Arc::new(Semaphore::new(config.max_concurrent_requests.max(1)));
        Self {
            store,
            dispatcher,
            tools,
            config,
            research_config: ResearchConfig::default(),
            semaphore,
            chat_histories: Mutex::new(HashMap::new()),
        }
    }

    /// Creates a new mission, delegating straight to the context manager.
    pub fn create_mission(&self, user_request: impl Into<String>, metadata: MissionMetadata) -> Result<MissionId> {
        self.store.create_mission(user_request, metadata)
    }

    /// A handle other components (tools, a UI layer) can poll for cancellation.
    #[must_use]
    pub fn status_source(&self) -> Arc<MissionStore> {
        Arc::clone(&self.store)
    }

    /// Pauses a running mission; it can later be resumed to the status it was paused from.
    pub fn pause(&self, mission_id: &str) -> Result<()> {
        self.store.pause(mission_id)
    }

    /// Resumes a paused mission.
    pub fn resume(&self, mission_id: &str) -> Result<MissionStatus> {
        self.store.resume(mission_id)
    }

    /// Stops a mission outright; this is terminal, unlike pause.
    pub fn stop(&self, mission_id: &str) -> Result<()> {
        self.store.update_status(mission_id, MissionStatus::Stopped)
    }

    /// Handles one chat turn: classifies the user's message with Messenger,
    /// then routes to the matching intent handler. `ApproveQuestions` is the
    /// one intent that drives the mission all the way through research and
    /// writing before this call returns.
    pub async fn handle_message(&self, mission_id: &str, user_message: &str) -> Result<TurnOutcome> {
        self.remember_message(mission_id, Message::user(user_message.to_string())).await;

        let snapshot = self.store.get(mission_id)?;
        let chat_history = self.chat_history_text(mission_id).await;
        let mission_context_summary = summarize_mission(&snapshot);
        let active_thoughts = thoughts_text(&snapshot);
        let agent_scratchpad = snapshot.mission.metadata.get(PENDING_QUESTIONS_KEY).cloned().unwrap_or_default();

        let messenger = MessengerAgent::new(&self.dispatcher, &self.config);
        let (output, details) = messenger
            .classify(user_message, &chat_history, &mission_context_summary, &active_thoughts, &agent_scratchpad, self.agent_ctx(mission_id))
            .await?;
        self.record_call(mission_id, "messenger", &details).await?;
        self.remember_message(mission_id, Message::assistant(output.response_to_user.clone())).await;
        if !output.thoughts.trim().is_empty() {
            self.store.add_thought(mission_id, ThoughtEntry::new("messenger", output.thoughts.clone()))?;
        }

        let phase = match output.intent {
            Intent::StartResearch => self.start_research(mission_id, &output).await?,
            Intent::RefineQuestions => self.refine_questions(mission_id, &output).await?,
            Intent::RefineGoal => self.refine_goal(mission_id, &output).await?,
            Intent::ApproveQuestions => self.approve_questions(mission_id).await?,
            Intent::Chat => self.current_phase(mission_id),
        };

        Ok(TurnOutcome { response_to_user: output.response_to_user, phase })
    }

    /// `idle -> questioning`: generates the first wave of exploratory
    /// questions and parks them as pending metadata for the user to approve
    /// or refine; no research happens yet.
    async fn start_research(&self, mission_id: &str, output: &MessengerOutput) -> Result<MissionPhase> {
        self.store.update_status(mission_id, MissionStatus::Planning)?;
        if let Some(preference) = &output.formatting_preferences {
            self.add_goal_from_preference(mission_id, preference, "messenger")?;
        }

        let ctx = self.store.get(mission_id)?;
        let active_goals = goals_summary(&ctx.active_goals().into_iter().cloned().collect::<Vec<_>>());
        let research = ResearchAgent::new(&self.dispatcher, &self.tools, &self.config, self.research_config);
        let (questions, details) = research
            .generate_initial_questions(&ctx.mission.user_request, &active_goals, self.agent_ctx(mission_id))
            .await?;
        self.record_call(mission_id, "research", &details).await?;
        self.store.set_metadata(mission_id, PENDING_QUESTIONS_KEY, questions.join("\n"))?;
        Ok(MissionPhase::Questioning)
    }

    /// `questioning -> questioning`: the user asked for different or
    /// additional exploratory questions before approving.
    async fn refine_questions(&self, mission_id: &str, output: &MessengerOutput) -> Result<MissionPhase> {
        if let Some(content) = &output.extracted_content {
            self.store.set_metadata(mission_id, PENDING_QUESTIONS_KEY, content.clone())?;
        }
        Ok(MissionPhase::Questioning)
    }

    /// `questioning -> questioning`: the user asserted a standing constraint
    /// (tone, audience, length, format, source preference) that should
    /// shape every later agent call, not just the next one.
    async fn refine_goal(&self, mission_id: &str, output: &MessengerOutput) -> Result<MissionPhase> {
        if let Some(preference) = &output.formatting_preferences {
            self.add_goal_from_preference(mission_id, preference, "messenger")?;
        }
        if let Some(content) = &output.extracted_content {
            self.add_goal_from_preference(mission_id, content, "messenger")?;
        }
        Ok(MissionPhase::Questioning)
    }

    fn add_goal_from_preference(&self, mission_id: &str, text: &str, source_agent: &str) -> Result<()> {
        let kind = classify_goal_kind(text);
        let goal_id = format!("goal-{}-{}", mission_id, crate::domain::unix_now());
        self.store.add_goal(mission_id, GoalEntry::new(goal_id, text.to_string(), source_agent).with_kind(kind))
    }

    /// `questioning -> researching -> writing -> completed`: runs the whole
    /// remaining mission pipeline to completion, failure, or an
    /// externally-requested pause/stop. On any error escaping the pipeline
    /// the mission moves to `failed`.
    async fn approve_questions(&self, mission_id: &str) -> Result<MissionPhase> {
        self.store.update_status(mission_id, MissionStatus::Researching)?;
        match self.run_mission_pipeline(mission_id).await {
            Ok(phase) => Ok(phase),
            Err(err) => {
                let _ = self.store.update_status(mission_id, MissionStatus::Failed);
                Err(err)
            }
        }
    }

    async fn run_mission_pipeline(&self, mission_id: &str) -> Result<MissionPhase> {
        let mut plan = self.run_initial_exploration(mission_id).await?;
        if !self.still_running(mission_id) {
            return Ok(self.current_phase(mission_id));
        }

        self.run_structured_research(mission_id, &mut plan).await?;
        if !self.still_running(mission_id) {
            return Ok(self.current_phase(mission_id));
        }

        self.assign_notes(mission_id, &mut plan).await?;
        self.store.store_plan(mission_id, plan.clone())?;
        if !self.still_running(mission_id) {
            return Ok(self.current_phase(mission_id));
        }

        self.store.update_status(mission_id, MissionStatus::Writing)?;
        self.run_writing(mission_id, &mut plan).await?;
        if !self.still_running(mission_id) {
            return Ok(self.current_phase(mission_id));
        }

        self.store.update_status(mission_id, MissionStatus::Completed)?;
        Ok(MissionPhase::Completed)
    }

    /// Initial exploration (design §4.8): generates the seed questions (or
    /// reuses the approved pending ones), BFS-explores them bounded by
    /// `initial_research_max_depth`/`initial_research_max_questions`, stores
    /// every note surfaced along the way, then calls Planning Phase 1 and 2
    /// to produce the first outline.
    async fn run_initial_exploration(&self, mission_id: &str) -> Result<Plan> {
        let ctx = self.store.get(mission_id)?;
        let pending = ctx.mission.metadata.get(PENDING_QUESTIONS_KEY).cloned().unwrap_or_default();
        let seeds: Vec<String> = pending
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect();
        let seeds = if seeds.is_empty() { vec![ctx.mission.user_request.clone()] } else { seeds };

        let research = ResearchAgent::new(&self.dispatcher, &self.tools, &self.config, self.research_config);
        let mut frontier: VecDeque<(String, usize)> = seeds.into_iter().map(|q| (q, 0)).collect();
        let mut scratchpad = String::new();
        let mut asked = 0usize;

        while let Some((question, depth)) = frontier.pop_front() {
            if !self.still_running(mission_id) || asked >= self.config.initial_research_max_questions {
                break;
            }
            asked += 1;

            let tool_ctx = self.tool_ctx(mission_id, "research")?;
            let remaining = self.config.initial_research_max_questions.saturating_sub(asked);
            let outcome = research
                .explore_question(
                    &question,
                    depth,
                    self.config.initial_research_max_depth,
                    remaining,
                    &scratchpad,
                    &tool_ctx,
                    self.agent_ctx(mission_id),
                )
                .await?;

            for details in &outcome.model_call_details {
                self.record_call(mission_id, "research", details).await?;
            }
            for _ in 0..outcome.web_search_count {
                self.store.record_web_search(mission_id)?;
            }
            scratchpad = outcome.updated_scratchpad;

            if !outcome.notes.is_empty() {
                let notes = outcome.notes.into_iter().map(extracted_to_note).collect();
                self.store.store_notes(mission_id, notes)?;
            }

            if depth < self.config.initial_research_max_depth {
                for sub_question in outcome.new_sub_questions {
                    if asked + frontier.len() >= self.config.initial_research_max_questions {
                        break;
                    }
                    frontier.push_back((sub_question, depth + 1));
                }
            }
        }

        let ctx = self.store.get(mission_id)?;
        let active_goals = goals_summary(&ctx.active_goals().into_iter().cloned().collect::<Vec<_>>());
        let planning = PlanningAgent::new(&self.dispatcher, &self.config);
        let phase1 = planning.phase1(&ctx.mission.user_request, &active_goals, &scratchpad, self.agent_ctx(mission_id)).await?;
        for details in &phase1.model_call_details {
            self.record_call(mission_id, "planning", details).await?;
        }

        let ctx = self.store.get(mission_id)?;
        let notes_preview_chars = self.config.research_note_content_limit.min(400);
        let notes_text = notes_summary(&ctx.active_notes().into_iter().cloned().collect::<Vec<_>>(), notes_preview_chars);
        let phase2 = planning.phase2(&phase1.outline, &notes_text, self.agent_ctx(mission_id)).await?;
        for details in &phase2.model_call_details {
            self.record_call(mission_id, "planning", details).await?;
        }

        let plan = Plan::new(ctx.mission.user_request.clone(), phase2.outline);
        self.store.store_plan(mission_id, plan.clone())?;
        Ok(plan)
    }

    /// Structured research (design §4.8): for `structured_research_rounds`
    /// iterations, runs every `research_based` leaf section's round
    /// concurrently (bounded by the semaphore), folds each section's
    /// Reflection pass into the next round's focus questions, and — unless
    /// `skip_final_replanning` is set — applies proposed modifications
    /// through Planning Phase 3 between rounds only.
    async fn run_structured_research(&self, mission_id: &str, plan: &mut Plan) -> Result<()> {
        let mut focus_questions: HashMap<String, Vec<String>> = HashMap::new();
        let mut section_notes: HashMap<String, Vec<String>> = HashMap::new();

        for round in 0..self.config.structured_research_rounds {
            if !self.still_running(mission_id) {
                break;
            }

            let mut sections = Vec::new();
            collect_research_based(&plan.report_outline, &mut sections);
            if sections.is_empty() {
                break;
            }

            let results = join_all(sections.iter().map(|section| {
                let focus = focus_questions.get(&section.section_id).cloned().unwrap_or_default();
                self.run_one_research_round(mission_id, section, focus)
            }))
            .await;

            let mut round_modifications = Vec::new();
            for (section, result) in sections.iter().zip(results) {
                let outcome = result?;
                for details in &outcome.model_call_details {
                    self.record_call(mission_id, "research", details).await?;
                }
                for _ in 0..outcome.web_search_count {
                    self.store.record_web_search(mission_id)?;
                }
                let notes: Vec<Note> = outcome.notes.into_iter().map(extracted_to_note).collect();
                let stored_ids = self.store.store_notes(mission_id, notes)?;
                section_notes.entry(section.section_id.clone()).or_default().extend(stored_ids);

                let ctx = self.store.get(mission_id)?;
                let notes_for_section: Vec<Note> = section_notes
                    .get(&section.section_id)
                    .into_iter()
                    .flatten()
                    .filter_map(|id| ctx.notes.iter().find(|n| &n.note_id == id).cloned())
                    .collect();
                let active_goals = self.store.get_active_goals(mission_id)?;
                let active_thoughts = thoughts_text(&ctx);
                let reflection = ReflectionAgent::new(&self.dispatcher, &self.config);
                let (reflection_output, details) = reflection
                    .review(section, &notes_for_section, &active_goals, &active_thoughts, self.agent_ctx(mission_id))
                    .await?;
                self.record_call(mission_id, "reflection", &details).await?;

                if !reflection_output.discard_note_ids.is_empty() {
                    self.store.discard_notes(mission_id, &reflection_output.discard_note_ids)?;
                }
                let mut new_questions = reflection_output.new_questions;
                new_questions.truncate(NEW_QUESTIONS_PER_ROUND_CAP);
                focus_questions.insert(section.section_id.clone(), new_questions);
                if !reflection_output.proposed_modifications.trim().is_empty() {
                    round_modifications.push(reflection_output.proposed_modifications);
                }
                if let Some(thought) = reflection_output.generated_thought {
                    self.store.add_thought(mission_id, ThoughtEntry::new("reflection", thought))?;
                }
            }

            let has_next_round = round + 1 < self.config.structured_research_rounds;
            if !self.config.skip_final_replanning && has_next_round && !round_modifications.is_empty() {
                let planning = PlanningAgent::new(&self.dispatcher, &self.config);
                let phase3 = planning
                    .phase3(&plan.report_outline, &round_modifications.join("\n\n"), self.agent_ctx(mission_id))
                    .await?;
                for details in &phase3.model_call_details {
                    self.record_call(mission_id, "planning", details).await?;
                }
                plan.report_outline = phase3.outline;
                self.store.store_plan(mission_id, plan.clone())?;
            }
        }
        Ok(())
    }

    async fn run_one_research_round(
        &self,
        mission_id: &str,
        section: &ReportSection,
        focus_questions: Vec<String>,
    ) -> Result<crate::agents::ResearchRoundOutput> {
        let _permit = self.semaphore.acquire().await.expect("controller semaphore is never closed");
        let research = ResearchAgent::new(&self.dispatcher, &self.tools, &self.config, self.research_config);
        let tool_ctx = self.tool_ctx(mission_id, "research")?;
        research.research_round(section, &focus_questions, &tool_ctx, self.agent_ctx(mission_id)).await
    }

    /// Note assignment (design §4.8): calls NoteAssignment once per
    /// `research_based` leaf, telling it which notes earlier sections
    /// already claimed so the union across sections covers every note at
    /// least once where possible.
    async fn assign_notes(&self, mission_id: &str, plan: &mut Plan) -> Result<()> {
        let ctx = self.store.get(mission_id)?;
        let all_notes: Vec<Note> = ctx.active_notes().into_iter().cloned().collect();
        let note_assignment = NoteAssignmentAgent::new(&self.dispatcher, &self.config);
        let mut already_assigned: Vec<String> = Vec::new();

        let mut sections = Vec::new();
        collect_research_based_mut(&mut plan.report_outline, &mut sections);
        for section in sections {
            if !self.still_running(mission_id) {
                break;
            }
            let (ids, details) = note_assignment.assign(section, &all_notes, &already_assigned, self.agent_ctx(mission_id)).await?;
            self.record_call(mission_id, "note_assignment", &details).await?;
            already_assigned.extend(ids.iter().cloned());
            section.associated_note_ids = ids;
        }
        Ok(())
    }

    /// Writing (design §4.8): a post-order pass drafts every `research_based`
    /// leaf and synthesizes every `synthesize_from_subsections` parent once
    /// its children are written, then a second, flat, outline-ordered pass
    /// drafts every `content_based` section against everything written so
    /// far. Each drafted section goes through `writing_passes - 1`
    /// WritingReflection revision rounds. Citation finalization runs last.
    async fn run_writing(&self, mission_id: &str, plan: &mut Plan) -> Result<()> {
        let ctx = self.store.get(mission_id)?;
        let all_notes = ctx.notes.clone();
        let outline_context = outline_summary(&plan.report_outline);
        let mut content: BTreeMap<String, String> = BTreeMap::new();

        for section in &mut plan.report_outline {
            if !self.still_running(mission_id) {
                return Ok(());
            }
            self.write_section_postorder(mission_id, section, &all_notes, &outline_context, &mut content).await?;
        }

        let mut content_based = Vec::new();
        collect_content_based_mut(&mut plan.report_outline, &mut content_based);
        for section in content_based {
            if !self.still_running(mission_id) {
                return Ok(());
            }
            let accumulated = render_accumulated(&content);
            let active_goals = self.store.get_active_goals(mission_id)?;
            let active_thoughts = thoughts_text(&self.store.get(mission_id)?);
            let writing = WritingAgent::new(&self.dispatcher, &self.config);
            let (draft, details) = writing
                .draft_section(section, &outline_context, &accumulated, &[], &active_goals, &active_thoughts, self.agent_ctx(mission_id))
                .await?;
            self.record_call(mission_id, "writing", &details).await?;
            let final_text = self.run_revision_passes(mission_id, section, draft, &[]).await?;
            content.insert(section.section_id.clone(), final_text.clone());
            self.store.store_report_section(mission_id, &section.section_id, final_text)?;
        }

        if !self.still_running(mission_id) {
            return Ok(());
        }
        self.finalize_citations(mission_id, plan).await
    }

    fn write_section_postorder<'a>(
        &'a self,
        mission_id: &'a str,
        section: &'a mut ReportSection,
        all_notes: &'a [Note],
        outline_context: &'a str,
        content: &'a mut BTreeMap<String, String>,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            if !section.is_leaf() {
                for child in &mut section.subsections {
                    self.write_section_postorder(mission_id, child, all_notes, outline_context, content).await?;
                }
            }
            if !self.still_running(mission_id) {
                return Ok(());
            }

            match section.research_strategy {
                ResearchStrategy::ResearchBased => {
                    let notes: Vec<Note> = section
                        .associated_note_ids
                        .iter()
                        .filter_map(|id| all_notes.iter().find(|n| &n.note_id == id && n.is_relevant).cloned())
                        .collect();
                    let final_text = if notes.is_empty() {
                        format!("*No research material was gathered for \"{}\".*", section.title)
                    } else {
                        let preview = truncate_chars(&render_accumulated(content), self.config.writing_previous_content_preview_chars);
                        let active_goals = self.store.get_active_goals(mission_id)?;
                        let active_thoughts = thoughts_text(&self.store.get(mission_id)?);
                        let writing = WritingAgent::new(&self.dispatcher, &self.config);
                        let (draft, details) = writing
                            .draft_section(section, outline_context, &preview, &notes, &active_goals, &active_thoughts, self.agent_ctx(mission_id))
                            .await?;
                        self.record_call(mission_id, "writing", &details).await?;
                        self.run_revision_passes(mission_id, section, draft, &notes).await?
                    };
                    content.insert(section.section_id.clone(), final_text.clone());
                    self.store.store_report_section(mission_id, &section.section_id, final_text)?;
                }
                ResearchStrategy::SynthesizeFromSubsections => {
                    let subsections_content = section
                        .subsections
                        .iter()
                        .filter_map(|child| content.get(&child.section_id).map(|text| format!("### {}\n\n{text}", child.title)))
                        .collect::<Vec<_>>()
                        .join("\n\n");
                    let writing = WritingAgent::new(&self.dispatcher, &self.config);
                    let (draft, details) = writing.synthesize_intro(section, &subsections_content, self.agent_ctx(mission_id)).await?;
                    self.record_call(mission_id, "writing", &details).await?;
                    content.insert(section.section_id.clone(), draft.clone());
                    self.store.store_report_section(mission_id, &section.section_id, draft)?;
                }
                ResearchStrategy::ContentBased => {}
            }
            Ok(())
        })
    }

    async fn run_revision_passes(&self, mission_id: &str, section: &ReportSection, mut draft: String, notes: &[Note]) -> Result<String> {
        if self.config.writing_passes == 0 {
            return Ok(draft);
        }
        let writing_reflection = WritingReflectionAgent::new(&self.dispatcher, &self.config);
        let writing = WritingAgent::new(&self.dispatcher, &self.config);
        for _ in 0..self.config.writing_passes.saturating_sub(1) {
            if !self.still_running(mission_id) {
                break;
            }
            let active_goals = self.store.get_active_goals(mission_id)?;
            let (review, details) = writing_reflection.review(section, &draft, &active_goals, self.agent_ctx(mission_id)).await?;
            self.record_call(mission_id, "writing_reflection", &details).await?;
            if review.change_suggestions.is_empty() {
                break;
            }
            let suggestions = review
                .change_suggestions
                .iter()
                .map(|s| format!("- ({:?}) {}: {}", s.priority, s.issue_description, s.suggested_change))
                .collect::<Vec<_>>()
                .join("\n");
            let (revised, details) = writing.revise_section(section, &draft, &suggestions, notes, self.agent_ctx(mission_id)).await?;
            self.record_call(mission_id, "writing", &details).await?;
            draft = revised;
        }
        Ok(draft)
    }

    /// Citation finalization: rewrites every stored section's bracket
    /// citation keys to sequential numbers in first-occurrence reading
    /// order, then stores a numbered References section.
    async fn finalize_citations(&self, mission_id: &str, plan: &Plan) -> Result<()> {
        let ctx = self.store.get(mission_id)?;
        let mut ordered = Vec::new();
        collect_ordered_content(&plan.report_outline, &ctx.report_sections, &mut ordered);

        let (rewritten, order) = renumber_citations(&ordered);
        for (section_id, text) in rewritten {
            self.store.store_report_section(mission_id, &section_id, text)?;
        }

        let index = citation_index(&ctx.notes);
        let references = render_references(&order, &index);
        self.store.store_report_section(mission_id, "references", references)?;
        Ok(())
    }

    async fn record_call(&self, mission_id: &str, agent_name: &str, details: &ModelCallDetails) -> Result<()> {
        self.store.update_mission_stats(mission_id, details)?;
        tracing::debug!(
            mission_id,
            agent = agent_name,
            prompt_tokens = details.prompt_tokens,
            completion_tokens = details.completion_tokens,
            cost_usd = details.cost_usd,
            "agent model call"
        );
        Ok(())
    }

    fn agent_ctx<'a>(&'a self, mission_id: &'a str) -> AgentCtx<'a> {
        AgentCtx::new(Some(mission_id), Some(self.store.as_ref()))
    }

    fn tool_ctx(&self, mission_id: &str, agent_name: &str) -> Result<ToolCallContext> {
        let ctx = self.store.get(mission_id)?;
        let mut tool_ctx = ToolCallContext::new(mission_id, agent_name)
            .with_status(Arc::clone(&self.store) as Arc<dyn MissionStatusSource>)
            .with_log_sink(self.store.log_sink(mission_id));
        if let Some(group_id) = ctx.mission.document_group_id() {
            tool_ctx = tool_ctx.with_document_group_id(group_id);
        }
        Ok(tool_ctx)
    }

    fn still_running(&self, mission_id: &str) -> bool {
        self.store.get_status(mission_id).is_some_and(MissionStatus::is_running)
    }

    fn current_phase(&self, mission_id: &str) -> MissionPhase {
        MissionPhase::from_status(self.store.get_status(mission_id).unwrap_or(MissionStatus::Stopped))
    }

    async fn remember_message(&self, mission_id: &str, message: Message) {
        let mut histories = self.chat_histories.lock().await;
        histories.entry(mission_id.to_string()).or_default().push(message);
    }

    async fn chat_history_text(&self, mission_id: &str) -> String {
        let histories = self.chat_histories.lock().await;
        match histories.get(mission_id) {
            Some(memory) if !memory.is_empty() => memory
                .all()
                .iter()
                .map(|m| format!("{}: {}", role_label(m.role()), m.content()))
                .collect::<Vec<_>>()
                .join("\n"),
            _ => "(no prior conversation)".to_string(),
        }
    }
}

fn role_label(role: Role) -> &'static str {
    match role {
        Role::User => "user",
        Role::Assistant => "assistant",
        Role::System => "system",
        Role::Tool => "tool",
    }
}

fn extracted_to_note(note: ExtractedNote) -> Note {
    let mut domain_note = Note::new(String::new(), note.content, note.source_type, note.source_id);
    domain_note.source_metadata = note.source_metadata;
    domain_note
}

fn classify_goal_kind(text: &str) -> GoalKind {
    let lower = text.to_lowercase();
    const TONE: &[&str] = &["tone", "formal", "informal", "casual", "friendly", "professional", "voice"];
    const AUDIENCE: &[&str] = &["audience", "reader", "expert", "beginner", "executive", "layperson"];
    const LENGTH: &[&str] = &["word count", "page", "length", "short", "long", "concise", "brief", "comprehensive"];
    const FORMAT: &[&str] = &["format", "markdown", "bullet", "heading", "table", "structure", "outline style"];
    const SOURCE: &[&str] = &["source", "citation", "peer-reviewed", "academic", "primary source", "reference"];

    if TONE.iter().any(|keyword| lower.contains(keyword)) {
        GoalKind::Tone
    } else if AUDIENCE.iter().any(|keyword| lower.contains(keyword)) {
        GoalKind::Audience
    } else if LENGTH.iter().any(|keyword| lower.contains(keyword)) {
        GoalKind::Length
    } else if FORMAT.iter().any(|keyword| lower.contains(keyword)) {
        GoalKind::Format
    } else if SOURCE.iter().any(|keyword| lower.contains(keyword)) {
        GoalKind::SourcePreference
    } else {
        GoalKind::Other
    }
}

fn summarize_mission(ctx: &MissionContext) -> String {
    format!(
        "status: {:?}\nrequest: {}\nactive notes: {}\nsections written: {}",
        ctx.mission.status,
        ctx.mission.user_request,
        ctx.active_notes().len(),
        ctx.report_sections.len()
    )
}

fn thoughts_text(ctx: &MissionContext) -> String {
    crate::agents::bullet_list(ctx.thoughts.iter().map(|t| format!("({}) {}", t.agent_name, t.content)), "(no active thoughts)")
}

fn collect_research_based<'a>(sections: &'a [ReportSection], out: &mut Vec<&'a ReportSection>) {
    for section in sections {
        if section.is_leaf() {
            if section.research_strategy == ResearchStrategy::ResearchBased {
                out.push(section);
            }
        } else {
            collect_research_based(&section.subsections, out);
        }
    }
}

fn collect_research_based_mut<'a>(sections: &'a mut [ReportSection], out: &mut Vec<&'a mut ReportSection>) {
    for section in sections {
        if section.is_leaf() {
            if section.research_strategy == ResearchStrategy::ResearchBased {
                out.push(section);
            }
        } else {
            collect_research_based_mut(&mut section.subsections, out);
        }
    }
}

fn collect_content_based_mut<'a>(sections: &'a mut [ReportSection], out: &mut Vec<&'a mut ReportSection>) {
    for section in sections {
        if section.is_leaf() {
            if section.research_strategy == ResearchStrategy::ContentBased {
                out.push(section);
            }
        } else {
            collect_content_based_mut(&mut section.subsections, out);
        }
    }
}

fn collect_ordered_content(sections: &[ReportSection], stored: &BTreeMap<String, String>, out: &mut Vec<(String, String)>) {
    for section in sections {
        if let Some(text) = stored.get(&section.section_id) {
            out.push((section.section_id.clone(), text.clone()));
        }
        collect_ordered_content(&section.subsections, stored, out);
    }
}

fn render_accumulated(content: &BTreeMap<String, String>) -> String {
    if content.is_empty() {
        return "(nothing written yet)".to_string();
    }
    content.values().cloned().collect::<Vec<_>>().join("\n\n")
}

fn citation_bracket_pattern() -> &'static Regex {
    static CELL: OnceLock<Regex> = OnceLock::new();
    CELL.get_or_init(|| Regex::new(r"\[([^\[\]]+)\]").expect("static citation bracket pattern"))
}

/// Rewrites every bracket citation key across `ordered` (section id, text)
/// pairs to a sequential number, numbering keys in first-occurrence reading
/// order; a `[doc1, doc2]` group becomes `[1][2]`.
fn renumber_citations(ordered: &[(String, String)]) -> (Vec<(String, String)>, Vec<String>) {
    let mut order: Vec<String> = Vec::new();
    let mut seen: BTreeSet<String> = BTreeSet::new();
    for (_, text) in ordered {
        for caps in citation_bracket_pattern().captures_iter(text) {
            for key in caps[1].split(',').map(str::trim) {
                if !key.is_empty() && seen.insert(key.to_string()) {
                    order.push(key.to_string());
                }
            }
        }
    }

    let numbers: HashMap<&str, usize> = order.iter().enumerate().map(|(i, key)| (key.as_str(), i + 1)).collect();
    let rewritten = ordered
        .iter()
        .map(|(section_id, text)| {
            let new_text = citation_bracket_pattern()
                .replace_all(text, |caps: &Captures<'_>| {
                    caps[1]
                        .split(',')
                        .map(str::trim)
                        .filter(|key| !key.is_empty())
                        .map(|key| format!("[{}]", numbers.get(key).copied().unwrap_or(0)))
                        .collect::<String>()
                })
                .into_owned();
            (section_id.clone(), sort_consecutive_citation_runs(&new_text))
        })
        .collect();
    (rewritten, order)
}

fn consecutive_citation_run_pattern() -> &'static Regex {
    static CELL: OnceLock<Regex> = OnceLock::new();
    CELL.get_or_init(|| Regex::new(r"(?:\[\d+\])+").expect("static consecutive citation run pattern"))
}

/// Testable property 6: adjacent numbered citation brackets with no
/// intervening text — e.g. `[3][1]` — are reordered ascending (`[1][3]`),
/// regardless of the first-occurrence order `renumber_citations` assigned
/// the underlying numbers in.
fn sort_consecutive_citation_runs(text: &str) -> String {
    consecutive_citation_run_pattern()
        .replace_all(text, |caps: &Captures<'_>| {
            let run = &caps[0];
            let mut numbers: Vec<usize> = citation_bracket_pattern()
                .captures_iter(run)
                .filter_map(|c| c[1].parse::<usize>().ok())
                .collect();
            numbers.sort_unstable();
            numbers.into_iter().map(|n| format!("[{n}]")).collect::<String>()
        })
        .into_owned()
}

fn citation_index(notes: &[Note]) -> BTreeMap<String, String> {
    let mut index = BTreeMap::new();
    for note in notes {
        for key in note.citation_keys() {
            index.entry(key).or_insert_with(|| describe_source(note));
        }
    }
    index
}

fn describe_source(note: &Note) -> String {
    match note.source_type {
        SourceType::Web => {
            let title = note.source_metadata.get("title").cloned().unwrap_or_else(|| note.source_id.clone());
            format!("{title} ({})", note.source_id)
        }
        SourceType::Document | SourceType::Internal => {
            note.source_metadata.get("title").cloned().unwrap_or_else(|| note.source_id.clone())
        }
    }
}

fn render_references(order: &[String], index: &BTreeMap<String, String>) -> String {
    let mut out = String::from("## References\n\n");
    for (position, key) in order.iter().enumerate() {
        let description = index.get(key).cloned().unwrap_or_else(|| key.clone());
        out.push_str(&format!("{}. {description}\n", position + 1));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mission_phase_maps_every_status() {
        assert_eq!(MissionPhase::from_status(MissionStatus::Pending), MissionPhase::Idle);
        assert_eq!(MissionPhase::from_status(MissionStatus::Planning), MissionPhase::Questioning);
        assert_eq!(MissionPhase::from_status(MissionStatus::Researching), MissionPhase::Researching);
        assert_eq!(MissionPhase::from_status(MissionStatus::Writing), MissionPhase::Writing);
        assert_eq!(MissionPhase::from_status(MissionStatus::Completed), MissionPhase::Completed);
        assert_eq!(MissionPhase::from_status(MissionStatus::Failed), MissionPhase::Failed);
        assert_eq!(MissionPhase::from_status(MissionStatus::Paused), MissionPhase::Paused);
        assert_eq!(MissionPhase::from_status(MissionStatus::Stopped), MissionPhase::Stopped);
    }

    #[test]
    fn classifies_goal_kind_from_keywords() {
        assert_eq!(classify_goal_kind("Please use a formal tone"), GoalKind::Tone);
        assert_eq!(classify_goal_kind("Write for an expert audience"), GoalKind::Audience);
        assert_eq!(classify_goal_kind("Keep it brief, under 500 words"), GoalKind::Length);
        assert_eq!(classify_goal_kind("Use markdown headings"), GoalKind::Format);
        assert_eq!(classify_goal_kind("Prefer peer-reviewed sources"), GoalKind::SourcePreference);
        assert_eq!(classify_goal_kind("I like turtles"), GoalKind::Other);
    }

    #[test]
    fn renumbers_citations_in_first_occurrence_order() {
        let ordered = vec![
            ("intro".to_string(), "Some claim [doc2, doc1].".to_string()),
            ("body".to_string(), "Another claim [doc3] and [doc1].".to_string()),
        ];
        let (rewritten, order) = renumber_citations(&ordered);
        assert_eq!(order, vec!["doc1".to_string(), "doc2".to_string(), "doc3".to_string()]);
        assert_eq!(rewritten[0].1, "Some claim [1][2].");
        assert_eq!(rewritten[1].1, "Another claim [3] and [1].");
    }

    #[test]
    fn collects_research_based_leaves_only() {
        let mut leaf_research = ReportSection::new("Leaf", "desc");
        leaf_research.section_id = "leaf-r".to_string();
        leaf_research.research_strategy = ResearchStrategy::ResearchBased;

        let mut leaf_content = ReportSection::new("Leaf2", "desc");
        leaf_content.section_id = "leaf-c".to_string();
        leaf_content.research_strategy = ResearchStrategy::ContentBased;

        let mut root = ReportSection::new("Root", "desc");
        root.section_id = "root".to_string();
        root.research_strategy = ResearchStrategy::SynthesizeFromSubsections;
        root.subsections = vec![leaf_research, leaf_content];

        let mut out = Vec::new();
        collect_research_based(&[root], &mut out);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].section_id, "leaf-r");
    }

    #[test]
    fn sorts_consecutive_citation_runs_ascending() {
        let ordered = vec![
            ("intro".to_string(), "First mention [doc1].".to_string()),
            ("body".to_string(), "Later, brand new [doc2] alongside earlier [doc2][doc1].".to_string()),
        ];
        let (rewritten, _order) = renumber_citations(&ordered);
        assert_eq!(rewritten[0].1, "First mention [1].");
        assert_eq!(rewritten[1].1, "Later, brand new [2] alongside earlier [1][2].");
    }

    #[test]
    fn renders_references_with_fallback_description() {
        let order = vec!["doc1".to_string()];
        let index = BTreeMap::new();
        let references = render_references(&order, &index);
        assert!(references.contains("1. doc1"));
    }
}
