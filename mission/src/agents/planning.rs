//! The Planning agent (design §4.7, Planning): produces and revises the
//! report outline across three phases, then runs the Outline Validator's
//! programmatic checks and, if structural quality is still poor, up to three
//! bounded reflective LLM repair passes.

use schemars::JsonSchema;
use serde::Deserialize;
use vantage_dispatch::{ModelCallDetails, ModelDispatcher};

use super::{AgentCtx, call, outline_summary};
use crate::config::MissionConfig;
use crate::domain::{ReportSection, ResearchStrategy};
use crate::outline::{self, ValidationFix, ValidationReport};
use crate::prompts;

const MAX_REFLECTIVE_PASSES: u32 = 3;

#[derive(Debug, Clone, Deserialize, JsonSchema)]
struct SectionResponse {
    #[serde(default)]
    section_id: String,
    title: String,
    description: String,
    research_strategy: ResearchStrategy,
    #[serde(default)]
    associated_note_ids: Vec<String>,
    #[serde(default)]
    subsections: Vec<SectionResponse>,
}

impl SectionResponse {
    fn into_domain(self) -> ReportSection {
        ReportSection {
            section_id: self.section_id,
            title: self.title,
            description: self.description,
            research_strategy: self.research_strategy,
            associated_note_ids: self.associated_note_ids,
            subsections: self.subsections.into_iter().map(SectionResponse::into_domain).collect(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
struct OutlineResponse {
    sections: Vec<SectionResponse>,
}

/// Result of any Planning phase: the validated outline, the last validation
/// report, and every model call spent producing it (including reflective
/// repair passes).
#[derive(Debug, Clone)]
pub struct PlanningOutcome {
    pub outline: Vec<ReportSection>,
    pub validation: ValidationReport,
    pub model_call_details: Vec<ModelCallDetails>,
}

pub struct PlanningAgent<'a> {
    dispatcher: &'a ModelDispatcher,
    config: &'a MissionConfig,
}

impl<'a> PlanningAgent<'a> {
    #[must_use]
    pub fn new(dispatcher: &'a ModelDispatcher, config: &'a MissionConfig) -> Self {
        Self { dispatcher, config }
    }

    /// Phase 1: produces the initial outline from the mission goal and
    /// whatever initial-exploration context is already available.
    pub async fn phase1(
        &self,
        mission_goal: &str,
        active_goals: &str,
        initial_context: &str,
        ctx: AgentCtx<'_>,
    ) -> crate::error::Result<PlanningOutcome> {
        let rendered = prompts::planning_phase1().render(&[
            ("mission_goal", mission_goal),
            ("active_goals", active_goals),
            ("initial_context", initial_context),
            ("max_total_depth", &self.config.max_total_depth.to_string()),
        ]);
        let outline = self.request_outline("planning", rendered, ctx).await?;
        self.finalize(outline.0, vec![outline.1], ctx).await
    }

    /// Phase 2: assigns gathered notes to `research_based` leaf sections.
    pub async fn phase2(
        &self,
        outline: &[ReportSection],
        notes_summary: &str,
        ctx: AgentCtx<'_>,
    ) -> crate::error::Result<PlanningOutcome> {
        let rendered = prompts::planning_phase2()
            .render(&[("outline_summary", &outline_summary(outline)), ("notes_summary", notes_summary)]);
        let (sections, details) = self.request_outline("planning", rendered, ctx).await?;
        self.finalize(sections, vec![details], ctx).await
    }

    /// Phase 3: revises the outline between structured research rounds,
    /// applying Reflection agents' proposed modifications where they
    /// genuinely improve coverage.
    pub async fn phase3(
        &self,
        outline: &[ReportSection],
        proposed_modifications: &str,
        ctx: AgentCtx<'_>,
    ) -> crate::error::Result<PlanningOutcome> {
        let rendered = prompts::planning_phase3().render(&[
            ("outline_summary", &outline_summary(outline)),
            ("proposed_modifications", proposed_modifications),
            ("max_total_depth", &self.config.max_total_depth.to_string()),
        ]);
        let (sections, details) = self.request_outline("planning", rendered, ctx).await?;
        self.finalize(sections, vec![details], ctx).await
    }

    async fn reflective_fix(
        &self,
        outline: &[ReportSection],
        validation_report: &str,
        ctx: AgentCtx<'_>,
    ) -> crate::error::Result<(Vec<ReportSection>, ModelCallDetails)> {
        let rendered = prompts::planning_reflective_fix()
            .render(&[("outline_summary", &outline_summary(outline)), ("validation_report", validation_report)]);
        self.request_outline("planning", rendered, ctx).await
    }

    async fn request_outline(
        &self,
        agent_name: &str,
        rendered: String,
        ctx: AgentCtx<'_>,
    ) -> crate::error::Result<(Vec<ReportSection>, ModelCallDetails)> {
        let role = self.config.role_for("planning");
        let dispatch = call(role, agent_name, rendered, ctx);
        let (response, details): (OutlineResponse, ModelCallDetails) =
            self.dispatcher.dispatch_structured(dispatch, ctx.status).await?;
        let sections = response.sections.into_iter().map(SectionResponse::into_domain).collect();
        Ok((sections, details))
    }

    /// Runs the Outline Validator over `outline`, then up to
    /// [`MAX_REFLECTIVE_PASSES`] reflective LLM repair passes while
    /// structural quality remains poor.
    async fn finalize(
        &self,
        mut outline: Vec<ReportSection>,
        mut model_call_details: Vec<ModelCallDetails>,
        ctx: AgentCtx<'_>,
    ) -> crate::error::Result<PlanningOutcome> {
        let mut report = outline::validate(&mut outline, self.config.max_total_depth);
        let mut passes = 0;
        while report.quality_poor(count_sections(&outline)) && passes < MAX_REFLECTIVE_PASSES {
            let report_text = format_validation_report(&report);
            let (fixed, details) = self.reflective_fix(&outline, &report_text, ctx).await?;
            model_call_details.push(details);
            outline = fixed;
            report = outline::validate(&mut outline, self.config.max_total_depth);
            passes += 1;
        }
        Ok(PlanningOutcome { outline, validation: report, model_call_details })
    }
}

fn count_sections(outline: &[ReportSection]) -> usize {
    outline.iter().map(|s| s.walk().count()).sum()
}

fn format_validation_report(report: &ValidationReport) -> String {
    if report.is_clean() {
        return "(no issues found)".to_string();
    }
    super::bullet_list(report.fixes.iter().map(describe_fix), "(no issues found)")
}

fn describe_fix(fix: &ValidationFix) -> String {
    match fix {
        ValidationFix::FlattenedDepth { parent_title } => format!("flattened excess depth under '{parent_title}'"),
        ValidationFix::MergedDuplicate { title } => format!("merged duplicate section '{title}'"),
        ValidationFix::RewroteLeafStrategy { section_id } => format!("rewrote leaf strategy for '{section_id}'"),
        ValidationFix::RewroteParentStrategy { section_id } => format!("rewrote parent strategy for '{section_id}'"),
        ValidationFix::RewroteIntroConclusionStrategy { section_id } => {
            format!("rewrote intro/conclusion strategy for '{section_id}'")
        }
        ValidationFix::PromotedResearchBasedLeaf { section_id } => {
            format!("promoted '{section_id}' to research_based since none existed")
        }
        ValidationFix::SynthesizedSectionId { section_id } => format!("synthesized missing section id '{section_id}'"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn section_response_converts_recursively() {
        let response = SectionResponse {
            section_id: String::new(),
            title: "Background".to_string(),
            description: "Context".to_string(),
            research_strategy: ResearchStrategy::SynthesizeFromSubsections,
            associated_note_ids: Vec::new(),
            subsections: vec![SectionResponse {
                section_id: "methods".to_string(),
                title: "Methods".to_string(),
                description: "How it was done".to_string(),
                research_strategy: ResearchStrategy::ResearchBased,
                associated_note_ids: vec!["n1".to_string()],
                subsections: Vec::new(),
            }],
        };
        let section = response.into_domain();
        assert_eq!(section.subsections[0].section_id, "methods");
        assert_eq!(section.subsections[0].associated_note_ids, vec!["n1".to_string()]);
    }

    #[test]
    fn counts_every_section_in_the_tree() {
        let mut leaf = ReportSection::new("Leaf", "desc");
        leaf.section_id = "leaf".to_string();
        let mut root = ReportSection::new("Root", "desc");
        root.section_id = "root".to_string();
        root.subsections.push(leaf);
        assert_eq!(count_sections(&[root]), 2);
    }
}
