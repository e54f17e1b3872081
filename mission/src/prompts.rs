//! Prompt templates as external data, not source code: every agent prompt
//! lives under `mission/prompts/<agent>/<mode>.md`, pulled in at compile
//! time with `include_str!` and rendered with a small `{{field}}`
//! substitution, the same flavor of templating `vantage_rag::query_preparer`
//! already builds its prompts with via `format!`. Each template records its
//! version as a leading `{# vN #}` comment line.

use std::collections::BTreeMap;
use std::sync::OnceLock;

/// One loaded template: its version marker and body (version line stripped).
#[derive(Debug, Clone, Copy)]
pub struct Template {
    pub version: &'static str,
    pub body: &'static str,
}

impl Template {
    fn parse(raw: &'static str) -> Self {
        match raw.strip_prefix("{# ").and_then(|rest| rest.split_once(" #}")) {
            Some((version, body)) => Self { version, body: body.trim_start() },
            None => Self { version: "v1", body: raw },
        }
    }

    /// Replaces every `{{key}}` occurrence with its value. A key with no
    /// matching variable is left in place rather than silently blanked, so a
    /// missing substitution is visible in the rendered prompt.
    #[must_use]
    pub fn render(&self, vars: &[(&str, &str)]) -> String {
        let mut out = self.body.to_string();
        for (key, value) in vars {
            out = out.replace(&format!("{{{{{key}}}}}"), value);
        }
        out
    }
}

macro_rules! template_fn {
    ($fn_name:ident, $path:literal) => {
        pub fn $fn_name() -> &'static Template {
            static CELL: OnceLock<Template> = OnceLock::new();
            CELL.get_or_init(|| Template::parse(include_str!($path)))
        }
    };
}

template_fn!(messenger_system, "../prompts/messenger/system.md");
template_fn!(planning_phase1, "../prompts/planning/phase1.md");
template_fn!(planning_phase2, "../prompts/planning/phase2.md");
template_fn!(planning_phase3, "../prompts/planning/phase3.md");
template_fn!(planning_reflective_fix, "../prompts/planning/reflective_fix.md");
template_fn!(research_initial_questions, "../prompts/research/initial_questions.md");
template_fn!(research_explore_question, "../prompts/research/explore_question.md");
template_fn!(research_extract_note, "../prompts/research/extract_note.md");
template_fn!(reflection_section, "../prompts/reflection/section.md");
template_fn!(writing_section, "../prompts/writing/section.md");
template_fn!(writing_synthesize_intro, "../prompts/writing/synthesize_intro.md");
template_fn!(writing_revise_section, "../prompts/writing/revise_section.md");
template_fn!(writing_reflection_review, "../prompts/writing_reflection/review.md");
template_fn!(note_assignment_assign, "../prompts/note_assignment/assign.md");

/// `(agent, mode)`-keyed lookup over the templates above. Every template
/// currently ships only an `"en"` body; a `language` axis isn't in the key
/// yet since nothing produces a second locale (see DESIGN.md).
#[must_use]
pub fn lookup(agent: &str, mode: &str) -> Option<&'static Template> {
    registry().get(&(agent, mode)).copied()
}

fn registry() -> &'static BTreeMap<(&'static str, &'static str), &'static Template> {
    static CELL: OnceLock<BTreeMap<(&'static str, &'static str), &'static Template>> = OnceLock::new();
    CELL.get_or_init(|| {
        let mut map = BTreeMap::new();
        map.insert(("messenger", "system"), messenger_system());
        map.insert(("planning", "phase1"), planning_phase1());
        map.insert(("planning", "phase2"), planning_phase2());
        map.insert(("planning", "phase3"), planning_phase3());
        map.insert(("planning", "reflective_fix"), planning_reflective_fix());
        map.insert(("research", "initial_questions"), research_initial_questions());
        map.insert(("research", "explore_question"), research_explore_question());
        map.insert(("research", "extract_note"), research_extract_note());
        map.insert(("reflection", "section"), reflection_section());
        map.insert(("writing", "section"), writing_section());
        map.insert(("writing", "synthesize_intro"), writing_synthesize_intro());
        map.insert(("writing", "revise_section"), writing_revise_section());
        map.insert(("writing_reflection", "review"), writing_reflection_review());
        map.insert(("note_assignment", "assign"), note_assignment_assign());
        map
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_version_marker() {
        let tpl = messenger_system();
        assert_eq!(tpl.version, "v1");
        assert!(!tpl.body.starts_with("{#"));
        assert!(tpl.body.starts_with("You are the Messenger agent"));
    }

    #[test]
    fn renders_substitutions() {
        let rendered = research_explore_question().render(&[
            ("depth", "1"),
            ("max_depth", "2"),
            ("question", "What is X?"),
            ("scratchpad", ""),
            ("retrieved_material", "..."),
            ("max_questions", "3"),
        ]);
        assert!(rendered.contains("What is X?"));
        assert!(!rendered.contains("{{question}}"));
    }

    #[test]
    fn leaves_unmatched_key_visible() {
        let rendered = note_assignment_assign().render(&[("section_title", "Intro")]);
        assert!(rendered.contains("{{section_description}}"));
    }

    #[test]
    fn registry_has_every_template() {
        assert_eq!(registry().len(), 14);
        assert!(lookup("writing", "section").is_some());
        assert!(lookup("writing", "nonexistent").is_none());
    }
}
