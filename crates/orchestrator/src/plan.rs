//! Planning Tool (§4.6) — the plan data model and CRUD registry.
//!
//! A plan is a tree of `sections → steps`, flattened to a global step
//! index for status tracking. The registry (`PlanningTool`) is the single
//! source of truth the Planning Flow reads/writes; it never derives the
//! "current" plan pointer from the map contents (§9).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use sa_domain::error::{Error, Result};

/// Status of one global step (§3). Transitions are monotone toward
/// `Completed` in the common path, but `mark_step` may set any value —
/// used for recovery/error flows (e.g. `Blocked` after repeated failure).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    NotStarted,
    InProgress,
    Completed,
    Blocked,
}

impl StepStatus {
    fn glyph(self) -> &'static str {
        match self {
            StepStatus::NotStarted => "[ ]",
            StepStatus::InProgress => "[→]",
            StepStatus::Completed => "[✓]",
            StepStatus::Blocked => "[!]",
        }
    }
}

/// One section of a plan: a titled group of steps, each carrying a
/// parallel `type` used to route it to an executor (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Section {
    pub title: String,
    pub steps: Vec<String>,
    pub types: Vec<String>,
}

/// The full plan data model (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    pub plan_id: String,
    pub title: String,
    pub sections: Vec<Section>,
    pub step_statuses: Vec<StepStatus>,
    pub step_notes: Vec<String>,
}

/// `{ section_title, step, status, type }` for the current global step.
#[derive(Debug, Clone)]
pub struct StepInfo {
    pub section_title: String,
    pub step: String,
    pub status: StepStatus,
    pub step_type: String,
}

impl Plan {
    fn total_steps(sections: &[Section]) -> usize {
        sections.iter().map(|s| s.steps.len()).sum()
    }

    fn validate_sections(sections: &[Section]) -> Result<()> {
        for section in sections {
            if section.steps.len() != section.types.len() {
                return Err(Error::Plan(format!(
                    "section '{}': steps ({}) and types ({}) length mismatch",
                    section.title,
                    section.steps.len(),
                    section.types.len()
                )));
            }
        }
        Ok(())
    }

    fn new(plan_id: String, title: String, sections: Vec<Section>) -> Result<Self> {
        Self::validate_sections(&sections)?;
        let total = Self::total_steps(&sections);
        Ok(Self {
            plan_id,
            title,
            step_statuses: vec![StepStatus::NotStarted; total],
            step_notes: vec![String::new(); total],
            sections,
        })
    }

    /// Flattened `(section_title, step_text, step_type)` for every global
    /// step index, in declaration order.
    fn flatten(&self) -> Vec<(&str, &str, &str)> {
        self.sections
            .iter()
            .flat_map(|s| {
                s.steps
                    .iter()
                    .zip(s.types.iter())
                    .map(move |(step, ty)| (s.title.as_str(), step.as_str(), ty.as_str()))
            })
            .collect()
    }

    /// §3 invariant: preserve status/notes across an `update` by step-text
    /// identity. Unmatched new steps initialize to `not_started`, `""`.
    fn update_sections(&mut self, sections: Vec<Section>) -> Result<()> {
        Self::validate_sections(&sections)?;

        let old_flat = self.flatten();
        let mut by_text: HashMap<&str, (StepStatus, &str)> = HashMap::new();
        for (i, (_, text, _)) in old_flat.iter().enumerate() {
            by_text.insert(text, (self.step_statuses[i], self.step_notes[i].as_str()));
        }

        let total = Self::total_steps(&sections);
        let mut statuses = Vec::with_capacity(total);
        let mut notes = Vec::with_capacity(total);
        for section in &sections {
            for step in &section.steps {
                match by_text.get(step.as_str()) {
                    Some((status, note)) => {
                        statuses.push(*status);
                        notes.push(note.to_string());
                    }
                    None => {
                        statuses.push(StepStatus::NotStarted);
                        notes.push(String::new());
                    }
                }
            }
        }

        self.sections = sections;
        self.step_statuses = statuses;
        self.step_notes = notes;
        Ok(())
    }

    /// §4.6 `get`: canonical text report with progress and per-step status
    /// glyphs.
    pub fn render(&self) -> String {
        let total = self.step_statuses.len();
        let completed = self
            .step_statuses
            .iter()
            .filter(|s| **s == StepStatus::Completed)
            .count();
        let pct = if total == 0 {
            100.0
        } else {
            (completed as f64 / total as f64) * 100.0
        };

        let mut out = format!("Plan: {} ({})\n", self.title, self.plan_id);
        out.push_str(&format!(
            "Progress: {completed}/{total} steps completed ({pct:.1}%)\n\n"
        ));

        let mut idx = 0;
        for section in &self.sections {
            out.push_str(&format!("{}\n", section.title));
            for step in &section.steps {
                let status = self.step_statuses[idx];
                let note = &self.step_notes[idx];
                out.push_str(&format!("  {} {}. {}", status.glyph(), idx + 1, step));
                if !note.is_empty() {
                    out.push_str(&format!(" — {note}"));
                }
                out.push('\n');
                idx += 1;
            }
        }
        out
    }

    /// The first global step index that is not `Completed`, or `None` when
    /// every step is done (§3: "next non-completed global step"). Whether a
    /// `Blocked` step should be skipped over is a flow-loop policy, not a
    /// property of the plan itself — see `PlanningFlow::next_runnable_step`.
    pub fn current_step_index(&self) -> Option<usize> {
        self.step_statuses
            .iter()
            .position(|s| !matches!(s, StepStatus::Completed))
    }

    pub fn step_info(&self, index: usize) -> Option<StepInfo> {
        let flat = self.flatten();
        let (section_title, step, step_type) = flat.get(index)?;
        Some(StepInfo {
            section_title: section_title.to_string(),
            step: step.to_string(),
            status: self.step_statuses[index],
            step_type: step_type.to_string(),
        })
    }

    /// True when every section's steps are all of the lightweight
    /// "answerbot" kind (§4.7 step 3a: the all-answerbot finalize
    /// shortcut).
    pub fn is_all_answerbot(&self) -> bool {
        self.sections
            .iter()
            .all(|s| s.types.iter().all(|t| t == "answerbot"))
    }
}

/// CRUD registry over plans, keyed by `plan_id`, plus a separate "active"
/// pointer (§9: never derive one from the other).
#[derive(Default)]
pub struct PlanningTool {
    plans: HashMap<String, Plan>,
    active_plan_id: Option<String>,
}

impl PlanningTool {
    pub fn new() -> Self {
        Self::default()
    }

    /// `create(plan_id, title, sections)` — not idempotent: a duplicate id
    /// is an error (§5 "Idempotence").
    pub fn create(&mut self, plan_id: &str, title: &str, sections: Vec<Section>) -> Result<()> {
        if self.plans.contains_key(plan_id) {
            return Err(Error::Plan(format!("plan '{plan_id}' already exists")));
        }
        let plan = Plan::new(plan_id.to_string(), title.to_string(), sections)?;
        self.plans.insert(plan_id.to_string(), plan);
        self.active_plan_id = Some(plan_id.to_string());
        Ok(())
    }

    pub fn update(
        &mut self,
        plan_id: Option<&str>,
        title: Option<String>,
        sections: Option<Vec<Section>>,
    ) -> Result<()> {
        let id = self.resolve_id(plan_id)?;
        let plan = self
            .plans
            .get_mut(&id)
            .ok_or_else(|| Error::Plan(format!("unknown plan '{id}'")))?;
        if let Some(title) = title {
            plan.title = title;
        }
        if let Some(sections) = sections {
            plan.update_sections(sections)?;
        }
        Ok(())
    }

    pub fn get(&self, plan_id: Option<&str>) -> Result<&Plan> {
        let id = self.resolve_id(plan_id)?;
        self.plans
            .get(&id)
            .ok_or_else(|| Error::Plan(format!("unknown plan '{id}'")))
    }

    pub fn get_mut(&mut self, plan_id: Option<&str>) -> Result<&mut Plan> {
        let id = self.resolve_id(plan_id)?;
        self.plans
            .get_mut(&id)
            .ok_or_else(|| Error::Plan(format!("unknown plan '{id}'")))
    }

    pub fn render(&self, plan_id: Option<&str>) -> Result<String> {
        Ok(self.get(plan_id)?.render())
    }

    pub fn mark_step(
        &mut self,
        plan_id: Option<&str>,
        step_index: usize,
        status: Option<StepStatus>,
        notes: Option<String>,
    ) -> Result<()> {
        let plan = self.get_mut(plan_id)?;
        if step_index >= plan.step_statuses.len() {
            return Err(Error::Plan(format!(
                "step index {step_index} out of range (plan has {} steps)",
                plan.step_statuses.len()
            )));
        }
        if let Some(status) = status {
            plan.step_statuses[step_index] = status;
        }
        if let Some(notes) = notes {
            plan.step_notes[step_index] = notes;
        }
        Ok(())
    }

    pub fn list(&self) -> Vec<&Plan> {
        self.plans.values().collect()
    }

    pub fn set_active(&mut self, plan_id: &str) -> Result<()> {
        if !self.plans.contains_key(plan_id) {
            return Err(Error::Plan(format!("unknown plan '{plan_id}'")));
        }
        self.active_plan_id = Some(plan_id.to_string());
        Ok(())
    }

    pub fn active_plan_id(&self) -> Option<&str> {
        self.active_plan_id.as_deref()
    }

    pub fn delete(&mut self, plan_id: &str) -> Result<()> {
        if self.plans.remove(plan_id).is_none() {
            return Err(Error::Plan(format!("unknown plan '{plan_id}'")));
        }
        if self.active_plan_id.as_deref() == Some(plan_id) {
            self.active_plan_id = None;
        }
        Ok(())
    }

    fn resolve_id(&self, plan_id: Option<&str>) -> Result<String> {
        plan_id
            .map(str::to_string)
            .or_else(|| self.active_plan_id.clone())
            .ok_or_else(|| Error::Plan("no active plan and none specified".into()))
    }

    /// Serialize the full registry (§4.11 snapshot `plans` field, which
    /// `sa-sessions` stores as an opaque `serde_json::Value`).
    pub fn to_value(&self) -> serde_json::Value {
        serde_json::json!({
            "plans": self.plans,
            "active_plan_id": self.active_plan_id,
        })
    }

    pub fn from_value(value: serde_json::Value) -> Result<Self> {
        #[derive(Deserialize)]
        struct Wire {
            plans: HashMap<String, Plan>,
            active_plan_id: Option<String>,
        }
        let wire: Wire = serde_json::from_value(value)
            .map_err(|e| Error::Other(format!("parsing plan registry snapshot: {e}")))?;
        Ok(Self {
            plans: wire.plans,
            active_plan_id: wire.active_plan_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_sections() -> Vec<Section> {
        vec![Section {
            title: "Answer".into(),
            steps: vec!["compute 2+2".into(), "report the result".into()],
            types: vec!["executor".into(), "executor".into()],
        }]
    }

    #[test]
    fn create_then_duplicate_is_an_error() {
        let mut tool = PlanningTool::new();
        tool.create("p1", "T", sample_sections()).unwrap();
        let err = tool.create("p1", "T2", sample_sections()).unwrap_err();
        assert!(matches!(err, Error::Plan(_)));
    }

    #[test]
    fn total_steps_invariant_holds() {
        let mut tool = PlanningTool::new();
        tool.create("p1", "T", sample_sections()).unwrap();
        let plan = tool.get(None).unwrap();
        assert_eq!(plan.step_statuses.len(), 2);
        assert_eq!(plan.step_notes.len(), 2);
    }

    #[test]
    fn update_preserves_status_by_step_text_identity() {
        let mut tool = PlanningTool::new();
        tool.create("p1", "T", sample_sections()).unwrap();
        tool.mark_step(None, 0, Some(StepStatus::Completed), Some("done".into()))
            .unwrap();

        let new_sections = vec![Section {
            title: "Answer".into(),
            steps: vec!["compute 2+2".into(), "a brand new step".into()],
            types: vec!["executor".into(), "executor".into()],
        }];
        tool.update(None, None, Some(new_sections)).unwrap();

        let plan = tool.get(None).unwrap();
        assert_eq!(plan.step_statuses[0], StepStatus::Completed);
        assert_eq!(plan.step_notes[0], "done");
        assert_eq!(plan.step_statuses[1], StepStatus::NotStarted);
        assert_eq!(plan.step_notes[1], "");
    }

    #[test]
    fn mark_step_completed_advances_current_step_index() {
        let mut tool = PlanningTool::new();
        tool.create("p1", "T", sample_sections()).unwrap();
        assert_eq!(tool.get(None).unwrap().current_step_index(), Some(0));
        tool.mark_step(None, 0, Some(StepStatus::Completed), None)
            .unwrap();
        assert_eq!(tool.get(None).unwrap().current_step_index(), Some(1));
        tool.mark_step(None, 1, Some(StepStatus::Completed), None)
            .unwrap();
        assert_eq!(tool.get(None).unwrap().current_step_index(), None);
    }

    #[test]
    fn mark_step_out_of_range_is_an_error() {
        let mut tool = PlanningTool::new();
        tool.create("p1", "T", sample_sections()).unwrap();
        let err = tool
            .mark_step(None, 99, Some(StepStatus::Completed), None)
            .unwrap_err();
        assert!(matches!(err, Error::Plan(_)));
    }

    #[test]
    fn blocked_step_is_still_current_per_spec_exact_definition() {
        // §3: "next non-completed global step" — `Blocked` is not
        // `Completed`, so it remains current. Skipping past it is a
        // flow-loop policy (`PlanningFlow::next_runnable_step`), not a
        // property of the plan accessor itself.
        let mut tool = PlanningTool::new();
        tool.create("p1", "T", sample_sections()).unwrap();
        tool.mark_step(None, 0, Some(StepStatus::Blocked), None)
            .unwrap();
        assert_eq!(tool.get(None).unwrap().current_step_index(), Some(0));
    }

    #[test]
    fn render_includes_title_progress_and_glyphs() {
        let mut tool = PlanningTool::new();
        tool.create("p1", "Answer Plan", sample_sections()).unwrap();
        tool.mark_step(None, 0, Some(StepStatus::Completed), None)
            .unwrap();
        let rendered = tool.render(None).unwrap();
        assert!(rendered.contains("Answer Plan"));
        assert!(rendered.contains("50.0%"));
        assert!(rendered.contains("[✓]"));
        assert!(rendered.contains("[ ]"));
    }

    #[test]
    fn registry_round_trips_through_value() {
        let mut tool = PlanningTool::new();
        tool.create("p1", "T", sample_sections()).unwrap();
        tool.mark_step(None, 0, Some(StepStatus::Completed), None)
            .unwrap();

        let value = tool.to_value();
        let restored = PlanningTool::from_value(value).unwrap();
        assert_eq!(restored.active_plan_id(), Some("p1"));
        assert_eq!(
            restored.get(None).unwrap().step_statuses[0],
            StepStatus::Completed
        );
    }

    #[test]
    fn all_answerbot_detects_single_lightweight_section() {
        let mut tool = PlanningTool::new();
        tool.create(
            "p1",
            "Answer",
            vec![Section {
                title: "Answer".into(),
                steps: vec!["compute 2+2".into()],
                types: vec!["answerbot".into()],
            }],
        )
        .unwrap();
        assert!(tool.get(None).unwrap().is_all_answerbot());
    }

    #[test]
    fn mixed_types_are_not_all_answerbot() {
        let mut tool = PlanningTool::new();
        tool.create("p1", "T", sample_sections()).unwrap();
        assert!(!tool.get(None).unwrap().is_all_answerbot());
    }
}
