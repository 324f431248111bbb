//! Exposes the Planning Tool (§4.6) as an LLM-callable [`Tool`] so the
//! planning agent can create, inspect, and advance a plan through ordinary
//! tool calls. Wraps the same `Arc<RwLock<PlanningTool>>` the Planning Flow
//! reads for step selection — both see the same registry.

use std::sync::Arc;

use parking_lot::RwLock;
use serde::Deserialize;
use serde_json::{json, Value};

use sa_domain::tool::ToolDefinition;
use sa_outputbus::{EnvelopeType, OutputBus};
use sa_tools::{Tool, ToolResult};

use crate::plan::{PlanningTool, Section, StepStatus};

pub struct PlanningToolAdapter {
    registry: Arc<RwLock<PlanningTool>>,
    bus: Arc<OutputBus>,
}

impl PlanningToolAdapter {
    pub fn new(registry: Arc<RwLock<PlanningTool>>, bus: Arc<OutputBus>) -> Self {
        Self { registry, bus }
    }
}

#[derive(Deserialize)]
struct WireSection {
    title: String,
    steps: Vec<String>,
    types: Vec<String>,
}

impl From<WireSection> for Section {
    fn from(w: WireSection) -> Self {
        Section {
            title: w.title,
            steps: w.steps,
            types: w.types,
        }
    }
}

#[derive(Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
enum Args {
    Create {
        plan_id: String,
        title: String,
        sections: Vec<WireSection>,
    },
    Update {
        plan_id: Option<String>,
        title: Option<String>,
        sections: Option<Vec<WireSection>>,
    },
    Get {
        #[serde(default)]
        plan_id: Option<String>,
    },
    MarkStep {
        #[serde(default)]
        plan_id: Option<String>,
        step_index: usize,
        #[serde(default)]
        status: Option<String>,
        #[serde(default)]
        notes: Option<String>,
    },
    List,
    SetActive {
        plan_id: String,
    },
    Delete {
        plan_id: String,
    },
}

fn parse_status(s: &str) -> Option<StepStatus> {
    match s {
        "not_started" => Some(StepStatus::NotStarted),
        "in_progress" => Some(StepStatus::InProgress),
        "completed" => Some(StepStatus::Completed),
        "blocked" => Some(StepStatus::Blocked),
        _ => None,
    }
}

#[async_trait::async_trait]
impl Tool for PlanningToolAdapter {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "planning".into(),
            description: "Create, update, inspect, and advance a structured step-by-step plan."
                .into(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "command": {
                        "type": "string",
                        "enum": ["create", "update", "get", "mark_step", "list", "set_active", "delete"]
                    },
                    "plan_id": {"type": "string"},
                    "title": {"type": "string"},
                    "sections": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "properties": {
                                "title": {"type": "string"},
                                "steps": {"type": "array", "items": {"type": "string"}},
                                "types": {"type": "array", "items": {"type": "string"}}
                            },
                            "required": ["title", "steps", "types"]
                        }
                    },
                    "step_index": {"type": "integer"},
                    "status": {
                        "type": "string",
                        "enum": ["not_started", "in_progress", "completed", "blocked"]
                    },
                    "notes": {"type": "string"}
                },
                "required": ["command"]
            }),
        }
    }

    async fn execute(&self, arguments: Value) -> ToolResult {
        let args: Args = match serde_json::from_value(arguments) {
            Ok(a) => a,
            Err(e) => return ToolResult::err(format!("invalid planning tool arguments: {e}")),
        };

        let mut registry = self.registry.write();
        match args {
            Args::Create {
                plan_id,
                title,
                sections,
            } => {
                let sections = sections.into_iter().map(Section::from).collect();
                let result = match registry.create(&plan_id, &title, sections) {
                    Ok(()) => ToolResult::ok(format!("created plan '{plan_id}'")),
                    Err(e) => ToolResult::err(e.to_string()),
                };
                self.bus
                    .emit(EnvelopeType::CreatePlan, format!("created plan '{plan_id}'"));
                result
            }
            Args::Update {
                plan_id,
                title,
                sections,
            } => {
                let sections = sections.map(|s| s.into_iter().map(Section::from).collect());
                let result = match registry.update(plan_id.as_deref(), title, sections) {
                    Ok(()) => ToolResult::ok("plan updated"),
                    Err(e) => ToolResult::err(e.to_string()),
                };
                self.bus.emit(EnvelopeType::UpdatePlan, "plan updated");
                result
            }
            Args::Get { plan_id } => {
                let result = match registry.render(plan_id.as_deref()) {
                    Ok(rendered) => ToolResult::ok(rendered),
                    Err(e) => ToolResult::err(e.to_string()),
                };
                self.bus.emit(EnvelopeType::GetPlan, "plan fetched");
                result
            }
            Args::MarkStep {
                plan_id,
                step_index,
                status,
                notes,
            } => {
                let status = match status.as_deref().map(parse_status) {
                    Some(Some(s)) => Some(s),
                    Some(None) => return ToolResult::err("invalid step status"),
                    None => None,
                };
                let result = match registry.mark_step(plan_id.as_deref(), step_index, status, notes) {
                    Ok(()) => ToolResult::ok("step updated"),
                    Err(e) => ToolResult::err(e.to_string()),
                };
                self.bus.emit(
                    EnvelopeType::MarkPlanStep,
                    format!("step {step_index} updated"),
                );
                result
            }
            Args::List => {
                let titles: Vec<&str> = registry.list().iter().map(|p| p.title.as_str()).collect();
                let result = ToolResult::ok(titles.join("\n"));
                self.bus.emit(EnvelopeType::ListPlans, "plans listed");
                result
            }
            Args::SetActive { plan_id } => {
                let result = match registry.set_active(&plan_id) {
                    Ok(()) => ToolResult::ok(format!("active plan set to '{plan_id}'")),
                    Err(e) => ToolResult::err(e.to_string()),
                };
                self.bus.emit(
                    EnvelopeType::SetActivePlan,
                    format!("active plan set to '{plan_id}'"),
                );
                result
            }
            Args::Delete { plan_id } => {
                let result = match registry.delete(&plan_id) {
                    Ok(()) => ToolResult::ok(format!("deleted plan '{plan_id}'")),
                    Err(e) => ToolResult::err(e.to_string()),
                };
                self.bus
                    .emit(EnvelopeType::DeletePlan, format!("deleted plan '{plan_id}'"));
                result
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adapter() -> PlanningToolAdapter {
        let bus = Arc::new(OutputBus::new(tempfile::tempdir().unwrap().into_path()));
        PlanningToolAdapter::new(Arc::new(RwLock::new(PlanningTool::new())), bus)
    }

    #[tokio::test]
    async fn create_then_get_renders_plan() {
        let tool = adapter();
        let res = tool
            .execute(json!({
                "command": "create",
                "plan_id": "p1",
                "title": "Demo",
                "sections": [{"title": "Work", "steps": ["do it"], "types": ["executor"]}]
            }))
            .await;
        assert!(!res.is_error());

        let res = tool.execute(json!({"command": "get"})).await;
        assert!(res.output.unwrap().contains("Demo"));
    }

    #[tokio::test]
    async fn mark_step_with_invalid_status_is_an_error() {
        let tool = adapter();
        tool.execute(json!({
            "command": "create",
            "plan_id": "p1",
            "title": "Demo",
            "sections": [{"title": "Work", "steps": ["do it"], "types": ["executor"]}]
        }))
        .await;

        let res = tool
            .execute(json!({"command": "mark_step", "step_index": 0, "status": "not_a_status"}))
            .await;
        assert!(res.is_error());
    }

    #[tokio::test]
    async fn unknown_command_is_an_error() {
        let tool = adapter();
        let res = tool.execute(json!({"command": "not_a_command"})).await;
        assert!(res.is_error());
    }
}
