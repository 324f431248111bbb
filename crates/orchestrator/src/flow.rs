//! Planning Flow (§4.7-§4.10) — the main controller that resolves a plan,
//! steps an executor through it, summarizes the running conversation, and
//! finalizes once every real step is done.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::{json, Value};

use sa_domain::config::Config;
use sa_domain::error::{Error, Result};
use sa_domain::tool::{Message, ToolDefinition};
use sa_domain::trace::TraceEvent;
use sa_outputbus::{EnvelopeType, OutputBus};
use sa_providers::Gateway;
use sa_sessions::SessionStore;
use sa_tools::ToolRegistry;

use crate::agent::ReactAgent;
use crate::memory::Memory;
use crate::plan::{PlanningTool, Section, StepStatus};

/// Bit-exact step prompt template (§6) — the interface between flow and
/// executor.
fn build_step_prompt(plan_text: &str, step_index: usize, step_text: &str) -> String {
    format!(
        "CURRENT PLAN STATUS:\n{plan_text}\n\nYOUR CURRENT TASK:\n\
         You are now working on step {}: \"{}\"\n\n\
         Please execute this step using the appropriate tools. When you're done,\n\
         provide a summary of what you accomplished.",
        step_index + 1,
        step_text
    )
}

pub struct PlanningFlow {
    executor_order: Vec<String>,
    primary_agent: String,
    planner_key: String,
    max_step_retries: u32,
    auto_summary: bool,

    gateway: Arc<Gateway>,
    bus: Arc<OutputBus>,
    session_store: Option<Arc<SessionStore>>,
    session_id: Option<String>,

    memory: Memory,
    planning: Arc<RwLock<PlanningTool>>,
    executors: HashMap<String, ReactAgent>,
    planner: ReactAgent,
    step_retries: HashMap<usize, u32>,
}

impl PlanningFlow {
    pub fn new(
        config: &Config,
        planning: Arc<RwLock<PlanningTool>>,
        tools: Arc<ToolRegistry>,
        gateway: Arc<Gateway>,
        bus: Arc<OutputBus>,
        session_store: Option<Arc<SessionStore>>,
        session_id: Option<String>,
    ) -> Self {
        let executor_order = config.agents.executor_order.clone();
        let primary_agent = executor_order
            .first()
            .cloned()
            .unwrap_or_else(|| "executor".to_string());

        let mut executors = HashMap::new();
        for key in &executor_order {
            let agent_cfg = config.agent_config(key);
            executors.insert(
                key.clone(),
                ReactAgent::new(
                    key.clone(),
                    agent_cfg,
                    Memory::new(),
                    tools.clone(),
                    gateway.clone(),
                    bus.clone(),
                ),
            );
        }

        let planner_key = config.agents.planner.clone();
        let planner_cfg = config.agent_config(&planner_key);
        let planner = ReactAgent::new(
            planner_key.clone(),
            planner_cfg,
            Memory::new(),
            tools.clone(),
            gateway.clone(),
            bus.clone(),
        );

        let mut flow = Self {
            executor_order,
            primary_agent,
            planner_key,
            max_step_retries: config.sessions.max_step_retries,
            auto_summary: config.llm.auto_summary,
            gateway,
            bus,
            session_store,
            session_id,
            memory: Memory::new(),
            planning,
            executors,
            planner,
            step_retries: HashMap::new(),
        };
        flow.restore_from_snapshot();
        flow
    }

    fn restore_from_snapshot(&mut self) {
        let (Some(store), Some(session_id)) = (&self.session_store, &self.session_id) else {
            return;
        };
        let snapshot = match store.load(session_id) {
            Ok(Some(s)) => s,
            _ => return,
        };

        self.memory = Memory::from_messages(snapshot.memory);

        if let Ok(restored) = PlanningTool::from_value(snapshot.plans) {
            *self.planning.write() = restored;
        }

        for (key, agent_snapshot) in snapshot.agents {
            let restored_memory = Memory::from_messages(agent_snapshot.messages);
            if key == self.planner_key {
                self.planner.set_memory(restored_memory);
            } else if let Some(agent) = self.executors.get_mut(&key) {
                agent.set_memory(restored_memory);
            }
        }
    }

    /// `execute(input_text)` (§4.7). Never propagates an error: any failure
    /// is caught, logged, snapshotted, and returned as a descriptive string.
    pub async fn execute(&mut self, input_text: &str) -> String {
        match self.execute_inner(input_text).await {
            Ok(summary) => {
                self.snapshot();
                summary
            }
            Err(e) => {
                tracing::error!(error = %e, "planning flow execution failed");
                self.snapshot();
                format!("Execution failed: {e}")
            }
        }
    }

    async fn execute_inner(&mut self, input_text: &str) -> Result<String> {
        self.resolve_plan(input_text).await?;
        self.snapshot();

        let mut step_results = Vec::new();

        loop {
            let current = self.next_runnable_step()?;

            let Some((idx, step_info, total)) = current else {
                let all_answerbot = self.planning.read().get(None)?.is_all_answerbot();
                if all_answerbot {
                    self.bus.emit(EnvelopeType::LiveStatus, "Plan completed");
                    return Ok(step_results.join("\n\n"));
                }
                step_results.push(self.finalize_plan().await?);
                break;
            };

            self.bus.emit(
                EnvelopeType::LiveStatus,
                format!("Executing plan step {}/{}", idx + 1, total),
            );

            let executor_key = self.select_executor(&step_info.step_type);

            if self.auto_summary && idx > 0 {
                self.summarize_messages().await;
            }

            let plan_text = self.planning.read().render(None)?;
            let prompt = build_step_prompt(&plan_text, idx, &step_info.step);

            let Some(executor) = self.executors.get_mut(&executor_key) else {
                return Err(Error::Other(format!(
                    "no executor configured for key '{executor_key}'"
                )));
            };
            executor.set_memory(self.memory.clone());

            match executor.run(&prompt).await {
                Ok(observation) => {
                    self.mark_step_completed(idx, &executor_key)?;
                    step_results.push(observation);
                }
                Err(e) => {
                    tracing::warn!(step = idx, error = %e, "step execution failed");
                    let retries = self.step_retries.entry(idx).or_insert(0);
                    *retries += 1;
                    if *retries > self.max_step_retries {
                        self.planning.write().mark_step(
                            None,
                            idx,
                            Some(StepStatus::Blocked),
                            Some(format!("blocked after {retries} failed attempts: {e}")),
                        )?;
                    }
                    step_results.push(format!("Error: {e}"));
                }
            }

            let finished = self
                .executors
                .get(&executor_key)
                .map(|a| a.is_finished())
                .unwrap_or(false);
            self.snapshot();
            if finished {
                break;
            }
        }

        self.bus.emit(EnvelopeType::LiveStatus, "Plan completed");
        Ok(step_results.join("\n\n"))
    }

    /// §4.7 step 1: resume an in-progress plan, or delegate to the planning
    /// agent for a fresh one.
    async fn resolve_plan(&mut self, input_text: &str) -> Result<()> {
        let resumable = {
            let planning = self.planning.read();
            planning
                .active_plan_id()
                .and_then(|id| planning.get(Some(id)).ok())
                .map(|p| p.current_step_index().is_some())
                .unwrap_or(false)
        };

        if resumable {
            self.memory.append(Message::user(input_text));
            return Ok(());
        }

        self.create_initial_plan(input_text).await
    }

    /// §4.8: delegate plan creation to the planning agent; adopt whatever
    /// plan it leaves active, or synthesize a fallback otherwise.
    async fn create_initial_plan(&mut self, input_text: &str) -> Result<()> {
        self.bus.emit(EnvelopeType::LiveStatus, "Creating initial plan");

        self.planner.set_memory(Memory::new());
        let planner_prompt = format!(
            "Create a step-by-step plan to satisfy this request, using the planning tool:\n\n{input_text}"
        );
        if let Err(e) = self.planner.run(&planner_prompt).await {
            tracing::warn!(error = %e, "planning agent failed; falling back to a single-step plan");
        }

        let adopted = self.planning.read().active_plan_id().map(str::to_string);
        if adopted.is_none() {
            let fallback_id = format!("fallback-{}", uuid::Uuid::new_v4());
            let mut planning = self.planning.write();
            planning.create(
                &fallback_id,
                "Answer",
                vec![Section {
                    title: "Answer".into(),
                    steps: vec![input_text.to_string()],
                    types: vec!["answerbot".into()],
                }],
            )?;
            TraceEvent::PlanCreated {
                plan_id: fallback_id,
                total_steps: 1,
            }
            .emit();
        }

        self.memory.append(Message::user(input_text));
        Ok(())
    }

    /// The step the loop should run next: `Plan::current_step_index` is kept
    /// spec-exact (§3: "next non-completed global step"), so a step this
    /// flow already gave up on and marked `Blocked` (§9 Open Question #2)
    /// would otherwise be handed back forever. Skipping past `Blocked` steps
    /// is this loop's own retry policy, not a property of the plan itself.
    fn next_runnable_step(&self) -> Result<Option<(usize, crate::plan::StepInfo, usize)>> {
        let planning = self.planning.read();
        let plan = planning.get(None)?;
        let idx = plan
            .step_statuses
            .iter()
            .position(|s| !matches!(s, StepStatus::Completed | StepStatus::Blocked));
        Ok(idx.and_then(|idx| plan.step_info(idx).map(|info| (idx, info, plan.step_statuses.len()))))
    }

    /// §4.7 step 3c.
    fn select_executor(&self, step_type: &str) -> String {
        if self.executors.contains_key(step_type) {
            return step_type.to_string();
        }
        for key in &self.executor_order {
            if self.executors.contains_key(key) {
                return key.clone();
            }
        }
        self.primary_agent.clone()
    }

    fn mark_step_completed(&self, idx: usize, executor_key: &str) -> Result<()> {
        let plan_id = {
            let mut planning = self.planning.write();
            planning.mark_step(None, idx, Some(StepStatus::Completed), None)?;
            planning.active_plan_id().map(str::to_string)
        };
        if let Some(plan_id) = plan_id {
            TraceEvent::StepCompleted {
                plan_id,
                step_index: idx,
                executor: executor_key.to_string(),
            }
            .emit();
        }
        self.step_retries.remove(&idx);
        Ok(())
    }

    /// §4.9: compress flow memory before each non-first step. Leaves memory
    /// untouched on any error.
    async fn summarize_messages(&mut self) {
        let history = self.memory.snapshot();
        if history.is_empty() {
            return;
        }

        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(Message::system(sa_contextpack::summarize::SUMMARY_SYSTEM_PROMPT));
        messages.extend(history.clone());
        messages.push(Message::user(sa_contextpack::summarize::SUMMARY_USER_INSTRUCTION));

        match self.gateway.ask(None, None, messages).await {
            Ok(summary_text) => {
                let rebuilt = sa_contextpack::summarize::rebuild_memory(&history, &summary_text);
                self.memory.replace_all(rebuilt);
            }
            Err(e) => {
                tracing::warn!(error = %e, "conversation summarization failed; leaving memory untouched");
            }
        }
    }

    /// §4.10: finalize once every real step is done.
    async fn finalize_plan(&mut self) -> Result<String> {
        self.bus.emit(EnvelopeType::LiveStatus, "Finalizing plan");

        let result_reporter_def = ToolDefinition {
            name: "result_reporter".into(),
            description: "Report the final deliverables produced by this run.".into(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "deliverables": {"type": "array", "items": {"type": "string"}}
                },
                "required": ["deliverables"]
            }),
        };

        let mut messages = self.memory.snapshot();
        messages.push(Message::user(
            "Summarize the deliverables produced by this run. If you produced concrete \
             deliverables, report them via the result_reporter tool.",
        ));

        let resp = self
            .gateway
            .ask_tool(None, None, messages, std::slice::from_ref(&result_reporter_def))
            .await?;

        let deliverables = resp
            .tool_calls
            .iter()
            .find(|c| c.function.name == "result_reporter")
            .and_then(|c| serde_json::from_str::<Value>(&c.function.arguments).ok())
            .and_then(|args| args.get("deliverables").cloned());

        if let Some(deliverables) = deliverables {
            self.bus.emit_with_data(
                EnvelopeType::FinalResult,
                resp.content.clone(),
                Some(json!({ "deliverables": deliverables })),
            );
            return Ok(resp.content);
        }

        Ok("Plan execution completed.".to_string())
    }

    /// Public hook for callers that need to snapshot outside of a normal
    /// `execute` return path — e.g. the CLI's wall-clock timeout and
    /// interrupt handling (§5/§7), which cancel the in-flight `execute`
    /// future and so never reach its own `finally` snapshot.
    pub fn save_snapshot(&self) {
        self.snapshot();
    }

    /// §4.11: write a full-file snapshot, never propagating a write error.
    fn snapshot(&self) {
        let (Some(store), Some(session_id)) = (&self.session_store, &self.session_id) else {
            return;
        };

        let planning = self.planning.read();
        let active_plan_id = planning.active_plan_id().map(str::to_string);
        let current_step_index = active_plan_id
            .as_deref()
            .and_then(|id| planning.get(Some(id)).ok())
            .and_then(|p| p.current_step_index());

        let mut snapshot = sa_sessions::Snapshot::new(session_id.clone());
        snapshot.active_plan_id = active_plan_id;
        snapshot.current_step_index = current_step_index;
        snapshot.plans = planning.to_value();
        snapshot.memory = self.memory.snapshot();

        for (key, agent) in &self.executors {
            snapshot.agents.insert(key.clone(), agent.to_snapshot());
        }
        snapshot.agents.insert(self.planner_key.clone(), self.planner.to_snapshot());

        if let Err(e) = store.save(session_id, &snapshot) {
            tracing::warn!(error = %e, "failed to write session snapshot");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_prompt_matches_the_bit_exact_template() {
        let prompt = build_step_prompt("Plan: Demo\n", 0, "do the thing");
        assert_eq!(
            prompt,
            "CURRENT PLAN STATUS:\nPlan: Demo\n\n\
             YOUR CURRENT TASK:\n\
             You are now working on step 1: \"do the thing\"\n\n\
             Please execute this step using the appropriate tools. When you're done,\n\
             provide a summary of what you accomplished."
        );
    }
}
