//! ReAct Tool-Calling Agent (§4.5) — the per-step inner loop.
//!
//! Composes messages, invokes the LLM Gateway (optionally with image
//! attachments when the previous tool observation produced one), parses
//! tool-call intents, dispatches through the Tool Registry, and decides
//! when to stop.

use std::sync::Arc;

use serde_json::json;

use sa_contextpack::ImageAttachment;
use sa_domain::config::{AgentConfig, ToolChoiceMode};
use sa_domain::error::{Error, Result};
use sa_domain::tool::{Message, Role, ToolCall};
use sa_outputbus::{EnvelopeType, OutputBus};
use sa_providers::Gateway;
use sa_tools::ToolRegistry;

use crate::memory::Memory;

/// Per-step state machine (§4.5): `Idle → Running → Finished | Error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentState {
    Idle,
    Running,
    Finished,
    Error,
}

impl std::fmt::Display for AgentState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            AgentState::Idle => "idle",
            AgentState::Running => "running",
            AgentState::Finished => "finished",
            AgentState::Error => "error",
        };
        write!(f, "{s}")
    }
}

/// Truncate to at most `max` chars, respecting UTF-8 boundaries.
fn truncate_chars(s: &mut String, max: usize) {
    if s.chars().count() <= max {
        return;
    }
    let cut = s
        .char_indices()
        .nth(max)
        .map(|(i, _)| i)
        .unwrap_or(s.len());
    s.truncate(cut);
}

pub struct ReactAgent {
    name: String,
    config: AgentConfig,
    memory: Memory,
    tools: Arc<ToolRegistry>,
    gateway: Arc<Gateway>,
    bus: Arc<OutputBus>,
    current_step: usize,
    state: AgentState,
    pending_tool_calls: Vec<ToolCall>,
}

impl ReactAgent {
    pub fn new(
        name: impl Into<String>,
        config: AgentConfig,
        memory: Memory,
        tools: Arc<ToolRegistry>,
        gateway: Arc<Gateway>,
        bus: Arc<OutputBus>,
    ) -> Self {
        Self {
            name: name.into(),
            config,
            memory,
            tools,
            gateway,
            bus,
            current_step: 0,
            state: AgentState::Idle,
            pending_tool_calls: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> AgentState {
        self.state
    }

    pub fn current_step(&self) -> usize {
        self.current_step
    }

    pub fn memory(&self) -> &Memory {
        &self.memory
    }

    /// Share the flow's memory with this executor for the duration of a
    /// step (§4.7 step 3e, §9 "shared memory between flow and executor").
    pub fn set_memory(&mut self, memory: Memory) {
        self.memory = memory;
    }

    pub fn is_finished(&self) -> bool {
        self.state == AgentState::Finished
    }

    /// Reset per-step counters before running a step. §3 "Lifecycles":
    /// agent state resets per step (`current_step=0`, `state=running`).
    fn reset_for_step(&mut self) {
        self.current_step = 0;
        self.state = AgentState::Running;
        self.pending_tool_calls.clear();
    }

    /// §9 "image-aware routing": data-driven off the *last* tool message's
    /// payload shape, not a separate agent mode.
    fn image_from_last_tool_message(&self) -> Option<ImageAttachment> {
        let snapshot = self.memory.snapshot();
        let last = snapshot.last()?;
        if last.role != Role::Tool {
            return None;
        }
        let base64_data = last.base64_image.clone()?;
        Some(ImageAttachment {
            media_type: "image/png".to_string(),
            base64_data,
        })
    }

    /// `think()` — §4.5. Returns `Ok(true)` when `act()` should run this
    /// iteration, `Ok(false)` when the step has nothing further to do.
    async fn think(&mut self) -> Result<bool> {
        if self.memory.is_empty() {
            if let Some(system_prompt) = &self.config.system_prompt {
                self.memory.append(Message::system(system_prompt.clone()));
            }
        }
        if let Some(next_step_prompt) = &self.config.next_step_prompt {
            self.memory.append(Message::user(next_step_prompt.clone()));
        }

        let image = self.image_from_last_tool_message();
        let tool_defs = self.tools.definitions_for(&self.config.tools);
        let messages = self.memory.snapshot();

        let call_result = match &image {
            Some(img) => {
                self.gateway
                    .ask_tool_with_images(
                        self.config.provider.as_deref(),
                        self.config.model.as_deref(),
                        messages,
                        &tool_defs,
                        std::slice::from_ref(img),
                    )
                    .await
            }
            None => {
                self.gateway
                    .ask_tool(
                        self.config.provider.as_deref(),
                        self.config.model.as_deref(),
                        messages,
                        &tool_defs,
                    )
                    .await
            }
        };

        let resp = match call_result {
            Ok(resp) => resp,
            Err(Error::TokenLimitExceeded { used, limit }) => {
                self.memory.append(Message::assistant(format!(
                    "Maximum token limit reached (used {used} tokens, limit {limit}); \
                     stopping this step without further tool calls."
                )));
                self.state = AgentState::Finished;
                return Ok(false);
            }
            Err(e) => return Err(e),
        };

        match self.config.tool_choice_mode {
            ToolChoiceMode::None => {
                self.memory.append(Message::assistant(resp.content.clone()));
                self.pending_tool_calls = Vec::new();
                Ok(!resp.content.trim().is_empty())
            }
            ToolChoiceMode::Required => {
                if resp.tool_calls.is_empty() {
                    self.memory.append(Message::assistant(resp.content.clone()));
                } else {
                    self.memory.append(Message::assistant_with_tool_calls(
                        resp.content.clone(),
                        resp.tool_calls.clone(),
                    ));
                }
                self.pending_tool_calls = resp.tool_calls;
                Ok(true)
            }
            ToolChoiceMode::Auto => {
                let has_calls = !resp.tool_calls.is_empty();
                if has_calls {
                    self.memory.append(Message::assistant_with_tool_calls(
                        resp.content.clone(),
                        resp.tool_calls.clone(),
                    ));
                } else {
                    self.memory.append(Message::assistant(resp.content.clone()));
                }
                self.pending_tool_calls = resp.tool_calls;
                Ok(has_calls || !resp.content.trim().is_empty())
            }
        }
    }

    /// `act()` — §4.5. Dispatches every pending tool call in order and
    /// returns their joined observations.
    async fn act(&mut self) -> Result<String> {
        if self.pending_tool_calls.is_empty() {
            if self.config.tool_choice_mode == ToolChoiceMode::Required {
                return Err(Error::Tool("Tool calls required but none provided".into()));
            }
            return Ok(String::new());
        }

        let calls = std::mem::take(&mut self.pending_tool_calls);
        let mut observations = Vec::with_capacity(calls.len());

        for call in calls {
            self.bus.emit_with_data(
                EnvelopeType::Execute,
                format!("Executing {}", call.function.name),
                Some(json!({
                    "status": "executing",
                    "tool": call.function.name,
                    "tool_call_id": call.id,
                })),
            );

            let result = self
                .tools
                .execute(&call.function.name, &call.function.arguments)
                .await;

            let mut observation = result.observation_text();
            if let Some(max) = self.config.max_observe {
                truncate_chars(&mut observation, max);
            }

            let wrapped = format!(
                "Observed output of cmd `{}` executed:\n{}",
                call.function.name, observation
            );
            self.memory.append(Message::tool_result(
                call.id.clone(),
                call.function.name.clone(),
                wrapped,
                result.base64_image.clone(),
            ));

            self.bus.emit_with_data(
                EnvelopeType::Execute,
                format!(
                    "{} {}",
                    if result.is_error() { "Failed" } else { "Completed" },
                    call.function.name
                ),
                Some(json!({
                    "status": if result.is_error() { "error" } else { "completed" },
                    "tool": call.function.name,
                    "tool_call_id": call.id,
                    "result": observation,
                })),
            );

            observations.push(observation);

            // §4.4 "special tools": successful or not, a special tool's
            // execution finishes the owning agent's step immediately.
            if self.tools.is_special(&call.function.name) || self.config.is_special_tool(&call.function.name) {
                self.state = AgentState::Finished;
            }
        }

        Ok(observations.join("\n\n"))
    }

    /// `run()` — iterate think/act while `state == Running` and step count
    /// is under `max_steps`; returns the concatenation of observations.
    pub async fn run(&mut self, prompt: &str) -> Result<String> {
        self.reset_for_step();

        if !prompt.is_empty() {
            self.memory.append(Message::user(prompt));
        }

        let mut observations = Vec::new();

        while self.state == AgentState::Running && self.current_step < self.config.max_steps as usize {
            self.current_step += 1;

            let proceed = match self.think().await {
                Ok(p) => p,
                Err(e) => {
                    self.state = AgentState::Error;
                    return Err(e);
                }
            };

            if !proceed {
                if self.state == AgentState::Running {
                    self.state = AgentState::Finished;
                }
                break;
            }

            let obs = match self.act().await {
                Ok(o) => o,
                Err(e) => {
                    self.state = AgentState::Error;
                    return Err(e);
                }
            };
            if !obs.is_empty() {
                observations.push(obs);
            }

            if self.state != AgentState::Running {
                break;
            }
        }

        if self.state == AgentState::Running {
            self.state = AgentState::Finished;
        }

        Ok(observations.join("\n\n"))
    }

    pub fn to_snapshot(&self) -> sa_sessions::AgentSnapshot {
        sa_sessions::AgentSnapshot {
            current_step: Some(self.current_step),
            state: self.state.to_string(),
            messages: self.memory.snapshot(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_chars_respects_utf8_boundaries() {
        let mut s = "héllo wörld".to_string();
        truncate_chars(&mut s, 3);
        assert_eq!(s.chars().count(), 3);
    }

    #[test]
    fn truncate_chars_noop_when_under_limit() {
        let mut s = "short".to_string();
        truncate_chars(&mut s, 100);
        assert_eq!(s, "short");
    }

    #[test]
    fn agent_state_display_matches_snapshot_vocabulary() {
        assert_eq!(AgentState::Running.to_string(), "running");
        assert_eq!(AgentState::Finished.to_string(), "finished");
    }
}
