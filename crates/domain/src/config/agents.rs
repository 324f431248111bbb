use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// ReAct executor configuration
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Configuration for one named executor (worker agent). The Planning Flow's
/// `executor_keys` index into `agents` by this key; a step's `type` routes
/// directly to the matching key when one exists (§4.7 step 3c).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Provider id (from `[llm.providers]`) this executor calls. Falls back
    /// to `llm.default_provider` when unset.
    #[serde(default)]
    pub provider: Option<String>,
    /// Model name override. Falls back to the provider's `default_model`.
    #[serde(default)]
    pub model: Option<String>,
    /// Hard per-step cap on think/act iterations (§4.5 `run()`).
    #[serde(default = "d_max_steps")]
    pub max_steps: u32,
    /// Truncate recorded tool observations to this many characters.
    /// `None` means unbounded.
    #[serde(default)]
    pub max_observe: Option<usize>,
    #[serde(default)]
    pub tool_choice_mode: ToolChoiceMode,
    /// Tool names this executor may call. Empty means "every tool in the
    /// registry is available".
    #[serde(default)]
    pub tools: Vec<String>,
    /// Tool names whose successful execution finishes the step immediately
    /// (§4.4 "special tools"). `terminate` is always implicitly special.
    #[serde(default)]
    pub special_tool_names: Vec<String>,
    /// Prompt appended as a user message before every `think()` call, when set.
    #[serde(default)]
    pub next_step_prompt: Option<String>,
    /// System prompt prepended once when the executor's memory is empty.
    #[serde(default)]
    pub system_prompt: Option<String>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            provider: None,
            model: None,
            max_steps: d_max_steps(),
            max_observe: Some(8_000),
            tool_choice_mode: ToolChoiceMode::Auto,
            tools: Vec::new(),
            special_tool_names: Vec::new(),
            next_step_prompt: None,
            system_prompt: None,
        }
    }
}

impl AgentConfig {
    /// Whether `name` is treated as a special (run-terminating) tool for
    /// this executor. `terminate` is always special regardless of config.
    pub fn is_special_tool(&self, name: &str) -> bool {
        name == "terminate" || self.special_tool_names.iter().any(|n| n == name)
    }
}

/// Tool-choice dispatch mode for `think()` (§4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ToolChoiceMode {
    /// Ignore any tool_calls the model produced; text-only turn.
    None,
    /// The model must call a tool; `act()` fails if it didn't.
    Required,
    /// Either a tool call or text content is acceptable (default).
    #[default]
    Auto,
}

/// All configured executors, keyed by executor key (matches plan step
/// `type` values and `executor_keys` ordering).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AgentsConfig {
    #[serde(flatten)]
    pub executors: HashMap<String, AgentConfig>,
    /// Declares the iteration order `executor_keys` (§4.7); the first entry
    /// is the primary agent. Entries not present in `executors` fall back
    /// to `AgentConfig::default()`.
    #[serde(default = "d_executor_order")]
    pub executor_order: Vec<String>,
    /// Executor key used for the planning agent (§4.8).
    #[serde(default = "d_planner")]
    pub planner: String,
}

fn d_max_steps() -> u32 {
    20
}
fn d_executor_order() -> Vec<String> {
    vec!["executor".into()]
}
fn d_planner() -> String {
    "planner".into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminate_is_always_special() {
        let cfg = AgentConfig::default();
        assert!(cfg.is_special_tool("terminate"));
    }

    #[test]
    fn configured_special_tool_recognized() {
        let cfg = AgentConfig {
            special_tool_names: vec!["result_reporter".into()],
            ..AgentConfig::default()
        };
        assert!(cfg.is_special_tool("result_reporter"));
        assert!(!cfg.is_special_tool("python_execute"));
    }

    #[test]
    fn defaults_are_auto_mode_with_bounded_steps() {
        let cfg = AgentConfig::default();
        assert_eq!(cfg.tool_choice_mode, ToolChoiceMode::Auto);
        assert_eq!(cfg.max_steps, 20);
        assert_eq!(cfg.max_observe, Some(8_000));
    }
}
