//! Tool Registry (§4.4) — the uniform invocation surface the ReAct Agent
//! dispatches through. Maps a tool name to its [`ToolDefinition`] (offered
//! to the LLM) and an `execute(arguments) -> ToolResult` implementation.
//!
//! Argument parsing happens here, not in the caller: `function.arguments`
//! is a JSON-encoded string, parsed lazily so a malformed payload is a
//! recoverable tool-error observation, never an agent crash.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use sa_domain::tool::ToolDefinition;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// ToolResult
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// The sum type every tool invocation returns (§4.4). `error` is a
/// non-fatal observation unless the tool is declared special.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ToolResult {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base64_image: Option<String>,
    /// When set, `observation_text()` uses `error` verbatim instead of
    /// prepending its usual `"Error: "` prefix — for call sites that must
    /// match a spec-mandated literal string.
    #[serde(skip)]
    pub raw_error: bool,
}

impl ToolResult {
    pub fn ok(output: impl Into<String>) -> Self {
        Self {
            output: Some(output.into()),
            ..Default::default()
        }
    }

    pub fn ok_with_image(output: impl Into<String>, base64_image: impl Into<String>) -> Self {
        Self {
            output: Some(output.into()),
            base64_image: Some(base64_image.into()),
            ..Default::default()
        }
    }

    pub fn err(message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            ..Default::default()
        }
    }

    /// Like [`Self::err`], but `observation_text()` returns `message`
    /// verbatim rather than prepending `"Error: "`.
    pub fn err_literal(message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            raw_error: true,
            ..Default::default()
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// The text the ReAct Agent records as the tool's observation in
    /// memory (§4.5 act()) — the `output`, or the `error` text when the
    /// call failed.
    pub fn observation_text(&self) -> String {
        match (&self.output, &self.error) {
            (_, Some(err)) if self.raw_error => err.clone(),
            (_, Some(err)) => format!("Error: {err}"),
            (Some(out), None) => out.clone(),
            (None, None) => String::new(),
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tool trait
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A single named, parameterized capability callable by the agent (§1/§6).
#[async_trait::async_trait]
pub trait Tool: Send + Sync {
    /// The definition offered to the LLM (name, description, parameter schema).
    fn definition(&self) -> ToolDefinition;

    /// Special tools (§4.4) finish the owning agent's run immediately on a
    /// successful execution. `terminate` is always special regardless of
    /// what an individual tool implementation returns here — the registry
    /// enforces that at `is_special`.
    fn is_special(&self) -> bool {
        false
    }

    async fn execute(&self, arguments: Value) -> ToolResult;
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// ToolRegistry
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Uniform invocation surface over every registered [`Tool`].
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.definition().name.clone();
        self.tools.insert(name, tool);
    }

    /// Tool definitions offered to the LLM. `allowed` is the executor's
    /// configured tool list (§4.5/config `AgentConfig.tools`); an empty
    /// list means "every registered tool is available".
    pub fn definitions_for(&self, allowed: &[String]) -> Vec<ToolDefinition> {
        let mut defs: Vec<ToolDefinition> = if allowed.is_empty() {
            self.tools.values().map(|t| t.definition()).collect()
        } else {
            allowed
                .iter()
                .filter_map(|name| self.tools.get(name))
                .map(|t| t.definition())
                .collect()
        };
        defs.sort_by(|a, b| a.name.cmp(&b.name));
        defs
    }

    /// §4.4: `terminate` is always special, regardless of config or what an
    /// individual tool's `is_special()` reports.
    pub fn is_special(&self, name: &str) -> bool {
        name == "terminate" || self.tools.get(name).map(|t| t.is_special()).unwrap_or(false)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Dispatch a tool call. Argument parsing and unknown-tool lookups are
    /// both recoverable tool-error observations, never propagated errors.
    pub async fn execute(&self, name: &str, arguments_json: &str) -> ToolResult {
        let Some(tool) = self.tools.get(name) else {
            return ToolResult::err(format!("Unknown tool '{name}'"));
        };

        let arguments: Value = if arguments_json.trim().is_empty() {
            Value::Object(Default::default())
        } else {
            match serde_json::from_str(arguments_json) {
                Ok(v) => v,
                Err(_) => {
                    return ToolResult::err_literal(format!(
                        "Error parsing arguments for {name}: Invalid JSON format"
                    ));
                }
            }
        };

        tool.execute(arguments).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo;

    #[async_trait::async_trait]
    impl Tool for Echo {
        fn definition(&self) -> ToolDefinition {
            ToolDefinition {
                name: "echo".into(),
                description: "echoes its input".into(),
                parameters: serde_json::json!({"type": "object", "properties": {}}),
            }
        }

        async fn execute(&self, arguments: Value) -> ToolResult {
            ToolResult::ok(arguments.to_string())
        }
    }

    struct Terminate;

    #[async_trait::async_trait]
    impl Tool for Terminate {
        fn definition(&self) -> ToolDefinition {
            ToolDefinition {
                name: "terminate".into(),
                description: "finish the run".into(),
                parameters: serde_json::json!({"type": "object", "properties": {}}),
            }
        }

        fn is_special(&self) -> bool {
            true
        }

        async fn execute(&self, _arguments: Value) -> ToolResult {
            ToolResult::ok("done")
        }
    }

    fn registry() -> ToolRegistry {
        let mut r = ToolRegistry::new();
        r.register(Arc::new(Echo));
        r.register(Arc::new(Terminate));
        r
    }

    #[tokio::test]
    async fn unknown_tool_returns_observation_error() {
        let r = registry();
        let res = r.execute("does_not_exist", "{}").await;
        assert_eq!(res.error.as_deref(), Some("Unknown tool 'does_not_exist'"));
    }

    #[tokio::test]
    async fn malformed_arguments_returns_parse_error() {
        let r = registry();
        let res = r.execute("echo", "{not json").await;
        assert_eq!(
            res.observation_text(),
            "Error parsing arguments for echo: Invalid JSON format"
        );
    }

    #[tokio::test]
    async fn known_tool_dispatches() {
        let r = registry();
        let res = r.execute("echo", r#"{"a":1}"#).await;
        assert_eq!(res.output.as_deref(), Some(r#"{"a":1}"#));
    }

    #[test]
    fn terminate_is_always_special_even_if_unregistered() {
        let r = ToolRegistry::new();
        assert!(r.is_special("terminate"));
    }

    #[test]
    fn definitions_for_empty_allowlist_returns_everything() {
        let r = registry();
        let defs = r.definitions_for(&[]);
        assert_eq!(defs.len(), 2);
    }

    #[test]
    fn definitions_for_filters_by_allowlist() {
        let r = registry();
        let defs = r.definitions_for(&["echo".to_string()]);
        assert_eq!(defs.len(), 1);
        assert_eq!(defs[0].name, "echo");
    }
}
