//! Concrete [`Tool`] implementations: the code runner, file editor, and
//! process manager wired to this crate's own `exec`/`file_ops`/`process`
//! helpers, plus thin stub adapters for the external collaborators named
//! only by their interface contract (§6): `web_search`, `datasource`,
//! `dashboard`, `human_input`, `result_reporter`, and the built-in special
//! tool `terminate`.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::SystemTime;

use serde_json::{json, Value};

use crate::exec::{self, ExecRequest};
use crate::file_ops::{
    self, FileAppendRequest, FileDeleteRequest, FileListRequest, FileMoveRequest,
    FileReadRequest, FileWriteRequest,
};
use crate::manager::ProcessManager;
use crate::process::{self, ProcessRequest};
use crate::registry::{Tool, ToolResult};
use sa_domain::tool::ToolDefinition;
use sa_outputbus::{EnvelopeType, OutputBus};

fn schema(properties: Value, required: &[&str]) -> Value {
    json!({
        "type": "object",
        "properties": properties,
        "required": required,
    })
}

fn value_to_result(body: Result<Value, String>) -> ToolResult {
    match body {
        Ok(v) => ToolResult::ok(serde_json::to_string_pretty(&v).unwrap_or_else(|_| v.to_string())),
        Err(e) => ToolResult::err(e),
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// python_execute — wraps the exec tool, shaping its response so the
// flow's "real result" detection (§4.9) sees `success`/`files`/`charts`.
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct PythonExecuteTool {
    manager: Arc<ProcessManager>,
    workspace_root: PathBuf,
    bus: Arc<OutputBus>,
}

impl PythonExecuteTool {
    pub fn new(manager: Arc<ProcessManager>, workspace_root: PathBuf, bus: Arc<OutputBus>) -> Self {
        Self {
            manager,
            workspace_root,
            bus,
        }
    }

    /// Files written under `workspace_root` since `since`, split into
    /// images (charts) and everything else. `workspace_root` is shared
    /// across every step and session, so without this mtime filter a file
    /// left by an earlier invocation would be wrongly re-reported as this
    /// invocation's own output.
    fn collect_produced_artifacts(&self, since: SystemTime) -> (Vec<String>, Vec<String>) {
        let mut files = Vec::new();
        let mut charts = Vec::new();
        let Ok(entries) = std::fs::read_dir(&self.workspace_root) else {
            return (files, charts);
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let Ok(metadata) = entry.metadata() else {
                continue;
            };
            let Ok(modified) = metadata.modified() else {
                continue;
            };
            if modified < since {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            match path.extension().and_then(|e| e.to_str()) {
                Some("png") | Some("jpg") | Some("jpeg") | Some("svg") => charts.push(name),
                _ => files.push(name),
            }
        }
        (files, charts)
    }
}

#[async_trait::async_trait]
impl Tool for PythonExecuteTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "python_execute".into(),
            description: "Execute a Python snippet in a sandboxed subprocess and return its \
                stdout/stderr, along with any files or charts it produced in the workspace."
                .into(),
            parameters: schema(
                json!({
                    "code": {"type": "string", "description": "Python source to execute."},
                    "timeout_sec": {"type": "integer", "description": "Optional override of the default ~150s timeout."},
                }),
                &["code"],
            ),
        }
    }

    async fn execute(&self, arguments: Value) -> ToolResult {
        let Some(code) = arguments.get("code").and_then(|v| v.as_str()) else {
            return ToolResult::err("missing required argument 'code'");
        };
        let timeout_sec = arguments.get("timeout_sec").and_then(|v| v.as_u64());
        let started_at = SystemTime::now();

        self.bus.emit(
            EnvelopeType::PythonExecuteStreaming,
            "executing python snippet",
        );

        let script_path = self.workspace_root.join(format!(
            ".python_execute_{}.py",
            uuid::Uuid::new_v4().as_simple()
        ));
        if let Err(e) = std::fs::write(&script_path, code) {
            return ToolResult::err(format!("failed to stage python script: {e}"));
        }

        let req = ExecRequest {
            command: format!("python3 {}", script_path.display()),
            background: false,
            yield_ms: None,
            timeout_sec,
            workdir: Some(self.workspace_root.display().to_string()),
            env: None,
        };
        let resp = exec::exec(&self.manager, req).await;
        let _ = std::fs::remove_file(&script_path);

        let success = matches!(resp.status, crate::manager::ProcessStatus::Finished)
            && resp.exit_code.unwrap_or(1) == 0;
        let (files, charts) = if success {
            self.collect_produced_artifacts(started_at)
        } else {
            (Vec::new(), Vec::new())
        };

        let body = json!({
            "success": success,
            "status": resp.status,
            "exit_code": resp.exit_code,
            "output": resp.output,
            "session_id": resp.session_id,
            "tail": resp.tail,
            "files": files,
            "charts": charts,
        });

        if success {
            ToolResult::ok(serde_json::to_string_pretty(&body).unwrap_or_else(|_| body.to_string()))
        } else {
            ToolResult {
                output: Some(serde_json::to_string_pretty(&body).unwrap_or_else(|_| body.to_string())),
                error: Some(resp.output.unwrap_or_else(|| "python execution failed".into())),
                system: None,
                base64_image: None,
                raw_error: false,
            }
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// file_editor — wraps file_ops::{read,write,append,move,delete,list}.
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct FileEditorTool {
    workspace_root: PathBuf,
}

impl FileEditorTool {
    pub fn new(workspace_root: PathBuf) -> Self {
        Self { workspace_root }
    }
}

#[async_trait::async_trait]
impl Tool for FileEditorTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "file_editor".into(),
            description: "Read, write, append, move, delete, or list files inside the \
                workspace. Dispatches on the `command` field."
                .into(),
            parameters: schema(
                json!({
                    "command": {"type": "string", "enum": ["read", "write", "append", "move", "delete", "list"]},
                    "path": {"type": "string"},
                    "content": {"type": "string"},
                    "source": {"type": "string"},
                    "destination": {"type": "string"},
                    "offset": {"type": "integer"},
                    "limit": {"type": "integer"},
                }),
                &["command"],
            ),
        }
    }

    async fn execute(&self, arguments: Value) -> ToolResult {
        let Some(command) = arguments.get("command").and_then(|v| v.as_str()) else {
            return ToolResult::err("missing required argument 'command'");
        };

        let result = match command {
            "read" => match serde_json::from_value::<FileReadRequest>(arguments) {
                Ok(req) => file_ops::file_read(&self.workspace_root, req).await,
                Err(e) => Err(format!("invalid arguments for 'read': {e}")),
            },
            "write" => match serde_json::from_value::<FileWriteRequest>(arguments) {
                Ok(req) => file_ops::file_write(&self.workspace_root, req).await,
                Err(e) => Err(format!("invalid arguments for 'write': {e}")),
            },
            "append" => match serde_json::from_value::<FileAppendRequest>(arguments) {
                Ok(req) => file_ops::file_append(&self.workspace_root, req).await,
                Err(e) => Err(format!("invalid arguments for 'append': {e}")),
            },
            "move" => match serde_json::from_value::<FileMoveRequest>(arguments) {
                Ok(req) => file_ops::file_move(&self.workspace_root, req).await,
                Err(e) => Err(format!("invalid arguments for 'move': {e}")),
            },
            "delete" => match serde_json::from_value::<FileDeleteRequest>(arguments) {
                Ok(req) => file_ops::file_delete(&self.workspace_root, req).await,
                Err(e) => Err(format!("invalid arguments for 'delete': {e}")),
            },
            "list" => match serde_json::from_value::<FileListRequest>(arguments) {
                Ok(req) => file_ops::file_list(&self.workspace_root, req).await,
                Err(e) => Err(format!("invalid arguments for 'list': {e}")),
            },
            other => Err(format!("unknown file_editor command '{other}'")),
        };

        value_to_result(result)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// process — wraps process::handle_process.
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct ProcessTool {
    manager: Arc<ProcessManager>,
}

impl ProcessTool {
    pub fn new(manager: Arc<ProcessManager>) -> Self {
        Self { manager }
    }
}

#[async_trait::async_trait]
impl Tool for ProcessTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "process".into(),
            description: "Inspect or control a background process session started by \
                python_execute (list, poll, log, write, kill, clear, remove)."
                .into(),
            parameters: schema(
                json!({
                    "action": {"type": "string", "enum": ["list", "poll", "log", "write", "kill", "clear", "remove"]},
                    "session_id": {"type": "string"},
                    "offset": {"type": "integer"},
                    "limit": {"type": "integer"},
                    "tail_lines": {"type": "integer"},
                    "data": {"type": "string"},
                    "eof": {"type": "boolean"},
                }),
                &["action"],
            ),
        }
    }

    async fn execute(&self, arguments: Value) -> ToolResult {
        let req: ProcessRequest = match serde_json::from_value(arguments) {
            Ok(req) => req,
            Err(e) => return ToolResult::err(format!("invalid arguments for 'process': {e}")),
        };
        let resp = process::handle_process(&self.manager, req).await;
        let body = serde_json::to_value(&resp).unwrap_or(Value::Null);
        if resp.success {
            ToolResult::ok(serde_json::to_string_pretty(&body).unwrap_or_else(|_| body.to_string()))
        } else {
            ToolResult::err(resp.error.unwrap_or_else(|| "process action failed".into()))
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// External collaborators (§6) — only their interface contract is
// specified here. Each stub returns a structurally valid, clearly
// labeled placeholder result rather than performing the real call, so
// integrating the real SQL gateway / search API / dashboard service /
// human-input channel later is a drop-in replacement of these structs.
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct WebSearchTool;

#[async_trait::async_trait]
impl Tool for WebSearchTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "web_search".into(),
            description: "Search the web for a query and return ranked results.".into(),
            parameters: schema(
                json!({"query": {"type": "string"}, "max_results": {"type": "integer"}}),
                &["query"],
            ),
        }
    }

    async fn execute(&self, arguments: Value) -> ToolResult {
        let query = arguments.get("query").and_then(|v| v.as_str()).unwrap_or("");
        ToolResult::err(format!(
            "web_search is not wired to a live search backend in this deployment (query: '{query}')"
        ))
    }
}

pub struct DatasourceTool;

#[async_trait::async_trait]
impl Tool for DatasourceTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "datasource".into(),
            description: "Run a query against a configured data source and materialize the \
                result set as a CSV file in the workspace."
                .into(),
            parameters: schema(
                json!({"query": {"type": "string"}, "source": {"type": "string"}}),
                &["query"],
            ),
        }
    }

    async fn execute(&self, arguments: Value) -> ToolResult {
        let query = arguments.get("query").and_then(|v| v.as_str()).unwrap_or("");
        ToolResult::err(format!(
            "datasource is not wired to a live SQL gateway in this deployment (query: '{query}')"
        ))
    }
}

pub struct DashboardTool;

#[async_trait::async_trait]
impl Tool for DashboardTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "dashboard".into(),
            description: "Publish a chart or table to a dashboard and return its URL.".into(),
            parameters: schema(
                json!({"title": {"type": "string"}, "csv_filename": {"type": "string"}}),
                &["title"],
            ),
        }
    }

    async fn execute(&self, _arguments: Value) -> ToolResult {
        ToolResult::err("dashboard is not wired to a live dashboard API in this deployment")
    }
}

pub struct HumanInputTool;

#[async_trait::async_trait]
impl Tool for HumanInputTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "human_input".into(),
            description: "Ask the human operator a clarifying question and wait for their reply."
                .into(),
            parameters: schema(json!({"question": {"type": "string"}}), &["question"]),
        }
    }

    async fn execute(&self, arguments: Value) -> ToolResult {
        let question = arguments
            .get("question")
            .and_then(|v| v.as_str())
            .unwrap_or("(no question provided)");
        ToolResult::err(format!(
            "human_input has no interactive channel wired in this deployment (question: '{question}')"
        ))
    }
}

/// §4.10: the model is offered `result_reporter` once the plan is complete
/// so it can report `{ deliverables: [...] }`. Its own execution is a
/// no-op — the flow reads the tool call's *arguments*, not a result, to
/// build the `finalResult` envelope.
pub struct ResultReporterTool;

#[async_trait::async_trait]
impl Tool for ResultReporterTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "result_reporter".into(),
            description: "Report the deliverables produced by this run.".into(),
            parameters: schema(
                json!({
                    "deliverables": {
                        "type": "array",
                        "items": {"type": "string"},
                    },
                }),
                &["deliverables"],
            ),
        }
    }

    async fn execute(&self, _arguments: Value) -> ToolResult {
        ToolResult::ok("deliverables recorded")
    }
}

/// §4.4/§4.5: the built-in special tool. Its execution always succeeds;
/// the agent's own special-tool handling (not this tool) is what flips
/// the owning agent's state to `finished`.
pub struct TerminateTool {
    bus: Arc<OutputBus>,
}

impl TerminateTool {
    pub fn new(bus: Arc<OutputBus>) -> Self {
        Self { bus }
    }
}

#[async_trait::async_trait]
impl Tool for TerminateTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "terminate".into(),
            description: "Signal that the current step is complete and no further tool calls \
                are needed."
                .into(),
            parameters: schema(
                json!({"status": {"type": "string", "enum": ["success", "failure"]}}),
                &["status"],
            ),
        }
    }

    fn is_special(&self) -> bool {
        true
    }

    async fn execute(&self, arguments: Value) -> ToolResult {
        let status = arguments
            .get("status")
            .and_then(|v| v.as_str())
            .unwrap_or("success");
        self.bus.emit(
            EnvelopeType::Terminate,
            format!("terminated with status '{status}'"),
        );
        ToolResult::ok(format!("terminated with status '{status}'"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sa_domain::config::{ExecConfig, ExecSecurityConfig};

    fn test_bus() -> Arc<OutputBus> {
        Arc::new(OutputBus::new(tempfile::tempdir().unwrap().into_path()))
    }

    #[tokio::test]
    async fn file_editor_write_then_read_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let tool = FileEditorTool::new(dir.path().to_path_buf());

        let write_res = tool
            .execute(json!({"command": "write", "path": "note.txt", "content": "hello"}))
            .await;
        assert!(!write_res.is_error(), "{:?}", write_res.error);

        let read_res = tool
            .execute(json!({"command": "read", "path": "note.txt"}))
            .await;
        assert!(!read_res.is_error());
        assert!(read_res.output.unwrap().contains("hello"));
    }

    #[tokio::test]
    async fn file_editor_rejects_unknown_command() {
        let dir = tempfile::tempdir().unwrap();
        let tool = FileEditorTool::new(dir.path().to_path_buf());
        let res = tool.execute(json!({"command": "frobnicate"})).await;
        assert!(res.is_error());
    }

    #[tokio::test]
    async fn process_tool_lists_empty_sessions() {
        let manager = Arc::new(ProcessManager::new(
            ExecConfig::default(),
            ExecSecurityConfig::default(),
        ));
        let tool = ProcessTool::new(manager);
        let res = tool.execute(json!({"action": "list"})).await;
        assert!(!res.is_error());
        assert!(res.output.unwrap().contains("\"count\": 0"));
    }

    #[test]
    fn terminate_tool_is_special() {
        assert!(TerminateTool::new(test_bus()).is_special());
    }

    #[tokio::test]
    async fn python_execute_ignores_preexisting_workspace_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("stale.png"), b"old").unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        let manager = Arc::new(ProcessManager::new(
            ExecConfig::default(),
            ExecSecurityConfig::default(),
        ));
        let tool = PythonExecuteTool::new(manager, dir.path().to_path_buf(), test_bus());
        let res = tool.execute(json!({"code": "print('hello')"})).await;
        let output = res.output.unwrap();
        assert!(!output.contains("stale.png"));
    }

    #[tokio::test]
    async fn result_reporter_always_succeeds() {
        let res = ResultReporterTool
            .execute(json!({"deliverables": ["report.pdf"]}))
            .await;
        assert!(!res.is_error());
    }
}
