//! Built-in tools for the orchestrator's Tool Registry (§4.4).
//!
//! Implements the exec/process tool pair following OpenClaw semantics:
//! - `exec`: run commands foreground or auto-background after yieldMs
//! - `process`: manage background sessions (list/poll/log/write/kill/clear/remove)
//!
//! `file_ops` backs the `file_editor` tool; `registry`/`impls` wire all of
//! the above, plus the thin external-collaborator stubs, into the
//! [`registry::ToolRegistry`] the ReAct Agent dispatches through.

pub mod exec;
pub mod file_ops;
pub mod impls;
pub mod manager;
pub mod process;
pub mod registry;

pub use manager::ProcessManager;
pub use registry::{Tool, ToolRegistry, ToolResult};
