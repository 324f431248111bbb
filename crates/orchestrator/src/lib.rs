//! The orchestrator: Memory (§3/§4.5), the Planning Tool (§4.6), the ReAct
//! Tool-Calling Agent (§4.5), and the Planning Flow main controller
//! (§4.7-§4.10) that ties them together around a session.

pub mod agent;
pub mod flow;
pub mod memory;
pub mod plan;
pub mod planning_tool_adapter;

pub use agent::{AgentState, ReactAgent};
pub use flow::PlanningFlow;
pub use memory::Memory;
pub use plan::{Plan, PlanningTool, Section, StepInfo, StepStatus};
pub use planning_tool_adapter::PlanningToolAdapter;
