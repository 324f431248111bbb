//! Wires every crate together into one running session, the way the
//! teacher's `bootstrap.rs`/`run_server` build their `AppState`: one
//! `──` section per subsystem, each logged as it comes up.

use std::sync::Arc;

use parking_lot::RwLock;

use sa_domain::config::Config;
use sa_orchestrator::{PlanningFlow, PlanningTool, PlanningToolAdapter};
use sa_outputbus::OutputBus;
use sa_providers::{registry::ProviderRegistry, Gateway};
use sa_sessions::{SessionStore, TranscriptWriter};
use sa_tools::impls::{
    DashboardTool, DatasourceTool, FileEditorTool, HumanInputTool, ProcessTool,
    PythonExecuteTool, ResultReporterTool, TerminateTool, WebSearchTool,
};
use sa_tools::{ProcessManager, ToolRegistry};

pub struct App {
    pub flow: PlanningFlow,
    pub bus: Arc<OutputBus>,
    pub session_store: Arc<SessionStore>,
    pub transcripts: Arc<TranscriptWriter>,
    pub session_id: String,
}

/// Build every subsystem and hand back a ready-to-run [`PlanningFlow`] for
/// `session_id`, restoring its state if a snapshot already exists.
pub fn build_app(config: &Config, session_id: String) -> anyhow::Result<App> {
    // ── Workspace ─────────────────────────────────────────────────────
    std::fs::create_dir_all(&config.tools.file_ops.workdir)?;
    tracing::info!(path = %config.tools.file_ops.workdir.display(), "workspace ready");

    // ── Output bus ────────────────────────────────────────────────────
    let bus = Arc::new(OutputBus::new(config.sessions.state_path.clone()));
    bus.set_session_id(session_id.clone());

    // ── LLM providers + gateway ──────────────────────────────────────
    let providers = Arc::new(ProviderRegistry::from_config(&config.llm)?);
    if providers.is_empty() {
        tracing::warn!("no LLM providers initialized — runs will fail at the first model call");
    } else {
        tracing::info!(providers = providers.len(), "LLM provider registry ready");
    }
    let gateway = Arc::new(Gateway::new(
        providers,
        config.llm.max_input_tokens,
        config.llm.max_retries,
        bus.clone(),
    ));

    // ── Session store + transcript log ───────────────────────────────
    let session_store = Arc::new(SessionStore::new(&config.sessions.state_path)?);
    let transcripts = Arc::new(TranscriptWriter::new(session_store.sessions_dir()));
    tracing::info!(dir = %session_store.sessions_dir().display(), "session store ready");

    // ── Process manager (exec/process tools) ─────────────────────────
    let processes = Arc::new(ProcessManager::new(
        config.tools.exec.clone(),
        config.tools.exec_security.clone(),
    ));

    // ── Tool registry ──────────────────────────────────────────────────
    let planning = Arc::new(RwLock::new(PlanningTool::new()));
    let mut tools = ToolRegistry::new();
    tools.register(Arc::new(PythonExecuteTool::new(
        processes.clone(),
        config.tools.file_ops.workdir.clone(),
        bus.clone(),
    )));
    tools.register(Arc::new(FileEditorTool::new(
        config.tools.file_ops.workdir.clone(),
    )));
    tools.register(Arc::new(ProcessTool::new(processes.clone())));
    tools.register(Arc::new(WebSearchTool));
    tools.register(Arc::new(DatasourceTool));
    tools.register(Arc::new(DashboardTool));
    tools.register(Arc::new(HumanInputTool));
    tools.register(Arc::new(ResultReporterTool));
    tools.register(Arc::new(TerminateTool::new(bus.clone())));
    tools.register(Arc::new(PlanningToolAdapter::new(planning.clone(), bus.clone())));
    let tools = Arc::new(tools);
    tracing::info!("tool registry ready");

    // ── Planning Flow ──────────────────────────────────────────────────
    let flow = PlanningFlow::new(
        config,
        planning,
        tools,
        gateway,
        bus.clone(),
        Some(session_store.clone()),
        Some(session_id.clone()),
    );
    tracing::info!(session_id = %session_id, "planning flow ready");

    Ok(App {
        flow,
        bus,
        session_store,
        transcripts,
        session_id,
    })
}
