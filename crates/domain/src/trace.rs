use serde::Serialize;

/// Internal structured trace events, logged via `tracing` — distinct from
/// the Output Bus envelope (`sa_outputbus::Envelope`), which is the
/// external-facing channel (§4.1). These are for operators tailing logs,
/// not for the UI contract.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event")]
pub enum TraceEvent {
    LlmRequest {
        provider: String,
        model: String,
        streaming: bool,
        duration_ms: u64,
        prompt_tokens: Option<u32>,
        completion_tokens: Option<u32>,
    },
    LlmRetry {
        provider: String,
        attempt: u32,
        max_attempts: u32,
        reason: String,
    },
    SessionSnapshotWritten {
        session_id: String,
        active_plan_id: Option<String>,
        current_step_index: Option<usize>,
    },
    PlanCreated {
        plan_id: String,
        total_steps: usize,
    },
    StepCompleted {
        plan_id: String,
        step_index: usize,
        executor: String,
    },
}

impl TraceEvent {
    pub fn emit(&self) {
        let json = serde_json::to_string(self).unwrap_or_default();
        tracing::info!(trace_event = %json, "orchestrator_event");
    }
}
