use serde::{Deserialize, Serialize};
use std::path::PathBuf;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Session Store (§4.11)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionsConfig {
    /// Directory containing `<session_id>.json` snapshots and transcript logs.
    #[serde(default = "d_state_path")]
    pub state_path: PathBuf,
    /// Bounded retry count for a step that fails without the executor
    /// finishing (spec §9 Open Question, resolved in DESIGN.md).
    #[serde(default = "d_step_retries")]
    pub max_step_retries: u32,
}

impl Default for SessionsConfig {
    fn default() -> Self {
        Self {
            state_path: d_state_path(),
            max_step_retries: d_step_retries(),
        }
    }
}

fn d_state_path() -> PathBuf {
    PathBuf::from("./sessions")
}
fn d_step_retries() -> u32 {
    2
}
