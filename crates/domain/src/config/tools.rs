use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tool Registry configuration (§4.4)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolsConfig {
    #[serde(default)]
    pub exec: ExecConfig,
    #[serde(default)]
    pub exec_security: ExecSecurityConfig,
    #[serde(default)]
    pub file_ops: FileOpsConfig,
}

/// Code-execution tool configuration — the concrete implementation this
/// crate owns for the "code runner" external collaborator named in §1/§6.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecConfig {
    /// Hard wall-clock timeout per invocation (§5: "≈150s default").
    #[serde(default = "d_150")]
    pub timeout_sec: u64,
    /// How long a foreground invocation waits before auto-backgrounding.
    #[serde(default = "d_3000")]
    pub background_ms: u64,
    /// Max combined stdout+stderr chars kept in the output buffer.
    #[serde(default = "d_1000000")]
    pub max_output_chars: usize,
    /// TTL for finished process sessions before cleanup (ms).
    #[serde(default = "d_1800000")]
    pub cleanup_ms: u64,
}

impl Default for ExecConfig {
    fn default() -> Self {
        Self {
            timeout_sec: 150,
            background_ms: 3_000,
            max_output_chars: 1_000_000,
            cleanup_ms: 1_800_000,
        }
    }
}

/// Security configuration for the exec tool — audit logging and command denylist.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecSecurityConfig {
    /// Log every exec invocation at INFO level.
    #[serde(default = "d_true")]
    pub audit_log: bool,
    /// Regex patterns that are denied. Commands matching any pattern are rejected.
    #[serde(default = "d_denied_patterns")]
    pub denied_patterns: Vec<String>,
}

impl Default for ExecSecurityConfig {
    fn default() -> Self {
        Self {
            audit_log: true,
            denied_patterns: d_denied_patterns(),
        }
    }
}

/// File I/O tool configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileOpsConfig {
    /// Root directory file tools are confined to.
    #[serde(default = "d_workdir")]
    pub workdir: std::path::PathBuf,
    /// Max bytes read per `read_file` call.
    #[serde(default = "d_max_read")]
    pub max_read_bytes: usize,
}

impl Default for FileOpsConfig {
    fn default() -> Self {
        Self {
            workdir: d_workdir(),
            max_read_bytes: d_max_read(),
        }
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn d_150() -> u64 {
    150
}
fn d_3000() -> u64 {
    3_000
}
fn d_1000000() -> usize {
    1_000_000
}
fn d_1800000() -> u64 {
    1_800_000
}
fn d_true() -> bool {
    true
}
fn d_denied_patterns() -> Vec<String> {
    vec![
        r"rm\s+-rf\s+/".into(),
        r"mkfs\.".into(),
        r"dd\s+if=.+of=/dev/".into(),
    ]
}
fn d_workdir() -> std::path::PathBuf {
    std::path::PathBuf::from("./workspace")
}
fn d_max_read() -> usize {
    200_000
}
