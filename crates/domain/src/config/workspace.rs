use serde::{Deserialize, Serialize};
use std::path::PathBuf;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Workspace / attachments (§6 CLI contract)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkspaceConfig {
    /// Directory attachment paths named in stdin prompts are resolved under.
    #[serde(default = "d_attachments")]
    pub attachments_dir: PathBuf,
    /// Max bytes of an attachment's head read for the preview appended to
    /// the prompt text.
    #[serde(default = "d_preview_bytes")]
    pub attachment_preview_bytes: usize,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            attachments_dir: d_attachments(),
            attachment_preview_bytes: d_preview_bytes(),
        }
    }
}

fn d_attachments() -> PathBuf {
    PathBuf::from("./attachments")
}
fn d_preview_bytes() -> usize {
    4_096
}
