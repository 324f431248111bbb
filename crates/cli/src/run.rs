//! The stdin prompt loop (§6): one `flow.execute(..)` per line, wrapped in
//! the wall-clock timeout and interrupt handling from §5/§7.

use std::time::Duration;

use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, BufReader};

use sa_domain::config::Config;
use sa_outputbus::EnvelopeType;
use sa_sessions::TranscriptWriter;

use crate::bootstrap::App;

/// §5: "target ≈ 1 hour" wall-clock limit on a single `execute` call.
const EXECUTE_TIMEOUT: Duration = Duration::from_secs(60 * 60);

#[derive(Deserialize)]
struct PromptLine {
    prompt: String,
    #[serde(default)]
    attachments: Vec<String>,
}

/// Read an attachment's head (first `max_bytes`, UTF-8-lossy) and render it
/// as preview text appended to the prompt (SPEC_FULL §C.4).
fn read_attachment_preview(config: &Config, attachment: &str) -> String {
    let path = config.workspace.attachments_dir.join(attachment);
    let max_bytes = config.workspace.attachment_preview_bytes;

    let bytes = match std::fs::read(&path) {
        Ok(b) => b,
        Err(e) => {
            return format!("\n\n--- attachment '{attachment}' unavailable: {e} ---");
        }
    };
    let truncated = bytes.len() > max_bytes;
    let head = &bytes[..bytes.len().min(max_bytes)];
    let preview = String::from_utf8_lossy(head);
    let suffix = if truncated { "\n[...truncated...]" } else { "" };
    format!("\n\n--- attachment '{attachment}' preview ---\n{preview}{suffix}")
}

fn parse_prompt_line(config: &Config, line: &str) -> String {
    match serde_json::from_str::<PromptLine>(line) {
        Ok(parsed) => {
            let mut text = parsed.prompt;
            for attachment in &parsed.attachments {
                text.push_str(&read_attachment_preview(config, attachment));
            }
            text
        }
        Err(_) => line.to_string(),
    }
}

/// Drive the stdin loop for one session. Returns the process exit code.
pub async fn run(config: &Config, mut app: App) -> i32 {
    app.bus.emit(EnvelopeType::MainStart, "session started");

    let stdin = tokio::io::stdin();
    let mut lines = BufReader::new(stdin).lines();

    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break, // EOF
            Err(e) => {
                app.bus
                    .emit(EnvelopeType::MainError, format!("stdin read error: {e}"));
                app.flow.save_snapshot();
                return 1;
            }
        };

        if line.trim() == "exit" {
            break;
        }
        if line.trim().is_empty() {
            continue;
        }

        let prompt = parse_prompt_line(config, &line);

        if let Err(e) = app.transcripts.append(
            &app.session_id,
            &[TranscriptWriter::line("user", &prompt)],
        ) {
            tracing::warn!(error = %e, "failed to append prompt to transcript");
        }

        tokio::select! {
            result = app.flow.execute(&prompt) => {
                if let Err(e) = app.transcripts.append(
                    &app.session_id,
                    &[TranscriptWriter::line("assistant", &result)],
                ) {
                    tracing::warn!(error = %e, "failed to append result to transcript");
                }
                app.bus.emit(EnvelopeType::MainCompleted, result);
            }
            _ = tokio::time::sleep(EXECUTE_TIMEOUT) => {
                app.bus.emit(EnvelopeType::MainTimeout, "execute() exceeded the wall-clock limit");
                app.flow.save_snapshot();
            }
            _ = tokio::signal::ctrl_c() => {
                app.bus.emit(EnvelopeType::MainInterrupted, "interrupted by signal");
                app.flow.save_snapshot();
                app.bus.emit(EnvelopeType::MainExited, "session exited");
                return 130;
            }
        }
    }

    app.bus.emit(EnvelopeType::MainExited, "session exited");
    0
}
