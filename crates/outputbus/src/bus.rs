use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Utc;
use parking_lot::Mutex;

use crate::envelope::{Envelope, EnvelopeType};

/// Single sink for progress envelopes (§4.1). Writes are:
/// (a) one line of canonical JSON to stdout, flushed;
/// (b) appended to a daily log file under `log_dir`;
/// (c) if a session id is set, appended to a per-session log under
///     `log_dir/sessions/<session_id>.log`.
///
/// Never blocks the pipeline: an I/O failure on any sink is dropped with a
/// logged warning rather than propagated.
pub struct OutputBus {
    log_dir: PathBuf,
    session_id: Mutex<Option<String>>,
}

impl OutputBus {
    pub fn new(log_dir: impl Into<PathBuf>) -> Self {
        Self {
            log_dir: log_dir.into(),
            session_id: Mutex::new(None),
        }
    }

    pub fn set_session_id(&self, session_id: impl Into<String>) {
        *self.session_id.lock() = Some(session_id.into());
    }

    /// Emit an envelope with `text` and no structured payload.
    pub fn emit(&self, kind: EnvelopeType, text: impl Into<String>) {
        self.emit_with_data(kind, text, None);
    }

    pub fn emit_with_data(
        &self,
        kind: EnvelopeType,
        text: impl Into<String>,
        data: Option<serde_json::Value>,
    ) {
        let mut env = Envelope::new(kind, text, Utc::now().timestamp_millis());
        env.data = data;
        self.write(&env);
    }

    fn write(&self, env: &Envelope) {
        let line = match serde_json::to_string(env) {
            Ok(l) => l,
            Err(e) => {
                tracing::warn!(error = %e, "output bus: failed to serialize envelope");
                return;
            }
        };

        let mut stdout = std::io::stdout();
        if let Err(e) = writeln!(stdout, "{line}") {
            tracing::warn!(error = %e, "output bus: failed to write stdout");
        } else if let Err(e) = stdout.flush() {
            tracing::warn!(error = %e, "output bus: failed to flush stdout");
        }

        let daily = self.log_dir.join(format!("{}.log", Utc::now().format("%Y-%m-%d")));
        append_line(&daily, &line);

        if let Some(session_id) = self.session_id.lock().as_ref() {
            let session_log = self.log_dir.join("sessions").join(format!("{session_id}.log"));
            append_line(&session_log, &line);
        }
    }
}

fn append_line(path: &Path, line: &str) {
    if let Some(parent) = path.parent() {
        if let Err(e) = std::fs::create_dir_all(parent) {
            tracing::warn!(error = %e, path = %parent.display(), "output bus: failed to create log dir");
            return;
        }
    }
    let file = OpenOptions::new().create(true).append(true).open(path);
    match file {
        Ok(mut f) => {
            if let Err(e) = writeln!(f, "{line}") {
                tracing::warn!(error = %e, path = %path.display(), "output bus: failed to append log line");
            }
        }
        Err(e) => {
            tracing::warn!(error = %e, path = %path.display(), "output bus: failed to open log file");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emit_writes_daily_and_session_logs() {
        let dir = tempfile::tempdir().unwrap();
        let bus = OutputBus::new(dir.path());
        bus.set_session_id("sess-1");
        bus.emit(EnvelopeType::LiveStatus, "hello");

        let daily = dir.path().join(format!("{}.log", Utc::now().format("%Y-%m-%d")));
        assert!(daily.exists());
        let daily_contents = std::fs::read_to_string(&daily).unwrap();
        assert!(daily_contents.contains("hello"));

        let session_log = dir.path().join("sessions").join("sess-1.log");
        assert!(session_log.exists());
        let session_contents = std::fs::read_to_string(&session_log).unwrap();
        assert!(session_contents.contains("liveStatus"));
    }

    #[test]
    fn emit_without_session_id_skips_session_log() {
        let dir = tempfile::tempdir().unwrap();
        let bus = OutputBus::new(dir.path());
        bus.emit(EnvelopeType::MainStart, "starting");
        assert!(!dir.path().join("sessions").exists());
    }

    #[test]
    fn emit_with_data_attaches_payload() {
        let dir = tempfile::tempdir().unwrap();
        let bus = OutputBus::new(dir.path());
        bus.emit_with_data(
            EnvelopeType::FinalResult,
            "done",
            Some(serde_json::json!({"deliverables": ["a", "b"]})),
        );
        let daily = dir.path().join(format!("{}.log", Utc::now().format("%Y-%m-%d")));
        let contents = std::fs::read_to_string(&daily).unwrap();
        assert!(contents.contains("deliverables"));
    }
}
