//! Session Store (§4.11) — durable snapshot/restore of orchestrator state.
//!
//! A snapshot captures everything needed to resume a run: the active plan
//! id, the flow's step cursor, the full plan registry, the flow's ordered
//! memory, and per-agent state. Snapshots are full-file rewrites, not
//! incremental, written as pretty-printed UTF-8 JSON to
//! `<sessions_dir>/<session_id>.json`.
//!
//! The plan registry is stored as an opaque [`serde_json::Value`] rather
//! than a typed `Plan` map: the concrete `Plan` type lives in the
//! orchestrator crate, which depends on this crate, so a typed registry
//! here would be circular. The orchestrator serializes/deserializes its
//! own plan map into this field.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use sa_domain::error::{Error, Result};
use sa_domain::tool::Message;
use sa_domain::trace::TraceEvent;

/// Per-agent state captured in a snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSnapshot {
    #[serde(default)]
    pub current_step: Option<usize>,
    pub state: String,
    #[serde(default)]
    pub messages: Vec<Message>,
}

/// Full orchestrator state for one session (§4.11).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub session_id: String,
    #[serde(default)]
    pub active_plan_id: Option<String>,
    #[serde(default)]
    pub current_step_index: Option<usize>,
    /// Opaque plan registry, owned and shaped by the orchestrator crate.
    #[serde(default = "default_plans")]
    pub plans: serde_json::Value,
    /// The flow's ordered message log.
    #[serde(default)]
    pub memory: Vec<Message>,
    #[serde(default)]
    pub agents: HashMap<String, AgentSnapshot>,
}

fn default_plans() -> serde_json::Value {
    serde_json::json!({})
}

impl Snapshot {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            active_plan_id: None,
            current_step_index: None,
            plans: default_plans(),
            memory: Vec::new(),
            agents: HashMap::new(),
        }
    }
}

/// Durable snapshot store backed by one JSON file per session.
pub struct SessionStore {
    sessions_dir: PathBuf,
}

impl SessionStore {
    /// Open (creating if needed) the sessions directory, i.e.
    /// `config.sessions.state_path`.
    pub fn new(sessions_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(sessions_dir).map_err(Error::Io)?;
        Ok(Self {
            sessions_dir: sessions_dir.to_path_buf(),
        })
    }

    fn path_for(&self, session_id: &str) -> PathBuf {
        self.sessions_dir.join(format!("{session_id}.json"))
    }

    /// `has(session_id)` — does a snapshot already exist for this session.
    pub fn has(&self, session_id: &str) -> bool {
        self.path_for(session_id).exists()
    }

    /// `save(session_id, snapshot)` — full-file, idempotent-by-overwrite
    /// rewrite, pretty-printed UTF-8 JSON.
    pub fn save(&self, session_id: &str, snapshot: &Snapshot) -> Result<()> {
        let json = serde_json::to_string_pretty(snapshot)
            .map_err(|e| Error::Other(format!("serializing session snapshot: {e}")))?;
        std::fs::write(self.path_for(session_id), json).map_err(Error::Io)?;

        TraceEvent::SessionSnapshotWritten {
            session_id: session_id.to_owned(),
            active_plan_id: snapshot.active_plan_id.clone(),
            current_step_index: snapshot.current_step_index,
        }
        .emit();

        Ok(())
    }

    /// `load(session_id)` — returns `None` if no snapshot exists yet,
    /// which callers treat as "start a fresh session with this id".
    pub fn load(&self, session_id: &str) -> Result<Option<Snapshot>> {
        let path = self.path_for(session_id);
        if !path.exists() {
            return Ok(None);
        }
        let raw = std::fs::read_to_string(&path).map_err(Error::Io)?;
        let snapshot: Snapshot = serde_json::from_str(&raw)
            .map_err(|e| Error::Other(format!("parsing session snapshot '{session_id}': {e}")))?;
        Ok(Some(snapshot))
    }

    /// The directory this store's session snapshots live in.
    pub fn sessions_dir(&self) -> &Path {
        &self.sessions_dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sa_domain::tool::Message;

    #[test]
    fn missing_session_reports_absent_and_loads_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path()).unwrap();
        assert!(!store.has("nope"));
        assert!(store.load("nope").unwrap().is_none());
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path()).unwrap();

        let mut snapshot = Snapshot::new("s1");
        snapshot.active_plan_id = Some("plan-1".into());
        snapshot.current_step_index = Some(2);
        snapshot.memory.push(Message::user("hello"));
        snapshot.agents.insert(
            "default".into(),
            AgentSnapshot {
                current_step: Some(2),
                state: "running".into(),
                messages: vec![Message::user("hello")],
            },
        );

        store.save("s1", &snapshot).unwrap();
        assert!(store.has("s1"));

        let loaded = store.load("s1").unwrap().unwrap();
        assert_eq!(loaded.active_plan_id.as_deref(), Some("plan-1"));
        assert_eq!(loaded.current_step_index, Some(2));
        assert_eq!(loaded.memory.len(), 1);
        assert_eq!(loaded.agents["default"].state, "running");
    }

    #[test]
    fn save_overwrites_full_file_idempotently() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path()).unwrap();

        let snapshot = Snapshot::new("s1");
        store.save("s1", &snapshot).unwrap();
        store.save("s1", &snapshot).unwrap();

        let loaded = store.load("s1").unwrap().unwrap();
        assert_eq!(loaded.session_id, "s1");
    }
}
