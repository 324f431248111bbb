//! Session Store (§4.11): durable snapshot/restore of orchestrator state,
//! plus an append-only operator transcript log alongside each session.

pub mod store;
pub mod transcript;

pub use store::{AgentSnapshot, SessionStore, Snapshot};
pub use transcript::{TranscriptLine, TranscriptWriter};
