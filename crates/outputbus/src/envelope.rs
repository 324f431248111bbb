use serde::{Deserialize, Serialize};

/// The fixed-shape record emitted on the Output Bus (§4.1, §6). UIs consuming
/// this stream MUST ignore unknown `type` tags.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: EnvelopeType,
    pub timestamp: i64,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

/// Known type tags (§4.1). Consumers must treat any tag they don't
/// recognize as purely informational — this enum is for producer-side
/// typo safety, not a closed contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EnvelopeType {
    LiveStatus,
    Chat,
    Streaming,
    Execute,
    CreatePlan,
    UpdatePlan,
    GetPlan,
    SetActivePlan,
    MarkPlanStep,
    DeletePlan,
    ListPlans,
    Terminate,
    FinalResult,
    MainStart,
    MainCompleted,
    MainInterrupted,
    MainError,
    MainTimeout,
    MainExited,
    #[serde(rename = "python_execute_streaming")]
    PythonExecuteStreaming,
}

impl Envelope {
    pub fn new(kind: EnvelopeType, text: impl Into<String>, timestamp_ms: i64) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            kind,
            timestamp: timestamp_ms,
            text: text.into(),
            data: None,
        }
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_tags_serialize_to_spec_literal_strings() {
        assert_eq!(
            serde_json::to_value(EnvelopeType::LiveStatus).unwrap(),
            "liveStatus"
        );
        assert_eq!(
            serde_json::to_value(EnvelopeType::CreatePlan).unwrap(),
            "createPlan"
        );
        // §4.1 lists this tag as the literal snake_case string, not the
        // camelCase the enum's blanket rename would otherwise produce.
        assert_eq!(
            serde_json::to_value(EnvelopeType::PythonExecuteStreaming).unwrap(),
            "python_execute_streaming"
        );
    }
}
