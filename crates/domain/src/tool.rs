use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Message model (§3)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A message in the conversation, provider-agnostic (OpenAI tool-call shape).
///
/// Invariant (§3): every `tool_calls[i].id` produced by an assistant message
/// is eventually matched by exactly one `tool` message with the same
/// `tool_call_id` — the LLM Gateway enforces this at send time (§4.3 step 2),
/// it is not a structural guarantee of `Message` itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: MessageContent,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    /// Required when `role == Tool`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    /// Tool name, set when `role == Tool`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// A single base64-encoded image attached to this message (tool
    /// results that produced a chart, or a user turn with a screenshot).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base64_image: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
    Summary,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ContentPart {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "image_url")]
    Image {
        /// `data:<media-type>;base64,<data>` or a remote URL.
        url: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        detail: Option<ImageDetail>,
    },
}

/// Image resolution hint used by the Token Counter (§4.2) and providers that
/// support it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageDetail {
    Low,
    Medium,
    High,
}

/// `ToolCall.function.arguments` is a JSON-encoded string (§3): parsed
/// lazily at dispatch time so a malformed payload is a recoverable
/// tool-error, not an agent crash.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub function: FunctionCall,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    /// JSON-encoded arguments string, not a parsed `Value` — matches what
    /// providers stream back chunk-by-chunk (§4.3 step 6).
    pub arguments: String,
}

/// Tool definition exposed to the LLM.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    /// JSON Schema subset: `type=object`, `properties`, `required` (§6).
    pub parameters: serde_json::Value,
}

// ── Convenience constructors ───────────────────────────────────────

impl Message {
    pub fn system(text: impl Into<String>) -> Self {
        Self::text(Role::System, text)
    }
    pub fn user(text: impl Into<String>) -> Self {
        Self::text(Role::User, text)
    }
    pub fn assistant(text: impl Into<String>) -> Self {
        Self::text(Role::Assistant, text)
    }
    pub fn summary(text: impl Into<String>) -> Self {
        Self::text(Role::Summary, text)
    }

    fn text(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            content: MessageContent::Text(text.into()),
            tool_calls: Vec::new(),
            tool_call_id: None,
            name: None,
            base64_image: None,
        }
    }

    pub fn assistant_with_tool_calls(
        content: impl Into<String>,
        tool_calls: Vec<ToolCall>,
    ) -> Self {
        Self {
            role: Role::Assistant,
            content: MessageContent::Text(content.into()),
            tool_calls,
            tool_call_id: None,
            name: None,
            base64_image: None,
        }
    }

    /// Build a `tool` role response message. `base64_image` carries a chart
    /// or screenshot the tool produced, routed through the multimodal LLM
    /// call on the *next* turn (§4.5 step 2).
    pub fn tool_result(
        tool_call_id: impl Into<String>,
        name: impl Into<String>,
        content: impl Into<String>,
        base64_image: Option<String>,
    ) -> Self {
        Self {
            role: Role::Tool,
            content: MessageContent::Text(content.into()),
            tool_calls: Vec::new(),
            tool_call_id: Some(tool_call_id.into()),
            name: Some(name.into()),
            base64_image,
        }
    }

    /// The synthetic placeholder §4.3 step 2 inserts for an assistant
    /// tool_call id with no matching tool response.
    pub fn synthetic_tool_placeholder(tool_call_id: impl Into<String>) -> Self {
        Self {
            role: Role::Tool,
            content: MessageContent::Text(String::new()),
            tool_calls: Vec::new(),
            tool_call_id: Some(tool_call_id.into()),
            name: None,
            base64_image: None,
        }
    }
}

impl MessageContent {
    /// Extract the plain-text content (first text part, or the full text).
    pub fn text(&self) -> Option<&str> {
        match self {
            MessageContent::Text(t) => Some(t.as_str()),
            MessageContent::Parts(parts) => parts.iter().find_map(|p| match p {
                ContentPart::Text { text } => Some(text.as_str()),
                _ => None,
            }),
        }
    }

    /// Join all text parts, dropping image parts. Used by the LLM Gateway's
    /// history-trimming step (§4.3 step 3) to collapse non-last turns.
    pub fn extract_all_text(&self) -> String {
        match self {
            MessageContent::Text(t) => t.clone(),
            MessageContent::Parts(parts) => parts
                .iter()
                .filter_map(|p| match p {
                    ContentPart::Text { text } => Some(text.as_str()),
                    _ => None,
                })
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            MessageContent::Text(t) => t.is_empty(),
            MessageContent::Parts(parts) => parts.is_empty(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_all_text_from_text_variant() {
        let content = MessageContent::Text("hello world".into());
        assert_eq!(content.extract_all_text(), "hello world");
    }

    #[test]
    fn extract_all_text_from_parts_joins_with_newline_and_drops_images() {
        let content = MessageContent::Parts(vec![
            ContentPart::Text {
                text: "line one".into(),
            },
            ContentPart::Image {
                url: "data:image/png;base64,AAAA".into(),
                detail: Some(ImageDetail::High),
            },
            ContentPart::Text {
                text: "line two".into(),
            },
        ]);
        assert_eq!(content.extract_all_text(), "line one\nline two");
    }

    #[test]
    fn tool_result_carries_id_name_and_image() {
        let msg = Message::tool_result("call_1", "python_execute", "42", Some("b64".into()));
        assert_eq!(msg.role, Role::Tool);
        assert_eq!(msg.tool_call_id.as_deref(), Some("call_1"));
        assert_eq!(msg.name.as_deref(), Some("python_execute"));
        assert_eq!(msg.base64_image.as_deref(), Some("b64"));
    }

    #[test]
    fn synthetic_placeholder_has_empty_content_and_no_name() {
        let msg = Message::synthetic_tool_placeholder("call_9");
        assert_eq!(msg.tool_call_id.as_deref(), Some("call_9"));
        assert_eq!(msg.content.text(), Some(""));
        assert!(msg.name.is_none());
    }

    #[test]
    fn role_serde_roundtrip_includes_summary() {
        for role in [
            Role::System,
            Role::User,
            Role::Assistant,
            Role::Tool,
            Role::Summary,
        ] {
            let json = serde_json::to_string(&role).unwrap();
            let back: Role = serde_json::from_str(&json).unwrap();
            assert_eq!(back, role);
        }
    }
}
