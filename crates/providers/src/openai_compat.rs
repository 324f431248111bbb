//! OpenAI-compatible adapter.
//!
//! Works with OpenAI, Ollama, vLLM, LM Studio, Together, and any other
//! endpoint that follows the OpenAI chat completions contract.

use crate::traits::{ChatRequest, ChatResponse, LlmProvider};
use crate::util::{from_reqwest, status_error};
use sa_domain::capability::LlmCapabilities;
use sa_domain::config::ProviderConfig;
use sa_domain::error::{Error, Result};
use sa_domain::stream::{BoxStream, StreamEvent, Usage};
use sa_domain::tool::{Message, MessageContent, Role, ToolCall, FunctionCall, ToolDefinition};
use serde_json::Value;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Adapter struct
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// An LLM provider adapter for any OpenAI-compatible API endpoint.
pub struct OpenAiCompatProvider {
    id: String,
    base_url: String,
    api_key: Option<String>,
    default_model: String,
    capabilities: LlmCapabilities,
    client: reqwest::Client,
}

impl OpenAiCompatProvider {
    /// Create a new provider from the deserialized provider config.
    ///
    /// `auth.resolve_key()` is called eagerly; a provider configured with
    /// `AuthMode::None` (local/no-auth endpoints such as Ollama) legitimately
    /// resolves to `None` and sends no `Authorization` header.
    pub fn from_config(cfg: &ProviderConfig) -> Result<Self> {
        let api_key = cfg.auth.resolve_key();

        let default_model = cfg.default_model.clone().unwrap_or_else(|| "gpt-4o".into());

        let capabilities = LlmCapabilities {
            supports_tools: true,
            supports_streaming: true,
            supports_json_mode: true,
            supports_vision: !cfg.multimodal_models.is_empty(),
            context_window: 128_000,
        };

        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .build()
            .map_err(from_reqwest)?;

        Ok(Self {
            id: cfg.id.clone(),
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            api_key,
            default_model,
            capabilities,
            client,
        })
    }

    // ── Internal: build authenticated request builder ──────────────

    fn authed_post(&self, url: &str) -> reqwest::RequestBuilder {
        let mut builder = self
            .client
            .post(url)
            .header("Content-Type", "application/json");
        if let Some(key) = &self.api_key {
            builder = builder.header("Authorization", format!("Bearer {key}"));
        }
        builder
    }

    // ── Internal: build the JSON body ─────────────────────────────

    /// Resolve the effective model name for this request.
    fn effective_model(&self, req: &ChatRequest) -> String {
        req.model
            .clone()
            .unwrap_or_else(|| self.default_model.clone())
    }

    fn build_chat_body(&self, req: &ChatRequest, stream: bool) -> Value {
        let messages: Vec<Value> = req.messages.iter().map(msg_to_openai).collect();

        let mut body = serde_json::json!({
            "model": self.effective_model(req),
            "messages": messages,
            "stream": stream,
        });

        if !req.tools.is_empty() {
            let tools: Vec<Value> = req.tools.iter().map(tool_to_openai).collect();
            body["tools"] = Value::Array(tools);
        }
        if let Some(temp) = req.temperature {
            body["temperature"] = serde_json::json!(temp);
        }
        if let Some(max) = req.max_tokens {
            body["max_tokens"] = serde_json::json!(max);
        }
        if req.json_mode {
            body["response_format"] = serde_json::json!({"type": "json_object"});
        }
        if stream {
            body["stream_options"] = serde_json::json!({"include_usage": true});
        }
        body
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Message serialization helpers
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn role_to_str(role: Role) -> &'static str {
    match role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
        Role::Tool => "tool",
        // Summaries are injected as prior assistant context, not a distinct
        // OpenAI role.
        Role::Summary => "assistant",
    }
}

fn msg_to_openai(msg: &Message) -> Value {
    match msg.role {
        Role::Tool => tool_result_to_openai(msg),
        Role::Assistant => assistant_to_openai(msg),
        _ => serde_json::json!({
            "role": role_to_str(msg.role),
            "content": content_value(msg),
        }),
    }
}

fn content_value(msg: &Message) -> Value {
    match &msg.content {
        MessageContent::Text(t) => Value::String(t.clone()),
        MessageContent::Parts(parts) => {
            let mut out = Vec::new();
            for part in parts {
                match part {
                    sa_domain::tool::ContentPart::Text { text } => {
                        out.push(serde_json::json!({"type": "text", "text": text}));
                    }
                    sa_domain::tool::ContentPart::Image { url, detail } => {
                        let mut img = serde_json::json!({"url": url});
                        if let Some(d) = detail {
                            img["detail"] = serde_json::json!(match d {
                                sa_domain::tool::ImageDetail::Low => "low",
                                sa_domain::tool::ImageDetail::Medium => "medium",
                                sa_domain::tool::ImageDetail::High => "high",
                            });
                        }
                        out.push(serde_json::json!({"type": "image_url", "image_url": img}));
                    }
                }
            }
            Value::Array(out)
        }
    }
}

fn assistant_to_openai(msg: &Message) -> Value {
    let mut obj = serde_json::json!({"role": "assistant"});
    let text = msg.content.extract_all_text();

    if text.is_empty() && !msg.tool_calls.is_empty() {
        obj["content"] = Value::Null;
    } else {
        obj["content"] = Value::String(text);
    }

    if !msg.tool_calls.is_empty() {
        let tool_calls: Vec<Value> = msg
            .tool_calls
            .iter()
            .map(|call| {
                serde_json::json!({
                    "id": call.id,
                    "type": "function",
                    "function": {
                        "name": call.function.name,
                        "arguments": call.function.arguments,
                    }
                })
            })
            .collect();
        obj["tool_calls"] = Value::Array(tool_calls);
    }
    obj
}

fn tool_result_to_openai(msg: &Message) -> Value {
    serde_json::json!({
        "role": "tool",
        "tool_call_id": msg.tool_call_id.clone().unwrap_or_default(),
        "content": msg.content.extract_all_text(),
    })
}

fn tool_to_openai(tool: &ToolDefinition) -> Value {
    serde_json::json!({
        "type": "function",
        "function": {
            "name": tool.name,
            "description": tool.description,
            "parameters": tool.parameters,
        }
    })
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Response deserialization helpers
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn parse_chat_response(body: &Value) -> Result<ChatResponse> {
    let choice = body
        .get("choices")
        .and_then(|c| c.as_array())
        .and_then(|a| a.first())
        .ok_or_else(|| Error::Provider {
            provider: "openai_compat".into(),
            message: "no choices in response".into(),
        })?;

    let message = choice.get("message").ok_or_else(|| Error::Provider {
        provider: "openai_compat".into(),
        message: "no message in choice".into(),
    })?;

    let content = message
        .get("content")
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string();

    let finish_reason = choice
        .get("finish_reason")
        .and_then(|v| v.as_str())
        .map(String::from);

    let model = body
        .get("model")
        .and_then(|v| v.as_str())
        .unwrap_or("unknown")
        .to_string();

    let tool_calls = parse_openai_tool_calls(message);
    let usage = body.get("usage").and_then(parse_openai_usage);

    Ok(ChatResponse {
        content,
        tool_calls,
        usage,
        model,
        finish_reason,
    })
}

fn parse_openai_tool_calls(message: &Value) -> Vec<ToolCall> {
    let arr = match message.get("tool_calls").and_then(|v| v.as_array()) {
        Some(a) => a,
        None => return Vec::new(),
    };
    arr.iter()
        .filter_map(|tc| {
            let id = tc.get("id")?.as_str()?.to_string();
            let func = tc.get("function")?;
            let name = func.get("name")?.as_str()?.to_string();
            let arguments = func
                .get("arguments")?
                .as_str()
                .unwrap_or("{}")
                .to_string();
            Some(ToolCall {
                id,
                function: FunctionCall { name, arguments },
            })
        })
        .collect()
}

fn parse_openai_usage(v: &Value) -> Option<Usage> {
    Some(Usage {
        prompt_tokens: v.get("prompt_tokens")?.as_u64()? as u32,
        completion_tokens: v.get("completion_tokens")?.as_u64()? as u32,
        total_tokens: v.get("total_tokens")?.as_u64()? as u32,
    })
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// SSE streaming helpers
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Parse one SSE `data:` line into zero or more stream events.
///
/// A single chunk can carry more than one `tool_calls` delta entry (one per
/// `index`), so every entry is visited rather than returning after the
/// first match. Accumulation downstream is keyed by the stringified
/// `index` (§4.3 step 6); the real provider id, when present, rides along
/// on `ToolCallStarted.id`.
fn parse_sse_data(data: &str) -> Vec<Result<StreamEvent>> {
    if data.trim() == "[DONE]" {
        return vec![Ok(StreamEvent::Done {
            usage: None,
            finish_reason: Some("stop".into()),
        })];
    }

    let v: Value = match serde_json::from_str(data) {
        Ok(v) => v,
        Err(e) => return vec![Err(Error::Json(e))],
    };

    let choice = v
        .get("choices")
        .and_then(|c| c.as_array())
        .and_then(|a| a.first());

    // Usage-only chunk (stream_options.include_usage arrives in its own
    // final chunk with an empty choices array).
    let choice = match choice {
        Some(c) => c,
        None => {
            return match v.get("usage").and_then(parse_openai_usage) {
                Some(usage) => vec![Ok(StreamEvent::Done {
                    usage: Some(usage),
                    finish_reason: None,
                })],
                None => Vec::new(),
            };
        }
    };

    let delta = choice.get("delta").unwrap_or(&Value::Null);
    let mut events = Vec::new();

    if let Some(tc_arr) = delta.get("tool_calls").and_then(|v| v.as_array()) {
        for tc in tc_arr {
            let idx_str = tc
                .get("index")
                .and_then(|v| v.as_u64())
                .unwrap_or(0)
                .to_string();

            if let Some(id) = tc.get("id").and_then(|v| v.as_str()) {
                let name = tc
                    .get("function")
                    .and_then(|f| f.get("name"))
                    .and_then(|v| v.as_str())
                    .unwrap_or("");
                events.push(Ok(StreamEvent::ToolCallStarted {
                    call_id: idx_str.clone(),
                    id: id.to_string(),
                    tool_name: name.to_string(),
                }));
            }

            if let Some(args) = tc
                .get("function")
                .and_then(|f| f.get("arguments"))
                .and_then(|v| v.as_str())
            {
                events.push(Ok(StreamEvent::ToolCallDelta {
                    call_id: idx_str,
                    delta: args.to_string(),
                }));
            }
        }
    }

    if let Some(text) = delta.get("content").and_then(|v| v.as_str()) {
        if !text.is_empty() {
            events.push(Ok(StreamEvent::Token {
                text: text.to_string(),
            }));
        }
    }

    if let Some(fr) = choice.get("finish_reason").and_then(|f| f.as_str()) {
        let usage = v.get("usage").and_then(parse_openai_usage);
        events.push(Ok(StreamEvent::Done {
            usage,
            finish_reason: Some(fr.to_string()),
        }));
    }

    events
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Trait implementation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[async_trait::async_trait]
impl LlmProvider for OpenAiCompatProvider {
    async fn chat(&self, req: &ChatRequest) -> Result<ChatResponse> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = self.build_chat_body(req, false);

        tracing::debug!(provider = %self.id, url = %url, "openai_compat chat request");

        let resp = self
            .authed_post(&url)
            .json(&body)
            .send()
            .await
            .map_err(from_reqwest)?;

        let status = resp.status();
        let resp_text = resp.text().await.map_err(from_reqwest)?;

        if !status.is_success() {
            return Err(status_error(&self.id, status, resp_text));
        }

        let resp_json: Value = serde_json::from_str(&resp_text)?;
        parse_chat_response(&resp_json)
    }

    async fn chat_stream(
        &self,
        req: &ChatRequest,
    ) -> Result<BoxStream<'static, Result<StreamEvent>>> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = self.build_chat_body(req, true);
        let provider_id = self.id.clone();

        tracing::debug!(provider = %self.id, url = %url, "openai_compat stream request");

        let resp = self
            .authed_post(&url)
            .json(&body)
            .send()
            .await
            .map_err(from_reqwest)?;

        let status = resp.status();
        if !status.is_success() {
            let err_text = resp.text().await.map_err(from_reqwest)?;
            return Err(status_error(&provider_id, status, err_text));
        }

        Ok(crate::sse::sse_response_stream(resp, parse_sse_data))
    }

    fn capabilities(&self) -> &LlmCapabilities {
        &self.capabilities
    }

    fn provider_id(&self) -> &str {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sa_domain::tool::ContentPart;

    #[test]
    fn role_to_str_maps_summary_to_assistant() {
        assert_eq!(role_to_str(Role::Summary), "assistant");
    }

    #[test]
    fn assistant_to_openai_carries_tool_calls() {
        let msg = Message::assistant_with_tool_calls(
            "",
            vec![ToolCall {
                id: "call_1".into(),
                function: FunctionCall {
                    name: "python_execute".into(),
                    arguments: "{\"code\":\"1+1\"}".into(),
                },
            }],
        );
        let v = assistant_to_openai(&msg);
        assert_eq!(v["content"], Value::Null);
        assert_eq!(v["tool_calls"][0]["id"], "call_1");
        assert_eq!(v["tool_calls"][0]["function"]["name"], "python_execute");
    }

    #[test]
    fn tool_result_to_openai_uses_tool_call_id() {
        let msg = Message::tool_result("call_1", "python_execute", "2", None);
        let v = tool_result_to_openai(&msg);
        assert_eq!(v["tool_call_id"], "call_1");
        assert_eq!(v["content"], "2");
    }

    #[test]
    fn parse_openai_tool_calls_extracts_raw_arguments_string() {
        let message = serde_json::json!({
            "tool_calls": [{
                "id": "call_9",
                "function": {"name": "terminate", "arguments": "{\"status\":\"success\"}"}
            }]
        });
        let calls = parse_openai_tool_calls(&message);
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].id, "call_9");
        assert_eq!(calls[0].function.arguments, "{\"status\":\"success\"}");
    }

    #[test]
    fn parse_sse_data_done_sentinel() {
        let events = parse_sse_data("[DONE]");
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], Ok(StreamEvent::Done { .. })));
    }

    #[test]
    fn parse_sse_data_keys_tool_call_events_by_index() {
        let chunk = serde_json::json!({
            "choices": [{
                "delta": {
                    "tool_calls": [{
                        "index": 0,
                        "id": "call_abc",
                        "function": {"name": "python_execute"}
                    }]
                }
            }]
        })
        .to_string();
        let events = parse_sse_data(&chunk);
        assert_eq!(events.len(), 1);
        match &events[0] {
            Ok(StreamEvent::ToolCallStarted { call_id, id, tool_name }) => {
                assert_eq!(call_id, "0");
                assert_eq!(id, "call_abc");
                assert_eq!(tool_name, "python_execute");
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn parse_sse_data_handles_multiple_tool_call_deltas_in_one_chunk() {
        let chunk = serde_json::json!({
            "choices": [{
                "delta": {
                    "tool_calls": [
                        {"index": 0, "function": {"arguments": "{\"a\""}},
                        {"index": 1, "function": {"arguments": "{\"b\""}}
                    ]
                }
            }]
        })
        .to_string();
        let events = parse_sse_data(&chunk);
        assert_eq!(events.len(), 2);
        match (&events[0], &events[1]) {
            (
                Ok(StreamEvent::ToolCallDelta { call_id: c0, .. }),
                Ok(StreamEvent::ToolCallDelta { call_id: c1, .. }),
            ) => {
                assert_eq!(c0, "0");
                assert_eq!(c1, "1");
            }
            other => panic!("unexpected events: {other:?}"),
        }
    }

    #[test]
    fn parse_sse_data_text_delta() {
        let chunk = serde_json::json!({
            "choices": [{"delta": {"content": "hello"}}]
        })
        .to_string();
        let events = parse_sse_data(&chunk);
        assert_eq!(events.len(), 1);
        assert!(matches!(&events[0], Ok(StreamEvent::Token { text }) if text == "hello"));
    }

    #[test]
    fn content_value_renders_image_parts() {
        let msg = Message {
            role: Role::User,
            content: MessageContent::Parts(vec![
                ContentPart::Text { text: "what is this".into() },
                ContentPart::Image {
                    url: "data:image/png;base64,AAAA".into(),
                    detail: None,
                },
            ]),
            tool_calls: Vec::new(),
            tool_call_id: None,
            name: None,
            base64_image: None,
        };
        let v = content_value(&msg);
        assert_eq!(v[0]["type"], "text");
        assert_eq!(v[1]["type"], "image_url");
    }
}
