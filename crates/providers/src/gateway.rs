//! LLM Gateway (§4.3) — the single component that talks to LLM providers.
//!
//! Wraps a [`ProviderRegistry`] with the shaping pipeline from
//! `sa-contextpack` (normalize → reconstruct tool pairs → trim history
//! images → dedup next-step prompt), the token ceiling from
//! `sa-tokencount`, streaming reassembly into one coherent [`ChatResponse`],
//! and bounded retry with exponential jitter. Exposes exactly the four
//! operations the rest of the system calls through: `ask`,
//! `ask_with_images`, `ask_tool`, `ask_tool_with_images`.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use rand::Rng;

use sa_contextpack::{prepare_request, ImageAttachment};
use sa_domain::error::{Error, Result};
use sa_domain::stream::{StreamEvent, Usage};
use sa_domain::tool::{FunctionCall, Message, ToolCall, ToolDefinition};
use sa_outputbus::{EnvelopeType, OutputBus};
use sa_tokencount::TokenCounter;

use crate::registry::ProviderRegistry;
use crate::traits::{ChatRequest, ChatResponse, LlmProvider};

/// Base delay for attempt 1; doubles each subsequent attempt, capped, then
/// jittered by ±25% (§4.3 step 8: "exponential-jitter backoff").
const BACKOFF_BASE_MS: u64 = 200;
const BACKOFF_CAP_MS: u64 = 10_000;

pub struct Gateway {
    registry: Arc<ProviderRegistry>,
    counter: TokenCounter,
    /// `None` disables the §4.2/§4.3 step 5 ceiling check entirely.
    max_input_tokens: Option<u32>,
    max_retries: u32,
    bus: Arc<OutputBus>,
}

impl Gateway {
    pub fn new(
        registry: Arc<ProviderRegistry>,
        max_input_tokens: Option<u32>,
        max_retries: u32,
        bus: Arc<OutputBus>,
    ) -> Self {
        Self {
            registry,
            counter: TokenCounter::new(),
            max_input_tokens,
            max_retries: max_retries.max(1),
            bus,
        }
    }

    fn resolve_provider(&self, provider_id: Option<&str>) -> Result<Arc<dyn LlmProvider>> {
        match provider_id {
            Some(id) => self
                .registry
                .get(id)
                .ok_or_else(|| Error::Config(format!("unknown LLM provider '{id}'"))),
            None => self
                .registry
                .default_provider()
                .ok_or_else(|| Error::Config("no default LLM provider configured".into())),
        }
    }

    /// Plain text in, text out. No tools offered, no images attached.
    pub async fn ask(
        &self,
        provider_id: Option<&str>,
        model: Option<&str>,
        messages: Vec<Message>,
    ) -> Result<String> {
        let resp = self.call(provider_id, model, messages, &[], &[]).await?;
        Ok(resp.content)
    }

    /// Text in (with image attachments on the last user turn), text out.
    pub async fn ask_with_images(
        &self,
        provider_id: Option<&str>,
        model: Option<&str>,
        messages: Vec<Message>,
        images: &[ImageAttachment],
    ) -> Result<String> {
        let resp = self.call(provider_id, model, messages, &[], images).await?;
        Ok(resp.content)
    }

    /// Tool-augmented call: the model may respond with tool_calls.
    pub async fn ask_tool(
        &self,
        provider_id: Option<&str>,
        model: Option<&str>,
        messages: Vec<Message>,
        tools: &[ToolDefinition],
    ) -> Result<ChatResponse> {
        self.call(provider_id, model, messages, tools, &[]).await
    }

    /// Tool-augmented call with image attachments (§4.5 step 2: routed to
    /// when the previous tool observation carried produced-image output).
    pub async fn ask_tool_with_images(
        &self,
        provider_id: Option<&str>,
        model: Option<&str>,
        messages: Vec<Message>,
        tools: &[ToolDefinition],
        images: &[ImageAttachment],
    ) -> Result<ChatResponse> {
        self.call(provider_id, model, messages, tools, images).await
    }

    async fn call(
        &self,
        provider_id: Option<&str>,
        model: Option<&str>,
        messages: Vec<Message>,
        tools: &[ToolDefinition],
        images: &[ImageAttachment],
    ) -> Result<ChatResponse> {
        let provider = self.resolve_provider(provider_id)?;
        let caps = provider.capabilities();

        // §4.3 steps 1-4: normalize, reconstruct tool pairs, trim history
        // images, dedup the next-step prompt.
        let prepared = prepare_request(messages, images, caps.supports_vision);

        let prompt_tokens_estimate = self.counter.count_request(&prepared, tools);

        // §4.3 step 5 / §7: enforce the ceiling before ever dialing out.
        // Bypasses retry unconditionally — this is raised, not retried.
        if let Some(limit) = self.max_input_tokens {
            if prompt_tokens_estimate > limit {
                return Err(Error::TokenLimitExceeded {
                    used: prompt_tokens_estimate as u64,
                    limit: limit as u64,
                });
            }
        }

        let req = ChatRequest {
            messages: prepared,
            tools: tools.to_vec(),
            temperature: None,
            max_tokens: None,
            json_mode: false,
            model: model.map(String::from),
        };

        let mut resp = self
            .dispatch_with_retry(provider.as_ref(), &req, caps.supports_streaming)
            .await?;

        self.bus.emit(EnvelopeType::Chat, resp.content.clone());

        // §4.3 step 7: non-streaming responses carry server-reported usage
        // already; a streaming response that didn't report usage gets an
        // estimate from the pre-flight prompt count and the assembled text.
        if resp.usage.is_none() {
            let completion_tokens = self.counter.count_text(&resp.content);
            resp.usage = Some(Usage {
                prompt_tokens: prompt_tokens_estimate,
                completion_tokens,
                total_tokens: prompt_tokens_estimate + completion_tokens,
            });
        }

        Ok(resp)
    }

    /// §4.3 step 8: exponential-jitter backoff, up to `max_retries`
    /// attempts, for transient provider/HTTP/timeout errors.
    /// `TokenLimitExceeded` and `Authentication` are never retried.
    async fn dispatch_with_retry(
        &self,
        provider: &dyn LlmProvider,
        req: &ChatRequest,
        streaming: bool,
    ) -> Result<ChatResponse> {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            let result = if streaming {
                self.dispatch_streaming(provider, req).await
            } else {
                provider.chat(req).await
            };

            match result {
                Ok(resp) => return Ok(resp),
                Err(e) => {
                    if matches!(e, Error::TokenLimitExceeded { .. } | Error::Authentication(_)) {
                        return Err(e);
                    }
                    if !e.is_retryable() || attempt >= self.max_retries {
                        return Err(e);
                    }
                    let delay = backoff_delay_ms(attempt);
                    tracing::warn!(
                        provider = provider.provider_id(),
                        attempt,
                        max_attempts = self.max_retries,
                        error = %e,
                        delay_ms = delay,
                        "llm call failed, retrying"
                    );
                    tokio::time::sleep(Duration::from_millis(delay)).await;
                }
            }
        }
    }

    /// §4.3 step 6: assemble a streamed response into one coherent
    /// [`ChatResponse`]. Tool calls are accumulated per the provider's
    /// per-chunk `index` (carried as `call_id` in [`StreamEvent`]) since a
    /// real tool-call id only arrives on the first delta of each call.
    async fn dispatch_streaming(&self, provider: &dyn LlmProvider, req: &ChatRequest) -> Result<ChatResponse> {
        let mut stream = provider.chat_stream(req).await?;

        let mut content = String::new();
        let mut order: Vec<String> = Vec::new();
        let mut accumulators: HashMap<String, ToolCallAccumulator> = HashMap::new();
        let mut usage = None;
        let mut finish_reason = None;

        while let Some(event) = stream.next().await {
            match event? {
                StreamEvent::Token { text } => {
                    self.bus.emit(EnvelopeType::Streaming, text.clone());
                    content.push_str(&text);
                }
                StreamEvent::ToolCallStarted { call_id, id, tool_name } => {
                    if !accumulators.contains_key(&call_id) {
                        order.push(call_id.clone());
                    }
                    accumulators
                        .entry(call_id)
                        .or_insert_with(|| ToolCallAccumulator {
                            id,
                            tool_name,
                            arguments: String::new(),
                        });
                }
                StreamEvent::ToolCallDelta { call_id, delta } => {
                    if let Some(acc) = accumulators.get_mut(&call_id) {
                        acc.arguments.push_str(&delta);
                    }
                }
                StreamEvent::ToolCallFinished {
                    call_id,
                    tool_name,
                    arguments,
                } => {
                    if !accumulators.contains_key(&call_id) {
                        order.push(call_id.clone());
                    }
                    let acc = accumulators.entry(call_id.clone()).or_insert_with(|| ToolCallAccumulator {
                        id: call_id,
                        tool_name: tool_name.clone(),
                        arguments: String::new(),
                    });
                    acc.tool_name = tool_name;
                    if !arguments.is_null() {
                        acc.arguments = arguments.to_string();
                    }
                }
                StreamEvent::Done { usage: u, finish_reason: fr } => {
                    usage = u;
                    finish_reason = fr;
                }
                StreamEvent::Error { message } => {
                    return Err(Error::Provider {
                        provider: provider.provider_id().to_string(),
                        message,
                    });
                }
            }
        }

        let tool_calls = order
            .into_iter()
            .filter_map(|call_id| accumulators.remove(&call_id))
            .map(|acc| ToolCall {
                id: acc.id,
                function: FunctionCall {
                    name: acc.tool_name,
                    arguments: acc.arguments,
                },
            })
            .collect();

        Ok(ChatResponse {
            content,
            tool_calls,
            usage,
            model: req.model.clone().unwrap_or_default(),
            finish_reason,
        })
    }
}

struct ToolCallAccumulator {
    id: String,
    tool_name: String,
    arguments: String,
}

fn backoff_delay_ms(attempt: u32) -> u64 {
    let exp = BACKOFF_BASE_MS.saturating_mul(1u64 << attempt.saturating_sub(1).min(16));
    let capped = exp.min(BACKOFF_CAP_MS);
    let jitter_span = capped / 4;
    if jitter_span == 0 {
        return capped;
    }
    let jitter = rand::thread_rng().gen_range(0..=jitter_span);
    capped - jitter_span / 2 + jitter
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_grows_and_stays_capped() {
        let first = backoff_delay_ms(1);
        let later = backoff_delay_ms(10);
        assert!(first <= BACKOFF_CAP_MS);
        assert!(later <= BACKOFF_CAP_MS + BACKOFF_CAP_MS / 8);
        assert!(later >= first);
    }
}
