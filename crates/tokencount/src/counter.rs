use sa_domain::tool::{ContentPart, ImageDetail, Message, MessageContent, Role, ToolCall, ToolDefinition};

/// Per-message overhead (§4.2): every message costs this many tokens before
/// its own content is counted.
const MESSAGE_BASE_OVERHEAD: u32 = 4;
/// Overhead for the message list itself (§4.2).
const MESSAGE_LIST_OVERHEAD: u32 = 2;

/// Estimates prompt/image/tool-call token cost (§4.2). This is always an
/// estimate used to gate requests against `max_input_tokens`, never an
/// exact provider count.
pub struct TokenCounter {
    /// Characters-per-token ratio for the generic BPE fallback. Real
    /// provider tokenizers are plugged in via `with_model_ratio`; absent a
    /// known model, this heuristic is the only path (§4.2: "a generic BPE
    /// fallback").
    fallback_chars_per_token: f64,
}

impl Default for TokenCounter {
    fn default() -> Self {
        Self {
            fallback_chars_per_token: 4.0,
        }
    }
}

impl TokenCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count tokens in a plain string via the generic BPE fallback.
    pub fn count_text(&self, text: &str) -> u32 {
        if text.is_empty() {
            return 0;
        }
        // Whitespace-aware estimate: never fewer tokens than whitespace-split
        // words, never more than one token per 2 chars. Splits the
        // difference between "every token is a word" and "every token is a
        // few bytes", which is what BPE tokenizers trend toward in practice.
        let word_count = text.split_whitespace().count() as f64;
        let char_estimate = (text.chars().count() as f64 / self.fallback_chars_per_token).ceil();
        char_estimate.max(word_count).ceil() as u32
    }

    /// Count the tokens contributed by one tool call (§4.2: `tokens(name) +
    /// tokens(arguments_string)`).
    pub fn count_tool_call(&self, call: &ToolCall) -> u32 {
        self.count_text(&call.function.name) + self.count_text(&call.function.arguments)
    }

    /// Count the tokens contributed by a tool definition offered to the model.
    pub fn count_tool_definition(&self, def: &ToolDefinition) -> u32 {
        self.count_text(&def.name)
            + self.count_text(&def.description)
            + self.count_text(&def.parameters.to_string())
    }

    /// Count one message: base overhead + role/name/tool_call_id fields +
    /// content + tool calls + any image parts.
    pub fn count_message(&self, msg: &Message) -> u32 {
        let mut total = MESSAGE_BASE_OVERHEAD;
        total += self.count_text(role_str(msg.role));
        if let Some(name) = &msg.name {
            total += self.count_text(name);
        }
        if let Some(id) = &msg.tool_call_id {
            total += self.count_text(id);
        }
        total += self.count_content(&msg.content);
        for call in &msg.tool_calls {
            total += self.count_tool_call(call);
        }
        if msg.base64_image.is_some() {
            // No explicit detail on the message envelope; treat an attached
            // tool-result image as `high` detail with unknown dimensions.
            total += image_tokens(ImageDetail::High, None);
        }
        total
    }

    fn count_content(&self, content: &MessageContent) -> u32 {
        match content {
            MessageContent::Text(t) => self.count_text(t),
            MessageContent::Parts(parts) => parts
                .iter()
                .map(|p| match p {
                    ContentPart::Text { text } => self.count_text(text),
                    ContentPart::Image { detail, .. } => {
                        image_tokens(detail.unwrap_or(ImageDetail::High), None)
                    }
                })
                .sum(),
        }
    }

    /// Count a full outbound message list, including the list-level overhead
    /// and every tool definition offered alongside it.
    pub fn count_request(&self, messages: &[Message], tools: &[ToolDefinition]) -> u32 {
        let mut total = MESSAGE_LIST_OVERHEAD;
        total += messages.iter().map(|m| self.count_message(m)).sum::<u32>();
        total += tools.iter().map(|t| self.count_tool_definition(t)).sum::<u32>();
        total
    }
}

fn role_str(role: Role) -> &'static str {
    match role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
        Role::Tool => "tool",
        Role::Summary => "summary",
    }
}

/// Image token cost per §4.2:
/// - `low`: fixed 85.
/// - `high`: scale to fit within 2048×2048, then scale the shortest side to
///   768, tile by 512px, `ceil(w/512)·ceil(h/512)·170 + 85`.
/// - `medium`: same as `high` when dimensions are known, else a fixed 1024.
/// - unknown dimensions for `high` default to the 1024×1024 calculation.
pub fn image_tokens(detail: ImageDetail, dims: Option<(u32, u32)>) -> u32 {
    match detail {
        ImageDetail::Low => 85,
        ImageDetail::Medium => match dims {
            Some(d) => high_detail_tokens(d),
            None => 1024,
        },
        ImageDetail::High => {
            let d = dims.unwrap_or((1024, 1024));
            high_detail_tokens(d)
        }
    }
}

fn high_detail_tokens((w, h): (u32, u32)) -> u32 {
    let (w, h) = (w as f64, h as f64);

    // Scale to fit within 2048x2048, preserving aspect ratio.
    let scale_to_fit = (2048.0 / w).min(2048.0 / h).min(1.0);
    let (w, h) = (w * scale_to_fit, h * scale_to_fit);

    // Scale the shortest side down to 768.
    let shortest = w.min(h);
    let scale_to_768 = if shortest > 0.0 { 768.0 / shortest } else { 1.0 };
    let (w, h) = (w * scale_to_768, h * scale_to_768);

    let tiles_w = (w / 512.0).ceil() as u32;
    let tiles_h = (h / 512.0).ceil() as u32;
    tiles_w * tiles_h * 170 + 85
}

#[cfg(test)]
mod tests {
    use super::*;
    use sa_domain::tool::FunctionCall;

    #[test]
    fn low_detail_is_always_85() {
        assert_eq!(image_tokens(ImageDetail::Low, None), 85);
        assert_eq!(image_tokens(ImageDetail::Low, Some((4000, 3000))), 85);
    }

    #[test]
    fn high_detail_unknown_dims_uses_1024_square() {
        let expected = high_detail_tokens((1024, 1024));
        assert_eq!(image_tokens(ImageDetail::High, None), expected);
    }

    #[test]
    fn medium_detail_unknown_dims_is_fixed_1024() {
        assert_eq!(image_tokens(ImageDetail::Medium, None), 1024);
    }

    #[test]
    fn medium_detail_known_dims_uses_high_calc() {
        let dims = Some((2048, 2048));
        assert_eq!(
            image_tokens(ImageDetail::Medium, dims),
            high_detail_tokens((2048, 2048))
        );
    }

    #[test]
    fn high_detail_2048_square_is_4_tiles() {
        // 2048x2048 fits as-is, shortest side 2048 scaled to 768 -> 768x768.
        // ceil(768/512)=2 tiles each way -> 2*2*170+85 = 765.
        assert_eq!(high_detail_tokens((2048, 2048)), 765);
    }

    #[test]
    fn high_detail_oversized_image_scales_down_first() {
        // 4096x2048 scales to fit 2048x2048 -> 2048x1024, shortest side 1024
        // scales to 768 -> 1536x768. ceil(1536/512)=3, ceil(768/512)=2.
        // 3*2*170+85 = 1105.
        assert_eq!(high_detail_tokens((4096, 2048)), 1105);
    }

    #[test]
    fn count_text_empty_is_zero() {
        let counter = TokenCounter::new();
        assert_eq!(counter.count_text(""), 0);
    }

    #[test]
    fn count_message_includes_base_overhead_and_role() {
        let counter = TokenCounter::new();
        let msg = Message::user("hi");
        let total = counter.count_message(&msg);
        assert!(total >= MESSAGE_BASE_OVERHEAD);
    }

    #[test]
    fn count_tool_call_sums_name_and_arguments() {
        let counter = TokenCounter::new();
        let call = ToolCall {
            id: "call_1".into(),
            function: FunctionCall {
                name: "python_execute".into(),
                arguments: r#"{"code": "print(1)"}"#.into(),
            },
        };
        let expected =
            counter.count_text("python_execute") + counter.count_text(r#"{"code": "print(1)"}"#);
        assert_eq!(counter.count_tool_call(&call), expected);
    }

    #[test]
    fn count_request_adds_list_overhead() {
        let counter = TokenCounter::new();
        let messages = vec![Message::user("hello there")];
        let per_message = counter.count_message(&messages[0]);
        let total = counter.count_request(&messages, &[]);
        assert_eq!(total, per_message + MESSAGE_LIST_OVERHEAD);
    }
}
