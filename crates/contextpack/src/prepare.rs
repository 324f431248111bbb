use sa_domain::tool::Message;

use crate::dedup::dedup_next_prompt;
use crate::normalize::{normalize_messages, ImageAttachment};
use crate::reconstruct::reconstruct_tool_pairs;
use crate::trim::trim_history_images;

/// Runs §4.3 steps 1-4 in order: normalize, reconstruct tool pairs, trim
/// history images, dedup the next-step prompt. The LLM Gateway calls this
/// once per request before token-counting and dispatch.
pub fn prepare_request(
    messages: Vec<Message>,
    images: &[ImageAttachment],
    model_supports_vision: bool,
) -> Vec<Message> {
    let normalized = normalize_messages(messages, images, model_supports_vision);
    let reconstructed = reconstruct_tool_pairs(normalized);
    let trimmed = trim_history_images(reconstructed);
    dedup_next_prompt(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sa_domain::tool::{FunctionCall, ToolCall};

    #[test]
    fn pipeline_reconstructs_and_dedups() {
        let messages = vec![
            Message::user("next step"),
            Message::assistant_with_tool_calls(
                "",
                vec![ToolCall {
                    id: "c1".into(),
                    function: FunctionCall {
                        name: "python_execute".into(),
                        arguments: "{}".into(),
                    },
                }],
            ),
            Message::tool_result("c1", "python_execute", "ok", None),
            Message::user("next step"),
        ];
        let out = prepare_request(messages, &[], true);
        // The first "next step" user message is deduped against the last.
        assert_eq!(out.len(), 3);
        assert_eq!(out.last().unwrap().content.text(), Some("next step"));
    }
}
