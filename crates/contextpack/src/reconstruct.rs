use std::collections::HashMap;

use sa_domain::tool::{Message, Role};

/// §4.3 step 2: walk the input, and for every assistant `tool_calls` id,
/// place the matching tool response immediately after it (or a synthetic
/// placeholder if none was recorded). Tool messages not referenced by any
/// assistant tool call are dropped.
pub fn reconstruct_tool_pairs(messages: Vec<Message>) -> Vec<Message> {
    let mut by_call_id: HashMap<String, Message> = HashMap::new();
    for msg in &messages {
        if msg.role == Role::Tool {
            if let Some(id) = &msg.tool_call_id {
                by_call_id.insert(id.clone(), msg.clone());
            }
        }
    }

    let mut out = Vec::with_capacity(messages.len());
    for msg in messages {
        if msg.role == Role::Tool {
            continue;
        }
        let tool_calls = msg.tool_calls.clone();
        out.push(msg);
        for call in &tool_calls {
            match by_call_id.remove(&call.id) {
                Some(tool_msg) => out.push(tool_msg),
                None => out.push(Message::synthetic_tool_placeholder(call.id.clone())),
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use sa_domain::tool::{FunctionCall, ToolCall};

    fn call(id: &str) -> ToolCall {
        ToolCall {
            id: id.into(),
            function: FunctionCall {
                name: "python_execute".into(),
                arguments: "{}".into(),
            },
        }
    }

    #[test]
    fn inserts_matching_tool_response_after_assistant_call() {
        let messages = vec![
            Message::user("go"),
            Message::assistant_with_tool_calls("", vec![call("c1")]),
            Message::tool_result("c1", "python_execute", "42", None),
        ];
        let out = reconstruct_tool_pairs(messages);
        assert_eq!(out.len(), 3);
        assert_eq!(out[2].tool_call_id.as_deref(), Some("c1"));
        assert_eq!(out[2].content.text(), Some("42"));
    }

    #[test]
    fn inserts_synthetic_placeholder_when_response_missing() {
        let messages = vec![Message::assistant_with_tool_calls("", vec![call("c1")])];
        let out = reconstruct_tool_pairs(messages);
        assert_eq!(out.len(), 2);
        assert_eq!(out[1].content.text(), Some(""));
        assert!(out[1].name.is_none());
    }

    #[test]
    fn drops_stray_tool_message_with_no_assistant_origin() {
        let messages = vec![
            Message::user("go"),
            Message::tool_result("orphan", "python_execute", "oops", None),
        ];
        let out = reconstruct_tool_pairs(messages);
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn preserves_order_of_multiple_tool_calls() {
        let messages = vec![
            Message::assistant_with_tool_calls("", vec![call("a"), call("b")]),
            Message::tool_result("b", "python_execute", "second", None),
            Message::tool_result("a", "python_execute", "first", None),
        ];
        let out = reconstruct_tool_pairs(messages);
        assert_eq!(out[1].tool_call_id.as_deref(), Some("a"));
        assert_eq!(out[2].tool_call_id.as_deref(), Some("b"));
    }
}
