use sa_domain::tool::{Message, Role, ToolCall};

/// Fixed system prompt for the summarization call (§4.9 step 1).
pub const SUMMARY_SYSTEM_PROMPT: &str =
    "You are an information extraction assistant. Condense the conversation \
     so far into a dense summary that preserves every fact, insight, piece \
     of fetched data, produced deliverable, and warning a future step would \
     need in order to proceed without refetching anything.";

/// Fixed user instruction accompanying the summarization request.
pub const SUMMARY_USER_INSTRUCTION: &str =
    "Summarize the conversation above. Capture insights, facts, fetched \
     data, deliverables, and warnings in enough detail that subsequent \
     steps can act on them without re-running any tool calls.";

const SUMMARY_DELIMITER_OPEN: &str = "=== CONVERSATION SUMMARY ===";
const SUMMARY_DELIMITER_CLOSE: &str = "=== END SUMMARY ===";

/// §4.9 step 2: a tool call whose result MUST survive summarization because
/// later steps reference its artifacts.
fn is_real_result(call: &ToolCall, tool_msg: &Message) -> bool {
    // The ReAct agent wraps a tool's raw JSON result in an
    // "Observed output of cmd `<name>` executed:\n<result>" envelope
    // (§4.5 act()) before appending it to memory, so the JSON payload
    // starts at the first `{`, not at offset 0.
    let text = tool_msg.content.extract_all_text();
    let Some(json_start) = text.find('{') else {
        return false;
    };
    let Ok(value) = serde_json::from_str::<serde_json::Value>(&text[json_start..]) else {
        return false;
    };
    let success = value.get("success").and_then(|v| v.as_bool()).unwrap_or(false);
    if !success {
        return false;
    }
    match call.function.name.as_str() {
        "python_execute" => {
            let produced = |key: &str| {
                value
                    .get(key)
                    .and_then(|v| v.as_array())
                    .map(|a| !a.is_empty())
                    .unwrap_or(false)
            };
            produced("files") || produced("charts")
        }
        "datasource" => value
            .get("csv_filename")
            .and_then(|v| v.as_str())
            .map(|s| !s.is_empty())
            .unwrap_or(false),
        _ => false,
    }
}

/// §4.9 step 2: extract `(assistant-with-tool-call, tool-response)` pairs
/// whose tool result counts as a "real result". Walks every `tool_call_id`
/// on every assistant message against all later Tool messages, rather than
/// adjacent windows — an assistant turn with more than one tool call has
/// its responses following one another, not interleaved with it, so only
/// the first pair would ever land in an adjacent-window scan.
pub fn extract_real_result_pairs(memory: &[Message]) -> Vec<(Message, Message)> {
    let mut pairs = Vec::new();
    for (i, assistant) in memory.iter().enumerate() {
        if assistant.role != Role::Assistant {
            continue;
        }
        for call in &assistant.tool_calls {
            let Some(tool_msg) = memory[i + 1..]
                .iter()
                .find(|m| m.role == Role::Tool && m.tool_call_id.as_deref() == Some(call.id.as_str()))
            else {
                continue;
            };
            if is_real_result(call, tool_msg) {
                pairs.push((assistant.clone(), tool_msg.clone()));
            }
        }
    }
    pairs
}

/// §4.9 step 3: replace memory with
/// `[original_request, *real_result_pairs, *existing_summary_messages, new_summary_message]`.
pub fn rebuild_memory(memory: &[Message], summary_text: &str) -> Vec<Message> {
    let mut out = Vec::new();

    if let Some(first_user) = memory.iter().find(|m| m.role == Role::User) {
        out.push(first_user.clone());
    }

    for (assistant, tool_msg) in extract_real_result_pairs(memory) {
        out.push(assistant);
        out.push(tool_msg);
    }

    for existing in memory.iter().filter(|m| m.role == Role::Summary) {
        out.push(existing.clone());
    }

    out.push(Message::summary(format!(
        "{SUMMARY_DELIMITER_OPEN}\n{summary_text}\n{SUMMARY_DELIMITER_CLOSE}"
    )));

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use sa_domain::tool::FunctionCall;

    fn tool_call(id: &str, name: &str) -> ToolCall {
        ToolCall {
            id: id.into(),
            function: FunctionCall {
                name: name.into(),
                arguments: "{}".into(),
            },
        }
    }

    #[test]
    fn python_execute_with_produced_file_survives() {
        let assistant = Message::assistant_with_tool_calls("", vec![tool_call("c1", "python_execute")]);
        let tool_msg = Message::tool_result(
            "c1",
            "python_execute",
            r#"{"success": true, "files": ["out.png"]}"#,
            None,
        );
        let pairs = extract_real_result_pairs(&[assistant, tool_msg]);
        assert_eq!(pairs.len(), 1);
    }

    #[test]
    fn python_execute_without_produced_artifacts_is_dropped() {
        let assistant = Message::assistant_with_tool_calls("", vec![tool_call("c1", "python_execute")]);
        let tool_msg = Message::tool_result("c1", "python_execute", r#"{"success": true}"#, None);
        let pairs = extract_real_result_pairs(&[assistant, tool_msg]);
        assert!(pairs.is_empty());
    }

    #[test]
    fn datasource_with_csv_filename_survives() {
        let assistant = Message::assistant_with_tool_calls("", vec![tool_call("c1", "datasource")]);
        let tool_msg = Message::tool_result(
            "c1",
            "datasource",
            r#"{"success": true, "csv_filename": "rows.csv"}"#,
            None,
        );
        let pairs = extract_real_result_pairs(&[assistant, tool_msg]);
        assert_eq!(pairs.len(), 1);
    }

    #[test]
    fn unrelated_tool_never_counts_as_real_result() {
        let assistant = Message::assistant_with_tool_calls("", vec![tool_call("c1", "web_search")]);
        let tool_msg = Message::tool_result(
            "c1",
            "web_search",
            r#"{"success": true, "files": ["irrelevant.png"]}"#,
            None,
        );
        let pairs = extract_real_result_pairs(&[assistant, tool_msg]);
        assert!(pairs.is_empty());
    }

    #[test]
    fn both_tool_calls_in_one_assistant_turn_survive() {
        let assistant = Message::assistant_with_tool_calls(
            "",
            vec![tool_call("c1", "python_execute"), tool_call("c2", "datasource")],
        );
        let tool_c1 = Message::tool_result(
            "c1",
            "python_execute",
            r#"{"success": true, "files": ["out.png"]}"#,
            None,
        );
        let tool_c2 = Message::tool_result(
            "c2",
            "datasource",
            r#"{"success": true, "csv_filename": "rows.csv"}"#,
            None,
        );
        let pairs = extract_real_result_pairs(&[assistant, tool_c1, tool_c2]);
        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[0].1.tool_call_id.as_deref(), Some("c1"));
        assert_eq!(pairs[1].1.tool_call_id.as_deref(), Some("c2"));
    }

    #[test]
    fn rebuild_memory_keeps_first_request_real_results_and_prior_summaries() {
        let memory = vec![
            Message::user("build me a report"),
            Message::assistant("thinking"),
            Message::assistant_with_tool_calls("", vec![tool_call("c1", "python_execute")]),
            Message::tool_result(
                "c1",
                "python_execute",
                r#"{"success": true, "charts": ["c.png"]}"#,
                None,
            ),
            Message::summary("earlier summary"),
        ];
        let rebuilt = rebuild_memory(&memory, "the model produced a chart");
        assert_eq!(rebuilt[0].content.text(), Some("build me a report"));
        assert_eq!(rebuilt[1].role, Role::Assistant);
        assert_eq!(rebuilt[2].role, Role::Tool);
        assert_eq!(rebuilt[3].content.text(), Some("earlier summary"));
        assert_eq!(rebuilt[4].role, Role::Summary);
        assert!(rebuilt[4]
            .content
            .text()
            .unwrap()
            .contains("the model produced a chart"));
    }
}
