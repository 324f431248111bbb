use sa_domain::tool::{MessageContent, Role};

/// §4.3 step 4: if the last message is a plain user string, drop any earlier
/// message whose rendered content equals it verbatim. Eliminates reinjected
/// `NEXT_STEP` prompts in a long-running loop.
pub fn dedup_next_prompt(messages: Vec<sa_domain::tool::Message>) -> Vec<sa_domain::tool::Message> {
    let Some(last) = messages.last() else {
        return messages;
    };
    if last.role != Role::User {
        return messages;
    }
    let MessageContent::Text(last_text) = &last.content else {
        return messages;
    };
    let last_text = last_text.clone();
    let last_index = messages.len() - 1;

    messages
        .into_iter()
        .enumerate()
        .filter(|(i, msg)| *i == last_index || msg.content.extract_all_text() != last_text)
        .map(|(_, msg)| msg)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use sa_domain::tool::Message;

    #[test]
    fn removes_earlier_identical_user_prompt() {
        let messages = vec![
            Message::user("do the next step"),
            Message::assistant("ok"),
            Message::user("do the next step"),
        ];
        let out = dedup_next_prompt(messages);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].content.text(), Some("ok"));
    }

    #[test]
    fn leaves_messages_alone_when_last_is_not_user() {
        let messages = vec![Message::user("a"), Message::assistant("b")];
        let out = dedup_next_prompt(messages);
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn leaves_distinct_prompts_untouched() {
        let messages = vec![Message::user("first"), Message::user("second")];
        let out = dedup_next_prompt(messages);
        assert_eq!(out.len(), 2);
    }
}
