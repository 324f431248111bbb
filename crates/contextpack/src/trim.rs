use sa_domain::tool::{Message, MessageContent};

/// §4.3 step 3: for every message except the last, collapse structured
/// mixed content into plain text, dropping image parts.
pub fn trim_history_images(messages: Vec<Message>) -> Vec<Message> {
    let last_index = messages.len().saturating_sub(1);
    messages
        .into_iter()
        .enumerate()
        .map(|(i, msg)| if i == last_index { msg } else { collapse(msg) })
        .collect()
}

fn collapse(mut msg: Message) -> Message {
    if let MessageContent::Parts(_) = &msg.content {
        msg.content = MessageContent::Text(msg.content.extract_all_text());
    }
    msg
}

#[cfg(test)]
mod tests {
    use super::*;
    use sa_domain::tool::{ContentPart, ImageDetail};

    #[test]
    fn collapses_all_but_last_message() {
        let mut first = Message::user("first");
        first.content = MessageContent::Parts(vec![
            ContentPart::Text {
                text: "a".into(),
            },
            ContentPart::Image {
                url: "data:image/png;base64,AAAA".into(),
                detail: Some(ImageDetail::High),
            },
        ]);
        let mut last = Message::user("last");
        last.content = MessageContent::Parts(vec![ContentPart::Image {
            url: "data:image/png;base64,BBBB".into(),
            detail: Some(ImageDetail::High),
        }]);

        let out = trim_history_images(vec![first, last]);
        assert!(matches!(out[0].content, MessageContent::Text(_)));
        assert_eq!(out[0].content.text(), Some("a"));
        assert!(matches!(out[1].content, MessageContent::Parts(_)));
    }
}
