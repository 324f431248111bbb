use sa_domain::tool::{ContentPart, Message, MessageContent, Role};

/// An image supplied alongside a prompt (`ask_with_images`). Turned into a
/// `data:` URI content part on the last user message (§4.3 step 1).
pub struct ImageAttachment {
    pub media_type: String,
    pub base64_data: String,
}

impl ImageAttachment {
    fn data_uri(&self) -> String {
        format!("data:{};base64,{}", self.media_type, self.base64_data)
    }
}

/// §4.3 step 1: normalize input into OpenAI shape, attach images to the last
/// user message when the model is multimodal, else strip image parts
/// silently.
pub fn normalize_messages(
    mut messages: Vec<Message>,
    images: &[ImageAttachment],
    model_supports_vision: bool,
) -> Vec<Message> {
    if !images.is_empty() && model_supports_vision {
        if let Some(last_user) = messages.iter_mut().rev().find(|m| m.role == Role::User) {
            attach_images(last_user, images);
        }
    }

    if !model_supports_vision {
        for msg in &mut messages {
            strip_images(msg);
        }
    }

    messages
}

fn attach_images(msg: &mut Message, images: &[ImageAttachment]) {
    let mut parts = match &msg.content {
        MessageContent::Text(t) if !t.is_empty() => vec![ContentPart::Text { text: t.clone() }],
        MessageContent::Text(_) => Vec::new(),
        MessageContent::Parts(parts) => parts.clone(),
    };
    for img in images {
        parts.push(ContentPart::Image {
            url: img.data_uri(),
            detail: None,
        });
    }
    msg.content = MessageContent::Parts(parts);
}

fn strip_images(msg: &mut Message) {
    if let MessageContent::Parts(parts) = &msg.content {
        let kept: Vec<ContentPart> = parts
            .iter()
            .filter(|p| matches!(p, ContentPart::Text { .. }))
            .cloned()
            .collect();
        msg.content = if kept.is_empty() {
            MessageContent::Text(String::new())
        } else {
            MessageContent::Parts(kept)
        };
    }
    msg.base64_image = None;
}

#[cfg(test)]
mod tests {
    use super::*;
    use sa_domain::tool::ImageDetail;

    fn image() -> ImageAttachment {
        ImageAttachment {
            media_type: "image/png".into(),
            base64_data: "AAAA".into(),
        }
    }

    #[test]
    fn attaches_image_to_last_user_message_when_multimodal() {
        let messages = vec![Message::system("s"), Message::user("describe this")];
        let out = normalize_messages(messages, &[image()], true);
        let MessageContent::Parts(parts) = &out[1].content else {
            panic!("expected parts");
        };
        assert!(parts
            .iter()
            .any(|p| matches!(p, ContentPart::Image { .. })));
    }

    #[test]
    fn strips_images_when_model_not_multimodal() {
        let mut messages = vec![Message::user("hi")];
        messages[0].content = MessageContent::Parts(vec![
            ContentPart::Text { text: "hi".into() },
            ContentPart::Image {
                url: "data:image/png;base64,AAAA".into(),
                detail: Some(ImageDetail::High),
            },
        ]);
        let out = normalize_messages(messages, &[], false);
        let MessageContent::Parts(parts) = &out[0].content else {
            panic!("expected parts");
        };
        assert_eq!(parts.len(), 1);
    }

    #[test]
    fn no_images_leaves_messages_untouched() {
        let messages = vec![Message::user("hi")];
        let out = normalize_messages(messages, &[], true);
        assert_eq!(out[0].content.text(), Some("hi"));
    }
}
