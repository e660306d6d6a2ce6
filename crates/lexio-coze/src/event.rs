use serde_json::{Map, Value};

use crate::sse::Frame;

/// Recognized categories of the dotted event namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventCategory {
    ChatCreated,
    ChatFailed,
    ChatCompleted,
    MessageDelta,
    MessageCompleted,
    Error,
    Other,
}

impl EventCategory {
    /// Case-insensitive mapping of the event name.
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "conversation.chat.created" => Self::ChatCreated,
            "conversation.chat.failed" => Self::ChatFailed,
            "conversation.chat.completed" => Self::ChatCompleted,
            "conversation.message.delta" => Self::MessageDelta,
            "conversation.message.completed" => Self::MessageCompleted,
            "error" => Self::Error,
            _ => Self::Other,
        }
    }
}

/// One interpreted frame, normalized from the raw payload.
#[derive(Debug, Clone)]
pub struct CozeEvent {
    pub category: EventCategory,
    pub role: Option<String>,
    pub message_type: Option<String>,
    pub text: String,
    pub conversation_id: Option<String>,
    pub chat_id: Option<String>,
    pub usage: Option<Value>,
    pub model_name: Option<String>,
    pub error_message: Option<String>,
    pub image_urls: Vec<String>,
}

/// Interpret a frame's payload. Undecodable or non-object payloads are
/// skipped frames, not errors.
pub fn interpret(frame: &Frame) -> Option<CozeEvent> {
    let value: Value = serde_json::from_str(&frame.data).ok()?;
    let root = value.as_object()?;
    // Some producers wrap the event body in a "data" envelope.
    let node = root.get("data").and_then(Value::as_object).unwrap_or(root);

    let category = EventCategory::from_name(&frame.event);

    let text = node
        .get("content")
        .map(normalize_content)
        .filter(|t| !t.is_empty())
        .or_else(|| {
            node.get("delta")
                .map(normalize_content)
                .filter(|t| !t.is_empty())
        })
        .or_else(|| str_field(node, "text"))
        .unwrap_or_default();

    let error_message = match category {
        EventCategory::ChatFailed => node
            .get("last_error")
            .and_then(Value::as_object)
            .and_then(|e| str_field(e, "msg"))
            .or_else(|| str_field(node, "msg"))
            .or_else(|| str_field(node, "message")),
        EventCategory::Error => str_field(node, "msg")
            .or_else(|| str_field(node, "message"))
            .or_else(|| Some(Value::Object(node.clone()).to_string())),
        // Some producers report failures inline on otherwise-normal events.
        _ => str_field(node, "error_message"),
    };

    Some(CozeEvent {
        category,
        role: str_field(node, "role"),
        message_type: str_field(node, "type"),
        text,
        conversation_id: str_field(node, "conversation_id"),
        chat_id: str_field(node, "id").or_else(|| str_field(node, "chat_id")),
        usage: node.get("usage").filter(|u| !u.is_null()).cloned(),
        model_name: str_field(node, "model_name").or_else(|| str_field(node, "model")),
        error_message,
        image_urls: extract_image_urls(node),
    })
}

/// The shapes Coze uses for a message `content` field.
enum ContentShape<'a> {
    Plain(&'a str),
    Blocks(&'a [Value]),
    Container(&'a Map<String, Value>),
    Unknown,
}

impl<'a> ContentShape<'a> {
    fn classify(value: &'a Value) -> Self {
        match value {
            Value::String(s) => Self::Plain(s),
            Value::Array(blocks) => Self::Blocks(blocks),
            Value::Object(map) => Self::Container(map),
            _ => Self::Unknown,
        }
    }
}

const TEXT_BLOCK_TYPES: [&str; 3] = ["text", "raw_text", "paragraph"];

/// Flatten a heterogeneous content value to plain text. Unrecognized
/// shapes normalize to empty text, never an error.
pub fn normalize_content(value: &Value) -> String {
    match ContentShape::classify(value) {
        ContentShape::Plain(s) => s.trim().to_string(),
        ContentShape::Blocks(blocks) => {
            let mut fragments = String::new();
            for block in blocks {
                let Some(map) = block.as_object() else {
                    continue;
                };
                let block_type = str_field(map, "type")
                    .unwrap_or_default()
                    .to_ascii_lowercase();
                if TEXT_BLOCK_TYPES.contains(&block_type.as_str()) {
                    if let Some(text) =
                        str_field(map, "text").or_else(|| str_field(map, "content"))
                    {
                        fragments.push_str(&text);
                    }
                } else if let Some(nested) = map.get("content").filter(|c| c.is_array()) {
                    fragments.push_str(&normalize_content(nested));
                }
            }
            fragments.trim().to_string()
        }
        ContentShape::Container(map) => match map.get("content") {
            Some(inner) => normalize_content(inner),
            None => str_field(map, "text")
                .or_else(|| str_field(map, "value"))
                .unwrap_or_default(),
        },
        ContentShape::Unknown => String::new(),
    }
}

/// Collect image URLs from the content shape, order preserved.
/// Deduplication is the aggregator's job.
pub fn extract_image_urls(node: &Map<String, Value>) -> Vec<String> {
    let mut urls = Vec::new();
    match node.get("content").map(ContentShape::classify) {
        Some(ContentShape::Blocks(blocks)) => collect_block_images(blocks, &mut urls),
        Some(ContentShape::Container(map)) => {
            if let Some(blocks) = map.get("content").and_then(Value::as_array) {
                collect_block_images(blocks, &mut urls);
            }
        }
        _ => {}
    }
    if urls.is_empty() {
        if let Some(images) = node.get("images").and_then(Value::as_array) {
            for img in images {
                if let Some(url) = img.as_object().and_then(|m| str_field(m, "url")) {
                    urls.push(url);
                }
            }
        }
    }
    urls
}

fn collect_block_images(blocks: &[Value], urls: &mut Vec<String>) {
    for block in blocks {
        let Some(map) = block.as_object() else {
            continue;
        };
        match str_field(map, "type").as_deref() {
            Some("image") => {
                if let Some(url) = map
                    .get("image")
                    .and_then(Value::as_object)
                    .and_then(|i| str_field(i, "url"))
                {
                    urls.push(url);
                }
            }
            Some("images") => {
                for img in map.get("images").and_then(Value::as_array).into_iter().flatten() {
                    if let Some(url) = img.as_object().and_then(|m| str_field(m, "url")) {
                        urls.push(url);
                    }
                }
            }
            _ => {}
        }
    }
}

fn str_field(map: &Map<String, Value>, key: &str) -> Option<String> {
    map.get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn frame(event: &str, data: Value) -> Frame {
        Frame {
            event: event.to_string(),
            data: data.to_string(),
        }
    }

    #[test]
    fn test_interpret_plain_string_content() {
        let event = interpret(&frame(
            "conversation.message.delta",
            json!({"role": "assistant", "type": "answer", "content": "Hello"}),
        ))
        .unwrap();

        assert_eq!(event.category, EventCategory::MessageDelta);
        assert_eq!(event.text, "Hello");
        assert_eq!(event.role.as_deref(), Some("assistant"));
        assert_eq!(event.message_type.as_deref(), Some("answer"));
    }

    #[test]
    fn test_interpret_block_list_content() {
        let event = interpret(&frame(
            "conversation.message.completed",
            json!({
                "type": "answer",
                "content": [
                    {"type": "text", "text": "Once "},
                    {"type": "raw_text", "content": "upon"},
                    {"type": "audio", "url": "ignored"},
                    {"type": "group", "content": [{"type": "text", "text": " a time"}]}
                ]
            }),
        ))
        .unwrap();

        assert_eq!(event.text, "Once upon a time");
    }

    #[test]
    fn test_interpret_nested_container_content() {
        let event = interpret(&frame(
            "conversation.message.completed",
            json!({"content": {"content": [{"type": "text", "text": "nested"}]}}),
        ))
        .unwrap();

        assert_eq!(event.text, "nested");
    }

    #[test]
    fn test_interpret_unknown_shape_is_empty_text() {
        let event = interpret(&frame(
            "conversation.message.delta",
            json!({"content": 42}),
        ))
        .unwrap();

        assert_eq!(event.text, "");
    }

    #[test]
    fn test_interpret_top_level_text_fallback() {
        let event = interpret(&frame(
            "conversation.message.delta",
            json!({"text": "fallback"}),
        ))
        .unwrap();

        assert_eq!(event.text, "fallback");
    }

    #[test]
    fn test_interpret_malformed_json_is_skipped() {
        let raw = Frame {
            event: "conversation.message.delta".to_string(),
            data: "{\"content\": ".to_string(),
        };
        assert!(interpret(&raw).is_none());
    }

    #[test]
    fn test_interpret_data_envelope() {
        let event = interpret(&frame(
            "conversation.chat.created",
            json!({"data": {"id": "chat-1", "conversation_id": "conv-1"}}),
        ))
        .unwrap();

        assert_eq!(event.chat_id.as_deref(), Some("chat-1"));
        assert_eq!(event.conversation_id.as_deref(), Some("conv-1"));
    }

    #[test]
    fn test_interpret_failed_event_last_error() {
        let event = interpret(&frame(
            "conversation.chat.failed",
            json!({"last_error": {"code": 700, "msg": "bot unavailable"}}),
        ))
        .unwrap();

        assert_eq!(event.error_message.as_deref(), Some("bot unavailable"));
    }

    #[test]
    fn test_extract_single_and_batch_images() {
        let event = interpret(&frame(
            "conversation.message.completed",
            json!({
                "content": [
                    {"type": "image", "image": {"url": "https://img/a.png"}},
                    {"type": "images", "images": [
                        {"url": "https://img/b.png"},
                        {"url": "https://img/c.png"}
                    ]}
                ]
            }),
        ))
        .unwrap();

        assert_eq!(
            event.image_urls,
            vec!["https://img/a.png", "https://img/b.png", "https://img/c.png"]
        );
    }

    #[test]
    fn test_event_category_case_insensitive() {
        assert_eq!(
            EventCategory::from_name("Conversation.Chat.Completed"),
            EventCategory::ChatCompleted
        );
        assert_eq!(
            EventCategory::from_name("conversation.chat.in_progress"),
            EventCategory::Other
        );
    }
}
