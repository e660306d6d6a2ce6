use std::collections::HashSet;

use futures::{Stream, StreamExt};
use serde_json::Value;

use crate::error::{CozeError, Result};
use crate::event::{interpret, CozeEvent, EventCategory};
use crate::sse::Frame;

/// Marker preceding the learning passage in combined workflow output.
pub const STORY_MARKER: &str = "英文短文：";
/// Marker preceding the illustration caption.
pub const CAPTION_MARKER: &str = "根据短文自动生成的插图：";

/// Terminal sentinel payload; a valid frame that carries no content.
pub const DONE_SENTINEL: &str = "[DONE]";

#[derive(Debug, Clone, Copy)]
pub struct AggregatorOptions {
    /// Use the concatenated delta buffer when the completed answer event
    /// carries no text. With the flag off the completed event is strictly
    /// authoritative and an empty one contributes nothing.
    pub buffer_fallback: bool,
    /// Split the final text on the story/caption markers, and scan the
    /// caption for bare URLs when no image arrived structurally.
    pub split_sections: bool,
}

impl Default for AggregatorOptions {
    fn default() -> Self {
        Self::chat()
    }
}

impl AggregatorOptions {
    /// Options used for bot-chat streams.
    pub fn chat() -> Self {
        Self {
            buffer_fallback: true,
            split_sections: false,
        }
    }

    /// Options used for workflow-driven story generation.
    pub fn story() -> Self {
        Self {
            buffer_fallback: true,
            split_sections: true,
        }
    }
}

/// Aggregate produced once a stream completes.
#[derive(Debug, Clone)]
pub struct StreamResult {
    pub text: String,
    pub image_caption: Option<String>,
    pub image_urls: Vec<String>,
    pub conversation_id: Option<String>,
    pub chat_id: Option<String>,
    pub usage: Option<Value>,
    pub model_name: Option<String>,
}

/// Folds interpreted events into one `StreamResult`.
///
/// Delta fragments accumulate in a working buffer; a completed answer with
/// text overrides the buffer. All stream state lives here rather than in
/// closures so the fold is testable without I/O.
#[derive(Debug)]
pub struct StreamAggregator {
    options: AggregatorOptions,
    buffer: String,
    completed_text: Option<String>,
    conversation_id: Option<String>,
    chat_id: Option<String>,
    usage: Option<Value>,
    model_name: Option<String>,
    image_urls: Vec<String>,
}

impl StreamAggregator {
    pub fn new(options: AggregatorOptions) -> Self {
        Self {
            options,
            buffer: String::new(),
            completed_text: None,
            conversation_id: None,
            chat_id: None,
            usage: None,
            model_name: None,
            image_urls: Vec::new(),
        }
    }

    /// Apply one event. Remote failures abort the fold immediately.
    pub fn push(&mut self, event: CozeEvent) -> Result<()> {
        self.image_urls.extend(event.image_urls.clone());

        if let Some(message) = event.error_message {
            return Err(CozeError::Remote(message));
        }

        match event.category {
            EventCategory::ChatFailed | EventCategory::Error => {
                // Failure events abort even when no message was decoded.
                return Err(CozeError::Remote("stream reported failure".to_string()));
            }
            EventCategory::ChatCreated => {
                if self.chat_id.is_none() {
                    self.chat_id = event.chat_id;
                }
                if event.conversation_id.is_some() {
                    self.conversation_id = event.conversation_id;
                }
            }
            EventCategory::ChatCompleted => {
                // Session continuity: a completed event may overwrite the
                // conversation id recorded at chat creation.
                if event.conversation_id.is_some() {
                    self.conversation_id = event.conversation_id;
                }
                if self.chat_id.is_none() {
                    self.chat_id = event.chat_id;
                }
                if event.usage.is_some() {
                    self.usage = event.usage;
                }
                if event.model_name.is_some() {
                    self.model_name = event.model_name;
                }
            }
            EventCategory::MessageDelta => {
                if is_answer(&event) && !event.text.is_empty() {
                    self.buffer.push_str(&event.text);
                }
            }
            EventCategory::MessageCompleted => {
                if is_answer(&event) {
                    if !event.text.is_empty() {
                        self.completed_text = Some(event.text);
                    } else if !self.options.buffer_fallback {
                        self.completed_text = Some(String::new());
                    }
                }
            }
            EventCategory::Other => {}
        }
        Ok(())
    }

    /// Close the fold. An empty final text is always an error.
    pub fn finish(self) -> Result<StreamResult> {
        let Self {
            options,
            buffer,
            completed_text,
            conversation_id,
            chat_id,
            usage,
            model_name,
            image_urls,
        } = self;

        let mut text = match completed_text {
            Some(completed) => completed,
            None => buffer.trim().to_string(),
        };

        let mut urls = dedup_preserving_order(image_urls);
        let mut image_caption = None;
        if options.split_sections {
            let (story, caption) = split_story_sections(&text);
            text = story;
            if !caption.is_empty() {
                if urls.is_empty() {
                    urls = dedup_preserving_order(scan_caption_urls(&caption));
                }
                image_caption = Some(caption);
            }
        }

        if text.is_empty() {
            return Err(CozeError::EmptyResult);
        }

        Ok(StreamResult {
            text,
            image_caption,
            image_urls: urls,
            conversation_id,
            chat_id,
            usage,
            model_name,
        })
    }
}

/// Consume a frame stream end to end and produce one result.
pub async fn aggregate<S>(mut frames: S, options: AggregatorOptions) -> Result<StreamResult>
where
    S: Stream<Item = Result<Frame>> + Unpin,
{
    let mut aggregator = StreamAggregator::new(options);
    while let Some(frame) = frames.next().await {
        let frame = frame?;
        if frame.data == DONE_SENTINEL {
            continue;
        }
        match interpret(&frame) {
            Some(event) => aggregator.push(event)?,
            None => {
                tracing::debug!(event = %frame.event, "skipping undecodable frame");
            }
        }
    }
    aggregator.finish()
}

fn is_answer(event: &CozeEvent) -> bool {
    let role_ok = event
        .role
        .as_deref()
        .map_or(true, |r| r.eq_ignore_ascii_case("assistant"));
    let type_ok = event
        .message_type
        .as_deref()
        .map_or(true, |t| t.eq_ignore_ascii_case("answer"));
    role_ok && type_ok
}

/// Split combined workflow output into (story, caption).
pub fn split_story_sections(full_text: &str) -> (String, String) {
    let mut text = full_text.trim();
    if let Some(rest) = text.strip_prefix(STORY_MARKER) {
        text = rest.trim_start();
    }
    match text.find(CAPTION_MARKER) {
        Some(idx) => {
            let story = text[..idx].trim().to_string();
            let caption = text[idx + CAPTION_MARKER.len()..].trim().to_string();
            (story, caption)
        }
        None => (text.to_string(), String::new()),
    }
}

/// Best-effort recovery of bare URLs from caption text. Recovered URLs are
/// not validated as images.
pub fn scan_caption_urls(caption: &str) -> Vec<String> {
    caption
        .split_whitespace()
        .filter_map(|token| {
            token
                .find("http://")
                .or_else(|| token.find("https://"))
                .map(|idx| token[idx..].to_string())
        })
        .collect()
}

fn dedup_preserving_order(urls: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    urls.into_iter().filter(|u| seen.insert(u.clone())).collect()
}
