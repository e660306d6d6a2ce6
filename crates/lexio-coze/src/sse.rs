use std::collections::VecDeque;
use std::pin::Pin;

use futures::{Stream, StreamExt};
use reqwest::Response;

use crate::error::{CozeError, Result};

/// One decoded SSE unit: an event name plus its data payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub event: String,
    pub data: String,
}

/// Line buffer for incremental parsing of a chunked byte stream.
/// Uses VecDeque for zero-copy line extraction.
pub struct LineBuffer {
    buffer: VecDeque<u8>,
}

impl LineBuffer {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: VecDeque::with_capacity(capacity),
        }
    }

    /// Add bytes to the buffer
    pub fn extend(&mut self, bytes: &[u8]) {
        self.buffer.extend(bytes);
    }

    /// Extract the next line (up to \n), trimmed. Blank lines are returned
    /// as empty strings since they delimit frames.
    pub fn next_line(&mut self) -> Option<String> {
        let newline_pos = self.buffer.iter().position(|&b| b == b'\n')?;
        let line_bytes: Vec<u8> = self.buffer.drain(..=newline_pos).collect();
        Some(String::from_utf8_lossy(&line_bytes).trim().to_string())
    }

    /// Drain whatever is left after the last newline (end of stream).
    pub fn take_remainder(&mut self) -> Option<String> {
        if self.buffer.is_empty() {
            return None;
        }
        let bytes: Vec<u8> = self.buffer.drain(..).collect();
        let line = String::from_utf8_lossy(&bytes).trim().to_string();
        (!line.is_empty()).then_some(line)
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}

/// Incremental `event:`/`data:` frame decoder.
///
/// Feed trimmed lines one at a time; a frame is emitted when a blank line
/// closes it, when a new `event:` line starts the next one while data is
/// pending, or when `finish` flushes the tail at end of input.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    event: Option<String>,
    data: Vec<String>,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn feed_line(&mut self, line: &str) -> Option<Frame> {
        if line.is_empty() {
            return self.take_pending();
        }
        if let Some(name) = line.strip_prefix("event:") {
            // A new event name ends the previous frame if it carried data.
            let flushed = if self.data.is_empty() {
                None
            } else {
                self.take_pending()
            };
            self.event = Some(name.trim().to_string());
            return flushed;
        }
        if let Some(fragment) = line.strip_prefix("data:") {
            self.data.push(fragment.trim().to_string());
            return None;
        }
        // Unknown SSE fields (id:, retry:, comments) are ignored.
        None
    }

    /// Flush-on-close: emit any pending frame at end of input.
    pub fn finish(&mut self) -> Option<Frame> {
        self.take_pending()
    }

    fn take_pending(&mut self) -> Option<Frame> {
        let event = self.event.take().unwrap_or_default();
        let data = std::mem::take(&mut self.data).join("\n");
        if event.is_empty() || data.is_empty() {
            return None;
        }
        Some(Frame { event, data })
    }
}

/// Decode an HTTP response body into a stream of frames.
pub fn frame_stream(response: Response) -> Pin<Box<dyn Stream<Item = Result<Frame>> + Send>> {
    let stream = response.bytes_stream();

    Box::pin(async_stream::stream! {
        let mut byte_chunks = Box::pin(stream);
        let mut buffer = LineBuffer::with_capacity(8192);
        let mut decoder = FrameDecoder::new();

        while let Some(chunk_result) = byte_chunks.next().await {
            match chunk_result {
                Ok(bytes) => {
                    buffer.extend(&bytes);
                    while let Some(line) = buffer.next_line() {
                        if let Some(frame) = decoder.feed_line(&line) {
                            yield Ok(frame);
                        }
                    }
                }
                Err(e) => {
                    yield Err(CozeError::Transport(e));
                    return;
                }
            }
        }

        // A final line without a trailing newline still counts.
        if let Some(line) = buffer.take_remainder() {
            if let Some(frame) = decoder.feed_line(&line) {
                yield Ok(frame);
            }
        }
        if let Some(frame) = decoder.finish() {
            yield Ok(frame);
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_buffer_basic() {
        let mut buffer = LineBuffer::with_capacity(64);

        buffer.extend(b"line1\nline2\n");

        assert_eq!(buffer.next_line().unwrap(), "line1");
        assert_eq!(buffer.next_line().unwrap(), "line2");
        assert!(buffer.next_line().is_none());
    }

    #[test]
    fn test_line_buffer_partial_line() {
        let mut buffer = LineBuffer::with_capacity(64);

        buffer.extend(b"partial");
        assert!(buffer.next_line().is_none());

        buffer.extend(b" line\n");
        assert_eq!(buffer.next_line().unwrap(), "partial line");
    }

    #[test]
    fn test_line_buffer_keeps_blank_lines() {
        let mut buffer = LineBuffer::with_capacity(64);

        buffer.extend(b"data: x\n\ndata: y\n");

        assert_eq!(buffer.next_line().unwrap(), "data: x");
        assert_eq!(buffer.next_line().unwrap(), "");
        assert_eq!(buffer.next_line().unwrap(), "data: y");
    }

    #[test]
    fn test_line_buffer_remainder() {
        let mut buffer = LineBuffer::with_capacity(64);

        buffer.extend(b"data: tail");
        assert!(buffer.next_line().is_none());
        assert_eq!(buffer.take_remainder().unwrap(), "data: tail");
        assert!(buffer.is_empty());
    }
}
