//! Incremental event-stream frame parser
//!
//! Splits decoded text into frames. A frame is a run of `field: value` lines
//! terminated by a blank line:
//!
//! ```text
//! event: chunk
//! data: Hello
//!
//! ```
//!
//! Lines are accepted with `\n` or `\r\n` endings and may be split across any
//! number of `push` calls.

use crate::errors::{ChatError, Result};

/// Maximum size of an unterminated line or frame (1MB)
pub const MAX_BUFFER_SIZE: usize = 1_048_576;

/// One parsed frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Value of the `event:` line, if the frame had one
    pub event: Option<String>,

    /// All `data:` lines joined with `\n`, if the frame had any
    pub data: Option<String>,
}

impl Frame {
    /// Data payload, empty when the frame carried none
    pub fn payload(&self) -> &str {
        self.data.as_deref().unwrap_or("")
    }
}

/// Fields collected for the frame being read
#[derive(Debug, Default)]
struct PartialFrame {
    event: Option<String>,
    data: Vec<String>,
    data_len: usize,
}

impl PartialFrame {
    fn is_empty(&self) -> bool {
        self.event.is_none() && self.data.is_empty()
    }
}

/// Incremental frame parser
#[derive(Debug)]
pub struct FrameParser {
    /// Text after the last complete line
    buffer: String,

    /// Frame under construction
    current: PartialFrame,

    /// Maximum buffered bytes
    max_buffer_size: usize,
}

impl FrameParser {
    /// Create parser with default settings
    pub fn new() -> Self {
        Self::with_capacity(MAX_BUFFER_SIZE)
    }

    /// Create parser with custom buffer cap
    pub fn with_capacity(max_buffer_size: usize) -> Self {
        Self {
            buffer: String::with_capacity(4096),
            current: PartialFrame::default(),
            max_buffer_size,
        }
    }

    /// Feed decoded text and collect every frame it completes
    pub fn push(&mut self, text: &str) -> Result<Vec<Frame>> {
        self.buffer.push_str(text);

        let buffer = std::mem::take(&mut self.buffer);
        let mut rest = buffer.as_str();
        let mut frames = Vec::new();

        while let Some(pos) = rest.find('\n') {
            let line = &rest[..pos];
            rest = &rest[pos + 1..];
            let line = line.strip_suffix('\r').unwrap_or(line);
            if let Some(frame) = self.process_line(line) {
                frames.push(frame);
            }
        }

        self.buffer = rest.to_string();
        self.check_overflow()?;

        Ok(frames)
    }

    /// Flush at end of stream
    ///
    /// A final line without a newline and a frame without its closing blank
    /// line are still delivered.
    pub fn finish(&mut self) -> Option<Frame> {
        let tail = std::mem::take(&mut self.buffer);
        let tail = tail.strip_suffix('\r').unwrap_or(&tail);
        if !tail.is_empty() {
            if let Some(frame) = self.process_line(tail) {
                return Some(frame);
            }
        }
        self.take_frame()
    }

    /// Handle one complete line, returning a frame when the line ends one
    fn process_line(&mut self, line: &str) -> Option<Frame> {
        if line.is_empty() {
            return self.take_frame();
        }

        // Comment or keep-alive
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        match field {
            "event" => self.current.event = Some(value.to_string()),
            "data" => {
                self.current.data_len += value.len();
                self.current.data.push(value.to_string());
            }
            other => tracing::trace!(field = other, "ignoring event-stream field"),
        }

        None
    }

    fn take_frame(&mut self) -> Option<Frame> {
        let partial = std::mem::take(&mut self.current);
        if partial.is_empty() {
            return None;
        }

        let data = if partial.data.is_empty() {
            None
        } else {
            Some(partial.data.join("\n"))
        };

        Some(Frame {
            event: partial.event,
            data,
        })
    }

    fn check_overflow(&self) -> Result<()> {
        let buffered = self.buffer.len() + self.current.data_len;
        if buffered > self.max_buffer_size {
            return Err(ChatError::StreamDecode(format!(
                "Buffer overflow: {} bytes exceeds maximum {}",
                buffered, self.max_buffer_size
            )));
        }
        Ok(())
    }

    /// Check if nothing is buffered
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty() && self.current.is_empty()
    }
}

impl Default for FrameParser {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(event: Option<&str>, data: Option<&str>) -> Frame {
        Frame {
            event: event.map(str::to_string),
            data: data.map(str::to_string),
        }
    }

    #[test]
    fn test_single_frame() {
        let mut parser = FrameParser::new();
        let frames = parser.push("event: chunk\ndata: Hello\n\n").unwrap();
        assert_eq!(frames, vec![frame(Some("chunk"), Some("Hello"))]);
        assert!(parser.is_empty());
    }

    #[test]
    fn test_only_one_leading_space_stripped() {
        let mut parser = FrameParser::new();
        let frames = parser.push("data:  world\n\n").unwrap();
        assert_eq!(frames[0].payload(), " world");

        let frames = parser.push("data:tight\n\n").unwrap();
        assert_eq!(frames[0].payload(), "tight");
    }

    #[test]
    fn test_incremental_frame() {
        let mut parser = FrameParser::new();

        assert!(parser.push("event: ch").unwrap().is_empty());
        assert!(parser.push("unk\nda").unwrap().is_empty());
        assert!(parser.push("ta: Hel").unwrap().is_empty());
        let frames = parser.push("lo\n\n").unwrap();

        assert_eq!(frames, vec![frame(Some("chunk"), Some("Hello"))]);
    }

    #[test]
    fn test_multiple_frames_in_one_push() {
        let mut parser = FrameParser::new();
        let frames = parser
            .push("event: start\ndata: \n\nevent: chunk\ndata: a\n\nevent: end\n\n")
            .unwrap();

        assert_eq!(
            frames,
            vec![
                frame(Some("start"), Some("")),
                frame(Some("chunk"), Some("a")),
                frame(Some("end"), None),
            ]
        );
    }

    #[test]
    fn test_multiline_data_joined() {
        let mut parser = FrameParser::new();
        let frames = parser.push("data: line one\ndata: line two\n\n").unwrap();
        assert_eq!(frames, vec![frame(None, Some("line one\nline two"))]);
    }

    #[test]
    fn test_crlf_line_endings() {
        let mut parser = FrameParser::new();
        let frames = parser.push("event: chunk\r\ndata: hi\r\n\r\n").unwrap();
        assert_eq!(frames, vec![frame(Some("chunk"), Some("hi"))]);
    }

    #[test]
    fn test_crlf_split_between_pushes() {
        let mut parser = FrameParser::new();
        assert!(parser.push("data: hi\r").unwrap().is_empty());
        assert!(parser.push("\n\r").unwrap().is_empty());
        let frames = parser.push("\n").unwrap();
        assert_eq!(frames, vec![frame(None, Some("hi"))]);
    }

    #[test]
    fn test_comments_and_empty_frames_skipped() {
        let mut parser = FrameParser::new();
        let frames = parser
            .push(": keep-alive\n\n\n\nid: 7\nretry: 100\n\ndata: x\n\n")
            .unwrap();
        assert_eq!(frames, vec![frame(None, Some("x"))]);
    }

    #[test]
    fn test_field_without_colon() {
        let mut parser = FrameParser::new();
        let frames = parser.push("data\n\n").unwrap();
        assert_eq!(frames, vec![frame(None, Some(""))]);
    }

    #[test]
    fn test_finish_flushes_unterminated_frame() {
        let mut parser = FrameParser::new();
        assert!(parser.push("event: done\ndata: {}").unwrap().is_empty());

        let last = parser.finish();
        assert_eq!(last, Some(frame(Some("done"), Some("{}"))));
        assert!(parser.is_empty());
        assert_eq!(parser.finish(), None);
    }

    #[test]
    fn test_buffer_overflow() {
        let mut parser = FrameParser::with_capacity(100);
        let long_line = "a".repeat(150);
        let result = parser.push(&long_line);
        assert!(matches!(result, Err(ChatError::StreamDecode(_))));
    }}
