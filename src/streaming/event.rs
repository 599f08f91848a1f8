//! Event classification
//!
//! Maps the `event:` type of a frame to the action the dispatch loop takes.
//! The mapping is data, so screens whose backend names things differently can
//! alias their own event names without another copy of the loop.

use super::parser::Frame;
use serde_json::Value;
use std::collections::HashMap;

/// Message used when an `error` frame carries no text
const UNSPECIFIED_ERROR: &str = "The server reported an error without a message";

/// What a frame means to the dispatch loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// Generation started; no payload semantics
    Start,

    /// Text delta to append
    Chunk,

    /// Generation finished, optional JSON metadata
    Done,

    /// Server-side failure with a message
    Error,

    /// Explicit end-of-stream marker
    End,

    /// Unknown type, consumed and ignored
    Ignore,
}

impl EventKind {
    /// Parse a kind name as used in configuration files
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "start" => Some(EventKind::Start),
            "chunk" => Some(EventKind::Chunk),
            "done" => Some(EventKind::Done),
            "error" => Some(EventKind::Error),
            "end" => Some(EventKind::End),
            "ignore" => Some(EventKind::Ignore),
            _ => None,
        }
    }
}

/// Event-type to action mapping
#[derive(Debug, Clone)]
pub struct EventMap {
    kinds: HashMap<String, EventKind>,
}

impl EventMap {
    /// Map with no named types; every labelled frame is ignored
    pub fn empty() -> Self {
        Self {
            kinds: HashMap::new(),
        }
    }

    /// Add or replace the kind for an event type
    pub fn alias(mut self, event: impl Into<String>, kind: EventKind) -> Self {
        self.kinds.insert(event.into(), kind);
        self
    }

    /// Kind for an event type; unlabelled frames are chunks
    pub fn kind_of(&self, event: Option<&str>) -> EventKind {
        match event {
            None | Some("") => EventKind::Chunk,
            Some(name) => self.kinds.get(name).copied().unwrap_or(EventKind::Ignore),
        }
    }

    /// Classify a frame into a dispatchable event
    pub fn classify(&self, frame: Frame) -> StreamEvent {
        match self.kind_of(frame.event.as_deref()) {
            EventKind::Start => StreamEvent::Start,
            EventKind::Chunk => StreamEvent::Chunk(frame.data.unwrap_or_default()),
            EventKind::Done => StreamEvent::Done(parse_metadata(frame.payload())),
            EventKind::Error => StreamEvent::Error(parse_error_message(frame.payload())),
            EventKind::End => StreamEvent::End,
            EventKind::Ignore => StreamEvent::Ignored(frame.event.unwrap_or_default()),
        }
    }
}

impl Default for EventMap {
    fn default() -> Self {
        Self::empty()
            .alias("start", EventKind::Start)
            .alias("chunk", EventKind::Chunk)
            .alias("done", EventKind::Done)
            .alias("error", EventKind::Error)
            .alias("end", EventKind::End)
    }
}

/// A classified frame
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    Start,
    Chunk(String),
    Done(Option<Value>),
    Error(String),
    End,
    Ignored(String),
}

/// `done` payload: blank is no metadata, non-JSON is kept as a string
fn parse_metadata(payload: &str) -> Option<Value> {
    let trimmed = payload.trim();
    if trimmed.is_empty() {
        return None;
    }

    Some(serde_json::from_str(trimmed).unwrap_or_else(|_| Value::String(payload.to_string())))
}

/// `error` payload: plain text, or the `message` field of a JSON object
fn parse_error_message(payload: &str) -> String {
    let trimmed = payload.trim();
    if trimmed.is_empty() {
        return UNSPECIFIED_ERROR.to_string();
    }

    if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(trimmed) {
        if let Some(message) = map.get("message").and_then(Value::as_str) {
            return message.to_string();
        }
    }

    payload.to_string()
}
