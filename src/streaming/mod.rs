//! Streaming client module
//!
//! Turns an event-stream response body into reply notifications:
//! bytes → `decoder` → text → `parser` → frames → `event` → `client` dispatch.

pub mod client;
pub mod decoder;
pub mod event;
pub mod handle;
pub mod parser;
pub mod state;
pub mod transport;

// Re-export commonly used types
pub use client::{validate_message, ConcurrencyPolicy, StreamingChatClient};
pub use decoder::Utf8Decoder;
pub use event::{EventKind, EventMap, StreamEvent};
pub use handle::{Notification, StreamHandle, StreamOutcome};
pub use parser::{Frame, FrameParser, MAX_BUFFER_SIZE};
pub use state::{StreamSession, StreamState, StreamTrigger};
pub use transport::{
    ByteStream, Endpoints, HttpTransport, StreamRequest, Transport, DEFAULT_BASE_URL,
};
