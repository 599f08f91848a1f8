//! chatstream - streaming chat client
//!
//! Sends a user message to a generation backend and consumes the reply as an
//! event stream, delivering the growing text incrementally.
//!
//! # Architecture
//!
//! - `streaming`: byte decoding, frame parsing, event dispatch, stream handles
//! - `types`: messages, session targets, caller-side conversation state
//! - `history`, `auth`: authoritative history and bearer tokens
//! - `config`, `cli`, `logging`, `repl`: the `chatstream` binary's surface

pub mod auth;
pub mod cli;
pub mod config;
pub mod errors;
pub mod history;
pub mod logging;
pub mod repl;
pub mod streaming;
pub mod types;

// Re-export commonly used types
pub use errors::{ChatError, Result};
pub use streaming::{
    ConcurrencyPolicy, Notification, StreamHandle, StreamOutcome, StreamState,
    StreamingChatClient,
};
pub use types::{ChatMessage, Conversation, SessionTarget};
