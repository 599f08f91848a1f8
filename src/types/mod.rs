//! Type definitions module
//!
//! Message, session and conversation types shared by the client and callers.

pub mod conversation;
pub mod messages;

// Re-export commonly used types
pub use conversation::Conversation;
pub use messages::{ChatMessage, MessageId, Role, SessionTarget};
