//! Message types for chat sessions
//!
//! Defines the messages exchanged with the generation backend and the
//! session/task identifiers a stream is addressed to.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use uuid::Uuid;

/// Prefix marking client-minted message ids
const TEMPORARY_PREFIX: &str = "tmp-";

/// Author of a chat message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// Message identifier
///
/// A message shown before the server has recorded it carries a temporary id;
/// reconciliation with the server history replaces it with the server's id.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MessageId {
    /// Minted locally for an optimistic message
    Temporary(Uuid),

    /// Assigned by the backend
    Server(String),
}

impl MessageId {
    /// Mint a fresh temporary id
    pub fn temporary() -> Self {
        MessageId::Temporary(Uuid::new_v4())
    }

    /// Check whether this id was minted locally
    pub fn is_temporary(&self) -> bool {
        matches!(self, MessageId::Temporary(_))
    }

    fn parse(raw: String) -> Self {
        if let Some(rest) = raw.strip_prefix(TEMPORARY_PREFIX) {
            if let Ok(uuid) = Uuid::parse_str(rest) {
                return MessageId::Temporary(uuid);
            }
        }
        MessageId::Server(raw)
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageId::Temporary(uuid) => write!(f, "{}{}", TEMPORARY_PREFIX, uuid),
            MessageId::Server(id) => f.write_str(id),
        }
    }
}

impl Serialize for MessageId {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for MessageId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        // Backends hand out both numeric and string ids
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawId {
            Text(String),
            Number(i64),
        }

        Ok(match RawId::deserialize(deserializer)? {
            RawId::Text(text) => MessageId::parse(text),
            RawId::Number(number) => MessageId::Server(number.to_string()),
        })
    }
}

/// A single chat message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: MessageId,
    pub role: Role,
    #[serde(default)]
    pub content: String,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl ChatMessage {
    /// Optimistic user message with a temporary id
    pub fn user(content: impl Into<String>) -> Self {
        Self::optimistic(Role::User, content.into())
    }

    /// Optimistic assistant message with a temporary id
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::optimistic(Role::Assistant, content.into())
    }

    fn optimistic(role: Role, content: String) -> Self {
        Self {
            id: MessageId::temporary(),
            role,
            content,
            created_at: Utc::now(),
        }
    }

    /// Check whether the server has not recorded this message yet
    pub fn is_temporary(&self) -> bool {
        self.id.is_temporary()
    }
}

/// Conversation context a stream is addressed to
///
/// Knowledge-base chat is keyed by session; the database-design assistant is
/// keyed by task. Each posts to its own endpoint with its own body shape.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SessionTarget {
    Session(String),
    Task(String),
}

impl SessionTarget {
    /// Raw identifier
    pub fn id(&self) -> &str {
        match self {
            SessionTarget::Session(id) | SessionTarget::Task(id) => id,
        }
    }

    /// Check whether this is the task-scoped variant
    pub fn is_task(&self) -> bool {
        matches!(self, SessionTarget::Task(_))
    }
}

impl fmt::Display for SessionTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionTarget::Session(id) => write!(f, "session {}", id),
            SessionTarget::Task(id) => write!(f, "task {}", id),
        }
    }
}
