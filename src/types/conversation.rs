//! Caller-side conversation state
//!
//! Models the optimistic chat view: the user's message and the growing reply
//! are shown under temporary ids while the stream is open, then the whole list
//! is replaced by the server's history once the exchange is over.

use super::messages::{ChatMessage, MessageId, SessionTarget};
use crate::errors::{ChatError, Result};
use crate::streaming::{validate_message, Notification};

/// The exchange whose reply is still streaming
#[derive(Debug, Clone, PartialEq)]
struct PendingExchange {
    /// Index of the assistant message, once the first delta arrived
    assistant_index: Option<usize>,
}

/// Ordered messages of one session or task
#[derive(Debug, Clone)]
pub struct Conversation {
    target: SessionTarget,
    messages: Vec<ChatMessage>,
    pending: Option<PendingExchange>,
    last_error: Option<String>,
}

impl Conversation {
    pub fn new(target: SessionTarget) -> Self {
        Self {
            target,
            messages: Vec::new(),
            pending: None,
            last_error: None,
        }
    }

    /// Append the user's message and open an exchange for the reply
    pub fn begin(&mut self, text: &str) -> Result<MessageId> {
        validate_message(text)?;
        if self.pending.is_some() {
            return Err(ChatError::ConcurrentStream {
                target: self.target.to_string(),
            });
        }

        let message = ChatMessage::user(text);
        let user_id = message.id.clone();
        self.messages.push(message);
        self.pending = Some(PendingExchange { assistant_index: None });
        self.last_error = None;

        Ok(user_id)
    }

    /// Fold a stream notification into the message list
    pub fn apply(&mut self, notification: &Notification) -> Result<()> {
        let pending = self
            .pending
            .as_mut()
            .ok_or_else(|| ChatError::Generic("no exchange in progress".to_string()))?;

        match notification {
            Notification::Delta { content } => match pending.assistant_index {
                None => {
                    pending.assistant_index = Some(self.messages.len());
                    self.messages.push(ChatMessage::assistant(content.clone()));
                }
                Some(index) => {
                    let message = &mut self.messages[index];
                    if !content.starts_with(&message.content) {
                        return Err(ChatError::Generic(
                            "reply content must only grow while streaming".to_string(),
                        ));
                    }
                    message.content.clone_from(content);
                }
            },
            Notification::Completed { .. } => {
                self.pending = None;
            }
            Notification::Failed(err) => {
                self.last_error = Some(err.reason());
                self.pending = None;
            }
        }

        Ok(())
    }

    /// Close the exchange after the caller cancelled its stream
    ///
    /// Partial reply content is kept.
    pub fn abandon(&mut self) {
        self.pending = None;
    }

    /// Replace local messages with the server's history
    ///
    /// Returns how many temporary messages were superseded.
    pub fn reconcile(&mut self, history: Vec<ChatMessage>) -> Result<usize> {
        if self.pending.is_some() {
            return Err(ChatError::ConcurrentStream {
                target: self.target.to_string(),
            });
        }

        let superseded = self.messages.iter().filter(|m| m.is_temporary()).count();
        self.messages = history;
        Ok(superseded)
    }

    pub fn target(&self) -> &SessionTarget {
        &self.target
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Reason of the last failed exchange, cleared by the next `begin`
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Most recent message
    pub fn last(&self) -> Option<&ChatMessage> {
        self.messages.last()
    }
}
