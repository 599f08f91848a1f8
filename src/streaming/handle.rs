//! Caller-facing handle of one streamed reply

use super::state::{StreamState, StreamTrigger};
use crate::errors::ChatError;
use crate::types::SessionTarget;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// What the dispatch loop tells the caller
#[derive(Debug)]
pub enum Notification {
    /// Reply grew; `content` is everything received so far
    Delta { content: String },

    /// Reply finished, with the server's metadata if it sent any
    Completed { metadata: Option<Value> },

    /// Reply failed; partial content from earlier deltas stays valid
    Failed(ChatError),
}

impl Notification {
    /// Check if no notification can follow this one
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Notification::Delta { .. })
    }
}

/// Final result of a drained stream
#[derive(Debug)]
pub struct StreamOutcome {
    pub content: String,
    pub state: StreamState,
    pub metadata: Option<Value>,
    pub error: Option<ChatError>,
}

impl StreamOutcome {
    pub fn is_success(&self) -> bool {
        self.state == StreamState::Completed
    }
}

/// Mark a shared state cancelled unless it already reached a terminal state
pub(crate) fn mark_cancelled(state: &watch::Sender<StreamState>) -> bool {
    state.send_if_modified(|current| match current.transition(StreamTrigger::Cancel) {
        Ok(next) if next != *current => {
            *current = next;
            true
        }
        _ => false,
    })
}

/// Handle to an in-flight stream
///
/// Dropping the handle cancels the stream.
#[derive(Debug)]
pub struct StreamHandle {
    request_id: Uuid,
    target: SessionTarget,
    notifications: mpsc::UnboundedReceiver<Notification>,
    state: Arc<watch::Sender<StreamState>>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
    finished: bool,
}

impl StreamHandle {
    pub(crate) fn new(
        request_id: Uuid,
        target: SessionTarget,
        notifications: mpsc::UnboundedReceiver<Notification>,
        state: Arc<watch::Sender<StreamState>>,
        cancel: CancellationToken,
        task: JoinHandle<()>,
    ) -> Self {
        Self {
            request_id,
            target,
            notifications,
            state,
            cancel,
            task: Some(task),
            finished: false,
        }
    }

    pub fn request_id(&self) -> Uuid {
        self.request_id
    }

    pub fn target(&self) -> &SessionTarget {
        &self.target
    }

    /// Current lifecycle state
    pub fn state(&self) -> StreamState {
        *self.state.borrow()
    }

    /// Check if the stream was cancelled by this handle, the client or the
    /// caller's parent token
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Next notification in stream order
    ///
    /// Returns `None` after the terminal notification, or as soon as the
    /// stream is cancelled, even if notifications were still queued.
    pub async fn next(&mut self) -> Option<Notification> {
        if self.finished || self.cancel.is_cancelled() {
            return None;
        }

        let notification = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => None,
            received = self.notifications.recv() => received,
        };

        if self.cancel.is_cancelled() {
            return None;
        }

        match notification {
            Some(notification) => {
                if notification.is_terminal() {
                    self.finished = true;
                }
                Some(notification)
            }
            None => {
                self.finished = true;
                None
            }
        }
    }

    /// Stop the stream
    ///
    /// Idempotent. Nothing is delivered after this returns and the dispatch
    /// task drops the response body, aborting the request.
    pub fn cancel(&self) {
        if mark_cancelled(&self.state) {
            tracing::debug!(request_id = %self.request_id, "stream cancelled by caller");
        }
        self.cancel.cancel();
    }

    /// Wait for the dispatch task to exit
    ///
    /// Once this returns the transport has been released.
    pub async fn join(mut self) {
        if let Some(task) = self.task.take() {
            if let Err(err) = task.await {
                tracing::warn!(request_id = %self.request_id, error = %err, "stream task failed");
            }
        }
    }

    /// Drain the stream and summarise it
    pub async fn collect(mut self) -> StreamOutcome {
        let mut content = String::new();
        let mut metadata = None;
        let mut error = None;

        while let Some(notification) = self.next().await {
            match notification {
                Notification::Delta { content: so_far } => content = so_far,
                Notification::Completed { metadata: meta } => metadata = meta,
                Notification::Failed(err) => error = Some(err),
            }
        }

        StreamOutcome {
            content,
            state: self.state(),
            metadata,
            error,
        }
    }
}

impl Drop for StreamHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}
