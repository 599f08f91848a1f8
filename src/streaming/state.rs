//! Stream lifecycle state machine
//!
//! One `StreamSession` exists per `send`. Its state only moves forward:
//!
//! ```text
//! Idle       → Connecting  (on: RequestIssued)
//! Connecting → Streaming   (on: FirstChunk)
//! Connecting → Errored     (on: Failure)
//! Streaming  → Streaming   (on: ChunkReceived)
//! Streaming  → Completed   (on: Finished)
//! Streaming  → Errored     (on: Failure)
//! Idle | Connecting | Streaming → Cancelled (on: Cancel)
//! Completed | Errored | Cancelled → self   (terminal)
//! ```

use crate::errors::{ChatError, Result};
use crate::types::SessionTarget;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Instant;
use uuid::Uuid;

/// Stream execution states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamState {
    /// Created, request not yet issued
    Idle,

    /// Request issued, waiting for the first body bytes
    Connecting,

    /// Body bytes are arriving
    Streaming,

    /// Finished normally (terminal)
    Completed,

    /// Failed (terminal)
    Errored,

    /// Stopped by the caller (terminal)
    Cancelled,
}

/// Events that drive state transitions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamTrigger {
    RequestIssued,
    FirstChunk,
    ChunkReceived,
    Finished,
    Failure,
    Cancel,
}

impl StreamState {
    /// Check if this is a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            StreamState::Completed | StreamState::Errored | StreamState::Cancelled
        )
    }

    /// Attempt a state transition
    pub fn transition(&self, trigger: StreamTrigger) -> Result<StreamState> {
        use StreamState::*;
        use StreamTrigger::*;

        let next = match (self, trigger) {
            // Terminal states absorb everything
            (Completed, _) => Completed,
            (Errored, _) => Errored,
            (Cancelled, _) => Cancelled,

            (Idle | Connecting | Streaming, Cancel) => Cancelled,

            (Idle, RequestIssued) => Connecting,

            (Connecting, FirstChunk) => Streaming,
            (Connecting, Failure) => Errored,

            (Streaming, ChunkReceived) => Streaming,
            (Streaming, Finished) => Completed,
            (Streaming, Failure) => Errored,

            (from, trigger) => {
                return Err(ChatError::InvalidTransition {
                    from: format!("{:?}", from),
                    to: format!("{:?}", trigger),
                    reason: format!("No valid transition from {:?} on {:?}", from, trigger),
                });
            }
        };

        Ok(next)
    }

    /// Human-readable state name
    pub fn display_name(&self) -> &'static str {
        match self {
            StreamState::Idle => "idle",
            StreamState::Connecting => "connecting",
            StreamState::Streaming => "streaming",
            StreamState::Completed => "completed",
            StreamState::Errored => "errored",
            StreamState::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for StreamState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Ephemeral state of one streamed request
#[derive(Debug)]
pub struct StreamSession {
    request_id: Uuid,
    target: SessionTarget,
    state: StreamState,
    buffer: String,
    bytes_received: usize,
    frames_parsed: usize,
    deltas_emitted: usize,
    started_at: Instant,
}

impl StreamSession {
    pub fn new(request_id: Uuid, target: SessionTarget) -> Self {
        Self {
            request_id,
            target,
            state: StreamState::Idle,
            buffer: String::new(),
            bytes_received: 0,
            frames_parsed: 0,
            deltas_emitted: 0,
            started_at: Instant::now(),
        }
    }

    /// Apply a trigger and return the resulting state
    pub fn apply(&mut self, trigger: StreamTrigger) -> Result<StreamState> {
        let next = self.state.transition(trigger)?;
        if next != self.state {
            tracing::debug!(
                request_id = %self.request_id,
                from = %self.state,
                to = %next,
                "stream state transition"
            );
        }
        self.state = next;
        Ok(next)
    }

    /// Append a text delta and return the cumulative content
    ///
    /// Only a streaming session accepts text.
    pub fn append(&mut self, delta: &str) -> Result<&str> {
        if self.state != StreamState::Streaming {
            return Err(ChatError::InvalidTransition {
                from: format!("{:?}", self.state),
                to: "append".to_string(),
                reason: "content only grows while streaming".to_string(),
            });
        }
        self.buffer.push_str(delta);
        Ok(&self.buffer)
    }

    pub fn record_bytes(&mut self, len: usize) {
        self.bytes_received += len;
    }

    pub fn record_frame(&mut self) {
        self.frames_parsed += 1;
    }

    pub fn record_delta(&mut self) {
        self.deltas_emitted += 1;
    }

    pub fn request_id(&self) -> Uuid {
        self.request_id
    }

    pub fn target(&self) -> &SessionTarget {
        &self.target
    }

    pub fn state(&self) -> StreamState {
        self.state
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    pub fn bytes_received(&self) -> usize {
        self.bytes_received
    }

    pub fn frames_parsed(&self) -> usize {
        self.frames_parsed
    }

    pub fn deltas_emitted(&self) -> usize {
        self.deltas_emitted
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.started_at.elapsed().as_millis() as u64
    }
}
