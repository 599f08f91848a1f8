//! Streaming chat client
//!
//! `send` validates the message, registers the stream for its target, and
//! spawns one task that owns the request: it opens the body, decodes bytes,
//! frames text, classifies frames, and turns them into notifications. One
//! task per stream means dispatch steps of a stream never overlap.

use super::decoder::Utf8Decoder;
use super::event::{EventMap, StreamEvent};
use super::handle::{mark_cancelled, Notification, StreamHandle};
use super::parser::{Frame, FrameParser};
use super::state::{StreamSession, StreamState, StreamTrigger};
use super::transport::{Endpoints, HttpTransport, StreamRequest, Transport};
use crate::auth::TokenProvider;
use crate::errors::{ChatError, Result};
use crate::types::SessionTarget;
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::ops::ControlFlow;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// What `send` does when the target already has an open stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConcurrencyPolicy {
    /// Refuse the new send with `ConcurrentStream`
    #[default]
    Reject,

    /// Cancel the open stream, then start the new one
    Supersede,
}

impl ConcurrencyPolicy {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "reject" => Some(ConcurrencyPolicy::Reject),
            "supersede" => Some(ConcurrencyPolicy::Supersede),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConcurrencyPolicy::Reject => "reject",
            ConcurrencyPolicy::Supersede => "supersede",
        }
    }
}

/// Registry entry for an open stream
#[derive(Debug)]
struct ActiveStream {
    request_id: Uuid,
    cancel: CancellationToken,
    state: Arc<watch::Sender<StreamState>>,
}

impl ActiveStream {
    fn is_live(&self) -> bool {
        !self.cancel.is_cancelled() && !self.state.borrow().is_terminal()
    }
}

/// Open streams keyed by target
#[derive(Debug, Default)]
struct ActiveStreams {
    streams: Mutex<HashMap<SessionTarget, ActiveStream>>,
}

impl ActiveStreams {
    fn register(
        &self,
        target: &SessionTarget,
        entry: ActiveStream,
        policy: ConcurrencyPolicy,
    ) -> Result<()> {
        let mut streams = self.streams.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(existing) = streams.get(target).filter(|s| s.is_live()) {
            match policy {
                ConcurrencyPolicy::Reject => {
                    return Err(ChatError::ConcurrentStream {
                        target: target.to_string(),
                    });
                }
                ConcurrencyPolicy::Supersede => {
                    tracing::info!(
                        target = %target,
                        superseded = %existing.request_id,
                        "cancelling open stream for new message"
                    );
                    mark_cancelled(&existing.state);
                    existing.cancel.cancel();
                }
            }
        }

        streams.insert(target.clone(), entry);
        Ok(())
    }

    /// Drop the entry if it still belongs to this request
    fn release(&self, target: &SessionTarget, request_id: Uuid) {
        let mut streams = self.streams.lock().unwrap_or_else(PoisonError::into_inner);
        if streams
            .get(target)
            .is_some_and(|s| s.request_id == request_id)
        {
            streams.remove(target);
        }
    }

    fn is_live(&self, target: &SessionTarget) -> bool {
        let streams = self.streams.lock().unwrap_or_else(PoisonError::into_inner);
        streams.get(target).is_some_and(ActiveStream::is_live)
    }
}

/// Reject empty or whitespace-only input
pub fn validate_message(message: &str) -> Result<()> {
    if message.trim().is_empty() {
        return Err(ChatError::Validation(
            "message must not be empty".to_string(),
        ));
    }
    Ok(())
}

/// Streaming chat client
#[derive(Clone)]
pub struct StreamingChatClient {
    transport: Arc<dyn Transport>,
    events: Arc<EventMap>,
    policy: ConcurrencyPolicy,
    active: Arc<ActiveStreams>,
}

impl StreamingChatClient {
    /// Create client over any transport
    pub fn new(transport: impl Transport + 'static) -> Self {
        Self::from_transport(Arc::new(transport))
    }

    /// Create client over a shared transport
    pub fn from_transport(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            events: Arc::new(EventMap::default()),
            policy: ConcurrencyPolicy::default(),
            active: Arc::new(ActiveStreams::default()),
        }
    }

    /// Create client talking HTTP to the given endpoints
    pub fn http(endpoints: Endpoints, tokens: Arc<dyn TokenProvider>) -> Result<Self> {
        Ok(Self::new(HttpTransport::new(endpoints, tokens)?))
    }

    /// Set the concurrent-send policy
    pub fn with_policy(mut self, policy: ConcurrencyPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Replace the event-type mapping
    pub fn with_event_map(mut self, events: EventMap) -> Self {
        self.events = Arc::new(events);
        self
    }

    pub fn policy(&self) -> ConcurrencyPolicy {
        self.policy
    }

    /// Check if the target has an open stream
    pub fn is_streaming(&self, target: &SessionTarget) -> bool {
        self.active.is_live(target)
    }

    /// Send a message and stream the reply
    ///
    /// Must be called inside a tokio runtime. Validation and concurrency
    /// errors are returned here; everything after the request is issued is
    /// reported through the handle.
    pub fn send(&self, target: SessionTarget, message: &str) -> Result<StreamHandle> {
        self.send_with_cancel(target, message, &CancellationToken::new())
    }

    /// Like `send`, with the stream tied to a caller-owned token
    ///
    /// Cancelling `parent` (for example from a timeout) cancels the stream.
    pub fn send_with_cancel(
        &self,
        target: SessionTarget,
        message: &str,
        parent: &CancellationToken,
    ) -> Result<StreamHandle> {
        validate_message(message)?;

        let request_id = Uuid::new_v4();
        let cancel = parent.child_token();
        let (state_tx, _) = watch::channel(StreamState::Idle);
        let state = Arc::new(state_tx);

        self.active.register(
            &target,
            ActiveStream {
                request_id,
                cancel: cancel.clone(),
                state: Arc::clone(&state),
            },
            self.policy,
        )?;

        let (tx, rx) = mpsc::unbounded_channel();
        let task = StreamTask {
            transport: Arc::clone(&self.transport),
            events: Arc::clone(&self.events),
            request: StreamRequest::new(target.clone(), message),
            session: StreamSession::new(request_id, target.clone()),
            shared: Arc::clone(&state),
            cancel: cancel.clone(),
            tx,
            registry: Arc::clone(&self.active),
        };
        let join = tokio::spawn(task.run());

        Ok(StreamHandle::new(request_id, target, rx, state, cancel, join))
    }
}

/// Everything one dispatch loop owns
struct StreamTask {
    transport: Arc<dyn Transport>,
    events: Arc<EventMap>,
    request: StreamRequest,
    session: StreamSession,
    shared: Arc<watch::Sender<StreamState>>,
    cancel: CancellationToken,
    tx: mpsc::UnboundedSender<Notification>,
    registry: Arc<ActiveStreams>,
}

impl StreamTask {
    async fn run(mut self) {
        self.drive().await;

        if !self.session.is_terminal() {
            self.advance(StreamTrigger::Cancel);
        }

        tracing::info!(
            request_id = %self.session.request_id(),
            target = %self.session.target(),
            state = %self.session.state(),
            bytes = self.session.bytes_received(),
            frames = self.session.frames_parsed(),
            deltas = self.session.deltas_emitted(),
            elapsed_ms = self.session.elapsed_ms(),
            "chat stream finished"
        );

        self.registry
            .release(self.session.target(), self.session.request_id());
    }

    /// Run until a terminal event or cancellation; the body is dropped on return
    async fn drive(&mut self) {
        self.advance(StreamTrigger::RequestIssued);

        let opened = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return,
            opened = self.transport.open(&self.request, self.cancel.clone()) => opened,
        };

        let mut body = match opened {
            Ok(body) => body,
            Err(err) => {
                self.fail(err);
                return;
            }
        };

        let mut decoder = Utf8Decoder::new();
        let mut parser = FrameParser::new();

        loop {
            let next = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return,
                next = body.next() => next,
            };

            let flow = match next {
                Some(Ok(bytes)) => self.handle_bytes(&bytes, &mut decoder, &mut parser),
                Some(Err(err)) => {
                    self.fail(err);
                    ControlFlow::Break(())
                }
                None => {
                    self.finish_body(&mut decoder, &mut parser);
                    ControlFlow::Break(())
                }
            };

            if flow.is_break() {
                return;
            }
        }
    }

    fn handle_bytes(
        &mut self,
        bytes: &[u8],
        decoder: &mut Utf8Decoder,
        parser: &mut FrameParser,
    ) -> ControlFlow<()> {
        if bytes.is_empty() {
            return ControlFlow::Continue(());
        }

        self.session.record_bytes(bytes.len());
        if self.session.state() == StreamState::Connecting {
            self.advance(StreamTrigger::FirstChunk);
        } else {
            self.advance(StreamTrigger::ChunkReceived);
        }

        let frames = match decoder.decode(bytes).and_then(|text| parser.push(&text)) {
            Ok(frames) => frames,
            Err(err) => {
                self.fail(err);
                return ControlFlow::Break(());
            }
        };

        for frame in frames {
            if self.dispatch(frame).is_break() {
                return ControlFlow::Break(());
            }
        }

        ControlFlow::Continue(())
    }

    /// End of body: flush decoder and parser, then complete if nothing ended
    /// the stream explicitly
    fn finish_body(&mut self, decoder: &mut Utf8Decoder, parser: &mut FrameParser) {
        if self.session.state() == StreamState::Connecting {
            self.fail(ChatError::transport("Response body was empty"));
            return;
        }

        if let Err(err) = decoder.finish() {
            self.fail(err);
            return;
        }

        if let Some(frame) = parser.finish() {
            if self.dispatch(frame).is_break() {
                return;
            }
        }

        tracing::debug!(request_id = %self.session.request_id(), "body ended without end marker");
        self.complete(None);
    }

    fn dispatch(&mut self, frame: Frame) -> ControlFlow<()> {
        self.session.record_frame();

        match self.events.classify(frame) {
            StreamEvent::Chunk(delta) => {
                if delta.is_empty() {
                    return ControlFlow::Continue(());
                }
                let content = match self.session.append(&delta) {
                    Ok(content) => content.to_string(),
                    Err(err) => {
                        self.fail(err);
                        return ControlFlow::Break(());
                    }
                };
                self.session.record_delta();
                self.emit(Notification::Delta { content })
            }
            StreamEvent::Done(metadata) => {
                self.complete(metadata);
                ControlFlow::Break(())
            }
            StreamEvent::Error(message) => {
                self.fail(ChatError::ServerReported(message));
                ControlFlow::Break(())
            }
            StreamEvent::End => {
                self.complete(None);
                ControlFlow::Break(())
            }
            StreamEvent::Start => {
                tracing::debug!(request_id = %self.session.request_id(), "generation started");
                ControlFlow::Continue(())
            }
            StreamEvent::Ignored(event) => {
                tracing::debug!(request_id = %self.session.request_id(), event = %event, "ignoring event");
                ControlFlow::Continue(())
            }
        }
    }

    fn complete(&mut self, metadata: Option<Value>) {
        if self.session.is_terminal() {
            return;
        }
        self.advance(StreamTrigger::Finished);
        let _ = self.emit(Notification::Completed { metadata });
    }

    fn fail(&mut self, err: ChatError) {
        if self.session.is_terminal() {
            return;
        }
        tracing::warn!(
            request_id = %self.session.request_id(),
            target = %self.session.target(),
            error = %err,
            "chat stream failed"
        );
        self.advance(StreamTrigger::Failure);
        let _ = self.emit(Notification::Failed(err));
    }

    fn advance(&mut self, trigger: StreamTrigger) {
        if let Err(err) = self.session.apply(trigger) {
            tracing::error!(request_id = %self.session.request_id(), error = %err, "unexpected stream transition");
            return;
        }
        self.publish();
    }

    /// Mirror the session state to the handle; a state the handle already
    /// finalised (cancellation) is never overwritten
    fn publish(&self) {
        let state = self.session.state();
        self.shared.send_if_modified(|current| {
            if current.is_terminal() || *current == state {
                false
            } else {
                *current = state;
                true
            }
        });
    }

    fn emit(&mut self, notification: Notification) -> ControlFlow<()> {
        if self.cancel.is_cancelled() {
            return ControlFlow::Break(());
        }
        if self.tx.send(notification).is_err() {
            tracing::debug!(request_id = %self.session.request_id(), "handle dropped, stopping stream");
            self.cancel.cancel();
            return ControlFlow::Break(());
        }
        ControlFlow::Continue(())
    }
}
