//! Shared test helpers: an in-memory transport with scripted bodies

#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use chatstream::streaming::{ByteStream, StreamRequest, Transport};
use chatstream::{ChatError, Notification, Result, StreamHandle};
use futures_util::{stream, StreamExt};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// What one `open` call returns
pub enum Body {
    /// These chunks, then end of body
    Chunks(Vec<Bytes>),
    /// Chunks pushed by the test through a `Feed`
    Fed(mpsc::UnboundedReceiver<Result<Bytes>>),
    /// `open` itself fails
    OpenError(ChatError),
}

/// Sender side of a fed body; dropping it ends the body
pub struct Feed(mpsc::UnboundedSender<Result<Bytes>>);

impl Feed {
    pub fn push(&self, text: &str) {
        let _ = self.0.send(Ok(Bytes::copy_from_slice(text.as_bytes())));
    }

    pub fn push_bytes(&self, bytes: &[u8]) {
        let _ = self.0.send(Ok(Bytes::copy_from_slice(bytes)));
    }

    pub fn fail(&self, err: ChatError) {
        let _ = self.0.send(Err(err));
    }
}

/// What the transport observed
#[derive(Default)]
pub struct Probe {
    pub opened: AtomicUsize,
    pub bodies_dropped: AtomicUsize,
    pub requests: Mutex<Vec<StreamRequest>>,
    pub tokens: Mutex<Vec<CancellationToken>>,
}

impl Probe {
    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn bodies_dropped(&self) -> usize {
        self.bodies_dropped.load(Ordering::SeqCst)
    }

    pub fn last_token(&self) -> Option<CancellationToken> {
        self.tokens.lock().unwrap().last().cloned()
    }

    pub fn requests(&self) -> Vec<StreamRequest> {
        self.requests.lock().unwrap().clone()
    }
}

struct DropFlag {
    probe: Arc<Probe>,
    dropped: AtomicBool,
}

impl Drop for DropFlag {
    fn drop(&mut self) {
        if !self.dropped.swap(true, Ordering::SeqCst) {
            self.probe.bodies_dropped.fetch_add(1, Ordering::SeqCst);
        }
    }
}

/// Transport serving scripted bodies in order
pub struct ScriptedTransport {
    bodies: Mutex<VecDeque<Body>>,
    probe: Arc<Probe>,
}

impl ScriptedTransport {
    pub fn new(bodies: Vec<Body>) -> Self {
        Self {
            bodies: Mutex::new(bodies.into()),
            probe: Arc::new(Probe::default()),
        }
    }

    /// Single body made of these text chunks
    pub fn chunks(chunks: &[&str]) -> Self {
        Self::raw(chunks.iter().map(|c| c.as_bytes().to_vec()).collect())
    }

    /// Single body made of these byte chunks
    pub fn raw(chunks: Vec<Vec<u8>>) -> Self {
        Self::new(vec![Body::Chunks(chunks.into_iter().map(Bytes::from).collect())])
    }

    /// Single body fed by the returned `Feed`
    pub fn fed() -> (Self, Feed) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(vec![Body::Fed(rx)]), Feed(tx))
    }

    pub fn probe(&self) -> Arc<Probe> {
        Arc::clone(&self.probe)
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn open(&self, request: &StreamRequest, cancel: CancellationToken) -> Result<ByteStream> {
        self.probe.opened.fetch_add(1, Ordering::SeqCst);
        self.probe.requests.lock().unwrap().push(request.clone());
        self.probe.tokens.lock().unwrap().push(cancel);

        let body = self
            .bodies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Body::Chunks(Vec::new()));

        let guard = DropFlag {
            probe: Arc::clone(&self.probe),
            dropped: AtomicBool::new(false),
        };

        let items: ByteStream = match body {
            Body::Chunks(chunks) => {
                Box::pin(stream::iter(chunks.into_iter().map(Ok::<Bytes, ChatError>)))
            }
            Body::Fed(rx) => Box::pin(stream::unfold(rx, |mut rx| async move {
                rx.recv().await.map(|item| (item, rx))
            })),
            Body::OpenError(err) => return Err(err),
        };

        Ok(Box::pin(items.map(move |item| {
            let _keep = &guard;
            item
        })))
    }
}

/// Drain a handle with a timeout so a stuck stream fails the test
pub async fn drain(handle: &mut StreamHandle) -> Vec<Notification> {
    let mut seen = Vec::new();
    loop {
        match tokio::time::timeout(Duration::from_secs(5), handle.next()).await {
            Ok(Some(notification)) => seen.push(notification),
            Ok(None) => return seen,
            Err(_) => panic!("stream did not finish; saw {:?}", seen),
        }
    }
}

/// Contents of the delta notifications, in order
pub fn deltas(notifications: &[Notification]) -> Vec<String> {
    notifications
        .iter()
        .filter_map(|n| match n {
            Notification::Delta { content } => Some(content.clone()),
            _ => None,
        })
        .collect()
}

/// Wait until `check` holds, polling briefly
pub async fn eventually(mut check: impl FnMut() -> bool) -> bool {
    for _ in 0..200 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    check()
}
