//! Transport for streamed generation requests
//!
//! The dispatch loop only needs "POST this, give me the body as bytes". The
//! `Transport` trait is that seam; `HttpTransport` is the reqwest-backed one.

use crate::auth::TokenProvider;
use crate::errors::{ChatError, Result};
use crate::types::SessionTarget;
use async_trait::async_trait;
use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use reqwest::header::ACCEPT;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Default backend endpoint
pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8080";

/// Default knowledge-base chat stream path
pub const DEFAULT_SESSION_STREAM_PATH: &str = "/api/chat/stream";

/// Default database-design chat stream path
pub const DEFAULT_TASK_STREAM_PATH: &str = "/api/design/chat/stream";

/// Connect timeout; the stream itself has no deadline
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Response body as a stream of byte chunks
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes>> + Send>>;

/// One streamed generation request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamRequest {
    pub target: SessionTarget,
    pub message: String,
}

impl StreamRequest {
    pub fn new(target: SessionTarget, message: impl Into<String>) -> Self {
        Self {
            target,
            message: message.into(),
        }
    }

    /// JSON body: `{SessionId, Message}` or `{TaskId, Message}`
    pub fn body(&self) -> ChatStreamBody<'_> {
        let (session_id, task_id) = match &self.target {
            SessionTarget::Session(id) => (Some(id.as_str()), None),
            SessionTarget::Task(id) => (None, Some(id.as_str())),
        };
        ChatStreamBody {
            session_id,
            task_id,
            message: &self.message,
        }
    }
}

/// Wire body of a stream request
#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ChatStreamBody<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_id: Option<&'a str>,
    pub message: &'a str,
}

/// Opens the response body of a generation request
#[async_trait]
pub trait Transport: Send + Sync {
    /// Issue the request and return its body once the status is known to be
    /// successful
    ///
    /// `cancel` is tripped when the caller abandons the stream; the returned
    /// body must stop yielding and release its connection when it is.
    async fn open(&self, request: &StreamRequest, cancel: CancellationToken) -> Result<ByteStream>;
}

/// Backend endpoint layout
#[derive(Debug, Clone)]
pub struct Endpoints {
    pub base_url: String,
    pub session_stream_path: String,
    pub task_stream_path: String,
}

impl Endpoints {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            session_stream_path: DEFAULT_SESSION_STREAM_PATH.to_string(),
            task_stream_path: DEFAULT_TASK_STREAM_PATH.to_string(),
        }
    }

    /// Full URL for a target
    pub fn url_for(&self, target: &SessionTarget) -> String {
        let path = match target {
            SessionTarget::Session(_) => &self.session_stream_path,
            SessionTarget::Task(_) => &self.task_stream_path,
        };
        join_url(&self.base_url, path)
    }
}

impl Default for Endpoints {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL)
    }
}

/// reqwest-backed transport
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    endpoints: Endpoints,
    tokens: Arc<dyn TokenProvider>,
}

impl HttpTransport {
    /// Create transport with the default connect timeout
    pub fn new(endpoints: Endpoints, tokens: Arc<dyn TokenProvider>) -> Result<Self> {
        Self::with_connect_timeout(endpoints, tokens, CONNECT_TIMEOUT)
    }

    /// Create transport with a custom connect timeout
    pub fn with_connect_timeout(
        endpoints: Endpoints,
        tokens: Arc<dyn TokenProvider>,
        connect_timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(connect_timeout)
            .build()
            .map_err(ChatError::Http)?;

        Ok(Self {
            client,
            endpoints,
            tokens,
        })
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn open(&self, request: &StreamRequest, cancel: CancellationToken) -> Result<ByteStream> {
        let url = self.endpoints.url_for(&request.target);

        let mut builder = self
            .client
            .post(&url)
            .header(ACCEPT, "text/event-stream")
            .json(&request.body());
        if let Some(token) = self.tokens.token() {
            builder = builder.bearer_auth(token);
        }

        tracing::debug!(url = %url, target = %request.target, "opening chat stream");

        let response = builder
            .send()
            .await
            .map_err(|e| ChatError::transport(format!("Failed to send request: {}", e)))?;

        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        let stream = response
            .bytes_stream()
            .map(|result| {
                result.map_err(|e| ChatError::transport(format!("Failed to read response body: {}", e)))
            })
            .take_until(cancel.cancelled_owned());

        Ok(Box::pin(stream))
    }
}

/// Error body returned by the backend on non-2xx responses
#[derive(Debug, Deserialize)]
pub(crate) struct ApiErrorBody {
    #[serde(default)]
    pub code: Option<serde_json::Value>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Convert a failed response into a transport error
pub(crate) async fn error_from_response(response: reqwest::Response) -> ChatError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    ChatError::Transport {
        status: Some(status.as_u16()),
        message: error_message(status, &body),
    }
}

/// Best message for a failed response: JSON `message`, raw body, or reason phrase
pub(crate) fn error_message(status: StatusCode, body: &str) -> String {
    if let Ok(parsed) = serde_json::from_str::<ApiErrorBody>(body) {
        if let Some(message) = parsed.message.filter(|m| !m.trim().is_empty()) {
            tracing::debug!(status = status.as_u16(), code = ?parsed.code, "backend error body");
            return message;
        }
    }

    let trimmed = body.trim();
    if !trimmed.is_empty() {
        return trimmed.to_string();
    }

    status
        .canonical_reason()
        .unwrap_or("Request failed")
        .to_string()
}

/// Join a base URL and a path without doubling the slash
pub(crate) fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}
