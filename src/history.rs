//! Authoritative message history
//!
//! After a stream completes, the optimistic messages are replaced with what the
//! server actually recorded. This client fetches that list.

use crate::auth::TokenProvider;
use crate::errors::{ChatError, Result};
use crate::streaming::transport::error_from_response;
use crate::types::ChatMessage;
use reqwest::{Client, Url};
use std::sync::Arc;
use std::time::Duration;

/// Default history path; `{id}` is replaced by the session id
pub const DEFAULT_HISTORY_PATH: &str = "/api/chat/sessions/{id}/messages";

/// Request timeout for history fetches
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Fetches server-recorded chat history
#[derive(Debug, Clone)]
pub struct HistoryClient {
    client: Client,
    base_url: Url,
    path_template: String,
    tokens: Arc<dyn TokenProvider>,
}

impl HistoryClient {
    /// Create history client with the default path
    pub fn new(base_url: &str, tokens: Arc<dyn TokenProvider>) -> Result<Self> {
        Self::with_path(base_url, DEFAULT_HISTORY_PATH, tokens)
    }

    /// Create history client with a custom path template
    pub fn with_path(
        base_url: &str,
        path_template: &str,
        tokens: Arc<dyn TokenProvider>,
    ) -> Result<Self> {
        if !path_template.contains("{id}") {
            return Err(ChatError::Config(format!(
                "history path '{}' must contain {{id}}",
                path_template
            )));
        }

        let base_url = Url::parse(base_url)
            .map_err(|e| ChatError::Config(format!("invalid base URL '{}': {}", base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(ChatError::Config(format!(
                "base URL '{}' cannot carry a path",
                base_url
            )));
        }

        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(ChatError::Http)?;

        Ok(Self {
            client,
            base_url,
            path_template: path_template.to_string(),
            tokens,
        })
    }

    /// URL of a session's history
    ///
    /// The id is percent-encoded as a single path segment.
    pub fn url_for(&self, session_id: &str) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty();
            for part in self.path_template.split('/').filter(|p| !p.is_empty()) {
                segments.push(&part.replace("{id}", session_id));
            }
        }
        url
    }

    /// Fetch the messages the server recorded for a session, oldest first
    pub async fn fetch(&self, session_id: &str) -> Result<Vec<ChatMessage>> {
        let url = self.url_for(session_id);

        let mut builder = self.client.get(url);
        if let Some(token) = self.tokens.token() {
            builder = builder.bearer_auth(token);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| ChatError::transport(format!("Failed to fetch history: {}", e)))?;

        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        let body = response.text().await?;
        let messages: Vec<ChatMessage> = serde_json::from_str(&body)?;

        tracing::debug!(session = session_id, count = messages.len(), "fetched history");
        Ok(messages)
    }
}
