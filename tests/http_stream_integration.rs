//! Integration tests for the HTTP transport against a mock backend
//!
//! Covers request shape, credentials, error responses and the reference
//! event stream end to end.

mod common;

use chatstream::auth::{NoToken, StaticToken, TokenProvider};
use chatstream::history::HistoryClient;
use chatstream::streaming::{Endpoints, StreamState};
use chatstream::{ChatError, Conversation, Notification, SessionTarget, StreamingChatClient};
use common::{deltas, drain};
use serde_json::json;
use std::sync::Arc;
use wiremock::matchers::{body_json, header, header_exists, method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

const REFERENCE_STREAM: &str = "event: start\ndata: \n\nevent: chunk\ndata: Hello\n\nevent: chunk\ndata:  world\n\nevent: done\ndata: {\"ok\":true}\n\n";

fn sse(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(body.as_bytes().to_vec(), "text/event-stream")
}

fn client_for(server: &MockServer, tokens: Arc<dyn TokenProvider>) -> StreamingChatClient {
    StreamingChatClient::http(Endpoints::new(server.uri()), tokens).expect("build client")
}

fn session(id: &str) -> SessionTarget {
    SessionTarget::Session(id.to_string())
}

#[tokio::test]
async fn test_reference_stream_notifications() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat/stream"))
        .and(header("accept", "text/event-stream"))
        .and(body_json(json!({"SessionId": "s1", "Message": "hi"})))
        .respond_with(sse(REFERENCE_STREAM))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server, Arc::new(NoToken));
    let mut handle = client.send(session("s1"), "hi").unwrap();
    let seen = drain(&mut handle).await;

    assert_eq!(seen.len(), 3, "unexpected notifications: {:?}", seen);
    assert_eq!(deltas(&seen), vec!["Hello", "Hello world"]);
    match &seen[2] {
        Notification::Completed { metadata } => {
            assert_eq!(metadata.as_ref(), Some(&json!({"ok": true})))
        }
        other => panic!("expected completion, got {:?}", other),
    }
    assert_eq!(handle.state(), StreamState::Completed);
}

#[tokio::test]
async fn test_error_frame_fails_without_delta() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat/stream"))
        .respond_with(sse("event: error\ndata: boom\n\n"))
        .mount(&server)
        .await;

    let client = client_for(&server, Arc::new(NoToken));
    let mut handle = client.send(session("s1"), "hi").unwrap();
    let seen = drain(&mut handle).await;

    assert_eq!(seen.len(), 1);
    match &seen[0] {
        Notification::Failed(ChatError::ServerReported(message)) => assert_eq!(message, "boom"),
        other => panic!("expected server failure, got {:?}", other),
    }
    assert_eq!(handle.state(), StreamState::Errored);
}

#[tokio::test]
async fn test_http_500_fails_once_with_body_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat/stream"))
        .respond_with(ResponseTemplate::new(500).set_body_raw(
            r#"{"code": 500, "message": "model overloaded"}"#,
            "application/json",
        ))
        .mount(&server)
        .await;

    let client = client_for(&server, Arc::new(NoToken));
    let mut handle = client.send(session("s1"), "hi").unwrap();
    let seen = drain(&mut handle).await;

    assert_eq!(seen.len(), 1);
    match &seen[0] {
        Notification::Failed(err) => {
            assert_eq!(err.status(), Some(500));
            assert_eq!(err.reason(), "model overloaded");
        }
        other => panic!("expected failure, got {:?}", other),
    }
    assert!(deltas(&seen).is_empty());
    assert_eq!(handle.state(), StreamState::Errored);
}

#[tokio::test]
async fn test_plain_text_error_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(502).set_body_string("upstream unavailable"))
        .mount(&server)
        .await;

    let client = client_for(&server, Arc::new(NoToken));
    let outcome = client.send(session("s1"), "hi").unwrap().collect().await;

    assert!(!outcome.is_success());
    assert_eq!(outcome.error.map(|e| e.reason()).as_deref(), Some("upstream unavailable"));
}

#[tokio::test]
async fn test_bearer_token_attached() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(header("authorization", "Bearer secret-token"))
        .respond_with(sse("data: ok\n\nevent: end\ndata:\n\n"))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server, Arc::new(StaticToken::new("secret-token")));
    let outcome = client.send(session("s1"), "hi").unwrap().collect().await;

    assert!(outcome.is_success());
    assert_eq!(outcome.content, "ok");
}

#[tokio::test]
async fn test_no_token_sends_no_authorization() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(header_exists("authorization"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(sse("data: anonymous\n\n"))
        .mount(&server)
        .await;

    let client = client_for(&server, Arc::new(NoToken));
    let outcome = client.send(session("s1"), "hi").unwrap().collect().await;

    assert!(outcome.is_success());
    assert_eq!(outcome.content, "anonymous");
}

#[tokio::test]
async fn test_task_request_shape() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/design/chat/stream"))
        .and(body_json(json!({"TaskId": "t9", "Message": "add an index"})))
        .respond_with(sse("event: chunk\ndata: CREATE INDEX\n\nevent: end\ndata:\n\n"))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server, Arc::new(NoToken));
    let outcome = client
        .send(SessionTarget::Task("t9".into()), "add an index")
        .unwrap()
        .collect()
        .await;

    assert!(outcome.is_success());
    assert_eq!(outcome.content, "CREATE INDEX");
    assert!(outcome.metadata.is_none());
}

#[tokio::test]
async fn test_blank_message_issues_no_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(sse(REFERENCE_STREAM))
        .expect(0)
        .mount(&server)
        .await;

    let client = client_for(&server, Arc::new(NoToken));
    for message in ["", "   ", "\n\t"] {
        let result = client.send(session("s1"), message);
        assert!(matches!(result, Err(ChatError::Validation(_))));
    }
    assert!(!client.is_streaming(&session("s1")));
}

#[tokio::test]
async fn test_empty_body_fails() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let client = client_for(&server, Arc::new(NoToken));
    let outcome = client.send(session("s1"), "hi").unwrap().collect().await;

    assert_eq!(outcome.state, StreamState::Errored);
    assert!(matches!(
        outcome.error,
        Some(ChatError::Transport { status: None, .. })
    ));
}

#[tokio::test]
async fn test_exchange_then_reconcile_with_history() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat/stream"))
        .respond_with(sse(REFERENCE_STREAM))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/chat/sessions/s1/messages"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": 10, "role": "user", "content": "hi", "createdAt": "2024-05-01T10:00:00Z"},
            {"id": 11, "role": "assistant", "content": "Hello world", "createdAt": "2024-05-01T10:00:02Z"}
        ])))
        .mount(&server)
        .await;

    let tokens: Arc<dyn TokenProvider> = Arc::new(NoToken);
    let client = client_for(&server, Arc::clone(&tokens));
    let history = HistoryClient::new(&server.uri(), tokens).unwrap();

    let mut conversation = Conversation::new(session("s1"));
    conversation.begin("hi").unwrap();
    let mut handle = client.send(session("s1"), "hi").unwrap();
    for notification in drain(&mut handle).await {
        conversation.apply(&notification).unwrap();
    }

    assert!(!conversation.is_pending());
    assert_eq!(conversation.last().unwrap().content, "Hello world");
    assert!(conversation.last().unwrap().is_temporary());

    let replaced = conversation
        .reconcile(history.fetch("s1").await.unwrap())
        .unwrap();
    assert_eq!(replaced, 2);
    assert!(conversation.messages().iter().all(|m| !m.is_temporary()));
}

#[tokio::test]
async fn test_request_counts_match_sends() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(sse("data: a\n\n"))
        .mount(&server)
        .await;

    let client = client_for(&server, Arc::new(NoToken));
    for _ in 0..3 {
        let outcome = client.send(session("s1"), "again").unwrap().collect().await;
        assert!(outcome.is_success());
    }

    let received: Vec<Request> = server.received_requests().await.unwrap();
    assert_eq!(received.len(), 3);
}
