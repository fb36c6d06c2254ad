//! Integration tests for the HTTP capability client.
//!
//! Each test spins up an Axum stub on a random port and points the client at
//! it, exercising the real request/response envelope.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};
use secrecy::SecretString;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::time::timeout;

use clarity_assist::capability::http::HttpCapabilityClient;
use clarity_assist::capability::{
    CapabilityId, CapabilityInvoker, ChatReply, ChatRequest, invoke_typed,
};
use clarity_assist::config::AssistConfig;
use clarity_assist::error::CapabilityError;

/// Maximum time any test is allowed to run before we consider it hung.
const TEST_TIMEOUT: Duration = Duration::from_secs(5);

/// One request as seen by the stub.
#[derive(Debug, Clone)]
struct Seen {
    slug: String,
    authorization: Option<String>,
    body: Value,
}

#[derive(Clone, Default)]
struct StubState {
    seen: Arc<Mutex<Vec<Seen>>>,
}

async fn handle(
    State(state): State<StubState>,
    Path(slug): Path<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> impl IntoResponse {
    state.seen.lock().unwrap().push(Seen {
        slug: slug.clone(),
        authorization: headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
        body: body.clone(),
    });

    match slug.as_str() {
        "chat" => {
            let response = format!("you said {}", body["data"]["message"]);
            Json(json!({ "result": { "response": response } })).into_response()
        }
        "summarize" => (StatusCode::INTERNAL_SERVER_ERROR, "flow crashed").into_response(),
        "explain" => (StatusCode::OK, "not json at all").into_response(),
        _ => (StatusCode::OK, Json(json!({ "result": body["data"] }))).into_response(),
    }
}

/// Start the stub on a random port, return (base_url, state).
async fn start_stub() -> (String, StubState) {
    let state = StubState::default();
    let app = Router::new()
        .route("/{slug}", post(handle))
        .with_state(state.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://127.0.0.1:{port}/"), state)
}

fn client(base_url: &str, api_key: Option<&str>) -> HttpCapabilityClient {
    let config = AssistConfig {
        capability_url: base_url.to_string(),
        api_key: api_key.map(|k| SecretString::from(k.to_string())),
        request_timeout: Duration::from_secs(2),
        ..AssistConfig::default()
    };
    HttpCapabilityClient::from_config(&config).unwrap()
}

#[tokio::test]
async fn chat_request_is_wrapped_and_result_unwrapped() {
    timeout(TEST_TIMEOUT, async {
        let (base_url, state) = start_stub().await;
        let client = client(&base_url, Some("secret-token"));

        let request = ChatRequest {
            message: "hello".into(),
            chat_history: Vec::new(),
            persona: "Helpful Assistant".into(),
            language: "English".into(),
            image: None,
        };
        let reply: ChatReply = invoke_typed(&client, CapabilityId::Chat, &request)
            .await
            .unwrap();

        assert_eq!(reply.response, "you said \"hello\"");

        let seen = state.seen.lock().unwrap().clone();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].slug, "chat");
        assert_eq!(seen[0].authorization.as_deref(), Some("Bearer secret-token"));
        assert_eq!(seen[0].body["data"]["persona"], "Helpful Assistant");
        assert!(seen[0].body["data"].get("image").is_none());
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn no_authorization_header_without_api_key() {
    timeout(TEST_TIMEOUT, async {
        let (base_url, state) = start_stub().await;
        let client = client(&base_url, None);

        let output = client
            .invoke(CapabilityId::Flashcards, json!({ "topic": "cells" }))
            .await
            .unwrap();

        assert_eq!(output, json!({ "topic": "cells" }));
        let seen = state.seen.lock().unwrap().clone();
        assert_eq!(seen[0].slug, "flashcards");
        assert_eq!(seen[0].authorization, None);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn non_success_status_is_rejected_with_body() {
    timeout(TEST_TIMEOUT, async {
        let (base_url, _state) = start_stub().await;
        let client = client(&base_url, None);

        let err = client
            .invoke(CapabilityId::Summarize, json!({ "text": "long" }))
            .await
            .unwrap_err();

        match err {
            CapabilityError::Rejected {
                capability,
                status,
                body,
            } => {
                assert_eq!(capability, CapabilityId::Summarize);
                assert_eq!(status, 500);
                assert_eq!(body, "flow crashed");
            }
            other => panic!("Expected Rejected, got {other:?}"),
        }
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn malformed_body_is_invalid_response() {
    timeout(TEST_TIMEOUT, async {
        let (base_url, _state) = start_stub().await;
        let client = client(&base_url, None);

        let err = client
            .invoke(CapabilityId::Explain, json!({ "topic": "gravity" }))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            CapabilityError::InvalidResponse {
                capability: CapabilityId::Explain,
                ..
            }
        ));
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn unreachable_backend_is_request_failed() {
    timeout(TEST_TIMEOUT, async {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let client = client(&format!("http://127.0.0.1:{port}"), None);
        let err = client
            .invoke(CapabilityId::Ideas, json!({ "topic": "apps" }))
            .await
            .unwrap_err();

        assert!(matches!(err, CapabilityError::RequestFailed { .. }));
    })
    .await
    .expect("test timed out");
}
