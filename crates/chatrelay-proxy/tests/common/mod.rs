//! Mock upstream server for integration tests.
//!
//! Binds an axum app on `127.0.0.1:0` that imitates the chat and image APIs
//! and records every request it receives.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::Router;
use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, State};
use axum::http::{HeaderMap, StatusCode, Uri, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use tokio::net::TcpListener;

/// One request as seen by the mock upstream.
#[derive(Debug, Clone)]
pub struct Recorded {
    pub path_and_query: String,
    pub headers: HeaderMap,
    pub body: Bytes,
}

#[derive(Clone, Default)]
pub struct Recorder(Arc<Mutex<Vec<Recorded>>>);

impl Recorder {
    fn push(&self, uri: &Uri, headers: HeaderMap, body: Bytes) {
        let path_and_query = uri
            .path_and_query()
            .map(ToString::to_string)
            .unwrap_or_default();
        self.0.lock().unwrap().push(Recorded {
            path_and_query,
            headers,
            body,
        });
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.0.lock().unwrap().clone()
    }
}

pub const STREAM_BODY: &str = concat!(
    "data: {\"choices\":[{\"delta\":{\"role\":\"assistant\"}}]}\n\n",
    "data: {\"choices\":[{\"delta\":{\"content\":\"Hello\"}}]}\n\n",
    ": keep-alive\n\n",
    "data: {\"choices\":[{\"delta\":{\"content\":\", world\"}}]}\n\n",
    "data: [DONE]\n\n",
);

async fn chat_completions(
    State(recorder): State<Recorder>,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    recorder.push(&uri, headers, body.clone());

    let wants_stream = serde_json::from_slice::<serde_json::Value>(&body)
        .ok()
        .and_then(|v| v.get("stream").and_then(serde_json::Value::as_bool))
        .unwrap_or(false);

    if wants_stream {
        return ([(header::CONTENT_TYPE, "text/event-stream")], STREAM_BODY).into_response();
    }

    (
        [(header::CONTENT_TYPE, "application/json")],
        "{ \"id\": \"chatcmpl-1\",  \"object\": \"chat.completion\" }",
    )
        .into_response()
}

async fn quota_error(State(recorder): State<Recorder>, uri: Uri, headers: HeaderMap) -> Response {
    recorder.push(&uri, headers, Bytes::new());
    (
        StatusCode::TOO_MANY_REQUESTS,
        [(header::CONTENT_TYPE, "application/json")],
        r#"{"error":{"type":"insufficient_quota","message":"quota exceeded"}}"#,
    )
        .into_response()
}

async fn bad_gateway_page() -> Response {
    (
        StatusCode::BAD_GATEWAY,
        [(header::CONTENT_TYPE, "text/html")],
        "<html>502 Bad Gateway</html>",
    )
        .into_response()
}

async fn imagine(
    State(recorder): State<Recorder>,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    recorder.push(&uri, headers, body);
    (
        [(header::CONTENT_TYPE, "application/json")],
        r#"{"code":1,"result":"task-1"}"#,
    )
        .into_response()
}

/// Start the mock upstream; returns its address and the request recorder.
pub async fn spawn_mock_upstream() -> (SocketAddr, Recorder) {
    let recorder = Recorder::default();
    let app = Router::new()
        .route("/v1/chat/completions", post(chat_completions))
        .route("/v1/dashboard/billing/usage", get(quota_error))
        .route("/v1/broken", get(bad_gateway_page))
        .route("/mj/submit/imagine", post(imagine))
        .layer(DefaultBodyLimit::disable())
        .with_state(recorder.clone());

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind mock upstream");
    let addr = listener.local_addr().expect("mock upstream address");
    tokio::spawn(async move {
        axum::serve(listener, app).await.ok();
    });

    (addr, recorder)
}

/// An address nothing listens on.
pub async fn unused_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind throwaway listener");
    listener.local_addr().expect("throwaway address")
}
