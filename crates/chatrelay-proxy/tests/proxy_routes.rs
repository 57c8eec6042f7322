//! End-to-end tests for the proxy routes.
//!
//! The router runs in-process via `oneshot`; the upstream is a real axum
//! server on a loopback port reached through `HttpUpstream`.

mod common;

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use chatrelay_core::RelayConfig;
use chatrelay_proxy::{HttpUpstream, ProxyContext, create_router};
use http_body_util::BodyExt;
use tower::ServiceExt;

use common::{STREAM_BODY, spawn_mock_upstream, unused_addr};

fn app(config: RelayConfig) -> Router {
    let upstream = HttpUpstream::new().expect("Failed to build HTTP client");
    create_router(Arc::new(ProxyContext::new(config, Arc::new(upstream))))
}

async fn body_string(response: axum::response::Response) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

fn post(uri: &str, body: &'static str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body))
        .unwrap()
}

#[tokio::test]
async fn chat_request_gets_system_key_and_stripped_path() {
    let (addr, recorder) = spawn_mock_upstream().await;
    let config = RelayConfig::new()
        .with_base_url(format!("http://{addr}"))
        .with_api_key("sk-system")
        .with_org_id("org-test");

    let response = app(config)
        .oneshot(post(
            "/api/openai/v1/chat/completions?trace=1",
            r#"{"model":"gpt-3.5-turbo","messages":[]}"#,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "application/json");
    assert_eq!(response.headers()[header::CACHE_CONTROL], "no-cache");
    assert_eq!(
        body_string(response).await,
        r#"{"id":"chatcmpl-1","object":"chat.completion"}"#
    );

    let requests = recorder.requests();
    assert_eq!(requests.len(), 1);
    let seen = &requests[0];
    assert_eq!(seen.path_and_query, "/v1/chat/completions?trace=1");
    assert_eq!(seen.headers[header::AUTHORIZATION], "Bearer sk-system");
    assert_eq!(seen.headers["openai-organization"], "org-test");
    assert_eq!(&seen.body[..], br#"{"model":"gpt-3.5-turbo","messages":[]}"#);
}

#[tokio::test]
async fn large_chat_body_is_forwarded_whole() {
    let (addr, recorder) = spawn_mock_upstream().await;
    let config = RelayConfig::new()
        .with_base_url(format!("http://{addr}"))
        .with_api_key("sk-system");

    // Past axum's 2 MiB default extractor limit.
    let history = "x".repeat(3 * 1024 * 1024);
    let body = format!(
        r#"{{"model":"gpt-3.5-turbo","messages":[{{"role":"user","content":"{history}"}}]}}"#
    );
    let request = Request::builder()
        .method("POST")
        .uri("/api/openai/v1/chat/completions")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.clone()))
        .unwrap();

    let response = app(config).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_string(response).await,
        r#"{"id":"chatcmpl-1","object":"chat.completion"}"#
    );

    let requests = recorder.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].body.len(), body.len());
}

#[tokio::test]
async fn streamed_completion_is_relayed_as_text() {
    let (addr, _recorder) = spawn_mock_upstream().await;
    let config = RelayConfig::new()
        .with_base_url(format!("http://{addr}"))
        .with_api_key("sk-system");

    let response = app(config)
        .oneshot(post(
            "/api/openai/v1/chat/completions",
            r#"{"model":"gpt-3.5-turbo","stream":true}"#,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "text/event-stream");
    let text = body_string(response).await;
    assert_eq!(text, "Hello, world");
    assert!(!text.contains("data:"), "raw events leaked: {STREAM_BODY}");
}

#[tokio::test]
async fn invalid_access_code_never_reaches_upstream() {
    let (addr, recorder) = spawn_mock_upstream().await;
    let config = RelayConfig::new()
        .with_base_url(format!("http://{addr}"))
        .with_api_key("sk-system")
        .with_access_codes("letmein");

    let mut request = post("/api/openai/v1/chat/completions", "{}");
    request
        .headers_mut()
        .insert(header::AUTHORIZATION, "Bearer ak-letmeiN".parse().unwrap());
    let response = app(config.clone()).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(recorder.requests().is_empty());

    let mut request = post("/api/openai/v1/chat/completions", "{}");
    request
        .headers_mut()
        .insert(header::AUTHORIZATION, "Bearer ak-letmein".parse().unwrap());
    let response = app(config).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let requests = recorder.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].headers[header::AUTHORIZATION], "Bearer sk-system");
}

#[tokio::test]
async fn upstream_error_is_fenced_with_ok_status() {
    let (addr, _recorder) = spawn_mock_upstream().await;
    let config = RelayConfig::new()
        .with_base_url(format!("http://{addr}"))
        .with_api_key("sk-system");

    let response = app(config)
        .oneshot(
            Request::builder()
                .uri("/api/openai/v1/dashboard/billing/usage")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "text/plain; charset=utf-8"
    );
    assert_eq!(
        body_string(response).await,
        "```json\n{\n  \"error\": {\n    \"type\": \"insufficient_quota\",\n    \"message\": \"quota exceeded\"\n  }\n}\n```"
    );
}

#[tokio::test]
async fn non_json_upstream_body_is_reported() {
    let (addr, _recorder) = spawn_mock_upstream().await;
    let config = RelayConfig::new()
        .with_base_url(format!("http://{addr}"))
        .with_api_key("sk-system");

    let response = app(config)
        .oneshot(
            Request::builder()
                .uri("/api/openai/v1/broken")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    let body = body_string(response).await;
    assert!(body.starts_with("```json\n"));
    assert!(body.contains("invalid response from OpenAI server"));
}

#[tokio::test]
async fn unreachable_upstream_is_reported() {
    let addr = unused_addr().await;
    let config = RelayConfig::new()
        .with_base_url(format!("http://{addr}"))
        .with_api_key("sk-system");

    let response = app(config)
        .oneshot(post("/api/openai/v1/chat/completions", "{}"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(
        body_string(response)
            .await
            .contains("failed to reach OpenAI server")
    );
}

#[tokio::test]
async fn image_request_carries_token() {
    let (addr, recorder) = spawn_mock_upstream().await;
    let config = RelayConfig::new().with_image_service(format!("http://{addr}/"), None);

    let mut request = post("/api/midjourney/mj/submit/imagine?x=1", r#"{"prompt":"a cat"}"#);
    request
        .headers_mut()
        .insert("token", "mj-user".parse().unwrap());
    let response = app(config).oneshot(request).await.unwrap();

    assert_eq!(body_string(response).await, r#"{"code":1,"result":"task-1"}"#);
    let requests = recorder.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].path_and_query, "/mj/submit/imagine");
    assert_eq!(requests[0].headers["token"], "mj-user");
}

#[tokio::test]
async fn image_request_without_service_url_is_reported() {
    let response = app(RelayConfig::new())
        .oneshot({
            let mut request = post("/api/midjourney/mj/submit/imagine", "{}");
            request
                .headers_mut()
                .insert("token", "mj-user".parse().unwrap());
            request
        })
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_string(response).await;
    assert!(body.contains("failed to reach Midjourney server"));
    assert!(body.contains("Midjourney API URL is not configured"));
}
