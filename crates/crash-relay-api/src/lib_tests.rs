//! Tests for the webhook handler and router composition.

use super::*;
use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
};
use chrono::{DateTime, Utc};
use crash_relay_core::{FixedClock, PushError, PushRecord};
use serde_json::{json, Value};
use std::sync::Mutex;
use tower::ServiceExt; // For `oneshot`

// ============================================================================
// Test pushers
// ============================================================================

#[derive(Default)]
struct PushRecorder {
    pushes: Mutex<Vec<PushRecord>>,
}

impl PushRecorder {
    fn pushes(&self) -> Vec<PushRecord> {
        self.pushes.lock().unwrap().clone()
    }
}

#[async_trait]
impl Pusher for PushRecorder {
    async fn push(&self, record: PushRecord) -> Result<(), PushError> {
        self.pushes.lock().unwrap().push(record);
        Ok(())
    }
}

struct PushFailer;

#[async_trait]
impl Pusher for PushFailer {
    async fn push(&self, _record: PushRecord) -> Result<(), PushError> {
        Err(PushError::Transport {
            message: "some unknown error".to_string(),
        })
    }
}

fn epoch() -> DateTime<Utc> {
    DateTime::from_timestamp(0, 0).unwrap()
}

fn state_with(pusher: Arc<dyn Pusher>) -> AppState {
    AppState::new(
        SecretValue::new("token"),
        pusher,
        Arc::new(FixedClock::new(epoch())),
        Duration::from_secs(5),
    )
}

fn webhook_request(method: &str, body: Option<&str>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri("/webhook?token=token");
    match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .header("content-length", body.len().to_string())
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn send(state: AppState, request: Request<Body>) -> (StatusCode, Value) {
    let response = create_router(state).oneshot(request).await.unwrap();
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = serde_json::from_slice(&body).unwrap_or(Value::Null);
    (status, json)
}

const ISSUE_IMPACT_CHANGE: &str = r#"{
    "event": "issue_impact_change",
    "payload_type": "issue",
    "payload": {
        "display_id": 123 ,
        "title": "Issue Title" ,
        "method": "methodName of issue",
        "impact_level": 2,
        "crashes_count": 54,
        "impacted_devices_count": 16,
        "url": "http://crashlytics.com/full/url/to/issue"
    }
}"#;

// ============================================================================
// Status code table
// ============================================================================

#[tokio::test]
async fn test_webhook_handler_status_table() {
    let cases: Vec<(&str, &str, Option<&str>, StatusCode, usize)> = vec![
        ("GET request", "GET", None, StatusCode::BAD_REQUEST, 0),
        (
            "GET request with body",
            "GET",
            Some(r#"{"payload_type":"issue"}"#),
            StatusCode::BAD_REQUEST,
            0,
        ),
        ("PUT request", "PUT", Some("{}"), StatusCode::BAD_REQUEST, 0),
        ("POST request with empty payload", "POST", Some(""), StatusCode::BAD_REQUEST, 0),
        ("POST request without body", "POST", None, StatusCode::BAD_REQUEST, 0),
        (
            "POST request with invalid payload",
            "POST",
            Some("some payload"),
            StatusCode::BAD_REQUEST,
            0,
        ),
        (
            "POST request with verification payload",
            "POST",
            Some(r#"{"event": "verification", "payload_type": "none"}"#),
            StatusCode::OK,
            0,
        ),
        (
            "POST request with issue impact change payload",
            "POST",
            Some(ISSUE_IMPACT_CHANGE),
            StatusCode::OK,
            1,
        ),
    ];

    for (name, method, body, expected_status, expected_pushes) in cases {
        let recorder = Arc::new(PushRecorder::default());
        let state = state_with(recorder.clone());

        let (status, _) = send(state, webhook_request(method, body)).await;

        assert_eq!(status, expected_status, "status code not as expected: {name}");
        assert_eq!(
            recorder.pushes().len(),
            expected_pushes,
            "pushes not as expected: {name}"
        );
    }
}

// ============================================================================
// Forwarding
// ============================================================================

#[tokio::test]
async fn test_issue_payload_is_pushed_unchanged() {
    let recorder = Arc::new(PushRecorder::default());
    let state = state_with(recorder.clone());

    let (status, body) = send(state, webhook_request("POST", Some(ISSUE_IMPACT_CHANGE))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"status": "accepted"}));

    let pushes = recorder.pushes();
    assert_eq!(pushes.len(), 1);
    let push = &pushes[0];
    assert_eq!(push.kind, "issue");
    assert_eq!(push.timestamp, 0);
    assert_eq!(
        Value::Object(push.data.clone()),
        json!({
            "display_id": 123,
            "title": "Issue Title",
            "method": "methodName of issue",
            "impact_level": 2,
            "crashes_count": 54,
            "impacted_devices_count": 16,
            "url": "http://crashlytics.com/full/url/to/issue"
        })
    );
    assert_eq!(push.data["display_id"].as_f64(), Some(123.0));
}

#[tokio::test]
async fn test_issue_title_scenario() {
    let recorder = Arc::new(PushRecorder::default());
    let state = state_with(recorder.clone());
    let body = r#"{"payload_type":"issue","payload":{"title":"Issue Title","display_id":123}}"#;

    let (status, _) = send(state, webhook_request("POST", Some(body))).await;

    assert_eq!(status, StatusCode::OK);
    let pushes = recorder.pushes();
    assert_eq!(pushes.len(), 1);
    assert_eq!(pushes[0].timestamp, 0);
    assert_eq!(pushes[0].data["title"], json!("Issue Title"));
    assert_eq!(pushes[0].data["display_id"].as_f64(), Some(123.0));
}

#[tokio::test]
async fn test_timestamp_comes_from_injected_clock() {
    let recorder = Arc::new(PushRecorder::default());
    let instant = DateTime::from_timestamp(1_600_000_000, 987_654_321).unwrap();
    let state = AppState::new(
        SecretValue::new("token"),
        recorder.clone(),
        Arc::new(FixedClock::new(instant)),
        Duration::from_secs(5),
    );

    let (status, _) = send(state, webhook_request("POST", Some(ISSUE_IMPACT_CHANGE))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(recorder.pushes()[0].timestamp, 1_600_000_000_987);
}

#[tokio::test]
async fn test_untracked_payload_is_acknowledged_as_ignored() {
    let recorder = Arc::new(PushRecorder::default());
    let state = state_with(recorder.clone());

    let (status, body) = send(
        state,
        webhook_request("POST", Some(r#"{"payload_type":"none"}"#)),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"status": "ignored"}));
    assert!(recorder.pushes().is_empty());
}

#[tokio::test]
async fn test_push_failure_still_returns_ok() {
    let state = state_with(Arc::new(PushFailer));

    let body = r#"{
        "event": "issue_impact_change",
        "payload_type": "issue",
        "payload": {"title": "Issue Title"}
    }"#;
    let (status, json) = send(state, webhook_request("POST", Some(body))).await;

    assert_eq!(status, StatusCode::OK, "status code not as expected");
    assert_eq!(json, json!({"status": "accepted"}));
}

// ============================================================================
// Best-effort decoding
// ============================================================================

#[tokio::test]
async fn test_partially_decoded_issue_is_pushed_but_answered_bad_request() {
    let recorder = Arc::new(PushRecorder::default());
    let state = state_with(recorder.clone());

    let (status, _) = send(
        state,
        webhook_request(
            "POST",
            Some(r#"{"event":"issue_new","payload_type":"issue","payload":"oops"}"#),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    let pushes = recorder.pushes();
    assert_eq!(pushes.len(), 1);
    assert!(pushes[0].data.is_empty());
}

#[tokio::test]
async fn test_partially_decoded_untracked_event_is_not_pushed() {
    let recorder = Arc::new(PushRecorder::default());
    let state = state_with(recorder.clone());

    let (status, _) = send(
        state,
        webhook_request("POST", Some(r#"{"payload_type":"none","payload":[1]}"#)),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(recorder.pushes().is_empty());
}

// ============================================================================
// Body length
// ============================================================================

#[tokio::test]
async fn test_post_without_content_length_is_rejected() {
    let recorder = Arc::new(PushRecorder::default());
    let state = state_with(recorder.clone());

    // Chunked transfer declares no length
    let request = Request::builder()
        .method("POST")
        .uri("/webhook?token=token")
        .body(Body::from(ISSUE_IMPACT_CHANGE))
        .unwrap();
    let (status, _) = send(state, request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(recorder.pushes().is_empty());
}

#[tokio::test]
async fn test_large_issue_payload_is_forwarded() {
    let recorder = Arc::new(PushRecorder::default());
    let state = state_with(recorder.clone());
    let stack = "frame\n".repeat(3 * 1024 * 1024 / 6);
    let body = json!({
        "event": "issue_new",
        "payload_type": "issue",
        "payload": {"title": "Issue Title", "stack": stack}
    })
    .to_string();
    assert!(body.len() > 3 * 1024 * 1024 - 64);

    let (status, _) = send(state, webhook_request("POST", Some(&body))).await;

    assert_eq!(status, StatusCode::OK);
    let pushes = recorder.pushes();
    assert_eq!(pushes.len(), 1);
    assert_eq!(pushes[0].data["stack"].as_str().map(str::len), Some(stack.len()));
}

#[test]
fn test_declared_body_length_reads_header() {
    let mut headers = HeaderMap::new();
    assert_eq!(declared_body_length(&headers), -1);

    headers.insert(CONTENT_LENGTH, "0".parse().unwrap());
    assert_eq!(declared_body_length(&headers), 0);

    headers.insert(CONTENT_LENGTH, "42".parse().unwrap());
    assert_eq!(declared_body_length(&headers), 42);

    headers.insert(CONTENT_LENGTH, "lots".parse().unwrap());
    assert_eq!(declared_body_length(&headers), -1);
}

// ============================================================================
// Authentication and routing
// ============================================================================

#[tokio::test]
async fn test_webhook_requires_token_before_anything_else() {
    let recorder = Arc::new(PushRecorder::default());

    for uri in ["/webhook", "/webhook?token=", "/webhook?token=wrong"] {
        let request = Request::builder()
            .method("GET")
            .uri(uri)
            .body(Body::empty())
            .unwrap();
        let response = create_router(state_with(recorder.clone()))
            .oneshot(request)
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "uri {uri}");
    }
    assert!(recorder.pushes().is_empty());
}

#[tokio::test]
async fn test_unauthenticated_issue_is_not_pushed() {
    let recorder = Arc::new(PushRecorder::default());
    let request = Request::builder()
        .method("POST")
        .uri("/webhook?token=wrong")
        .header("content-length", ISSUE_IMPACT_CHANGE.len().to_string())
        .body(Body::from(ISSUE_IMPACT_CHANGE))
        .unwrap();

    let (status, _) = send(state_with(recorder.clone()), request).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(recorder.pushes().is_empty());
}

#[tokio::test]
async fn test_health_endpoint_needs_no_token() {
    let state = state_with(Arc::new(PushRecorder::default()));
    let request = Request::builder()
        .uri("/health")
        .body(Body::empty())
        .unwrap();

    let (status, body) = send(state, request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn test_unknown_path_is_not_found() {
    let state = state_with(Arc::new(PushRecorder::default()));
    let request = Request::builder()
        .uri("/other?token=token")
        .body(Body::empty())
        .unwrap();

    let (status, _) = send(state, request).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[test]
fn test_app_state_debug_redacts_token() {
    let state = state_with(Arc::new(PushRecorder::default()));

    let debug_str = format!("{:?}", state);

    assert!(!debug_str.contains("\"token\""));
    assert!(debug_str.contains("REDACTED"));
}
