//! Common test utilities for crash-relay integration tests
//!
//! This module provides:
//! - A mock [`Pusher`] recording every record it receives
//! - Helpers for building application state and requests
//! - Shared webhook fixtures

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use chrono::{DateTime, Utc};
use crash_relay_api::{create_router, AppState};
use crash_relay_core::{FixedClock, PushError, PushRecord, Pusher, SecretValue};
use serde_json::Value;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tower::ServiceExt;

/// Token configured on every test router
#[allow(dead_code)]
pub const AUTH_TOKEN: &str = "token";

/// Issue webhook as sent by Crashlytics
#[allow(dead_code)]
pub const ISSUE_IMPACT_CHANGE: &str = r#"{
    "event": "issue_impact_change",
    "payload_type": "issue",
    "payload": {
        "display_id": 123,
        "title": "Issue Title",
        "method": "methodName of issue",
        "impact_level": 2,
        "crashes_count": 54,
        "impacted_devices_count": 16,
        "url": "http://crashlytics.com/full/url/to/issue"
    }
}"#;

/// Verification ping sent when the webhook is registered
#[allow(dead_code)]
pub const VERIFICATION: &str = r#"{"event": "verification", "payload_type": "none"}"#;

// ============================================================================
// Mock Pusher
// ============================================================================

/// Mock pusher recording pushes, optionally failing each one
#[derive(Clone, Default)]
#[allow(dead_code)]
pub struct MockPusher {
    pushes: Arc<Mutex<Vec<PushRecord>>>,
    failure: Arc<Mutex<Option<String>>>,
}

impl MockPusher {
    #[allow(dead_code)]
    pub fn new() -> Self {
        Self::default()
    }

    #[allow(dead_code)]
    pub fn failing(message: &str) -> Self {
        let pusher = Self::default();
        *pusher.failure.lock().unwrap() = Some(message.to_string());
        pusher
    }

    #[allow(dead_code)]
    pub fn pushes(&self) -> Vec<PushRecord> {
        self.pushes.lock().unwrap().clone()
    }

    #[allow(dead_code)]
    pub fn push_count(&self) -> usize {
        self.pushes.lock().unwrap().len()
    }
}

#[async_trait::async_trait]
impl Pusher for MockPusher {
    async fn push(&self, record: PushRecord) -> Result<(), PushError> {
        self.pushes.lock().unwrap().push(record);

        match self.failure.lock().unwrap().clone() {
            Some(message) => Err(PushError::Transport { message }),
            None => Ok(()),
        }
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Unix epoch, the instant every test clock is pinned to by default
#[allow(dead_code)]
pub fn epoch() -> DateTime<Utc> {
    DateTime::from_timestamp(0, 0).unwrap()
}

/// Application state with a fixed clock at the Unix epoch
#[allow(dead_code)]
pub fn create_test_app_state(pusher: Arc<dyn Pusher>) -> AppState {
    AppState::new(
        SecretValue::new(AUTH_TOKEN),
        pusher,
        Arc::new(FixedClock::new(epoch())),
        Duration::from_secs(5),
    )
}

/// Router over [`create_test_app_state`]
#[allow(dead_code)]
pub fn create_test_router(pusher: Arc<dyn Pusher>) -> Router {
    create_router(create_test_app_state(pusher))
}

/// Authenticated POST to the webhook endpoint
#[allow(dead_code)]
pub fn webhook_post(body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(format!("/webhook?token={AUTH_TOKEN}"))
        .header("content-type", "application/json")
        .header("content-length", body.len().to_string())
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// Send a request and collect status and JSON body (`Null` if not JSON)
#[allow(dead_code)]
pub async fn send(router: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}
