//! # Crash Relay HTTP Service
//!
//! HTTP server receiving Crashlytics webhooks and relaying `issue` events to
//! the Humio structured ingest API.
//!
//! This service provides:
//! - Crashlytics webhook endpoint with query-token authentication
//! - Delivery of eligible events through a [`Pusher`]
//! - A liveness endpoint
//!
//! Request flow for `/webhook`:
//!
//! ```text
//! authenticate -> method/body checks -> decode -> filter -> translate -> push
//! ```
//!
//! Once the body has been accepted the handler answers `200 OK` whatever the
//! delivery outcome.

pub mod auth;
pub mod config;
pub mod errors;
pub mod humio;

#[cfg(test)]
#[path = "lib_tests.rs"]
mod lib_tests;


pub use auth::authenticate;
pub use config::{
    validate_url, CrashlyticsConfig, HumioConfig, LoggingConfig, ServerConfig, ServiceConfig,
};
pub use errors::{ConfigError, ServiceError, UrlError, WebhookHandlerError};
pub use humio::HumioPusher;

use axum::{
    extract::{DefaultBodyLimit, Request, State},
    http::{header::CONTENT_LENGTH, HeaderMap, HeaderValue, Method, StatusCode},
    middleware::{self, Next},
    response::{Json, Response},
    routing::{any, get},
    Router,
};
use bytes::Bytes;
use crash_relay_core::{
    decode_webhook, translate, Clock, DecodeOutcome, InboundEvent, Pusher, SecretValue,
};
use serde::Serialize;
use std::{
    future::IntoFuture,
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::sync::Notify;
use tower::ServiceBuilder;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};
use tracing::{debug, error, field, info, instrument, warn, Span};

/// Path of the webhook endpoint registered with Crashlytics.
pub const WEBHOOK_PATH: &str = "/webhook";

/// Header carrying the request correlation id.
pub const CORRELATION_ID_HEADER: &str = "x-correlation-id";

// ============================================================================
// Application State
// ============================================================================

/// Shared application state
///
/// Everything is immutable after construction; clones share the same
/// pusher and clock.
#[derive(Clone)]
pub struct AppState {
    /// Secret expected in the webhook `token` query parameter
    pub auth_token: Arc<SecretValue>,

    /// Delivery capability for eligible events
    pub pusher: Arc<dyn Pusher>,

    /// Time source for record timestamps
    pub clock: Arc<dyn Clock>,

    /// Per-request timeout applied to inbound requests
    pub request_timeout: Duration,
}

impl AppState {
    /// Create new application state
    pub fn new(
        auth_token: SecretValue,
        pusher: Arc<dyn Pusher>,
        clock: Arc<dyn Clock>,
        request_timeout: Duration,
    ) -> Self {
        Self {
            auth_token: Arc::new(auth_token),
            pusher,
            clock,
            request_timeout,
        }
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("auth_token", &self.auth_token)
            .field("pusher", &"<Pusher>")
            .field("clock", &"<Clock>")
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

// ============================================================================
// HTTP Server
// ============================================================================

/// Create HTTP router with all endpoints
pub fn create_router(state: AppState) -> Router {
    // Any method reaches the handler so non-POST requests get a 400 after
    // authentication rather than a 405.
    // Crashlytics payloads carry no size bound.
    let webhook_routes = Router::new()
        .route(WEBHOOK_PATH, any(handle_webhook))
        .layer(DefaultBodyLimit::disable())
        .route_layer(middleware::from_fn_with_state(
            state.auth_token.clone(),
            authenticate,
        ));

    let health_routes = Router::new().route("/health", get(handle_health_check));

    Router::new()
        .merge(webhook_routes)
        .merge(health_routes)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http().make_span_with(request_span))
                .layer(middleware::from_fn(request_logging_middleware))
                .layer(TimeoutLayer::with_status_code(
                    StatusCode::REQUEST_TIMEOUT,
                    state.request_timeout,
                ))
                .into_inner(),
        )
        .with_state(state)
}

/// Start HTTP server
///
/// Serves until SIGINT or SIGTERM, then lets in-flight requests finish for
/// at most `server.shutdown_timeout_seconds`.
pub async fn start_server(server: &ServerConfig, state: AppState) -> Result<(), ServiceError> {
    let app = create_router(state);

    let address = format!("{}:{}", server.host, server.port);
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .map_err(|e| ServiceError::BindFailed {
            address: address.clone(),
            message: e.to_string(),
        })?;

    info!(address = %address, "Listening for webhooks");

    let shutdown_started = Arc::new(Notify::new());
    let signalled = shutdown_started.clone();
    let serve = axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            signalled.notify_one();
        })
        .into_future();

    let drain_timeout = server.shutdown_timeout();
    let drain_deadline = async {
        shutdown_started.notified().await;
        tokio::time::sleep(drain_timeout).await;
    };

    tokio::select! {
        result = serve => {
            result.map_err(|e| ServiceError::ServerFailed {
                message: e.to_string(),
            })?;
            info!("HTTP server shutdown complete");
        }
        _ = drain_deadline => {
            warn!(
                timeout_seconds = drain_timeout.as_secs(),
                "Graceful shutdown timed out; dropping in-flight requests"
            );
        }
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C signal handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT (Ctrl+C), initiating graceful shutdown"),
        _ = terminate => info!("Received SIGTERM, initiating graceful shutdown"),
    }
}

// ============================================================================
// Webhook Handler
// ============================================================================

/// Outcome of running an event through filter and delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForwardOutcome {
    /// Payload type is not tracked; nothing was sent
    Ignored,

    /// Record was accepted by the pusher
    Delivered,

    /// Pusher failed; the failure has been logged
    DeliveryFailed,
}

/// Handle Crashlytics webhook requests
///
/// Runs behind [`authenticate`]. Returns `400` for non-POST requests, empty
/// bodies and undecodable bodies; `200` otherwise. A body that decodes only
/// partially still goes through the filter and, when it is an `issue`, is
/// delivered, but the response stays `400`.
#[instrument(skip(state, method, headers, body), fields(method = %method))]
pub async fn handle_webhook(
    State(state): State<AppState>,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookResponse>, WebhookHandlerError> {
    if method != Method::POST {
        return Err(WebhookHandlerError::MethodNotAllowed {
            method: method.to_string(),
        });
    }

    if declared_body_length(&headers) <= 0 {
        return Err(WebhookHandlerError::EmptyBody);
    }

    let DecodeOutcome { event, error } = decode_webhook(&body);
    if let Some(ref e) = error {
        error!(error = %e, "webhook: unmarshal payload failed");
    }

    let outcome = forward_event(&state, event).await;

    match error {
        Some(e) => Err(WebhookHandlerError::MalformedPayload(e)),
        None => Ok(Json(WebhookResponse::from(outcome))),
    }
}

/// Filter, translate and deliver one decoded event.
///
/// Delivery errors are logged here and never propagated.
pub async fn forward_event(state: &AppState, event: InboundEvent) -> ForwardOutcome {
    if !event.is_forwardable() {
        debug!(
            event = %event.event,
            payload_type = %event.payload_type,
            "Ignoring untracked payload type"
        );
        return ForwardOutcome::Ignored;
    }

    let event_name = event.event.clone();
    let record = translate(state.clock.as_ref(), event);
    let payload_type = record.kind.clone();

    match state.pusher.push(record).await {
        Ok(()) => {
            info!(
                event = %event_name,
                payload_type = %payload_type,
                "Forwarded webhook event to Humio"
            );
            ForwardOutcome::Delivered
        }
        Err(e) => {
            error!(
                event = %event_name,
                payload_type = %payload_type,
                error = %e,
                "webhook: push to humio failed"
            );
            ForwardOutcome::DeliveryFailed
        }
    }
}

/// Body length as declared by `Content-Length`; `-1` when the header is
/// absent or unreadable (chunked transfer).
fn declared_body_length(headers: &HeaderMap) -> i64 {
    headers
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<i64>().ok())
        .unwrap_or(-1)
}

// ============================================================================
// Health Handler
// ============================================================================

/// Liveness check; never authenticated
async fn handle_health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============================================================================
// Middleware
// ============================================================================

/// Span for the tower-http trace layer.
///
/// Records the path only; the query string carries the webhook token.
fn request_span(request: &Request) -> Span {
    tracing::debug_span!(
        "request",
        method = %request.method(),
        path = %request.uri().path(),
        version = ?request.version(),
    )
}

/// Assigns or propagates the correlation id and logs the outcome.
#[instrument(
    name = "http",
    skip_all,
    fields(path = %request.uri().path(), correlation_id = field::Empty)
)]
async fn request_logging_middleware(request: Request, next: Next) -> Response {
    let correlation_id = request
        .headers()
        .get(CORRELATION_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(str::to_owned)
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    Span::current().record("correlation_id", correlation_id.as_str());

    let started = Instant::now();
    let mut response = next.run(request).await;
    let elapsed_ms = started.elapsed().as_millis() as u64;

    if let Ok(value) = HeaderValue::from_str(&correlation_id) {
        response.headers_mut().insert(CORRELATION_ID_HEADER, value);
    }

    let status = response.status().as_u16();
    match response.status() {
        s if s.is_server_error() => error!(status, elapsed_ms, "Request failed"),
        s if s.is_client_error() => warn!(status, elapsed_ms, "Request rejected"),
        _ => info!(status, elapsed_ms, "Request handled"),
    }

    response
}

// ============================================================================
// Response Types
// ============================================================================

/// Webhook acknowledgement
#[derive(Debug, Serialize)]
pub struct WebhookResponse {
    /// `accepted` for tracked events, `ignored` otherwise
    pub status: String,
}

impl From<ForwardOutcome> for WebhookResponse {
    fn from(outcome: ForwardOutcome) -> Self {
        let status = match outcome {
            ForwardOutcome::Ignored => "ignored",
            // Delivery failures are not the caller's concern
            ForwardOutcome::Delivered | ForwardOutcome::DeliveryFailed => "accepted",
        };
        Self {
            status: status.to_string(),
        }
    }
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}
