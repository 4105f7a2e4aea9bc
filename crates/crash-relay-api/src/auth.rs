//! Query-token authentication for the webhook endpoint.
//!
//! Crashlytics cannot sign its callbacks, so the webhook URL registered with
//! it carries a shared secret in the `token` query parameter.

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use crash_relay_core::SecretValue;
use std::sync::Arc;
use tracing::warn;

#[cfg(test)]
#[path = "auth_tests.rs"]
mod tests;

/// Query parameter carrying the credential.
pub const TOKEN_QUERY_PARAM: &str = "token";

/// Body of the 401 response
pub const UNAUTHORIZED_MESSAGE: &str = "invalid authentication token";

/// Middleware rejecting requests whose `token` query parameter does not match.
///
/// The first `token` value is trimmed before comparison. On mismatch the
/// request is answered with `401 Unauthorized` and never reaches the wrapped
/// handler.
///
/// Install with `axum::middleware::from_fn_with_state(token, authenticate)`.
pub async fn authenticate(
    State(token): State<Arc<SecretValue>>,
    request: Request,
    next: Next,
) -> Response {
    match query_token(request.uri().query()) {
        Some(candidate) if token.matches(candidate.trim()) => next.run(request).await,
        Some(_) => reject("mismatch"),
        None => reject("missing"),
    }
}

/// First value of the `token` query parameter, percent-decoded.
pub fn query_token(query: Option<&str>) -> Option<String> {
    url::form_urlencoded::parse(query?.as_bytes())
        .find(|(key, _)| key == TOKEN_QUERY_PARAM)
        .map(|(_, value)| value.into_owned())
}

fn reject(reason: &'static str) -> Response {
    warn!(reason, "Webhook authentication failed");
    (StatusCode::UNAUTHORIZED, UNAUTHORIZED_MESSAGE).into_response()
}
