//! Error types for the HTTP service

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use crash_relay_core::DecodeError;
use tracing::warn;

#[cfg(test)]
#[path = "errors_tests.rs"]
mod tests;

/// Webhook handler errors with HTTP status code mapping
///
/// Every variant is a client input error and maps to `400 Bad Request`.
/// Delivery failures are not handler errors.
#[derive(Debug, thiserror::Error)]
pub enum WebhookHandlerError {
    /// Request used a method other than POST
    #[error("Method {method} not supported, expected POST")]
    MethodNotAllowed { method: String },

    /// Request declared no body
    #[error("Request body is empty")]
    EmptyBody,

    /// Body could not be decoded into the webhook envelope
    ///
    /// The partially decoded envelope may still have been forwarded; this
    /// error only decides the response status.
    #[error("Malformed webhook payload: {0}")]
    MalformedPayload(#[from] DecodeError),
}

impl WebhookHandlerError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::MethodNotAllowed { .. } | Self::EmptyBody | Self::MalformedPayload(_) => {
                StatusCode::BAD_REQUEST
            }
        }
    }
}

impl IntoResponse for WebhookHandlerError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = self.to_string();

        warn!(status = %status, error = %message, "Rejected webhook request");

        let body = serde_json::json!({
            "error": message,
            "status": status.as_u16(),
            "timestamp": chrono::Utc::now().to_rfc3339(),
        });

        (status, Json(body)).into_response()
    }
}

/// Service-level errors
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Failed to bind to address {address}: {message}")]
    BindFailed { address: String, message: String },

    #[error("Server failed: {message}")]
    ServerFailed { message: String },

    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),

    #[error("Failed to create HTTP client: {message}")]
    HttpClient { message: String },
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("flag(s) {} required but missing", .keys.join(" "))]
    Missing { keys: Vec<String> },

    #[error("flag {key} not valid: should be in the form 'http://cloud.humio.com': {source}")]
    InvalidUrl {
        key: String,
        #[source]
        source: UrlError,
    },

    #[error("Invalid configuration: {message}")]
    Invalid { message: String },

    #[error("Failed to load configuration: {message}")]
    Load { message: String },
}

/// Reasons a base URL is rejected
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum UrlError {
    #[error("schema required")]
    SchemeMissing,

    #[error("only schemes http(s) are supported")]
    UnsupportedScheme { scheme: String },

    #[error("{0}")]
    Parse(#[from] url::ParseError),
}
