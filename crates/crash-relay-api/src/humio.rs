//! Humio ingest delivery.
//!
//! [`HumioPusher`] is the production [`Pusher`]: it posts each record to the
//! structured ingest endpoint and reports anything but `200 OK` as a failure.
//! There is no retry; the caller logs the error and moves on.

use crate::{config::HumioConfig, errors::ServiceError};
use async_trait::async_trait;
use crash_relay_core::{encode_ingest_body, PushError, PushRecord, Pusher, SecretValue};
use reqwest::{
    header::{AUTHORIZATION, CONTENT_TYPE},
    StatusCode,
};
use std::time::Duration;
use tracing::{debug, error, instrument};
use url::Url;

#[cfg(test)]
#[path = "humio_tests.rs"]
mod tests;

/// Path prefix of the Humio ingest API.
pub const INGEST_PATH_PREFIX: &str = "/api/v1/ingest/";

/// Resolve the ingest endpoint against a base URL.
///
/// The ingest path is absolute, so any path on the base URL is replaced.
pub fn ingest_url(base: &Url, endpoint: &str) -> Result<Url, url::ParseError> {
    base.join(&format!("{}{}", INGEST_PATH_PREFIX, endpoint))
}

/// [`Pusher`] delivering records to the Humio structured ingest API.
#[derive(Debug, Clone)]
pub struct HumioPusher {
    http_client: reqwest::Client,
    ingest_url: Url,
    ingest_token: SecretValue,
}

impl HumioPusher {
    /// Create a pusher with its own HTTP client.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::HttpClient` if the client cannot be built and
    /// `ServiceError::Configuration` if the ingest URL cannot be resolved.
    pub fn new(
        base_url: &Url,
        ingest_endpoint: &str,
        ingest_token: SecretValue,
        timeout: Duration,
    ) -> Result<Self, ServiceError> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("crash-relay/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ServiceError::HttpClient {
                message: e.to_string(),
            })?;

        Self::with_client(http_client, base_url, ingest_endpoint, ingest_token)
    }

    /// Create a pusher around an existing HTTP client.
    pub fn with_client(
        http_client: reqwest::Client,
        base_url: &Url,
        ingest_endpoint: &str,
        ingest_token: SecretValue,
    ) -> Result<Self, ServiceError> {
        let ingest_url = ingest_url(base_url, ingest_endpoint).map_err(|e| {
            crate::errors::ConfigError::Invalid {
                message: format!("cannot build ingest URL: {}", e),
            }
        })?;

        Ok(Self {
            http_client,
            ingest_url,
            ingest_token,
        })
    }

    /// Create a pusher from validated configuration.
    pub fn from_config(config: &HumioConfig, timeout: Duration) -> Result<Self, ServiceError> {
        let base_url = config.base_url()?;
        Self::new(
            &base_url,
            &config.ingest_endpoint,
            config.ingest_token.clone(),
            timeout,
        )
    }

    /// The fully resolved ingest URL
    pub fn ingest_url(&self) -> &Url {
        &self.ingest_url
    }
}

#[async_trait]
impl Pusher for HumioPusher {
    #[instrument(skip(self, record), fields(payload_type = %record.kind, timestamp = record.timestamp))]
    async fn push(&self, record: PushRecord) -> Result<(), PushError> {
        let body = encode_ingest_body(record)?;

        let response = self
            .http_client
            .post(self.ingest_url.clone())
            .header(
                AUTHORIZATION,
                format!("Bearer {}", self.ingest_token.expose_secret()),
            )
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(|e| PushError::Transport {
                message: e.to_string(),
            })?;

        let status = response.status();
        if status != StatusCode::OK {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error body".to_string());
            error!(status = %status, body = %body, "Humio rejected ingest request");
            return Err(PushError::UnexpectedStatus {
                status: status.to_string(),
                body,
            });
        }

        debug!("Ingest request accepted");
        Ok(())
    }
}
