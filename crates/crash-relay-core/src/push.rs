//! Translation of inbound events into push records, and the delivery seam.

use crate::{clock::unix_millis, webhook::InboundEvent, Attributes, Clock};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[cfg(test)]
#[path = "push_tests.rs"]
mod tests;

/// One event ready for delivery to the log store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PushRecord {
    /// Payload type of the originating webhook
    #[serde(rename = "type")]
    pub kind: String,

    /// Milliseconds since the Unix epoch
    pub timestamp: i64,

    /// Attributes copied verbatim from the webhook payload
    pub data: Attributes,
}

/// Build the push record for an eligible event.
///
/// The payload map is moved into the record without modification.
pub fn translate(clock: &dyn Clock, event: InboundEvent) -> PushRecord {
    PushRecord {
        kind: event.payload_type,
        timestamp: unix_millis(clock.now()),
        data: event.payload,
    }
}

/// Delivery failures.
///
/// None of these are retried; the webhook caller never sees them.
#[derive(Debug, thiserror::Error)]
pub enum PushError {
    /// The record could not be serialized into the ingest body
    #[error("failed to encode ingest payload: {0}")]
    Encode(#[from] serde_json::Error),

    /// The request could not be built or sent (connect failure, timeout)
    #[error("ingest request failed: {message}")]
    Transport { message: String },

    /// The ingest endpoint answered with something other than 200
    #[error("humio status code not ok: {status}")]
    UnexpectedStatus { status: String, body: String },
}

/// Capability to deliver a single [`PushRecord`] downstream.
///
/// Exactly one delivery attempt is made per call.
#[async_trait]
pub trait Pusher: Send + Sync {
    async fn push(&self, record: PushRecord) -> Result<(), PushError>;
}
