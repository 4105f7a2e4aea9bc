//! Inbound Crashlytics webhook decoding and filtering.
//!
//! Crashlytics posts a JSON envelope of the form
//! `{"event": "...", "payload_type": "...", "payload": {...}}`. Only the
//! `issue` payload type is forwarded; verification pings and every other
//! payload type are acknowledged and dropped.
//!
//! Decoding is best-effort: a body whose top-level shape is
//! wrong still yields whatever well-typed fields could be read, together with
//! the error describing the first mismatch. The caller decides the response
//! status from the error but still runs the filter on the partial event.

use crate::Attributes;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

#[cfg(test)]
#[path = "webhook_tests.rs"]
mod tests;

/// The only payload type that is forwarded to the ingest endpoint.
pub const TRACKED_PAYLOAD_TYPE: &str = "issue";

/// Crashlytics webhook envelope.
///
/// Absent and `null` fields are represented by their empty value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InboundEvent {
    /// Event name, e.g. `issue_impact_change` or `verification`
    pub event: String,

    /// Payload type tag, e.g. `issue` or `none`
    pub payload_type: String,

    /// Free-form event attributes, passed through untouched
    pub payload: Attributes,
}

impl InboundEvent {
    /// Whether this event should be translated and pushed downstream.
    pub fn is_forwardable(&self) -> bool {
        self.payload_type == TRACKED_PAYLOAD_TYPE
    }
}

/// Reasons the inbound body could not be decoded cleanly.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    /// The body held no JSON value at all
    #[error("unexpected end of JSON input")]
    Empty,

    /// The body is not syntactically valid JSON
    #[error("invalid JSON: {0}")]
    Syntax(#[from] serde_json::Error),

    /// The top-level JSON value is not an object
    #[error("cannot decode JSON {found} into webhook envelope")]
    UnexpectedShape { found: &'static str },

    /// A known field holds a value of the wrong JSON type
    #[error("cannot decode JSON {found} into field '{field}' of type {expected}")]
    FieldType {
        field: &'static str,
        expected: &'static str,
        found: &'static str,
    },
}

/// Result of decoding a webhook body.
///
/// `event` is always present; it is empty when nothing could be read.
/// `error` is set when decoding was not clean, even if `event` was partly
/// populated.
#[derive(Debug, Default)]
pub struct DecodeOutcome {
    pub event: InboundEvent,
    pub error: Option<DecodeError>,
}

impl DecodeOutcome {
    fn failed(error: DecodeError) -> Self {
        Self {
            event: InboundEvent::default(),
            error: Some(error),
        }
    }
}

/// Decode the first JSON value of `body` into an [`InboundEvent`].
///
/// Bytes following the first complete JSON value are ignored. Unknown
/// top-level fields are ignored. Known fields with the wrong type are
/// skipped, and the first such mismatch is reported in
/// [`DecodeOutcome::error`].
pub fn decode_webhook(body: &[u8]) -> DecodeOutcome {
    let mut stream = serde_json::Deserializer::from_slice(body).into_iter::<Value>();

    let value = match stream.next() {
        None => return DecodeOutcome::failed(DecodeError::Empty),
        Some(Err(e)) => return DecodeOutcome::failed(DecodeError::Syntax(e)),
        Some(Ok(value)) => value,
    };

    let mut fields = match value {
        Value::Object(fields) => fields,
        // A bare null leaves the envelope untouched
        Value::Null => return DecodeOutcome::default(),
        other => {
            return DecodeOutcome::failed(DecodeError::UnexpectedShape {
                found: json_type_name(&other),
            })
        }
    };

    let mut outcome = DecodeOutcome::default();

    match take_string(&mut fields, "event") {
        Ok(event) => outcome.event.event = event,
        Err(e) => outcome.record(e),
    }

    match take_string(&mut fields, "payload_type") {
        Ok(payload_type) => outcome.event.payload_type = payload_type,
        Err(e) => outcome.record(e),
    }

    match fields.remove("payload") {
        None | Some(Value::Null) => {}
        Some(Value::Object(payload)) => outcome.event.payload = payload,
        Some(other) => outcome.record(DecodeError::FieldType {
            field: "payload",
            expected: "object",
            found: json_type_name(&other),
        }),
    }

    outcome
}

impl DecodeOutcome {
    /// Keep the first error; later mismatches only get logged.
    fn record(&mut self, error: DecodeError) {
        if self.error.is_none() {
            self.error = Some(error);
        } else {
            debug!(error = %error, "Additional webhook field mismatch");
        }
    }
}

fn take_string(fields: &mut Attributes, field: &'static str) -> Result<String, DecodeError> {
    match fields.remove(field) {
        None | Some(Value::Null) => Ok(String::new()),
        Some(Value::String(s)) => Ok(s),
        Some(other) => Err(DecodeError::FieldType {
            field,
            expected: "string",
            found: json_type_name(&other),
        }),
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
