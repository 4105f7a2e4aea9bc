//! Humio structured ingest wire format.
//!
//! The structured ingest endpoint accepts a JSON array of batches, each
//! carrying optional tags and a list of events. The relay always sends one
//! batch holding one event.
//!
//! `timestamp` and `attributes` are always written, even when zero or empty.
//! A zero timestamp is therefore indistinguishable on the wire from a record
//! whose clock reported the epoch.

use crate::{push::PushRecord, Attributes};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[cfg(test)]
#[path = "ingest_tests.rs"]
mod tests;

/// One ingest batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IngestPayload {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub events: Vec<IngestEvent>,
}

/// One structured event inside a batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IngestEvent {
    /// Milliseconds since the Unix epoch
    #[serde(default)]
    pub timestamp: i64,

    /// Offset from UTC in minutes, omitted when zero
    #[serde(default, skip_serializing_if = "is_zero")]
    pub timezone: i64,

    #[serde(default)]
    pub attributes: Attributes,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub rawstring: String,
}

impl From<PushRecord> for IngestPayload {
    fn from(record: PushRecord) -> Self {
        Self {
            tags: BTreeMap::new(),
            events: vec![IngestEvent {
                timestamp: record.timestamp,
                attributes: record.data,
                ..Default::default()
            }],
        }
    }
}

/// Serialize the request body for a single record.
///
/// The body is a one-element array terminated by a newline.
pub fn encode_ingest_body(record: PushRecord) -> Result<Vec<u8>, serde_json::Error> {
    let mut body = serde_json::to_vec(&[IngestPayload::from(record)])?;
    body.push(b'\n');
    Ok(body)
}

fn is_zero(value: &i64) -> bool {
    *value == 0
}
