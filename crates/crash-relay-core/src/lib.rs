//! # Crash Relay Core
//!
//! Domain logic for relaying Crashlytics webhook notifications into the Humio
//! structured ingest API.
//!
//! This crate contains everything that does not touch the network:
//! - Best-effort decoding of the inbound webhook body ([`webhook`])
//! - The event filter deciding which payload types are forwarded
//! - Translation of an inbound event into a [`PushRecord`] ([`push`])
//! - The Humio ingest wire format ([`ingest`])
//! - The injectable time source used for timestamps ([`clock`])
//! - A secret container for tokens ([`secret`])
//!
//! ## Architecture
//!
//! Delivery goes through the [`Pusher`] trait; the HTTP implementation lives
//! in `crash-relay-api`.
//!
//! ## Usage
//!
//! ```rust
//! use crash_relay_core::{decode_webhook, translate, FixedClock};
//! use chrono::DateTime;
//!
//! let body = br#"{"event":"issue_new","payload_type":"issue","payload":{"title":"Crash"}}"#;
//! let outcome = decode_webhook(body);
//! assert!(outcome.error.is_none());
//! assert!(outcome.event.is_forwardable());
//!
//! let clock = FixedClock::new(DateTime::from_timestamp(0, 0).unwrap());
//! let record = translate(&clock, outcome.event);
//! assert_eq!(record.timestamp, 0);
//! assert_eq!(record.kind, "issue");
//! ```

pub mod clock;
pub mod ingest;
pub mod push;
pub mod secret;
pub mod webhook;

pub use clock::{unix_millis, Clock, FixedClock, SystemClock};
pub use ingest::{encode_ingest_body, IngestEvent, IngestPayload};
pub use push::{translate, PushError, PushRecord, Pusher};
pub use secret::SecretValue;
pub use webhook::{decode_webhook, DecodeError, DecodeOutcome, InboundEvent, TRACKED_PAYLOAD_TYPE};

/// Free-form attribute map carried from the webhook payload to the ingest event.
pub type Attributes = serde_json::Map<String, serde_json::Value>;
