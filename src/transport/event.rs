//! # Stream Events
//!
//! Decoding of push-stream messages into typed [`StreamEvent`]s.
//!
//! ## Message Format:
//! Each message arrives as a named event with a JSON data string. Two shapes
//! are accepted:
//! - **Envelope**: `{"type": ..., "name": ..., "payload": {...},
//!   "correlation_id": ..., "timestamp": "<RFC 3339>"}`
//! - **Bare payload**: any other JSON object, wrapped as the payload of an
//!   `event`-typed envelope named after the stream event
//!
//! Anything else is a malformed payload.

use crate::error::{RuntimeError, RuntimeResult};
use chrono::{DateTime, FixedOffset, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Envelope type of a stream event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Command,
    Signal,
    Event,
    StateSnapshot,
}

/// A typed, named stream payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamEvent {
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub name: String,
    #[serde(default)]
    pub payload: Map<String, Value>,
    #[serde(default)]
    pub correlation_id: String,
    pub timestamp: DateTime<FixedOffset>,
}

impl StreamEvent {
    /// Decode the data of a stream message named `stream_name`.
    ///
    /// `correlation_id` is attached to bare payloads; envelopes carry their own.
    pub fn decode(
        stream_name: &str,
        data: &str,
        correlation_id: Option<&str>,
    ) -> RuntimeResult<Self> {
        let value: Value = serde_json::from_str(data)?;
        let Value::Object(object) = value else {
            return Err(RuntimeError::MalformedPayload(format!(
                "event '{}' data is not a JSON object",
                stream_name
            )));
        };

        if object.contains_key("type") && object.contains_key("name") {
            return Ok(serde_json::from_value(Value::Object(object))?);
        }

        Ok(StreamEvent {
            event_type: EventType::Event,
            name: stream_name.to_string(),
            payload: object,
            correlation_id: correlation_id.unwrap_or_default().to_string(),
            timestamp: Utc::now().fixed_offset(),
        })
    }

    /// Deserialize the payload into the shape an event name expects.
    pub fn payload_as<T: DeserializeOwned>(&self) -> RuntimeResult<T> {
        Ok(serde_json::from_value(Value::Object(self.payload.clone()))?)
    }
}

/// Payload of `presence` events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresencePayload {
    pub status: String,
    #[serde(default)]
    pub note: String,
    #[serde(default)]
    pub timestamp: Option<String>,
}

/// Payload of `chunk` events (incremental reply text).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkPayload {
    pub chunk: String,
}
