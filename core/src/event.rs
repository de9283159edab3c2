//! Event trait and related types for event sourcing.
//!
//! Events represent facts about things that have happened in the past and are immutable.
//! The indexer never writes events; it only reads them back from the event store and
//! decodes the ones it subscribes to.
//!
//! # Wire format
//!
//! An event is stored as a type name plus a JSON payload. The type name routes the payload
//! to the right decoder, the payload itself carries no enum tag:
//!
//! ```text
//! type: "terminal_equipment_removed"
//! data: {"terminalEquipmentId": "6f1c..."}
//! ```
//!
//! # Example
//!
//! ```
//! use equipment_search_core::event::{Event, EventError, SerializedEvent};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Clone, Debug, Serialize, Deserialize)]
//! struct CableRemoved {
//!     cable_id: String,
//! }
//!
//! impl Event for CableRemoved {
//!     fn event_type(&self) -> &'static str {
//!         "cable_removed"
//!     }
//!
//!     fn to_bytes(&self) -> Result<Vec<u8>, EventError> {
//!         serde_json::to_vec(self).map_err(|e| EventError::SerializationError(e.to_string()))
//!     }
//!
//!     fn from_serialized(event: &SerializedEvent) -> Result<Self, EventError> {
//!         match event.event_type.as_str() {
//!             "cable_removed" => event.decode(),
//!             other => Err(EventError::UnknownEventType(other.to_string())),
//!         }
//!     }
//! }
//! ```

use serde::de::DeserializeOwned;
use std::fmt;
use thiserror::Error;

/// Error types for event operations.
#[derive(Error, Debug)]
pub enum EventError {
    /// Failed to serialize event to bytes.
    #[error("Failed to serialize event: {0}")]
    SerializationError(String),

    /// Failed to deserialize event from bytes.
    #[error("Failed to deserialize event: {0}")]
    DeserializationError(String),

    /// Unknown event type encountered during deserialization.
    #[error("Unknown event type: {0}")]
    UnknownEventType(String),
}

/// A domain event that can be read back from the event store.
///
/// # Thread Safety
///
/// Events must be `Send + Sync + 'static` to be passed through the async runtime.
pub trait Event: Send + Sync + 'static {
    /// Returns the stored type name of this event.
    ///
    /// This is the value of the event store's type column and is used to route
    /// payloads to the correct decoder.
    fn event_type(&self) -> &'static str;

    /// Serialize the event payload (without any enum tag) to JSON bytes.
    ///
    /// # Errors
    ///
    /// Returns `EventError::SerializationError` if the payload cannot be encoded.
    fn to_bytes(&self) -> Result<Vec<u8>, EventError>;

    /// Decode an event from its stored form, routing on `event.event_type`.
    ///
    /// # Errors
    ///
    /// - `EventError::UnknownEventType` if the type name is not handled by `Self`
    /// - `EventError::DeserializationError` if the payload does not match the type
    fn from_serialized(event: &SerializedEvent) -> Result<Self, EventError>
    where
        Self: Sized;
}

/// An event as stored in (and delivered by) the event store.
///
/// This struct contains the event type name and the JSON payload bytes,
/// along with optional metadata.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SerializedEvent {
    /// The stored event type name (e.g., `"terminal_equipment_removed"`).
    pub event_type: String,

    /// The JSON-encoded event payload.
    pub data: Vec<u8>,

    /// Optional metadata attached by the writer (correlation ids, user, ...).
    pub metadata: Option<serde_json::Value>,
}

impl SerializedEvent {
    /// Create a new serialized event.
    ///
    /// # Examples
    ///
    /// ```
    /// use equipment_search_core::event::SerializedEvent;
    ///
    /// let event = SerializedEvent::new(
    ///     "terminal_equipment_removed".to_string(),
    ///     br#"{"terminalEquipmentId":"x"}"#.to_vec(),
    ///     None,
    /// );
    /// assert_eq!(event.event_type, "terminal_equipment_removed");
    /// ```
    #[must_use]
    pub const fn new(
        event_type: String,
        data: Vec<u8>,
        metadata: Option<serde_json::Value>,
    ) -> Self {
        Self {
            event_type,
            data,
            metadata,
        }
    }

    /// Create a serialized event from a domain event.
    ///
    /// # Errors
    ///
    /// Returns `EventError::SerializationError` if the event cannot be serialized.
    pub fn from_event<E: Event>(
        event: &E,
        metadata: Option<serde_json::Value>,
    ) -> Result<Self, EventError> {
        Ok(Self {
            event_type: event.event_type().to_string(),
            data: event.to_bytes()?,
            metadata,
        })
    }

    /// Decode the JSON payload into `T`.
    ///
    /// # Errors
    ///
    /// Returns `EventError::DeserializationError` naming the event type if the payload
    /// does not match `T`.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, EventError> {
        serde_json::from_slice(&self.data).map_err(|e| {
            EventError::DeserializationError(format!("{}: {e}", self.event_type))
        })
    }
}

impl fmt::Display for SerializedEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "SerializedEvent {{ type: {}, size: {} bytes }}",
            self.event_type,
            self.data.len()
        )
    }
}
