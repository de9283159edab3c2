//! Projection system for building and maintaining read models from events.
//!
//! # Overview
//!
//! A projection consumes the event stream and keeps a read model in sync with it. For the
//! indexer the read model is a search collection, and the projection runs in two phases:
//!
//! - **Replay**: the event store drives every historical event through
//!   [`Projection::apply_event`] and then calls [`Projection::replay_finished`] exactly once.
//! - **Catch-up**: afterwards, each poll delivers the events appended since the last one.
//!
//! ```text
//! ┌─────────────┐  replay_all / catch_up   ┌────────────┐   mutations   ┌──────────────┐
//! │ Event Store │ ───────────────────────▶ │ Projection │ ────────────▶ │ Search Index │
//! └─────────────┘   (subscribed types)     └────────────┘               └──────────────┘
//! ```
//!
//! Projections are owned by a single driver and receive `&mut self`; there is no
//! concurrent access to projection state.

use crate::event::{EventError, SerializedEvent};
use crate::search::SearchIndexError;
use crate::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::future::Future;

/// Error type for projection operations.
#[derive(Debug, thiserror::Error)]
pub enum ProjectionError {
    /// The discovered data does not match the configuration (fatal, never retried).
    ///
    /// Raised when the number of specifications registered during replay differs
    /// from the size of the configured allow-list.
    #[error(
        "Configuration error: expected {expected} allow-listed specifications, found {found}"
    )]
    Configuration {
        /// Size of the configured allow-list
        expected: usize,
        /// Number of specifications discovered during replay
        found: usize,
    },

    /// An event type reached the projection without a handling rule.
    #[error("Unrecognized event type: {0}")]
    UnrecognizedEvent(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Search index call failed
    #[error("Search index error: {0}")]
    SearchIndex(#[from] SearchIndexError),

    /// Event processing error (invalid state transitions and similar)
    #[error("Event processing error: {0}")]
    EventProcessing(String),
}

impl From<EventError> for ProjectionError {
    fn from(error: EventError) -> Self {
        match error {
            EventError::UnknownEventType(event_type) => Self::UnrecognizedEvent(event_type),
            other => Self::Serialization(other.to_string()),
        }
    }
}

/// Result type for projection operations.
pub type Result<T> = std::result::Result<T, ProjectionError>;

/// A projection builds and maintains a read model from events.
///
/// # Subscription
///
/// [`Projection::event_types`] is the subscription: an event store only delivers events
/// whose stored type name appears in that list. It is read once per replay/catch-up call.
///
/// # Idempotency
///
/// Delivery is at-least-once. Implementations should issue idempotent mutations
/// (upserts, deletes that tolerate absence) wherever possible.
pub trait Projection: Send {
    /// Projection name, used in logs and metrics.
    fn name(&self) -> &str;

    /// Stored event type names this projection subscribes to.
    fn event_types(&self) -> &[&'static str];

    /// Apply one event to the projection.
    ///
    /// # Errors
    ///
    /// Returns [`ProjectionError`] if the event cannot be decoded or applied. Errors are
    /// fatal for the caller; the event store stops delivering and propagates them.
    fn apply_event(&mut self, event: &SerializedEvent) -> impl Future<Output = Result<()>> + Send;

    /// Signal that a full replay has delivered every historical event.
    ///
    /// Called exactly once by [`EventStore::replay_all`](crate::event_store::EventStore::replay_all)
    /// after the last replayed event.
    ///
    /// # Errors
    ///
    /// Returns [`ProjectionError`] if finalizing the replayed state fails.
    fn replay_finished(&mut self) -> impl Future<Output = Result<()>> + Send;
}

/// Position in the event stream.
///
/// Represents how far an event store has delivered events to its projection.
///
/// # Example
///
/// ```
/// use equipment_search_core::projection::EventPosition;
/// use chrono::Utc;
///
/// let position = EventPosition::new(1000, Utc::now());
/// assert_eq!(position.offset, 1000);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventPosition {
    /// Global sequence number of the last delivered event
    pub offset: u64,

    /// Timestamp of the last delivered event
    pub timestamp: DateTime<Utc>,
}

impl EventPosition {
    /// Create a new event position.
    #[must_use]
    pub const fn new(offset: u64, timestamp: DateTime<Utc>) -> Self {
        Self { offset, timestamp }
    }
}
