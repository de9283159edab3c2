//! Event store trait and related types.
//!
//! The indexer is a pure reader of the event store. It needs exactly two operations:
//!
//! - **`replay_all`**: deliver every historical event (in append order) to a projection,
//!   then signal completion via [`Projection::replay_finished`].
//! - **`catch_up`**: deliver the events appended since the last delivered position and
//!   report how many were processed.
//!
//! Both operations deliver only the event types the projection subscribes to
//! ([`Projection::event_types`]) and stop at the first projection error.
//!
//! # Implementations
//!
//! - `PostgresEventStore` (in `equipment-search-postgres`): production implementation
//! - `InMemoryEventStore` (in `equipment-search-testing`): fast, deterministic testing
//!
//! # Example
//!
//! ```no_run
//! use equipment_search_core::event_store::{EventStore, EventStoreError};
//! use equipment_search_core::projection::Projection;
//!
//! async fn sync<E: EventStore, P: Projection>(
//!     store: &E,
//!     projection: &mut P,
//! ) -> Result<(), EventStoreError> {
//!     let replayed = store.replay_all(projection).await?;
//!     let new_events = store.catch_up(projection).await?;
//!     println!("replayed {replayed}, then caught up {new_events}");
//!     Ok(())
//! }
//! ```

use crate::projection::{EventPosition, Projection, ProjectionError};
use std::future::Future;
use thiserror::Error;

/// Errors that can occur during event store operations.
#[derive(Error, Debug)]
pub enum EventStoreError {
    /// Database connection or query error.
    #[error("Database error: {0}")]
    DatabaseError(String),

    /// Stored row could not be turned into an event.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// The projection rejected a delivered event (or the replay-finished signal).
    #[error("Projection failed: {0}")]
    Projection(#[from] ProjectionError),

    /// Operation is not valid in the store's current state.
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),
}

/// Event store abstraction for replaying and tailing the event log.
///
/// # Ordering
///
/// Events must be delivered in append order. The projection's transition logic assumes
/// the prior state of an equipment is valid when its next event arrives.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync`. Position tracking uses interior mutability so
/// both operations take `&self`.
pub trait EventStore: Send + Sync {
    /// Replay the complete history through `projection`, then call
    /// [`Projection::replay_finished`].
    ///
    /// Returns the number of events delivered. The store remembers the last delivered
    /// position so a following [`EventStore::catch_up`] resumes after it.
    ///
    /// # Errors
    ///
    /// - `DatabaseError`: reading the log failed
    /// - `Projection`: the projection rejected an event or the completion signal
    fn replay_all<P: Projection>(
        &self,
        projection: &mut P,
    ) -> impl Future<Output = Result<u64, EventStoreError>> + Send;

    /// Deliver events appended since the last delivered position.
    ///
    /// Returns the number of events processed (0 when nothing new arrived).
    ///
    /// # Errors
    ///
    /// - `DatabaseError`: reading the log failed
    /// - `Projection`: the projection rejected an event
    fn catch_up<P: Projection>(
        &self,
        projection: &mut P,
    ) -> impl Future<Output = Result<u64, EventStoreError>> + Send;

    /// Position of the last delivered event, `None` before anything was delivered.
    fn position(&self) -> Option<EventPosition>;
}
