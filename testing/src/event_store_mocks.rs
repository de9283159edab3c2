//! In-memory event store for fast, deterministic projection tests.

#![allow(clippy::unwrap_used)] // Test infrastructure uses unwrap for simplicity
#![allow(clippy::missing_panics_doc)] // Panics only on poisoned locks

use chrono::{DateTime, Utc};
use equipment_search_core::event::{Event, SerializedEvent};
use equipment_search_core::event_store::{EventStore, EventStoreError};
use equipment_search_core::projection::{EventPosition, Projection};
use std::sync::{Arc, Mutex};

#[derive(Debug, Default)]
struct Log {
    events: Vec<(SerializedEvent, DateTime<Utc>)>,
    /// Index of the next event to deliver
    cursor: usize,
    position: Option<EventPosition>,
    catch_up_calls: usize,
    fail_next_catch_up: Option<String>,
}

/// In-memory append-only event log.
///
/// Cloning shares the log, so a test can keep a handle and append events while the code
/// under test owns another clone.
///
/// # Example
///
/// ```
/// use equipment_search_testing::InMemoryEventStore;
/// use equipment_search_core::event::SerializedEvent;
///
/// let store = InMemoryEventStore::new();
/// store.append(SerializedEvent::new("terminal_equipment_removed".into(), b"{}".to_vec(), None));
/// assert_eq!(store.len(), 1);
/// ```
#[derive(Clone, Debug, Default)]
pub struct InMemoryEventStore {
    log: Arc<Mutex<Log>>,
}

impl InMemoryEventStore {
    /// Create an empty event log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a stored event.
    pub fn append(&self, event: SerializedEvent) {
        self.log.lock().unwrap().events.push((event, Utc::now()));
    }

    /// Serialize and append a domain event.
    pub fn append_event<E: Event>(&self, event: &E) {
        self.append(SerializedEvent::from_event(event, None).unwrap());
    }

    /// Number of events in the log.
    #[must_use]
    pub fn len(&self) -> usize {
        self.log.lock().unwrap().events.len()
    }

    /// Whether the log is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of `catch_up` calls so far.
    #[must_use]
    pub fn catch_up_calls(&self) -> usize {
        self.log.lock().unwrap().catch_up_calls
    }

    /// Make the next `catch_up` call fail with a database error.
    pub fn fail_next_catch_up(&self, message: impl Into<String>) {
        self.log.lock().unwrap().fail_next_catch_up = Some(message.into());
    }

    fn pending(&self) -> Vec<(usize, SerializedEvent, DateTime<Utc>)> {
        let log = self.log.lock().unwrap();
        log.events
            .iter()
            .enumerate()
            .skip(log.cursor)
            .map(|(index, (event, timestamp))| (index, event.clone(), *timestamp))
            .collect()
    }

    fn advance(&self, index: usize, timestamp: DateTime<Utc>) {
        let mut log = self.log.lock().unwrap();
        log.cursor = index + 1;
        log.position = Some(EventPosition::new(index as u64 + 1, timestamp));
    }

    /// Deliver everything after the cursor to `projection`, skipping unsubscribed types.
    async fn deliver<P: Projection>(&self, projection: &mut P) -> Result<u64, EventStoreError> {
        let mut delivered = 0;
        for (index, event, timestamp) in self.pending() {
            let subscribed = projection
                .event_types()
                .iter()
                .any(|event_type| *event_type == event.event_type);
            if subscribed {
                projection.apply_event(&event).await?;
                delivered += 1;
            }
            self.advance(index, timestamp);
        }
        Ok(delivered)
    }
}

impl EventStore for InMemoryEventStore {
    async fn replay_all<P: Projection>(&self, projection: &mut P) -> Result<u64, EventStoreError> {
        self.log.lock().unwrap().cursor = 0;
        let delivered = self.deliver(projection).await?;
        projection.replay_finished().await?;
        Ok(delivered)
    }

    async fn catch_up<P: Projection>(&self, projection: &mut P) -> Result<u64, EventStoreError> {
        let injected = {
            let mut log = self.log.lock().unwrap();
            log.catch_up_calls += 1;
            log.fail_next_catch_up.take()
        };
        if let Some(message) = injected {
            tracing::debug!(%message, "Injected catch-up failure");
            return Err(EventStoreError::DatabaseError(message));
        }
        self.deliver(projection).await
    }

    fn position(&self) -> Option<EventPosition> {
        self.log.lock().unwrap().position
    }
}
