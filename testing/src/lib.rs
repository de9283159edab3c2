//! # Equipment Search Testing
//!
//! Testing utilities for the equipment search indexer.
//!
//! This crate provides in-memory implementations of every external collaborator:
//! - [`InMemoryEventStore`]: ordered event log with replay and catch-up cursors
//! - [`InMemorySearchIndex`]: collections, documents and aliases in a `BTreeMap`,
//!   with an operation log and failure injection
//! - [`InMemoryHealthMarker`]: records whether the process was marked healthy
//!
//! ## Example
//!
//! ```ignore
//! use equipment_search_testing::{InMemoryEventStore, InMemorySearchIndex};
//!
//! #[tokio::test]
//! async fn placed_equipment_is_indexed() {
//!     let events = InMemoryEventStore::new();
//!     let search = Arc::new(InMemorySearchIndex::new());
//!     events.append_event(&specification_added(spec_id, "Splice Closure"));
//!     events.append_event(&equipment_placed(id, "Splice1", spec_id));
//!
//!     // ... run the projection, then inspect `search.documents(collection)`
//! }
//! ```

pub mod event_store_mocks;
pub mod health_mocks;
pub mod search_mocks;

pub use event_store_mocks::InMemoryEventStore;
pub use health_mocks::InMemoryHealthMarker;
pub use search_mocks::{InMemorySearchIndex, Operation, OperationKind};

/// Install a test-friendly tracing subscriber.
///
/// Safe to call from every test; only the first call installs the subscriber.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "equipment_search=debug".into()),
        )
        .with_test_writer()
        .try_init();
}
