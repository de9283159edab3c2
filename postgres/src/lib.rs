//! `PostgreSQL` event store reader for the equipment search indexer.
//!
//! The equipment service persists its events with Marten, so every event lives in a single
//! append-only table:
//!
//! ```text
//! <schema>.mt_events
//!   seq_id     bigint        global, gap-free append order
//!   type       varchar       e.g. terminal_equipment_removed
//!   data       jsonb         event payload
//!   timestamp  timestamptz
//!   ...                      stream id, version, tenant (unused here)
//! ```
//!
//! [`PostgresEventStore`] implements the read side of `EventStore` over that table: full
//! replay in `seq_id` order followed by incremental catch-up from the last delivered
//! `seq_id`. It never writes.
//!
//! # Example
//!
//! ```ignore
//! use equipment_search_postgres::{DEFAULT_MAX_CONNECTIONS, PostgresEventStore};
//!
//! async fn example() -> Result<(), Box<dyn std::error::Error>> {
//!     let event_store =
//!         PostgresEventStore::connect("postgres://localhost/equipment", DEFAULT_MAX_CONNECTIONS)
//!             .await?;
//!     Ok(())
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod event_store;

pub use event_store::{
    DEFAULT_MAX_CONNECTIONS, DEFAULT_PAGE_SIZE, DEFAULT_SCHEMA, PostgresEventStore,
};
