//! Equipment projection and index lifecycle for the equipment search indexer.
//!
//! # Overview
//!
//! - [`events`]: the terminal equipment events the indexer decodes
//! - [`equipment`]: [`EquipmentProjection`], the dual-mode (bulk / catch-up) projection
//!   from events to search documents
//! - [`lifecycle`]: [`IndexLifecycle`], the create → replay → alias swap → cleanup →
//!   listen sequence that replaces a live index without downtime
//!
//! Both only depend on the collaborator traits in `equipment-search-core`, so they run
//! unchanged against Postgres and Typesense in production and against the in-memory
//! implementations of `equipment-search-testing` in tests.

pub mod equipment;
pub mod events;
pub mod lifecycle;

pub use equipment::{
    EquipmentProjection, EquipmentRecord, Execution, IMPORT_BATCH_SIZE, IndexTransition,
    ProjectionMode, SpecificationRegistry,
};
pub use events::{EquipmentEvent, EventKind, SUBSCRIBED_EVENT_TYPES};
pub use lifecycle::{
    IndexLifecycle, LifecycleError, LifecyclePhase, LifecycleSettings, ShutdownPolicy,
};
