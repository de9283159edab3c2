//! # Equipment Search Core
//!
//! Core traits and types for the equipment search indexer.
//!
//! The indexer keeps a search collection of equipment documents in sync with the equipment
//! event stream. This crate defines the seams between the moving parts:
//!
//! - [`event`]: stored events and decoding of domain events
//! - [`event_store`]: ordered full replay and incremental catch-up
//! - [`projection`]: consumers of the event stream
//! - [`search`]: write access to the search engine (collections, documents, aliases)
//! - [`health`]: readiness signalling
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐        ┌────────────────┐        ┌──────────────┐
//! │ EventStore  │ ─────▶ │   Projection   │ ─────▶ │ SearchIndex  │
//! │ (Postgres)  │ events │ (bulk/catchup) │ writes │ (Typesense)  │
//! └─────────────┘        └────────────────┘        └──────────────┘
//! ```
//!
//! Implementations live in sibling crates; in-memory versions for tests live in
//! `equipment-search-testing`.

// Re-export commonly used types
pub use chrono::{DateTime, Utc};
pub use serde::{Deserialize, Serialize};

/// Stored events and the domain event trait.
pub mod event;

/// Event store abstraction.
pub mod event_store;

/// Health signalling.
pub mod health;

/// Projection abstraction.
pub mod projection;

/// Search engine abstraction.
pub mod search;
