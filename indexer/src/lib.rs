//! Process wiring for the equipment search indexer.
//!
//! The binary reads [`Config`] from the environment, installs logging and (optionally)
//! the Prometheus exporter, then runs one
//! [`IndexLifecycle`](equipment_search_projections::IndexLifecycle) against Postgres and
//! Typesense until SIGINT or SIGTERM.

pub mod config;
pub mod health;
pub mod metrics;
pub mod telemetry;

pub use config::{Config, ConfigError, LogFormat};
pub use health::FileHealthMarker;
