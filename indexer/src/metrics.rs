//! Prometheus exporter for the indexer's metrics.
//!
//! # Exported Metrics
//!
//! ## Counters
//! - `projection.events.applied{event_type}` - Events applied by the equipment projection
//! - `search.documents.upserted` / `updated` / `deleted` - Single-document mutations
//! - `search.documents.imported` - Documents written by bulk import
//! - `event_store.events.loaded` - Rows read from `mt_events`
//! - `lifecycle.catch_up.polls` - Catch-up polls executed
//!
//! ## Histograms
//! - `event_store.load.duration_seconds` - Time spent reading one page of events

use metrics::{describe_counter, describe_histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder};
use std::net::SocketAddr;
use thiserror::Error;

/// Errors from metrics setup.
#[derive(Error, Debug)]
pub enum MetricsError {
    /// Failed to build metrics exporter
    #[error("Failed to build metrics exporter: {0}")]
    Build(String),
    /// Failed to install metrics exporter
    #[error("Failed to install metrics exporter: {0}")]
    Install(String),
}

/// Install the Prometheus recorder and serve `/metrics` on `addr`.
///
/// Must be called from within a Tokio runtime.
///
/// # Errors
///
/// Returns [`MetricsError`] if the exporter cannot be built or a recorder is already
/// installed.
pub fn start(addr: SocketAddr) -> Result<(), MetricsError> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .set_buckets_for_metric(
            Matcher::Suffix("duration_seconds".to_string()),
            &[0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0],
        )
        .map_err(|e| MetricsError::Build(e.to_string()))?
        .install()
        .map_err(|e| MetricsError::Install(e.to_string()))?;

    register_metrics();
    tracing::info!(%addr, "Metrics available at http://{addr}/metrics");
    Ok(())
}

/// Register descriptions for every metric the indexer records.
pub fn register_metrics() {
    describe_counter!(
        "projection.events.applied",
        "Events applied by the equipment projection, by event type"
    );
    describe_counter!(
        "search.documents.upserted",
        "Documents upserted while catching up"
    );
    describe_counter!(
        "search.documents.updated",
        "Documents renamed while catching up"
    );
    describe_counter!(
        "search.documents.deleted",
        "Documents deleted while catching up"
    );
    describe_counter!(
        "search.documents.imported",
        "Documents written by the bulk import after replay"
    );
    describe_counter!(
        "event_store.events.loaded",
        "Events read from the event store"
    );
    describe_histogram!(
        "event_store.load.duration_seconds",
        "Time spent reading one page of events"
    );
    describe_counter!("lifecycle.catch_up.polls", "Catch-up polls executed");
}
