//! Zero-downtime rebuild and cutover of the equipment collection.
//!
//! # Overview
//!
//! Every process start builds a fresh collection generation and only then points the
//! public alias at it:
//!
//! ```text
//! Creating ──▶ BulkLoading ──▶ Swapping ──▶ Cleanup ──▶ Listening ──▶ Shutdown
//!    │              │              │            │            │
//!    └──────────────┴──────────────┴────────────┴────────────┴──▶ Failed
//! ```
//!
//! 1. **Creating**: create `<alias>-<uuid>` with the equipment schema
//! 2. **BulkLoading**: replay the full history through the projection (bulk import at the end)
//! 3. **Swapping**: point the alias at the new collection
//! 4. **Cleanup**: delete every older `<alias>-*` collection
//! 5. mark the process healthy
//! 6. **Listening**: poll catch-up until shutdown
//!
//! Any error before step 6 aborts startup and leaves the alias on the previous generation.
//! Errors while listening stop the lifecycle; nothing is retried.
//!
//! # Example
//!
//! ```ignore
//! let (lifecycle, shutdown) = IndexLifecycle::new(event_store, search, health, settings);
//!
//! tokio::spawn(async move {
//!     tokio::signal::ctrl_c().await.ok();
//!     shutdown.send(true).ok();
//! });
//!
//! lifecycle.run().await?;
//! ```

use crate::equipment::EquipmentProjection;
use equipment_search_core::event_store::{EventStore, EventStoreError};
use equipment_search_core::health::HealthMarker;
use equipment_search_core::projection::ProjectionError;
use equipment_search_core::search::{CollectionSchema, SearchIndex, SearchIndexError};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use uuid::Uuid;

/// Default pause between two catch-up polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Errors that stop the lifecycle.
#[derive(Error, Debug)]
pub enum LifecycleError {
    /// A search engine call failed outside of event processing.
    #[error("Search index error: {0}")]
    SearchIndex(#[from] SearchIndexError),

    /// Reading the event store failed.
    #[error("Event store error: {0}")]
    EventStore(EventStoreError),

    /// The projection rejected an event or the end of the replay.
    #[error("Projection error: {0}")]
    Projection(#[from] ProjectionError),

    /// The process could not be marked healthy.
    #[error("Health marker error: {0}")]
    Health(#[from] std::io::Error),
}

impl From<EventStoreError> for LifecycleError {
    fn from(error: EventStoreError) -> Self {
        match error {
            EventStoreError::Projection(e) => Self::Projection(e),
            other => Self::EventStore(other),
        }
    }
}

/// Result type for lifecycle operations.
pub type Result<T> = std::result::Result<T, LifecycleError>;

/// Lifecycle phase, published on a watch channel.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LifecyclePhase {
    /// Not started yet
    Idle,
    /// Creating the new collection generation
    Creating,
    /// Replaying the full history
    BulkLoading,
    /// Pointing the alias at the new generation
    Swapping,
    /// Deleting stale generations
    Cleanup,
    /// Polling catch-up
    Listening,
    /// Stopped after a shutdown signal
    Shutdown,
    /// Stopped by an error
    Failed(String),
}

/// What happens to the process-owned collection on graceful shutdown.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ShutdownPolicy {
    /// Leave the collection (and the alias pointing at it) in place.
    #[default]
    RetainCollection,
    /// Delete the collection this process created.
    DeleteCollection,
}

/// Lifecycle settings.
#[derive(Clone, Debug)]
pub struct LifecycleSettings {
    /// Stable alias consumers query
    pub alias: String,
    /// Allow-listed specification names
    pub specification_names: Vec<String>,
    /// Pause between catch-up polls
    pub poll_interval: Duration,
    /// Behavior on graceful shutdown
    pub shutdown_policy: ShutdownPolicy,
}

impl LifecycleSettings {
    /// Settings with the default poll interval and shutdown policy.
    #[must_use]
    pub fn new(alias: impl Into<String>, specification_names: Vec<String>) -> Self {
        Self {
            alias: alias.into(),
            specification_names,
            poll_interval: DEFAULT_POLL_INTERVAL,
            shutdown_policy: ShutdownPolicy::default(),
        }
    }

    /// Set the catch-up poll interval.
    #[must_use]
    pub const fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Set the shutdown policy.
    #[must_use]
    pub const fn with_shutdown_policy(mut self, shutdown_policy: ShutdownPolicy) -> Self {
        self.shutdown_policy = shutdown_policy;
        self
    }
}

/// A fresh, unique collection name for `alias`.
#[must_use]
pub fn generation_name(alias: &str) -> String {
    format!("{alias}-{}", Uuid::new_v4())
}

/// Drives one rebuild-and-cutover, then keeps the new generation up to date.
pub struct IndexLifecycle<E, S, H> {
    event_store: Arc<E>,
    search: Arc<S>,
    health: H,
    settings: LifecycleSettings,
    collection: String,
    phase: watch::Sender<LifecyclePhase>,
    shutdown: watch::Receiver<bool>,
}

impl<E, S, H> IndexLifecycle<E, S, H>
where
    E: EventStore,
    S: SearchIndex,
    H: HealthMarker,
{
    /// Create a lifecycle with a freshly named collection generation.
    ///
    /// Returns the lifecycle and a shutdown sender. Send `true` to stop listening.
    #[must_use]
    pub fn new(
        event_store: Arc<E>,
        search: Arc<S>,
        health: H,
        settings: LifecycleSettings,
    ) -> (Self, watch::Sender<bool>) {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (phase, _) = watch::channel(LifecyclePhase::Idle);
        let collection = generation_name(&settings.alias);

        let lifecycle = Self {
            event_store,
            search,
            health,
            settings,
            collection,
            phase,
            shutdown: shutdown_rx,
        };

        (lifecycle, shutdown_tx)
    }

    /// Name of the collection generation this lifecycle builds.
    #[must_use]
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Subscribe to phase changes.
    #[must_use]
    pub fn phases(&self) -> watch::Receiver<LifecyclePhase> {
        self.phase.subscribe()
    }

    fn enter(&self, phase: LifecyclePhase) {
        tracing::debug!(?phase, collection = %self.collection, "Entering lifecycle phase");
        self.phase.send_replace(phase);
    }

    /// Run the full lifecycle until shutdown or the first error.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError`] if any step fails. Failures before the alias swap leave
    /// the alias on the previous generation.
    pub async fn run(mut self) -> Result<()> {
        tracing::info!(
            alias = %self.settings.alias,
            collection = %self.collection,
            specifications = ?self.settings.specification_names,
            "Starting equipment search indexer"
        );

        let result = self.execute().await;
        match &result {
            Ok(()) => self.enter(LifecyclePhase::Shutdown),
            Err(e) => {
                tracing::error!(
                    error = %e,
                    collection = %self.collection,
                    "Index lifecycle failed"
                );
                self.enter(LifecyclePhase::Failed(e.to_string()));
            }
        }
        tracing::info!("Shutting down");
        result
    }

    async fn execute(&mut self) -> Result<()> {
        let mut projection = EquipmentProjection::new(
            Arc::clone(&self.search),
            self.collection.clone(),
            self.settings.specification_names.iter().cloned(),
        );

        self.enter(LifecyclePhase::Creating);
        tracing::info!(collection = %self.collection, "Creating collection");
        self.search
            .create_collection(&CollectionSchema::equipment(&self.collection))
            .await?;

        self.enter(LifecyclePhase::BulkLoading);
        tracing::info!("Start reading all events");
        let replayed = self.event_store.replay_all(&mut projection).await?;
        tracing::info!(events = replayed, "Initial event processing finished");

        self.enter(LifecyclePhase::Swapping);
        tracing::info!(
            alias = %self.settings.alias,
            collection = %self.collection,
            "Switching alias"
        );
        self.search
            .upsert_alias(&self.settings.alias, &self.collection)
            .await?;

        self.enter(LifecyclePhase::Cleanup);
        self.delete_stale_collections().await?;

        tracing::info!("Marking service as healthy");
        self.health.mark_healthy().await?;

        self.enter(LifecyclePhase::Listening);
        tracing::info!(interval = ?self.settings.poll_interval, "Start listening for new events");
        self.listen(&mut projection).await?;

        if self.settings.shutdown_policy == ShutdownPolicy::DeleteCollection {
            tracing::info!(collection = %self.collection, "Deleting collection on shutdown");
            self.search.delete_collection(&self.collection).await?;
        }
        Ok(())
    }

    /// Delete every `<alias>-*` collection except the current generation.
    ///
    /// Failing deletes are logged and skipped.
    async fn delete_stale_collections(&self) -> Result<()> {
        let prefix = format!("{}-", self.settings.alias);
        let stale: Vec<String> = self
            .search
            .list_collections()
            .await?
            .into_iter()
            .map(|summary| summary.name)
            .filter(|name| name.starts_with(&prefix) && *name != self.collection)
            .collect();

        for name in stale {
            tracing::info!(collection = %name, "Deleting old collection");
            if let Err(e) = self.search.delete_collection(&name).await {
                tracing::warn!(collection = %name, error = %e, "Failed to delete old collection");
            }
        }
        Ok(())
    }

    async fn listen(&mut self, projection: &mut EquipmentProjection<S>) -> Result<()> {
        loop {
            if *self.shutdown.borrow() {
                tracing::info!("Shutdown signal received");
                return Ok(());
            }

            let signalled = tokio::select! {
                () = tokio::time::sleep(self.settings.poll_interval) => false,
                changed = self.shutdown.changed() => {
                    if changed.is_err() {
                        // Sender dropped, so no signal can arrive anymore.
                        tokio::time::sleep(self.settings.poll_interval).await;
                    }
                    changed.is_ok()
                }
            };
            if signalled {
                continue;
            }

            let processed = self.event_store.catch_up(projection).await?;
            metrics::counter!("lifecycle.catch_up.polls").increment(1);
            if processed > 0 {
                tracing::info!(events = processed, "Processed {processed} new events");
            }
        }
    }
}
