//! Read-only event store over a Marten `mt_events` table.

use chrono::{DateTime, Utc};
use equipment_search_core::event::SerializedEvent;
use equipment_search_core::event_store::{EventStore, EventStoreError};
use equipment_search_core::projection::{EventPosition, Projection};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use std::sync::{Mutex, PoisonError};
use std::time::Instant;

/// Default schema holding `mt_events`.
pub const DEFAULT_SCHEMA: &str = "events";

/// Default number of rows fetched per query.
pub const DEFAULT_PAGE_SIZE: u32 = 1000;

/// Default connection pool size.
pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;

/// One row of `mt_events`.
#[derive(Debug)]
struct StoredEvent {
    seq_id: i64,
    event_type: String,
    data: String,
    timestamp: DateTime<Utc>,
}

/// `PostgreSQL` event store reading the append-only `mt_events` table.
///
/// Events are read in `seq_id` order, filtered to the types the projection subscribes to,
/// in pages of `page_size` rows. The store remembers the `seq_id` of the last delivered
/// event so [`EventStore::catch_up`] resumes right after it.
///
/// # Example
///
/// ```no_run
/// use equipment_search_postgres::PostgresEventStore;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let store = PostgresEventStore::connect("postgres://localhost/equipment", 5)
///     .await?
///     .with_schema("events")?
///     .with_page_size(500);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct PostgresEventStore {
    pool: PgPool,
    schema: String,
    page_size: u32,
    position: Mutex<Option<EventPosition>>,
}

impl PostgresEventStore {
    /// Connect with a pool of at most `max_connections` connections.
    ///
    /// # Errors
    ///
    /// Returns [`EventStoreError::DatabaseError`] if the connection fails.
    pub async fn connect(
        database_url: &str,
        max_connections: u32,
    ) -> Result<Self, EventStoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(|e| EventStoreError::DatabaseError(format!("Failed to connect: {e}")))?;
        tracing::info!(max_connections, "Connected to event store");
        Ok(Self::from_pool(pool))
    }

    /// Use an existing pool, with the default schema and page size.
    #[must_use]
    pub fn from_pool(pool: PgPool) -> Self {
        Self {
            pool,
            schema: DEFAULT_SCHEMA.to_string(),
            page_size: DEFAULT_PAGE_SIZE,
            position: Mutex::new(None),
        }
    }

    /// Read `mt_events` from `schema` instead of the default.
    ///
    /// # Errors
    ///
    /// Returns [`EventStoreError::InvalidOperation`] if `schema` is not a plain SQL
    /// identifier (letters, digits and underscores, not starting with a digit).
    pub fn with_schema(mut self, schema: impl Into<String>) -> Result<Self, EventStoreError> {
        let schema = schema.into();
        if !is_identifier(&schema) {
            return Err(EventStoreError::InvalidOperation(format!(
                "Invalid event store schema name: {schema:?}"
            )));
        }
        self.schema = schema;
        Ok(self)
    }

    /// Fetch `page_size` rows per query (at least one).
    #[must_use]
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// The underlying connection pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn set_position(&self, position: Option<EventPosition>) {
        *self.position.lock().unwrap_or_else(PoisonError::into_inner) = position;
    }

    fn last_seq_id(&self) -> Result<i64, EventStoreError> {
        self.position()
            .map_or(Ok(0), |position| i64::try_from(position.offset))
            .map_err(|e| EventStoreError::InvalidOperation(format!("Position out of range: {e}")))
    }

    async fn fetch_page(
        &self,
        after: i64,
        event_types: &[String],
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        let query = format!(
            r"
            SELECT seq_id, type, data::text AS data, timestamp
            FROM {}.mt_events
            WHERE seq_id > $1 AND type = ANY($2)
            ORDER BY seq_id
            LIMIT $3
            ",
            self.schema
        );

        let started = Instant::now();
        let rows = sqlx::query(&query)
            .bind(after)
            .bind(event_types)
            .bind(i64::from(self.page_size))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| EventStoreError::DatabaseError(e.to_string()))?;
        metrics::histogram!("event_store.load.duration_seconds")
            .record(started.elapsed().as_secs_f64());

        rows.iter()
            .map(|row| {
                Ok(StoredEvent {
                    seq_id: row.try_get("seq_id")?,
                    event_type: row.try_get("type")?,
                    data: row.try_get("data")?,
                    timestamp: row.try_get("timestamp")?,
                })
            })
            .collect::<Result<Vec<_>, sqlx::Error>>()
            .map_err(|e| EventStoreError::SerializationError(e.to_string()))
    }

    /// Deliver every subscribed event after `after` to `projection`.
    async fn deliver<P: Projection>(
        &self,
        projection: &mut P,
        mut after: i64,
    ) -> Result<u64, EventStoreError> {
        let event_types: Vec<String> = projection
            .event_types()
            .iter()
            .map(|event_type| (*event_type).to_string())
            .collect();

        let mut delivered = 0;
        loop {
            let page = self.fetch_page(after, &event_types).await?;
            let complete = page.len() < self.page_size as usize;
            let count = page.len() as u64;

            for row in page {
                let event = SerializedEvent::new(row.event_type, row.data.into_bytes(), None);
                projection.apply_event(&event).await?;

                after = row.seq_id;
                let offset = u64::try_from(row.seq_id).map_err(|e| {
                    EventStoreError::SerializationError(format!("Negative seq_id: {e}"))
                })?;
                self.set_position(Some(EventPosition::new(offset, row.timestamp)));
                delivered += 1;
            }

            metrics::counter!("event_store.events.loaded").increment(count);
            if complete {
                break;
            }
        }

        Ok(delivered)
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|first| first.is_ascii_alphabetic() || first == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

impl EventStore for PostgresEventStore {
    async fn replay_all<P: Projection>(&self, projection: &mut P) -> Result<u64, EventStoreError> {
        tracing::info!(
            projection = projection.name(),
            schema = %self.schema,
            page_size = self.page_size,
            "Replaying all events"
        );
        self.set_position(None);

        let delivered = self.deliver(projection, 0).await?;
        projection.replay_finished().await?;

        tracing::info!(
            projection = projection.name(),
            events = delivered,
            position = ?self.position(),
            "Replay finished"
        );
        Ok(delivered)
    }

    async fn catch_up<P: Projection>(&self, projection: &mut P) -> Result<u64, EventStoreError> {
        let after = self.last_seq_id()?;
        let delivered = self.deliver(projection, after).await?;
        if delivered > 0 {
            tracing::debug!(
                projection = projection.name(),
                events = delivered,
                after,
                "Caught up"
            );
        }
        Ok(delivered)
    }

    fn position(&self) -> Option<EventPosition> {
        *self.position.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
