//! In-memory health marker.

use equipment_search_core::health::HealthMarker;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

#[derive(Debug, Default)]
struct Marker {
    healthy: AtomicBool,
    calls: AtomicUsize,
    failing: bool,
}

/// Health marker that records calls instead of touching the filesystem.
#[derive(Clone, Debug, Default)]
pub struct InMemoryHealthMarker {
    marker: Arc<Marker>,
}

impl InMemoryHealthMarker {
    /// Create an unmarked health marker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A marker whose `mark_healthy` always fails with a permission error.
    #[must_use]
    pub fn failing() -> Self {
        Self {
            marker: Arc::new(Marker {
                failing: true,
                ..Marker::default()
            }),
        }
    }

    /// Whether `mark_healthy` has succeeded at least once.
    #[must_use]
    pub fn is_healthy(&self) -> bool {
        self.marker.healthy.load(Ordering::SeqCst)
    }

    /// Number of `mark_healthy` calls, including failed ones.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.marker.calls.load(Ordering::SeqCst)
    }
}

impl HealthMarker for InMemoryHealthMarker {
    async fn mark_healthy(&self) -> std::io::Result<()> {
        self.marker.calls.fetch_add(1, Ordering::SeqCst);
        if self.marker.failing {
            return Err(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "health marker is read-only",
            ));
        }
        self.marker.healthy.store(true, Ordering::SeqCst);
        Ok(())
    }
}
