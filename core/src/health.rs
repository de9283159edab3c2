//! Process health signalling.
//!
//! The indexer reports itself healthy exactly once, after the new collection has been
//! populated and aliased. What "healthy" means to the outside world (a marker file for a
//! liveness probe, a flag in tests) is up to the implementation.

use std::future::Future;

/// Signals process health to an external observer.
pub trait HealthMarker: Send + Sync {
    /// Mark the process as healthy.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the signal cannot be written.
    fn mark_healthy(&self) -> impl Future<Output = std::io::Result<()>> + Send;
}
