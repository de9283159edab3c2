//! File-based liveness marker.

use equipment_search_core::health::HealthMarker;
use std::io;
use std::path::{Path, PathBuf};

/// Marks the process healthy by creating a file a liveness probe checks for.
#[derive(Debug, Clone)]
pub struct FileHealthMarker {
    path: PathBuf,
}

impl FileHealthMarker {
    /// Marker at `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the marker file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Remove a marker left behind by a previous run in the same container.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if an existing marker cannot be removed.
    pub async fn reset(&self) -> io::Result<()> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => {
                tracing::debug!(path = %self.path.display(), "Removed stale health marker");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }
}

impl HealthMarker for FileHealthMarker {
    async fn mark_healthy(&self) -> io::Result<()> {
        tokio::fs::write(&self.path, b"healthy\n").await?;
        tracing::debug!(path = %self.path.display(), "Health marker written");
        Ok(())
    }
}
