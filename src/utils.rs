//! Utility functions for scratch files and path naming

use crate::error::Result;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Name of the file gallery audio is downloaded to
pub const GALLERY_AUDIO_FILE: &str = "audio.mp3";

/// File name for the gallery image at `index`
///
/// # Examples
///
/// ```
/// use favorites_dl::utils::slide_file_name;
///
/// assert_eq!(slide_file_name(0), "slide_0.jpg");
/// assert_eq!(slide_file_name(12), "slide_12.jpg");
/// ```
#[must_use]
pub fn slide_file_name(index: usize) -> String {
    format!("slide_{index}.jpg")
}

/// A directory that exists for the lifetime of this value
///
/// Created (with parents) by [`ScratchDir::create`] and removed with all of its
/// contents when dropped, on both the success and the error path.
#[derive(Debug)]
pub struct ScratchDir {
    path: PathBuf,
}

impl ScratchDir {
    /// Create `path` and take ownership of its removal
    ///
    /// Leftovers from an interrupted earlier run are cleared first.
    pub fn create(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if path.exists() {
            debug!(?path, "clearing stale scratch directory");
            std::fs::remove_dir_all(&path)?;
        }
        std::fs::create_dir_all(&path)?;
        Ok(Self { path })
    }

    /// Directory path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path of `name` inside the directory
    pub fn join(&self, name: impl AsRef<Path>) -> PathBuf {
        self.path.join(name)
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        match std::fs::remove_dir_all(&self.path) {
            Ok(()) => debug!(path = ?self.path, "removed scratch directory"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = ?self.path, error = %e, "failed to remove scratch directory"),
        }
    }
}

/// Remove a file that may or may not exist, logging other failures
pub async fn remove_if_exists(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!(?path, "removed incomplete output"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(?path, error = %e, "failed to remove incomplete output"),
    }
}
