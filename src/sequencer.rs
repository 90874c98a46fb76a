//! Output numbering
//!
//! Finished videos are named `<N>.<ext>`. The sequencer finds the highest `N`
//! already present and hands out the numbers after it, one per written
//! artifact.

use crate::types::OutputSlot;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Numeric stem of `file_name` if it is `<digits>.<ext>`
///
/// The extension comparison is case-insensitive.
pub fn slot_from_file_name(file_name: &str, extension: &str) -> Option<u64> {
    let (stem, ext) = file_name.rsplit_once('.')?;
    if !ext.eq_ignore_ascii_case(extension) {
        return None;
    }
    if stem.is_empty() || !stem.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    stem.parse().ok()
}

/// Next free slot in `dir`: one past the highest `<N>.<ext>`, or 1
///
/// A missing directory counts as empty. Non-matching names are ignored.
pub fn next_free_slot(dir: &Path, extension: &str) -> OutputSlot {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return OutputSlot(1),
        Err(e) => {
            warn!(?dir, error = %e, "cannot list output directory, numbering from 1");
            return OutputSlot(1);
        }
    };

    let highest = entries
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| {
            let name = entry.file_name();
            slot_from_file_name(name.to_str()?, extension)
        })
        .max()
        .unwrap_or(0);

    OutputSlot(highest.saturating_add(1))
}

/// Hands out output slots for one run
///
/// The directory is scanned once; each [`reserve`](Self::reserve) consumes one
/// number, whether or not the artifact is eventually written.
#[derive(Debug)]
pub struct OutputSequencer {
    dir: PathBuf,
    extension: String,
    next: OutputSlot,
}

impl OutputSequencer {
    /// Scan `dir` and start after the highest existing number
    pub fn scan(dir: impl Into<PathBuf>, extension: impl Into<String>) -> Self {
        let dir = dir.into();
        let extension = extension.into();
        let next = next_free_slot(&dir, &extension);
        debug!(?dir, next = %next, "output numbering initialized");
        Self {
            dir,
            extension,
            next,
        }
    }

    /// The slot the next reservation will return
    pub fn peek(&self) -> OutputSlot {
        self.next
    }

    /// Consume the next slot, returning it with its output path
    pub fn reserve(&mut self) -> (OutputSlot, PathBuf) {
        let slot = self.next;
        self.next = OutputSlot(slot.0 + 1);
        (slot, self.path_for(slot))
    }

    /// Output path for `slot`
    pub fn path_for(&self, slot: OutputSlot) -> PathBuf {
        self.dir.join(format!("{}.{}", slot.0, self.extension))
    }
}
