//! Core types for favorites-dl

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// A favorited post link taken from the export document
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExportedLink {
    /// The link exactly as it appears in the export
    pub raw: String,
    /// Host-normalized form used for cursor comparison and service requests
    pub canonical: String,
}

impl std::fmt::Display for ExportedLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.canonical)
    }
}

/// Why the extraction service could not resolve a link
#[derive(Clone, Debug, PartialEq)]
pub enum FailureReason {
    /// The service answered with `status: "error"` and this payload
    Service(serde_json::Value),
    /// The service answered with a non-success HTTP status
    Http {
        /// HTTP status code
        status: u16,
        /// Response body, for the log
        body: String,
    },
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureReason::Service(payload) => write!(f, "service error: {payload}"),
            FailureReason::Http { status, body } => write!(f, "HTTP {status}: {body}"),
        }
    }
}

/// The extraction service's answer for one link
#[derive(Clone, Debug, PartialEq)]
pub enum Resolution {
    /// A single video reachable at `media_url` (redirect or tunnel)
    Direct {
        /// Directly fetchable media URL
        media_url: String,
    },
    /// An image carousel with an optional shared audio track
    Gallery {
        /// Image URLs in display order
        image_urls: Vec<String>,
        /// Shared audio track, if the post has one
        audio_url: Option<String>,
    },
    /// The service could not resolve the link
    Failure(FailureReason),
    /// The response shape is not one this pipeline handles
    Unrecognized {
        /// The `status` value as received (empty if absent)
        raw_status: String,
        /// Why the response was not accepted
        detail: String,
    },
}

impl Resolution {
    /// Short name of the active variant for logs
    pub fn kind(&self) -> &'static str {
        match self {
            Resolution::Direct { .. } => "direct",
            Resolution::Gallery { .. } => "gallery",
            Resolution::Failure(_) => "failure",
            Resolution::Unrecognized { .. } => "unrecognized",
        }
    }
}

/// Identifier of a finished output file
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OutputSlot(pub u64);

impl OutputSlot {
    /// Get the inner value
    pub fn get(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for OutputSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Everything needed to encode one slideshow
#[derive(Clone, Debug, PartialEq)]
pub struct SlideshowPlan {
    /// Normalized frames in display order
    pub images: Vec<PathBuf>,
    /// How long each frame stays on screen
    pub image_duration: Duration,
    /// Audio track to loop and trim under the frames
    pub audio: PathBuf,
}

impl SlideshowPlan {
    /// Total running time: image count × per-image duration
    pub fn total_duration(&self) -> Duration {
        self.image_duration * self.images.len() as u32
    }
}

/// Terminal state of one link
#[derive(Clone, Debug, PartialEq)]
pub enum LinkOutcome {
    /// An output file was written
    Done {
        /// The slot that was consumed
        slot: OutputSlot,
        /// Path of the finished file
        path: PathBuf,
    },
    /// Processing started but produced no output
    Failed {
        /// Slot consumed before the failure, if the write step was reached
        slot: Option<OutputSlot>,
        /// Human-readable cause
        reason: String,
    },
    /// The link was not processable (service failure or unsupported response)
    Skipped {
        /// Human-readable cause
        reason: String,
    },
}

/// Counts of link outcomes for one run
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Links that produced an output file
    pub done: usize,
    /// Links that failed after resolving
    pub failed: usize,
    /// Links skipped because of the service response
    pub skipped: usize,
}

impl RunSummary {
    /// Record one outcome
    pub fn record(&mut self, outcome: &LinkOutcome) {
        match outcome {
            LinkOutcome::Done { .. } => self.done += 1,
            LinkOutcome::Failed { .. } => self.failed += 1,
            LinkOutcome::Skipped { .. } => self.skipped += 1,
        }
    }

    /// Number of links attempted
    pub fn total(&self) -> usize {
        self.done + self.failed + self.skipped
    }
}
