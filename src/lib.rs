//! # favorites-dl
//!
//! Resumable archiver for the videos and photo galleries a user has favorited.
//!
//! ## Design Philosophy
//!
//! favorites-dl is designed to be:
//! - **Resumable** - A cursor file remembers the last claimed link, so each run
//!   only handles favorites added since the previous one
//! - **Forgiving** - A broken link, a failed download or a failed encode is
//!   logged and skipped; the run always reaches the end of the list
//! - **Explicitly configured** - Every directory, retry count and size lives in
//!   [`Config`], so components can be driven against temp paths and stub servers
//!
//! ## Pipeline
//!
//! 1. [`cursor::LinkCursor`] reads the account export and claims the pending links
//! 2. [`resolver::ResolveClient`] asks the extraction service what each link is
//! 3. Direct videos are streamed to disk by [`fetcher::Fetcher`]
//! 4. Photo galleries are turned into a video by [`slideshow::SlideshowAssembler`]
//! 5. [`sequencer::OutputSequencer`] names each finished file `<N>.mp4`
//!
//! ## Quick Start
//!
//! ```no_run
//! use favorites_dl::{Archiver, Config};
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut config = Config::load(Path::new("favorites-dl.toml"))?;
//!     config.service.api_url = "http://localhost:9000/".to_string();
//!
//!     let archiver = Archiver::new(config)?;
//!     let summary = archiver.run().await?;
//!     println!("archived {} of {} links", summary.done, summary.total());
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Configuration types
pub mod config;
/// Export parsing and resume cursor
pub mod cursor;
/// Error types
pub mod error;
/// Streaming downloads with retry
pub mod fetcher;
/// Per-link orchestration
pub mod pipeline;
/// Extraction service client
pub mod resolver;
/// Retry logic with configurable backoff
pub mod retry;
/// Output file numbering
pub mod sequencer;
/// Gallery to video assembly
pub mod slideshow;
/// Core types
pub mod types;
/// Utility functions
pub mod utils;

// Re-export commonly used types
pub use config::{Config, HostAlias, PathsConfig, RetryConfig, ServiceConfig, SlideshowConfig};
pub use cursor::{CursorStore, EmptyReason, LinkCursor, PendingLinks};
pub use error::{Error, FetchError, ResolveError, Result, SlideshowError};
pub use fetcher::Fetcher;
pub use pipeline::Archiver;
pub use resolver::ResolveClient;
pub use sequencer::OutputSequencer;
pub use slideshow::{FfmpegEncoder, NoOpEncoder, SlideshowAssembler, VideoEncoder};
pub use types::{
    ExportedLink, FailureReason, LinkOutcome, OutputSlot, Resolution, RunSummary, SlideshowPlan,
};

/// Run the archiver until it finishes or a termination signal arrives.
///
/// On a signal the in-flight link is abandoned: a running encoder is killed
/// and the scratch directory is removed. The cursor has already been advanced
/// past every claimed link, so the next run starts after them.
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
///
/// Returns `None` when the run was interrupted.
///
/// # Example
///
/// ```no_run
/// use favorites_dl::{Archiver, Config, run_with_shutdown};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let archiver = Archiver::new(Config::default())?;
///
///     if let Some(summary) = run_with_shutdown(&archiver).await? {
///         println!("{} archived", summary.done);
///     }
///
///     Ok(())
/// }
/// ```
pub async fn run_with_shutdown(archiver: &Archiver) -> Result<Option<RunSummary>> {
    tokio::select! {
        summary = archiver.run() => summary.map(Some),
        _ = wait_for_signal() => {
            tracing::warn!("run interrupted, the current link was abandoned");
            Ok(None)
        }
    }
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    match signal(SignalKind::terminate()) {
        Ok(mut sigterm) => {
            tokio::select! {
                _ = sigterm.recv() => tracing::info!("Received SIGTERM signal"),
                _ = ctrl_c() => tracing::info!("Received SIGINT signal (Ctrl+C)"),
            }
        }
        Err(e) => {
            tracing::warn!(error = %e, "Could not register SIGTERM handler, waiting for SIGINT only");
            ctrl_c().await;
            tracing::info!("Received SIGINT signal (Ctrl+C)");
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    ctrl_c().await;
    tracing::info!("Received Ctrl+C signal");
}

/// Resolves on Ctrl+C; never resolves if the handler cannot be installed
async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
        std::future::pending::<()>().await;
    }
}
