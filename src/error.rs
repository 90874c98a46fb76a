//! Error types for favorites-dl
//!
//! This module provides the error taxonomy for the ingestion pipeline:
//! - Transport errors (network, HTTP status) that the fetcher may retry
//! - Service-reported failures from the extraction service
//! - Local resource errors (export document, images, encode)
//! - Configuration errors with the offending key

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for favorites-dl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for favorites-dl
///
/// This is the primary error type used throughout the library. Each variant includes
/// contextual information to help diagnose issues.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "slideshow.fps")
        key: Option<String>,
    },

    /// Configuration file could not be parsed
    #[error("failed to parse configuration: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// Media fetch error
    #[error("fetch error: {0}")]
    Fetch(#[from] FetchError),

    /// Extraction service error
    #[error("resolution error: {0}")]
    Resolve(#[from] ResolveError),

    /// Slideshow assembly error
    #[error("slideshow error: {0}")]
    Slideshow(#[from] SlideshowError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Network error
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// External tool execution failed (ffmpeg, ffprobe)
    #[error("external tool error: {0}")]
    ExternalTool(String),

    /// Operation not supported (missing binary, etc.)
    #[error("not supported: {0}")]
    NotSupported(String),

    /// Other error
    #[error("{0}")]
    Other(String),
}

/// Errors raised while streaming a remote resource to disk
#[derive(Debug, Error)]
pub enum FetchError {
    /// Server answered with a non-success status
    #[error("HTTP {status} fetching {url}")]
    HttpStatus {
        /// The requested URL
        url: String,
        /// The HTTP status code returned
        status: u16,
    },

    /// Transfer reported success but nothing was written
    #[error("empty body fetching {url}")]
    EmptyBody {
        /// The requested URL
        url: String,
    },

    /// Destination file could not be written
    #[error("failed to write {path}: {reason}")]
    WriteFailed {
        /// The destination path
        path: PathBuf,
        /// The underlying reason
        reason: String,
    },
}

/// Errors raised by the extraction service client
#[derive(Debug, Error)]
pub enum ResolveError {
    /// Response body was not the documented JSON shape
    #[error("malformed service response for {link}: {reason}")]
    MalformedResponse {
        /// The link that was being resolved
        link: String,
        /// What was wrong with the body
        reason: String,
    },
}

/// Errors raised while assembling a slideshow video
#[derive(Debug, Error)]
pub enum SlideshowError {
    /// No usable images were available
    #[error("no images to assemble")]
    NoImages,

    /// The bundled fallback audio file is missing
    #[error("default audio asset not found at {path}")]
    DefaultAudioMissing {
        /// Configured location of the default audio asset
        path: PathBuf,
    },

    /// Image could not be decoded, resized or re-encoded
    #[error("failed to normalize {path}: {reason}")]
    NormalizeFailed {
        /// The image that failed
        path: PathBuf,
        /// The underlying reason
        reason: String,
    },

    /// Audio track duration could not be determined or is zero
    #[error("unusable audio track {path}: {reason}")]
    InvalidAudio {
        /// The audio file
        path: PathBuf,
        /// The underlying reason
        reason: String,
    },

    /// The encoder process failed
    #[error("encoding {output} failed: {reason}")]
    EncodeFailed {
        /// The output file that was being produced
        output: PathBuf,
        /// The underlying reason
        reason: String,
    },
}
