//! Configuration types for favorites-dl

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Extraction service settings
///
/// Controls where link-resolution requests are sent and which quality
/// preferences are requested.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Endpoint receiving link-resolution requests (default: "http://localhost:9000/")
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Timeout for a single resolution request (default: 30 seconds)
    #[serde(default = "default_request_timeout", with = "duration_ms_serde")]
    pub request_timeout: Duration,

    /// Requested video quality (default: "max")
    #[serde(default = "default_video_quality")]
    pub video_quality: String,

    /// Prefer H.265 encoded video when the service offers it (default: true)
    #[serde(default = "default_true")]
    pub h265: bool,

    /// Requested audio format (default: "best")
    #[serde(default = "default_audio_format")]
    pub audio_format: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            request_timeout: default_request_timeout(),
            video_quality: default_video_quality(),
            h265: true,
            audio_format: default_audio_format(),
        }
    }
}

/// Filesystem locations used by a run
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Exported activity document (default: "user_data_tiktok.json")
    #[serde(default = "default_export_file")]
    pub export_file: PathBuf,

    /// Directory receiving numbered output videos (default: "downloads")
    #[serde(default = "default_download_dir")]
    pub download_dir: PathBuf,

    /// Scratch directory for gallery assets, removed after each slideshow (default: "img_dir")
    #[serde(default = "default_scratch_dir")]
    pub scratch_dir: PathBuf,

    /// File holding the last claimed link (default: "last_downloaded_link.txt")
    #[serde(default = "default_cursor_file")]
    pub cursor_file: PathBuf,

    /// Bundled audio used when a gallery has no usable audio (default: "default.mp3")
    #[serde(default = "default_default_audio")]
    pub default_audio: PathBuf,

    /// Extension of finished videos, without the dot (default: "mp4")
    #[serde(default = "default_video_extension")]
    pub video_extension: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            export_file: default_export_file(),
            download_dir: default_download_dir(),
            scratch_dir: default_scratch_dir(),
            cursor_file: default_cursor_file(),
            default_audio: default_default_audio(),
            video_extension: default_video_extension(),
        }
    }
}

/// Retry configuration for transient transfer failures
///
/// The defaults describe a fixed delay: a multiplier of 1.0 keeps every wait
/// equal to `delay`. Raising the multiplier turns it into exponential backoff
/// capped at `max_delay`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total number of attempts, including the first one (default: 5)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before the next attempt (default: 500 milliseconds)
    #[serde(default = "default_retry_delay", with = "duration_ms_serde")]
    pub delay: Duration,

    /// Maximum delay between attempts (default: 30 seconds)
    #[serde(default = "default_max_delay", with = "duration_ms_serde")]
    pub max_delay: Duration,

    /// Multiplier applied to the delay after each attempt (default: 1.0)
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Add random jitter to delays (default: false)
    #[serde(default)]
    pub jitter: bool,

    /// Size of the write buffer used when streaming to disk (default: 1024 bytes)
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            delay: default_retry_delay(),
            max_delay: default_max_delay(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter: false,
            chunk_size: default_chunk_size(),
        }
    }
}

/// Slideshow synthesis settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SlideshowConfig {
    /// Canonical frame width (default: 1280)
    #[serde(default = "default_target_width")]
    pub target_width: u32,

    /// Canonical frame height (default: 720)
    #[serde(default = "default_target_height")]
    pub target_height: u32,

    /// How long each image stays on screen (default: 2500 milliseconds)
    #[serde(default = "default_image_duration", with = "duration_ms_serde")]
    pub image_duration: Duration,

    /// Output frame rate (default: 24)
    #[serde(default = "default_fps")]
    pub fps: u32,

    /// ffmpeg video encoder name (default: "libx264")
    #[serde(default = "default_video_codec")]
    pub video_codec: String,

    /// ffmpeg audio encoder name (default: "aac")
    #[serde(default = "default_audio_codec")]
    pub audio_codec: String,

    /// Path to the ffmpeg executable (auto-detected if None)
    #[serde(default)]
    pub ffmpeg_path: Option<PathBuf>,

    /// Path to the ffprobe executable (auto-detected if None)
    #[serde(default)]
    pub ffprobe_path: Option<PathBuf>,
}

impl Default for SlideshowConfig {
    fn default() -> Self {
        Self {
            target_width: default_target_width(),
            target_height: default_target_height(),
            image_duration: default_image_duration(),
            fps: default_fps(),
            video_codec: default_video_codec(),
            audio_codec: default_audio_codec(),
            ffmpeg_path: None,
            ffprobe_path: None,
        }
    }
}

impl SlideshowConfig {
    /// Canonical frame size as (width, height)
    pub fn target_size(&self) -> (u32, u32) {
        (self.target_width, self.target_height)
    }
}

/// Host rewrite applied when canonicalizing exported links
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostAlias {
    /// Host (or host suffix) as it appears in the export, e.g. "tiktokv.com"
    pub from: String,
    /// Canonical replacement, e.g. "tiktok.com"
    pub to: String,
}

/// Main configuration for a run
///
/// Every component receives the part of this structure it needs, so tests
/// can point a run at temporary directories and a mock service.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// Pause between links to bound the request rate (default: 500 milliseconds)
    #[serde(default = "default_link_delay", with = "duration_ms_serde")]
    pub link_delay: Duration,

    /// Host rewrites that make app-domain and web-domain links compare equal
    #[serde(default = "default_host_aliases")]
    pub host_aliases: Vec<HostAlias>,

    /// Extraction service settings
    #[serde(default)]
    pub service: ServiceConfig,

    /// File and directory locations
    #[serde(default)]
    pub paths: PathsConfig,

    /// Transfer retry policy
    #[serde(default)]
    pub retry: RetryConfig,

    /// Slideshow synthesis settings
    #[serde(default)]
    pub slideshow: SlideshowConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            link_delay: default_link_delay(),
            host_aliases: default_host_aliases(),
            service: ServiceConfig::default(),
            paths: PathsConfig::default(),
            retry: RetryConfig::default(),
            slideshow: SlideshowConfig::default(),
        }
    }
}

impl Config {
    /// Load a configuration from a TOML file
    ///
    /// Missing keys fall back to their defaults. The result is validated before
    /// being returned.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| Error::Config {
            message: format!("cannot read {}: {}", path.display(), e),
            key: None,
        })?;
        let config: Config = toml::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Check values that would make a run meaningless
    pub fn validate(&self) -> Result<()> {
        fn invalid(key: &str, message: &str) -> Error {
            Error::Config {
                message: message.to_string(),
                key: Some(key.to_string()),
            }
        }

        if self.retry.max_attempts == 0 {
            return Err(invalid(
                "retry.max_attempts",
                "at least one attempt is required",
            ));
        }
        if !self.retry.backoff_multiplier.is_finite() || self.retry.backoff_multiplier < 1.0 {
            return Err(invalid(
                "retry.backoff_multiplier",
                "backoff multiplier must be at least 1.0",
            ));
        }
        if self.retry.chunk_size == 0 {
            return Err(invalid("retry.chunk_size", "chunk size must be non-zero"));
        }
        if self.slideshow.target_width == 0 || self.slideshow.target_height == 0 {
            return Err(invalid(
                "slideshow.target_width",
                "target resolution must be non-zero in both dimensions",
            ));
        }
        if self.slideshow.fps == 0 {
            return Err(invalid("slideshow.fps", "fps must be greater than zero"));
        }
        if self.slideshow.image_duration.is_zero() {
            return Err(invalid(
                "slideshow.image_duration",
                "image duration must be greater than zero",
            ));
        }
        let ext = self.paths.video_extension.trim_start_matches('.');
        if ext.is_empty() {
            return Err(invalid(
                "paths.video_extension",
                "video extension must not be empty",
            ));
        }
        // The scratch directory is wiped before every gallery
        let scratch = comparable_path(&self.paths.scratch_dir);
        if comparable_path(&self.paths.download_dir).starts_with(&scratch) {
            return Err(invalid(
                "paths.scratch_dir",
                "scratch directory must not be or contain the download directory",
            ));
        }
        url::Url::parse(&self.service.api_url).map_err(|e| Error::Config {
            message: format!("invalid service URL: {e}"),
            key: Some("service.api_url".to_string()),
        })?;
        Ok(())
    }

    /// Extension of finished videos without a leading dot
    pub fn video_extension(&self) -> &str {
        self.paths.video_extension.trim_start_matches('.')
    }
}

/// Absolute form of `path` with `.` components dropped, for overlap checks
fn comparable_path(path: &Path) -> PathBuf {
    let absolute = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
    absolute
        .components()
        .filter(|c| !matches!(c, std::path::Component::CurDir))
        .collect()
}

fn default_api_url() -> String {
    "http://localhost:9000/".to_string()
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_video_quality() -> String {
    "max".to_string()
}

fn default_audio_format() -> String {
    "best".to_string()
}

fn default_true() -> bool {
    true
}

fn default_export_file() -> PathBuf {
    PathBuf::from("user_data_tiktok.json")
}

fn default_download_dir() -> PathBuf {
    PathBuf::from("downloads")
}

fn default_scratch_dir() -> PathBuf {
    PathBuf::from("img_dir")
}

fn default_cursor_file() -> PathBuf {
    PathBuf::from("last_downloaded_link.txt")
}

fn default_default_audio() -> PathBuf {
    PathBuf::from("default.mp3")
}

fn default_video_extension() -> String {
    "mp4".to_string()
}

fn default_max_attempts() -> u32 {
    5
}

fn default_retry_delay() -> Duration {
    Duration::from_millis(500)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(30)
}

fn default_backoff_multiplier() -> f64 {
    1.0
}

fn default_chunk_size() -> usize {
    1024
}

fn default_target_width() -> u32 {
    1280
}

fn default_target_height() -> u32 {
    720
}

fn default_image_duration() -> Duration {
    Duration::from_millis(2500)
}

fn default_fps() -> u32 {
    24
}

fn default_video_codec() -> String {
    "libx264".to_string()
}

fn default_audio_codec() -> String {
    "aac".to_string()
}

fn default_link_delay() -> Duration {
    Duration::from_millis(500)
}

fn default_host_aliases() -> Vec<HostAlias> {
    vec![HostAlias {
        from: "tiktokv.com".to_string(),
        to: "tiktok.com".to_string(),
    }]
}

// Durations are written as whole milliseconds
mod duration_ms_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
