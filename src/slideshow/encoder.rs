//! Video encoding backends

use super::audio::AudioLoop;
use crate::config::SlideshowConfig;
use crate::error::{Error, Result, SlideshowError};
use async_trait::async_trait;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

/// Name of the frame list written next to the frames
const CONCAT_LIST_FILE: &str = "frames.ffconcat";

/// Number of trailing stderr lines kept in an encode error
const STDERR_TAIL_LINES: usize = 20;

/// Everything needed to turn normalized frames and one audio track into a video
#[derive(Debug, Clone)]
pub struct EncodeJob {
    /// Normalized frames, in display order
    pub frames: Vec<PathBuf>,
    /// How long each frame stays on screen
    pub frame_duration: Duration,
    /// Output frame rate
    pub fps: u32,
    /// Size every frame is fitted and padded to, as (width, height)
    pub frame_size: (u32, u32),
    /// Audio track to loop under the frames
    pub audio: PathBuf,
    /// Loop-then-trim plan for `audio`
    pub audio_loop: AudioLoop,
    /// Destination video file
    pub output: PathBuf,
    /// Directory for intermediate files
    pub work_dir: PathBuf,
}

/// Trait for slideshow video encoding
///
/// Implementations probe audio tracks and write finished videos. The pipeline
/// only talks to this trait, so tests can substitute an encoder that records
/// jobs instead of running external binaries.
#[async_trait]
pub trait VideoEncoder: Send + Sync {
    /// Length of the audio track at `audio`
    ///
    /// # Errors
    ///
    /// Returns [`SlideshowError::InvalidAudio`] when the file cannot be probed.
    async fn audio_duration(&self, audio: &Path) -> Result<Duration>;

    /// Encode `job` into `job.output`
    ///
    /// # Errors
    ///
    /// Returns [`SlideshowError::EncodeFailed`] when the encoder exits
    /// unsuccessfully, or [`Error::ExternalTool`] when it cannot be started.
    async fn encode(&self, job: &EncodeJob) -> Result<()>;

    /// Human-readable name for logging
    fn name(&self) -> &'static str;
}

/// Encoder driving the external `ffmpeg` and `ffprobe` binaries
///
/// # Examples
///
/// ```no_run
/// use favorites_dl::config::SlideshowConfig;
/// use favorites_dl::slideshow::{FfmpegEncoder, VideoEncoder};
/// use std::path::Path;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let encoder = FfmpegEncoder::from_config(&SlideshowConfig::default())?;
/// let length = encoder.audio_duration(Path::new("default.mp3")).await?;
/// println!("{length:?}");
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct FfmpegEncoder {
    ffmpeg: PathBuf,
    ffprobe: PathBuf,
    video_codec: String,
    audio_codec: String,
}

impl FfmpegEncoder {
    /// Create an encoder with explicit binary paths and codecs
    pub fn new(
        ffmpeg: PathBuf,
        ffprobe: PathBuf,
        video_codec: impl Into<String>,
        audio_codec: impl Into<String>,
    ) -> Self {
        Self {
            ffmpeg,
            ffprobe,
            video_codec: video_codec.into(),
            audio_codec: audio_codec.into(),
        }
    }

    /// Build from configuration, searching PATH for binaries not set explicitly
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotSupported`] when a binary cannot be located.
    pub fn from_config(config: &SlideshowConfig) -> Result<Self> {
        let locate = |configured: &Option<PathBuf>, name: &str| match configured {
            Some(path) => Ok(path.clone()),
            None => which::which(name)
                .map_err(|e| Error::NotSupported(format!("{name} not found in PATH: {e}"))),
        };

        Ok(Self::new(
            locate(&config.ffmpeg_path, "ffmpeg")?,
            locate(&config.ffprobe_path, "ffprobe")?,
            config.video_codec.clone(),
            config.audio_codec.clone(),
        ))
    }
}

#[async_trait]
impl VideoEncoder for FfmpegEncoder {
    async fn audio_duration(&self, audio: &Path) -> Result<Duration> {
        let output = Command::new(&self.ffprobe)
            .args(["-v", "error"])
            .args(["-show_entries", "format=duration"])
            .args(["-of", "default=noprint_wrappers=1:nokey=1"])
            .arg(audio)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| Error::ExternalTool(format!("Failed to execute ffprobe: {}", e)))?;

        let invalid = |reason: String| SlideshowError::InvalidAudio {
            path: audio.to_path_buf(),
            reason,
        };

        if !output.status.success() {
            return Err(invalid(stderr_tail(&output.stderr)).into());
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        parse_probe_duration(&stdout).map_err(|reason| invalid(reason).into())
    }

    async fn encode(&self, job: &EncodeJob) -> Result<()> {
        let list_path = job.work_dir.join(CONCAT_LIST_FILE);
        tokio::fs::write(&list_path, concat_list(&job.frames, job.frame_duration)?).await?;

        let args = encode_args(&list_path, job, &self.video_codec, &self.audio_codec);
        debug!(ffmpeg = ?self.ffmpeg, ?args, "starting encode");

        let result = Command::new(&self.ffmpeg)
            .args(&args)
            .kill_on_drop(true)
            .output()
            .await;

        if let Err(e) = tokio::fs::remove_file(&list_path).await {
            debug!(path = ?list_path, error = %e, "failed to remove frame list");
        }

        let output =
            result.map_err(|e| Error::ExternalTool(format!("Failed to execute ffmpeg: {}", e)))?;

        if !output.status.success() {
            return Err(SlideshowError::EncodeFailed {
                output: job.output.clone(),
                reason: format!("{}: {}", output.status, stderr_tail(&output.stderr)),
            }
            .into());
        }

        Ok(())
    }

    fn name(&self) -> &'static str {
        "ffmpeg"
    }
}

/// Encoder used when ffmpeg is not available
///
/// Every call fails with [`Error::NotSupported`], so gallery posts are logged
/// as failed while direct videos keep downloading.
pub struct NoOpEncoder;

#[async_trait]
impl VideoEncoder for NoOpEncoder {
    async fn audio_duration(&self, _audio: &Path) -> Result<Duration> {
        Err(Error::NotSupported(
            "slideshows require the ffprobe binary. \
             Configure slideshow.ffprobe_path or ensure ffprobe is in PATH."
                .into(),
        ))
    }

    async fn encode(&self, _job: &EncodeJob) -> Result<()> {
        Err(Error::NotSupported(
            "slideshows require the ffmpeg binary. \
             Configure slideshow.ffmpeg_path or ensure ffmpeg is in PATH."
                .into(),
        ))
    }

    fn name(&self) -> &'static str {
        "noop"
    }
}

/// ffconcat script showing each frame for `frame_duration`
///
/// The last frame is listed a second time so the demuxer honors its duration.
/// Paths are made absolute because the demuxer resolves them relative to the
/// list file.
pub fn concat_list(frames: &[PathBuf], frame_duration: Duration) -> Result<String> {
    let seconds = format_seconds(frame_duration);
    let mut list = String::from("ffconcat version 1.0\n");

    for frame in frames {
        let path = std::path::absolute(frame)?;
        list.push_str(&format!("file {}\nduration {seconds}\n", quote_path(&path)));
    }
    if let Some(last) = frames.last() {
        let path = std::path::absolute(last)?;
        list.push_str(&format!("file {}\n", quote_path(&path)));
    }

    Ok(list)
}

/// ffmpeg arguments for `job`, reading frames from the list at `list_path`
pub fn encode_args(
    list_path: &Path,
    job: &EncodeJob,
    video_codec: &str,
    audio_codec: &str,
) -> Vec<OsString> {
    let extra_passes = job.audio_loop.extra_passes().to_string();
    let fps = job.fps.to_string();
    let total = format_seconds(job.audio_loop.total);

    let mut args = Vec::new();
    extend(&mut args, &["-y", "-hide_banner", "-loglevel", "error"]);
    extend(&mut args, &["-f", "concat", "-safe", "0", "-i"]);
    args.push(list_path.as_os_str().to_owned());
    extend(&mut args, &["-stream_loop", &extra_passes, "-i"]);
    args.push(job.audio.as_os_str().to_owned());
    extend(&mut args, &["-map", "0:v:0", "-map", "1:a:0"]);
    extend(&mut args, &["-vf", &frame_filter(job.frame_size)]);
    extend(&mut args, &["-r", &fps, "-c:v", video_codec, "-c:a", audio_codec]);
    extend(&mut args, &["-t", &total, "-movflags", "+faststart"]);
    args.push(job.output.as_os_str().to_owned());
    args
}

/// Video filter fitting every frame into `size` and padding it, centered
///
/// Frames that failed to normalize keep their original size in the concat
/// input; this keeps the encoder's output size constant regardless. Both
/// sides are rounded down to even numbers for yuv420p.
pub fn frame_filter(size: (u32, u32)) -> String {
    let even = |side: u32| (side & !1).max(2);
    let (width, height) = (even(size.0), even(size.1));
    format!(
        "scale={width}:{height}:force_original_aspect_ratio=decrease,\
         pad={width}:{height}:(ow-iw)/2:(oh-ih)/2,setsar=1,format=yuv420p"
    )
}

fn extend(args: &mut Vec<OsString>, values: &[&str]) {
    args.extend(values.iter().map(OsString::from));
}

/// Parse the single-value `format=duration` output of ffprobe
fn parse_probe_duration(stdout: &str) -> std::result::Result<Duration, String> {
    let text = stdout.trim();
    let seconds: f64 = text
        .parse()
        .map_err(|_| format!("unexpected ffprobe duration {text:?}"))?;
    Duration::try_from_secs_f64(seconds).map_err(|e| format!("invalid duration {seconds}: {e}"))
}

fn format_seconds(duration: Duration) -> String {
    format!("{:.3}", duration.as_secs_f64())
}

fn quote_path(path: &Path) -> String {
    format!("'{}'", path.to_string_lossy().replace('\'', r"'\''"))
}

fn stderr_tail(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
    let start = lines.len().saturating_sub(STDERR_TAIL_LINES);
    let tail = lines[start..].join("\n");
    if tail.is_empty() {
        "no diagnostic output".to_string()
    } else {
        tail
    }
}
