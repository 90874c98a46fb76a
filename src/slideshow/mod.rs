//! Slideshow assembly
//!
//! A gallery post becomes a video in two steps. [`SlideshowAssembler::prepare`]
//! normalizes every frame to the canonical size and plans how the audio track
//! is looped and trimmed. [`SlideshowAssembler::encode`] then writes the video.
//! The split lets the caller claim an output number only once there is
//! something to encode.

pub mod audio;
pub mod encoder;
pub mod normalize;

pub use audio::{AudioLoop, plan_audio_loop};
pub use encoder::{EncodeJob, FfmpegEncoder, NoOpEncoder, VideoEncoder};
pub use normalize::{letterbox, normalize_all, normalize_image};

use crate::config::SlideshowConfig;
use crate::error::{Result, SlideshowError};
use crate::types::SlideshowPlan;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Frames and audio ready to be encoded
#[derive(Debug, Clone)]
pub struct PreparedSlideshow {
    /// Frame order, per-frame duration and audio track
    pub plan: SlideshowPlan,
    /// Loop-then-trim plan for the audio track
    pub audio_loop: AudioLoop,
    /// Directory holding intermediate files
    pub work_dir: PathBuf,
}

/// Choose the gallery's own audio when it was fetched, otherwise `default`
///
/// # Errors
///
/// Returns [`SlideshowError::DefaultAudioMissing`] when the fallback is needed
/// but `default` does not exist.
pub fn pick_audio(fetched: Option<PathBuf>, default: &Path) -> Result<PathBuf> {
    if let Some(path) = fetched {
        return Ok(path);
    }
    if !default.is_file() {
        return Err(SlideshowError::DefaultAudioMissing {
            path: default.to_path_buf(),
        }
        .into());
    }
    debug!(path = ?default, "using default audio track");
    Ok(default.to_path_buf())
}

/// Turns still images plus an audio track into a video
#[derive(Clone)]
pub struct SlideshowAssembler {
    config: SlideshowConfig,
    encoder: Arc<dyn VideoEncoder>,
}

impl SlideshowAssembler {
    /// Create an assembler using `encoder`
    pub fn new(config: SlideshowConfig, encoder: Arc<dyn VideoEncoder>) -> Self {
        Self { config, encoder }
    }

    /// Slideshow settings
    pub fn config(&self) -> &SlideshowConfig {
        &self.config
    }

    /// Normalize `images` in place and plan the audio
    ///
    /// Images that fail to normalize are logged and kept as they are.
    ///
    /// # Errors
    ///
    /// Returns [`SlideshowError::NoImages`] for an empty image list, or an
    /// audio error when the track cannot be probed or is empty.
    pub async fn prepare(
        &self,
        images: Vec<PathBuf>,
        audio: PathBuf,
        work_dir: &Path,
    ) -> Result<PreparedSlideshow> {
        if images.is_empty() {
            return Err(SlideshowError::NoImages.into());
        }

        let normalized = normalize_all(&images, self.config.target_size()).await;
        if normalized < images.len() {
            warn!(
                normalized,
                total = images.len(),
                "some frames could not be normalized"
            );
        }

        let plan = SlideshowPlan {
            images,
            image_duration: self.config.image_duration,
            audio,
        };

        let track = self.encoder.audio_duration(&plan.audio).await?;
        let audio_loop = plan_audio_loop(&plan.audio, track, plan.total_duration())?;
        debug!(
            frames = plan.images.len(),
            ?track,
            repetitions = audio_loop.repetitions,
            total = ?audio_loop.total,
            "slideshow planned"
        );

        Ok(PreparedSlideshow {
            plan,
            audio_loop,
            work_dir: work_dir.to_path_buf(),
        })
    }

    /// Encode a prepared slideshow to `output`
    ///
    /// # Errors
    ///
    /// Propagates the encoder's error; a partial `output` is left for the
    /// caller to remove.
    pub async fn encode(&self, prepared: &PreparedSlideshow, output: &Path) -> Result<()> {
        let job = EncodeJob {
            frames: prepared.plan.images.clone(),
            frame_duration: prepared.plan.image_duration,
            fps: self.config.fps,
            frame_size: self.config.target_size(),
            audio: prepared.plan.audio.clone(),
            audio_loop: prepared.audio_loop,
            output: output.to_path_buf(),
            work_dir: prepared.work_dir.clone(),
        };

        self.encoder.encode(&job).await?;
        info!(
            ?output,
            encoder = self.encoder.name(),
            frames = job.frames.len(),
            "slideshow encoded"
        );
        Ok(())
    }
}
