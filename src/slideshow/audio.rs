//! Audio loop-then-trim arithmetic

use crate::error::{Result, SlideshowError};
use std::path::Path;
use std::time::Duration;

/// How an audio track is stretched over a slideshow
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AudioLoop {
    /// Length of one pass of the source track
    pub track: Duration,
    /// Number of whole passes concatenated
    pub repetitions: u32,
    /// Exact length after trimming (the slideshow length)
    pub total: Duration,
}

impl AudioLoop {
    /// Length of the concatenated passes before trimming
    pub fn looped_length(&self) -> Duration {
        self.track * self.repetitions
    }

    /// Extra passes after the first one (what `-stream_loop` expects)
    pub fn extra_passes(&self) -> u32 {
        self.repetitions.saturating_sub(1)
    }
}

/// Plan the loop for a `track` played under a slideshow of length `total`
///
/// The track is repeated `ceil(total / track)` times (at least once) and then
/// cut to exactly `total`, so short and long tracks follow the same rule.
pub fn plan_audio_loop(audio: &Path, track: Duration, total: Duration) -> Result<AudioLoop> {
    if track.is_zero() {
        return Err(SlideshowError::InvalidAudio {
            path: audio.to_path_buf(),
            reason: "track has zero length".to_string(),
        }
        .into());
    }

    let repetitions = total.as_nanos().div_ceil(track.as_nanos()).max(1);
    let repetitions = u32::try_from(repetitions).map_err(|_| SlideshowError::InvalidAudio {
        path: audio.to_path_buf(),
        reason: format!("track of {track:?} is too short to cover {total:?}"),
    })?;

    Ok(AudioLoop {
        track,
        repetitions,
        total,
    })
}
