use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::config::BackgroundConfig;
use crate::error::{AudioError, Result};
use crate::video::loader::list_media_files;
use crate::video::types::{AudioFilter, FadeKind};

/// Tolerance used when comparing planned durations
pub const DURATION_EPSILON: f64 = 1e-6;

/// Pick the background track from the media directory
///
/// Files whose name contains the exclusion marker (partial or temporary
/// renders) are skipped; the first remaining file in name order wins.
pub fn select_background(media_dir: &Path, config: &BackgroundConfig) -> Result<PathBuf> {
    let candidates = list_media_files(media_dir, std::slice::from_ref(&config.extension))?;

    candidates
        .into_iter()
        .find(|path| {
            let name = path.file_name().map(|n| n.to_string_lossy()).unwrap_or_default();
            let excluded = !config.exclude_marker.is_empty() && name.contains(config.exclude_marker.as_str());
            if excluded {
                warn!("Skipping background candidate {:?} (marked {})", name, config.exclude_marker);
            }
            !excluded
        })
        .ok_or_else(|| {
            AudioError::NoBackgroundTrack {
                dir: media_dir.display().to_string(),
            }
            .into()
        })
}

/// Number of extra repetitions needed for a track of `track` seconds to cover `target` seconds
///
/// Saturates at `u64::MAX` when the track is vanishingly short.
pub fn loops_needed(track: f64, target: f64) -> u64 {
    if target <= track {
        return 0;
    }
    let mut plays = (target / track).ceil();
    // ceil can land one play short after rounding
    if track * plays + DURATION_EPSILON < target {
        plays += 1.0;
    }
    if !(plays < u64::MAX as f64) {
        return u64::MAX;
    }
    (plays as u64).saturating_sub(1)
}

/// How the background track is looped, trimmed and mixed under the clips
#[derive(Debug, Clone, PartialEq)]
pub struct AudioMixPlan {
    pub track: PathBuf,

    /// Length of one play of the track
    pub track_duration: f64,

    /// Extra repetitions after the first play
    pub loops: u32,

    /// Duration after trimming, equal to the video duration
    pub duration: f64,

    pub gain: f64,
    pub fade_in: f64,
    pub fade_out: f64,

    /// Gain applied to the final mix
    pub master_gain: f64,
}

impl AudioMixPlan {
    /// Plan the background for a timeline of `video_duration` seconds
    pub fn new(
        track: PathBuf,
        track_duration: f64,
        video_duration: f64,
        config: &BackgroundConfig,
    ) -> Result<Self> {
        if !(track_duration > 0.0) {
            return Err(AudioError::InvalidParameters {
                details: format!("background track {} has duration {}", track.display(), track_duration),
            }
            .into());
        }
        if !(video_duration > 0.0) {
            return Err(AudioError::InvalidParameters {
                details: format!("timeline duration {}", video_duration),
            }
            .into());
        }

        let loops = loops_needed(track_duration, video_duration);
        if loops > u64::from(config.max_loops) {
            return Err(AudioError::BackgroundTooShort {
                available: track_duration * (config.max_loops as f64 + 1.0),
                required: video_duration,
            }
            .into());
        }
        let loops = loops as u32;

        // looping covers the timeline, the trim cuts it to exactly the video length
        let duration = video_duration;

        debug!(
            "Background {:?}: {:.2}s x {} plays, trimmed to {:.2}s",
            track,
            track_duration,
            loops + 1,
            duration
        );

        Ok(Self {
            track,
            track_duration,
            loops,
            duration,
            gain: config.gain,
            fade_in: config.fade_in.min(duration),
            fade_out: config.fade_out.min(duration),
            master_gain: config.master_gain,
        })
    }

    /// Total audio available before trimming
    pub fn available(&self) -> f64 {
        self.track_duration * (self.loops as f64 + 1.0)
    }

    /// Filter steps for the background: attenuate, trim, fade in, fade out
    pub fn filters(&self) -> Vec<AudioFilter> {
        let mut filters = vec![
            AudioFilter::Volume { gain: self.gain },
            AudioFilter::Trim {
                start: 0.0,
                end: self.duration,
            },
        ];
        if self.fade_in > 0.0 {
            filters.push(AudioFilter::Fade {
                kind: FadeKind::In,
                start: 0.0,
                duration: self.fade_in,
            });
        }
        if self.fade_out > 0.0 {
            filters.push(AudioFilter::Fade {
                kind: FadeKind::Out,
                start: (self.duration - self.fade_out).max(0.0),
                duration: self.fade_out,
            });
        }
        filters
    }

    /// Gain applied once everything is mixed
    pub fn master(&self) -> AudioFilter {
        AudioFilter::Volume {
            gain: self.master_gain,
        }
    }

    pub fn log_summary(&self) {
        info!("   Background: {:?}", self.track);
        info!(
            "      {:.1}s track, {} loop(s), trimmed to {:.1}s, gain {} / master {}",
            self.track_duration, self.loops, self.duration, self.gain, self.master_gain
        );
    }
}
