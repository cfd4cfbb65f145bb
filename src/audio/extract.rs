use std::process::{Command, Stdio};

use tracing::debug;

use crate::audio::types::SampleBuffer;
use crate::config::VolumeConfig;
use crate::error::{AudioError, Result};
use crate::video::types::Clip;

/// Produces the sample buffer a clip's gain is measured from
pub trait SampleSource {
    fn samples(&self, clip: &Clip) -> Result<SampleBuffer>;
}

/// Decodes a clip's audio window through an external ffmpeg process
///
/// Audio is resampled to `sample_rate` and delivered as interleaved
/// little-endian `f32` on stdout. The child is waited on before returning,
/// so no file handle outlives the call.
pub struct FfmpegSampleSource {
    ffmpeg: String,
    sample_rate: u32,
    channels: u16,
}

impl FfmpegSampleSource {
    pub fn new(ffmpeg: impl Into<String>, sample_rate: u32, channels: u16) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            sample_rate,
            channels,
        }
    }

    pub fn from_config(ffmpeg: impl Into<String>, config: &VolumeConfig) -> Self {
        Self::new(ffmpeg, config.sample_rate, config.channels)
    }

    /// ffmpeg arguments that dump the clip's source window as raw PCM
    pub fn args(&self, clip: &Clip) -> Vec<String> {
        let (start, end) = clip.source_window;
        vec![
            "-v".to_string(),
            "error".to_string(),
            "-ss".to_string(),
            start.to_string(),
            "-t".to_string(),
            (end - start).max(0.0).to_string(),
            "-i".to_string(),
            clip.path().display().to_string(),
            "-vn".to_string(),
            "-ac".to_string(),
            self.channels.to_string(),
            "-ar".to_string(),
            self.sample_rate.to_string(),
            "-f".to_string(),
            "f32le".to_string(),
            "-".to_string(),
        ]
    }
}

impl SampleSource for FfmpegSampleSource {
    fn samples(&self, clip: &Clip) -> Result<SampleBuffer> {
        let path = clip.path().display().to_string();
        let output = Command::new(&self.ffmpeg)
            .args(self.args(clip))
            .stdin(Stdio::null())
            .output()
            .map_err(|e| AudioError::ExtractionFailed {
                path: path.clone(),
                reason: format!("could not run {}: {}", self.ffmpeg, e),
            })?;

        if !output.status.success() {
            return Err(AudioError::ExtractionFailed {
                path,
                reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            }
            .into());
        }

        let buffer = SampleBuffer::from_f32le(&output.stdout, self.sample_rate, self.channels);
        debug!("Extracted {} samples ({:.2}s) from {}", buffer.len(), buffer.duration(), path);
        Ok(buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::video::types::{Rotation, Size};

    #[test]
    fn test_args_cover_source_window() {
        let mut clip = Clip::video("a.mp4", "media/a.mp4", 10.0, Size::new(640, 480), Rotation::None, true);
        clip.source_window = (1.5, 3.5);

        let source = FfmpegSampleSource::new("ffmpeg", 22000, 2);
        let args = source.args(&clip);

        let pos = |flag: &str| args.iter().position(|a| a == flag).unwrap();
        assert_eq!(args[pos("-ss") + 1], "1.5");
        assert_eq!(args[pos("-t") + 1], "2");
        assert_eq!(args[pos("-ar") + 1], "22000");
        assert_eq!(args[pos("-ac") + 1], "2");
        assert_eq!(args[pos("-f") + 1], "f32le");
        assert_eq!(args.last().unwrap(), "-");
    }

    #[test]
    fn test_missing_binary_reports_extraction_failure() {
        let clip = Clip::video("a.mp4", "media/a.mp4", 1.0, Size::new(2, 2), Rotation::None, true);
        let source = FfmpegSampleSource::new("/nonexistent/ffmpeg-binary", 22000, 2);
        assert!(source.samples(&clip).is_err());
    }
}
