use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Raw audio data decoded from a file
#[derive(Debug, Clone)]
pub struct AudioData {
    /// Audio samples (interleaved for stereo, mono for single channel)
    pub samples: Vec<f32>,

    /// Sample rate in Hz
    pub sample_rate: u32,

    /// Number of channels (1 = mono, 2 = stereo)
    pub channels: u16,

    /// Duration in seconds
    pub duration: f64,

    /// Original file path
    pub file_path: PathBuf,

    /// Audio format information
    pub format: AudioFormat,
}

impl AudioData {
    /// Hand the decoded samples over as an analysis buffer
    pub fn into_sample_buffer(self) -> SampleBuffer {
        SampleBuffer::new(self.samples, self.sample_rate, self.channels)
    }
}

/// Audio file format information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioFormat {
    /// File extension (wav, mp3, flac, etc.)
    pub extension: String,

    /// Bit depth (16, 24, 32, etc.)
    pub bit_depth: Option<u16>,

    /// Compression type (if any)
    pub compression: Option<String>,
}

/// Flat buffer of interleaved amplitudes used to estimate a clip's loudness
///
/// Only lives long enough to compute a gain factor.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SampleBuffer {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub channels: u16,
}

impl SampleBuffer {
    pub fn new(samples: Vec<f32>, sample_rate: u32, channels: u16) -> Self {
        Self {
            samples,
            sample_rate,
            channels,
        }
    }

    /// Decode little-endian `f32` PCM bytes, ignoring a trailing partial sample
    pub fn from_f32le(bytes: &[u8], sample_rate: u32, channels: u16) -> Self {
        let samples = bytes
            .chunks_exact(4)
            .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect();

        Self::new(samples, sample_rate, channels)
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Duration in seconds covered by the buffer
    pub fn duration(&self) -> f64 {
        if self.sample_rate == 0 || self.channels == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / (self.sample_rate as f64 * self.channels as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_f32le() {
        let mut bytes = Vec::new();
        for value in [0.5f32, -0.25, 1.0] {
            bytes.extend_from_slice(&value.to_le_bytes());
        }
        bytes.push(0xFF); // dangling byte

        let buffer = SampleBuffer::from_f32le(&bytes, 22000, 1);
        assert_eq!(buffer.samples, vec![0.5, -0.25, 1.0]);
    }

    #[test]
    fn test_buffer_duration() {
        let buffer = SampleBuffer::new(vec![0.0; 44000], 22000, 2);
        assert_eq!(buffer.duration(), 1.0);
        assert_eq!(SampleBuffer::default().duration(), 0.0);
    }
}
