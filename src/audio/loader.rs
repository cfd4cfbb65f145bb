use std::fs::File;
use std::path::Path;

use symphonia::core::audio::SampleBuffer as InterleavedBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::{debug, warn};

use crate::audio::types::{AudioData, AudioFormat};
use crate::error::{AudioError, Result};

/// Audio file loader supporting multiple formats
pub struct AudioLoader;

impl AudioLoader {
    /// Load an audio file and return raw audio data
    pub fn load<P: AsRef<Path>>(path: P) -> Result<AudioData> {
        let path = path.as_ref();
        match Self::detect_format(path).unwrap_or_default().as_str() {
            "wav" => Self::load_wav(path),
            ext if Self::is_format_supported(ext) => Self::load_with_symphonia(path),
            ext => Err(AudioError::UnsupportedFormat {
                format: ext.to_string(),
            }
            .into()),
        }
    }

    /// Duration of an audio file in seconds
    ///
    /// Reads the frame count from the container header when it is available
    /// and falls back to decoding the whole stream otherwise.
    pub fn probe_duration<P: AsRef<Path>>(path: P) -> Result<f64> {
        let path = path.as_ref();
        match Self::detect_format(path).unwrap_or_default().as_str() {
            "wav" => {
                let reader = hound::WavReader::open(path).map_err(|_| Self::load_failed(path))?;
                let spec = reader.spec();
                Ok(reader.duration() as f64 / spec.sample_rate as f64)
            }
            ext if Self::is_format_supported(ext) => {
                let (format, _) = Self::open_with_symphonia(path)?;
                let params = format
                    .tracks()
                    .iter()
                    .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
                    .map(|t| t.codec_params.clone())
                    .ok_or_else(|| Self::load_failed(path))?;

                match (params.n_frames, params.sample_rate) {
                    (Some(frames), Some(rate)) if rate > 0 => Ok(frames as f64 / rate as f64),
                    _ => {
                        debug!("No frame count in header of {:?}, decoding to measure", path);
                        Ok(Self::load_with_symphonia(path)?.duration)
                    }
                }
            }
            ext => Err(AudioError::UnsupportedFormat {
                format: ext.to_string(),
            }
            .into()),
        }
    }

    /// Load WAV files using the hound crate (most reliable for WAV)
    fn load_wav(path: &Path) -> Result<AudioData> {
        let reader = hound::WavReader::open(path).map_err(|_| Self::load_failed(path))?;

        let spec = reader.spec();
        let samples: Vec<f32> = match spec.sample_format {
            hound::SampleFormat::Float => reader
                .into_samples::<f32>()
                .collect::<std::result::Result<_, _>>()
                .map_err(|_| Self::load_failed(path))?,
            hound::SampleFormat::Int => reader
                .into_samples::<i32>()
                .map(|sample| sample.map(|s| Self::int_to_float(s, spec.bits_per_sample)))
                .collect::<std::result::Result<_, _>>()
                .map_err(|_| Self::load_failed(path))?,
        };

        let duration = samples.len() as f64 / (spec.sample_rate as f64 * spec.channels as f64);

        Ok(AudioData {
            samples,
            sample_rate: spec.sample_rate,
            channels: spec.channels,
            duration,
            file_path: path.to_path_buf(),
            format: AudioFormat {
                extension: "wav".to_string(),
                bit_depth: Some(spec.bits_per_sample),
                compression: None,
            },
        })
    }

    fn open_with_symphonia(path: &Path) -> Result<(Box<dyn FormatReader>, Hint)> {
        let file = File::open(path).map_err(|_| Self::load_failed(path))?;
        let mss = MediaSourceStream::new(Box::new(file), Default::default());

        let mut hint = Hint::new();
        if let Some(extension) = path.extension().and_then(|ext| ext.to_str()) {
            hint.with_extension(extension);
        }

        let probed = symphonia::default::get_probe()
            .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
            .map_err(|_| Self::load_failed(path))?;

        Ok((probed.format, hint))
    }

    /// Load various formats using Symphonia
    fn load_with_symphonia(path: &Path) -> Result<AudioData> {
        let (mut format, _) = Self::open_with_symphonia(path)?;

        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| Self::load_failed(path))?;

        let track_id = track.id;
        let codec_params = track.codec_params.clone();

        let sample_rate = codec_params.sample_rate.ok_or_else(|| AudioError::InvalidParameters {
            details: format!("no sample rate in {}", path.display()),
        })?;
        let channels = codec_params
            .channels
            .ok_or_else(|| AudioError::InvalidParameters {
                details: format!("no channel layout in {}", path.display()),
            })?
            .count() as u16;

        let mut decoder = symphonia::default::get_codecs()
            .make(&codec_params, &DecoderOptions::default())
            .map_err(|_| Self::load_failed(path))?;

        let mut samples = Vec::new();
        let mut interleaved: Option<InterleavedBuffer<f32>> = None;

        loop {
            let packet = match format.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::ResetRequired) => {
                    decoder.reset();
                    continue;
                }
                // End of stream
                Err(_) => break,
            };

            if packet.track_id() != track_id {
                continue;
            }

            match decoder.decode(&packet) {
                Ok(decoded) => {
                    let needed = decoded.capacity() * decoded.spec().channels.count();
                    if interleaved.as_ref().map_or(true, |b| b.capacity() < needed) {
                        interleaved = Some(InterleavedBuffer::new(
                            decoded.capacity() as u64,
                            *decoded.spec(),
                        ));
                    }
                    if let Some(buffer) = interleaved.as_mut() {
                        buffer.copy_interleaved_ref(decoded);
                        samples.extend_from_slice(buffer.samples());
                    }
                }
                Err(SymphoniaError::DecodeError(err)) => {
                    warn!("Skipping undecodable packet in {:?}: {}", path, err);
                    continue;
                }
                Err(_) => break,
            }
        }

        let duration = samples.len() as f64 / (sample_rate as f64 * channels.max(1) as f64);

        Ok(AudioData {
            samples,
            sample_rate,
            channels,
            duration,
            file_path: path.to_path_buf(),
            format: AudioFormat {
                extension: Self::detect_format(path).unwrap_or_else(|| "unknown".to_string()),
                bit_depth: codec_params.bits_per_sample.map(|b| b as u16),
                compression: Some(format!("{:?}", codec_params.codec)),
            },
        })
    }

    fn load_failed(path: &Path) -> crate::error::ReelError {
        AudioError::LoadFailed {
            path: path.display().to_string(),
        }
        .into()
    }

    /// Convert integer sample to float (-1.0 to 1.0)
    fn int_to_float(sample: i32, bit_depth: u16) -> f32 {
        match bit_depth {
            8 => sample as f32 / 128.0,
            24 => sample as f32 / 8_388_608.0,
            32 => sample as f32 / 2_147_483_648.0,
            _ => sample as f32 / 32_768.0,
        }
    }

    /// Detect audio format from file extension
    pub fn detect_format<P: AsRef<Path>>(path: P) -> Option<String> {
        path.as_ref()
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_lowercase())
    }

    /// Check if a file format is supported
    pub fn is_format_supported(extension: &str) -> bool {
        matches!(
            extension.to_lowercase().as_str(),
            "wav" | "mp3" | "flac" | "ogg" | "m4a" | "aac"
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ReelError;
    use std::io::Write;
    use tempfile::tempdir;

    fn write_wav(path: &Path, seconds: f64, sample_rate: u32) {
        let spec = hound::WavSpec {
            channels: 2,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        let frames = (seconds * sample_rate as f64) as usize;
        for i in 0..frames {
            let value = ((i as f32 * 0.05).sin() * 8000.0) as i16;
            writer.write_sample(value).unwrap();
            writer.write_sample(value).unwrap();
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn test_format_detection() {
        assert_eq!(AudioLoader::detect_format("music.mp3"), Some("mp3".to_string()));
        assert_eq!(AudioLoader::detect_format("music.WAV"), Some("wav".to_string()));
        assert_eq!(AudioLoader::detect_format("music"), None);
        assert!(AudioLoader::is_format_supported("FLAC"));
        assert!(!AudioLoader::is_format_supported("mp4"));
    }

    #[test]
    fn test_int_to_float_conversion() {
        assert_eq!(AudioLoader::int_to_float(0, 16), 0.0);
        assert_eq!(AudioLoader::int_to_float(-32768, 16), -1.0);
        assert_eq!(AudioLoader::int_to_float(-128, 8), -1.0);
    }

    #[test]
    fn test_wav_duration_and_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("background.wav");
        write_wav(&path, 2.0, 8000);

        let duration = AudioLoader::probe_duration(&path).unwrap();
        assert!((duration - 2.0).abs() < 1e-9);

        let data = AudioLoader::load(&path).unwrap();
        assert_eq!(data.channels, 2);
        assert_eq!(data.sample_rate, 8000);
        assert!((data.duration - 2.0).abs() < 1e-9);
        assert!(data.samples.iter().any(|s| *s > 0.0));
    }

    #[test]
    fn test_unsupported_format() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("notes.xyz");
        File::create(&path).unwrap().write_all(b"dummy").unwrap();

        match AudioLoader::load(&path) {
            Err(ReelError::Audio(AudioError::UnsupportedFormat { format })) => assert_eq!(format, "xyz"),
            other => panic!("Expected UnsupportedFormat error, got {:?}", other),
        }
    }

    #[test]
    fn test_corrupt_mp3_fails_to_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.mp3");
        File::create(&path).unwrap().write_all(b"not really an mp3").unwrap();

        assert!(AudioLoader::probe_duration(&path).is_err());
    }
}
