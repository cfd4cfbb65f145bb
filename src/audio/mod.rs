//! # Audio Module
//!
//! Loudness normalization of clip audio and planning of the background track.
//!
//! ## Core Features
//!
//! - **Sample extraction**: decode a clip's audio window into an `f32` buffer
//! - **Volume estimation**: trimmed mean of the positive samples mapped through a gain curve
//! - **Background mixing**: pick, loop, trim and fade the music under the clips
//! - **Duration probing**: WAV via hound, compressed formats via symphonia
//!
//! ## Usage
//!
//! ```rust,no_run
//! use reel_assembler::audio::{AudioLoader, VolumeEstimator};
//!
//! # fn main() -> anyhow::Result<()> {
//! let buffer = AudioLoader::load("voice.wav")?.into_sample_buffer();
//!
//! let estimator = VolumeEstimator::default();
//! let measurement = estimator.measure("voice.wav", &buffer)?;
//!
//! println!("Gain: {:.3}", measurement.gain);
//! # Ok(())
//! # }
//! ```

pub mod extract;
pub mod loader;
pub mod mixer;
pub mod types;
pub mod volume;

pub use extract::{FfmpegSampleSource, SampleSource};
pub use loader::AudioLoader;
pub use mixer::{select_background, AudioMixPlan};
pub use types::{AudioData, AudioFormat, SampleBuffer};
pub use volume::{GainCurve, RationalCurve, SilentClipPolicy, VolumeEstimator, VolumeMeasurement};
