//! # Reel-Assembler
//!
//! Turn a folder of phone videos and photos into one watchable montage.
//!
//! Every video is rotated upright, framed, faded and color-lifted, and its
//! loudness is normalized so quiet and loud clips sit at a similar level.
//! Photos are shown for a fixed time, shrunk to fit the videos, and a looped
//! background track is mixed under everything.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use reel_assembler::{config::Config, RenderEngine};
//!
//! # fn main() -> anyhow::Result<()> {
//! let mut config = Config::default();
//! config.paths.media_dir = "holiday/".into();
//!
//! let engine = RenderEngine::new(config);
//! let summary = engine.render()?;
//! println!("Wrote {:?}", summary.output_path);
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`audio`] - Volume estimation, sample extraction, background mixing
//! - [`video`] - Clip model, probing, filter chains, encoding
//! - [`composition`] - Sequencing and the render engine
//! - [`config`] - Configuration management
//!
//! ## Custom gain curves
//!
//! Any closure `Fn(f64) -> f64` is a [`GainCurve`](audio::GainCurve):
//!
//! ```rust
//! use reel_assembler::audio::VolumeEstimator;
//!
//! let estimator = VolumeEstimator::new(0.1, |volume: f64| 0.05 / volume);
//! assert!((estimator.gain_for(0.05).unwrap() - 1.0).abs() < 1e-12);
//! ```

pub mod audio;
pub mod composition;
pub mod config;
pub mod error;
pub mod video;

// Re-export commonly used types for convenience
pub use crate::{
    composition::RenderEngine,
    config::Config,
    error::{ReelError, Result},
};
