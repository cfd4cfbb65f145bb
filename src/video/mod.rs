//! # Video Module
//!
//! Clip model, probing, per-clip filter chains and the final ffmpeg render.

pub mod encoder;
pub mod filters;
pub mod loader;
pub mod types;

pub use encoder::{EncodeJob, EncodedVideo, Encoder};
pub use filters::{ClipTransform, FilterChain};
pub use loader::{ClipLoader, FfprobeProbe, MediaProbe, VideoMetadata};
pub use types::{AudioFilter, Clip, ClipSource, Rotation, Size, VideoFilter};
