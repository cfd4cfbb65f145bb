//! # Composition
//!
//! The sequencer orders processed clips into a timeline; the render engine
//! drives the whole pipeline from media directory to published video.

pub mod engine;
pub mod sequencer;

// Re-exports for convenience
pub use engine::{RenderEngine, RenderPlan, RenderSummary};
pub use sequencer::{OrderingPolicy, Sequencer, Timeline};
