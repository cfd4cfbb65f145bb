use tracing::debug;

use crate::{
    config::Config,
    error::{Result, VideoError},
    video::types::{AudioFilter, Clip, FadeKind, Rgb, Rotation, Size, VideoFilter},
};

/// A single step of a clip's processing chain
///
/// Transforms take the clip by value and hand back the transformed one, so a
/// chain is just a fold over its steps. Implementations must be
/// deterministic: the same clip and parameters always give the same
/// duration, size and filters.
pub trait ClipTransform: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &str;

    /// Apply the transform, returning the new clip
    fn apply(&self, clip: Clip) -> Result<Clip>;
}

/// Undo the container rotation so frames are stored upright
pub struct CorrectRotation;

impl ClipTransform for CorrectRotation {
    fn name(&self) -> &str {
        "rotation"
    }

    fn apply(&self, clip: Clip) -> Result<Clip> {
        let rotation = clip.rotation;
        let mut clip = match rotation {
            Rotation::None => return Ok(clip),
            Rotation::Clockwise90 => clip.push_video(VideoFilter::Transpose { clockwise: true }),
            Rotation::Clockwise270 => clip.push_video(VideoFilter::Transpose { clockwise: false }),
            Rotation::Half => clip.push_video(VideoFilter::Flip),
        };
        if rotation.swaps_axes() {
            clip.size = clip.size.transposed();
        }
        clip.rotation = Rotation::None;
        Ok(clip)
    }
}

/// Keep only `[start, end]` of the clip's current timeline
pub struct Trim {
    pub start: f64,
    pub end: f64,
}

impl ClipTransform for Trim {
    fn name(&self) -> &str {
        "trim"
    }

    fn apply(&self, mut clip: Clip) -> Result<Clip> {
        let start = self.start.max(0.0);
        let end = self.end.min(clip.duration);
        if !(start < end) {
            return Err(VideoError::InvalidParameters {
                details: format!(
                    "cannot trim '{}' ({:.2}s) to [{}, {}]",
                    clip.name, clip.duration, self.start, self.end
                ),
            }
            .into());
        }

        let origin = clip.source_window.0;
        clip.source_window = (origin + start * clip.speed, origin + end * clip.speed);
        clip.duration = end - start;
        if let Some(input) = clip.input_duration.as_mut() {
            *input = input.min(end);
        }

        let clip = clip.push_video(VideoFilter::Trim { start, end });
        Ok(if clip.has_audio {
            clip.push_audio(AudioFilter::Trim { start, end })
        } else {
            clip
        })
    }
}

/// Border of `size` pixels on every side
pub struct Margin {
    pub size: u32,
    pub color: Rgb,
}

impl ClipTransform for Margin {
    fn name(&self) -> &str {
        "margin"
    }

    fn apply(&self, mut clip: Clip) -> Result<Clip> {
        if self.size == 0 {
            return Ok(clip);
        }
        let grow = |side: u32| self.size.checked_mul(2).and_then(|border| side.checked_add(border));
        clip.size = match (grow(clip.size.width), grow(clip.size.height)) {
            (Some(width), Some(height)) => Size::new(width, height),
            _ => {
                return Err(VideoError::InvalidParameters {
                    details: format!("margin {} overflows {} frame of '{}'", self.size, clip.size, clip.name),
                }
                .into());
            }
        };
        Ok(clip.push_video(VideoFilter::Pad {
            margin: self.size,
            color: self.color,
        }))
    }
}

/// How long a still image stays on screen
pub struct SetDuration {
    pub seconds: f64,
}

impl ClipTransform for SetDuration {
    fn name(&self) -> &str {
        "duration"
    }

    fn apply(&self, mut clip: Clip) -> Result<Clip> {
        if !clip.is_image() {
            return Err(VideoError::InvalidParameters {
                details: format!("'{}' is a video, its duration comes from the source", clip.name),
            }
            .into());
        }
        if !(self.seconds > 0.0) {
            return Err(VideoError::InvalidParameters {
                details: format!("image duration must be positive, got {}", self.seconds),
            }
            .into());
        }
        clip.duration = self.seconds;
        clip.input_duration = Some(self.seconds);
        clip.source_window = (0.0, self.seconds);
        Ok(clip)
    }
}

/// Fade from black at the start of the clip
pub struct FadeIn {
    pub seconds: f64,
}

impl ClipTransform for FadeIn {
    fn name(&self) -> &str {
        "fade-in"
    }

    fn apply(&self, clip: Clip) -> Result<Clip> {
        let duration = self.seconds.min(clip.duration);
        if !(duration > 0.0) {
            return Ok(clip);
        }
        Ok(clip.push_video(VideoFilter::Fade {
            kind: FadeKind::In,
            start: 0.0,
            duration,
        }))
    }
}

/// Fade to black at the end of the clip
pub struct FadeOut {
    pub seconds: f64,
}

impl ClipTransform for FadeOut {
    fn name(&self) -> &str {
        "fade-out"
    }

    fn apply(&self, clip: Clip) -> Result<Clip> {
        let duration = self.seconds.min(clip.duration);
        if !(duration > 0.0) {
            return Ok(clip);
        }
        let start = clip.duration - duration;
        Ok(clip.push_video(VideoFilter::Fade {
            kind: FadeKind::Out,
            start,
            duration,
        }))
    }
}

/// Brightness offset plus contrast around a pivot, per channel
pub struct LumContrast {
    pub lum: f64,
    pub contrast: f64,
    pub threshold: f64,
}

impl LumContrast {
    /// Value a single channel maps to
    pub fn map_channel(&self, value: u8) -> u8 {
        let out = self.lum + self.threshold + (1.0 + self.contrast) * (value as f64 - self.threshold);
        out.round().clamp(0.0, 255.0) as u8
    }
}

impl ClipTransform for LumContrast {
    fn name(&self) -> &str {
        "lum-contrast"
    }

    fn apply(&self, clip: Clip) -> Result<Clip> {
        if self.lum == 0.0 && self.contrast == 0.0 {
            return Ok(clip);
        }
        Ok(clip.push_video(VideoFilter::LumContrast {
            lum: self.lum,
            contrast: self.contrast,
            threshold: self.threshold,
        }))
    }
}

/// Playback rate change (below 1.0 slows down); audio keeps its pitch
pub struct Speed {
    pub factor: f64,
}

/// Split a tempo factor into `atempo` steps that each stay within [0.5, 2.0]
pub fn tempo_steps(factor: f64) -> Vec<f64> {
    let mut steps = Vec::new();
    let mut remaining = factor;
    while remaining > 2.0 {
        steps.push(2.0);
        remaining /= 2.0;
    }
    while remaining < 0.5 {
        steps.push(0.5);
        remaining /= 0.5;
    }
    steps.push(remaining);
    steps
}

impl ClipTransform for Speed {
    fn name(&self) -> &str {
        "speed"
    }

    fn apply(&self, mut clip: Clip) -> Result<Clip> {
        if !(self.factor > 0.0) || !self.factor.is_finite() {
            return Err(VideoError::InvalidParameters {
                details: format!("speed factor must be positive, got {}", self.factor),
            }
            .into());
        }
        if self.factor == 1.0 {
            return Ok(clip);
        }

        clip.duration /= self.factor;
        clip.speed *= self.factor;
        let mut clip = clip.push_video(VideoFilter::Speed { factor: self.factor });
        if clip.has_audio {
            for factor in tempo_steps(self.factor) {
                clip = clip.push_audio(AudioFilter::Tempo { factor });
            }
        }
        Ok(clip)
    }
}

/// Linear gain on the clip's own audio
pub struct Volume {
    pub gain: f64,
}

impl ClipTransform for Volume {
    fn name(&self) -> &str {
        "volume"
    }

    fn apply(&self, clip: Clip) -> Result<Clip> {
        if !clip.has_audio {
            return Ok(clip);
        }
        Ok(clip.push_audio(AudioFilter::Volume { gain: self.gain }))
    }
}

/// Size an image must be scaled to so it fits inside `bounds`
///
/// A wider image is scaled so its width equals the bound exactly; if it is
/// still too tall it is scaled again so its height does. Images are never
/// upscaled and no dimension drops below one pixel.
pub fn fit_within(size: Size, bounds: Size) -> Size {
    let mut width = size.width;
    let mut height = size.height;

    if width > bounds.width {
        height = scaled(height, bounds.width, width);
        width = bounds.width;
    }
    if height > bounds.height {
        width = scaled(width, bounds.height, height);
        height = bounds.height;
    }

    Size::new(width.max(1), height.max(1))
}

fn scaled(value: u32, numerator: u32, denominator: u32) -> u32 {
    ((value as f64 * numerator as f64 / denominator as f64).round() as u32).max(1)
}

/// Shrink the clip to fit within the given bounds
pub struct FitWithin {
    pub bounds: Size,
}

impl ClipTransform for FitWithin {
    fn name(&self) -> &str {
        "fit"
    }

    fn apply(&self, mut clip: Clip) -> Result<Clip> {
        let target = fit_within(clip.size, self.bounds);
        if target == clip.size {
            return Ok(clip);
        }
        debug!("Resizing '{}' from {} to {}", clip.name, clip.size, target);
        clip.size = target;
        Ok(clip.push_video(VideoFilter::Scale { size: target }))
    }
}

/// Ordered list of transforms applied to every clip of one kind
#[derive(Default)]
pub struct FilterChain {
    steps: Vec<Box<dyn ClipTransform>>,
}

impl FilterChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a step
    pub fn then<T: ClipTransform + 'static>(mut self, step: T) -> Self {
        self.steps.push(Box::new(step));
        self
    }

    pub fn apply(&self, clip: Clip) -> Result<Clip> {
        self.steps.iter().try_fold(clip, |clip, step| step.apply(clip))
    }

    pub fn names(&self) -> Vec<&str> {
        self.steps.iter().map(|step| step.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Chain for video clips, up to but not including volume normalization
    ///
    /// Rotation correction, the preview trim when sampling, margin, fades,
    /// luminance/contrast and finally the speed change.
    pub fn for_videos(config: &Config) -> Self {
        let filters = &config.filters;
        let mut chain = Self::new().then(CorrectRotation);

        if let Some(seconds) = config.sampling.as_ref().and_then(|s| s.clip_seconds) {
            chain = chain.then(Trim {
                start: 0.0,
                end: seconds,
            });
        }

        chain
            .then(Margin {
                size: filters.margin,
                color: filters.margin_color,
            })
            .then(FadeIn {
                seconds: filters.fade_in,
            })
            .then(FadeOut {
                seconds: filters.fade_out,
            })
            .then(LumContrast {
                lum: filters.luminance,
                contrast: filters.contrast,
                threshold: filters.contrast_threshold,
            })
            .then(Speed {
                factor: filters.speed,
            })
    }

    /// Chain for still images; `bounds` adds the final fit-within step
    pub fn for_images(config: &Config, bounds: Option<Size>) -> Self {
        let filters = &config.filters;
        let chain = Self::new()
            .then(Margin {
                size: filters.margin,
                color: filters.margin_color,
            })
            .then(SetDuration {
                seconds: config.images.duration,
            })
            .then(FadeIn {
                seconds: filters.fade_in,
            })
            .then(FadeOut {
                seconds: filters.fade_out,
            })
            .then(LumContrast {
                lum: filters.luminance,
                contrast: filters.contrast,
                threshold: filters.contrast_threshold,
            });

        match bounds {
            Some(bounds) => chain.then(FitWithin { bounds }),
            None => chain,
        }
    }
}
