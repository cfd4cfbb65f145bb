use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{
    audio::volume::{RationalCurve, SilentClipPolicy},
    composition::sequencer::OrderingPolicy,
    error::{ConfigError, Result},
    video::types::Rgb,
};

/// Main configuration for the reel assembler
///
/// Every constant of the pipeline lives here and is handed to each stage
/// explicitly. Missing sections in a TOML file fall back to the reference
/// preset.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Input and output locations
    pub paths: PathsConfig,

    /// Per-clip visual transforms
    pub filters: FilterConfig,

    /// Still image handling
    pub images: ImageConfig,

    /// Loudness normalization
    pub volume: VolumeConfig,

    /// Ordering and layout of the timeline
    pub composition: CompositionConfig,

    /// Background music
    pub background: BackgroundConfig,

    /// Final render
    pub encoder: EncoderConfig,

    /// Quick preview renders
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sampling: Option<SamplingConfig>,
}

/// Named parameter sets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Preset {
    /// Full fades, strong luminance lift, unclamped gain curve
    #[default]
    Reference,
    /// Short fades, mild luminance, slower playback, clamped gain curve
    Refined,
}

impl FromStr for Preset {
    type Err = ConfigError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "reference" => Ok(Self::Reference),
            "refined" => Ok(Self::Refined),
            other => Err(ConfigError::InvalidValue {
                key: "preset".to_string(),
                value: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for Preset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Reference => write!(f, "reference"),
            Self::Refined => write!(f, "refined"),
        }
    }
}

impl Config {
    /// Configuration for a named preset
    pub fn preset(preset: Preset) -> Self {
        match preset {
            Preset::Reference => Self::default(),
            Preset::Refined => Self {
                filters: FilterConfig {
                    fade_in: 0.5,
                    fade_out: 0.5,
                    luminance: 0.5,
                    speed: 0.90,
                    ..FilterConfig::default()
                },
                volume: VolumeConfig {
                    curve: RationalCurve::clamped(),
                    ..VolumeConfig::default()
                },
                background: BackgroundConfig {
                    gain: 0.5,
                    ..BackgroundConfig::default()
                },
                ..Self::default()
            },
        }
    }

    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
            path: path.display().to_string(),
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| ConfigError::ParseFailed {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self).map_err(|e| ConfigError::InvalidValue {
            key: "config".to_string(),
            value: e.to_string(),
        })?;

        std::fs::write(path, content)?;
        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.paths.validate()?;
        self.filters.validate()?;
        self.images.validate()?;
        self.volume.validate()?;
        self.composition.validate()?;
        self.background.validate()?;
        self.encoder.validate()?;
        if let Some(sampling) = &self.sampling {
            sampling.validate()?;
        }
        Ok(())
    }
}

fn invalid<V: ToString>(key: &str, value: V) -> crate::error::ReelError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    }
    .into()
}

fn check_non_negative(key: &str, value: f64) -> Result<()> {
    if !(value >= 0.0) || !value.is_finite() {
        return Err(invalid(key, value));
    }
    Ok(())
}

fn check_positive(key: &str, value: f64) -> Result<()> {
    if !(value > 0.0) || !value.is_finite() {
        return Err(invalid(key, value));
    }
    Ok(())
}

fn check_extensions(key: &str, extensions: &[String]) -> Result<()> {
    if extensions.is_empty() || extensions.iter().any(|e| e.is_empty() || e.starts_with('.')) {
        return Err(invalid(key, format!("{:?}", extensions)));
    }
    Ok(())
}

/// Input and output locations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Directory holding videos, images and the background track
    pub media_dir: PathBuf,

    /// Directory the final render is published to
    pub render_dir: PathBuf,

    /// File name of the final render
    pub output_name: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            media_dir: PathBuf::from("media"),
            render_dir: PathBuf::from("render"),
            output_name: "final.mp4".to_string(),
        }
    }
}

impl PathsConfig {
    /// Where the finished render is published
    pub fn output_path(&self) -> PathBuf {
        self.render_dir.join(&self.output_name)
    }

    /// Where the encoder writes before publishing (`final.tmp.mp4`)
    pub fn temp_path(&self) -> PathBuf {
        let name = Path::new(&self.output_name);
        let stem = name.file_stem().map(|s| s.to_string_lossy()).unwrap_or_default();
        let temp_name = match name.extension() {
            Some(ext) => format!("{}.tmp.{}", stem, ext.to_string_lossy()),
            None => format!("{}.tmp", stem),
        };
        self.render_dir.join(temp_name)
    }

    fn validate(&self) -> Result<()> {
        if self.output_name.is_empty() || self.output_name.contains(['/', '\\']) {
            return Err(invalid("paths.output_name", &self.output_name));
        }
        Ok(())
    }
}

/// Per-clip visual transforms
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Border added on every side (pixels)
    pub margin: u32,

    pub margin_color: Rgb,

    /// Fade-in duration (seconds)
    pub fade_in: f64,

    /// Fade-out duration (seconds)
    pub fade_out: f64,

    /// Contrast boost (0.0 = unchanged)
    pub contrast: f64,

    /// Brightness offset added to every channel
    pub luminance: f64,

    /// Channel value contrast pivots around
    pub contrast_threshold: f64,

    /// Playback speed (below 1.0 slows clips down)
    pub speed: f64,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            margin: 20,
            margin_color: [245, 248, 250],
            fade_in: 1.0,
            fade_out: 1.0,
            contrast: 0.2,
            luminance: 3.0,
            contrast_threshold: 127.0,
            speed: 0.95,
        }
    }
}

/// Widest border accepted from configuration, in pixels
pub const MAX_MARGIN: u32 = 4096;

impl FilterConfig {
    fn validate(&self) -> Result<()> {
        if self.margin > MAX_MARGIN {
            return Err(invalid("filters.margin", self.margin));
        }
        check_non_negative("filters.fade_in", self.fade_in)?;
        check_non_negative("filters.fade_out", self.fade_out)?;
        check_positive("filters.speed", self.speed)?;
        if !(-1.0..=10.0).contains(&self.contrast) {
            return Err(invalid("filters.contrast", self.contrast));
        }
        if !(0.0..=255.0).contains(&self.contrast_threshold) {
            return Err(invalid("filters.contrast_threshold", self.contrast_threshold));
        }
        Ok(())
    }
}

/// Still image handling
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageConfig {
    pub extensions: Vec<String>,

    /// How long each image stays on screen (seconds)
    pub duration: f64,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            extensions: vec!["jpeg".to_string()],
            duration: 5.0,
        }
    }
}

impl ImageConfig {
    fn validate(&self) -> Result<()> {
        check_extensions("images.extensions", &self.extensions)?;
        check_positive("images.duration", self.duration)
    }
}

/// Loudness normalization
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VolumeConfig {
    /// Rate samples are extracted at for measurement (Hz)
    pub sample_rate: u32,

    pub channels: u16,

    /// Fraction trimmed from each end of the sorted samples
    pub percentile: f64,

    pub on_silent_clip: SilentClipPolicy,

    pub curve: RationalCurve,
}

impl Default for VolumeConfig {
    fn default() -> Self {
        Self {
            sample_rate: 22000,
            channels: 2,
            percentile: 0.1,
            curve: RationalCurve::reference(),
            on_silent_clip: SilentClipPolicy::Fail,
        }
    }
}

impl VolumeConfig {
    fn validate(&self) -> Result<()> {
        if self.sample_rate == 0 {
            return Err(invalid("volume.sample_rate", self.sample_rate));
        }
        if self.channels == 0 {
            return Err(invalid("volume.channels", self.channels));
        }
        if !(0.0..0.5).contains(&self.percentile) {
            return Err(invalid("volume.percentile", self.percentile));
        }
        if let Some(floor) = self.curve.floor {
            check_positive("volume.curve.floor", floor)?;
        }
        Ok(())
    }
}

/// Ordering and layout of the timeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompositionConfig {
    pub video_extensions: Vec<String>,

    pub ordering: OrderingPolicy,

    /// Color behind clips smaller than the canvas
    pub background_color: Rgb,
}

impl Default for CompositionConfig {
    fn default() -> Self {
        Self {
            video_extensions: vec!["mp4".to_string()],
            ordering: OrderingPolicy::ImagesFirst,
            background_color: [40, 40, 40],
        }
    }
}

impl CompositionConfig {
    fn validate(&self) -> Result<()> {
        check_extensions("composition.video_extensions", &self.video_extensions)
    }
}

/// Background music
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackgroundConfig {
    pub extension: String,

    /// Files whose name contains this marker are never selected
    pub exclude_marker: String,

    /// Attenuation applied to the track
    pub gain: f64,

    pub fade_in: f64,
    pub fade_out: f64,

    /// Maximum extra repetitions of the track
    pub max_loops: u32,

    /// Gain applied to the final mix
    pub master_gain: f64,
}

impl Default for BackgroundConfig {
    fn default() -> Self {
        Self {
            extension: "mp3".to_string(),
            exclude_marker: "TEMP".to_string(),
            gain: 0.4,
            fade_in: 1.0,
            fade_out: 1.0,
            max_loops: 50,
            master_gain: 0.8,
        }
    }
}

impl BackgroundConfig {
    fn validate(&self) -> Result<()> {
        check_extensions("background.extension", std::slice::from_ref(&self.extension))?;
        check_non_negative("background.gain", self.gain)?;
        check_non_negative("background.fade_in", self.fade_in)?;
        check_non_negative("background.fade_out", self.fade_out)?;
        check_non_negative("background.master_gain", self.master_gain)
    }
}

/// Final render
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncoderConfig {
    pub fps: f64,
    pub video_codec: String,
    pub audio_codec: String,
    pub pixel_format: String,
    pub audio_sample_rate: u32,

    /// ffmpeg executable
    pub ffmpeg: String,

    /// ffprobe executable
    pub ffprobe: String,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            fps: 23.98,
            video_codec: "libx264".to_string(),
            audio_codec: "aac".to_string(),
            pixel_format: "yuv420p".to_string(),
            audio_sample_rate: 44100,
            ffmpeg: "ffmpeg".to_string(),
            ffprobe: "ffprobe".to_string(),
        }
    }
}

impl EncoderConfig {
    fn validate(&self) -> Result<()> {
        check_positive("encoder.fps", self.fps)?;
        if self.audio_sample_rate == 0 {
            return Err(invalid("encoder.audio_sample_rate", self.audio_sample_rate));
        }
        Ok(())
    }
}

/// Quick preview renders: short excerpts of the first few files
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SamplingConfig {
    /// Keep only the first seconds of every video
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clip_seconds: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_videos: Option<usize>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_images: Option<usize>,
}

impl SamplingConfig {
    fn validate(&self) -> Result<()> {
        if let Some(seconds) = self.clip_seconds {
            check_positive("sampling.clip_seconds", seconds)?;
        }
        Ok(())
    }
}
