use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::{Result, VideoError};

/// RGB color triple
pub type Rgb = [u8; 3];

/// Format a color the way ffmpeg expects it (`0xRRGGBB`)
pub fn ffmpeg_color(color: Rgb) -> String {
    format!("0x{:02X}{:02X}{:02X}", color[0], color[1], color[2])
}

/// Pixel dimensions of a clip
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Swap width and height
    pub fn transposed(self) -> Self {
        Self::new(self.height, self.width)
    }

    /// Round both dimensions up to the next even number
    pub fn even(self) -> Self {
        Self::new(self.width + self.width % 2, self.height + self.height % 2)
    }
}

impl fmt::Display for Size {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Display rotation stored in the container metadata
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Rotation {
    #[default]
    None,
    Clockwise90,
    Half,
    Clockwise270,
}

impl Rotation {
    /// Parse a rotation in degrees. Negative values count counter-clockwise.
    pub fn from_degrees(degrees: i64) -> Result<Self> {
        match degrees.rem_euclid(360) {
            0 => Ok(Self::None),
            90 => Ok(Self::Clockwise90),
            180 => Ok(Self::Half),
            270 => Ok(Self::Clockwise270),
            _ => Err(VideoError::UnsupportedRotation { degrees }.into()),
        }
    }

    pub fn degrees(self) -> u32 {
        match self {
            Self::None => 0,
            Self::Clockwise90 => 90,
            Self::Half => 180,
            Self::Clockwise270 => 270,
        }
    }

    /// Whether correcting this rotation swaps width and height
    pub fn swaps_axes(self) -> bool {
        matches!(self, Self::Clockwise90 | Self::Clockwise270)
    }
}

/// Where a clip's frames come from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClipSource {
    Video(PathBuf),
    Image(PathBuf),
}

impl ClipSource {
    pub fn path(&self) -> &Path {
        match self {
            Self::Video(path) | Self::Image(path) => path,
        }
    }
}

/// Fade direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FadeKind {
    In,
    Out,
}

impl FadeKind {
    fn as_str(self) -> &'static str {
        match self {
            Self::In => "in",
            Self::Out => "out",
        }
    }
}

/// One step of a clip's video filter graph
#[derive(Debug, Clone, PartialEq)]
pub enum VideoFilter {
    /// Rotate a quarter turn (`clockwise = false` rotates counter-clockwise)
    Transpose { clockwise: bool },
    /// Rotate half a turn
    Flip,
    Trim { start: f64, end: f64 },
    Pad { margin: u32, color: Rgb },
    Fade { kind: FadeKind, start: f64, duration: f64 },
    LumContrast { lum: f64, contrast: f64, threshold: f64 },
    Speed { factor: f64 },
    Scale { size: Size },
}

impl VideoFilter {
    /// Render this step as an ffmpeg filter expression
    pub fn to_ffmpeg(&self) -> String {
        match self {
            Self::Transpose { clockwise: true } => "transpose=1".to_string(),
            Self::Transpose { clockwise: false } => "transpose=2".to_string(),
            Self::Flip => "hflip,vflip".to_string(),
            Self::Trim { start, end } => {
                format!("trim=start={}:end={},setpts=PTS-STARTPTS", start, end)
            }
            Self::Pad { margin, color } => format!(
                "pad=iw+{m2}:ih+{m2}:{m}:{m}:color={c}",
                m2 = margin * 2,
                m = margin,
                c = ffmpeg_color(*color)
            ),
            Self::Fade { kind, start, duration } => {
                format!("fade=t={}:st={}:d={}", kind.as_str(), start, duration)
            }
            Self::LumContrast { lum, contrast, threshold } => {
                let expr = format!(
                    "clip({}+{}+{}*(val-{}),0,255)",
                    lum,
                    threshold,
                    1.0 + contrast,
                    threshold
                );
                format!("lutrgb=r='{e}':g='{e}':b='{e}'", e = expr)
            }
            Self::Speed { factor } => format!("setpts=PTS/{}", factor),
            Self::Scale { size } => format!("scale={}:{}", size.width, size.height),
        }
    }
}

/// One step of a clip's audio filter graph
#[derive(Debug, Clone, PartialEq)]
pub enum AudioFilter {
    Trim { start: f64, end: f64 },
    Tempo { factor: f64 },
    Volume { gain: f64 },
    Fade { kind: FadeKind, start: f64, duration: f64 },
}

impl AudioFilter {
    /// Render this step as an ffmpeg filter expression
    pub fn to_ffmpeg(&self) -> String {
        match self {
            Self::Trim { start, end } => {
                format!("atrim=start={}:end={},asetpts=PTS-STARTPTS", start, end)
            }
            Self::Tempo { factor } => format!("atempo={}", factor),
            Self::Volume { gain } => format!("volume={}", gain),
            Self::Fade { kind, start, duration } => {
                format!("afade=t={}:st={}:d={}", kind.as_str(), start, duration)
            }
        }
    }
}

/// Join filter steps into a comma-separated chain
pub fn join_filters<I>(steps: I) -> String
where
    I: IntoIterator<Item = String>,
{
    steps.into_iter().collect::<Vec<_>>().join(",")
}

/// A decoded media unit described by its source and the transforms applied to it
///
/// Transforms never modify a clip in place: every step in
/// [`crate::video::filters`] consumes a `Clip` and returns a new one with
/// updated metrics and one more filter recorded.
#[derive(Debug, Clone, PartialEq)]
pub struct Clip {
    /// Name shown in logs (file name)
    pub name: String,

    pub source: ClipSource,

    /// Playback duration in seconds after all transforms
    pub duration: f64,

    /// Frame size after all transforms
    pub size: Size,

    /// Rotation still pending correction
    pub rotation: Rotation,

    /// Whether the source carries an audio stream
    pub has_audio: bool,

    /// Limit applied on the input side (looped still images)
    pub input_duration: Option<f64>,

    /// Source time range (seconds) that ends up on screen
    pub source_window: (f64, f64),

    /// Cumulative playback rate applied so far
    pub speed: f64,

    pub video_filters: Vec<VideoFilter>,
    pub audio_filters: Vec<AudioFilter>,
}

impl Clip {
    /// Create a clip for a video file
    pub fn video<P: Into<PathBuf>>(
        name: impl Into<String>,
        path: P,
        duration: f64,
        size: Size,
        rotation: Rotation,
        has_audio: bool,
    ) -> Self {
        Self {
            name: name.into(),
            source: ClipSource::Video(path.into()),
            duration,
            size,
            rotation,
            has_audio,
            input_duration: None,
            source_window: (0.0, duration),
            speed: 1.0,
            video_filters: Vec::new(),
            audio_filters: Vec::new(),
        }
    }

    /// Create a clip for a still image. Its duration stays zero until one is set.
    pub fn image<P: Into<PathBuf>>(name: impl Into<String>, path: P, size: Size) -> Self {
        Self {
            name: name.into(),
            source: ClipSource::Image(path.into()),
            duration: 0.0,
            size,
            rotation: Rotation::None,
            has_audio: false,
            input_duration: None,
            source_window: (0.0, 0.0),
            speed: 1.0,
            video_filters: Vec::new(),
            audio_filters: Vec::new(),
        }
    }

    pub fn is_image(&self) -> bool {
        matches!(self.source, ClipSource::Image(_))
    }

    pub fn path(&self) -> &Path {
        self.source.path()
    }

    /// Append a video filter step
    pub fn push_video(mut self, filter: VideoFilter) -> Self {
        self.video_filters.push(filter);
        self
    }

    /// Append an audio filter step
    pub fn push_audio(mut self, filter: AudioFilter) -> Self {
        self.audio_filters.push(filter);
        self
    }

    /// The recorded video steps as one ffmpeg chain (empty when untouched)
    pub fn video_chain(&self) -> String {
        join_filters(self.video_filters.iter().map(VideoFilter::to_ffmpeg))
    }

    /// The recorded audio steps as one ffmpeg chain (empty when untouched)
    pub fn audio_chain(&self) -> String {
        join_filters(self.audio_filters.iter().map(AudioFilter::to_ffmpeg))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rotation_parsing() {
        assert_eq!(Rotation::from_degrees(0).unwrap(), Rotation::None);
        assert_eq!(Rotation::from_degrees(90).unwrap(), Rotation::Clockwise90);
        assert_eq!(Rotation::from_degrees(-90).unwrap(), Rotation::Clockwise270);
        assert_eq!(Rotation::from_degrees(540).unwrap(), Rotation::Half);
        assert!(Rotation::from_degrees(45).is_err());
    }

    #[test]
    fn test_even_size() {
        assert_eq!(Size::new(641, 480).even(), Size::new(642, 480));
        assert_eq!(Size::new(640, 481).even(), Size::new(640, 482));
    }

    #[test]
    fn test_filter_rendering() {
        assert_eq!(ffmpeg_color([245, 248, 250]), "0xF5F8FA");
        assert_eq!(
            VideoFilter::Pad { margin: 20, color: [40, 40, 40] }.to_ffmpeg(),
            "pad=iw+40:ih+40:20:20:color=0x282828"
        );
        assert_eq!(VideoFilter::Speed { factor: 0.95 }.to_ffmpeg(), "setpts=PTS/0.95");
        assert_eq!(AudioFilter::Volume { gain: 0.8 }.to_ffmpeg(), "volume=0.8");

        let lut = VideoFilter::LumContrast { lum: 3.0, contrast: 0.2, threshold: 127.0 }.to_ffmpeg();
        assert!(lut.starts_with("lutrgb=r='clip(3+127+1.2*(val-127),0,255)'"));
    }

    #[test]
    fn test_clip_chains() {
        let clip = Clip::video("a.mp4", "media/a.mp4", 4.0, Size::new(640, 480), Rotation::None, true)
            .push_video(VideoFilter::Speed { factor: 0.5 })
            .push_video(VideoFilter::Scale { size: Size::new(320, 240) })
            .push_audio(AudioFilter::Tempo { factor: 0.5 });

        assert_eq!(clip.video_chain(), "setpts=PTS/0.5,scale=320:240");
        assert_eq!(clip.audio_chain(), "atempo=0.5");
        assert!(!clip.is_image());
        assert_eq!(clip.source_window, (0.0, 4.0));
    }
}
