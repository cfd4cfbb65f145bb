use thiserror::Error;

/// Main error type for the reel assembler
#[derive(Error, Debug)]
pub enum ReelError {
    #[error("Audio processing error: {0}")]
    Audio(#[from] AudioError),

    #[error("Video processing error: {0}")]
    Video(#[from] VideoError),

    #[error("Composition error: {0}")]
    Composition(#[from] CompositionError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Generic error: {0}")]
    Generic(String),
}

/// Audio-specific errors
#[derive(Error, Debug)]
pub enum AudioError {
    #[error("Failed to load audio file: {path}")]
    LoadFailed { path: String },

    #[error("Unsupported audio format: {format}")]
    UnsupportedFormat { format: String },

    #[error("Failed to extract samples from {path}: {reason}")]
    ExtractionFailed { path: String, reason: String },

    #[error("No positive audio samples in clip '{clip}', cannot estimate volume")]
    EmptySampleBuffer { clip: String },

    #[error("Gain curve produced an unusable factor {factor} for volume {volume}")]
    InvalidGain { volume: f64, factor: f64 },

    #[error("No background audio track found in {dir}")]
    NoBackgroundTrack { dir: String },

    #[error("Background audio is too short: {available:.3}s available after looping, {required:.3}s required")]
    BackgroundTooShort { available: f64, required: f64 },

    #[error("Mixed audio duration {audio:.3}s does not match video duration {video:.3}s")]
    DurationMismatch { audio: f64, video: f64 },

    #[error("Invalid audio parameters: {details}")]
    InvalidParameters { details: String },
}

/// Video-specific errors
#[derive(Error, Debug)]
pub enum VideoError {
    #[error("Failed to load media file: {path}")]
    LoadFailed { path: String },

    #[error("Failed to probe {path}: {reason}")]
    ProbeFailed { path: String, reason: String },

    #[error("Unsupported rotation: {degrees} degrees")]
    UnsupportedRotation { degrees: i64 },

    #[error("ffmpeg not found on PATH")]
    EncoderUnavailable,

    #[error("Video encoding failed: {reason}")]
    EncodingFailed { reason: String },

    #[error("Invalid video parameters: {details}")]
    InvalidParameters { details: String },
}

/// Composition-specific errors
#[derive(Error, Debug)]
pub enum CompositionError {
    #[error("No clips found in directory: {path}")]
    NoClipsFound { path: String },

    #[error("Failed to publish {from} to {to}: {reason}")]
    PublishFailed { from: String, to: String, reason: String },

    #[error("Invalid composition parameters: {details}")]
    InvalidParameters { details: String },
}

/// Configuration-specific errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to parse configuration file {path}: {reason}")]
    ParseFailed { path: String, reason: String },

    #[error("Invalid configuration value: {key} = {value}")]
    InvalidValue { key: String, value: String },

    #[error("Configuration file not found: {path}")]
    FileNotFound { path: String },
}

/// Convenience type alias for Results using ReelError
pub type Result<T> = std::result::Result<T, ReelError>;

impl ReelError {
    /// Create a generic error with a custom message
    pub fn generic<S: Into<String>>(message: S) -> Self {
        Self::Generic(message.into())
    }

    /// Get a user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            Self::Audio(AudioError::NoBackgroundTrack { dir }) => {
                format!("No background music found in '{}'. Add one .mp3 file whose name does not contain 'TEMP'.", dir)
            }
            Self::Audio(AudioError::BackgroundTooShort { available, required }) => {
                format!(
                    "The background music can cover at most {:.1}s but the video lasts {:.1}s. Use a longer track or raise background.max_loops.",
                    available, required
                )
            }
            Self::Audio(AudioError::EmptySampleBuffer { clip }) => {
                format!("Clip '{}' is silent. Set volume.on_silent_clip = \"neutral\" to keep it at its original volume.", clip)
            }
            Self::Composition(CompositionError::NoClipsFound { path }) => {
                format!("No .mp4 or .jpeg files found in '{}'.", path)
            }
            Self::Video(VideoError::EncoderUnavailable) => {
                "FFmpeg is required. Please install FFmpeg and make sure it is on your PATH.".to_string()
            }
            Self::Config(ConfigError::FileNotFound { path }) => {
                format!("Configuration file '{}' not found.", path)
            }
            _ => self.to_string(),
        }
    }
}
