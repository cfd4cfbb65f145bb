use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use serde::Deserialize;
use tracing::{debug, info};

use crate::audio::AudioLoader;
use crate::error::{Result, VideoError};
use crate::video::types::{Clip, Rotation, Size};

/// Metadata reported for a video file
#[derive(Debug, Clone, PartialEq)]
pub struct VideoMetadata {
    pub duration: f64,
    pub width: u32,
    pub height: u32,
    pub rotation: Rotation,
    pub has_audio: bool,
    pub fps: f64,
    pub codec: String,
}

/// Reads the attributes the pipeline needs from media files
pub trait MediaProbe {
    fn probe_video(&self, path: &Path) -> Result<VideoMetadata>;

    fn probe_image(&self, path: &Path) -> Result<Size>;

    /// Duration of an audio file in seconds
    fn audio_duration(&self, path: &Path) -> Result<f64>;
}

/// Probe backed by `ffprobe` for videos, the `image` crate for stills and
/// [`AudioLoader`] for audio
pub struct FfprobeProbe {
    ffprobe: String,
}

impl FfprobeProbe {
    pub fn new(ffprobe: impl Into<String>) -> Self {
        Self {
            ffprobe: ffprobe.into(),
        }
    }
}

impl Default for FfprobeProbe {
    fn default() -> Self {
        Self::new("ffprobe")
    }
}

impl FfprobeProbe {
    fn run_json(&self, path: &Path) -> Result<String> {
        let output = Command::new(&self.ffprobe)
            .args(["-v", "quiet", "-print_format", "json", "-show_format", "-show_streams"])
            .arg(path)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| VideoError::ProbeFailed {
                path: path.display().to_string(),
                reason: format!("could not run {}: {}", self.ffprobe, e),
            })?;

        if !output.status.success() {
            return Err(VideoError::ProbeFailed {
                path: path.display().to_string(),
                reason: format!("{} exited with {}", self.ffprobe, output.status),
            }
            .into());
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// Durations of the video and audio streams of an encoded file
    pub fn stream_durations(&self, path: &Path) -> Result<StreamDurations> {
        let json = self.run_json(path)?;
        parse_stream_durations(path, &json)
    }
}

impl MediaProbe for FfprobeProbe {
    fn probe_video(&self, path: &Path) -> Result<VideoMetadata> {
        let json = self.run_json(path)?;
        parse_ffprobe_json(path, &json)
    }

    fn probe_image(&self, path: &Path) -> Result<Size> {
        let (width, height) = image::image_dimensions(path).map_err(|e| VideoError::ProbeFailed {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Ok(Size::new(width, height))
    }

    fn audio_duration(&self, path: &Path) -> Result<f64> {
        AudioLoader::probe_duration(path)
    }
}

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
    format: Option<ProbeFormat>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    codec_type: Option<String>,
    codec_name: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    duration: Option<String>,
    avg_frame_rate: Option<String>,
    #[serde(default)]
    tags: HashMap<String, String>,
    #[serde(default)]
    side_data_list: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
}

impl ProbeStream {
    /// Rotation from the legacy `rotate` tag or the display matrix side data
    fn rotation_degrees(&self) -> i64 {
        if let Some(rotate) = self.tags.get("rotate").and_then(|r| r.trim().parse::<i64>().ok()) {
            return rotate;
        }
        // display matrix rotation is counter-clockwise
        self.side_data_list
            .iter()
            .find_map(|entry| entry.get("rotation").and_then(serde_json::Value::as_f64))
            .map(|degrees| -(degrees.round() as i64))
            .unwrap_or(0)
    }
}

fn parse_rate(rate: &str) -> Option<f64> {
    let (num, den) = rate.split_once('/')?;
    let num: f64 = num.trim().parse().ok()?;
    let den: f64 = den.trim().parse().ok()?;
    (den != 0.0).then(|| num / den)
}

/// Extract [`VideoMetadata`] from `ffprobe -print_format json` output
pub fn parse_ffprobe_json(path: &Path, json: &str) -> Result<VideoMetadata> {
    let failed = |reason: String| VideoError::ProbeFailed {
        path: path.display().to_string(),
        reason,
    };

    let probe: ProbeOutput =
        serde_json::from_str(json).map_err(|e| failed(format!("invalid ffprobe output: {}", e)))?;

    let video = probe
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"))
        .ok_or_else(|| failed("no video stream".to_string()))?;

    let (width, height) = match (video.width, video.height) {
        (Some(w), Some(h)) if w > 0 && h > 0 => (w, h),
        _ => return Err(failed("video stream has no dimensions".to_string()).into()),
    };

    let duration = video
        .duration
        .as_deref()
        .or_else(|| probe.format.as_ref().and_then(|f| f.duration.as_deref()))
        .and_then(|d| d.trim().parse::<f64>().ok())
        .filter(|d| *d > 0.0)
        .ok_or_else(|| failed("unknown duration".to_string()))?;

    Ok(VideoMetadata {
        duration,
        width,
        height,
        rotation: Rotation::from_degrees(video.rotation_degrees())?,
        has_audio: probe.streams.iter().any(|s| s.codec_type.as_deref() == Some("audio")),
        fps: video.avg_frame_rate.as_deref().and_then(parse_rate).unwrap_or(0.0),
        codec: video.codec_name.clone().unwrap_or_else(|| "unknown".to_string()),
    })
}

/// Stream lengths of a rendered montage
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StreamDurations {
    pub video: f64,
    pub audio: f64,
}

fn parse_seconds(value: &str) -> Option<f64> {
    value.trim().parse::<f64>().ok().filter(|d| d.is_finite() && *d > 0.0)
}

/// Extract the first video and audio stream durations from ffprobe json
///
/// A stream without its own duration falls back to the container duration.
pub fn parse_stream_durations(path: &Path, json: &str) -> Result<StreamDurations> {
    let failed = |reason: &str| VideoError::ProbeFailed {
        path: path.display().to_string(),
        reason: reason.to_string(),
    };

    let probe: ProbeOutput = serde_json::from_str(json).map_err(|e| VideoError::ProbeFailed {
        path: path.display().to_string(),
        reason: format!("invalid ffprobe output: {}", e),
    })?;
    let container = probe
        .format
        .as_ref()
        .and_then(|f| f.duration.as_deref())
        .and_then(parse_seconds);

    let stream_duration = |kind: &str| -> Option<f64> {
        let stream = probe.streams.iter().find(|s| s.codec_type.as_deref() == Some(kind))?;
        stream.duration.as_deref().and_then(parse_seconds).or(container)
    };

    Ok(StreamDurations {
        video: stream_duration("video").ok_or_else(|| failed("no timed video stream"))?,
        audio: stream_duration("audio").ok_or_else(|| failed("no timed audio stream"))?,
    })
}

/// Files in `directory` with one of `extensions`, sorted by file name
///
/// Extensions match case-insensitively; hidden files are skipped.
pub fn list_media_files(directory: &Path, extensions: &[String]) -> Result<Vec<PathBuf>> {
    if !directory.is_dir() {
        return Err(VideoError::LoadFailed {
            path: directory.display().to_string(),
        }
        .into());
    }

    let mut files = Vec::new();
    for entry in std::fs::read_dir(directory)? {
        let path = entry?.path();
        if !path.is_file() || is_hidden_file(&path) {
            continue;
        }
        let matches = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| extensions.iter().any(|wanted| wanted.eq_ignore_ascii_case(ext)))
            .unwrap_or(false);
        if matches {
            files.push(path);
        }
    }

    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(files)
}

/// Sorted media paths in `directory`, truncated to `limit`
pub fn discover(directory: &Path, extensions: &[String], limit: Option<usize>) -> Result<Vec<PathBuf>> {
    let mut files = list_media_files(directory, extensions)?;
    if let Some(limit) = limit {
        files.truncate(limit);
    }
    Ok(files)
}

fn is_hidden_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(|name| name.starts_with('.'))
        .unwrap_or(false)
}

fn clip_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Builds [`Clip`]s from files on disk
pub struct ClipLoader<'a, P: MediaProbe> {
    probe: &'a P,
}

impl<'a, P: MediaProbe> ClipLoader<'a, P> {
    pub fn new(probe: &'a P) -> Self {
        Self { probe }
    }

    pub fn load_video(&self, path: &Path) -> Result<Clip> {
        let metadata = self.probe.probe_video(path)?;
        let clip = Clip::video(
            clip_name(path),
            path,
            metadata.duration,
            Size::new(metadata.width, metadata.height),
            metadata.rotation,
            metadata.has_audio,
        );

        info!(
            "Video clip: '{}' ({:.2}s, {}, rotation {}, {})",
            clip.name,
            clip.duration,
            clip.size,
            clip.rotation.degrees(),
            if clip.has_audio { "with audio" } else { "silent" }
        );
        debug!("   codec {} @ {:.2} fps", metadata.codec, metadata.fps);
        Ok(clip)
    }

    pub fn load_image(&self, path: &Path) -> Result<Clip> {
        let size = self.probe.probe_image(path)?;
        let clip = Clip::image(clip_name(path), path, size);
        info!("Image clip: '{}' ({})", clip.name, clip.size);
        Ok(clip)
    }

    pub fn load_images(&self, directory: &Path, extensions: &[String], limit: Option<usize>) -> Result<Vec<Clip>> {
        discover(directory, extensions, limit)?
            .iter()
            .map(|path| self.load_image(path))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ReelError;
    use std::fs::File;
    use tempfile::tempdir;

    const PHONE_VIDEO: &str = r#"{
        "streams": [
            {
                "codec_type": "video",
                "codec_name": "h264",
                "width": 1920,
                "height": 1080,
                "avg_frame_rate": "30000/1001",
                "duration": "12.345000",
                "side_data_list": [
                    { "side_data_type": "Display Matrix", "rotation": -90 }
                ]
            },
            { "codec_type": "audio", "codec_name": "aac" }
        ],
        "format": { "duration": "12.400000" }
    }"#;

    #[test]
    fn test_parse_rotated_phone_video() {
        let metadata = parse_ffprobe_json(Path::new("a.mp4"), PHONE_VIDEO).unwrap();

        assert_eq!(metadata.width, 1920);
        assert_eq!(metadata.height, 1080);
        assert_eq!(metadata.duration, 12.345);
        assert_eq!(metadata.rotation, Rotation::Clockwise90);
        assert!(metadata.has_audio);
        assert!((metadata.fps - 29.97).abs() < 0.01);
        assert_eq!(metadata.codec, "h264");
    }

    #[test]
    fn test_parse_rotate_tag_and_format_duration() {
        let json = r#"{
            "streams": [
                { "codec_type": "video", "width": 640, "height": 480, "tags": { "rotate": "270" } }
            ],
            "format": { "duration": "3.5" }
        }"#;

        let metadata = parse_ffprobe_json(Path::new("b.mp4"), json).unwrap();
        assert_eq!(metadata.rotation, Rotation::Clockwise270);
        assert_eq!(metadata.duration, 3.5);
        assert!(!metadata.has_audio);
    }

    #[test]
    fn test_parse_rejects_audio_only() {
        let json = r#"{ "streams": [ { "codec_type": "audio" } ], "format": { "duration": "3.0" } }"#;
        assert!(parse_ffprobe_json(Path::new("c.mp4"), json).is_err());
        assert!(parse_ffprobe_json(Path::new("d.mp4"), "not json").is_err());
    }

    #[test]
    fn test_stream_durations_fall_back_to_container() {
        let json = r#"{
            "streams": [
                { "codec_type": "video", "duration": "10.010000" },
                { "codec_type": "audio" }
            ],
            "format": { "duration": "10.032000" }
        }"#;

        let durations = parse_stream_durations(Path::new("out.mp4"), json).unwrap();
        assert_eq!(durations.video, 10.01);
        assert_eq!(durations.audio, 10.032);
    }

    #[test]
    fn test_stream_durations_require_audio() {
        let json = r#"{ "streams": [ { "codec_type": "video", "duration": "4.0" } ] }"#;
        match parse_stream_durations(Path::new("out.mp4"), json) {
            Err(ReelError::Video(VideoError::ProbeFailed { reason, .. })) => {
                assert!(reason.contains("audio"));
            }
            other => panic!("Expected ProbeFailed, got {:?}", other),
        }
    }

    #[test]
    fn test_list_media_files_sorted_and_filtered() {
        let dir = tempdir().unwrap();
        for name in ["b.mp4", "a.MP4", ".hidden.mp4", "x.jpeg", "notes.txt"] {
            File::create(dir.path().join(name)).unwrap();
        }
        std::fs::create_dir(dir.path().join("folder.mp4")).unwrap();

        let files = list_media_files(dir.path(), &["mp4".to_string()]).unwrap();
        let names: Vec<String> = files.iter().map(|p| clip_name(p)).collect();
        assert_eq!(names, vec!["a.MP4", "b.mp4"]);
    }

    #[test]
    fn test_missing_directory() {
        let dir = tempdir().unwrap();
        assert!(list_media_files(&dir.path().join("nope"), &["mp4".to_string()]).is_err());
    }

    #[test]
    fn test_image_probe_reads_dimensions() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("x.jpeg");
        image::RgbImage::new(64, 48).save(&path).unwrap();

        let probe = FfprobeProbe::default();
        let loader = ClipLoader::new(&probe);
        let clip = loader.load_image(&path).unwrap();

        assert!(clip.is_image());
        assert_eq!(clip.size, Size::new(64, 48));
        assert_eq!(clip.name, "x.jpeg");
    }
}
