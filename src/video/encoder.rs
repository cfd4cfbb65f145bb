use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use tracing::{debug, info, warn};

use crate::{
    audio::mixer::AudioMixPlan,
    composition::sequencer::Timeline,
    config::EncoderConfig,
    error::{AudioError, CompositionError, Result, VideoError},
    video::loader::{FfprobeProbe, StreamDurations},
    video::types::{ffmpeg_color, join_filters, Clip},
};

/// Represents an encoded video output
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedVideo {
    pub path: PathBuf,
    pub duration: f64,
    pub clip_count: usize,
    pub file_size: u64,
}

/// A fully planned ffmpeg run
#[derive(Debug, Clone, PartialEq)]
pub struct EncodeJob {
    pub args: Vec<String>,

    /// Where ffmpeg writes
    pub temp_path: PathBuf,

    /// Where the finished file is published
    pub output_path: PathBuf,

    pub duration: f64,
    pub clip_count: usize,
}

/// Renders a timeline and its background mix with a single ffmpeg process
pub struct Encoder {
    config: EncoderConfig,
}

impl Encoder {
    pub fn new(config: EncoderConfig) -> Self {
        Self { config }
    }

    pub fn check_ffmpeg_available(&self) -> bool {
        Command::new(&self.config.ffmpeg)
            .arg("-version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|status| status.success())
            .unwrap_or(false)
    }

    /// The `-filter_complex` graph for the whole montage
    ///
    /// Every clip is normalized to the canvas and a common frame rate, its
    /// audio to stereo at the output rate (silence for clips without audio),
    /// then everything is concatenated and the background is mixed under it.
    pub fn filter_graph(&self, timeline: &Timeline, mix: &AudioMixPlan) -> String {
        let canvas = timeline.canvas();
        let rate = self.config.audio_sample_rate;
        let audio_format = format!(
            "aresample={},aformat=sample_fmts=fltp:channel_layouts=stereo",
            rate
        );

        let mut graph = Vec::with_capacity(timeline.clips.len() * 2 + 3);
        for (index, clip) in timeline.clips.iter().enumerate() {
            let mut video = vec!["format=rgb24".to_string()];
            video.extend(clip.video_filters.iter().map(|f| f.to_ffmpeg()));
            video.push(format!(
                "pad={}:{}:(ow-iw)/2:(oh-ih)/2:color={}",
                canvas.width,
                canvas.height,
                ffmpeg_color(timeline.background)
            ));
            video.push("setsar=1".to_string());
            video.push(format!("fps={}", self.config.fps));
            video.push(format!("format={}", self.config.pixel_format));
            graph.push(format!("[{}:v]{}[v{}]", index, join_filters(video), index));

            graph.push(self.clip_audio(index, clip, &audio_format));
        }

        let concat_inputs: String = (0..timeline.clips.len())
            .map(|i| format!("[v{i}][a{i}]"))
            .collect();
        graph.push(format!(
            "{}concat=n={}:v=1:a=1[vcat][acat]",
            concat_inputs,
            timeline.clips.len()
        ));

        let mut background: Vec<String> = mix.filters().iter().map(|f| f.to_ffmpeg()).collect();
        background.push(audio_format);
        graph.push(format!(
            "[{}:a]{}[bg]",
            timeline.clips.len(),
            join_filters(background)
        ));

        graph.push(format!(
            "[acat][bg]amix=inputs=2:duration=first:dropout_transition=0:normalize=0,{}[aout]",
            mix.master().to_ffmpeg()
        ));

        graph.join(";")
    }

    fn clip_audio(&self, index: usize, clip: &Clip, audio_format: &str) -> String {
        if clip.has_audio {
            let mut audio: Vec<String> = clip.audio_filters.iter().map(|f| f.to_ffmpeg()).collect();
            audio.push(audio_format.to_string());
            // pin the stream to the clip's video length
            audio.push(format!("apad,atrim=duration={}", clip.duration));
            format!("[{}:a]{}[a{}]", index, join_filters(audio), index)
        } else {
            format!(
                "anullsrc=r={}:cl=stereo,atrim=duration={},{}[a{}]",
                self.config.audio_sample_rate, clip.duration, audio_format, index
            )
        }
    }

    fn input_args(&self, clip: &Clip) -> Vec<String> {
        let path = clip.path().display().to_string();
        if clip.is_image() {
            let seconds = clip.input_duration.unwrap_or(clip.duration);
            vec![
                "-loop".to_string(),
                "1".to_string(),
                "-framerate".to_string(),
                self.config.fps.to_string(),
                "-t".to_string(),
                seconds.to_string(),
                "-i".to_string(),
                path,
            ]
        } else {
            vec!["-noautorotate".to_string(), "-i".to_string(), path]
        }
    }

    /// Plan the ffmpeg run writing `temp_path`, published later to `output_path`
    pub fn prepare(
        &self,
        timeline: &Timeline,
        mix: &AudioMixPlan,
        temp_path: &Path,
        output_path: &Path,
    ) -> EncodeJob {
        let mut args: Vec<String> = ["-hide_banner", "-loglevel", "error", "-y"]
            .iter()
            .map(|s| s.to_string())
            .collect();

        for clip in &timeline.clips {
            args.extend(self.input_args(clip));
        }

        args.extend([
            "-stream_loop".to_string(),
            mix.loops.to_string(),
            "-i".to_string(),
            mix.track.display().to_string(),
        ]);

        let graph = self.filter_graph(timeline, mix);
        debug!("Filter graph: {}", graph);

        args.extend([
            "-filter_complex".to_string(),
            graph,
            "-map".to_string(),
            "[vcat]".to_string(),
            "-map".to_string(),
            "[aout]".to_string(),
            "-c:v".to_string(),
            self.config.video_codec.clone(),
            "-pix_fmt".to_string(),
            self.config.pixel_format.clone(),
            "-r".to_string(),
            self.config.fps.to_string(),
            "-c:a".to_string(),
            self.config.audio_codec.clone(),
            "-ar".to_string(),
            self.config.audio_sample_rate.to_string(),
            "-movflags".to_string(),
            "+faststart".to_string(),
            temp_path.display().to_string(),
        ]);

        EncodeJob {
            args,
            temp_path: temp_path.to_path_buf(),
            output_path: output_path.to_path_buf(),
            duration: timeline.duration(),
            clip_count: timeline.clips.len(),
        }
    }

    /// The job as a copy-pasteable shell command
    pub fn command_line(&self, job: &EncodeJob) -> String {
        std::iter::once(self.config.ffmpeg.as_str())
            .chain(job.args.iter().map(String::as_str))
            .map(shell_quote)
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Run ffmpeg, verify the rendered durations and publish; nothing is published on failure
    pub fn encode(&self, job: &EncodeJob) -> Result<EncodedVideo> {
        if !self.check_ffmpeg_available() {
            return Err(VideoError::EncoderUnavailable.into());
        }

        if let Some(parent) = job.temp_path.parent() {
            fs::create_dir_all(parent)?;
        }
        if job.temp_path.exists() {
            warn!("Removing stale temporary file {:?}", job.temp_path);
            fs::remove_file(&job.temp_path)?;
        }

        info!("   Encoding {} clip(s) into {:?}", job.clip_count, job.temp_path);
        let output = Command::new(&self.config.ffmpeg)
            .args(&job.args)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| VideoError::EncodingFailed {
                reason: format!("FFmpeg execution failed: {}", e),
            })?;

        if !output.status.success() {
            let _ = fs::remove_file(&job.temp_path);
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(VideoError::EncodingFailed {
                reason: format!("FFmpeg failed: {}", stderr.trim()),
            }
            .into());
        }

        let verified = FfprobeProbe::new(self.config.ffprobe.clone())
            .stream_durations(&job.temp_path)
            .and_then(|rendered| {
                check_rendered_duration(rendered, job.duration, self.config.fps)?;
                Ok(rendered)
            });
        match verified {
            Ok(rendered) => debug!(
                "   Rendered {:.3}s video / {:.3}s audio",
                rendered.video, rendered.audio
            ),
            Err(e) => {
                let _ = fs::remove_file(&job.temp_path);
                return Err(e);
            }
        }

        publish(&job.temp_path, &job.output_path)?;
        let file_size = fs::metadata(&job.output_path)?.len();

        Ok(EncodedVideo {
            path: job.output_path.clone(),
            duration: job.duration,
            clip_count: job.clip_count,
            file_size,
        })
    }
}

/// Both rendered streams must last the planned duration, within one frame
pub fn check_rendered_duration(rendered: StreamDurations, expected: f64, fps: f64) -> Result<()> {
    let tolerance = if fps > 0.0 { 1.0 / fps } else { 0.0 };

    if !((rendered.audio - expected).abs() <= tolerance) {
        return Err(AudioError::DurationMismatch {
            audio: rendered.audio,
            video: expected,
        }
        .into());
    }
    if !((rendered.video - expected).abs() <= tolerance) {
        return Err(VideoError::EncodingFailed {
            reason: format!(
                "rendered video lasts {:.3}s, expected {:.3}s",
                rendered.video, expected
            ),
        }
        .into());
    }
    Ok(())
}

/// Move the finished render into place, copying when a rename is not possible
pub fn publish(from: &Path, to: &Path) -> Result<()> {
    let failed = |e: std::io::Error| CompositionError::PublishFailed {
        from: from.display().to_string(),
        to: to.display().to_string(),
        reason: e.to_string(),
    };

    if let Some(parent) = to.parent() {
        fs::create_dir_all(parent).map_err(failed)?;
    }

    if let Err(e) = fs::rename(from, to) {
        debug!("Rename failed ({}), copying instead", e);
        fs::copy(from, to).map_err(failed)?;
        fs::remove_file(from).map_err(failed)?;
    }
    Ok(())
}

fn shell_quote(arg: &str) -> String {
    let plain = !arg.is_empty()
        && arg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./:+=,".contains(c));
    if plain {
        arg.to_string()
    } else {
        format!("'{}'", arg.replace('\'', "'\\''"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BackgroundConfig;
    use crate::error::ReelError;
    use crate::video::types::{Rotation, Size};
    use tempfile::tempdir;

    fn sample_timeline() -> Timeline {
        let image = Clip {
            duration: 5.0,
            input_duration: Some(5.0),
            ..Clip::image("x.jpeg", "media/x.jpeg", Size::new(640, 480))
        };
        let video = Clip::video("a.mp4", "media/a.mp4", 4.0, Size::new(1281, 720), Rotation::None, true);
        let silent = Clip::video("b.mp4", "media/b.mp4", 2.0, Size::new(320, 240), Rotation::None, false);
        Timeline {
            clips: vec![image, video, silent],
            background: [40, 40, 40],
        }
    }

    fn sample_mix() -> AudioMixPlan {
        AudioMixPlan::new(PathBuf::from("media/song.mp3"), 4.0, 11.0, &BackgroundConfig::default()).unwrap()
    }

    fn encoder() -> Encoder {
        Encoder::new(EncoderConfig::default())
    }

    #[test]
    fn test_inputs() {
        let job = encoder().prepare(
            &sample_timeline(),
            &sample_mix(),
            Path::new("render/final.tmp.mp4"),
            Path::new("render/final.mp4"),
        );
        let args = job.args.join(" ");

        assert!(args.contains("-loop 1 -framerate 23.98 -t 5 -i media/x.jpeg"));
        assert!(args.contains("-noautorotate -i media/a.mp4"));
        assert!(args.contains("-stream_loop 2 -i media/song.mp3"));
        assert!(args.contains("-c:v libx264"));
        assert!(args.contains("-c:a aac"));
        assert_eq!(job.args.last().unwrap(), "render/final.tmp.mp4");
        assert_eq!(job.clip_count, 3);
        assert_eq!(job.duration, 11.0);
    }

    #[test]
    fn test_filter_graph() {
        let graph = encoder().filter_graph(&sample_timeline(), &sample_mix());

        // canvas is the largest clip rounded up to even
        assert!(graph.contains("pad=1282:720:(ow-iw)/2:(oh-ih)/2:color=0x282828"));
        assert!(graph.contains("[1:a]aresample=44100"));
        assert!(graph.contains("anullsrc=r=44100:cl=stereo,atrim=duration=5"));
        assert!(graph.contains("[v0][a0][v1][a1][v2][a2]concat=n=3:v=1:a=1[vcat][acat]"));
        assert!(graph.contains("[3:a]volume=0.4,atrim=start=0:end=11"));
        assert!(graph.contains("amix=inputs=2:duration=first:dropout_transition=0:normalize=0,volume=0.8[aout]"));
    }

    #[test]
    fn test_command_line_quoting() {
        let job = EncodeJob {
            args: vec!["-i".to_string(), "my clip.mp4".to_string(), "[vcat]".to_string()],
            temp_path: PathBuf::from("t.mp4"),
            output_path: PathBuf::from("o.mp4"),
            duration: 1.0,
            clip_count: 1,
        };
        assert_eq!(encoder().command_line(&job), "ffmpeg -i 'my clip.mp4' '[vcat]'");
    }

    #[test]
    fn test_publish_moves_file() {
        let dir = tempdir().unwrap();
        let temp = dir.path().join("final.tmp.mp4");
        let output = dir.path().join("render").join("final.mp4");
        fs::write(&temp, b"video").unwrap();

        publish(&temp, &output).unwrap();
        assert!(!temp.exists());
        assert_eq!(fs::read(&output).unwrap(), b"video");
    }

    #[test]
    fn test_rendered_duration_within_one_frame() {
        let rendered = StreamDurations {
            video: 11.0,
            audio: 11.02,
        };
        check_rendered_duration(rendered, 11.0, 25.0).unwrap();
    }

    #[test]
    fn test_rendered_duration_mismatch() {
        let short_audio = StreamDurations {
            video: 11.0,
            audio: 10.5,
        };
        match check_rendered_duration(short_audio, 11.0, 25.0) {
            Err(ReelError::Audio(AudioError::DurationMismatch { audio, video })) => {
                assert_eq!(audio, 10.5);
                assert_eq!(video, 11.0);
            }
            other => panic!("Expected DurationMismatch, got {:?}", other),
        }

        let long_video = StreamDurations {
            video: 11.2,
            audio: 11.0,
        };
        match check_rendered_duration(long_video, 11.0, 25.0) {
            Err(ReelError::Video(VideoError::EncodingFailed { .. })) => {}
            other => panic!("Expected EncodingFailed, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_encoder() {
        let dir = tempdir().unwrap();
        let config = EncoderConfig {
            ffmpeg: "/nonexistent/ffmpeg-binary".to_string(),
            ..EncoderConfig::default()
        };
        let encoder = Encoder::new(config);
        let job = encoder.prepare(
            &sample_timeline(),
            &sample_mix(),
            &dir.path().join("final.tmp.mp4"),
            &dir.path().join("final.mp4"),
        );

        match encoder.encode(&job) {
            Err(ReelError::Video(VideoError::EncoderUnavailable)) => {}
            other => panic!("Expected EncoderUnavailable, got {:?}", other),
        }
        assert!(!dir.path().join("final.mp4").exists());
    }
}
