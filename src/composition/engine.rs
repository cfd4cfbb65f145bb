use std::path::PathBuf;

use tracing::{debug, info};

use crate::{
    audio::{
        extract::{FfmpegSampleSource, SampleSource},
        mixer::{select_background, AudioMixPlan},
        volume::{VolumeEstimator, VolumeMeasurement},
    },
    composition::sequencer::{Sequencer, Timeline},
    config::Config,
    error::{CompositionError, Result},
    video::{
        encoder::{EncodeJob, Encoder},
        filters::{ClipTransform, FilterChain, Volume},
        loader::{discover, ClipLoader, FfprobeProbe, MediaProbe},
        types::Clip,
    },
};

/// A processed video together with the loudness measured for it
#[derive(Debug, Clone)]
pub struct MeasuredClip {
    pub clip: Clip,

    /// `None` for clips without an audio stream
    pub measurement: Option<VolumeMeasurement>,
}

/// Everything decided before ffmpeg is started
#[derive(Debug, Clone)]
pub struct RenderPlan {
    pub timeline: Timeline,
    pub mix: AudioMixPlan,
    pub job: EncodeJob,
}

/// What a finished render produced
#[derive(Debug, Clone, PartialEq)]
pub struct RenderSummary {
    pub output_path: PathBuf,
    pub duration: f64,
    pub video_count: usize,
    pub image_count: usize,
    pub file_size: u64,
}

/// Main engine that turns a media directory into one rendered montage
///
/// The pipeline:
/// 1. Videos - load, correct, filter and normalize the loudness of every clip
/// 2. Images - load stills
/// 3. Sequencing - size images against the videos and order both groups
/// 4. Background - pick, loop and trim the music to the timeline
/// 5. Encoding - one ffmpeg run to a temporary file, then publish
///
/// Steps 1 to 4 make up [`RenderEngine::plan`]; every fatal audio check
/// happens there, before any output file is touched.
pub struct RenderEngine<P: MediaProbe, S: SampleSource> {
    config: Config,
    probe: P,
    samples: S,
}

impl RenderEngine<FfprobeProbe, FfmpegSampleSource> {
    /// Engine backed by ffprobe and ffmpeg as configured
    pub fn new(config: Config) -> Self {
        let probe = FfprobeProbe::new(config.encoder.ffprobe.clone());
        let samples = FfmpegSampleSource::from_config(config.encoder.ffmpeg.clone(), &config.volume);
        Self::with_backends(config, probe, samples)
    }
}

impl<P: MediaProbe, S: SampleSource> RenderEngine<P, S> {
    pub fn with_backends(config: Config, probe: P, samples: S) -> Self {
        Self {
            config,
            probe,
            samples,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    fn encoder(&self) -> Encoder {
        Encoder::new(self.config.encoder.clone())
    }

    /// Decide the whole render without producing any output
    pub fn plan(&self) -> Result<RenderPlan> {
        self.config.validate()?;

        let media_dir = &self.config.paths.media_dir;
        info!("🎬 Starting reel assembly");
        info!("   Media: {:?}", media_dir);
        info!("   Output: {:?}", self.config.paths.output_path());

        if !media_dir.is_dir() {
            return Err(CompositionError::NoClipsFound {
                path: media_dir.display().to_string(),
            }
            .into());
        }

        // Pipeline Step 1: Videos
        let videos = self
            .measure_videos()?
            .into_iter()
            .map(|measured| measured.clip)
            .collect();

        // Pipeline Step 2: Images
        info!("🖼️  Step 2: Loading images...");
        let images = ClipLoader::new(&self.probe).load_images(
            media_dir,
            &self.config.images.extensions,
            self.config.sampling.as_ref().and_then(|s| s.max_images),
        )?;
        info!("   ✅ {} image(s) loaded", images.len());

        // Pipeline Step 3: Sequencing
        info!("⏱️  Step 3: Sequencing clips...");
        let timeline = Sequencer::new(&self.config).sequence(videos, images)?;
        for (position, clip) in timeline.clips.iter().enumerate() {
            debug!("      {:02} - {} ({:.2}s, {})", position + 1, clip.name, clip.duration, clip.size);
        }

        // Pipeline Step 4: Background audio
        let mix = self.plan_background(timeline.duration())?;

        let job = self.encoder().prepare(
            &timeline,
            &mix,
            &self.config.paths.temp_path(),
            &self.config.paths.output_path(),
        );

        Ok(RenderPlan { timeline, mix, job })
    }

    /// Load, filter and measure every video without rendering anything
    ///
    /// The returned clips already carry their volume step.
    pub fn measure_videos(&self) -> Result<Vec<MeasuredClip>> {
        info!("📹 Step 1: Processing videos...");
        self.config.validate()?;

        let paths = discover(
            &self.config.paths.media_dir,
            &self.config.composition.video_extensions,
            self.config.sampling.as_ref().and_then(|s| s.max_videos),
        )?;

        let loader = ClipLoader::new(&self.probe);
        let chain = FilterChain::for_videos(&self.config);
        let estimator = VolumeEstimator::from_config(&self.config.volume);
        debug!("Video chain: {}", chain.names().join(" -> "));

        let mut measured = Vec::with_capacity(paths.len());
        for path in &paths {
            let clip = chain.apply(loader.load_video(path)?)?;

            if !clip.has_audio {
                info!("   {}: {:.2}s, {}, no audio", clip.name, clip.duration, clip.size);
                measured.push(MeasuredClip {
                    clip,
                    measurement: None,
                });
                continue;
            }

            let buffer = self.samples.samples(&clip)?;
            let measurement = estimator.measure(&clip.name, &buffer)?;
            let clip = Volume {
                gain: measurement.gain,
            }
            .apply(clip)?;

            info!(
                "   {}: {:.2}s, {}, gain {:.3}",
                clip.name, clip.duration, clip.size, measurement.gain
            );
            measured.push(MeasuredClip {
                clip,
                measurement: Some(measurement),
            });
        }

        info!("   ✅ {} video(s) processed", measured.len());
        Ok(measured)
    }

    fn plan_background(&self, duration: f64) -> Result<AudioMixPlan> {
        info!("🎵 Step 4: Planning background audio...");

        let track = select_background(&self.config.paths.media_dir, &self.config.background)?;
        let track_duration = self.probe.audio_duration(&track)?;
        let mix = AudioMixPlan::new(track, track_duration, duration, &self.config.background)?;

        mix.log_summary();
        Ok(mix)
    }

    /// The planned ffmpeg invocation as a shell command
    pub fn command_line(&self, plan: &RenderPlan) -> String {
        self.encoder().command_line(&plan.job)
    }

    /// Plan, encode and publish the montage
    pub fn render(&self) -> Result<RenderSummary> {
        let plan = self.plan()?;

        info!("🎞️  Step 5: Encoding final video...");
        let encoded = self.encoder().encode(&plan.job)?;

        info!(
            "🎉 Render complete! {:?} ({:.1}s, {} MB)",
            encoded.path,
            encoded.duration,
            encoded.file_size / 1024 / 1024
        );

        Ok(RenderSummary {
            output_path: encoded.path,
            duration: encoded.duration,
            video_count: plan.timeline.video_count(),
            image_count: plan.timeline.image_count(),
            file_size: encoded.file_size,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::types::SampleBuffer;
    use crate::audio::volume::SilentClipPolicy;
    use crate::config::SamplingConfig;
    use crate::error::{AudioError, ConfigError, ReelError};
    use crate::video::loader::VideoMetadata;
    use crate::video::types::{Rotation, Size};
    use std::collections::HashMap;
    use std::fs::File;
    use std::path::Path;
    use tempfile::{tempdir, TempDir};

    struct FakeProbe {
        videos: HashMap<String, f64>,
        track_duration: f64,
    }

    fn file_name(path: &Path) -> String {
        path.file_name().unwrap().to_string_lossy().into_owned()
    }

    impl MediaProbe for FakeProbe {
        fn probe_video(&self, path: &Path) -> Result<VideoMetadata> {
            Ok(VideoMetadata {
                duration: self.videos[&file_name(path)],
                width: 1280,
                height: 720,
                rotation: Rotation::None,
                has_audio: !file_name(path).starts_with("mute"),
                fps: 30.0,
                codec: "h264".to_string(),
            })
        }

        fn probe_image(&self, _path: &Path) -> Result<Size> {
            Ok(Size::new(4000, 3000))
        }

        fn audio_duration(&self, _path: &Path) -> Result<f64> {
            Ok(self.track_duration)
        }
    }

    struct FakeSamples {
        level: f32,
    }

    impl SampleSource for FakeSamples {
        fn samples(&self, _clip: &Clip) -> Result<SampleBuffer> {
            Ok(SampleBuffer::new(vec![self.level, -self.level, 0.0, self.level], 22000, 2))
        }
    }

    fn media_dir(files: &[&str]) -> TempDir {
        let dir = tempdir().unwrap();
        let media = dir.path().join("media");
        std::fs::create_dir(&media).unwrap();
        for name in files {
            File::create(media.join(name)).unwrap();
        }
        dir
    }

    fn config_for(dir: &TempDir) -> Config {
        let mut config = Config::default();
        config.paths.media_dir = dir.path().join("media");
        config.paths.render_dir = dir.path().join("render");
        config.filters.speed = 1.0;
        config
    }

    fn engine(config: Config, track_duration: f64, level: f32) -> RenderEngine<FakeProbe, FakeSamples> {
        let videos = [("a.mp4", 4.0), ("b.mp4", 6.5), ("mute.mp4", 3.0)]
            .into_iter()
            .map(|(name, d)| (name.to_string(), d))
            .collect();
        RenderEngine::with_backends(
            config,
            FakeProbe {
                videos,
                track_duration,
            },
            FakeSamples { level },
        )
    }

    #[test]
    fn test_plan_orders_images_before_videos() {
        let dir = media_dir(&["b.mp4", "a.mp4", "y.jpeg", "x.jpeg", "song.mp3", "mix TEMP.mp3"]);
        let engine = engine(config_for(&dir), 7.0, 0.1);

        let plan = engine.plan().unwrap();
        assert_eq!(plan.timeline.names(), vec!["x.jpeg", "y.jpeg", "a.mp4", "b.mp4"]);
        assert!((plan.timeline.duration() - (5.0 + 5.0 + 4.0 + 6.5)).abs() < 1e-9);

        assert_eq!(plan.mix.track.file_name().unwrap(), "song.mp3");
        assert_eq!(plan.mix.duration, plan.timeline.duration());
        assert_eq!(plan.mix.loops, 2);

        // 4040x3040 padded image fitted into the 1320x760 padded videos
        assert_eq!(plan.timeline.clips[0].size, Size::new(1010, 760));
        assert!(plan.job.args.iter().any(|a| a == "-filter_complex"));
    }

    #[test]
    fn test_videos_get_volume_step() {
        let dir = media_dir(&["a.mp4", "mute.mp4", "song.mp3"]);
        let engine = engine(config_for(&dir), 60.0, 0.1);

        let measured = engine.measure_videos().unwrap();
        assert_eq!(measured.len(), 2);

        let loud = &measured[0];
        let expected = 10.3 * 0.1f32 as f64 + 0.0997 / (0.1f32 as f64) + 0.41;
        assert!((loud.measurement.unwrap().gain - expected).abs() < 1e-6);
        assert!(loud.clip.audio_chain().contains("volume="));

        let mute = &measured[1];
        assert!(mute.measurement.is_none());
        assert!(mute.clip.audio_filters.is_empty());
    }

    #[test]
    fn test_measuring_rejects_invalid_config() {
        let dir = media_dir(&["a.mp4", "song.mp3"]);
        let mut config = config_for(&dir);
        config.volume.percentile = 0.7;

        match engine(config, 60.0, 0.1).measure_videos() {
            Err(ReelError::Config(ConfigError::InvalidValue { key, .. })) => assert_eq!(key, "volume.percentile"),
            other => panic!("Expected InvalidValue, got {:?}", other),
        }
    }

    #[test]
    fn test_short_background_aborts_before_output() {
        let dir = media_dir(&["a.mp4", "b.mp4", "song.mp3"]);
        let mut config = config_for(&dir);
        config.background.max_loops = 1;
        let engine = engine(config.clone(), 2.0, 0.1);

        match engine.render() {
            Err(ReelError::Audio(AudioError::BackgroundTooShort { available, required })) => {
                assert_eq!(available, 4.0);
                assert!((required - 10.5).abs() < 1e-9);
            }
            other => panic!("Expected BackgroundTooShort, got {:?}", other),
        }
        assert!(!config.paths.output_path().exists());
        assert!(!config.paths.temp_path().exists());
    }

    #[test]
    fn test_silent_clip_fails_by_default() {
        let dir = media_dir(&["a.mp4", "song.mp3"]);

        let strict = engine(config_for(&dir), 60.0, 0.0);
        match strict.plan() {
            Err(ReelError::Audio(AudioError::EmptySampleBuffer { clip })) => assert_eq!(clip, "a.mp4"),
            other => panic!("Expected EmptySampleBuffer, got {:?}", other),
        }

        let mut config = config_for(&dir);
        config.volume.on_silent_clip = SilentClipPolicy::Neutral;
        let lenient = engine(config, 60.0, 0.0);
        let plan = lenient.plan().unwrap();
        assert!(plan.timeline.clips[0].audio_chain().contains("volume=1"));
    }

    #[test]
    fn test_sampling_limits() {
        let dir = media_dir(&["a.mp4", "b.mp4", "x.jpeg", "y.jpeg", "song.mp3"]);
        let mut config = config_for(&dir);
        config.sampling = Some(SamplingConfig {
            clip_seconds: Some(1.0),
            max_videos: Some(1),
            max_images: Some(0),
        });

        let plan = engine(config, 60.0, 0.1).plan().unwrap();
        assert_eq!(plan.timeline.names(), vec!["a.mp4"]);
        assert!((plan.timeline.duration() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_missing_inputs() {
        let dir = media_dir(&[]);
        let mut config = config_for(&dir);
        config.paths.media_dir = dir.path().join("nowhere");
        match engine(config, 60.0, 0.1).plan() {
            Err(ReelError::Composition(CompositionError::NoClipsFound { .. })) => {}
            other => panic!("Expected NoClipsFound, got {:?}", other),
        }

        let dir = media_dir(&["a.mp4"]);
        match engine(config_for(&dir), 60.0, 0.1).plan() {
            Err(ReelError::Audio(AudioError::NoBackgroundTrack { .. })) => {}
            other => panic!("Expected NoBackgroundTrack, got {:?}", other),
        }

        let dir = media_dir(&["song.mp3"]);
        match engine(config_for(&dir), 60.0, 0.1).plan() {
            Err(ReelError::Composition(CompositionError::NoClipsFound { .. })) => {}
            other => panic!("Expected NoClipsFound, got {:?}", other),
        }
    }
}
