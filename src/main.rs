use std::path::PathBuf;

use anyhow::{anyhow, Result};
use clap::Parser;
use tracing::{info, warn, Level};

use reel_assembler::{
    composition::RenderEngine,
    config::{Config, Preset, SamplingConfig},
};

#[derive(Parser)]
#[command(
    name = "reel-assembler",
    version,
    about = "Assemble a directory of video clips and photos into one video",
    long_about = "Reel-Assembler normalizes the loudness of every clip, applies a consistent look, sequences photos and videos, and mixes a looped background track under the result."
)]
struct Cli {
    /// Directory containing the videos, images and background track
    #[arg(short, long)]
    media: Option<PathBuf>,

    /// Directory the final video is written to
    #[arg(short, long)]
    render: Option<PathBuf>,

    /// Configuration file (optional)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Parameter preset (reference, refined), ignored with --config
    #[arg(short, long, default_value = "reference")]
    preset: Preset,

    /// Keep only the first seconds of every video (preview render)
    #[arg(long)]
    sample_seconds: Option<f64>,

    /// Use at most this many videos
    #[arg(long)]
    max_videos: Option<usize>,

    /// Use at most this many images
    #[arg(long)]
    max_images: Option<usize>,

    /// Print the planned ffmpeg command instead of rendering
    #[arg(long)]
    dry_run: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn load_config(&self) -> Result<Config> {
        let mut config = match &self.config {
            Some(config_path) => {
                info!("Loading configuration from {:?}", config_path);
                if self.preset != Preset::default() {
                    warn!("--preset {} ignored, using {:?}", self.preset, config_path);
                }
                Config::from_file(config_path).map_err(|e| anyhow!(e.user_message()))?
            }
            None => {
                info!("Using {} preset", self.preset);
                Config::preset(self.preset)
            }
        };

        if let Some(media) = &self.media {
            config.paths.media_dir = media.clone();
        }
        if let Some(render) = &self.render {
            config.paths.render_dir = render.clone();
        }

        if self.sample_seconds.is_some() || self.max_videos.is_some() || self.max_images.is_some() {
            let sampling = config.sampling.get_or_insert(SamplingConfig {
                clip_seconds: None,
                max_videos: None,
                max_images: None,
            });
            if let Some(seconds) = self.sample_seconds {
                sampling.clip_seconds = Some(seconds);
            }
            if let Some(limit) = self.max_videos {
                sampling.max_videos = Some(limit);
            }
            if let Some(limit) = self.max_images {
                sampling.max_images = Some(limit);
            }
        }

        config.validate().map_err(|e| anyhow!(e.user_message()))?;
        Ok(config)
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt().with_max_level(log_level).init();

    info!("Starting Reel-Assembler v{}", env!("CARGO_PKG_VERSION"));

    let config = cli.load_config()?;
    let engine = RenderEngine::new(config);

    if cli.dry_run {
        let plan = engine.plan().map_err(|e| anyhow!(e.user_message()))?;
        info!(
            "Planned {} clip(s), {:.2}s, canvas {}",
            plan.timeline.clips.len(),
            plan.timeline.duration(),
            plan.timeline.canvas()
        );
        println!("{}", engine.command_line(&plan));
        return Ok(());
    }

    let summary = engine.render().map_err(|e| anyhow!(e.user_message()))?;
    info!(
        "Done: {} video(s) and {} image(s) in {:?}",
        summary.video_count, summary.image_count, summary.output_path
    );
    Ok(())
}
