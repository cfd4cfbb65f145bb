// Prints the measured loudness and gain of every video without rendering

use std::path::PathBuf;

use anyhow::{anyhow, Result};
use clap::Parser;
use tracing::Level;

use reel_assembler::{
    composition::RenderEngine,
    config::{Config, Preset},
};

#[derive(Parser)]
#[command(
    name = "gain-report",
    version,
    about = "Show the volume measured for every video and the gain it receives"
)]
struct Cli {
    /// Directory containing the videos
    #[arg(short, long, default_value = "media")]
    media: PathBuf,

    /// Configuration file (optional)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Parameter preset (reference, refined), ignored with --config
    #[arg(short, long, default_value = "reference")]
    preset: Preset,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { Level::DEBUG } else { Level::WARN };
    tracing_subscriber::fmt().with_max_level(log_level).init();

    let mut config = match &cli.config {
        Some(path) => Config::from_file(path).map_err(|e| anyhow!(e.user_message()))?,
        None => Config::preset(cli.preset),
    };
    config.paths.media_dir = cli.media.clone();
    config.validate().map_err(|e| anyhow!(e.user_message()))?;

    println!("🔊 Gain report for {:?}", config.paths.media_dir);
    println!(
        "   Curve: {:?}, trimmed {:.0}% each side\n",
        config.volume.curve,
        config.volume.percentile * 100.0
    );

    let engine = RenderEngine::new(config);
    let measured = engine.measure_videos().map_err(|e| anyhow!(e.user_message()))?;

    println!("{:<32} {:>9} {:>10} {:>8}", "clip", "duration", "volume", "gain");
    for entry in &measured {
        let (volume, gain) = match entry.measurement {
            Some(m) => (
                m.volume.map(|v| format!("{:.5}", v)).unwrap_or_else(|| "silent".to_string()),
                format!("{:.3}", m.gain),
            ),
            None => ("no audio".to_string(), "-".to_string()),
        };
        println!(
            "{:<32} {:>8.2}s {:>10} {:>8}",
            entry.clip.name, entry.clip.duration, volume, gain
        );
    }

    println!("\n✅ {} video(s) measured", measured.len());
    Ok(())
}
