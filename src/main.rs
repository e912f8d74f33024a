//! Camera Curves CLI
//!
//! Runs the capture loop against a synthetic, still-image or video source,
//! applying a curve preset or configured curves to every frame.

use camcurves::{
    app::{App, NoKeys, ScriptedKeys},
    capture::{
        CaptureManager, FileConfig, Frame, FrameSource, SourceKind, StillImageSource,
        SyntheticSource, VideoFileSource,
    },
    filters::Preset,
    metrics::{MetricsRegistry, MetricsSnapshot},
};
use clap::Parser;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Parser)]
#[command(name = "camcurves", version, about = "Capture frames through color curves")]
struct Cli {
    /// TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Frame source: synthetic, image or video
    #[arg(long)]
    source: Option<SourceKind>,

    /// Input file for image and video sources
    #[arg(long)]
    input: Option<PathBuf>,

    /// Curve preset (portra, provia, velvia, cross-process)
    #[arg(long)]
    preset: Option<Preset>,

    /// Number of cycles to run
    #[arg(long)]
    frames: Option<u64>,

    /// Run until quit, shutdown or end of source
    #[arg(long)]
    continuous: bool,

    /// Mirror the preview
    #[arg(long)]
    mirror: bool,

    /// Scripted key presses, e.g. "0:space,10:tab,40:tab"
    #[arg(long)]
    keys: Option<ScriptedKeys>,

    /// Print Prometheus metrics on exit
    #[arg(long)]
    metrics: bool,
}

fn main() {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();
    info!("camcurves v{}", camcurves::VERSION);

    let mut config = match &cli.config {
        Some(path) => match FileConfig::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Failed to load config {}: {}", path.display(), e);
                std::process::exit(1);
            }
        },
        None => FileConfig::default(),
    };

    // CLI flags override the file
    if let Some(source) = cli.source {
        config.capture.source = source;
    }
    if cli.input.is_some() {
        config.capture.input = cli.input.clone();
    }
    if let Some(preset) = cli.preset {
        config.filter.preset = Some(preset);
        config.filter.curves = None;
    }
    if let Some(frames) = cli.frames {
        config.output.frame_count = frames;
    }
    if cli.continuous {
        config.output.continuous = true;
    }
    if cli.mirror {
        config.capture.mirror_preview = true;
    }

    if let Err(e) = config.capture.validate() {
        eprintln!("Invalid capture configuration: {}", e);
        std::process::exit(1);
    }

    let filter = match config.filter.build() {
        Ok(filter) => filter,
        Err(e) => {
            eprintln!("Invalid filter configuration: {}", e);
            std::process::exit(1);
        }
    };

    let source = match open_source(&config) {
        Ok(source) => source,
        Err(e) => {
            eprintln!("Failed to open source: {}", e);
            std::process::exit(1);
        }
    };

    let preview = |frame: &Frame| {
        tracing::trace!(sequence = frame.sequence(), "Preview frame");
    };
    let mut manager =
        CaptureManager::new(source).with_preview(preview, config.capture.mirror_preview);
    manager.set_channel(config.capture.channel);

    let mut app = App::new(manager, config.output.clone())
        .with_filter(filter)
        .with_recolor_rc(config.filter.recolor_rc);

    let shutdown = Arc::new(AtomicBool::new(false));
    let flag = shutdown.clone();
    if let Err(e) = ctrlc::set_handler(move || flag.store(true, Ordering::SeqCst)) {
        warn!("Failed to install Ctrl-C handler: {}", e);
    }

    info!(
        source = ?config.capture.source,
        preset = ?config.filter.preset,
        "Processing frames..."
    );
    let cycles = match cli.keys {
        Some(mut keys) => app.run(&mut keys, &shutdown),
        None => app.run(&mut NoKeys, &shutdown),
    };

    let stats = app.manager().stats();
    info!(
        "Processed {} cycles: {} frames, {} dropped, {} images, {} video frames",
        cycles, stats.frames, stats.frames_dropped, stats.images_written, stats.video_frames_written
    );

    if cli.metrics {
        let registry = match MetricsRegistry::new() {
            Ok(registry) => registry,
            Err(e) => {
                eprintln!("Failed to create metrics registry: {}", e);
                std::process::exit(1);
            }
        };
        registry.update(&MetricsSnapshot::from_stats(
            &stats,
            app.manager().fps_estimate(),
            app.manager().is_writing_video(),
        ));
        match registry.encode() {
            Ok(text) => print!("{}", text),
            Err(e) => warn!("Failed to encode metrics: {}", e),
        }
    }
}

fn open_source(config: &FileConfig) -> Result<Box<dyn FrameSource>, Box<dyn std::error::Error>> {
    let capture = &config.capture;
    let source: Box<dyn FrameSource> = match (capture.source, &capture.input) {
        (SourceKind::Synthetic, _) => Box::new(SyntheticSource::open(capture)?),
        (SourceKind::Image, Some(path)) => Box::new(StillImageSource::open(path)?),
        (SourceKind::Video, Some(path)) => Box::new(VideoFileSource::open(path)?),
        (_, None) => return Err("image and video sources need --input".into()),
    };
    Ok(source)
}
