// LeakWatch command line
// Runs the cascading leak detector against the configured camera

use anyhow::{Context, Result};
use clap::Parser;
use leakwatch_core::{CameraConfig, LeakWatchConfig};
use leakwatch_eye::{open_source, CascadingPipeline, DisplaySink, FrameLoop, HeadlessDisplay, PixelDiffMotionDetector};
use leakwatch_inference::{resolve_detectors, GroundlightClient};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "leakwatch")]
#[command(about = "Detect, localize and classify leaks in a video stream", long_about = None)]
#[command(version)]
struct Cli {
    /// Detection configuration file
    #[arg(long, default_value = "./configs/config.yaml")]
    config: PathBuf,

    /// Camera configuration file
    #[arg(long, default_value = "./configs/camera.yaml")]
    camera_config: PathBuf,

    /// Log level (error, warn, info, debug, trace); RUST_LOG takes precedence
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Emit logs as JSON lines
    #[arg(long)]
    json_logs: bool,

    /// Log detections instead of opening a window
    #[arg(long)]
    headless: bool,

    /// Stop after this many frames
    #[arg(long)]
    max_frames: Option<u64>,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(&cli.log_level, cli.json_logs);

    let mut frame_loop = match setup(&cli).await {
        Ok(frame_loop) => frame_loop,
        Err(e) => {
            error!("Startup failed: {:#}", e);
            std::process::exit(1);
        }
    };

    let report = frame_loop.run().await;
    info!(
        "Done: {} frames acquired, {} processed, {} with leaks, {} leaks classified ({})",
        report.frames_acquired,
        report.frames_processed,
        report.leaks_detected,
        report.detections,
        report.stop_reason
    );
}

fn init_logging(level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn setup(cli: &Cli) -> Result<FrameLoop> {
    let config = LeakWatchConfig::from_file(&cli.config)
        .with_context(|| format!("Error loading configuration {}", cli.config.display()))?;
    let camera = CameraConfig::from_file(&cli.camera_config)
        .with_context(|| format!("Error loading camera configuration {}", cli.camera_config.display()))?;
    info!("Configuration loaded successfully");

    info!("Starting frame grabber for {}", camera.display_name());
    let source = open_source(&camera).context("Error creating frame grabber")?;

    let motion = config.enable_motion_detection.then(|| {
        info!("Motion detection enabled at {}%", config.motion_detection_threshold);
        PixelDiffMotionDetector::new(config.motion_detection_threshold)
    });

    let client = GroundlightClient::from_settings(config.endpoint.as_deref(), &config.inference)
        .context("Error creating inference client")?;
    info!("Using inference endpoint {}", client.base_url());
    let client = Arc::new(client);
    let detectors = resolve_detectors(client.as_ref(), &config.leak_detector_ids)
        .await
        .context("Error connecting to inference service")?;

    let pipeline = CascadingPipeline::new(client, detectors, config.pipeline.clone());
    let mut frame_loop = FrameLoop::new(source, pipeline, display(cli.headless));
    if let Some(motion) = motion {
        frame_loop = frame_loop.with_motion_detector(Box::new(motion));
    }
    if let Some(max_frames) = cli.max_frames {
        frame_loop = frame_loop.with_max_frames(max_frames);
    }
    Ok(frame_loop)
}

fn display(headless: bool) -> Box<dyn DisplaySink> {
    #[cfg(feature = "opencv")]
    if !headless {
        return Box::new(leakwatch_eye::HighGuiDisplay::new());
    }
    #[cfg(not(feature = "opencv"))]
    if !headless {
        tracing::warn!("Built without the opencv feature, running headless");
    }

    let display = HeadlessDisplay::new();
    display.quit_on_ctrl_c();
    Box::new(display)
}
