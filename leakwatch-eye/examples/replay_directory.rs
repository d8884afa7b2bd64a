//! Replay a directory of images through the leak cascade
//!
//! Usage: cargo run -p leakwatch-eye --example replay_directory -- <config.yaml> <image-dir>

use leakwatch_core::LeakWatchConfig;
use leakwatch_eye::{CascadingPipeline, FrameLoop, HeadlessDisplay, ImageDirectorySource, PixelDiffMotionDetector};
use leakwatch_inference::{resolve_detectors, GroundlightClient};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut args = std::env::args().skip(1);
    let (config_path, directory) = match (args.next(), args.next()) {
        (Some(config), Some(directory)) => (config, directory),
        _ => {
            eprintln!("usage: replay_directory <config.yaml> <image-dir>");
            std::process::exit(2);
        }
    };

    let config = LeakWatchConfig::from_file(&config_path)?;
    let source = ImageDirectorySource::open(&directory, false)?;

    let client = Arc::new(GroundlightClient::from_settings(
        config.endpoint.as_deref(),
        &config.inference,
    )?);
    let detectors = resolve_detectors(client.as_ref(), &config.leak_detector_ids).await?;
    let pipeline = CascadingPipeline::new(client, detectors, config.pipeline.clone());

    let display = HeadlessDisplay::new();
    display.quit_on_ctrl_c();

    let mut frame_loop = FrameLoop::new(Box::new(source), pipeline, Box::new(display));
    if config.enable_motion_detection {
        frame_loop = frame_loop.with_motion_detector(Box::new(PixelDiffMotionDetector::new(
            config.motion_detection_threshold,
        )));
    }

    let report = frame_loop.run().await;
    println!(
        "{} frames, {} with leaks, {} detections ({})",
        report.frames_acquired, report.leaks_detected, report.detections, report.stop_reason
    );
    Ok(())
}
