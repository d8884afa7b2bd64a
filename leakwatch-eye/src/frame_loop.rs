//! The acquisition loop: grab, gate on motion, run the cascade, annotate, display

use crate::annotate::annotate;
use crate::cascade::{CascadeOutcome, CascadingPipeline};
use crate::display::DisplaySink;
use crate::error::{Result, VisionError};
use crate::frame::Frame;
use crate::motion::MotionDetector;
use crate::source::FrameSource;
use leakwatch_core::FrameErrorPolicy;
use std::fmt;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Running,
    Stopping,
    Stopped,
}

/// Why the loop ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    /// The source ran out of frames
    EndOfStream,
    /// The source failed to deliver a frame
    AcquisitionFailed(String),
    QuitRequested,
    FrameLimit,
    /// A frame failed and the error policy does not allow skipping it
    FrameFailed(String),
    /// Too many frames in a row were skipped after transient failures
    TooManyFailures(u32),
}

impl StopReason {
    /// Whether the loop ended because of an error
    pub fn is_failure(&self) -> bool {
        matches!(self, StopReason::FrameFailed(_) | StopReason::TooManyFailures(_))
    }
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::EndOfStream => write!(f, "end of stream"),
            StopReason::AcquisitionFailed(e) => write!(f, "acquisition failed: {}", e),
            StopReason::QuitRequested => write!(f, "quit requested"),
            StopReason::FrameLimit => write!(f, "frame limit reached"),
            StopReason::FrameFailed(e) => write!(f, "frame processing failed: {}", e),
            StopReason::TooManyFailures(n) => write!(f, "{} consecutive frames failed", n),
        }
    }
}

/// What happened to one frame after motion gating
#[derive(Debug)]
pub enum FrameOutcome {
    Processed(CascadeOutcome),
    /// A transient failure persisted through every retry; the loop moves on
    Skipped(VisionError),
    Fatal(VisionError),
}

/// Summary returned when the loop stops
#[derive(Debug, Clone, PartialEq)]
pub struct LoopReport {
    pub frames_acquired: u64,
    pub frames_processed: u64,
    pub frames_motion_skipped: u64,
    pub frames_error_skipped: u64,
    pub leaks_detected: u64,
    pub detections: u64,
    pub stop_reason: StopReason,
}

pub struct FrameLoop {
    source: Box<dyn FrameSource>,
    motion: Option<Box<dyn MotionDetector>>,
    pipeline: CascadingPipeline,
    display: Box<dyn DisplaySink>,
    policy: FrameErrorPolicy,
    max_frames: Option<u64>,
    state: LoopState,
    frame_number: u64,
    consecutive_failures: u32,
    counters: Counters,
}

#[derive(Debug, Default)]
struct Counters {
    acquired: u64,
    processed: u64,
    motion_skipped: u64,
    error_skipped: u64,
    leaks: u64,
    detections: u64,
}

impl FrameLoop {
    /// Build a loop with the error policy taken from the pipeline settings
    pub fn new(source: Box<dyn FrameSource>, pipeline: CascadingPipeline, display: Box<dyn DisplaySink>) -> Self {
        let policy = pipeline.settings().on_frame_error;
        Self {
            source,
            motion: None,
            pipeline,
            display,
            policy,
            max_frames: None,
            state: LoopState::Stopped,
            frame_number: 1,
            consecutive_failures: 0,
            counters: Counters::default(),
        }
    }

    pub fn with_motion_detector(mut self, motion: Box<dyn MotionDetector>) -> Self {
        self.motion = Some(motion);
        self
    }

    pub fn with_error_policy(mut self, policy: FrameErrorPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Stop after this many acquired frames
    pub fn with_max_frames(mut self, max_frames: u64) -> Self {
        self.max_frames = Some(max_frames);
        self
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    /// Number of the next frame to be acquired, starting at 1
    pub fn frame_number(&self) -> u64 {
        self.frame_number
    }

    /// Run until the source ends, the user quits or a frame fails fatally.
    ///
    /// Errors never escape; they end up in the report's stop reason.
    pub async fn run(&mut self) -> LoopReport {
        self.state = LoopState::Running;
        info!("Starting frame loop on {}", self.source.name());

        let stop_reason = loop {
            if let Some(max_frames) = self.max_frames {
                if self.counters.acquired >= max_frames {
                    info!("Reached the limit of {} frames", max_frames);
                    self.state = LoopState::Stopping;
                    break StopReason::FrameLimit;
                }
            }

            let frame = match self.source.grab().await {
                Ok(frame) => frame,
                Err(VisionError::EndOfStream) => {
                    warn!("Cannot grab next frame: end of stream");
                    break StopReason::EndOfStream;
                }
                Err(e) => {
                    warn!("Cannot grab next frame. Possible end of file: {}", e);
                    break StopReason::AcquisitionFailed(e.to_string());
                }
            };
            self.counters.acquired += 1;

            if let Some(motion) = self.motion.as_mut() {
                if !motion.motion_detected(&frame) {
                    info!(
                        "No significant motion detected in frame {}, skipping frame.",
                        self.frame_number
                    );
                    self.counters.motion_skipped += 1;
                    self.frame_number += 1;
                    continue;
                }
            }

            match self.process_frame(&frame).await {
                FrameOutcome::Processed(outcome) => {
                    self.counters.processed += 1;
                    if outcome.leak_detected() {
                        self.counters.leaks += 1;
                    }
                    self.counters.detections += outcome.detections().len() as u64;
                    info!("Processed frame {}", self.frame_number);
                }
                FrameOutcome::Skipped(e) => {
                    self.counters.error_skipped += 1;
                    warn!(
                        "Skipping frame {} after transient failure ({} in a row): {}",
                        self.frame_number, self.consecutive_failures, e
                    );
                }
                FrameOutcome::Fatal(e) => {
                    error!("Error processing frame {}: {}", self.frame_number, e);
                    break if self.failure_limit_exceeded() {
                        StopReason::TooManyFailures(self.consecutive_failures)
                    } else {
                        StopReason::FrameFailed(e.to_string())
                    };
                }
            }

            self.frame_number += 1;

            if self.display.quit_requested() {
                info!("Quit requested");
                self.state = LoopState::Stopping;
                break StopReason::QuitRequested;
            }
        };

        self.state = LoopState::Stopped;
        let report = LoopReport {
            frames_acquired: self.counters.acquired,
            frames_processed: self.counters.processed,
            frames_motion_skipped: self.counters.motion_skipped,
            frames_error_skipped: self.counters.error_skipped,
            leaks_detected: self.counters.leaks,
            detections: self.counters.detections,
            stop_reason,
        };
        info!(
            "Frame loop stopped ({}): {} acquired, {} processed, {} skipped for motion, {} skipped on error",
            report.stop_reason,
            report.frames_acquired,
            report.frames_processed,
            report.frames_motion_skipped,
            report.frames_error_skipped
        );
        report
    }

    /// Run the cascade on a frame and display the result, applying the error policy
    pub async fn process_frame(&mut self, frame: &Frame) -> FrameOutcome {
        let mut retries = 0;
        loop {
            let err = match self.try_frame(frame).await {
                Ok(outcome) => {
                    self.consecutive_failures = 0;
                    return FrameOutcome::Processed(outcome);
                }
                Err(e) => e,
            };

            let (max_retries, max_consecutive_failures) = match self.policy {
                FrameErrorPolicy::FailFast => return FrameOutcome::Fatal(err),
                FrameErrorPolicy::SkipTransient {
                    max_retries,
                    max_consecutive_failures,
                } => (max_retries, max_consecutive_failures),
            };
            if !err.is_transient() {
                return FrameOutcome::Fatal(err);
            }
            if retries < max_retries {
                retries += 1;
                debug!("Retrying frame {} ({}/{}): {}", self.frame_number, retries, max_retries, err);
                continue;
            }

            self.consecutive_failures += 1;
            if self.consecutive_failures > max_consecutive_failures {
                return FrameOutcome::Fatal(err);
            }
            return FrameOutcome::Skipped(err);
        }
    }

    async fn try_frame(&mut self, frame: &Frame) -> Result<CascadeOutcome> {
        let outcome = self.pipeline.process(frame).await?;
        for detection in outcome.detections() {
            info!(
                "Frame {}: Leak detected and classified as: {}",
                self.frame_number, detection.label
            );
        }
        if let CascadeOutcome::Localized { skipped_rois, .. } = &outcome {
            if *skipped_rois > 0 {
                debug!("Frame {}: {} empty region(s) skipped", self.frame_number, skipped_rois);
            }
        }

        let annotated = annotate(frame, outcome.detections());
        self.display.show(&annotated)?;
        Ok(outcome)
    }

    fn failure_limit_exceeded(&self) -> bool {
        match self.policy {
            FrameErrorPolicy::SkipTransient {
                max_consecutive_failures,
                ..
            } => self.consecutive_failures > max_consecutive_failures,
            FrameErrorPolicy::FailFast => false,
        }
    }
}
