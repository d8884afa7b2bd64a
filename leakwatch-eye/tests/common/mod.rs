//! Shared fakes for pipeline and loop tests
#![allow(dead_code)]

use async_trait::async_trait;
use image::{Rgb, RgbImage};
use leakwatch_core::{
    DetectionQuery, Detector, DetectorMode, DetectorSet, InferenceResult, Roi,
};
use leakwatch_eye::{AnnotatedFrame, DisplaySink, Frame, FrameSource, MotionDetector, VisionError};
use leakwatch_inference::{InferenceService, Result};
use mockall::mock;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

pub const BINARY_ID: &str = "det_binary";
pub const COUNTING_ID: &str = "det_count";
pub const CLASSIFYING_ID: &str = "det_classify";

mock! {
    pub Inference {}

    #[async_trait]
    impl InferenceService for Inference {
        async fn get_detector(&self, detector_id: &str) -> Result<Detector>;
        async fn submit_image_query(&self, detector: &Detector, image: &RgbImage) -> Result<DetectionQuery>;
    }
}

pub fn detector(id: &str, mode: DetectorMode) -> Detector {
    Detector {
        id: id.to_string(),
        name: id.to_string(),
        mode,
        confidence_threshold: 0.8,
    }
}

pub fn detector_set() -> DetectorSet {
    DetectorSet::new(
        detector(BINARY_ID, DetectorMode::Binary),
        detector(COUNTING_ID, DetectorMode::Count),
        detector(CLASSIFYING_ID, DetectorMode::MultiClass),
    )
}

pub fn answer(detector_id: &str, label: &str, confidence: f64) -> DetectionQuery {
    DetectionQuery {
        id: format!("iq_{}", detector_id),
        detector_id: detector_id.to_string(),
        confidence_threshold: 0.8,
        result: InferenceResult {
            label: label.to_string(),
            confidence,
            count: None,
        },
        rois: None,
        created_at: None,
    }
}

pub fn count_answer(confidence: f64, rois: Vec<Roi>) -> DetectionQuery {
    let mut query = answer(COUNTING_ID, &rois.len().to_string(), confidence);
    query.result.count = Some(rois.len() as u32);
    query.rois = Some(rois);
    query
}

pub fn frame() -> Frame {
    Frame::new(RgbImage::from_pixel(100, 100, Rgb([30, 30, 30])))
}

/// Mock whose detectors answer by id; `classify` receives each crop
pub fn scripted_inference<B, C, K>(mut binary: B, mut count: C, mut classify: K) -> MockInference
where
    B: FnMut() -> Result<DetectionQuery> + Send + 'static,
    C: FnMut() -> Result<DetectionQuery> + Send + 'static,
    K: FnMut(&RgbImage) -> Result<DetectionQuery> + Send + 'static,
{
    let mut mock = MockInference::new();
    mock.expect_submit_image_query()
        .withf(|detector, _| detector.id == BINARY_ID)
        .returning(move |_, _| binary());
    mock.expect_submit_image_query()
        .withf(|detector, _| detector.id == COUNTING_ID)
        .returning(move |_, _| count());
    mock.expect_submit_image_query()
        .withf(|detector, _| detector.id == CLASSIFYING_ID)
        .returning(move |_, image| classify(image));
    mock
}

/// Frame source replaying a fixed script, then reporting end of stream
pub struct ScriptedSource {
    script: VecDeque<std::result::Result<Frame, VisionError>>,
    grabs: Arc<AtomicUsize>,
}

impl ScriptedSource {
    pub fn new(script: Vec<std::result::Result<Frame, VisionError>>) -> Self {
        Self {
            script: script.into(),
            grabs: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn frames(count: usize) -> Self {
        Self::new((0..count).map(|_| Ok(frame())).collect())
    }

    pub fn grab_counter(&self) -> Arc<AtomicUsize> {
        self.grabs.clone()
    }
}

#[async_trait]
impl FrameSource for ScriptedSource {
    async fn grab(&mut self) -> std::result::Result<Frame, VisionError> {
        self.grabs.fetch_add(1, Ordering::SeqCst);
        self.script.pop_front().unwrap_or(Err(VisionError::EndOfStream))
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// Display that keeps every frame it is shown
#[derive(Default)]
pub struct RecordingDisplay {
    pub shown: Arc<Mutex<Vec<AnnotatedFrame>>>,
    pub quit_after: Option<usize>,
}

impl RecordingDisplay {
    pub fn quitting_after(frames: usize) -> Self {
        Self {
            quit_after: Some(frames),
            ..Self::default()
        }
    }
}

impl DisplaySink for RecordingDisplay {
    fn show(&mut self, frame: &AnnotatedFrame) -> std::result::Result<(), VisionError> {
        self.shown.lock().push(frame.clone());
        Ok(())
    }

    fn quit_requested(&mut self) -> bool {
        self.quit_after.map_or(false, |n| self.shown.lock().len() >= n)
    }
}

/// Motion detector answering from a fixed list, then always reporting motion
pub struct ScriptedMotion(pub VecDeque<bool>);

impl MotionDetector for ScriptedMotion {
    fn motion_detected(&mut self, _frame: &Frame) -> bool {
        self.0.pop_front().unwrap_or(true)
    }
}
