use async_trait::async_trait;
use crate::error::Result;
use image::RgbImage;
use leakwatch_core::{DetectionQuery, Detector, DetectorSet, LeakDetectorIds};
use tracing::info;

/// Remote image classifier
#[async_trait]
pub trait InferenceService: Send + Sync {
    /// Resolve a detector identity
    async fn get_detector(&self, detector_id: &str) -> Result<Detector>;

    /// Submit an image to a detector and return its answer
    async fn submit_image_query(&self, detector: &Detector, image: &RgbImage) -> Result<DetectionQuery>;
}

/// Resolve the three leak detectors, in cascade order
pub async fn resolve_detectors(
    service: &dyn InferenceService,
    ids: &LeakDetectorIds,
) -> Result<DetectorSet> {
    let binary = service.get_detector(&ids.detect_leaks).await?;
    let counting = service.get_detector(&ids.count_leaks).await?;
    let classifying = service.get_detector(&ids.classify_leaks).await?;

    for detector in [&binary, &counting, &classifying] {
        info!(
            "Resolved detector {} ({:?}, threshold {})",
            detector.id, detector.mode, detector.confidence_threshold
        );
    }

    Ok(DetectorSet::new(binary, counting, classifying))
}
