//! Cascading leak detection
//!
//! A frame goes through three detectors in order. The binary detector decides
//! whether any leak is visible, the counting detector localizes each leak, and
//! the classifier labels the padded crop around every localized leak. Each
//! stage only runs when the previous one passed its confidence gate.

use crate::error::{Result, VisionError};
use crate::frame::Frame;
use crate::gate::passes;
use crate::roi::to_pixel_rect;
use futures_util::future::try_join_all;
use image::RgbImage;
use leakwatch_core::{Detection, DetectorSet, PipelineSettings, PixelRect, POSITIVE_LABEL};
use leakwatch_inference::InferenceService;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// What the cascade concluded about one frame
#[derive(Debug, Clone, PartialEq)]
pub enum CascadeOutcome {
    /// The binary detector did not confidently see a leak
    NoLeak,
    /// A leak was detected but the counting detector could not localize it
    LeakUnlocalized,
    /// Leaks were localized; `detections` holds the confidently classified ones
    Localized {
        detections: Vec<Detection>,
        skipped_rois: usize,
    },
}

impl CascadeOutcome {
    pub fn detections(&self) -> &[Detection] {
        match self {
            CascadeOutcome::Localized { detections, .. } => detections,
            _ => &[],
        }
    }

    /// Whether the binary stage reported a leak
    pub fn leak_detected(&self) -> bool {
        !matches!(self, CascadeOutcome::NoLeak)
    }
}

/// Binary, counting and classification stages bound to one inference service
pub struct CascadingPipeline {
    service: Arc<dyn InferenceService>,
    detectors: DetectorSet,
    settings: PipelineSettings,
}

impl CascadingPipeline {
    pub fn new(service: Arc<dyn InferenceService>, detectors: DetectorSet, settings: PipelineSettings) -> Self {
        Self {
            service,
            detectors,
            settings,
        }
    }

    pub fn detectors(&self) -> &DetectorSet {
        &self.detectors
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Run the cascade on one frame.
    ///
    /// Any inference failure aborts the frame; a low-confidence answer is
    /// never retried.
    pub async fn process(&self, frame: &Frame) -> Result<CascadeOutcome> {
        let binary = self
            .service
            .submit_image_query(&self.detectors.binary, frame.image())
            .await?;
        if !passes(&binary, Some(POSITIVE_LABEL)) {
            debug!(
                "No leak: {} answered {} ({:.3} vs threshold {:.3})",
                binary.detector_id, binary.result.label, binary.result.confidence, binary.confidence_threshold
            );
            return Ok(CascadeOutcome::NoLeak);
        }
        debug!("Leak detected with confidence {:.3}", binary.result.confidence);

        let counting = self
            .service
            .submit_image_query(&self.detectors.counting, frame.image())
            .await?;
        if !passes(&counting, None) {
            info!(
                "Leak detected but count not confident ({:.3} vs threshold {:.3})",
                counting.result.confidence, counting.confidence_threshold
            );
            return Ok(CascadeOutcome::LeakUnlocalized);
        }

        let rois = match counting.rois {
            Some(rois) if !rois.is_empty() => rois,
            _ => {
                info!("Leak detected but no regions were returned");
                return Ok(CascadeOutcome::LeakUnlocalized);
            }
        };
        debug!("Counting detector localized {} region(s)", rois.len());

        let mut crops = Vec::with_capacity(rois.len());
        let mut skipped_rois = 0;
        for roi in &rois {
            if !roi.is_valid() {
                warn!("Skipping malformed region {:?}", roi);
                skipped_rois += 1;
                continue;
            }
            let rect = to_pixel_rect(roi, frame.width(), frame.height(), self.settings.roi_padding);
            match frame.crop(&rect) {
                Some(crop) => crops.push((rect, crop)),
                None => {
                    warn!("Skipping empty region {} from {:?}", rect, roi);
                    skipped_rois += 1;
                }
            }
        }

        let classified = if self.settings.parallel_classification {
            try_join_all(crops.iter().map(|(rect, crop)| self.classify(*rect, crop))).await?
        } else {
            let mut classified = Vec::with_capacity(crops.len());
            for (rect, crop) in &crops {
                classified.push(self.classify(*rect, crop).await?);
            }
            classified
        };

        Ok(CascadeOutcome::Localized {
            detections: classified.into_iter().flatten().collect(),
            skipped_rois,
        })
    }

    async fn classify(&self, rect: PixelRect, crop: &RgbImage) -> Result<Option<Detection>> {
        let query = self
            .service
            .submit_image_query(&self.detectors.classifying, crop)
            .await
            .map_err(VisionError::from)?;

        if !passes(&query, None) {
            debug!(
                "Region {} not classified confidently ({:.3} vs threshold {:.3})",
                rect, query.result.confidence, query.confidence_threshold
            );
            return Ok(None);
        }

        debug!("Leak classified with confidence {:.3}", query.result.confidence);
        Ok(Some(Detection {
            rect,
            label: query.result.label,
            confidence: query.result.confidence,
        }))
    }
}
