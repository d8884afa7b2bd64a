//! Frame-difference motion gating

use crate::frame::Frame;
use image::RgbImage;
use tracing::debug;

/// A channel sample counts as changed when it moved by more than this
pub const PIXEL_DIFF_THRESHOLD: u8 = 50;

/// Decides whether a frame differs enough from recent ones to be worth processing
pub trait MotionDetector: Send {
    fn motion_detected(&mut self, frame: &Frame) -> bool;
}

/// Compares each frame with the last two frames that showed motion.
///
/// The first frame always reports motion. Baselines only advance on motion, so
/// slow drift accumulates until it crosses the threshold.
pub struct PixelDiffMotionDetector {
    pct_threshold: f64,
    base: Option<RgbImage>,
    base2: Option<RgbImage>,
}

impl PixelDiffMotionDetector {
    /// `pct_threshold` is the percentage of changed channel samples that counts as motion
    pub fn new(pct_threshold: f64) -> Self {
        Self {
            pct_threshold,
            base: None,
            base2: None,
        }
    }

    pub fn pct_threshold(&self) -> f64 {
        self.pct_threshold
    }

    fn advance(&mut self, image: &RgbImage) {
        self.base2 = self.base.take();
        self.base = Some(image.clone());
    }
}

impl MotionDetector for PixelDiffMotionDetector {
    fn motion_detected(&mut self, frame: &Frame) -> bool {
        let image = frame.image();
        let base = match &self.base {
            Some(base) if base.dimensions() == image.dimensions() => base,
            _ => {
                // First frame, or the source changed resolution
                self.base2 = None;
                self.base = Some(image.clone());
                return true;
            }
        };

        let pct = changed_pct(image, base);
        let pct2 = self.base2.as_ref().map_or(pct, |base2| changed_pct(image, base2));
        let detected = pct > self.pct_threshold && pct2 > self.pct_threshold;
        debug!(
            "Motion check: {:.3}% / {:.3}% changed (threshold {}%)",
            pct, pct2, self.pct_threshold
        );

        if detected {
            self.advance(image);
        }
        detected
    }
}

/// Percentage of channel samples that moved by more than the pixel threshold.
///
/// Samples are counted individually, so a pixel with all three channels
/// changed weighs three times as much as one with a single changed channel.
pub fn changed_pct(a: &RgbImage, b: &RgbImage) -> f64 {
    let total = a.as_raw().len();
    if total == 0 {
        return 0.0;
    }
    let changed = a
        .as_raw()
        .iter()
        .zip(b.as_raw().iter())
        .filter(|(ca, cb)| ca.abs_diff(**cb) > PIXEL_DIFF_THRESHOLD)
        .count();
    changed as f64 * 100.0 / total as f64
}
