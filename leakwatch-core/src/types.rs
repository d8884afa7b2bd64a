//! Data model shared by the inference client and the vision pipeline

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Label the binary detector reports when a leak is present
pub const POSITIVE_LABEL: &str = "YES";

/// Normalized region of interest reported by the counting detector.
///
/// All four edges are fractions of the frame that produced the region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Roi {
    pub top: f64,
    pub left: f64,
    pub bottom: f64,
    pub right: f64,
    /// Label the counting detector attached to the region, if any
    #[serde(default)]
    pub label: Option<String>,
    /// Detector score for the region, if any
    #[serde(default)]
    pub score: Option<f64>,
}

impl Roi {
    pub fn new(top: f64, left: f64, bottom: f64, right: f64) -> Self {
        Self {
            top,
            left,
            bottom,
            right,
            label: None,
            score: None,
        }
    }

    /// Whether the edges are finite, inside [0, 1] and properly ordered
    pub fn is_valid(&self) -> bool {
        let edges = [self.top, self.left, self.bottom, self.right];
        edges.iter().all(|e| e.is_finite() && (0.0..=1.0).contains(e))
            && self.top < self.bottom
            && self.left < self.right
    }
}

/// Integer rectangle in pixel coordinates of a specific frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PixelRect {
    pub left: u32,
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
}

impl PixelRect {
    pub fn new(left: u32, top: u32, right: u32, bottom: u32) -> Self {
        Self { left, top, right, bottom }
    }

    pub fn width(&self) -> u32 {
        self.right.saturating_sub(self.left)
    }

    pub fn height(&self) -> u32 {
        self.bottom.saturating_sub(self.top)
    }

    /// True when the rectangle encloses no pixels
    pub fn is_degenerate(&self) -> bool {
        self.right <= self.left || self.bottom <= self.top
    }

    /// Whether the rectangle lies inside a frame of the given size
    pub fn fits_within(&self, width: u32, height: u32) -> bool {
        self.right <= width && self.bottom <= height
    }
}

impl fmt::Display for PixelRect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}, {}] -> [{}, {}]",
            self.left, self.top, self.right, self.bottom
        )
    }
}

/// Answer attached to an image query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferenceResult {
    pub label: String,
    pub confidence: f64,
    /// Object count, reported by counting detectors only
    #[serde(default)]
    pub count: Option<u32>,
}

/// Outcome of submitting one image to one detector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionQuery {
    pub id: String,
    pub detector_id: String,
    pub confidence_threshold: f64,
    pub result: InferenceResult,
    #[serde(default)]
    pub rois: Option<Vec<Roi>>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// Answer type a detector was created with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DetectorMode {
    Binary,
    Count,
    MultiClass,
    #[serde(other)]
    Unknown,
}

/// A detector identity resolved from the inference service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detector {
    pub id: String,
    pub name: String,
    pub mode: DetectorMode,
    pub confidence_threshold: f64,
}

/// The three detectors bound at startup, read-only afterwards
#[derive(Debug, Clone)]
pub struct DetectorSet {
    pub binary: Detector,
    pub counting: Detector,
    pub classifying: Detector,
}

impl DetectorSet {
    pub fn new(binary: Detector, counting: Detector, classifying: Detector) -> Self {
        Self {
            binary,
            counting,
            classifying,
        }
    }
}

/// A located and classified leak
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub rect: PixelRect,
    pub label: String,
    pub confidence: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roi_validity() {
        assert!(Roi::new(0.1, 0.1, 0.2, 0.2).is_valid());
        assert!(Roi::new(0.0, 0.0, 1.0, 1.0).is_valid());
        assert!(!Roi::new(0.2, 0.1, 0.2, 0.3).is_valid());
        assert!(!Roi::new(0.1, 0.4, 0.2, 0.3).is_valid());
        assert!(!Roi::new(-0.1, 0.1, 0.2, 0.3).is_valid());
        assert!(!Roi::new(0.1, 0.1, 1.2, 0.3).is_valid());
        assert!(!Roi::new(f64::NAN, 0.1, 0.2, 0.3).is_valid());
    }

    #[test]
    fn test_pixel_rect_degenerate() {
        assert!(!PixelRect::new(10, 10, 20, 20).is_degenerate());
        assert!(PixelRect::new(10, 10, 10, 20).is_degenerate());
        assert!(PixelRect::new(10, 20, 20, 20).is_degenerate());
        assert!(PixelRect::new(30, 10, 20, 20).is_degenerate());
    }

    #[test]
    fn test_pixel_rect_dimensions() {
        let rect = PixelRect::new(45, 40, 65, 70);
        assert_eq!(rect.width(), 20);
        assert_eq!(rect.height(), 30);
        assert!(rect.fits_within(65, 70));
        assert!(!rect.fits_within(64, 70));

        let collapsed = PixelRect::new(50, 50, 40, 40);
        assert_eq!(collapsed.width(), 0);
        assert_eq!(collapsed.height(), 0);
    }

    #[test]
    fn test_detector_mode_wire_names() {
        let mode: DetectorMode = serde_json::from_str("\"MULTI_CLASS\"").unwrap();
        assert_eq!(mode, DetectorMode::MultiClass);
        let mode: DetectorMode = serde_json::from_str("\"BOUNDING_BOX\"").unwrap();
        assert_eq!(mode, DetectorMode::Unknown);
    }

    #[test]
    fn test_detector_set_fields() {
        let detector = |id: &str| Detector {
            id: id.to_string(),
            name: id.to_string(),
            mode: DetectorMode::Binary,
            confidence_threshold: 0.9,
        };
        let set = DetectorSet::new(detector("a"), detector("b"), detector("c"));
        assert_eq!(set.binary.id, "a");
        assert_eq!(set.counting.id, "b");
        assert_eq!(set.classifying.id, "c");
    }
}
