//! JSON bodies exchanged with the image-query service

use chrono::{DateTime, Utc};
use leakwatch_core::{DetectionQuery, Detector, DetectorMode, InferenceResult, Roi};
use serde::Deserialize;

/// Threshold assumed when the service omits one
pub const DEFAULT_CONFIDENCE_THRESHOLD: f64 = 0.9;

#[derive(Debug, Clone, Deserialize)]
pub struct DetectorBody {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub mode: Option<DetectorMode>,
    #[serde(default)]
    pub confidence_threshold: Option<f64>,
}

impl From<DetectorBody> for Detector {
    fn from(body: DetectorBody) -> Self {
        Detector {
            name: body.name.unwrap_or_else(|| body.id.clone()),
            id: body.id,
            mode: body.mode.unwrap_or(DetectorMode::Binary),
            confidence_threshold: body
                .confidence_threshold
                .unwrap_or(DEFAULT_CONFIDENCE_THRESHOLD),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResultBody {
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub count: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeometryBody {
    pub left: f64,
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RoiBody {
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub score: Option<f64>,
    pub geometry: GeometryBody,
}

impl From<RoiBody> for Roi {
    fn from(body: RoiBody) -> Self {
        Roi {
            top: body.geometry.top,
            left: body.geometry.left,
            bottom: body.geometry.bottom,
            right: body.geometry.right,
            label: body.label,
            score: body.score,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ImageQueryBody {
    pub id: String,
    #[serde(default)]
    pub detector_id: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub result: Option<ResultBody>,
    #[serde(default)]
    pub confidence_threshold: Option<f64>,
    #[serde(default)]
    pub rois: Option<Vec<RoiBody>>,
    #[serde(default)]
    pub done_processing: Option<bool>,
}

impl ImageQueryBody {
    /// Effective confidence of the answer.
    ///
    /// A labelled answer without a confidence was reviewed by a person and
    /// counts as certain.
    pub fn confidence(&self) -> Option<f64> {
        let result = self.result.as_ref()?;
        match result.confidence {
            Some(confidence) => Some(confidence),
            None if result.label.is_some() || result.count.is_some() => Some(1.0),
            None => None,
        }
    }

    pub fn threshold_or(&self, fallback: f64) -> f64 {
        self.confidence_threshold.unwrap_or(fallback)
    }

    /// No further answer is expected from polling
    pub fn is_settled(&self, threshold: f64) -> bool {
        if self.done_processing == Some(true) {
            return true;
        }
        self.confidence().map_or(false, |c| c >= threshold)
    }

    pub fn into_query(self, detector: &Detector) -> DetectionQuery {
        let confidence = self.confidence().unwrap_or(0.0);
        let confidence_threshold = self.threshold_or(detector.confidence_threshold);
        let (label, count) = match self.result {
            Some(result) => {
                let label = result
                    .label
                    .or_else(|| result.count.map(|c| c.to_string()))
                    .unwrap_or_default();
                (label, result.count)
            }
            None => (String::new(), None),
        };

        DetectionQuery {
            id: self.id,
            detector_id: self.detector_id.unwrap_or_else(|| detector.id.clone()),
            confidence_threshold,
            result: InferenceResult {
                label,
                confidence,
                count,
            },
            rois: self
                .rois
                .map(|rois| rois.into_iter().map(Roi::from).collect()),
            created_at: self.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn detector() -> Detector {
        Detector {
            id: "det_count".to_string(),
            name: "count leaks".to_string(),
            mode: DetectorMode::Count,
            confidence_threshold: 0.8,
        }
    }

    #[test]
    fn test_image_query_with_rois() {
        let body: ImageQueryBody = serde_json::from_value(json!({
            "id": "iq_1",
            "detector_id": "det_count",
            "created_at": "2024-05-01T12:00:00Z",
            "confidence_threshold": 0.75,
            "result": {"label": "GREATER_THAN_MAX", "confidence": 0.92, "count": 2},
            "rois": [
                {"label": "leak", "score": 0.9,
                 "geometry": {"left": 0.1, "top": 0.2, "right": 0.3, "bottom": 0.4, "x": 0.2, "y": 0.3}},
                {"label": "leak", "score": 0.7,
                 "geometry": {"left": 0.5, "top": 0.5, "right": 0.6, "bottom": 0.6}}
            ]
        }))
        .unwrap();

        let query = body.into_query(&detector());
        assert_eq!(query.id, "iq_1");
        assert_eq!(query.confidence_threshold, 0.75);
        assert_eq!(query.result.confidence, 0.92);
        assert_eq!(query.result.count, Some(2));
        assert_eq!(query.rois.as_ref().map(Vec::len), Some(2));
        let first = &query.rois.as_ref().unwrap()[0];
        assert_eq!((first.top, first.left, first.bottom, first.right), (0.2, 0.1, 0.4, 0.3));
        assert_eq!(first.label.as_deref(), Some("leak"));
        assert!(query.created_at.is_some());
    }

    #[test]
    fn test_missing_threshold_uses_detector() {
        let body: ImageQueryBody = serde_json::from_value(json!({
            "id": "iq_2",
            "result": {"label": "YES", "confidence": 0.5}
        }))
        .unwrap();
        let query = body.into_query(&detector());
        assert_eq!(query.confidence_threshold, 0.8);
        assert_eq!(query.detector_id, "det_count");
        assert!(query.rois.is_none());
    }

    #[test]
    fn test_human_reviewed_answer_is_certain() {
        let body: ImageQueryBody = serde_json::from_value(json!({
            "id": "iq_3",
            "result": {"label": "NO", "confidence": null}
        }))
        .unwrap();
        assert_eq!(body.confidence(), Some(1.0));
        assert!(body.is_settled(0.99));
    }

    #[test]
    fn test_pending_answer() {
        let body: ImageQueryBody = serde_json::from_value(json!({
            "id": "iq_4",
            "result": null
        }))
        .unwrap();
        assert_eq!(body.confidence(), None);
        assert!(!body.is_settled(0.5));

        let query = body.into_query(&detector());
        assert_eq!(query.result.label, "");
        assert_eq!(query.result.confidence, 0.0);
    }

    #[test]
    fn test_done_processing_settles() {
        let body: ImageQueryBody = serde_json::from_value(json!({
            "id": "iq_5",
            "done_processing": true,
            "result": {"label": "YES", "confidence": 0.4}
        }))
        .unwrap();
        assert!(body.is_settled(0.9));
    }

    #[test]
    fn test_count_without_label() {
        let body: ImageQueryBody = serde_json::from_value(json!({
            "id": "iq_6",
            "result": {"count": 3, "confidence": 0.9}
        }))
        .unwrap();
        let query = body.into_query(&detector());
        assert_eq!(query.result.label, "3");
    }

    #[test]
    fn test_detector_body_defaults() {
        let body: DetectorBody = serde_json::from_value(json!({"id": "det_9"})).unwrap();
        let detector = Detector::from(body);
        assert_eq!(detector.name, "det_9");
        assert_eq!(detector.mode, DetectorMode::Binary);
        assert_eq!(detector.confidence_threshold, DEFAULT_CONFIDENCE_THRESHOLD);
    }
}
