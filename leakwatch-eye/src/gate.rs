//! Confidence gate applied after every detector stage

use leakwatch_core::DetectionQuery;
use std::cmp::Ordering;

/// True when the answer is strictly more confident than the detector's
/// threshold and, if a label is required, carries exactly that label.
pub fn passes(query: &DetectionQuery, require_label: Option<&str>) -> bool {
    // NaN on either side compares as None and never clears the gate
    let above = query.result.confidence.partial_cmp(&query.confidence_threshold) == Some(Ordering::Greater);
    if !above {
        return false;
    }
    match require_label {
        Some(label) => query.result.label == label,
        None => true,
    }
}
