//! Confidence evaluator: stateless per-frame predicates over detections
//!
//! Multiple detections of one class collapse to their maximum confidence
//! before any threshold test. Presence and absence take independent
//! thresholds; `is_absent(c, t)` is not `!is_present(c, t')` for some other `t'`.

use serde::Serialize;

use crate::types::{Detection, DetectionClass, FaceMeasurement};

/// Highest confidence among detections of `class`, or 0 when none
pub fn max_confidence(detections: &[Detection], class: DetectionClass) -> f64 {
    detections
        .iter()
        .filter(|d| d.class == class)
        .map(|d| d.confidence)
        .fold(0.0, f64::max)
}

/// Class detected at or above `threshold`
pub fn is_present(detections: &[Detection], class: DetectionClass, threshold: f64) -> bool {
    max_confidence(detections, class) >= threshold
}

/// Class strictly below `threshold`
pub fn is_absent(detections: &[Detection], class: DetectionClass, threshold: f64) -> bool {
    max_confidence(detections, class) < threshold
}

/// Per-class maxima for one frame, reported next to each step for display
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ClassConfidences {
    pub pill: f64,
    pub pill_on_tongue: f64,
    pub tongue_no_pill: f64,
    pub hand: f64,
    /// Jaw drop in pixels, absent when the face was not found
    pub jaw_drop_px: Option<f64>,
}

impl ClassConfidences {
    pub fn from_frame(detections: &[Detection], face: &FaceMeasurement) -> Self {
        Self {
            pill: max_confidence(detections, DetectionClass::Pill),
            pill_on_tongue: max_confidence(detections, DetectionClass::PillOnTongue),
            tongue_no_pill: max_confidence(detections, DetectionClass::TongueNoPill),
            hand: max_confidence(detections, DetectionClass::Hand),
            jaw_drop_px: face.jaw_drop(),
        }
    }

    pub fn get(&self, class: DetectionClass) -> f64 {
        match class {
            DetectionClass::Pill => self.pill,
            DetectionClass::PillOnTongue => self.pill_on_tongue,
            DetectionClass::TongueNoPill => self.tongue_no_pill,
            DetectionClass::Hand => self.hand,
        }
    }
}

impl std::fmt::Display for ClassConfidences {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for class in DetectionClass::ALL {
            write!(f, "{}={:.2} ", class, self.get(class))?;
        }
        match self.jaw_drop_px {
            Some(jaw) => write!(f, "jaw={:.1}px", jaw),
            None => write!(f, "jaw=n/a"),
        }
    }
}
