//! Guardrail monitor: rules that can end a run regardless of phase logic
//!
//! - Face loss: `limit` consecutive frames without landmarks in phases 2-6
//! - Pill reappearance: pill-on-tongue seen during the phase 5 re-check

use crate::core::evaluator;
use crate::types::{Detection, DetectionClass, FaceMeasurement, FatalReason, Phase};

/// Outcome of the face-loss check for one frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaceCheck {
    /// Face present, or the phase does not need one
    Clear,
    /// Face missing; consecutive count so far
    Missing(u32),
    /// Limit reached
    Tripped(FatalReason),
}

/// Consecutive face-loss tracking
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GuardrailMonitor {
    face_lost: u32,
    limit: u32,
}

impl GuardrailMonitor {
    pub fn new(limit: u32) -> Self {
        Self { face_lost: 0, limit }
    }

    /// Update the face-loss counter; evaluated before any phase logic
    pub fn check_face(&mut self, phase: Phase, face: &FaceMeasurement) -> FaceCheck {
        if !phase.requires_face() || face.landmarks_present {
            self.face_lost = 0;
            return FaceCheck::Clear;
        }
        self.face_lost = self.face_lost.saturating_add(1).min(self.limit);
        if self.face_lost >= self.limit {
            FaceCheck::Tripped(FatalReason::FaceLost)
        } else {
            FaceCheck::Missing(self.face_lost)
        }
    }

    pub fn face_lost_counter(&self) -> u32 {
        self.face_lost
    }
}

/// Pill back on the tongue after concealment
pub fn pill_reappeared(detections: &[Detection], threshold: f64) -> bool {
    evaluator::is_present(detections, DetectionClass::PillOnTongue, threshold)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trips_at_limit() {
        let mut guard = GuardrailMonitor::new(3);
        let lost = FaceMeasurement::lost();
        assert_eq!(guard.check_face(Phase::MouthOpen, &lost), FaceCheck::Missing(1));
        assert_eq!(guard.check_face(Phase::MouthOpen, &lost), FaceCheck::Missing(2));
        assert_eq!(
            guard.check_face(Phase::MouthOpen, &lost),
            FaceCheck::Tripped(FatalReason::FaceLost)
        );
        assert_eq!(guard.face_lost_counter(), 3);
    }

    #[test]
    fn test_visible_face_resets_counter() {
        let mut guard = GuardrailMonitor::new(3);
        guard.check_face(Phase::MouthClosed, &FaceMeasurement::lost());
        guard.check_face(Phase::MouthClosed, &FaceMeasurement::lost());
        assert_eq!(
            guard.check_face(Phase::MouthClosed, &FaceMeasurement::visible(2.0)),
            FaceCheck::Clear
        );
        assert_eq!(guard.face_lost_counter(), 0);
    }

    #[test]
    fn test_phase_one_ignores_face_loss() {
        let mut guard = GuardrailMonitor::new(2);
        for _ in 0..10 {
            assert_eq!(
                guard.check_face(Phase::PillInHand, &FaceMeasurement::lost()),
                FaceCheck::Clear
            );
        }
        assert_eq!(guard.face_lost_counter(), 0);
    }

    #[test]
    fn test_pill_reappearance() {
        let dets = [Detection::scored(DetectionClass::PillOnTongue, 0.4)];
        assert!(pill_reappeared(&dets, 0.35));
        assert!(!pill_reappeared(&dets, 0.5));
        assert!(!pill_reappeared(&[], 0.35));
    }
}
