//! Per-frame signals from the external detector and landmark extractor

use serde::{Deserialize, Serialize};

use crate::error::{DoseError, Result};

/// The four classes the detector is trained on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DetectionClass {
    /// Loose pill, typically held in the hand
    Pill,
    /// Pill resting on an extended tongue
    PillOnTongue,
    /// Extended tongue with nothing on it
    TongueNoPill,
    /// Hand
    Hand,
}

impl DetectionClass {
    pub const ALL: [DetectionClass; 4] = [
        DetectionClass::Pill,
        DetectionClass::PillOnTongue,
        DetectionClass::TongueNoPill,
        DetectionClass::Hand,
    ];

    /// Label as emitted by the detector
    pub fn label(&self) -> &'static str {
        match self {
            DetectionClass::Pill => "pill",
            DetectionClass::PillOnTongue => "pill-on-tongue",
            DetectionClass::TongueNoPill => "tongue-no-pill",
            DetectionClass::Hand => "hand",
        }
    }
}

impl std::fmt::Display for DetectionClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Axis-aligned rectangle in pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

impl BoundingBox {
    pub fn new(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self { x1, y1, x2, y2 }
    }

    fn is_well_formed(&self) -> bool {
        [self.x1, self.y1, self.x2, self.y2].iter().all(|v| v.is_finite())
            && self.x2 >= self.x1
            && self.y2 >= self.y1
    }
}

/// One detected region
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub class: DetectionClass,
    /// Detector score in [0, 1]
    pub confidence: f64,
    #[serde(default)]
    pub bbox: BoundingBox,
}

impl Detection {
    pub fn new(class: DetectionClass, confidence: f64, bbox: BoundingBox) -> Self {
        Self { class, confidence, bbox }
    }

    /// Detection without a meaningful box (tests, synthetic traces)
    pub fn scored(class: DetectionClass, confidence: f64) -> Self {
        Self::new(class, confidence, BoundingBox::default())
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.confidence) {
            return Err(DoseError::ConfidenceOutOfRange {
                class: self.class.to_string(),
                value: self.confidence,
            });
        }
        if !self.bbox.is_well_formed() {
            return Err(DoseError::InvalidBoundingBox(self.class.to_string()));
        }
        Ok(())
    }
}

/// Lip-landmark measurement for one frame
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FaceMeasurement {
    /// Vertical distance between upper and lower lip; meaningless without landmarks
    pub jaw_drop_px: f64,
    pub landmarks_present: bool,
}

impl FaceMeasurement {
    /// Face found with the given jaw drop
    pub fn visible(jaw_drop_px: f64) -> Self {
        Self {
            jaw_drop_px,
            landmarks_present: true,
        }
    }

    /// No face landmarks in this frame
    pub fn lost() -> Self {
        Self {
            jaw_drop_px: 0.0,
            landmarks_present: false,
        }
    }

    /// Jaw drop, only when landmarks back it
    pub fn jaw_drop(&self) -> Option<f64> {
        self.landmarks_present.then_some(self.jaw_drop_px)
    }

    pub fn validate(&self) -> Result<()> {
        if self.landmarks_present && (!self.jaw_drop_px.is_finite() || self.jaw_drop_px < 0.0) {
            return Err(DoseError::InvalidJawDrop(self.jaw_drop_px));
        }
        Ok(())
    }
}

/// Everything the state machine consumes for one video frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameInput {
    #[serde(default)]
    pub detections: Vec<Detection>,
    pub face: FaceMeasurement,
}

impl FrameInput {
    pub fn new(detections: Vec<Detection>, face: FaceMeasurement) -> Self {
        Self { detections, face }
    }

    /// Boundary check before the frame reaches the state machine
    pub fn validate(&self) -> Result<()> {
        for detection in &self.detections {
            detection.validate()?;
        }
        self.face.validate()
    }
}
