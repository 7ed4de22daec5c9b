//! Core types for DoseWatch

mod detection;
mod output;
mod reason;
mod state;

pub use detection::{BoundingBox, Detection, DetectionClass, FaceMeasurement, FrameInput};
pub use output::{HoldProgress, ProtocolStateView};
pub use reason::ReasonCode;
pub use state::{FatalReason, Phase, ProtocolStatus};
