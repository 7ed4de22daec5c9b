//! DoseWatch: frame-driven medication intake verification
//!
//! Per-frame detector output and a jaw-opening measurement drive a six-phase
//! state machine: pill in hand → mouth open → pill on tongue → mouth closed →
//! re-open check → swallow confirmation.

pub mod config;
pub mod core;
pub mod error;
pub mod types;

pub use config::ProtocolConfig;
pub use error::{DoseError, Result};

// =============================================================================
// REFERENCE THRESHOLDS - confidence values in [0, 1]
// =============================================================================

/// Phase 1: pill held up in hand
pub const PILL_IN_HAND_MIN: f64 = 0.5;

/// Phase 2: tongue visible with mouth open
pub const TONGUE_MIN: f64 = 0.4;

/// Phase 3: pill resting on tongue
pub const PILL_ON_TONGUE_MIN: f64 = 0.35;

/// Phase 4: tongue must fall below this to count as concealed
pub const TONGUE_CLOSED_MAX: f64 = 0.25;

/// Phase 5: tongue visible again on re-open
pub const RECHECK_TONGUE_MIN: f64 = 0.4;

/// Phase 5: pill-on-tongue at or above this after concealment is fatal
pub const PILL_REAPPEARANCE_MIN: f64 = PILL_ON_TONGUE_MIN;

/// Phase 6: empty tongue
pub const FINAL_TONGUE_MIN: f64 = 0.4;

/// Phase 6: loose pill must stay below this
pub const FINAL_PILL_MAX: f64 = 0.15;

// =============================================================================
// JAW LIMITS - vertical lip separation in pixels
// =============================================================================

/// Jaw drop above this counts as "mouth open"
pub const MOUTH_OPEN_MIN_PX: f64 = 20.0;

/// Jaw drop below this counts as "mouth closed"
pub const MOUTH_CLOSED_MAX_PX: f64 = 5.0;

// =============================================================================
// HOLD TARGETS - consecutive frames (~30 fps reference cadence)
// =============================================================================

/// Phase 3: pill held on tongue
pub const PILL_ON_TONGUE_HOLD: u32 = 15;

/// Phase 4: mouth kept closed
pub const CONCEALMENT_HOLD: u32 = 15;

/// Phase 6: swallow confirmation
pub const FINAL_CONFIRMATION_HOLD: u32 = 20;

/// Consecutive frames without face landmarks before the run is failed
pub const FACE_LOSS_LIMIT: u32 = 30;

// =============================================================================
// VERSION
// =============================================================================

pub const VERSION: &str = "1.0.0";
