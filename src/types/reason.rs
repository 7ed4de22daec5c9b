//! Reason codes describing what a single frame did to the run

use serde::{Deserialize, Serialize};

/// Reason codes for every per-frame outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[allow(non_camel_case_types)]
pub enum ReasonCode {
    // =========================================================================
    // R000: Session
    // =========================================================================
    /// Fresh run, no frames yet
    R000_READY,
    /// Run reinitialized by an external reset
    R000_RESET,
    /// Frame ignored because the run already ended
    R000_TERMINAL_IGNORED,

    // =========================================================================
    // R100: Waiting on an instant-advance condition
    // =========================================================================
    /// Phase 1: no pill above threshold yet
    R101_AWAITING_PILL,
    /// Phase 2: tongue or jaw opening not sufficient
    R102_AWAITING_OPEN_MOUTH,
    /// Phase 3: no pill on the tongue yet
    R103_AWAITING_PILL_ON_TONGUE,
    /// Phase 4: mouth not closed yet
    R104_AWAITING_CLOSE,
    /// Phase 5: tongue not visible again yet
    R105_AWAITING_REOPEN,
    /// Phase 6: empty tongue not visible
    R106_AWAITING_EMPTY_TONGUE,

    // =========================================================================
    // R200: Hold counters
    // =========================================================================
    /// Hold condition met, counter advancing
    R200_HOLD_ACCUMULATING,
    /// Hold condition broken, counter back to zero
    R201_HOLD_RESET,
    /// Phase 4: mouth re-opened before concealment hold finished
    R204_MOUTH_REOPENED,
    /// Phase 6: pill still visible during swallow check
    R206_PILL_STILL_VISIBLE,

    // =========================================================================
    // R300: Transitions
    // =========================================================================
    /// Moved to the next phase
    R300_PHASE_ADVANCED,
    /// Swallow confirmed, run verified
    R306_VERIFIED,

    // =========================================================================
    // R400: Guardrails
    // =========================================================================
    /// Face landmarks missing, counting toward the limit
    R400_FACE_MISSING,
    /// Face missing for too long
    R401_FACE_LOST,
    /// Pill reappeared on the tongue in phase 5
    R402_PILL_REAPPEARED,
}

impl ReasonCode {
    /// Get the code string (for logging)
    pub fn code(&self) -> &'static str {
        match self {
            Self::R000_READY => "R000_READY",
            Self::R000_RESET => "R000_RESET",
            Self::R000_TERMINAL_IGNORED => "R000_TERMINAL_IGNORED",
            Self::R101_AWAITING_PILL => "R101_AWAITING_PILL",
            Self::R102_AWAITING_OPEN_MOUTH => "R102_AWAITING_OPEN_MOUTH",
            Self::R103_AWAITING_PILL_ON_TONGUE => "R103_AWAITING_PILL_ON_TONGUE",
            Self::R104_AWAITING_CLOSE => "R104_AWAITING_CLOSE",
            Self::R105_AWAITING_REOPEN => "R105_AWAITING_REOPEN",
            Self::R106_AWAITING_EMPTY_TONGUE => "R106_AWAITING_EMPTY_TONGUE",
            Self::R200_HOLD_ACCUMULATING => "R200_HOLD_ACCUMULATING",
            Self::R201_HOLD_RESET => "R201_HOLD_RESET",
            Self::R204_MOUTH_REOPENED => "R204_MOUTH_REOPENED",
            Self::R206_PILL_STILL_VISIBLE => "R206_PILL_STILL_VISIBLE",
            Self::R300_PHASE_ADVANCED => "R300_PHASE_ADVANCED",
            Self::R306_VERIFIED => "R306_VERIFIED",
            Self::R400_FACE_MISSING => "R400_FACE_MISSING",
            Self::R401_FACE_LOST => "R401_FACE_LOST",
            Self::R402_PILL_REAPPEARED => "R402_PILL_REAPPEARED",
        }
    }

    /// Get human-readable description
    pub fn description(&self) -> &'static str {
        match self {
            Self::R000_READY => "Ready",
            Self::R000_RESET => "Protocol reset",
            Self::R000_TERMINAL_IGNORED => "Run finished - reset to start again",
            Self::R101_AWAITING_PILL => "Waiting for the pill",
            Self::R102_AWAITING_OPEN_MOUTH => "Open your mouth wider",
            Self::R103_AWAITING_PILL_ON_TONGUE => "Waiting for the pill on the tongue",
            Self::R104_AWAITING_CLOSE => "Close your mouth completely",
            Self::R105_AWAITING_REOPEN => "Waiting for the mouth to open",
            Self::R106_AWAITING_EMPTY_TONGUE => "Show your empty tongue",
            Self::R200_HOLD_ACCUMULATING => "Hold still",
            Self::R201_HOLD_RESET => "Hold interrupted",
            Self::R204_MOUTH_REOPENED => "Mouth opened too early - keep it closed",
            Self::R206_PILL_STILL_VISIBLE => "Pill still visible",
            Self::R300_PHASE_ADVANCED => "Step complete",
            Self::R306_VERIFIED => "Medication intake verified",
            Self::R400_FACE_MISSING => "Face not visible",
            Self::R401_FACE_LOST => "Face lost",
            Self::R402_PILL_REAPPEARED => "Pill reappeared",
        }
    }

    /// Codes that ask the person to correct something
    pub fn is_corrective(&self) -> bool {
        matches!(
            self,
            Self::R102_AWAITING_OPEN_MOUTH
                | Self::R104_AWAITING_CLOSE
                | Self::R201_HOLD_RESET
                | Self::R204_MOUTH_REOPENED
                | Self::R206_PILL_STILL_VISIBLE
                | Self::R400_FACE_MISSING
        )
    }

    /// Frame made no progress toward the next phase
    pub fn is_non_progress(&self) -> bool {
        matches!(
            self,
            Self::R101_AWAITING_PILL
                | Self::R102_AWAITING_OPEN_MOUTH
                | Self::R103_AWAITING_PILL_ON_TONGUE
                | Self::R104_AWAITING_CLOSE
                | Self::R105_AWAITING_REOPEN
                | Self::R106_AWAITING_EMPTY_TONGUE
                | Self::R201_HOLD_RESET
                | Self::R204_MOUTH_REOPENED
                | Self::R206_PILL_STILL_VISIBLE
        )
    }
}

impl std::fmt::Display for ReasonCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code(), self.description())
    }
}
