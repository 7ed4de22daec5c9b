//! Phase state machine: six phases driven one frame at a time
//!
//! Phase transitions:
//! - 1 → 2: pill detected in hand (instant)
//! - 2 → 3: empty tongue visible AND jaw drop above the open limit (instant)
//! - 3 → 4: pill on tongue held for N frames
//! - 4 → 5: tongue hidden AND jaw below the closed limit held for N frames
//! - 5 → 6: empty tongue visible again; pill on tongue here is fatal
//! - 6 → SUCCESS: empty tongue and no loose pill held for N frames
//!
//! The face-loss guardrail runs before phase logic in phases 2-6. Once the
//! status leaves RUNNING, frames are ignored until `reset`.

use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::ProtocolConfig;
use crate::core::counter::FrameCounter;
use crate::core::evaluator::{is_absent, is_present};
use crate::core::guardrail::{self, FaceCheck, GuardrailMonitor};
use crate::types::{
    Detection, DetectionClass, FaceMeasurement, FatalReason, HoldProgress, Phase,
    ProtocolStateView, ProtocolStatus, ReasonCode,
};

/// The machine's memory for one protocol run
#[derive(Debug, Clone, PartialEq)]
pub struct ProtocolState {
    phase: Phase,
    status: ProtocolStatus,
    hold: FrameCounter,
    guardrail: GuardrailMonitor,
    fatal_reason: Option<FatalReason>,
}

impl ProtocolState {
    fn start(config: &ProtocolConfig) -> Self {
        Self {
            phase: Phase::FIRST,
            status: ProtocolStatus::Running,
            hold: FrameCounter::new(config.hold_target(Phase::FIRST).unwrap_or(0)),
            guardrail: GuardrailMonitor::new(config.face_loss_limit),
            fatal_reason: None,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn status(&self) -> ProtocolStatus {
        self.status
    }

    pub fn hold_counter(&self) -> u32 {
        self.hold.count()
    }

    pub fn face_lost_counter(&self) -> u32 {
        self.guardrail.face_lost_counter()
    }

    pub fn fatal_reason(&self) -> Option<FatalReason> {
        self.fatal_reason
    }
}

/// Six-phase verification engine
#[derive(Debug)]
pub struct PhaseStateMachine {
    config: Arc<ProtocolConfig>,
    state: ProtocolState,
    /// What the last applied frame (or reset) did
    last_reason: ReasonCode,
    /// Frames applied since the last reset
    frames_processed: u64,
}

impl Default for PhaseStateMachine {
    fn default() -> Self {
        Self::new(Arc::new(ProtocolConfig::default()))
    }
}

impl PhaseStateMachine {
    /// Create a machine in the start state
    pub fn new(config: Arc<ProtocolConfig>) -> Self {
        let state = ProtocolState::start(&config);
        Self {
            config,
            state,
            last_reason: ReasonCode::R000_READY,
            frames_processed: 0,
        }
    }

    /// Apply one frame and return the resulting snapshot
    pub fn step(&mut self, detections: &[Detection], face: &FaceMeasurement) -> ProtocolStateView {
        if self.state.status.is_terminal() {
            return self.view(ReasonCode::R000_TERMINAL_IGNORED);
        }

        self.frames_processed += 1;
        let reason = self.apply(detections, face);
        self.last_reason = reason;

        debug!(
            frame = self.frames_processed,
            phase = self.state.phase.number(),
            hold = self.state.hold.count(),
            face_lost = self.state.face_lost_counter(),
            reason = reason.code(),
            "frame applied"
        );

        self.view(reason)
    }

    /// Reinitialize to phase 1 / RUNNING with all counters at zero
    pub fn reset(&mut self) -> ProtocolStateView {
        info!(
            phase = self.state.phase.number(),
            status = %self.state.status,
            frames = self.frames_processed,
            "protocol reset"
        );
        self.state = ProtocolState::start(&self.config);
        self.last_reason = ReasonCode::R000_RESET;
        self.frames_processed = 0;
        self.view(ReasonCode::R000_RESET)
    }

    /// Snapshot without advancing
    pub fn current_state(&self) -> ProtocolStateView {
        self.view(self.last_reason)
    }

    pub fn state(&self) -> &ProtocolState {
        &self.state
    }

    pub fn config(&self) -> &ProtocolConfig {
        &self.config
    }

    pub fn frames_processed(&self) -> u64 {
        self.frames_processed
    }

    fn apply(&mut self, detections: &[Detection], face: &FaceMeasurement) -> ReasonCode {
        let face_missing = match self.state.guardrail.check_face(self.state.phase, face) {
            FaceCheck::Tripped(reason) => return self.fail(reason),
            FaceCheck::Missing(_) => true,
            FaceCheck::Clear => false,
        };

        let reason = match self.state.phase {
            Phase::PillInHand => self.pill_in_hand(detections),
            Phase::MouthOpen => self.mouth_open(detections, face),
            Phase::PillOnTongue => self.pill_on_tongue(detections),
            Phase::MouthClosed => self.mouth_closed(detections, face),
            Phase::Recheck => self.recheck(detections),
            Phase::SwallowCheck => self.swallow_check(detections),
        };

        if face_missing && reason.is_non_progress() {
            ReasonCode::R400_FACE_MISSING
        } else {
            reason
        }
    }

    // =========================================================================
    // PHASE HANDLERS
    // =========================================================================

    fn pill_in_hand(&mut self, detections: &[Detection]) -> ReasonCode {
        if is_present(detections, DetectionClass::Pill, self.config.pill_in_hand_min) {
            self.advance()
        } else {
            ReasonCode::R101_AWAITING_PILL
        }
    }

    fn mouth_open(&mut self, detections: &[Detection], face: &FaceMeasurement) -> ReasonCode {
        let tongue = is_present(detections, DetectionClass::TongueNoPill, self.config.tongue_min);
        let jaw_open = face
            .jaw_drop()
            .is_some_and(|jaw| jaw > self.config.mouth_open_min_px);

        if tongue && jaw_open {
            self.advance()
        } else {
            ReasonCode::R102_AWAITING_OPEN_MOUTH
        }
    }

    fn pill_on_tongue(&mut self, detections: &[Detection]) -> ReasonCode {
        let satisfied = is_present(
            detections,
            DetectionClass::PillOnTongue,
            self.config.pill_on_tongue_min,
        );
        let update = self.state.hold.update(satisfied);

        if update.reached {
            self.advance()
        } else if satisfied {
            ReasonCode::R200_HOLD_ACCUMULATING
        } else if update.was_reset {
            ReasonCode::R201_HOLD_RESET
        } else {
            ReasonCode::R103_AWAITING_PILL_ON_TONGUE
        }
    }

    fn mouth_closed(&mut self, detections: &[Detection], face: &FaceMeasurement) -> ReasonCode {
        let jaw = face.jaw_drop();
        let tongue_hidden = is_absent(
            detections,
            DetectionClass::TongueNoPill,
            self.config.tongue_closed_max,
        );
        let jaw_closed = jaw.is_some_and(|j| j < self.config.mouth_closed_max_px);
        let update = self.state.hold.update(tongue_hidden && jaw_closed);

        if update.reached {
            return self.advance();
        }
        if tongue_hidden && jaw_closed {
            return ReasonCode::R200_HOLD_ACCUMULATING;
        }

        // A lost face resets the hold but is not a re-opening
        let reopened = jaw.is_some_and(|j| j >= self.config.mouth_closed_max_px);
        let pill_inside = is_present(
            detections,
            DetectionClass::PillOnTongue,
            self.config.pill_on_tongue_min,
        );
        match (update.was_reset, reopened && !pill_inside) {
            (true, true) => ReasonCode::R204_MOUTH_REOPENED,
            (true, false) => ReasonCode::R201_HOLD_RESET,
            (false, _) => ReasonCode::R104_AWAITING_CLOSE,
        }
    }

    fn recheck(&mut self, detections: &[Detection]) -> ReasonCode {
        // Fatal wins over a coincidentally passing tongue detection
        if guardrail::pill_reappeared(detections, self.config.reappearance_min) {
            return self.fail(FatalReason::PillReappeared);
        }
        if is_present(
            detections,
            DetectionClass::TongueNoPill,
            self.config.recheck_tongue_min,
        ) {
            self.advance()
        } else {
            ReasonCode::R105_AWAITING_REOPEN
        }
    }

    fn swallow_check(&mut self, detections: &[Detection]) -> ReasonCode {
        let tongue = is_present(
            detections,
            DetectionClass::TongueNoPill,
            self.config.final_tongue_min,
        );
        let pill_gone = is_absent(detections, DetectionClass::Pill, self.config.final_pill_max);
        let update = self.state.hold.update(tongue && pill_gone);

        if update.reached {
            return self.succeed();
        }
        if tongue && pill_gone {
            ReasonCode::R200_HOLD_ACCUMULATING
        } else if !pill_gone {
            ReasonCode::R206_PILL_STILL_VISIBLE
        } else if update.was_reset {
            ReasonCode::R201_HOLD_RESET
        } else {
            ReasonCode::R106_AWAITING_EMPTY_TONGUE
        }
    }

    // =========================================================================
    // TRANSITIONS
    // =========================================================================

    fn advance(&mut self) -> ReasonCode {
        let from = self.state.phase;
        let Some(next) = from.next() else {
            return self.succeed();
        };
        self.state.phase = next;
        self.state.hold.retarget(self.config.hold_target(next).unwrap_or(0));
        info!(
            from = from.number(),
            to = next.number(),
            frame = self.frames_processed,
            "phase advanced"
        );
        ReasonCode::R300_PHASE_ADVANCED
    }

    fn succeed(&mut self) -> ReasonCode {
        self.state.status = ProtocolStatus::Success;
        info!(frame = self.frames_processed, "medication intake verified");
        ReasonCode::R306_VERIFIED
    }

    fn fail(&mut self, reason: FatalReason) -> ReasonCode {
        self.state.status = ProtocolStatus::FatalFailure;
        self.state.fatal_reason = Some(reason);
        warn!(
            phase = self.state.phase.number(),
            frame = self.frames_processed,
            reason = %reason,
            "protocol failed"
        );
        match reason {
            FatalReason::FaceLost => ReasonCode::R401_FACE_LOST,
            FatalReason::PillReappeared => ReasonCode::R402_PILL_REAPPEARED,
        }
    }

    // =========================================================================
    // VIEW
    // =========================================================================

    fn view(&self, reason: ReasonCode) -> ProtocolStateView {
        let state = &self.state;
        let guidance = match (state.status, state.fatal_reason) {
            (ProtocolStatus::Success, _) => ReasonCode::R306_VERIFIED.description().to_string(),
            (ProtocolStatus::FatalFailure, Some(fatal)) => format!("Verification failed: {}", fatal),
            (ProtocolStatus::FatalFailure, None) => "Verification failed".to_string(),
            (ProtocolStatus::Running, _) if reason.is_corrective() => reason.description().to_string(),
            (ProtocolStatus::Running, _) => state.phase.instruction().to_string(),
        };

        ProtocolStateView {
            timestamp: Utc::now(),
            phase: state.phase,
            status: state.status,
            hold_progress: self.config.hold_target(state.phase).map(|target| HoldProgress {
                count: state.hold.count(),
                target,
            }),
            fatal_reason: state.fatal_reason.map(|r| r.message().to_string()),
            reason,
            guidance,
            frames_processed: self.frames_processed,
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
