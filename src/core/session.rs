//! Compliance session: one patient's run plus its control commands
//!
//! The web layer translates requests into `process_frame` and
//! `apply(ControlCommand)`; no protocol logic lives outside the machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::ProtocolConfig;
use crate::core::evaluator::ClassConfidences;
use crate::core::machine::PhaseStateMachine;
use crate::error::{DoseError, Result};
use crate::types::{FrameInput, ProtocolStateView, ProtocolStatus};

/// External control surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ControlCommand {
    /// Resume a stopped session from a fresh run
    Start,
    /// Stop accepting frames, keep the final state
    Stop,
    /// Reinitialize the run to phase 1
    Reset,
}

/// Output of one processed frame
#[derive(Debug, Clone, Serialize)]
pub struct StepResult {
    pub state: ProtocolStateView,
    /// Per-class maxima seen in this frame
    pub confidences: ClassConfidences,
    /// This frame ended the run
    pub completed: bool,
}

/// Session metadata plus the current snapshot
#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub session_id: String,
    pub patient_id: String,
    pub started_at: DateTime<Utc>,
    pub active: bool,
    pub state: ProtocolStateView,
}

/// One patient's protocol run
#[derive(Debug)]
pub struct ComplianceSession {
    id: String,
    patient_id: String,
    started_at: DateTime<Utc>,
    active: bool,
    machine: PhaseStateMachine,
}

impl ComplianceSession {
    pub fn new(id: impl Into<String>, patient_id: impl Into<String>, config: Arc<ProtocolConfig>) -> Self {
        let session = Self {
            id: id.into(),
            patient_id: patient_id.into(),
            started_at: Utc::now(),
            active: true,
            machine: PhaseStateMachine::new(config),
        };
        info!(session = %session.id, patient = %session.patient_id, "session started");
        session
    }

    /// Validate and apply one frame
    pub fn process_frame(&mut self, frame: &FrameInput) -> Result<StepResult> {
        if !self.active {
            return Err(DoseError::SessionStopped(self.id.clone()));
        }
        if let Err(e) = frame.validate() {
            warn!(session = %self.id, error = %e, "frame rejected");
            return Err(e);
        }

        let was_running = !self.machine.state().status().is_terminal();
        let state = self.machine.step(&frame.detections, &frame.face);
        let completed = was_running && state.status.is_terminal();

        if completed {
            match state.status {
                ProtocolStatus::Success => {
                    info!(session = %self.id, patient = %self.patient_id, "protocol passed")
                }
                _ => warn!(
                    session = %self.id,
                    patient = %self.patient_id,
                    reason = state.fatal_reason.as_deref().unwrap_or("unknown"),
                    "protocol failed"
                ),
            }
        }

        Ok(StepResult {
            confidences: ClassConfidences::from_frame(&frame.detections, &frame.face),
            state,
            completed,
        })
    }

    /// Dispatch a control command
    pub fn apply(&mut self, command: ControlCommand) -> ProtocolStateView {
        info!(session = %self.id, ?command, "control command");
        match command {
            ControlCommand::Start => {
                if self.active {
                    return self.machine.current_state();
                }
                self.active = true;
                self.machine.reset()
            }
            ControlCommand::Stop => {
                self.active = false;
                self.machine.current_state()
            }
            ControlCommand::Reset => self.machine.reset(),
        }
    }

    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            session_id: self.id.clone(),
            patient_id: self.patient_id.clone(),
            started_at: self.started_at,
            active: self.active,
            state: self.machine.current_state(),
        }
    }

    pub fn current_state(&self) -> ProtocolStateView {
        self.machine.current_state()
    }

    pub fn is_active(&self) -> bool {
        self.active
    }
}
