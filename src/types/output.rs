//! Externally visible projection of the protocol state

use chrono::{DateTime, Utc};
use colored::Colorize;
use serde::{Deserialize, Serialize};

use crate::types::{Phase, ProtocolStatus, ReasonCode};

/// Hold counter and its target for the active phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HoldProgress {
    pub count: u32,
    pub target: u32,
}

impl HoldProgress {
    /// Fraction complete in [0, 1]
    pub fn fraction(&self) -> f64 {
        if self.target == 0 {
            return 0.0;
        }
        self.count as f64 / self.target as f64
    }
}

/// Read-only snapshot returned by `step`, `reset`, and `current_state`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProtocolStateView {
    /// When the snapshot was taken
    pub timestamp: DateTime<Utc>,
    /// Active phase (1-6), kept after termination for diagnostics
    pub phase: Phase,
    pub status: ProtocolStatus,
    /// Present only for phases with a hold requirement
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hold_progress: Option<HoldProgress>,
    /// Present only when status is FATAL_FAILURE
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fatal_reason: Option<String>,
    /// What the last frame did
    pub reason: ReasonCode,
    /// Human-readable prompt for the current situation
    pub guidance: String,
    /// Frames applied since the last reset
    pub frames_processed: u64,
}

impl ProtocolStateView {
    /// Format for terminal display (with colors)
    pub fn to_terminal_string(&self) -> String {
        let status = self.status.paint(&self.status.to_string());
        let hold = match self.hold_progress {
            Some(h) => format!(" | hold={}/{} ({:.0}%)", h.count, h.target, h.fraction() * 100.0),
            None => String::new(),
        };
        format!(
            "#{:<5} {} | {}{} | {} | {}",
            self.frames_processed,
            self.phase.to_string().bold(),
            status,
            hold,
            self.reason.code().dimmed(),
            self.guidance
        )
    }

    /// Format for parseable output (no colors)
    pub fn to_parseable_string(&self) -> String {
        let hold = match self.hold_progress {
            Some(h) => format!("{}/{}", h.count, h.target),
            None => "-".to_string(),
        };
        format!(
            "frame={} | phase={} | status={} | hold={} | reason={}",
            self.frames_processed,
            self.phase.number(),
            self.status,
            hold,
            self.reason.code()
        )
    }
}
