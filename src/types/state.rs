//! Protocol phase and run status definitions

use colored::{ColoredString, Colorize};
use serde::{Deserialize, Serialize};

/// The six protocol phases, serialized as their number (1-6)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum Phase {
    /// Pill held up to the camera
    PillInHand,
    /// Mouth open, empty tongue visible
    MouthOpen,
    /// Pill resting on the tongue
    PillOnTongue,
    /// Mouth closed over the pill
    MouthClosed,
    /// Mouth re-opened, pill must be gone
    Recheck,
    /// Empty tongue held to confirm the swallow
    SwallowCheck,
}

impl Phase {
    pub const FIRST: Phase = Phase::PillInHand;

    pub fn number(&self) -> u8 {
        match self {
            Phase::PillInHand => 1,
            Phase::MouthOpen => 2,
            Phase::PillOnTongue => 3,
            Phase::MouthClosed => 4,
            Phase::Recheck => 5,
            Phase::SwallowCheck => 6,
        }
    }

    pub fn from_number(n: u8) -> Option<Phase> {
        match n {
            1 => Some(Phase::PillInHand),
            2 => Some(Phase::MouthOpen),
            3 => Some(Phase::PillOnTongue),
            4 => Some(Phase::MouthClosed),
            5 => Some(Phase::Recheck),
            6 => Some(Phase::SwallowCheck),
            _ => None,
        }
    }

    /// Following phase; `None` after the swallow check
    pub fn next(&self) -> Option<Phase> {
        Phase::from_number(self.number() + 1)
    }

    /// Whether the face-loss guardrail applies in this phase
    pub fn requires_face(&self) -> bool {
        *self != Phase::PillInHand
    }

    /// On-screen prompt for the person taking the medication
    pub fn instruction(&self) -> &'static str {
        match self {
            Phase::PillInHand => "Hold the medication up to the camera",
            Phase::MouthOpen => "Open your mouth wide and show your tongue",
            Phase::PillOnTongue => "Place the pill on your tongue and hold still",
            Phase::MouthClosed => "Close your mouth completely",
            Phase::Recheck => "Open your mouth again for a check",
            Phase::SwallowCheck => "Swallow, then keep showing your empty tongue",
        }
    }
}

impl From<Phase> for u8 {
    fn from(phase: Phase) -> u8 {
        phase.number()
    }
}

impl TryFrom<u8> for Phase {
    type Error = String;

    fn try_from(n: u8) -> Result<Self, Self::Error> {
        Phase::from_number(n).ok_or_else(|| format!("phase must be 1-6, got {}", n))
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PHASE {}", self.number())
    }
}

/// Overall outcome of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProtocolStatus {
    /// Still consuming frames
    Running,
    /// Swallow confirmed
    Success,
    /// Run cannot be trusted; only a reset leaves this state
    FatalFailure,
}

impl ProtocolStatus {
    pub fn is_terminal(&self) -> bool {
        *self != ProtocolStatus::Running
    }

    /// Color a piece of terminal text by status
    pub fn paint(&self, text: &str) -> ColoredString {
        match self {
            ProtocolStatus::Running => text.yellow(),
            ProtocolStatus::Success => text.green().bold(),
            ProtocolStatus::FatalFailure => text.red().bold(),
        }
    }
}

impl std::fmt::Display for ProtocolStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ProtocolStatus::Running => "RUNNING",
            ProtocolStatus::Success => "SUCCESS",
            ProtocolStatus::FatalFailure => "FATAL_FAILURE",
        };
        write!(f, "{}", name)
    }
}

/// Why a run ended in fatal failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FatalReason {
    /// Face landmarks missing for too many consecutive frames
    FaceLost,
    /// Pill seen on the tongue after the concealment phase
    PillReappeared,
}

impl FatalReason {
    /// User-facing explanation
    pub fn message(&self) -> &'static str {
        match self {
            FatalReason::FaceLost => "face lost - reposition in front of the camera",
            FatalReason::PillReappeared => "pill reappeared on the tongue after the mouth was closed",
        }
    }
}

impl std::fmt::Display for FatalReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}
