//! Core modules for DoseWatch

pub mod api;
pub mod counter;
pub mod evaluator;
pub mod guardrail;
pub mod machine;
pub mod replay;
pub mod session;

pub use api::{create_router, run_server};
pub use counter::{CounterUpdate, FrameCounter};
pub use evaluator::{is_absent, is_present, max_confidence, ClassConfidences};
pub use guardrail::{FaceCheck, GuardrailMonitor};
pub use machine::{PhaseStateMachine, ProtocolState};
pub use replay::{parse_frame_line, FrameTrace};
pub use session::{ComplianceSession, ControlCommand, SessionSummary, StepResult};
