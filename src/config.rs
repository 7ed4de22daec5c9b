//! Protocol configuration
//!
//! Every threshold and hold target lives here, built once and shared as
//! `Arc<ProtocolConfig>`. A TOML file may override any subset of the
//! reference values:
//!
//! ```toml
//! [thresholds]
//! pill_in_hand_min = 0.6
//!
//! [jaw]
//! mouth_open_min_px = 18.0
//!
//! [holds]
//! final_confirmation = 30
//!
//! [guardrail]
//! face_loss_limit = 45
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{DoseError, Result};
use crate::types::Phase;

#[derive(Debug, Serialize, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct ProtocolConfigFile {
    thresholds: Option<ThresholdsFile>,
    jaw: Option<JawFile>,
    holds: Option<HoldsFile>,
    guardrail: Option<GuardrailFile>,
}

#[derive(Debug, Serialize, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct ThresholdsFile {
    pill_in_hand_min: Option<f64>,
    tongue_min: Option<f64>,
    pill_on_tongue_min: Option<f64>,
    tongue_closed_max: Option<f64>,
    recheck_tongue_min: Option<f64>,
    reappearance_min: Option<f64>,
    final_tongue_min: Option<f64>,
    final_pill_max: Option<f64>,
}

#[derive(Debug, Serialize, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct JawFile {
    mouth_open_min_px: Option<f64>,
    mouth_closed_max_px: Option<f64>,
}

#[derive(Debug, Serialize, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct HoldsFile {
    pill_on_tongue: Option<u32>,
    concealment: Option<u32>,
    final_confirmation: Option<u32>,
}

#[derive(Debug, Serialize, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct GuardrailFile {
    face_loss_limit: Option<u32>,
}

/// Immutable thresholds and frame counts for one protocol run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProtocolConfig {
    /// Phase 1: pill confidence to advance
    pub pill_in_hand_min: f64,
    /// Phase 2: tongue confidence to advance
    pub tongue_min: f64,
    /// Phase 3: pill-on-tongue confidence counted toward the hold
    pub pill_on_tongue_min: f64,
    /// Phase 4: tongue confidence must stay below this
    pub tongue_closed_max: f64,
    /// Phase 5: tongue confidence to advance
    pub recheck_tongue_min: f64,
    /// Phase 5: pill-on-tongue at or above this is fatal
    pub reappearance_min: f64,
    /// Phase 6: tongue confidence counted toward the hold
    pub final_tongue_min: f64,
    /// Phase 6: loose pill confidence must stay below this
    pub final_pill_max: f64,
    /// Phase 2: jaw drop must exceed this (pixels)
    pub mouth_open_min_px: f64,
    /// Phase 4: jaw drop must stay below this (pixels)
    pub mouth_closed_max_px: f64,
    /// Phase 3 hold target (frames)
    pub pill_on_tongue_hold: u32,
    /// Phase 4 hold target (frames)
    pub concealment_hold: u32,
    /// Phase 6 hold target (frames)
    pub final_confirmation_hold: u32,
    /// Consecutive faceless frames before fatal failure
    pub face_loss_limit: u32,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            pill_in_hand_min: crate::PILL_IN_HAND_MIN,
            tongue_min: crate::TONGUE_MIN,
            pill_on_tongue_min: crate::PILL_ON_TONGUE_MIN,
            tongue_closed_max: crate::TONGUE_CLOSED_MAX,
            recheck_tongue_min: crate::RECHECK_TONGUE_MIN,
            reappearance_min: crate::PILL_REAPPEARANCE_MIN,
            final_tongue_min: crate::FINAL_TONGUE_MIN,
            final_pill_max: crate::FINAL_PILL_MAX,
            mouth_open_min_px: crate::MOUTH_OPEN_MIN_PX,
            mouth_closed_max_px: crate::MOUTH_CLOSED_MAX_PX,
            pill_on_tongue_hold: crate::PILL_ON_TONGUE_HOLD,
            concealment_hold: crate::CONCEALMENT_HOLD,
            final_confirmation_hold: crate::FINAL_CONFIRMATION_HOLD,
            face_loss_limit: crate::FACE_LOSS_LIMIT,
        }
    }
}

impl ProtocolConfig {
    /// Load from an optional TOML file; missing fields keep reference values
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let file_cfg = match path {
            Some(path) => read_config_file(path)?,
            None => ProtocolConfigFile::default(),
        };
        let cfg = Self::from_file(file_cfg);
        cfg.validate()?;
        Ok(cfg)
    }

    /// Parse TOML text directly (used by tests and `--print-config` round trips)
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let file_cfg: ProtocolConfigFile =
            toml::from_str(raw).map_err(|source| DoseError::ConfigParse {
                path: "<inline>".into(),
                source,
            })?;
        let cfg = Self::from_file(file_cfg);
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: ProtocolConfigFile) -> Self {
        let d = Self::default();
        let t = file.thresholds.unwrap_or_default();
        let j = file.jaw.unwrap_or_default();
        let h = file.holds.unwrap_or_default();
        let g = file.guardrail.unwrap_or_default();
        Self {
            pill_in_hand_min: t.pill_in_hand_min.unwrap_or(d.pill_in_hand_min),
            tongue_min: t.tongue_min.unwrap_or(d.tongue_min),
            pill_on_tongue_min: t.pill_on_tongue_min.unwrap_or(d.pill_on_tongue_min),
            tongue_closed_max: t.tongue_closed_max.unwrap_or(d.tongue_closed_max),
            recheck_tongue_min: t.recheck_tongue_min.unwrap_or(d.recheck_tongue_min),
            reappearance_min: t.reappearance_min.unwrap_or(d.reappearance_min),
            final_tongue_min: t.final_tongue_min.unwrap_or(d.final_tongue_min),
            final_pill_max: t.final_pill_max.unwrap_or(d.final_pill_max),
            mouth_open_min_px: j.mouth_open_min_px.unwrap_or(d.mouth_open_min_px),
            mouth_closed_max_px: j.mouth_closed_max_px.unwrap_or(d.mouth_closed_max_px),
            pill_on_tongue_hold: h.pill_on_tongue.unwrap_or(d.pill_on_tongue_hold),
            concealment_hold: h.concealment.unwrap_or(d.concealment_hold),
            final_confirmation_hold: h.final_confirmation.unwrap_or(d.final_confirmation_hold),
            face_loss_limit: g.face_loss_limit.unwrap_or(d.face_loss_limit),
        }
    }

    /// Reject values the state machine cannot interpret
    pub fn validate(&self) -> Result<()> {
        let thresholds = [
            ("pill_in_hand_min", self.pill_in_hand_min),
            ("tongue_min", self.tongue_min),
            ("pill_on_tongue_min", self.pill_on_tongue_min),
            ("tongue_closed_max", self.tongue_closed_max),
            ("recheck_tongue_min", self.recheck_tongue_min),
            ("reappearance_min", self.reappearance_min),
            ("final_tongue_min", self.final_tongue_min),
            ("final_pill_max", self.final_pill_max),
        ];
        for (name, value) in thresholds {
            if !(0.0..=1.0).contains(&value) {
                return Err(DoseError::ThresholdOutOfRange { name, value });
            }
        }

        for (name, value) in [
            ("mouth_open_min_px", self.mouth_open_min_px),
            ("mouth_closed_max_px", self.mouth_closed_max_px),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(DoseError::InvalidJawLimit { name, value });
            }
        }
        if self.mouth_closed_max_px >= self.mouth_open_min_px {
            return Err(DoseError::JawLimitsOverlap {
                closed: self.mouth_closed_max_px,
                open: self.mouth_open_min_px,
            });
        }

        for (name, value) in [
            ("pill_on_tongue_hold", self.pill_on_tongue_hold),
            ("concealment_hold", self.concealment_hold),
            ("final_confirmation_hold", self.final_confirmation_hold),
            ("face_loss_limit", self.face_loss_limit),
        ] {
            if value == 0 {
                return Err(DoseError::ZeroFrameCount { name });
            }
        }
        Ok(())
    }

    /// Hold target for a phase, or `None` for instant-advance phases
    pub fn hold_target(&self, phase: Phase) -> Option<u32> {
        match phase {
            Phase::PillOnTongue => Some(self.pill_on_tongue_hold),
            Phase::MouthClosed => Some(self.concealment_hold),
            Phase::SwallowCheck => Some(self.final_confirmation_hold),
            Phase::PillInHand | Phase::MouthOpen | Phase::Recheck => None,
        }
    }

    /// Render as TOML in the same layout `load` reads
    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string(&ProtocolConfigFile::from(self))?)
    }
}

impl From<&ProtocolConfig> for ProtocolConfigFile {
    fn from(cfg: &ProtocolConfig) -> Self {
        Self {
            thresholds: Some(ThresholdsFile {
                pill_in_hand_min: Some(cfg.pill_in_hand_min),
                tongue_min: Some(cfg.tongue_min),
                pill_on_tongue_min: Some(cfg.pill_on_tongue_min),
                tongue_closed_max: Some(cfg.tongue_closed_max),
                recheck_tongue_min: Some(cfg.recheck_tongue_min),
                reappearance_min: Some(cfg.reappearance_min),
                final_tongue_min: Some(cfg.final_tongue_min),
                final_pill_max: Some(cfg.final_pill_max),
            }),
            jaw: Some(JawFile {
                mouth_open_min_px: Some(cfg.mouth_open_min_px),
                mouth_closed_max_px: Some(cfg.mouth_closed_max_px),
            }),
            holds: Some(HoldsFile {
                pill_on_tongue: Some(cfg.pill_on_tongue_hold),
                concealment: Some(cfg.concealment_hold),
                final_confirmation: Some(cfg.final_confirmation_hold),
            }),
            guardrail: Some(GuardrailFile {
                face_loss_limit: Some(cfg.face_loss_limit),
            }),
        }
    }
}

fn read_config_file(path: &Path) -> Result<ProtocolConfigFile> {
    let raw = std::fs::read_to_string(path).map_err(|source| DoseError::ConfigRead {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&raw).map_err(|source| DoseError::ConfigParse {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_reference_configuration() {
        let cfg = ProtocolConfig::default();
        assert_eq!(cfg.pill_in_hand_min, 0.5);
        assert_eq!(cfg.pill_on_tongue_hold, 15);
        assert_eq!(cfg.concealment_hold, 15);
        assert_eq!(cfg.final_confirmation_hold, 20);
        assert_eq!(cfg.face_loss_limit, 30);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let cfg = ProtocolConfig::from_toml_str("[holds]\nfinal_confirmation = 40\n").unwrap();
        assert_eq!(cfg.final_confirmation_hold, 40);
        assert_eq!(cfg.pill_on_tongue_hold, 15);
        assert_eq!(cfg.tongue_min, 0.4);
    }

    #[test]
    fn test_threshold_out_of_range_rejected() {
        let err = ProtocolConfig::from_toml_str("[thresholds]\ntongue_min = 1.5\n").unwrap_err();
        assert!(matches!(err, DoseError::ThresholdOutOfRange { name: "tongue_min", .. }));
    }

    #[test]
    fn test_zero_hold_rejected() {
        let err = ProtocolConfig::from_toml_str("[holds]\nconcealment = 0\n").unwrap_err();
        assert!(matches!(err, DoseError::ZeroFrameCount { name: "concealment_hold" }));
    }

    #[test]
    fn test_overlapping_jaw_limits_rejected() {
        let err = ProtocolConfig::from_toml_str("[jaw]\nmouth_closed_max_px = 25.0\n").unwrap_err();
        assert!(matches!(err, DoseError::JawLimitsOverlap { .. }));
    }

    #[test]
    fn test_unknown_field_rejected() {
        assert!(ProtocolConfig::from_toml_str("[holds]\nbogus = 3\n").is_err());
    }

    #[test]
    fn test_toml_rendering_round_trips() {
        let mut cfg = ProtocolConfig::default();
        cfg.face_loss_limit = 45;
        cfg.mouth_open_min_px = 18.5;
        let parsed = ProtocolConfig::from_toml_str(&cfg.to_toml_string().unwrap()).unwrap();
        assert_eq!(parsed, cfg);
    }

    #[test]
    fn test_toml_rendering_uses_file_layout() {
        let rendered = ProtocolConfig::default().to_toml_string().unwrap();
        for section in ["[thresholds]", "[jaw]", "[holds]", "[guardrail]"] {
            assert!(rendered.contains(section), "missing {}", section);
        }
        assert!(rendered.contains("final_confirmation = 20"));
        assert!(rendered.contains("mouth_closed_max_px = 5.0"));
        assert!(!rendered.contains("final_confirmation_hold"));
    }

    #[test]
    fn test_hold_targets_per_phase() {
        let cfg = ProtocolConfig::default();
        assert_eq!(cfg.hold_target(Phase::PillInHand), None);
        assert_eq!(cfg.hold_target(Phase::PillOnTongue), Some(15));
        assert_eq!(cfg.hold_target(Phase::MouthClosed), Some(15));
        assert_eq!(cfg.hold_target(Phase::Recheck), None);
        assert_eq!(cfg.hold_target(Phase::SwallowCheck), Some(20));
    }
}
