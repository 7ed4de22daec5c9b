//! Integration tests for configuration loading

use dosewatch::core::PhaseStateMachine;
use dosewatch::types::{Detection, DetectionClass, FaceMeasurement, Phase, ProtocolStatus};
use dosewatch::{DoseError, ProtocolConfig};
use pretty_assertions::assert_eq;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

fn write_config(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[test]
fn test_no_file_gives_reference_configuration() {
    let cfg = ProtocolConfig::load(None).unwrap();
    assert_eq!(cfg, ProtocolConfig::default());
}

#[test]
fn test_file_overrides_subset() {
    let file = write_config(
        "[thresholds]\npill_in_hand_min = 0.8\n\n[guardrail]\nface_loss_limit = 5\n",
    );
    let cfg = ProtocolConfig::load(Some(file.path())).unwrap();
    assert_eq!(cfg.pill_in_hand_min, 0.8);
    assert_eq!(cfg.face_loss_limit, 5);
    assert_eq!(cfg.final_confirmation_hold, 20);
}

#[test]
fn test_missing_file_is_read_error() {
    let err = ProtocolConfig::load(Some(Path::new("/nonexistent/dosewatch.toml"))).unwrap_err();
    assert!(matches!(err, DoseError::ConfigRead { .. }));
    assert!(err.to_string().contains("/nonexistent/dosewatch.toml"));
}

#[test]
fn test_malformed_file_is_parse_error() {
    let file = write_config("[holds\nconcealment = 3\n");
    let err = ProtocolConfig::load(Some(file.path())).unwrap_err();
    assert!(matches!(err, DoseError::ConfigParse { .. }));
}

#[test]
fn test_invalid_values_rejected_on_load() {
    let file = write_config("[thresholds]\nfinal_pill_max = -0.1\n");
    assert!(matches!(
        ProtocolConfig::load(Some(file.path())),
        Err(DoseError::ThresholdOutOfRange { name: "final_pill_max", .. })
    ));
}

#[test]
fn test_printed_config_loads_back() {
    let mut cfg = ProtocolConfig::default();
    cfg.concealment_hold = 42;
    let file = write_config(&cfg.to_toml_string().unwrap());
    assert_eq!(ProtocolConfig::load(Some(file.path())).unwrap(), cfg);
}

#[test]
fn test_loaded_config_drives_machine() {
    let file = write_config("[thresholds]\npill_in_hand_min = 0.8\n\n[guardrail]\nface_loss_limit = 3\n");
    let cfg = Arc::new(ProtocolConfig::load(Some(file.path())).unwrap());
    let mut machine = PhaseStateMachine::new(cfg);

    // 0.6 passes the reference threshold but not the configured one
    let view = machine.step(&[Detection::scored(DetectionClass::Pill, 0.6)], &FaceMeasurement::lost());
    assert_eq!(view.phase, Phase::PillInHand);

    machine.step(&[Detection::scored(DetectionClass::Pill, 0.85)], &FaceMeasurement::lost());
    for _ in 0..3 {
        machine.step(&[], &FaceMeasurement::lost());
    }
    assert_eq!(machine.state().status(), ProtocolStatus::FatalFailure);
}
