//! Integration tests for the HTTP API
//!
//! Router clones share one AppState, so a single router carries a session
//! across requests.

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use dosewatch::core::create_router;
use dosewatch::ProtocolConfig;
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;

fn create_test_router() -> Router {
    create_router(Arc::new(ProtocolConfig::default()))
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<&str>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

async fn new_session(app: &Router, id: &str) {
    let body = format!(r#"{{"patient_id": "p-1", "session_id": "{}"}}"#, id);
    let (status, _) = send(app, "POST", "/session/new", Some(&body)).await;
    assert_eq!(status, StatusCode::OK);
}

const PILL_FRAME: &str =
    r#"{"detections": [{"class": "pill", "confidence": 0.8}], "face": {"jaw_drop_px": 0, "landmarks_present": false}}"#;

#[tokio::test]
async fn test_health_endpoint() {
    let app = create_test_router();
    let (status, json) = send(&app, "GET", "/health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
    assert!(json["version"].is_string());
    assert_eq!(json["sessions_active"], 0);
}

#[tokio::test]
async fn test_create_session() {
    let app = create_test_router();
    let (status, json) = send(&app, "POST", "/session/new", Some(r#"{"patient_id": "p-7"}"#)).await;

    assert_eq!(status, StatusCode::OK);
    let id = json["session_id"].as_str().unwrap();
    assert!(!id.is_empty());
    assert_eq!(json["websocket_url"], format!("/ws/{}", id));
    assert_eq!(json["state"]["phase"], 1);
    assert_eq!(json["state"]["status"], "RUNNING");

    let (_, health) = send(&app, "GET", "/health", None).await;
    assert_eq!(health["sessions_active"], 1);
}

#[tokio::test]
async fn test_create_session_rejects_bad_requests() {
    let app = create_test_router();
    let (status, _) = send(&app, "POST", "/session/new", Some(r#"{"patient_id": "  "}"#)).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    new_session(&app, "dup").await;
    let (status, json) = send(
        &app,
        "POST",
        "/session/new",
        Some(r#"{"patient_id": "p-2", "session_id": "dup"}"#),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(json["error"].as_str().unwrap().contains("dup"));
}

#[tokio::test]
async fn test_session_not_found() {
    let app = create_test_router();

    let (status, _) = send(&app, "GET", "/session/nonexistent", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, "POST", "/session/nonexistent/frame", Some(PILL_FRAME)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(
        &app,
        "POST",
        "/session/nonexistent/control",
        Some(r#"{"command": "reset"}"#),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, "DELETE", "/session/nonexistent", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_frame_advances_session() {
    let app = create_test_router();
    new_session(&app, "s1").await;

    let (status, json) = send(&app, "POST", "/session/s1/frame", Some(PILL_FRAME)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["state"]["phase"], 2);
    assert_eq!(json["state"]["reason"], "R300_PHASE_ADVANCED");
    assert_eq!(json["confidences"]["pill"], 0.8);
    assert_eq!(json["completed"], false);

    let (status, json) = send(&app, "GET", "/session/s1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["patient_id"], "p-1");
    assert_eq!(json["active"], true);
    assert_eq!(json["state"]["phase"], 2);
    assert_eq!(json["state"]["frames_processed"], 1);
}

#[tokio::test]
async fn test_invalid_frame_rejected() {
    let app = create_test_router();
    new_session(&app, "s1").await;

    let bad = r#"{"detections": [{"class": "pill", "confidence": 1.5}], "face": {"jaw_drop_px": 0, "landmarks_present": false}}"#;
    let (status, json) = send(&app, "POST", "/session/s1/frame", Some(bad)).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(json["error"].is_string());

    // Rejected frames are not counted
    let (_, json) = send(&app, "GET", "/session/s1", None).await;
    assert_eq!(json["state"]["frames_processed"], 0);
    assert_eq!(json["state"]["phase"], 1);
}

#[tokio::test]
async fn test_control_reset_and_stop() {
    let app = create_test_router();
    new_session(&app, "s1").await;
    send(&app, "POST", "/session/s1/frame", Some(PILL_FRAME)).await;

    let (status, json) = send(&app, "POST", "/session/s1/control", Some(r#"{"command": "reset"}"#)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["command"], "reset");
    assert_eq!(json["active"], true);
    assert_eq!(json["state"]["phase"], 1);
    assert_eq!(json["state"]["reason"], "R000_RESET");

    let (status, json) = send(&app, "POST", "/session/s1/control", Some(r#"{"command": "stop"}"#)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["active"], false);

    let (status, _) = send(&app, "POST", "/session/s1/frame", Some(PILL_FRAME)).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (_, health) = send(&app, "GET", "/health", None).await;
    assert_eq!(health["sessions_active"], 0);

    let (status, json) = send(&app, "POST", "/session/s1/control", Some(r#"{"command": "start"}"#)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["active"], true);

    let (status, _) = send(&app, "POST", "/session/s1/frame", Some(PILL_FRAME)).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_delete_session() {
    let app = create_test_router();
    new_session(&app, "s1").await;

    let (status, json) = send(&app, "DELETE", "/session/s1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["session_id"], "s1");

    let (status, _) = send(&app, "GET", "/session/s1", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_config_endpoint() {
    let app = create_test_router();
    let (status, json) = send(&app, "GET", "/config", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["pill_in_hand_min"], 0.5);
    assert_eq!(json["final_confirmation_hold"], 20);
    assert_eq!(json["face_loss_limit"], 30);
}

#[tokio::test]
async fn test_fatal_frame_reports_completed_once() {
    let app = create_test_router();
    new_session(&app, "s1").await;
    send(&app, "POST", "/session/s1/frame", Some(PILL_FRAME)).await;

    let lost = r#"{"detections": [], "face": {"jaw_drop_px": 0, "landmarks_present": false}}"#;
    let mut completed = Vec::new();
    for _ in 0..(dosewatch::FACE_LOSS_LIMIT + 2) {
        let (status, json) = send(&app, "POST", "/session/s1/frame", Some(lost)).await;
        assert_eq!(status, StatusCode::OK);
        completed.push((json["completed"] == true, json["state"]["status"].clone()));
    }

    let fatal_index = dosewatch::FACE_LOSS_LIMIT as usize - 1;
    for (i, (done, status)) in completed.iter().enumerate() {
        assert_eq!(*done, i == fatal_index, "frame {}", i);
        if i >= fatal_index {
            assert_eq!(*status, "FATAL_FAILURE");
        } else {
            assert_eq!(*status, "RUNNING");
        }
    }
}

#[tokio::test]
async fn test_generated_session_ids_do_not_collide() {
    let app = create_test_router();
    let (first, a) = send(&app, "POST", "/session/new", Some(r#"{"patient_id": "p-1"}"#)).await;
    let (second, b) = send(&app, "POST", "/session/new", Some(r#"{"patient_id": "p-2"}"#)).await;

    assert_eq!(first, StatusCode::OK);
    assert_eq!(second, StatusCode::OK);
    assert_ne!(a["session_id"], b["session_id"]);
}
