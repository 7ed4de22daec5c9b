//! HTTP + WebSocket API for DoseWatch
//!
//! Endpoints:
//! - POST /session/new - Create session
//! - GET /session/{id} - Get session status
//! - POST /session/{id}/frame - Apply one frame
//! - POST /session/{id}/control - START / STOP / RESET
//! - DELETE /session/{id} - Remove session
//! - WS /ws/{id} - Live updates
//! - GET /config - Active protocol configuration
//! - GET /health - Health check

use axum::{
    extract::{
        ws::{Message, WebSocket},
        Path, State, WebSocketUpgrade,
    },
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, info, warn};

use crate::config::ProtocolConfig;
use crate::core::session::{ComplianceSession, ControlCommand, SessionSummary, StepResult};
use crate::error::DoseError;
use crate::types::{FrameInput, ProtocolStateView};

/// Session entry: the run plus its live-update channel
#[derive(Debug)]
pub struct SessionEntry {
    pub session: ComplianceSession,
    pub update_tx: broadcast::Sender<SessionUpdate>,
}

/// Live update message
#[derive(Debug, Clone, Serialize)]
pub struct SessionUpdate {
    pub session_id: String,
    pub state: ProtocolStateView,
    /// Run became terminal on this update
    pub completed: bool,
}

/// App state
///
/// Each session's machine is mutated only under the write lock, so `step`
/// and `reset` never interleave and readers see whole snapshots.
pub struct AppState {
    pub sessions: RwLock<HashMap<String, SessionEntry>>,
    pub config: Arc<ProtocolConfig>,
}

/// Create new session request
#[derive(Debug, Deserialize)]
pub struct NewSessionRequest {
    pub patient_id: String,
    pub session_id: Option<String>,
}

/// Create new session response
#[derive(Debug, Serialize)]
pub struct NewSessionResponse {
    pub session_id: String,
    pub websocket_url: String,
    pub state: ProtocolStateView,
}

/// Control request
#[derive(Debug, Deserialize)]
pub struct ControlRequest {
    pub command: ControlCommand,
}

/// Control response
#[derive(Debug, Serialize)]
pub struct ControlResponse {
    pub session_id: String,
    pub command: ControlCommand,
    pub active: bool,
    pub state: ProtocolStateView,
}

/// Error body for rejected requests
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Health response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub sessions_active: usize,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (status, Json(ErrorResponse { error: message.into() }))
}

fn not_found(id: &str) -> ApiError {
    api_error(StatusCode::NOT_FOUND, format!("session {} not found", id))
}

/// Create the API router
pub fn create_router(config: Arc<ProtocolConfig>) -> Router {
    let state = Arc::new(AppState {
        sessions: RwLock::new(HashMap::new()),
        config,
    });

    Router::new()
        .route("/health", get(health))
        .route("/config", get(get_config))
        .route("/session/new", post(create_session))
        .route("/session/:id", get(get_session).delete(delete_session))
        .route("/session/:id/frame", post(process_frame))
        .route("/session/:id/control", post(control_session))
        .route("/ws/:id", get(websocket_handler))
        .with_state(state)
}

/// Health check endpoint
async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let sessions = state.sessions.read().await;
    Json(HealthResponse {
        status: "ok".to_string(),
        version: crate::VERSION.to_string(),
        sessions_active: sessions.values().filter(|e| e.session.is_active()).count(),
    })
}

/// Active protocol configuration
async fn get_config(State(state): State<Arc<AppState>>) -> Json<ProtocolConfig> {
    Json(state.config.as_ref().clone())
}

/// Create new session
async fn create_session(
    State(state): State<Arc<AppState>>,
    Json(req): Json<NewSessionRequest>,
) -> Result<Json<NewSessionResponse>, ApiError> {
    if req.patient_id.trim().is_empty() {
        return Err(api_error(StatusCode::UNPROCESSABLE_ENTITY, "patient_id must not be empty"));
    }
    let session_id = req.session_id.unwrap_or_else(generate_session_id);

    let mut sessions = state.sessions.write().await;
    if sessions.contains_key(&session_id) {
        return Err(api_error(
            StatusCode::CONFLICT,
            format!("session {} already exists", session_id),
        ));
    }

    let session = ComplianceSession::new(session_id.clone(), req.patient_id, state.config.clone());
    let view = session.current_state();
    let (tx, _) = broadcast::channel(100);
    sessions.insert(
        session_id.clone(),
        SessionEntry {
            session,
            update_tx: tx,
        },
    );

    Ok(Json(NewSessionResponse {
        websocket_url: format!("/ws/{}", session_id),
        session_id,
        state: view,
    }))
}

/// Get session status
async fn get_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<SessionSummary>, ApiError> {
    let sessions = state.sessions.read().await;
    let entry = sessions.get(&id).ok_or_else(|| not_found(&id))?;
    Ok(Json(entry.session.summary()))
}

/// Apply one frame of detector + landmark output
async fn process_frame(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(frame): Json<FrameInput>,
) -> Result<Json<StepResult>, ApiError> {
    let mut sessions = state.sessions.write().await;
    let entry = sessions.get_mut(&id).ok_or_else(|| not_found(&id))?;

    let result = entry.session.process_frame(&frame).map_err(|e| match e {
        DoseError::SessionStopped(_) => api_error(StatusCode::CONFLICT, e.to_string()),
        other => api_error(StatusCode::UNPROCESSABLE_ENTITY, other.to_string()),
    })?;

    // No subscribers is fine
    let _ = entry.update_tx.send(SessionUpdate {
        session_id: id,
        state: result.state.clone(),
        completed: result.completed,
    });

    Ok(Json(result))
}

/// Dispatch a control command
async fn control_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<ControlRequest>,
) -> Result<Json<ControlResponse>, ApiError> {
    let mut sessions = state.sessions.write().await;
    let entry = sessions.get_mut(&id).ok_or_else(|| not_found(&id))?;

    let view = entry.session.apply(req.command);
    let _ = entry.update_tx.send(SessionUpdate {
        session_id: id.clone(),
        state: view.clone(),
        completed: false,
    });

    Ok(Json(ControlResponse {
        session_id: id,
        command: req.command,
        active: entry.session.is_active(),
        state: view,
    }))
}

/// Remove a session, returning its final summary
async fn delete_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<SessionSummary>, ApiError> {
    let mut sessions = state.sessions.write().await;
    let entry = sessions.remove(&id).ok_or_else(|| not_found(&id))?;
    let summary = entry.session.summary();
    info!(
        session = %id,
        phase = summary.state.phase.number(),
        status = %summary.state.status,
        "session removed"
    );
    Ok(Json(summary))
}

/// WebSocket handler for live updates
async fn websocket_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    ws: WebSocketUpgrade,
) -> Result<impl IntoResponse, ApiError> {
    let sessions = state.sessions.read().await;
    let entry = sessions.get(&id).ok_or_else(|| not_found(&id))?;
    let rx = entry.update_tx.subscribe();
    drop(sessions);

    Ok(ws.on_upgrade(move |socket| async move {
        handle_websocket(socket, rx).await;
    }))
}

/// Forward updates until the client leaves or the session is dropped
async fn handle_websocket(socket: WebSocket, mut rx: broadcast::Receiver<SessionUpdate>) {
    let (mut sender, mut receiver) = socket.split();

    loop {
        tokio::select! {
            update = rx.recv() => {
                let update = match update {
                    Ok(update) => update,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "websocket subscriber lagging");
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                };
                let json = match serde_json::to_string(&update) {
                    Ok(json) => json,
                    Err(e) => {
                        warn!(error = %e, "failed to encode update");
                        continue;
                    }
                };
                if sender.send(Message::Text(json)).await.is_err() {
                    break;
                }
            }
            incoming = receiver.next() => {
                match incoming {
                    Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                    Some(Ok(_)) => {}
                }
            }
        }
    }
    debug!("websocket closed");
}

static SESSION_SEQ: AtomicU64 = AtomicU64::new(0);

/// Generate session ID; the sequence keeps same-tick IDs distinct
fn generate_session_id() -> String {
    let nanos = chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default();
    let seq = SESSION_SEQ.fetch_add(1, Ordering::Relaxed);
    format!("session_{:x}_{}", nanos as u64, seq)
}

/// Run the API server
pub async fn run_server(addr: &str, config: Arc<ProtocolConfig>) -> Result<(), DoseError> {
    let router = create_router(config);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "DoseWatch API listening");
    info!("  POST   /session/new          - Create session");
    info!("  GET    /session/:id          - Get status");
    info!("  POST   /session/:id/frame    - Apply frame");
    info!("  POST   /session/:id/control  - START / STOP / RESET");
    info!("  DELETE /session/:id          - Remove session");
    info!("  WS     /ws/:id               - Live updates");
    info!("  GET    /config               - Protocol configuration");
    info!("  GET    /health               - Health check");
    axum::serve(listener, router).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Detection, DetectionClass, FaceMeasurement, ProtocolStatus};
    use std::collections::HashSet;

    fn app_state() -> Arc<AppState> {
        Arc::new(AppState {
            sessions: RwLock::new(HashMap::new()),
            config: Arc::new(ProtocolConfig::default()),
        })
    }

    #[test]
    fn test_generated_ids_unique_within_a_tick() {
        let ids: HashSet<String> = (0..1000).map(|_| generate_session_id()).collect();
        assert_eq!(ids.len(), 1000);
    }

    #[tokio::test]
    async fn test_frames_broadcast_session_updates() {
        let state = app_state();
        let req = NewSessionRequest {
            patient_id: "p-1".to_string(),
            session_id: Some("s1".to_string()),
        };
        create_session(State(state.clone()), Json(req)).await.unwrap();
        let mut rx = state.sessions.read().await["s1"].update_tx.subscribe();

        let pill = FrameInput::new(
            vec![Detection::scored(DetectionClass::Pill, 0.9)],
            FaceMeasurement::lost(),
        );
        process_frame(State(state.clone()), Path("s1".to_string()), Json(pill))
            .await
            .unwrap();

        let update = rx.recv().await.unwrap();
        assert_eq!(update.session_id, "s1");
        assert_eq!(update.state.phase.number(), 2);
        assert!(!update.completed);

        let lost = FrameInput::new(vec![], FaceMeasurement::lost());
        for _ in 0..crate::FACE_LOSS_LIMIT {
            process_frame(State(state.clone()), Path("s1".to_string()), Json(lost.clone()))
                .await
                .unwrap();
        }

        let updates: Vec<SessionUpdate> = (0..crate::FACE_LOSS_LIMIT)
            .map(|_| rx.try_recv().unwrap())
            .collect();
        let last = updates.last().unwrap();
        assert!(last.completed);
        assert_eq!(last.state.status, ProtocolStatus::FatalFailure);
        assert_eq!(updates.iter().filter(|u| u.completed).count(), 1);
    }
}
