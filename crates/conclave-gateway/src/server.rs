//! The Supervisor's thin HTTP surface (spec §1: "does not standardize a CLI" — this
//! is the donor's own axum wiring, trimmed to the operations the Tree Lifecycle
//! Controller actually exposes: create a root Task/Agent, read status, pause,
//! restore). Grounded on the donor's `server.rs::start_gateway` route table,
//! stripped of the chat WebSocket, the HTML console, and the "bee" swarm-protocol
//! endpoints — none of which spec §1 names as core surface.

use crate::auth::ResolvedAuth;
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{http::StatusCode, Json, Router};
use conclave_core::model::{Task, TaskStatus};
use conclave_core::{Error, TaskId};
use conclave_tree::PersistedAgentLoader;
use serde::Deserialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

use crate::wiring::Supervisor;

pub struct AppState {
    pub auth: ResolvedAuth,
    pub supervisor: Supervisor,
}

#[derive(Deserialize)]
pub struct CreateTaskRequest {
    pub prompt: String,
    pub profile_name: String,
}

fn auth_error(e: Error) -> (StatusCode, Json<serde_json::Value>) {
    (StatusCode::UNAUTHORIZED, Json(serde_json::json!({ "error": e.to_string() })))
}

fn api_error(e: Error) -> (StatusCode, Json<serde_json::Value>) {
    let status = if e.is_authorization() {
        StatusCode::FORBIDDEN
    } else if e.is_budget_denial() {
        StatusCode::PAYMENT_REQUIRED
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };
    (status, Json(serde_json::json!({ "error": e.to_string() })))
}

/// `Authorization: Bearer <token>` per the donor's own scheme in `ws.rs`'s
/// handshake, generalized from a per-connection token check to a per-request one.
fn bearer_token(headers: &axum::http::HeaderMap) -> Option<&str> {
    headers.get(axum::http::header::AUTHORIZATION)?.to_str().ok()?.strip_prefix("Bearer ")
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/tasks", post(create_task_handler))
        .route("/tasks/{task_id}", get(get_task_handler))
        .route("/tasks/{task_id}/pause", post(pause_task_handler))
        .route("/tasks/{task_id}/restore", post(restore_task_handler))
        .layer(tower_http::cors::CorsLayer::new().allow_origin(tower_http::cors::Any).allow_methods(tower_http::cors::Any))
        .with_state(state)
}

async fn health_handler(State(_state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(serde_json::json!({ "status": "healthy", "version": env!("CARGO_PKG_VERSION") }))
}

async fn create_task_handler(
    State(state): State<Arc<AppState>>,
    headers: axum::http::HeaderMap,
    Json(body): Json<CreateTaskRequest>,
) -> impl IntoResponse {
    if let Err(e) = state.auth.verify_token(bearer_token(&headers)) {
        return auth_error(e).into_response();
    }

    let task = Task::new(body.prompt.clone(), body.profile_name.clone());
    let task_id = task.id.clone();
    state.supervisor.store.put_task(task.clone());

    match state.supervisor.tree.boot_root(&task_id, &body.profile_name, body.prompt).await {
        Ok(root_id) => Json(serde_json::json!({ "task_id": task_id.as_str(), "root_agent_id": root_id.as_str() })).into_response(),
        Err(e) => {
            // root agent never started: the Task record is already committed, so mark
            // it failed instead of leaving it dangling (spec §7 "user-visible failures").
            let mut failed_task = task;
            failed_task.fail(e.to_string());
            state.supervisor.store.put_task(failed_task);
            api_error(e).into_response()
        }
    }
}

async fn get_task_handler(State(state): State<Arc<AppState>>, Path(task_id): Path<String>, headers: axum::http::HeaderMap) -> impl IntoResponse {
    if let Err(e) = state.auth.verify_token(bearer_token(&headers)) {
        return auth_error(e).into_response();
    }
    let task_id = TaskId::from_str(task_id);
    match state.supervisor.store.load_task(&task_id).await {
        Ok(task) => Json(task_json(&task)).into_response(),
        Err(_) => (StatusCode::NOT_FOUND, Json(serde_json::json!({ "error": "task not found" }))).into_response(),
    }
}

fn task_json(task: &Task) -> serde_json::Value {
    serde_json::json!({
        "id": task.id.as_str(),
        "prompt": task.prompt,
        "status": match task.status {
            TaskStatus::Running => "running",
            TaskStatus::Pausing => "pausing",
            TaskStatus::Paused => "paused",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
        },
        "error_message": task.error_message,
    })
}

async fn pause_task_handler(State(state): State<Arc<AppState>>, Path(task_id): Path<String>, headers: axum::http::HeaderMap) -> impl IntoResponse {
    if let Err(e) = state.auth.verify_token(bearer_token(&headers)) {
        return auth_error(e).into_response();
    }
    let task_id = TaskId::from_str(task_id);
    match state.supervisor.tree.pause_task(&task_id).await {
        Ok(()) => Json(serde_json::json!({ "status": "pausing" })).into_response(),
        Err(e) => api_error(e).into_response(),
    }
}

async fn restore_task_handler(State(state): State<Arc<AppState>>, Path(task_id): Path<String>, headers: axum::http::HeaderMap) -> impl IntoResponse {
    if let Err(e) = state.auth.verify_token(bearer_token(&headers)) {
        return auth_error(e).into_response();
    }
    let task_id = TaskId::from_str(task_id);
    match state.supervisor.tree.restore_task(&task_id).await {
        Ok(root_id) => Json(serde_json::json!({ "root_agent_id": root_id.as_str() })).into_response(),
        Err(e) => api_error(e).into_response(),
    }
}

pub async fn serve(bind_addr: SocketAddr, state: Arc<AppState>) -> anyhow::Result<()> {
    info!("Conclave Supervisor listening on {bind_addr}");
    state.supervisor.tree.boot_revival().await;
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
