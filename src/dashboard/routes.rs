use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::configstore::ConfigKind;

use super::DashboardState;

pub async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok", "name": "peterbot", "ts": chrono::Utc::now().timestamp_millis() }))
}

#[derive(Debug, Deserialize)]
pub struct VerifyAuthRequest {
    password: String,
}

pub async fn verify_auth(State(state): State<DashboardState>, Json(req): Json<VerifyAuthRequest>) -> impl IntoResponse {
    Json(json!({ "valid": req.password == state.dashboard_password.as_ref() }))
}

pub async fn list_jobs(State(state): State<DashboardState>) -> impl IntoResponse {
    match state.store.list_jobs_by_chat(state.authorized_chat, 100) {
        Ok(jobs) => {
            let total = jobs.len();
            (StatusCode::OK, Json(json!({ "jobs": jobs, "total": total }))).into_response()
        }
        Err(e) => {
            tracing::error!(error = %e, "failed to list jobs for dashboard");
            (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": "storage failure" }))).into_response()
        }
    }
}

pub async fn get_job(State(state): State<DashboardState>, Path(id): Path<String>) -> impl IntoResponse {
    match state.store.get_job(&id) {
        Ok(Some(job)) => (StatusCode::OK, Json(json!({ "job": job }))).into_response(),
        Ok(None) => (StatusCode::NOT_FOUND, Json(json!({ "error": "not found" }))).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "failed to fetch job for dashboard");
            (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": "storage failure" }))).into_response()
        }
    }
}

pub async fn cancel_job(State(state): State<DashboardState>, Path(id): Path<String>) -> impl IntoResponse {
    match state.store.cancel_job(&id) {
        Ok(true) => (StatusCode::OK, Json(json!({ "cancelled": true }))).into_response(),
        Ok(false) => (StatusCode::CONFLICT, Json(json!({ "error": "job is not cancellable" }))).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "failed to cancel job");
            (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": "storage failure" }))).into_response()
        }
    }
}

#[derive(Debug, Serialize)]
struct ConfigDocumentResponse {
    content: String,
    last_modified: i64,
    size: u64,
}

#[derive(Debug, Deserialize)]
pub struct PutConfigRequest {
    content: String,
}

fn read_config(state: &DashboardState, kind: ConfigKind) -> impl IntoResponse {
    match state.config.read(kind) {
        Ok(doc) => {
            let body = ConfigDocumentResponse { content: doc.content, last_modified: doc.last_modified_ms, size: doc.size_bytes };
            (StatusCode::OK, Json(body)).into_response()
        }
        Err(e) => {
            tracing::error!(error = %e, "failed to read config document");
            (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": "io failure" }))).into_response()
        }
    }
}

fn write_config(state: &DashboardState, kind: ConfigKind, content: &str) -> impl IntoResponse {
    match state.config.write(kind, content) {
        Ok(()) => (StatusCode::OK, Json(json!({ "ok": true }))).into_response(),
        Err(e) => (StatusCode::BAD_REQUEST, Json(json!({ "error": e.to_string() }))).into_response(),
    }
}

pub async fn get_soul(State(state): State<DashboardState>) -> impl IntoResponse {
    read_config(&state, ConfigKind::Soul)
}

pub async fn put_soul(State(state): State<DashboardState>, Json(req): Json<PutConfigRequest>) -> impl IntoResponse {
    write_config(&state, ConfigKind::Soul, &req.content)
}

pub async fn get_memory(State(state): State<DashboardState>) -> impl IntoResponse {
    read_config(&state, ConfigKind::Memory)
}

pub async fn put_memory(State(state): State<DashboardState>, Json(req): Json<PutConfigRequest>) -> impl IntoResponse {
    write_config(&state, ConfigKind::Memory, &req.content)
}

pub async fn get_blocklist(State(state): State<DashboardState>) -> impl IntoResponse {
    read_config(&state, ConfigKind::Blocklist)
}

pub async fn put_blocklist(State(state): State<DashboardState>, Json(req): Json<PutConfigRequest>) -> impl IntoResponse {
    write_config(&state, ConfigKind::Blocklist, &req.content)
}
