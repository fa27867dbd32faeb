//! Thread lifecycle HTTP handlers.
//!
//! Endpoints:
//! - POST   /api/v1/threads              - Start a new thread
//! - POST   /api/v1/threads/{id}/resume  - Feed input into a suspended thread
//! - GET    /api/v1/threads/{id}         - Get a thread's checkpoint
//! - GET    /api/v1/threads              - List recent threads
//! - DELETE /api/v1/threads/{id}         - Discard a thread

use std::time::Instant;

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

use queryloom_core::engine::executor::ExecutionResult;
use queryloom_types::checkpoint::Checkpoint;

use crate::http::error::AppError;
use crate::http::extractors::auth::Authenticated;
use crate::http::response::ApiResponse;
use crate::state::AppState;

/// Body for starting a new thread.
#[derive(Debug, Deserialize)]
pub struct StartThreadBody {
    /// The natural-language question to answer.
    pub request: String,

    /// Optional caller-supplied thread id; conflicts with an active thread
    /// are rejected with 409. Omit to have one minted.
    #[serde(default)]
    pub thread_id: Option<Uuid>,
}

/// Body for resuming a suspended thread.
#[derive(Debug, Deserialize)]
pub struct ResumeThreadBody {
    /// Reviewer input: "1"/"2"/"3", a cancel word, or free-form feedback.
    pub input: String,
}

/// Query parameters for thread listing.
#[derive(Debug, Deserialize)]
pub struct ThreadListQuery {
    #[serde(default = "default_limit")]
    pub limit: u32,
}

fn default_limit() -> u32 {
    50
}

/// Parse a UUID from a path parameter, returning a 400 error on invalid format.
fn parse_uuid(s: &str) -> Result<Uuid, AppError> {
    s.parse::<Uuid>()
        .map_err(|_| AppError::Validation(format!("Invalid thread id: {s}")))
}

/// POST /api/v1/threads - Start a new thread and walk until it stops.
pub async fn start_thread(
    State(state): State<AppState>,
    _auth: Authenticated,
    Json(body): Json<StartThreadBody>,
) -> Result<ApiResponse<ExecutionResult>, AppError> {
    let start = Instant::now();
    let request_id = Uuid::now_v7().to_string();

    let result = state.session.start(body.thread_id, &body.request).await?;

    let elapsed = start.elapsed().as_millis() as u64;

    let thread_id = result.thread_id;
    Ok(ApiResponse::success(result, request_id, elapsed)
        .with_link("self", &format!("/api/v1/threads/{thread_id}"))
        .with_link("resume", &format!("/api/v1/threads/{thread_id}/resume")))
}

/// POST /api/v1/threads/{id}/resume - Feed reviewer input into a suspended thread.
pub async fn resume_thread(
    State(state): State<AppState>,
    _auth: Authenticated,
    Path(thread_id): Path<String>,
    Json(body): Json<ResumeThreadBody>,
) -> Result<ApiResponse<ExecutionResult>, AppError> {
    let start = Instant::now();
    let request_id = Uuid::now_v7().to_string();

    let tid = parse_uuid(&thread_id)?;
    let result = state.session.resume(tid, &body.input).await?;

    let elapsed = start.elapsed().as_millis() as u64;

    Ok(ApiResponse::success(result, request_id, elapsed)
        .with_link("self", &format!("/api/v1/threads/{tid}"))
        .with_link("resume", &format!("/api/v1/threads/{tid}/resume")))
}

/// GET /api/v1/threads/{id} - Get a thread's current checkpoint.
pub async fn get_thread(
    State(state): State<AppState>,
    _auth: Authenticated,
    Path(thread_id): Path<String>,
) -> Result<ApiResponse<Checkpoint>, AppError> {
    let start = Instant::now();
    let request_id = Uuid::now_v7().to_string();

    let tid = parse_uuid(&thread_id)?;
    let checkpoint = state.session.status(tid).await?;

    let elapsed = start.elapsed().as_millis() as u64;

    Ok(ApiResponse::success(checkpoint, request_id, elapsed)
        .with_link("self", &format!("/api/v1/threads/{tid}"))
        .with_link("resume", &format!("/api/v1/threads/{tid}/resume")))
}

/// GET /api/v1/threads - List the most recently updated threads.
pub async fn list_threads(
    State(state): State<AppState>,
    _auth: Authenticated,
    Query(query): Query<ThreadListQuery>,
) -> Result<ApiResponse<Vec<Checkpoint>>, AppError> {
    let start = Instant::now();
    let request_id = Uuid::now_v7().to_string();

    let threads = state.session.list(query.limit).await?;

    let elapsed = start.elapsed().as_millis() as u64;

    Ok(ApiResponse::success(threads, request_id, elapsed).with_link("self", "/api/v1/threads"))
}

/// DELETE /api/v1/threads/{id} - Discard a thread's checkpoint.
pub async fn delete_thread(
    State(state): State<AppState>,
    _auth: Authenticated,
    Path(thread_id): Path<String>,
) -> Result<ApiResponse<serde_json::Value>, AppError> {
    let start = Instant::now();
    let request_id = Uuid::now_v7().to_string();

    let tid = parse_uuid(&thread_id)?;
    state.session.discard(tid).await?;

    let elapsed = start.elapsed().as_millis() as u64;

    Ok(ApiResponse::success(
        serde_json::json!({"deleted": true, "thread_id": tid.to_string()}),
        request_id,
        elapsed,
    ))
}
