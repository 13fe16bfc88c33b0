//! Background job endpoints

use crate::{ApiError, ApiResult, AppState};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get},
    Json, Router,
};
use mvs_common::jobs::JobRecord;
use serde::Serialize;
use tracing::info;

#[derive(Debug, Serialize)]
pub struct JobsResponse {
    /// Job ids and image ids currently busy
    pub in_progress: Vec<String>,
    /// Recent jobs, newest first
    pub jobs: Vec<JobRecord>,
}

/// GET /api/jobs
pub async fn list_jobs(State(state): State<AppState>) -> Json<JobsResponse> {
    Json(JobsResponse {
        in_progress: state.jobs.in_progress().await,
        jobs: state.jobs.snapshot().await,
    })
}

/// DELETE /api/jobs/:id
///
/// Cancels a running job. The job reports `cancelled` once its poller
/// observes the token.
pub async fn cancel_job(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> ApiResult<StatusCode> {
    if state.jobs.cancel(&job_id).await {
        info!(job_id = %job_id, "Job cancellation requested");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound(format!("No running job {}", job_id)))
    }
}

/// Build job routes
pub fn job_routes() -> Router<AppState> {
    Router::new()
        .route("/api/jobs", get(list_jobs))
        .route("/api/jobs/:id", delete(cancel_job))
}
