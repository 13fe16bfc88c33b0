//! Single-image endpoints

use super::JobAccepted;
use crate::{ApiResult, AppState};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct RegenerateQuery {
    /// Song owning the image; its image list is what gets polled
    pub song_id: i64,
}

/// POST /api/images/:id/regenerate?song_id=
///
/// 409 while the same image is already regenerating.
pub async fn regenerate_image(
    State(state): State<AppState>,
    Path(image_id): Path<i64>,
    Query(query): Query<RegenerateQuery>,
) -> ApiResult<(StatusCode, Json<JobAccepted>)> {
    let job_id = state
        .workflow
        .start_regenerate(query.song_id, image_id)
        .await?;
    Ok((StatusCode::ACCEPTED, Json(JobAccepted { job_id })))
}

/// Build image routes
pub fn image_routes() -> Router<AppState> {
    Router::new().route("/api/images/:id/regenerate", post(regenerate_image))
}
