//! Render queue endpoint

use crate::{ApiResult, AppState};
use axum::{extract::State, routing::get, Json, Router};
use mvs_common::models::QueueItem;

/// GET /api/queue
///
/// Orchestrator queue listing with the latest streamed progress overlaid.
pub async fn list_queue(State(state): State<AppState>) -> ApiResult<Json<Vec<QueueItem>>> {
    let mut items = state.clients.current().await.list_queue().await?;
    state.progress.merge_into(&mut items).await;
    Ok(Json(items))
}

/// Build queue routes
pub fn queue_routes() -> Router<AppState> {
    Router::new().route("/api/queue", get(list_queue))
}
