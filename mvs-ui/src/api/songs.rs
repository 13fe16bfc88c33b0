//! Song endpoints
//!
//! Song and image listings are proxied from the orchestrator. Lyrics
//! sectioning and the lyrics-driven workflows start here.

use super::JobAccepted;
use crate::{ApiResult, AppState};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use mvs_common::lyrics::{parse_sections_with, sort_canonical, LyricsSection, RepeatPolicy};
use mvs_common::models::{ImageRecord, Song};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Lyrics supplied by the browser; falls back to the song's stored lyrics
#[derive(Debug, Default, Deserialize)]
pub struct LyricsRequest {
    #[serde(default)]
    pub lyrics: Option<String>,
    /// Sectioning policy for the preview only
    #[serde(default)]
    pub policy: RepeatPolicy,
}

#[derive(Debug, Serialize)]
pub struct SectionsResponse {
    pub song_id: i64,
    /// Source order, as images will be created
    pub sections: Vec<LyricsSection>,
    /// Display order (intro, verse, pre-chorus, chorus, bridge, final chorus, outro)
    pub canonical: Vec<LyricsSection>,
}

/// GET /api/songs
pub async fn list_songs(State(state): State<AppState>) -> ApiResult<Json<Vec<Song>>> {
    let songs = state.clients.current().await.list_songs().await?;
    Ok(Json(songs))
}

/// GET /api/songs/:id
pub async fn get_song(
    State(state): State<AppState>,
    Path(song_id): Path<i64>,
) -> ApiResult<Json<Song>> {
    let song = state.clients.current().await.get_song(song_id).await?;
    Ok(Json(song))
}

/// GET /api/songs/:id/images
pub async fn list_images(
    State(state): State<AppState>,
    Path(song_id): Path<i64>,
) -> ApiResult<Json<Vec<ImageRecord>>> {
    let images = state.clients.current().await.list_images(song_id).await?;
    Ok(Json(images))
}

/// POST /api/songs/:id/sections
///
/// Preview how lyrics will be split. No orchestrator writes.
pub async fn preview_sections(
    State(state): State<AppState>,
    Path(song_id): Path<i64>,
    Json(request): Json<LyricsRequest>,
) -> ApiResult<Json<SectionsResponse>> {
    let lyrics = resolve_lyrics(&state, song_id, request.lyrics).await?;

    let sections = parse_sections_with(&lyrics, request.policy);
    if sections.is_empty() {
        return Err(mvs_common::Error::NoSections.into());
    }

    let mut canonical = sections.clone();
    sort_canonical(&mut canonical);

    Ok(Json(SectionsResponse {
        song_id,
        sections,
        canonical,
    }))
}

/// POST /api/songs/:id/images/from-lyrics
pub async fn generate_from_lyrics(
    State(state): State<AppState>,
    Path(song_id): Path<i64>,
    Json(request): Json<LyricsRequest>,
) -> ApiResult<(StatusCode, Json<JobAccepted>)> {
    let lyrics = resolve_lyrics(&state, song_id, request.lyrics).await?;
    let job_id = state
        .workflow
        .start_generate_from_lyrics(song_id, &lyrics)
        .await?;

    info!(song_id, job_id = %job_id, "Lyrics image generation accepted");
    Ok((StatusCode::ACCEPTED, Json(JobAccepted { job_id })))
}

/// POST /api/songs/:id/images/generate-missing
///
/// 202 with a job id, or 200 with `null` when nothing is missing.
pub async fn generate_missing(
    State(state): State<AppState>,
    Path(song_id): Path<i64>,
) -> ApiResult<(StatusCode, Json<Option<JobAccepted>>)> {
    match state.workflow.start_generate_missing(song_id).await? {
        Some(job_id) => Ok((StatusCode::ACCEPTED, Json(Some(JobAccepted { job_id })))),
        None => Ok((StatusCode::OK, Json(None))),
    }
}

async fn resolve_lyrics(
    state: &AppState,
    song_id: i64,
    provided: Option<String>,
) -> ApiResult<String> {
    if let Some(lyrics) = provided {
        return Ok(lyrics);
    }

    let song = state.clients.current().await.get_song(song_id).await?;
    Ok(song.lyrics.unwrap_or_default())
}

/// Build song routes
pub fn song_routes() -> Router<AppState> {
    Router::new()
        .route("/api/songs", get(list_songs))
        .route("/api/songs/:id", get(get_song))
        .route("/api/songs/:id/images", get(list_images))
        .route("/api/songs/:id/sections", post(preview_sections))
        .route("/api/songs/:id/images/from-lyrics", post(generate_from_lyrics))
        .route(
            "/api/songs/:id/images/generate-missing",
            post(generate_missing),
        )
}
