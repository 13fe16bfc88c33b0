//! Settings API
//!
//! GET returns the settings in effect. PUT validates, writes the TOML file
//! and, if the orchestrator host changed, swaps the orchestrator client.

use crate::services::OrchestratorClient;
use crate::{ApiResult, AppState};
use axum::{extract::State, routing::get, Json, Router};
use mvs_common::config::Settings;
use mvs_common::events::NotificationLevel;
use tracing::info;

/// GET /api/settings
pub async fn get_settings(State(state): State<AppState>) -> Json<Settings> {
    Json(state.settings.settings().await)
}

/// PUT /api/settings
///
/// **Errors:**
/// - 400 Bad Request: validation failed; nothing is written
/// - 500 Internal Server Error: TOML write failed
pub async fn put_settings(
    State(state): State<AppState>,
    Json(settings): Json<Settings>,
) -> ApiResult<Json<Settings>> {
    settings.validate()?;
    let client = OrchestratorClient::new(&settings.orchestrator_host)?;

    let previous_host = state.settings.settings().await.orchestrator_host;
    state.settings.save(settings.clone()).await?;

    if previous_host != settings.orchestrator_host {
        info!(
            from = %previous_host,
            to = %settings.orchestrator_host,
            "Orchestrator host changed"
        );
        state.clients.replace(client).await;
    }

    state
        .event_bus
        .notify(NotificationLevel::Success, "Settings saved");
    Ok(Json(settings))
}

/// Build settings routes
pub fn settings_routes() -> Router<AppState> {
    Router::new().route("/api/settings", get(get_settings).put(put_settings))
}
