//! mvs-ui library interface
//!
//! Exposes the router and shared state for integration testing.

pub mod api;
pub mod error;
pub mod services;

pub use crate::error::{ApiError, ApiResult};

use axum::Router;
use chrono::{DateTime, Utc};
use mvs_common::events::EventBus;
use mvs_common::jobs::JobTracker;
use services::{ClientHandle, ImageWorkflow, OrchestratorClient, ProgressBoard, SettingsStore};
use tower_http::trace::TraceLayer;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Persisted settings, rewritten only on PUT /api/settings
    pub settings: SettingsStore,
    /// Orchestrator client, replaced when the host setting changes
    pub clients: ClientHandle,
    /// Event bus for SSE broadcasting
    pub event_bus: EventBus,
    /// In-progress jobs and their cancellation tokens
    pub jobs: JobTracker,
    /// Latest render progress per queue item
    pub progress: ProgressBoard,
    pub workflow: ImageWorkflow,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(settings: SettingsStore, client: OrchestratorClient, event_bus: EventBus) -> Self {
        let clients = ClientHandle::new(client);
        let jobs = JobTracker::new(event_bus.clone());
        let workflow = ImageWorkflow::new(
            clients.clone(),
            settings.clone(),
            jobs.clone(),
            event_bus.clone(),
        );

        Self {
            settings,
            clients,
            event_bus,
            jobs,
            progress: ProgressBoard::new(),
            workflow,
            startup_time: Utc::now(),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::routing::get;

    Router::new()
        .route("/events", get(api::event_stream))
        .merge(api::song_routes())
        .merge(api::image_routes())
        .merge(api::job_routes())
        .merge(api::queue_routes())
        .merge(api::settings_routes())
        .merge(api::health_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
