//! HTTP API handlers for mvs-ui
//!
//! JSON REST for the browser plus one SSE stream of UI events.

pub mod health;
pub mod images;
pub mod jobs;
pub mod queue;
pub mod settings;
pub mod songs;
pub mod sse;

pub use health::health_routes;
pub use images::image_routes;
pub use jobs::job_routes;
pub use queue::queue_routes;
pub use settings::settings_routes;
pub use songs::song_routes;
pub use sse::event_stream;

use serde::Serialize;

/// Body of a 202 response for a started background job
#[derive(Debug, Serialize)]
pub struct JobAccepted {
    pub job_id: String,
}
