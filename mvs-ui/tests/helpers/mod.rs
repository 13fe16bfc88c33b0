//! Test Helper Utilities
//!
//! In-process mock orchestrator plus state builders shared by the mvs-ui
//! integration tests.

#![allow(dead_code)]

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::sse::{Event, Sse},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use futures::stream::{self, Stream, StreamExt};
use mvs_common::config::{PollingSettings, Settings};
use mvs_common::events::{EventBus, UiEvent};
use mvs_common::jobs::{JobRecord, JobTracker};
use mvs_ui::services::{OrchestratorClient, SettingsStore};
use mvs_ui::AppState;
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::convert::Infallible;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast;

/// Orchestrator data and call log
#[derive(Default)]
pub struct MockData {
    pub songs: Vec<Value>,
    pub images: Vec<Value>,
    pub queue: Vec<Value>,
    /// Image listings left before a regenerated image gets its path
    pending: HashMap<i64, u32>,
    /// Images whose regeneration never finishes
    pub stuck: HashSet<i64>,
    /// "METHOD /path" of every request received
    pub calls: Vec<String>,
}

#[derive(Clone)]
pub struct MockOrchestrator {
    pub base_url: String,
    pub data: Arc<Mutex<MockData>>,
}

impl MockOrchestrator {
    /// Start a mock on an ephemeral port
    pub async fn start(data: MockData) -> Self {
        let data = Arc::new(Mutex::new(data));
        let shared = MockShared {
            data: Arc::clone(&data),
            render_after: 2,
        };

        let app = Router::new()
            .route("/songs", get(mock_list_songs))
            .route("/songs/:id", get(mock_get_song))
            .route("/songs/:id/images", get(mock_list_images).post(mock_create_image))
            .route("/images/:id/regenerate", post(mock_regenerate))
            .route("/images/generate-prompt", post(mock_generate_prompt))
            .route("/queue", get(mock_queue))
            .route("/progress/stream", get(mock_progress_stream))
            .with_state(shared);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url: format!("http://{}", addr),
            data,
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.data.lock().unwrap().calls.clone()
    }

    pub fn images(&self) -> Vec<Value> {
        self.data.lock().unwrap().images.clone()
    }
}

#[derive(Clone)]
struct MockShared {
    data: Arc<Mutex<MockData>>,
    /// Image listings a regenerated image stays empty for
    render_after: u32,
}

impl MockShared {
    fn log(&self, call: String) {
        self.data.lock().unwrap().calls.push(call);
    }
}

async fn mock_list_songs(State(mock): State<MockShared>) -> Json<Value> {
    mock.log("GET /songs".to_string());
    let songs = mock.data.lock().unwrap().songs.clone();
    let total = songs.len();
    Json(json!({ "items": songs, "total": total }))
}

async fn mock_get_song(State(mock): State<MockShared>, Path(id): Path<i64>) -> impl IntoResponse {
    mock.log(format!("GET /songs/{}", id));
    let data = mock.data.lock().unwrap();
    match data.songs.iter().find(|s| s["id"] == id) {
        Some(song) => (StatusCode::OK, Json(song.clone())),
        None => (StatusCode::NOT_FOUND, Json(json!({"detail": "Song not found"}))),
    }
}

async fn mock_list_images(State(mock): State<MockShared>, Path(song_id): Path<i64>) -> Json<Value> {
    mock.log(format!("GET /songs/{}/images", song_id));
    let mut data = mock.data.lock().unwrap();

    let mut finished = Vec::new();
    for (id, remaining) in data.pending.iter_mut() {
        *remaining = remaining.saturating_sub(1);
        if *remaining == 0 {
            finished.push(*id);
        }
    }
    for id in finished {
        data.pending.remove(&id);
        if let Some(image) = data.images.iter_mut().find(|i| i["id"] == id) {
            image["image_path"] = json!(format!("/renders/{}.png", id));
        }
    }

    let images: Vec<Value> = data
        .images
        .iter()
        .filter(|i| i["song_id"] == song_id)
        .cloned()
        .collect();
    Json(Value::Array(images))
}

async fn mock_create_image(
    State(mock): State<MockShared>,
    Path(song_id): Path<i64>,
    Json(body): Json<Value>,
) -> Json<Value> {
    mock.log(format!("POST /songs/{}/images", song_id));
    let mut data = mock.data.lock().unwrap();

    let id = data
        .images
        .iter()
        .filter_map(|i| i["id"].as_i64())
        .max()
        .unwrap_or(100)
        + 1;

    let mut image = body;
    image["id"] = json!(id);
    image["song_id"] = json!(song_id);
    image["image_path"] = json!("");
    data.images.push(image.clone());
    Json(image)
}

async fn mock_regenerate(State(mock): State<MockShared>, Path(id): Path<i64>) -> impl IntoResponse {
    mock.log(format!("POST /images/{}/regenerate", id));
    let mut data = mock.data.lock().unwrap();

    let Some(image) = data.images.iter_mut().find(|i| i["id"] == id) else {
        return (StatusCode::NOT_FOUND, Json(json!({"detail": "Image not found"})));
    };
    image["image_path"] = json!("");

    if !data.stuck.contains(&id) {
        data.pending.insert(id, mock.render_after);
    }
    (StatusCode::OK, Json(json!({"status": "queued"})))
}

async fn mock_generate_prompt(State(mock): State<MockShared>, Json(body): Json<Value>) -> Json<Value> {
    mock.log("POST /images/generate-prompt".to_string());
    Json(json!({
        "prompt": format!(
            "{} {} scene: {}",
            body["genre"].as_str().unwrap_or_default(),
            body["section_type"].as_str().unwrap_or_default(),
            body["lyrics"].as_str().unwrap_or_default()
        ),
        "negative_prompt": ""
    }))
}

async fn mock_queue(State(mock): State<MockShared>) -> Json<Value> {
    mock.log("GET /queue".to_string());
    let queue = mock.data.lock().unwrap().queue.clone();
    Json(json!({ "queue": queue }))
}

async fn mock_progress_stream(
    State(mock): State<MockShared>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    mock.log("GET /progress/stream".to_string());
    let update = json!({
        "queue_id": 1,
        "status": "rendering",
        "progress": 42.5,
        "current_step": "compositing"
    });

    let frames = stream::iter(vec![
        Ok(Event::default().data("connected")),
        Ok(Event::default().event("progress").data(update.to_string())),
    ]);
    Sse::new(frames.chain(stream::pending()))
}

/// One song with lyrics and two images, the second not yet rendered
pub fn sample_data() -> MockData {
    MockData {
        songs: vec![json!({
            "id": 1,
            "title": "Neon Rain",
            "artist": "Night Drive",
            "genre": "synthwave",
            "lyrics": "[Verse]\nCity lights\n[Chorus]\nNeon rain\n[Verse]\nEmpty streets",
            "status": "ready"
        })],
        images: vec![
            json!({"id": 11, "song_id": 1, "image_type": "verse", "sequence_number": 1,
                   "prompt": "a", "image_path": "/renders/11.png"}),
            json!({"id": 12, "song_id": 1, "image_type": "chorus", "sequence_number": 1,
                   "prompt": "b", "image_path": ""}),
        ],
        queue: vec![
            json!({"id": 1, "song_id": 1, "status": "rendering", "progress": 10.0}),
            json!({"id": 2, "song_id": 1, "status": "pending"}),
        ],
        ..MockData::default()
    }
}

/// Settings pointing at `base_url` with fast polling
pub fn fast_settings(base_url: &str) -> Settings {
    Settings {
        orchestrator_host: base_url.to_string(),
        polling: PollingSettings {
            interval_ms: 20,
            single_timeout_ms: 2_000,
            batch_timeout_ms: 3_000,
        },
        ..Settings::default()
    }
}

/// App state over an in-memory settings store
pub fn app_state(settings: Settings) -> AppState {
    let client = OrchestratorClient::new(&settings.orchestrator_host).unwrap();
    AppState::new(SettingsStore::in_memory(settings), client, EventBus::new(256))
}

/// Wait until a job leaves `InProgress`
pub async fn wait_for_job(jobs: &JobTracker, job_id: &str) -> JobRecord {
    tokio::time::timeout(Duration::from_secs(10), async {
        loop {
            if let Some(record) = jobs.get(job_id).await {
                if record.status.is_finished() {
                    return record;
                }
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("job did not finish in time")
}

/// Next event on `rx` matching `predicate`
pub async fn next_event<F>(rx: &mut broadcast::Receiver<UiEvent>, predicate: F) -> UiEvent
where
    F: Fn(&UiEvent) -> bool,
{
    tokio::time::timeout(Duration::from_secs(10), async {
        loop {
            match rx.recv().await {
                Ok(event) if predicate(&event) => return event,
                Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => panic!("event bus closed"),
            }
        }
    })
    .await
    .expect("expected event not received")
}
