//! Orchestrator progress stream consumer
//!
//! Reads `GET /progress/stream` (Server-Sent Events), keeps the latest
//! progress per render queue item, and republishes each update on the
//! EventBus for connected browsers. Reconnects after a fixed delay until
//! cancelled.

use super::orchestrator_client::{ClientError, ClientHandle, OrchestratorClient};
use futures::StreamExt;
use mvs_common::events::{EventBus, UiEvent};
use mvs_common::models::{ProgressUpdate, QueueItem};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Delay between reconnect attempts
pub const RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// One decoded SSE frame
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SseFrame {
    pub event: Option<String>,
    pub data: String,
}

/// Incremental SSE decoder
///
/// Accepts arbitrary byte chunks; frames end at a blank line. `data:` lines
/// are joined with newlines, comment lines (leading `:`) are ignored.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    pending: SseFrame,
    has_data: bool,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk, returning every frame it completed
    ///
    /// Bytes are buffered until a full line arrives, so a UTF-8 sequence
    /// split across chunks decodes intact.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseFrame> {
        self.buffer.extend_from_slice(chunk);

        let mut frames = Vec::new();
        while let Some(newline) = self.buffer.iter().position(|b| *b == b'\n') {
            let raw: Vec<u8> = self.buffer.drain(..=newline).collect();
            let line = String::from_utf8_lossy(&raw);
            let line = line.trim_end_matches(['\n', '\r']);

            if line.is_empty() {
                if self.has_data {
                    frames.push(std::mem::take(&mut self.pending));
                    self.has_data = false;
                } else {
                    self.pending = SseFrame::default();
                }
                continue;
            }

            if line.starts_with(':') {
                continue;
            }

            let (field, value) = match line.split_once(':') {
                Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
                None => (line, ""),
            };

            match field {
                "data" => {
                    if self.has_data {
                        self.pending.data.push('\n');
                    }
                    self.pending.data.push_str(value);
                    self.has_data = true;
                }
                "event" => self.pending.event = Some(value.to_string()),
                _ => {}
            }
        }
        frames
    }
}

/// Latest progress per queue item
#[derive(Clone, Default)]
pub struct ProgressBoard {
    latest: Arc<RwLock<HashMap<i64, ProgressUpdate>>>,
}

impl ProgressBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn record(&self, update: ProgressUpdate) {
        self.latest.write().await.insert(update.queue_id, update);
    }

    pub async fn get(&self, queue_id: i64) -> Option<ProgressUpdate> {
        self.latest.read().await.get(&queue_id).cloned()
    }

    /// Overlay live progress onto a queue listing
    ///
    /// The listing is the full queue, so entries for items no longer in it
    /// are dropped.
    pub async fn merge_into(&self, items: &mut [QueueItem]) {
        let mut latest = self.latest.write().await;
        latest.retain(|queue_id, _| items.iter().any(|item| item.id == *queue_id));
        for item in items.iter_mut() {
            if let Some(update) = latest.get(&item.id) {
                item.apply_progress(update);
            }
        }
    }
}

/// Decode a frame's JSON payload
pub fn parse_progress(frame: &SseFrame) -> Option<ProgressUpdate> {
    match serde_json::from_str::<ProgressUpdate>(&frame.data) {
        Ok(update) => Some(update),
        Err(e) => {
            debug!(error = %e, data = %frame.data, "Ignoring non-progress SSE frame");
            None
        }
    }
}

/// Consume the stream until it ends, errors, or `cancel` fires
async fn stream_once(
    client: &OrchestratorClient,
    board: &ProgressBoard,
    event_bus: &EventBus,
    cancel: &CancellationToken,
) -> Result<(), ClientError> {
    let response = client.open_progress_stream().await?;
    info!(base_url = %client.base_url(), "Progress stream connected");
    event_bus.emit_lossy(UiEvent::ProgressStreamStatus {
        connected: true,
        timestamp: chrono::Utc::now(),
    });

    let mut bytes = response.bytes_stream();
    let mut decoder = SseDecoder::new();

    loop {
        let chunk = tokio::select! {
            _ = cancel.cancelled() => return Ok(()),
            chunk = bytes.next() => chunk,
        };

        let chunk = match chunk {
            Some(Ok(chunk)) => chunk,
            Some(Err(e)) => return Err(ClientError::Network(e.to_string())),
            None => return Ok(()),
        };

        for frame in decoder.push(&chunk) {
            if let Some(update) = parse_progress(&frame) {
                debug!(
                    queue_id = update.queue_id,
                    status = %update.status,
                    progress = update.progress,
                    "Queue progress"
                );
                board.record(update.clone()).await;
                event_bus.emit_lossy(UiEvent::QueueProgress {
                    update,
                    timestamp: chrono::Utc::now(),
                });
            }
        }
    }
}

/// Run the progress stream with reconnects until cancelled
pub async fn run_progress_stream(
    clients: ClientHandle,
    board: ProgressBoard,
    event_bus: EventBus,
    cancel: CancellationToken,
) {
    info!("Progress stream task started");

    while !cancel.is_cancelled() {
        let client = clients.current().await;

        match stream_once(&client, &board, &event_bus, &cancel).await {
            Ok(()) => debug!("Progress stream closed"),
            Err(e) => warn!(error = %e, "Progress stream failed"),
        }

        event_bus.emit_lossy(UiEvent::ProgressStreamStatus {
            connected: false,
            timestamp: chrono::Utc::now(),
        });

        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(RECONNECT_DELAY) => {}
        }
    }

    info!("Progress stream task stopped");
}
