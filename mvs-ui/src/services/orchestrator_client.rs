//! Orchestrator REST client
//!
//! Thin typed wrapper over the orchestrator HTTP API. The orchestrator owns
//! songs, images and the render queue; this client only reads and triggers.
//!
//! Response-shape variance (`{"items": [...]}`, `{"queue": [...]}`, bare
//! arrays) is absorbed by `normalize_list` and nowhere else.

use async_trait::async_trait;
use mvs_common::models::{
    CreateImageRequest, GeneratedPrompt, ImageRecord, PromptRequest, QueueItem, Song,
};
use mvs_common::poller::StatusFetcher;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::RwLock;

const USER_AGENT: &str = concat!("mvs-ui/", env!("CARGO_PKG_VERSION"));
const REQUEST_TIMEOUT_SECS: u64 = 30;
const CONNECT_TIMEOUT_SECS: u64 = 10;

/// Orchestrator client errors
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("API error {0}: {1}")]
    Api(u16, String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Invalid orchestrator URL: {0}")]
    InvalidBaseUrl(String),
}

/// Orchestrator API client
pub struct OrchestratorClient {
    http_client: reqwest::Client,
    /// No total timeout: the progress stream stays open indefinitely
    stream_client: reqwest::Client,
    base_url: String,
}

impl OrchestratorClient {
    pub fn new(base_url: &str) -> Result<Self, ClientError> {
        let base_url = base_url.trim().trim_end_matches('/').to_string();
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(ClientError::InvalidBaseUrl(base_url));
        }

        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .build()
            .map_err(|e| ClientError::Network(e.to_string()))?;

        let stream_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .build()
            .map_err(|e| ClientError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            stream_client,
            base_url,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Map non-success statuses to errors
    async fn check(response: reqwest::Response, what: &str) -> Result<reqwest::Response, ClientError> {
        let status = response.status();

        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(ClientError::NotFound(what.to_string()));
        }

        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(ClientError::Api(status.as_u16(), error_text));
        }

        Ok(response)
    }

    async fn get_value(&self, path: &str) -> Result<serde_json::Value, ClientError> {
        let url = self.url(path);
        tracing::debug!(url = %url, "GET orchestrator");

        let response = self
            .http_client
            .get(&url)
            .send()
            .await
            .map_err(|e| ClientError::Network(e.to_string()))?;

        Self::check(response, path)
            .await?
            .json()
            .await
            .map_err(|e| ClientError::Parse(e.to_string()))
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        let value = self.get_value(path).await?;
        serde_json::from_value(value).map_err(|e| ClientError::Parse(e.to_string()))
    }

    async fn post(&self, path: &str, body: Option<&impl Serialize>) -> Result<reqwest::Response, ClientError> {
        let url = self.url(path);
        tracing::debug!(url = %url, "POST orchestrator");

        let mut request = self.http_client.post(&url);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ClientError::Network(e.to_string()))?;

        Self::check(response, path).await
    }

    async fn post_json<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ClientError> {
        self.post(path, Some(body))
            .await?
            .json()
            .await
            .map_err(|e| ClientError::Parse(e.to_string()))
    }

    /// GET /songs
    pub async fn list_songs(&self) -> Result<Vec<Song>, ClientError> {
        normalize_list(self.get_value("/songs").await?, &["items", "songs"])
    }

    /// GET /songs/{id}
    pub async fn get_song(&self, song_id: i64) -> Result<Song, ClientError> {
        self.get_json(&format!("/songs/{}", song_id)).await
    }

    /// GET /songs/{id}/images
    pub async fn list_images(&self, song_id: i64) -> Result<Vec<ImageRecord>, ClientError> {
        normalize_list(
            self.get_value(&format!("/songs/{}/images", song_id)).await?,
            &["items", "images"],
        )
    }

    /// POST /songs/{id}/images
    pub async fn create_image(
        &self,
        song_id: i64,
        request: &CreateImageRequest,
    ) -> Result<ImageRecord, ClientError> {
        let image: ImageRecord = self
            .post_json(&format!("/songs/{}/images", song_id), request)
            .await?;

        tracing::info!(
            song_id,
            image_id = image.id,
            image_type = %request.image_type,
            sequence = request.sequence_number,
            "Created image record"
        );
        Ok(image)
    }

    /// POST /images/{id}/regenerate
    ///
    /// Only triggers generation; completion is observed by polling.
    pub async fn regenerate_image(&self, image_id: i64) -> Result<(), ClientError> {
        self.post(&format!("/images/{}/regenerate", image_id), None::<&()>)
            .await?;
        tracing::debug!(image_id, "Regeneration triggered");
        Ok(())
    }

    /// POST /images/generate-prompt
    pub async fn generate_prompt(
        &self,
        request: &PromptRequest,
    ) -> Result<GeneratedPrompt, ClientError> {
        self.post_json("/images/generate-prompt", request).await
    }

    /// GET /queue
    pub async fn list_queue(&self) -> Result<Vec<QueueItem>, ClientError> {
        normalize_list(self.get_value("/queue").await?, &["items", "queue"])
    }

    /// GET /progress/stream (SSE)
    ///
    /// Returns the open response; the caller consumes its byte stream.
    pub async fn open_progress_stream(&self) -> Result<reqwest::Response, ClientError> {
        let url = self.url("/progress/stream");
        let response = self
            .stream_client
            .get(&url)
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .send()
            .await
            .map_err(|e| ClientError::Network(e.to_string()))?;

        Self::check(response, "/progress/stream").await
    }
}

/// Decode a list response that may be a bare array or an object wrapping
/// the array under one of `keys`
pub fn normalize_list<T: DeserializeOwned>(
    value: serde_json::Value,
    keys: &[&str],
) -> Result<Vec<T>, ClientError> {
    let array = match value {
        serde_json::Value::Array(_) => value,
        serde_json::Value::Object(mut map) => keys
            .iter()
            .find_map(|key| match map.remove(*key) {
                Some(inner @ serde_json::Value::Array(_)) => Some(inner),
                _ => None,
            })
            .ok_or_else(|| {
                ClientError::Parse(format!("expected a list under one of {:?}", keys))
            })?,
        serde_json::Value::Null => serde_json::Value::Array(Vec::new()),
        other => {
            return Err(ClientError::Parse(format!(
                "expected a list, got {}",
                other
            )))
        }
    };

    serde_json::from_value(array).map_err(|e| ClientError::Parse(e.to_string()))
}

/// Shared, swappable client
///
/// Saving settings with a new orchestrator host replaces the client; holders
/// pick up the new one on their next `current()`.
#[derive(Clone)]
pub struct ClientHandle {
    inner: Arc<RwLock<Arc<OrchestratorClient>>>,
}

impl ClientHandle {
    pub fn new(client: OrchestratorClient) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Arc::new(client))),
        }
    }

    pub async fn current(&self) -> Arc<OrchestratorClient> {
        Arc::clone(&*self.inner.read().await)
    }

    pub async fn replace(&self, client: OrchestratorClient) {
        tracing::info!(base_url = %client.base_url(), "Orchestrator client replaced");
        *self.inner.write().await = Arc::new(client);
    }
}

/// Polls one song's image records by image id
pub struct ImageStatusFetcher {
    client: Arc<OrchestratorClient>,
    song_id: i64,
}

impl ImageStatusFetcher {
    pub fn new(client: Arc<OrchestratorClient>, song_id: i64) -> Self {
        Self { client, song_id }
    }
}

fn parse_image_id(job_id: &str) -> mvs_common::Result<i64> {
    job_id
        .parse()
        .map_err(|_| mvs_common::Error::InvalidInput(format!("image id {:?}", job_id)))
}

#[async_trait]
impl StatusFetcher<ImageRecord> for ImageStatusFetcher {
    async fn fetch_status(&self, job_id: &str) -> mvs_common::Result<ImageRecord> {
        let mut results = self.fetch_many(&[job_id.to_string()]).await;
        results.pop().unwrap_or_else(|| {
            Err(mvs_common::Error::Internal("empty status result".to_string()))
        })
    }

    /// One image listing answers for every pending id
    async fn fetch_many(&self, job_ids: &[String]) -> Vec<mvs_common::Result<ImageRecord>> {
        let images = match self.client.list_images(self.song_id).await {
            Ok(images) => images,
            Err(e) => {
                let message = e.to_string();
                return job_ids
                    .iter()
                    .map(|_| Err(mvs_common::Error::Fetch(message.clone())))
                    .collect();
            }
        };

        job_ids
            .iter()
            .map(|job_id| {
                let image_id = parse_image_id(job_id)?;
                images
                    .iter()
                    .find(|image| image.id == image_id)
                    .cloned()
                    .ok_or_else(|| {
                        mvs_common::Error::Fetch(format!(
                            "image {} not listed for song {}",
                            image_id, self.song_id
                        ))
                    })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_normalize_bare_array() {
        let items: Vec<QueueItem> =
            normalize_list(json!([{"id": 1, "status": "pending"}]), &["items", "queue"]).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].id, 1);
    }

    #[test]
    fn test_normalize_items_and_queue_envelopes() {
        let from_items: Vec<QueueItem> =
            normalize_list(json!({"items": [{"id": 2}], "total": 1}), &["items", "queue"]).unwrap();
        let from_queue: Vec<QueueItem> =
            normalize_list(json!({"queue": [{"id": 3}, {"id": 4}]}), &["items", "queue"]).unwrap();

        assert_eq!(from_items[0].id, 2);
        assert_eq!(from_queue.iter().map(|q| q.id).collect::<Vec<_>>(), vec![3, 4]);
    }

    #[test]
    fn test_normalize_null_is_empty() {
        let items: Vec<QueueItem> = normalize_list(json!(null), &["items"]).unwrap();
        assert!(items.is_empty());
    }

    #[test]
    fn test_normalize_rejects_unknown_shapes() {
        let result: Result<Vec<QueueItem>, _> =
            normalize_list(json!({"results": []}), &["items", "queue"]);
        assert!(matches!(result, Err(ClientError::Parse(_))));

        let result: Result<Vec<QueueItem>, _> = normalize_list(json!("nope"), &["items"]);
        assert!(matches!(result, Err(ClientError::Parse(_))));
    }

    #[test]
    fn test_client_rejects_non_http_base() {
        assert!(matches!(
            OrchestratorClient::new("localhost:8000"),
            Err(ClientError::InvalidBaseUrl(_))
        ));
    }

    #[test]
    fn test_client_trims_trailing_slash() {
        let client = OrchestratorClient::new("http://localhost:8000/").unwrap();
        assert_eq!(client.base_url(), "http://localhost:8000");
        assert_eq!(client.url("/songs"), "http://localhost:8000/songs");
    }
}
