//! Orchestrator resource models
//!
//! Request/response shapes for the orchestrator REST API. The orchestrator owns
//! persistence; these types are transient views of its records.
//!
//! Optional fields default rather than fail so that older orchestrator builds
//! that omit a column still deserialize.

use serde::{Deserialize, Serialize};

/// Song record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Song {
    pub id: i64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub artist: Option<String>,
    #[serde(default)]
    pub genre: Option<String>,
    /// Raw lyrics text as stored by the orchestrator
    #[serde(default)]
    pub lyrics: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
}

/// Image prompt record attached to a song
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageRecord {
    pub id: i64,
    pub song_id: i64,
    #[serde(default)]
    pub prompt: String,
    #[serde(default)]
    pub negative_prompt: String,
    /// Section type this image illustrates (see `SectionKind::image_type`)
    #[serde(default)]
    pub image_type: String,
    #[serde(default)]
    pub sequence_number: u32,
    /// Rendered image location; empty until generation finishes
    #[serde(default)]
    pub image_path: String,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
    #[serde(default)]
    pub model_name: Option<String>,
}

impl ImageRecord {
    /// Completion predicate for image generation jobs
    pub fn is_generated(&self) -> bool {
        !self.image_path.is_empty()
    }
}

/// Body of `POST /songs/{id}/images`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateImageRequest {
    pub prompt: String,
    pub negative_prompt: String,
    pub image_type: String,
    pub sequence_number: u32,
    pub width: u32,
    pub height: u32,
    pub model_name: String,
}

/// Body of `POST /images/generate-prompt`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptRequest {
    pub lyrics: String,
    pub section_type: String,
    pub genre: String,
    pub background_style: String,
}

/// Response of `POST /images/generate-prompt`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedPrompt {
    pub prompt: String,
    #[serde(default)]
    pub negative_prompt: String,
}

/// Render queue item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueItem {
    pub id: i64,
    #[serde(default)]
    pub song_id: Option<i64>,
    #[serde(default)]
    pub status: String,
    /// Progress percentage (0-100)
    #[serde(default)]
    pub progress: f32,
    #[serde(default)]
    pub current_step: Option<String>,
    #[serde(default)]
    pub error_message: Option<String>,
}

impl QueueItem {
    /// Overlay a live progress update onto this item
    pub fn apply_progress(&mut self, update: &ProgressUpdate) {
        self.status = update.status.clone();
        self.progress = update.progress;
        self.current_step = update.current_step.clone();
        self.error_message = update.error_message.clone();
    }
}

/// One frame of the `GET /progress/stream` SSE feed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressUpdate {
    pub queue_id: i64,
    pub status: String,
    #[serde(default)]
    pub progress: f32,
    #[serde(default)]
    pub current_step: Option<String>,
    #[serde(default)]
    pub error_message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_is_generated_only_with_path() {
        let mut image: ImageRecord =
            serde_json::from_str(r#"{"id": 4, "song_id": 1, "image_type": "chorus"}"#).unwrap();
        assert!(!image.is_generated());

        image.image_path = "/renders/4.png".to_string();
        assert!(image.is_generated());
    }

    #[test]
    fn test_queue_item_apply_progress() {
        let mut item: QueueItem =
            serde_json::from_str(r#"{"id": 9, "status": "pending"}"#).unwrap();

        item.apply_progress(&ProgressUpdate {
            queue_id: 9,
            status: "rendering".to_string(),
            progress: 42.5,
            current_step: Some("compositing".to_string()),
            error_message: None,
        });

        assert_eq!(item.status, "rendering");
        assert_eq!(item.progress, 42.5);
        assert_eq!(item.current_step.as_deref(), Some("compositing"));
    }
}
