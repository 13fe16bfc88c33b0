//! Image generation workflows
//!
//! Three user actions, each run as a tracked background job:
//! - generate from lyrics: section the lyrics, create one image per section,
//!   trigger rendering, then wait for the whole batch
//! - regenerate one image and wait for it
//! - regenerate every image of a song that has no output yet
//!
//! Each call registers the job with the JobTracker (busy indicator on)
//! before returning, then polls in a spawned task. Outcomes surface as
//! toasts: success, warning on timeout (the render may still land), error on
//! failure. A cancelled job finishes silently.

use super::orchestrator_client::{ClientError, ClientHandle, ImageStatusFetcher, OrchestratorClient};
use super::settings_store::SettingsStore;
use mvs_common::config::ImageDefaults;
use mvs_common::events::{EventBus, JobKind, JobStatus, NotificationLevel};
use mvs_common::jobs::JobTracker;
use mvs_common::lyrics::{parse_sections, LyricsSection};
use mvs_common::models::{CreateImageRequest, ImageRecord, PromptRequest};
use mvs_common::poller::{poll_batch, poll_until, BatchOutcome, PollOutcome};
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

/// Workflow errors surfaced synchronously to the caller
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error(transparent)]
    Client(#[from] ClientError),

    #[error(transparent)]
    Common(#[from] mvs_common::Error),
}

/// Image workflow service
#[derive(Clone)]
pub struct ImageWorkflow {
    clients: ClientHandle,
    settings: SettingsStore,
    jobs: JobTracker,
    event_bus: EventBus,
}

impl ImageWorkflow {
    pub fn new(
        clients: ClientHandle,
        settings: SettingsStore,
        jobs: JobTracker,
        event_bus: EventBus,
    ) -> Self {
        Self {
            clients,
            settings,
            jobs,
            event_bus,
        }
    }

    /// Create and render one image per lyrics section
    ///
    /// Returns the batch job id. Lyrics without sections fail with
    /// `Error::NoSections` before any orchestrator call.
    pub async fn start_generate_from_lyrics(
        &self,
        song_id: i64,
        lyrics: &str,
    ) -> Result<String, WorkflowError> {
        let sections = parse_sections(lyrics);
        if sections.is_empty() {
            self.event_bus
                .notify(NotificationLevel::Error, "No valid sections found in lyrics");
            return Err(mvs_common::Error::NoSections.into());
        }

        let job_id = Uuid::new_v4().to_string();
        let token = self
            .jobs
            .begin(&job_id, JobKind::GenerateFromLyrics, Vec::new())
            .await?;

        info!(song_id, job_id = %job_id, sections = sections.len(), "Generating images from lyrics");

        let workflow = self.clone();
        let task_job_id = job_id.clone();
        tokio::spawn(async move {
            workflow
                .run_generate_from_lyrics(task_job_id, song_id, sections, token)
                .await;
        });

        Ok(job_id)
    }

    /// Regenerate one image and wait for its output
    ///
    /// The job id is the image id, so the UI can key the busy indicator on
    /// the image itself.
    pub async fn start_regenerate(&self, song_id: i64, image_id: i64) -> Result<String, WorkflowError> {
        let job_id = image_id.to_string();
        let token = self
            .jobs
            .begin(&job_id, JobKind::RegenerateImage, vec![job_id.clone()])
            .await?;

        let client = self.clients.current().await;
        if let Err(e) = client.regenerate_image(image_id).await {
            self.jobs.finish(&job_id, JobStatus::Failed).await;
            self.event_bus.notify(
                NotificationLevel::Error,
                format!("Failed to regenerate image {}: {}", image_id, e),
            );
            return Err(e.into());
        }

        let config = self.settings.settings().await.polling.single();
        let workflow = self.clone();
        let task_job_id = job_id.clone();
        tokio::spawn(async move {
            let fetcher = ImageStatusFetcher::new(client, song_id);
            let outcome = poll_until(
                &task_job_id,
                &fetcher,
                ImageRecord::is_generated,
                config,
                &token,
            )
            .await;
            workflow.report_single(&task_job_id, image_id, outcome).await;
        });

        Ok(job_id)
    }

    /// Regenerate every image of a song whose output is missing
    ///
    /// Returns `None` when nothing is missing.
    pub async fn start_generate_missing(&self, song_id: i64) -> Result<Option<String>, WorkflowError> {
        let client = self.clients.current().await;
        let images = match client.list_images(song_id).await {
            Ok(images) => images,
            Err(e) => {
                self.event_bus.notify(
                    NotificationLevel::Error,
                    format!("Failed to load images for song {}: {}", song_id, e),
                );
                return Err(e.into());
            }
        };

        let missing: Vec<i64> = images
            .iter()
            .filter(|image| !image.is_generated())
            .map(|image| image.id)
            .collect();

        if missing.is_empty() {
            self.event_bus
                .notify(NotificationLevel::Info, "All images already generated");
            return Ok(None);
        }

        let job_id = Uuid::new_v4().to_string();
        let subjects: Vec<String> = missing.iter().map(i64::to_string).collect();
        let token = self
            .jobs
            .begin(&job_id, JobKind::GenerateMissingImages, subjects)
            .await?;

        info!(song_id, job_id = %job_id, missing = missing.len(), "Generating missing images");

        let workflow = self.clone();
        let task_job_id = job_id.clone();
        tokio::spawn(async move {
            workflow
                .run_generate_missing(task_job_id, song_id, missing, client, token)
                .await;
        });

        Ok(Some(job_id))
    }

    async fn run_generate_from_lyrics(
        self,
        job_id: String,
        song_id: i64,
        sections: Vec<LyricsSection>,
        token: CancellationToken,
    ) {
        let client = self.clients.current().await;
        let settings = self.settings.settings().await;

        let genre = match client.get_song(song_id).await {
            Ok(song) => song
                .genre
                .filter(|g| !g.trim().is_empty())
                .unwrap_or_else(|| settings.image.genre.clone()),
            Err(e) => {
                warn!(song_id, error = %e, "Could not load song, using default genre");
                settings.image.genre.clone()
            }
        };

        let mut image_ids = Vec::with_capacity(sections.len());
        for section in &sections {
            if token.is_cancelled() {
                self.jobs.finish(&job_id, JobStatus::Cancelled).await;
                return;
            }

            match create_section_image(&client, song_id, section, &genre, &settings.image).await {
                Ok(image_id) => image_ids.push(image_id.to_string()),
                Err(e) => {
                    warn!(song_id, section = %section.label(), error = %e, "Section image failed");
                    self.event_bus.notify(
                        NotificationLevel::Error,
                        format!("Failed to create image for {}: {}", section.label(), e),
                    );
                }
            }
        }

        if image_ids.is_empty() {
            self.jobs.finish(&job_id, JobStatus::Failed).await;
            self.event_bus
                .notify(NotificationLevel::Error, "No images could be created from lyrics");
            return;
        }

        self.jobs.set_subjects(&job_id, image_ids.clone()).await;

        let fetcher = ImageStatusFetcher::new(client, song_id);
        let batch = poll_batch(
            &image_ids,
            &fetcher,
            ImageRecord::is_generated,
            settings.polling.batch(),
            &token,
        )
        .await;

        self.report_batch(&job_id, sections.len(), batch).await;
    }

    async fn run_generate_missing(
        self,
        job_id: String,
        song_id: i64,
        missing: Vec<i64>,
        client: Arc<OrchestratorClient>,
        token: CancellationToken,
    ) {
        let mut triggered = Vec::with_capacity(missing.len());
        for image_id in &missing {
            if token.is_cancelled() {
                self.jobs.finish(&job_id, JobStatus::Cancelled).await;
                return;
            }
            match client.regenerate_image(*image_id).await {
                Ok(()) => triggered.push(image_id.to_string()),
                Err(e) => warn!(image_id, error = %e, "Failed to trigger regeneration"),
            }
        }

        if triggered.len() < missing.len() {
            self.event_bus.notify(
                NotificationLevel::Error,
                format!(
                    "Failed to start {} of {} image generations",
                    missing.len() - triggered.len(),
                    missing.len()
                ),
            );
        }

        if triggered.is_empty() {
            self.jobs.finish(&job_id, JobStatus::Failed).await;
            return;
        }

        self.jobs.set_subjects(&job_id, triggered.clone()).await;

        let config = self.settings.settings().await.polling.batch();
        let fetcher = ImageStatusFetcher::new(client, song_id);
        let batch = poll_batch(&triggered, &fetcher, ImageRecord::is_generated, config, &token).await;

        self.report_batch(&job_id, missing.len(), batch).await;
    }

    async fn report_single(&self, job_id: &str, image_id: i64, outcome: PollOutcome<ImageRecord>) {
        match outcome {
            PollOutcome::Completed(image) => {
                self.jobs.finish(job_id, JobStatus::Completed).await;
                info!(image_id, path = %image.image_path, "Image regenerated");
                self.event_bus.notify(
                    NotificationLevel::Success,
                    format!("Image {} regenerated", image_id),
                );
            }
            PollOutcome::TimedOut => {
                self.jobs.finish(job_id, JobStatus::TimedOut).await;
                self.event_bus.notify(
                    NotificationLevel::Warning,
                    format!(
                        "Image {} is still generating; it may finish later",
                        image_id
                    ),
                );
            }
            PollOutcome::Cancelled => {
                self.jobs.finish(job_id, JobStatus::Cancelled).await;
            }
        }
    }

    async fn report_batch(&self, job_id: &str, requested: usize, batch: BatchOutcome<ImageRecord>) {
        let done = batch.completed.len();
        let total = done + batch.pending.len();

        match batch.outcome {
            PollOutcome::Completed(()) => {
                self.jobs.finish(job_id, JobStatus::Completed).await;
                let message = if total < requested {
                    format!("Generated {} of {} images", done, requested)
                } else {
                    format!("Generated {} images", done)
                };
                self.event_bus.notify(NotificationLevel::Success, message);
            }
            PollOutcome::TimedOut => {
                self.jobs.finish(job_id, JobStatus::TimedOut).await;
                self.event_bus.notify(
                    NotificationLevel::Warning,
                    format!(
                        "{} of {} images finished; the rest are still generating and may finish later",
                        done, total
                    ),
                );
            }
            PollOutcome::Cancelled => {
                self.jobs.finish(job_id, JobStatus::Cancelled).await;
            }
        }
    }
}

/// Prompt, create and trigger one section's image
async fn create_section_image(
    client: &OrchestratorClient,
    song_id: i64,
    section: &LyricsSection,
    genre: &str,
    defaults: &ImageDefaults,
) -> Result<i64, ClientError> {
    let image_type = section.kind.image_type();

    let prompt = client
        .generate_prompt(&PromptRequest {
            lyrics: section.joined_text(),
            section_type: image_type.to_string(),
            genre: genre.to_string(),
            background_style: defaults.background_style.clone(),
        })
        .await?;

    let negative_prompt = if prompt.negative_prompt.trim().is_empty() {
        defaults.negative_prompt.clone()
    } else {
        prompt.negative_prompt
    };

    let image = client
        .create_image(
            song_id,
            &CreateImageRequest {
                prompt: prompt.prompt,
                negative_prompt,
                image_type: image_type.to_string(),
                sequence_number: section.sequence_number,
                width: defaults.width,
                height: defaults.height,
                model_name: defaults.model.clone(),
            },
        )
        .await?;

    client.regenerate_image(image.id).await?;
    Ok(image.id)
}
