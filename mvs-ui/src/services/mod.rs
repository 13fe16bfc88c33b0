//! Service layer for mvs-ui
//!
//! Orchestrator access, the progress stream consumer, image workflows and
//! the settings store.

pub mod image_workflow;
pub mod orchestrator_client;
pub mod progress_stream;
pub mod settings_store;

pub use image_workflow::{ImageWorkflow, WorkflowError};
pub use orchestrator_client::{ClientError, ClientHandle, ImageStatusFetcher, OrchestratorClient};
pub use progress_stream::{run_progress_stream, ProgressBoard};
pub use settings_store::SettingsStore;
