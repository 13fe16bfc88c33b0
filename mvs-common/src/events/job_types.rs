//! Job and notification type definitions
//!
//! Supporting types for background job tracking and user-facing toasts.

use serde::{Deserialize, Serialize};

/// What a background job is doing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum JobKind {
    /// Single image regeneration
    RegenerateImage,
    /// Regenerate every image of a song that has no output yet
    GenerateMissingImages,
    /// Create and render one image per lyrics section
    GenerateFromLyrics,
}

impl std::fmt::Display for JobKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobKind::RegenerateImage => write!(f, "RegenerateImage"),
            JobKind::GenerateMissingImages => write!(f, "GenerateMissingImages"),
            JobKind::GenerateFromLyrics => write!(f, "GenerateFromLyrics"),
        }
    }
}

/// Lifecycle state of a tracked job
///
/// `TimedOut` is distinct from `Failed`: the server-side work may still
/// finish after the client stops watching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum JobStatus {
    InProgress,
    Completed,
    TimedOut,
    Cancelled,
    Failed,
}

impl JobStatus {
    /// Whether the job has stopped (for any reason)
    pub fn is_finished(&self) -> bool {
        !matches!(self, JobStatus::InProgress)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobStatus::InProgress => write!(f, "InProgress"),
            JobStatus::Completed => write!(f, "Completed"),
            JobStatus::TimedOut => write!(f, "TimedOut"),
            JobStatus::Cancelled => write!(f, "Cancelled"),
            JobStatus::Failed => write!(f, "Failed"),
        }
    }
}

/// Toast severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationLevel {
    Success,
    Info,
    Warning,
    Error,
}

impl std::fmt::Display for NotificationLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NotificationLevel::Success => write!(f, "success"),
            NotificationLevel::Info => write!(f, "info"),
            NotificationLevel::Warning => write!(f, "warning"),
            NotificationLevel::Error => write!(f, "error"),
        }
    }
}
