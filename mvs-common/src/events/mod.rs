//! Event types for the MV Studio UI event system
//!
//! Provides the UiEvent enum and the EventBus that fans events out to every
//! connected browser (via SSE) and to in-process subscribers.

mod job_types;

pub use job_types::{JobKind, JobStatus, NotificationLevel};

use crate::models::ProgressUpdate;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// UI event types
///
/// Events are broadcast via EventBus and serialized for SSE transmission.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum UiEvent {
    /// User-facing toast
    ///
    /// Network failures and lyrics format errors are `Error`, poll timeouts
    /// are `Warning`.
    Notification {
        level: NotificationLevel,
        message: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A background job was registered (busy indicator on)
    JobStarted {
        job_id: String,
        kind: JobKind,
        /// Image ids the job is waiting on
        subject_ids: Vec<String>,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A background job stopped (busy indicator off)
    JobFinished {
        job_id: String,
        kind: JobKind,
        status: JobStatus,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Render queue item progress relayed from the orchestrator
    QueueProgress {
        update: ProgressUpdate,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Orchestrator progress stream connected or dropped
    ProgressStreamStatus {
        connected: bool,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl UiEvent {
    /// Build a notification event stamped now
    pub fn notification(level: NotificationLevel, message: impl Into<String>) -> Self {
        UiEvent::Notification {
            level,
            message: message.into(),
            timestamp: chrono::Utc::now(),
        }
    }

    /// SSE event name for this event
    pub fn event_type(&self) -> &'static str {
        match self {
            UiEvent::Notification { .. } => "Notification",
            UiEvent::JobStarted { .. } => "JobStarted",
            UiEvent::JobFinished { .. } => "JobFinished",
            UiEvent::QueueProgress { .. } => "QueueProgress",
            UiEvent::ProgressStreamStatus { .. } => "ProgressStreamStatus",
        }
    }
}

// ========================================
// EventBus Implementation
// ========================================

/// Central event distribution bus
///
/// Uses tokio::broadcast internally:
/// - Non-blocking publish (slow subscribers don't block producers)
/// - Multiple concurrent subscribers
/// - Lagged message detection for slow subscribers
///
/// # Examples
///
/// ```
/// use mvs_common::events::{EventBus, NotificationLevel, UiEvent};
///
/// let event_bus = EventBus::new(100);
/// let mut rx = event_bus.subscribe();
///
/// event_bus.emit_lossy(UiEvent::notification(NotificationLevel::Info, "hello"));
/// assert!(rx.try_recv().is_ok());
/// ```
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<UiEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    ///
    /// Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<UiEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Ok(subscriber_count)` if at least one subscriber exists.
    #[allow(clippy::result_large_err)]
    pub fn emit(&self, event: UiEvent) -> Result<usize, broadcast::error::SendError<UiEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: UiEvent) {
        let _ = self.tx.send(event);
    }

    /// Emit a toast
    pub fn notify(&self, level: NotificationLevel, message: impl Into<String>) {
        let message = message.into();
        tracing::debug!(%level, %message, "Notification");
        self.emit_lossy(UiEvent::notification(level, message));
    }

    /// Get the current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Get the configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
