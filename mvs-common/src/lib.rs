//! # MV Studio Common Library
//!
//! Shared code for the MV Studio UI service including:
//! - Error types
//! - Settings and TOML configuration loading
//! - Orchestrator resource models (songs, images, queue items)
//! - UI event types (UiEvent enum) and the EventBus
//! - Lyrics sectioning
//! - Asynchronous job polling and job tracking

pub mod config;
pub mod error;
pub mod events;
pub mod jobs;
pub mod lyrics;
pub mod models;
pub mod poller;

pub use error::{Error, Result};
pub use lyrics::{LyricsSection, SectionKind};
