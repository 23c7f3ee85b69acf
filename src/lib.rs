//! Transcript Collector - A Rust CLI tool for collecting YouTube transcripts
//!
//! This library lists the videos of a channel (or takes a single video), filters and
//! sorts them against user constraints, negotiates a transcript language per video and
//! fetches transcripts concurrently, folding per-video failures into one ordered result.

pub mod cli;
pub mod collector;
pub mod config;
pub mod output;
pub mod provider;
pub mod utils;

pub use cli::{Cli, Commands, OutputFormat};
pub use collector::{
    CollectionEvent, CollectionResult, Collector, CollectorSettings, Constraints, FetchOutcome,
    SortKey, WorkItem,
};
pub use config::Config;
pub use provider::{
    FailureReason, ProviderError, TranscriptProvider, VideoDescriptor, VideoRef, YtDlpProvider,
};

/// Result type used throughout the library
pub type Result<T> = anyhow::Result<T>;

/// Run-level errors. Anything raised here fails the whole `collect` call;
/// per-video problems never end up in this type.
#[derive(thiserror::Error, Debug)]
pub enum CollectorError {
    #[error("Unsupported channel or video reference: {0}")]
    InvalidReference(String),

    #[error("Invalid constraints: {0}")]
    ConstraintViolation(String),

    #[error("Could not list videos: {0}")]
    Provider(#[from] ProviderError),

    #[error("Collection was cancelled before any transcript was requested")]
    Cancelled,
}
