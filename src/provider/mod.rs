use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

pub mod reference;
pub mod vtt;
pub mod ytdlp;

pub use reference::VideoRef;
pub use ytdlp::YtDlpProvider;

use crate::collector::SortKey;

/// How a transcript track was produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackKind {
    /// Uploaded by the creator
    Manual,
    /// Generated by speech recognition (or machine translation)
    Automatic,
}

/// Metadata about a single video as reported by a provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoDescriptor {
    /// Provider video id
    pub id: String,

    /// Video title
    pub title: String,

    /// Duration in seconds (0 when unknown)
    pub duration_seconds: u64,

    /// View count (0 when unknown)
    pub view_count: u64,

    /// Upload date if the provider reported one
    pub upload_date: Option<NaiveDate>,

    /// Declared spoken language of the video
    pub original_language: Option<String>,

    /// Transcript languages the provider can serve, keyed by language code
    pub available_languages: BTreeMap<String, TrackKind>,

    /// False when the descriptor came from a flat listing and transcript
    /// languages have not been looked up yet
    pub complete: bool,
}

impl VideoDescriptor {
    /// Canonical watch URL for this video
    pub fn url(&self) -> String {
        VideoRef::watch_url(&self.id)
    }

    pub fn has_language(&self, code: &str) -> bool {
        self.available_languages.contains_key(code)
    }
}

/// Whether a failed provider call is worth repeating
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Transient,
    Permanent,
}

/// Machine-readable cause of a per-video failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    RateLimited,
    Network,
    Timeout,
    SignatureChallenge,
    CaptchaRequired,
    Cookies,
    TranscriptsDisabled,
    VideoUnavailable,
    LanguageUnavailable,
    NoTranscript,
    EmptyTranscript,
    ToolUnavailable,
    ProviderFailure,
    Cancelled,
    Internal,
}

impl FailureReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureReason::RateLimited => "rate_limited",
            FailureReason::Network => "network",
            FailureReason::Timeout => "timeout",
            FailureReason::SignatureChallenge => "signature_challenge",
            FailureReason::CaptchaRequired => "captcha_required",
            FailureReason::Cookies => "cookies",
            FailureReason::TranscriptsDisabled => "transcripts_disabled",
            FailureReason::VideoUnavailable => "video_unavailable",
            FailureReason::LanguageUnavailable => "language_unavailable",
            FailureReason::NoTranscript => "no_transcript",
            FailureReason::EmptyTranscript => "empty_transcript",
            FailureReason::ToolUnavailable => "tool_unavailable",
            FailureReason::ProviderFailure => "provider_failure",
            FailureReason::Cancelled => "cancelled",
            FailureReason::Internal => "internal",
        }
    }

    /// Retry class used when a provider does not say otherwise
    pub fn default_kind(&self) -> ErrorKind {
        match self {
            FailureReason::RateLimited
            | FailureReason::Network
            | FailureReason::Timeout
            | FailureReason::SignatureChallenge => ErrorKind::Transient,
            _ => ErrorKind::Permanent,
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned by a [`TranscriptProvider`]
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("{reason}: {}", .detail.as_deref().unwrap_or("no details"))]
pub struct ProviderError {
    pub kind: ErrorKind,
    pub reason: FailureReason,
    pub detail: Option<String>,
}

impl ProviderError {
    /// Create an error with the reason's default retry class
    pub fn new(reason: FailureReason, detail: Option<String>) -> Self {
        Self {
            kind: reason.default_kind(),
            reason,
            detail,
        }
    }

    pub fn transient(reason: FailureReason, detail: Option<String>) -> Self {
        Self {
            kind: ErrorKind::Transient,
            reason,
            detail,
        }
    }

    pub fn permanent(reason: FailureReason, detail: Option<String>) -> Self {
        Self {
            kind: ErrorKind::Permanent,
            reason,
            detail,
        }
    }

    pub fn is_transient(&self) -> bool {
        self.kind == ErrorKind::Transient
    }
}

/// Source of video metadata and transcripts.
///
/// Implementations own everything about how data is retrieved, including any
/// cookie or browser-session handling; the collector only sees these calls.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TranscriptProvider: Send + Sync {
    /// List videos for a reference, in the provider's own order. `limit` caps how
    /// many channel entries are requested; `order` asks the source for its most
    /// popular or newest uploads first, so the window covers what will be selected.
    async fn list_videos(
        &self,
        reference: &VideoRef,
        limit: usize,
        order: SortKey,
    ) -> Result<Vec<VideoDescriptor>, ProviderError>;

    /// Fetch full metadata, including transcript languages, for one video
    async fn describe_video(&self, video_id: &str) -> Result<VideoDescriptor, ProviderError>;

    /// Fetch the plain-text transcript of a video in the given language
    async fn fetch_transcript(&self, video_id: &str, language: &str)
        -> Result<String, ProviderError>;

    /// Version string of the underlying tool or protocol
    async fn protocol_version(&self) -> Result<String, ProviderError>;
}
