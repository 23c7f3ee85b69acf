//! Video selection and concurrent transcript collection.
//!
//! A run goes lister -> select -> (hydrate) -> negotiate -> coordinator -> aggregate.
//! Only the coordinator runs work in parallel; everything before it is sequential.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;

pub mod aggregate;
pub mod coordinator;
pub mod language;
pub mod lister;
pub mod select;

pub use aggregate::{aggregate, CollectionResult, Diagnostic};
pub use coordinator::{Coordinator, CoordinatorSettings};
pub use language::{LanguageNegotiator, NoTranscriptAvailable};
pub use lister::{is_outdated, Listing, VersionWarning, VideoLister};
pub use select::select;

use crate::config::Config;
use crate::provider::{FailureReason, ProviderError, TranscriptProvider, VideoDescriptor, VideoRef};
use crate::CollectorError;

/// Ordering applied to candidate videos
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    /// Most viewed first, newer first on ties
    #[default]
    Views,
    /// Newest first, most viewed first on ties
    Date,
}

/// User constraints for one collection run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Constraints {
    pub max_count: usize,
    pub sort_key: SortKey,
    pub min_duration_seconds: Option<u64>,
    pub max_duration_seconds: Option<u64>,
    pub min_views: Option<u64>,
}

impl Constraints {
    /// The `n` most viewed videos, unfiltered
    pub fn top(n: usize) -> Self {
        Self {
            max_count: n,
            sort_key: SortKey::Views,
            min_duration_seconds: None,
            max_duration_seconds: None,
            min_views: None,
        }
    }

    pub fn validate(&self) -> Result<(), CollectorError> {
        if self.max_count == 0 {
            return Err(CollectorError::ConstraintViolation(
                "max_count must be at least 1".to_string(),
            ));
        }

        if let (Some(min), Some(max)) = (self.min_duration_seconds, self.max_duration_seconds) {
            if min > max {
                return Err(CollectorError::ConstraintViolation(format!(
                    "minimum duration ({}s) is greater than maximum duration ({}s)",
                    min, max
                )));
            }
        }

        Ok(())
    }
}

/// One selected video with the language to request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkItem {
    pub descriptor: VideoDescriptor,
    pub language: String,
}

/// Result of collecting one video. Exactly one is produced per submitted item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FetchOutcome {
    Success {
        video_id: String,
        language: String,
        text: String,
    },
    Failure {
        video_id: String,
        reason: FailureReason,
        detail: Option<String>,
    },
}

impl FetchOutcome {
    pub fn failure(video_id: impl Into<String>, error: &ProviderError) -> Self {
        FetchOutcome::Failure {
            video_id: video_id.into(),
            reason: error.reason,
            detail: error.detail.clone(),
        }
    }

    pub fn cancelled(video_id: impl Into<String>) -> Self {
        FetchOutcome::Failure {
            video_id: video_id.into(),
            reason: FailureReason::Cancelled,
            detail: Some("run was cancelled before this video finished".to_string()),
        }
    }

    pub fn video_id(&self) -> &str {
        match self {
            FetchOutcome::Success { video_id, .. } | FetchOutcome::Failure { video_id, .. } => video_id,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, FetchOutcome::Success { .. })
    }

    pub fn status(&self) -> OutcomeStatus {
        match self {
            FetchOutcome::Success { .. } => OutcomeStatus::Succeeded,
            FetchOutcome::Failure { reason: FailureReason::Cancelled, .. } => OutcomeStatus::Cancelled,
            FetchOutcome::Failure { reason, .. } => OutcomeStatus::Failed(*reason),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    Succeeded,
    Failed(FailureReason),
    Cancelled,
}

/// Progress notifications for a presentation layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum CollectionEvent {
    VersionWarning(VersionWarning),
    Listed { count: usize },
    Selected { count: usize },
    Started { video_id: String, language: String },
    Retrying { video_id: String, attempt: u32, reason: FailureReason },
    Completed { video_id: String, status: OutcomeStatus },
}

/// Optional event channel; sending never fails the run
#[derive(Debug, Clone, Default)]
pub struct EventSink {
    tx: Option<UnboundedSender<CollectionEvent>>,
}

impl EventSink {
    pub fn new(tx: UnboundedSender<CollectionEvent>) -> Self {
        Self { tx: Some(tx) }
    }

    pub fn emit(&self, event: CollectionEvent) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(event);
        }
    }
}

/// Tunables for a [`Collector`]
#[derive(Debug, Clone)]
pub struct CollectorSettings {
    pub coordinator: CoordinatorSettings,
    pub fallback_languages: Vec<String>,
    pub candidate_multiplier: usize,
    pub min_version: Option<String>,
}

impl CollectorSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            coordinator: CoordinatorSettings {
                concurrency: config.workers(),
                max_retries: config.collection.max_retries,
                retry_backoff: Duration::from_millis(config.collection.retry_backoff_ms),
                fetch_timeout: Duration::from_secs(config.collection.fetch_timeout_secs),
            },
            fallback_languages: config.collection.fallback_languages.clone(),
            candidate_multiplier: config.collection.candidate_multiplier.max(1),
            min_version: config.provider.min_version.clone(),
        }
    }
}

impl Default for CollectorSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Entry point running the whole pipeline for one reference
pub struct Collector {
    provider: Arc<dyn TranscriptProvider>,
    settings: CollectorSettings,
    events: EventSink,
    cancel: CancellationToken,
}

/// A selected video either ready to fetch or already settled as a failure
enum Planned {
    Fetch(WorkItem),
    Settled(FetchOutcome),
}

impl Collector {
    pub fn new(provider: Arc<dyn TranscriptProvider>, settings: CollectorSettings) -> Self {
        Self {
            provider,
            settings,
            events: EventSink::default(),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_events(mut self, tx: UnboundedSender<CollectionEvent>) -> Self {
        self.events = EventSink::new(tx);
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// List, select and fetch transcripts for `reference`.
    ///
    /// Returns a complete result, possibly containing per-video failures, or a single
    /// run-level error when nothing could be attempted.
    pub async fn collect(
        &self,
        reference: &VideoRef,
        constraints: &Constraints,
    ) -> Result<CollectionResult, CollectorError> {
        constraints.validate()?;
        let started = Instant::now();

        if self.cancel.is_cancelled() {
            return Err(CollectorError::Cancelled);
        }

        let lister = VideoLister::new(Arc::clone(&self.provider), self.settings.min_version.clone());
        let candidate_limit = constraints
            .max_count
            .saturating_mul(self.settings.candidate_multiplier);
        let listing = lister.list(reference, candidate_limit, constraints.sort_key).await?;

        if let Some(warning) = &listing.warning {
            self.events.emit(CollectionEvent::VersionWarning(warning.clone()));
        }
        self.events.emit(CollectionEvent::Listed { count: listing.videos.len() });
        tracing::info!("Found {} candidate videos for {}", listing.videos.len(), reference);

        let selected = select(listing.videos, constraints);
        self.events.emit(CollectionEvent::Selected { count: selected.len() });
        tracing::info!("Selected {} videos", selected.len());

        if self.cancel.is_cancelled() {
            return Err(CollectorError::Cancelled);
        }

        let coordinator = Coordinator::new(
            Arc::clone(&self.provider),
            self.settings.coordinator.clone(),
            self.events.clone(),
            self.cancel.clone(),
        );

        let hydrated = coordinator.hydrate(selected.clone()).await;
        let negotiator = LanguageNegotiator::new(self.settings.fallback_languages.clone());

        let mut videos = Vec::with_capacity(selected.len());
        let mut plan = Vec::with_capacity(selected.len());
        for (listed, hydration) in selected.into_iter().zip(hydrated) {
            match hydration {
                Ok(descriptor) => {
                    videos.push(descriptor.clone());
                    plan.push(self.plan(&negotiator, descriptor));
                }
                Err(error) => {
                    tracing::warn!("Could not look up {}: {}", listed.id, error);
                    let outcome = FetchOutcome::failure(listed.id.clone(), &error);
                    self.settle(&outcome);
                    videos.push(listed);
                    plan.push(Planned::Settled(outcome));
                }
            }
        }

        let work: Vec<WorkItem> = plan
            .iter()
            .filter_map(|p| match p {
                Planned::Fetch(item) => Some(item.clone()),
                Planned::Settled(_) => None,
            })
            .collect();
        let mut fetched = coordinator.run(work).await.into_iter();

        let outcomes: Vec<FetchOutcome> = plan
            .into_iter()
            .map(|p| match p {
                Planned::Settled(outcome) => outcome,
                Planned::Fetch(item) => fetched
                    .next()
                    .unwrap_or_else(|| FetchOutcome::cancelled(item.descriptor.id)),
            })
            .collect();

        let mut result = aggregate(outcomes);
        result.source = reference.to_string();
        result.channel_handle = reference.handle().map(str::to_string);
        result.videos = videos;
        result.warnings = listing.warning.into_iter().collect();
        result.elapsed_secs = started.elapsed().as_secs_f64();

        tracing::info!(
            "Collected {}/{} transcripts in {:.1}s",
            result.success_count,
            result.outcomes.len(),
            result.elapsed_secs
        );

        Ok(result)
    }

    fn plan(&self, negotiator: &LanguageNegotiator, descriptor: VideoDescriptor) -> Planned {
        match negotiator.negotiate(&descriptor) {
            Ok(language) => {
                tracing::debug!("{}: requesting {} transcript", descriptor.id, language);
                Planned::Fetch(WorkItem { descriptor, language })
            }
            Err(e) => {
                let outcome = FetchOutcome::Failure {
                    video_id: descriptor.id.clone(),
                    reason: FailureReason::NoTranscript,
                    detail: Some(e.to_string()),
                };
                self.settle(&outcome);
                Planned::Settled(outcome)
            }
        }
    }

    fn settle(&self, outcome: &FetchOutcome) {
        self.events.emit(CollectionEvent::Completed {
            video_id: outcome.video_id().to_string(),
            status: outcome.status(),
        });
    }
}
