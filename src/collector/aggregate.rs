use serde::{Deserialize, Serialize};
use std::fmt;

use super::{FetchOutcome, VersionWarning};
use crate::provider::{FailureReason, VideoDescriptor};

/// One failed video in the diagnostic trail
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub video_id: String,
    pub reason: FailureReason,
    pub detail: Option<String>,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.video_id, self.reason)?;
        if let Some(detail) = &self.detail {
            write!(f, " ({})", detail)?;
        }
        Ok(())
    }
}

/// Outcome of a whole collection run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionResult {
    /// Reference the run was started for
    pub source: String,

    /// Channel handle (`@name`) when the reference carried one
    #[serde(default)]
    pub channel_handle: Option<String>,

    /// Descriptor for each outcome, same index
    pub videos: Vec<VideoDescriptor>,

    /// One outcome per selected video, in selection order
    pub outcomes: Vec<FetchOutcome>,

    pub success_count: usize,
    pub failure_count: usize,

    /// Failures with their reason and provider detail
    pub diagnostics: Vec<Diagnostic>,

    /// Advisories raised while listing
    pub warnings: Vec<VersionWarning>,

    /// Wall-clock duration of the run
    pub elapsed_secs: f64,
}

impl CollectionResult {
    /// Successful outcomes paired with their descriptor, in order
    pub fn successes(&self) -> impl Iterator<Item = (Option<&VideoDescriptor>, &str, &str)> + '_ {
        self.outcomes
            .iter()
            .enumerate()
            .filter_map(move |(index, outcome)| match outcome {
                FetchOutcome::Success { language, text, .. } => {
                    Some((self.videos.get(index), language.as_str(), text.as_str()))
                }
                FetchOutcome::Failure { .. } => None,
            })
    }

    /// Human-readable diagnostic trail, one line per failure
    pub fn diagnostic_trail(&self) -> Vec<String> {
        self.diagnostics.iter().map(|d| d.to_string()).collect()
    }
}

/// Count and index outcomes. Keeps their order and never re-attempts anything.
pub fn aggregate(outcomes: Vec<FetchOutcome>) -> CollectionResult {
    let success_count = outcomes.iter().filter(|o| o.is_success()).count();
    let failure_count = outcomes.len() - success_count;

    let diagnostics = outcomes
        .iter()
        .filter_map(|outcome| match outcome {
            FetchOutcome::Failure { video_id, reason, detail } => Some(Diagnostic {
                video_id: video_id.clone(),
                reason: *reason,
                detail: detail.clone(),
            }),
            FetchOutcome::Success { .. } => None,
        })
        .collect();

    CollectionResult {
        source: String::new(),
        channel_handle: None,
        videos: Vec::new(),
        outcomes,
        success_count,
        failure_count,
        diagnostics,
        warnings: Vec::new(),
        elapsed_secs: 0.0,
    }
}
