use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use super::SortKey;
use crate::provider::{FailureReason, ProviderError, TranscriptProvider, VideoDescriptor, VideoRef};

/// The provider runs an older tool release than the configured minimum
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionWarning {
    pub current: String,
    pub required: String,
}

impl fmt::Display for VersionWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "yt-dlp {} is older than {}; transcripts may fail until it is updated (pip install -U yt-dlp)",
            self.current, self.required
        )
    }
}

/// Candidates in provider order plus an optional version advisory
#[derive(Debug, Clone)]
pub struct Listing {
    pub videos: Vec<VideoDescriptor>,
    pub warning: Option<VersionWarning>,
}

/// Turns a reference into candidate descriptors. Never retries or reorders.
pub struct VideoLister {
    provider: Arc<dyn TranscriptProvider>,
    min_version: Option<String>,
}

impl VideoLister {
    pub fn new(provider: Arc<dyn TranscriptProvider>, min_version: Option<String>) -> Self {
        Self { provider, min_version }
    }

    pub async fn list(
        &self,
        reference: &VideoRef,
        limit: usize,
        order: SortKey,
    ) -> Result<Listing, ProviderError> {
        let warning = self.check_version().await;

        let mut videos = match reference {
            VideoRef::Channel { .. } => {
                self.provider
                    .list_videos(reference, limit.max(1), order)
                    .await?
            }
            VideoRef::Video { id } => {
                let videos = self.provider.list_videos(reference, 1, order).await?;
                if videos.is_empty() {
                    return Err(ProviderError::permanent(
                        FailureReason::VideoUnavailable,
                        Some(format!("no metadata returned for video {}", id)),
                    ));
                }
                videos
            }
        };

        if !reference.is_channel() {
            videos.truncate(1);
        }

        Ok(Listing { videos, warning })
    }

    /// Compare the provider version with the configured minimum. A failed lookup is
    /// logged and otherwise ignored; the listing call will surface real problems.
    async fn check_version(&self) -> Option<VersionWarning> {
        let required = self.min_version.as_deref()?;

        match self.provider.protocol_version().await {
            Ok(current) if is_outdated(&current, required) => {
                let warning = VersionWarning {
                    current,
                    required: required.to_string(),
                };
                tracing::warn!("{}", warning);
                Some(warning)
            }
            Ok(current) => {
                tracing::debug!("yt-dlp version {}", current);
                None
            }
            Err(e) => {
                tracing::warn!("Could not determine yt-dlp version: {}", e);
                None
            }
        }
    }
}

/// Compare dotted release versions (`2026.02.04`) numerically
pub fn is_outdated(current: &str, required: &str) -> bool {
    fn parts(version: &str) -> Vec<u64> {
        version
            .trim()
            .split(|c: char| c == '.' || c == '-')
            .filter_map(|p| p.parse().ok())
            .collect()
    }

    parts(current).cmp(&parts(required)) == Ordering::Less
}
