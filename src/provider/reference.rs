use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

use crate::CollectorError;

static CHANNEL_PATH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"youtube\.com/((?:@[\w.-]+)|(?:channel/[\w-]+)|(?:c/[\w.-]+)|(?:user/[\w.-]+))")
        .expect("channel pattern is valid")
});

static BARE_HANDLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^@[\w.-]+$").expect("handle pattern is valid"));

static VIDEO_IN_URL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:[?&]v=|youtu\.be/|/embed/|/shorts/|/live/|/v/)([A-Za-z0-9_-]{11})")
        .expect("video url pattern is valid")
});

static BARE_VIDEO_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_-]{11}$").expect("video id pattern is valid"));

/// A channel or a single video to collect transcripts for
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum VideoRef {
    /// Channel, normalised to its videos tab
    Channel { url: String },
    /// Single video by id
    Video { id: String },
}

impl VideoRef {
    /// Parse user input into a reference.
    ///
    /// Accepts channel URLs (`/@handle`, `/channel/`, `/c/`, `/user/`), a bare
    /// `@handle`, watch/short/embed/shorts URLs, and bare 11-character video ids.
    pub fn parse(input: &str) -> Result<Self, CollectorError> {
        let input = input.trim();
        if input.is_empty() {
            return Err(CollectorError::InvalidReference("empty reference".to_string()));
        }

        if BARE_HANDLE.is_match(input) {
            return Ok(VideoRef::Channel {
                url: format!("https://www.youtube.com/{}/videos", input),
            });
        }

        if BARE_VIDEO_ID.is_match(input) {
            return Ok(VideoRef::Video { id: input.to_string() });
        }

        let parsed = Url::parse(input)
            .map_err(|_| CollectorError::InvalidReference(input.to_string()))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(CollectorError::InvalidReference(format!(
                "{} (URL must use HTTP or HTTPS)",
                input
            )));
        }

        if let Some(caps) = CHANNEL_PATH.captures(input) {
            return Ok(VideoRef::Channel {
                url: format!("https://www.youtube.com/{}/videos", &caps[1]),
            });
        }

        if let Some(caps) = VIDEO_IN_URL.captures(input) {
            return Ok(VideoRef::Video { id: caps[1].to_string() });
        }

        Err(CollectorError::InvalidReference(input.to_string()))
    }

    pub fn watch_url(video_id: &str) -> String {
        format!("https://www.youtube.com/watch?v={}", video_id)
    }

    /// URL handed to the provider
    pub fn url(&self) -> String {
        match self {
            VideoRef::Channel { url } => url.clone(),
            VideoRef::Video { id } => Self::watch_url(id),
        }
    }

    pub fn is_channel(&self) -> bool {
        matches!(self, VideoRef::Channel { .. })
    }

    /// Channel handle (`@name`) when the reference carries one
    pub fn handle(&self) -> Option<&str> {
        match self {
            VideoRef::Channel { url } => url
                .split('/')
                .find(|segment| segment.starts_with('@')),
            VideoRef::Video { .. } => None,
        }
    }
}

impl fmt::Display for VideoRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.url())
    }
}
