use crate::provider::{TrackKind, VideoDescriptor};

/// Negotiation found no transcript language for a video
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("no transcript languages are available for video {video_id}")]
pub struct NoTranscriptAvailable {
    pub video_id: String,
}

/// Picks the transcript language to request for a video.
///
/// Only ever returns a code the descriptor lists as available. Order of preference:
/// the declared original language, an auto-generated variant of it, the configured
/// fallback languages in order, then the smallest available code.
#[derive(Debug, Clone)]
pub struct LanguageNegotiator {
    fallback: Vec<String>,
}

impl LanguageNegotiator {
    pub fn new(fallback: Vec<String>) -> Self {
        Self { fallback }
    }

    pub fn negotiate(&self, video: &VideoDescriptor) -> Result<String, NoTranscriptAvailable> {
        let available = &video.available_languages;
        if available.is_empty() {
            return Err(NoTranscriptAvailable {
                video_id: video.id.clone(),
            });
        }

        if let Some(original) = video.original_language.as_deref() {
            if available.contains_key(original) {
                return Ok(original.to_string());
            }

            if let Some(variant) = original_variant(video, original) {
                return Ok(variant);
            }
        }

        if let Some(code) = self.fallback.iter().find(|code| available.contains_key(code.as_str())) {
            return Ok(code.clone());
        }

        // BTreeMap keys are sorted, so this is the smallest code
        available
            .keys()
            .next()
            .cloned()
            .ok_or_else(|| NoTranscriptAvailable {
                video_id: video.id.clone(),
            })
    }
}

/// Auto-generated track for the original language: `<lang>-orig` first, then any
/// automatic track with the same primary subtag, then any such track at all.
fn original_variant(video: &VideoDescriptor, original: &str) -> Option<String> {
    let available = &video.available_languages;
    let primary = primary_subtag(original);

    let orig = format!("{}-orig", primary);
    if available.contains_key(&orig) {
        return Some(orig);
    }

    let mut variants = available
        .iter()
        .filter(|(code, _)| primary_subtag(code).eq_ignore_ascii_case(primary));

    let automatic = variants
        .clone()
        .find(|(_, kind)| **kind == TrackKind::Automatic)
        .map(|(code, _)| code.clone());

    automatic.or_else(|| variants.next().map(|(code, _)| code.clone()))
}

fn primary_subtag(code: &str) -> &str {
    code.split(['-', '_']).next().unwrap_or(code)
}
