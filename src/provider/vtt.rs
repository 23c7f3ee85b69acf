//! WebVTT to plain text.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

static TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>").expect("tag pattern is valid"));

/// Strip headers, cue timings, inline tags and repeated lines from a VTT document.
///
/// Auto-generated captions repeat each line across consecutive cues while the next
/// line scrolls in, so only the first occurrence of a line is kept.
pub fn clean_vtt(content: &str) -> String {
    let mut seen = HashSet::new();
    let mut lines = Vec::new();

    for line in content.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty()
            || trimmed.starts_with("WEBVTT")
            || trimmed.starts_with("Kind:")
            || trimmed.starts_with("Language:")
            || trimmed.starts_with("NOTE")
            || trimmed.starts_with("STYLE")
            || trimmed.contains("-->")
        {
            continue;
        }

        let text = TAG.replace_all(trimmed, "");
        let text = decode_entities(text.trim());
        if text.is_empty() {
            continue;
        }

        if seen.insert(text.clone()) {
            lines.push(text);
        }
    }

    lines.join(" ")
}

fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
        .trim()
        .to_string()
}
