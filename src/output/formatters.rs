use anyhow::Result;
use std::fmt::Write;

use crate::collector::{CollectionResult, FetchOutcome};
use crate::provider::VideoRef;
use crate::utils::{format_duration, format_views};

const RULE_WIDTH: usize = 60;

/// Plain text export: header, table of contents, one block per transcript,
/// then the failures.
pub fn format_as_text(result: &CollectionResult) -> String {
    let rule = "=".repeat(RULE_WIDTH);
    let mut out = String::new();

    let _ = writeln!(out, "Transcripts for {}", result.source);
    if let Some(handle) = &result.channel_handle {
        let _ = writeln!(out, "Channel: {}", handle);
    }
    let _ = writeln!(out, "Collected: {}", chrono::Local::now().format("%Y-%m-%d %H:%M"));
    let _ = writeln!(
        out,
        "Videos: {} ({} with transcripts, {} failed)",
        result.outcomes.len(),
        result.success_count,
        result.failure_count
    );

    if !result.outcomes.is_empty() {
        let _ = writeln!(out, "\nContents:");
        for (index, outcome) in result.outcomes.iter().enumerate() {
            let (title, views) = title_and_views(result, index, outcome);
            let marker = if outcome.is_success() { "" } else { " [no transcript]" };
            let _ = writeln!(out, "  {:>2}. [{}] {}{}", index + 1, views, title, marker);
        }
    }

    for (video, language, text) in result.successes() {
        let _ = writeln!(out, "\n{}", rule);
        if let Some(video) = video {
            let _ = writeln!(out, "{}", video.title);
            let _ = writeln!(out, "{}", video.url());
            let _ = writeln!(
                out,
                "{} views | {} | language: {}",
                format_views(video.view_count),
                format_duration(video.duration_seconds),
                language
            );
        }
        let _ = writeln!(out, "{}\n", rule);
        let _ = writeln!(out, "{}", text);
    }

    if !result.diagnostics.is_empty() {
        let _ = writeln!(out, "\n{}", rule);
        let _ = writeln!(out, "Failed videos:");
        for diagnostic in &result.diagnostics {
            let _ = writeln!(out, "  - {}", diagnostic);
        }
    }

    for warning in &result.warnings {
        let _ = writeln!(out, "\nWarning: {}", warning);
    }

    out
}

/// Markdown export with the same layout as the text one
pub fn format_as_markdown(result: &CollectionResult) -> String {
    let mut out = String::new();

    match &result.channel_handle {
        Some(handle) => {
            let _ = writeln!(out, "# Transcripts for {}\n", handle);
            let _ = writeln!(out, "<{}>\n", result.source);
        }
        None => {
            let _ = writeln!(out, "# Transcripts for {}\n", result.source);
        }
    }
    let _ = writeln!(
        out,
        "_{} of {} videos collected on {}_\n",
        result.success_count,
        result.outcomes.len(),
        chrono::Local::now().format("%Y-%m-%d")
    );

    for warning in &result.warnings {
        let _ = writeln!(out, "> **Warning:** {}\n", warning);
    }

    if !result.outcomes.is_empty() {
        let _ = writeln!(out, "## Contents\n");
        for (index, outcome) in result.outcomes.iter().enumerate() {
            let (title, views) = title_and_views(result, index, outcome);
            if outcome.is_success() {
                let _ = writeln!(out, "{}. {} ({} views)", index + 1, title, views);
            } else {
                let _ = writeln!(out, "{}. ~~{}~~ ({} views)", index + 1, title, views);
            }
        }
        out.push('\n');
    }

    for (video, language, text) in result.successes() {
        match video {
            Some(video) => {
                let _ = writeln!(out, "## {}\n", video.title);
                let _ = writeln!(
                    out,
                    "[{}]({}) | {} views | {} | `{}`\n",
                    video.id,
                    video.url(),
                    format_views(video.view_count),
                    format_duration(video.duration_seconds),
                    language
                );
            }
            None => {
                let _ = writeln!(out, "## Transcript ({})\n", language);
            }
        }
        let _ = writeln!(out, "{}\n", text);
    }

    if !result.diagnostics.is_empty() {
        let _ = writeln!(out, "## Failures\n");
        for diagnostic in &result.diagnostics {
            let _ = writeln!(out, "- `{}`: {}", diagnostic.video_id, diagnostic.reason);
        }
    }

    out
}

/// JSON export of the whole result
pub fn format_as_json(result: &CollectionResult) -> Result<String> {
    Ok(serde_json::to_string_pretty(result)?)
}

fn title_and_views(result: &CollectionResult, index: usize, outcome: &FetchOutcome) -> (String, String) {
    match result.videos.get(index) {
        Some(video) => (video.title.clone(), format_views(video.view_count)),
        None => (VideoRef::watch_url(outcome.video_id()), "?".to_string()),
    }
}
