use std::path::PathBuf;

/// Format a view count the way YouTube does (`1.2K`, `3.4M`)
pub fn format_views(views: u64) -> String {
    if views >= 1_000_000 {
        format!("{:.1}M", views as f64 / 1_000_000.0)
    } else if views >= 1_000 {
        format!("{:.1}K", views as f64 / 1_000.0)
    } else {
        views.to_string()
    }
}

/// Format duration in human-readable format
pub fn format_duration(seconds: u64) -> String {
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;

    if hours > 0 {
        format!("{}h {}m {}s", hours, minutes, secs)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, secs)
    } else {
        format!("{}s", secs)
    }
}

/// Convert a minute count from the command line into seconds. Saturates, so an
/// absurdly large bound stays a huge bound instead of wrapping.
pub fn minutes_to_seconds(minutes: u64) -> u64 {
    minutes.saturating_mul(60)
}

/// Shorten `s` to at most `max` characters, marking the cut with `...`
pub fn truncate_chars(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }

    let mut truncated: String = s.chars().take(max).collect();
    truncated.push_str("...");
    truncated
}

/// Export file name for a run, e.g. `transcripts_20260301_142501.txt`
pub fn default_output_filename(extension: &str) -> String {
    let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
    format!("transcripts_{}.{}", timestamp, extension)
}

/// Where an export lands when no explicit path was given
pub fn default_output_path(output_dir: Option<&PathBuf>, extension: &str) -> PathBuf {
    let file_name = default_output_filename(extension);
    match output_dir {
        Some(dir) => dir.join(file_name),
        None => PathBuf::from(file_name),
    }
}

/// Check that the external tools the provider shells out to are installed
pub async fn check_dependencies(yt_dlp_path: &str) -> Vec<String> {
    let mut missing = Vec::new();

    if !check_command_available(yt_dlp_path).await {
        missing.push(format!("{} - required to list videos and download subtitles", yt_dlp_path));
    }

    missing
}

/// Check if a command is available in PATH
async fn check_command_available(command: &str) -> bool {
    use tokio::process::Command;

    Command::new(command)
        .arg("--version")
        .output()
        .await
        .map(|output| output.status.success())
        .unwrap_or(false)
}
