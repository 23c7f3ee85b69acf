use async_trait::async_trait;
use chrono::{DateTime, NaiveDate};
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use std::time::Duration;
use tempfile::TempDir;
use tokio::process::Command;

use super::vtt::clean_vtt;
use super::{FailureReason, ProviderError, TrackKind, TranscriptProvider, VideoDescriptor, VideoRef};
use crate::collector::SortKey;
use crate::config::ProviderConfig;
use crate::utils::truncate_chars;

const STDERR_DETAIL_CHARS: usize = 200;

/// Provider backed by the yt-dlp command line tool
pub struct YtDlpProvider {
    yt_dlp_path: String,
    cookies_from_browser: Option<String>,
    list_timeout: Duration,
    lookup_timeout: Duration,
}

/// Subset of the yt-dlp JSON info dict that we use
#[derive(Debug, Deserialize)]
struct InfoDict {
    id: String,
    title: Option<String>,
    duration: Option<f64>,
    view_count: Option<u64>,
    upload_date: Option<String>,
    /// Flat listings carry no `upload_date`, only these (approximate) timestamps
    timestamp: Option<i64>,
    release_timestamp: Option<i64>,
    language: Option<String>,
    #[serde(default)]
    subtitles: Option<HashMap<String, serde_json::Value>>,
    #[serde(default)]
    automatic_captions: Option<HashMap<String, serde_json::Value>>,
}

impl InfoDict {
    fn into_descriptor(self, complete: bool) -> VideoDescriptor {
        let mut available_languages = BTreeMap::new();
        for code in self.automatic_captions.unwrap_or_default().into_keys() {
            available_languages.insert(code, TrackKind::Automatic);
        }
        // Creator-uploaded tracks win over automatic ones with the same code
        for code in self.subtitles.unwrap_or_default().into_keys() {
            if code != "live_chat" {
                available_languages.insert(code, TrackKind::Manual);
            }
        }

        VideoDescriptor {
            title: self.title.unwrap_or_else(|| self.id.clone()),
            duration_seconds: self.duration.map(|d| d.max(0.0) as u64).unwrap_or(0),
            view_count: self.view_count.unwrap_or(0),
            upload_date: self
                .upload_date
                .as_deref()
                .and_then(|d| NaiveDate::parse_from_str(d, "%Y%m%d").ok())
                .or_else(|| {
                    self.timestamp
                        .or(self.release_timestamp)
                        .and_then(|ts| DateTime::from_timestamp(ts, 0))
                        .map(|dt| dt.date_naive())
                }),
            original_language: self
                .language
                .map(|l| l.trim().to_string())
                .filter(|l| !l.is_empty()),
            available_languages,
            complete,
            id: self.id,
        }
    }
}

impl YtDlpProvider {
    pub fn new(config: &ProviderConfig) -> Self {
        Self {
            yt_dlp_path: config.yt_dlp_path.clone(),
            cookies_from_browser: config.cookies_from_browser.clone(),
            list_timeout: Duration::from_secs(config.list_timeout_secs),
            lookup_timeout: Duration::from_secs(config.lookup_timeout_secs),
        }
    }

    /// Base command with the shared flags. Child processes are killed when the
    /// owning future is dropped, so timeouts and cancellation do not leak them.
    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.yt_dlp_path);
        if let Some(browser) = &self.cookies_from_browser {
            cmd.args(["--cookies-from-browser", browser.as_str()]);
        }
        cmd.stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }

    async fn run(&self, mut cmd: Command, limit: Duration) -> Result<Output, ProviderError> {
        match tokio::time::timeout(limit, cmd.output()).await {
            Ok(Ok(output)) => Ok(output),
            Ok(Err(e)) => Err(ProviderError::permanent(
                FailureReason::ToolUnavailable,
                Some(format!("failed to run {}: {}", self.yt_dlp_path, e)),
            )),
            Err(_) => Err(ProviderError::transient(
                FailureReason::Timeout,
                Some(format!("yt-dlp did not finish within {}s", limit.as_secs())),
            )),
        }
    }

    async fn dump_single(&self, url: &str) -> Result<VideoDescriptor, ProviderError> {
        tracing::debug!("Extracting video info for: {}", url);

        let mut cmd = self.command();
        cmd.args(["--dump-json", "--skip-download", "--no-playlist", "--no-warnings", url]);

        let output = self.run(cmd, self.lookup_timeout).await?;
        if !output.status.success() {
            return Err(classify_stderr(&String::from_utf8_lossy(&output.stderr)));
        }

        let info: InfoDict = serde_json::from_slice(&output.stdout).map_err(|e| {
            ProviderError::permanent(
                FailureReason::ProviderFailure,
                Some(format!("unreadable yt-dlp JSON: {}", e)),
            )
        })?;

        Ok(info.into_descriptor(true))
    }

    async fn list_channel(
        &self,
        url: &str,
        limit: usize,
        order: SortKey,
    ) -> Result<Vec<VideoDescriptor>, ProviderError> {
        let url = channel_listing_url(url, order);
        tracing::info!("Listing up to {} videos from {}", limit, url);

        let playlist_end = limit.to_string();
        let mut cmd = self.command();
        cmd.args([
            "--flat-playlist",
            "--dump-json",
            "--no-warnings",
            "--extractor-args",
            "youtubetab:approximate_date",
            "--playlist-end",
            playlist_end.as_str(),
            url.as_str(),
        ]);

        let output = self.run(cmd, self.list_timeout).await?;
        if !output.status.success() {
            return Err(classify_stderr(&String::from_utf8_lossy(&output.stderr)));
        }

        Ok(parse_flat_listing(&String::from_utf8_lossy(&output.stdout)))
    }
}

#[async_trait]
impl TranscriptProvider for YtDlpProvider {
    async fn list_videos(
        &self,
        reference: &VideoRef,
        limit: usize,
        order: SortKey,
    ) -> Result<Vec<VideoDescriptor>, ProviderError> {
        match reference {
            VideoRef::Channel { url } => self.list_channel(url, limit, order).await,
            VideoRef::Video { .. } => Ok(vec![self.dump_single(&reference.url()).await?]),
        }
    }

    async fn describe_video(&self, video_id: &str) -> Result<VideoDescriptor, ProviderError> {
        self.dump_single(&VideoRef::watch_url(video_id)).await
    }

    async fn fetch_transcript(&self, video_id: &str, language: &str) -> Result<String, ProviderError> {
        let workdir = TempDir::new().map_err(|e| {
            ProviderError::permanent(
                FailureReason::Internal,
                Some(format!("failed to create temporary directory: {}", e)),
            )
        })?;
        let template = workdir.path().join(video_id);

        let mut cmd = self.command();
        cmd.args([
            "--write-subs",
            "--write-auto-subs",
            "--sub-langs",
            language,
            "--sub-format",
            "vtt",
            "--skip-download",
            "--no-warnings",
            "--no-progress",
            "-o",
        ])
        .arg(&template)
        .arg(VideoRef::watch_url(video_id));

        tracing::debug!("Downloading {} subtitles for {}", language, video_id);

        // The coordinator applies its own per-item deadline; this one only
        // bounds a hung child process.
        let output = self.run(cmd, self.list_timeout).await?;
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();

        let Some(path) = find_subtitle_file(workdir.path(), language).await else {
            if !output.status.success() || !stderr.trim().is_empty() {
                let error = classify_stderr(&stderr);
                if error.reason != FailureReason::ProviderFailure {
                    return Err(error);
                }
            }
            return Err(ProviderError::permanent(
                FailureReason::LanguageUnavailable,
                Some(format!("no {} subtitles were written", language)),
            ));
        };

        let content = tokio::fs::read_to_string(&path).await.map_err(|e| {
            ProviderError::permanent(
                FailureReason::Internal,
                Some(format!("failed to read {}: {}", path.display(), e)),
            )
        })?;

        let text = clean_vtt(&content);
        if text.is_empty() {
            return Err(ProviderError::permanent(
                FailureReason::EmptyTranscript,
                Some(format!("{} subtitles contain no text", language)),
            ));
        }

        Ok(text)
    }

    async fn protocol_version(&self) -> Result<String, ProviderError> {
        let mut cmd = self.command();
        cmd.arg("--version");

        let output = self.run(cmd, self.lookup_timeout).await?;
        if !output.status.success() {
            return Err(classify_stderr(&String::from_utf8_lossy(&output.stderr)));
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

/// Parse `--flat-playlist --dump-json` output, one JSON object per line
fn parse_flat_listing(stdout: &str) -> Vec<VideoDescriptor> {
    stdout
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| match serde_json::from_str::<InfoDict>(line) {
            Ok(info) => Some(info.into_descriptor(false)),
            Err(e) => {
                tracing::debug!("Skipping unreadable listing entry: {}", e);
                None
            }
        })
        .collect()
}

/// Videos tab URL for a listing order. `?sort=p` makes YouTube list the most
/// popular uploads first; the plain tab is newest first.
fn channel_listing_url(url: &str, order: SortKey) -> String {
    let base = url.split('?').next().unwrap_or(url).trim_end_matches('/');
    match order {
        SortKey::Views => format!("{}?sort=p", base),
        SortKey::Date => base.to_string(),
    }
}

/// Locate the subtitle file yt-dlp wrote for exactly `language`
async fn find_subtitle_file(dir: &Path, language: &str) -> Option<PathBuf> {
    let suffix = format!(".{}.vtt", language);

    let mut entries = tokio::fs::read_dir(dir).await.ok()?;
    while let Ok(Some(entry)) = entries.next_entry().await {
        if entry.file_name().to_string_lossy().ends_with(&suffix) {
            return Some(entry.path());
        }
    }

    None
}

/// Map yt-dlp stderr onto a failure reason
pub fn classify_stderr(stderr: &str) -> ProviderError {
    let lower = stderr.to_lowercase();
    let detail = Some(truncate_chars(stderr.trim(), STDERR_DETAIL_CHARS)).filter(|d| !d.is_empty());

    let reason = if lower.contains("sign in to confirm") || lower.contains("captcha") {
        FailureReason::CaptchaRequired
    } else if lower.contains("429") || lower.contains("rate limit") || lower.contains("too many requests") {
        FailureReason::RateLimited
    } else if lower.contains("cookies") && lower.contains("error") {
        FailureReason::Cookies
    } else if lower.contains("sig function possibilities")
        || lower.contains("signature solving failed")
        || lower.contains("n challenge solving failed")
        || lower.contains("only images are available")
    {
        FailureReason::SignatureChallenge
    } else if lower.contains("private video")
        || lower.contains("video unavailable")
        || lower.contains("has been removed")
        || lower.contains("members-only")
        || lower.contains("does not exist")
    {
        FailureReason::VideoUnavailable
    } else if lower.contains("subtitles are disabled") || lower.contains("no subtitles") {
        FailureReason::TranscriptsDisabled
    } else if lower.contains("timed out")
        || lower.contains("connection reset")
        || lower.contains("temporary failure in name resolution")
        || lower.contains("unable to download")
    {
        FailureReason::Network
    } else {
        FailureReason::ProviderFailure
    };

    ProviderError::new(reason, detail)
}
