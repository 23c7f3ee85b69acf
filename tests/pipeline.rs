//! End-to-end collection runs against an in-memory provider.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

use transcript_collector::collector::{
    CollectionEvent, Collector, CollectorSettings, Constraints, CoordinatorSettings, FetchOutcome,
    SortKey,
};
use transcript_collector::provider::{
    FailureReason, ProviderError, TrackKind, TranscriptProvider, VideoDescriptor, VideoRef,
};
use transcript_collector::CollectorError;

/// Scripted behaviour of `fetch_transcript` for one video
#[derive(Clone)]
struct Script {
    delay: Duration,
    transient_failures: usize,
    result: Result<String, ProviderError>,
}

impl Script {
    fn delayed(ms: u64) -> Self {
        Self {
            delay: Duration::from_millis(ms),
            transient_failures: 0,
            result: Ok("scripted transcript".to_string()),
        }
    }

    fn failing(error: ProviderError) -> Self {
        Self {
            delay: Duration::ZERO,
            transient_failures: 0,
            result: Err(error),
        }
    }
}

#[derive(Default)]
struct ScriptedProvider {
    listing: Vec<VideoDescriptor>,
    languages: HashMap<String, Vec<&'static str>>,
    scripts: HashMap<String, Script>,
    describe_failures: usize,
    attempts: Mutex<HashMap<String, usize>>,
    list_limits: Mutex<Vec<usize>>,
    list_orders: Mutex<Vec<SortKey>>,
    describe_calls: AtomicUsize,
    fetch_calls: AtomicUsize,
}

impl ScriptedProvider {
    fn new(listing: Vec<VideoDescriptor>) -> Self {
        Self {
            listing,
            ..Default::default()
        }
    }

    fn script(mut self, id: &str, script: Script) -> Self {
        self.scripts.insert(id.to_string(), script);
        self
    }

    fn with_languages(mut self, id: &str, languages: Vec<&'static str>) -> Self {
        self.languages.insert(id.to_string(), languages);
        self
    }

    fn list_calls(&self) -> usize {
        self.list_limits.lock().unwrap().len()
    }
}

#[async_trait]
impl TranscriptProvider for ScriptedProvider {
    async fn list_videos(
        &self,
        reference: &VideoRef,
        limit: usize,
        order: SortKey,
    ) -> Result<Vec<VideoDescriptor>, ProviderError> {
        self.list_limits.lock().unwrap().push(limit);
        self.list_orders.lock().unwrap().push(order);
        let videos = match reference {
            VideoRef::Channel { .. } => self.listing.iter().take(limit).cloned().collect(),
            VideoRef::Video { id } => self.listing.iter().filter(|v| &v.id == id).cloned().collect(),
        };
        Ok(videos)
    }

    async fn describe_video(&self, video_id: &str) -> Result<VideoDescriptor, ProviderError> {
        let call = self.describe_calls.fetch_add(1, Ordering::SeqCst);
        if call < self.describe_failures {
            return Err(ProviderError::new(
                FailureReason::RateLimited,
                Some("HTTP Error 429".to_string()),
            ));
        }

        let listed = self
            .listing
            .iter()
            .find(|v| v.id == video_id)
            .cloned()
            .ok_or_else(|| ProviderError::permanent(FailureReason::VideoUnavailable, None))?;

        let languages = self.languages.get(video_id).cloned().unwrap_or_else(|| vec!["en"]);
        Ok(VideoDescriptor {
            original_language: Some(languages[0].to_string()),
            available_languages: languages
                .into_iter()
                .map(|code| (code.to_string(), TrackKind::Manual))
                .collect(),
            complete: true,
            ..listed
        })
    }

    async fn fetch_transcript(&self, video_id: &str, language: &str) -> Result<String, ProviderError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        let attempt = {
            let mut attempts = self.attempts.lock().unwrap();
            let count = attempts.entry(video_id.to_string()).or_insert(0);
            *count += 1;
            *count
        };

        let script = match self.scripts.get(video_id) {
            Some(script) => script.clone(),
            None => return Ok(format!("transcript of {} in {}", video_id, language)),
        };

        tokio::time::sleep(script.delay).await;
        if attempt <= script.transient_failures {
            return Err(ProviderError::new(
                FailureReason::RateLimited,
                Some("HTTP Error 429: Too Many Requests".to_string()),
            ));
        }

        script
            .result
            .map(|text| format!("{} for {} in {}", text, video_id, language))
    }

    async fn protocol_version(&self) -> Result<String, ProviderError> {
        Ok("2026.03.01".to_string())
    }
}

fn video(id: &str, views: u64) -> VideoDescriptor {
    VideoDescriptor {
        id: id.to_string(),
        title: format!("Video {}", id),
        duration_seconds: 600,
        view_count: views,
        upload_date: None,
        original_language: Some("en".to_string()),
        available_languages: BTreeMap::from([("en".to_string(), TrackKind::Manual)]),
        complete: true,
    }
}

fn channel() -> VideoRef {
    VideoRef::Channel {
        url: "https://www.youtube.com/@scripted/videos".to_string(),
    }
}

fn settings(concurrency: usize) -> CollectorSettings {
    CollectorSettings {
        coordinator: CoordinatorSettings {
            concurrency,
            max_retries: 2,
            retry_backoff: Duration::from_millis(1),
            fetch_timeout: Duration::from_secs(10),
        },
        fallback_languages: vec!["en".to_string(), "ru".to_string()],
        candidate_multiplier: 3,
        min_version: Some("2026.02.04".to_string()),
    }
}

fn ids(outcomes: &[FetchOutcome]) -> Vec<&str> {
    outcomes.iter().map(|o| o.video_id()).collect()
}

fn twelve_videos() -> Vec<VideoDescriptor> {
    [500, 2_000, 15_000, 800, 3_000, 120_000, 999, 1_000, 45_000, 7_000, 1_500, 50]
        .iter()
        .enumerate()
        .map(|(i, views)| video(&format!("v{:02}", i), *views))
        .collect()
}

#[tokio::test]
async fn test_top_five_by_views_with_min_views() {
    let provider = Arc::new(ScriptedProvider::new(twelve_videos()));
    let collector = Collector::new(provider.clone(), settings(4));

    let constraints = Constraints {
        min_views: Some(1_000),
        ..Constraints::top(5)
    };
    let result = collector.collect(&channel(), &constraints).await.unwrap();

    assert_eq!(ids(&result.outcomes), vec!["v05", "v08", "v02", "v09", "v04"]);
    assert_eq!(result.success_count, 5);
    assert_eq!(result.failure_count, 0);
    assert_eq!(result.videos.len(), result.outcomes.len());
    assert_eq!(*provider.list_limits.lock().unwrap(), vec![15]);
    assert_eq!(*provider.list_orders.lock().unwrap(), vec![SortKey::Views]);
    assert!(result.warnings.is_empty());

    match &result.outcomes[0] {
        FetchOutcome::Success { language, text, .. } => {
            assert_eq!(language, "en");
            assert_eq!(text, "transcript of v05 in en");
        }
        other => panic!("unexpected outcome {:?}", other),
    }
}

#[tokio::test]
async fn test_order_survives_slow_first_item() {
    let listing: Vec<_> = (0..5).map(|i| video(&format!("v{}", i), 1_000 - i)).collect();
    let provider = ScriptedProvider::new(listing)
        .script("v0", Script::delayed(300))
        .script("v1", Script::delayed(5))
        .script("v4", Script::delayed(20));

    let collector = Collector::new(Arc::new(provider), settings(4));
    let result = collector.collect(&channel(), &Constraints::top(5)).await.unwrap();

    assert_eq!(ids(&result.outcomes), vec!["v0", "v1", "v2", "v3", "v4"]);
    assert_eq!(result.success_count, 5);
}

#[tokio::test]
async fn test_one_failure_does_not_affect_the_others() {
    let listing: Vec<_> = (0..5).map(|i| video(&format!("v{}", i), 1_000 - i)).collect();
    let provider = ScriptedProvider::new(listing).script(
        "v2",
        Script::failing(ProviderError::new(
            FailureReason::TranscriptsDisabled,
            Some("Subtitles are disabled for this video".to_string()),
        )),
    );

    let collector = Collector::new(Arc::new(provider), settings(3));
    let result = collector.collect(&channel(), &Constraints::top(5)).await.unwrap();

    assert_eq!(result.success_count, 4);
    assert_eq!(result.failure_count, 1);
    assert!(matches!(
        &result.outcomes[2],
        FetchOutcome::Failure { video_id, reason: FailureReason::TranscriptsDisabled, .. } if video_id == "v2"
    ));
    assert_eq!(result.diagnostics.len(), 1);
    assert_eq!(result.diagnostics[0].video_id, "v2");
}

#[tokio::test]
async fn test_transient_failures_recover() {
    let mut flaky = Script::delayed(0);
    flaky.transient_failures = 2;
    let provider = Arc::new(ScriptedProvider::new(vec![video("v0", 10)]).script("v0", flaky));

    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let collector = Collector::new(provider.clone(), settings(1)).with_events(tx);
    let result = collector.collect(&channel(), &Constraints::top(1)).await.unwrap();
    drop(collector);

    assert_eq!(result.success_count, 1);
    assert_eq!(provider.fetch_calls.load(Ordering::SeqCst), 3);

    let mut retries = 0;
    while let Some(event) = rx.recv().await {
        if let CollectionEvent::Retrying { reason, .. } = event {
            assert_eq!(reason, FailureReason::RateLimited);
            retries += 1;
        }
    }
    assert_eq!(retries, 2);
}

#[tokio::test]
async fn test_repeated_runs_are_identical() {
    let provider = ScriptedProvider::new(twelve_videos()).script(
        "v09",
        Script::failing(ProviderError::new(FailureReason::VideoUnavailable, None)),
    );
    let collector = Collector::new(Arc::new(provider), settings(4));
    let constraints = Constraints {
        sort_key: SortKey::Views,
        min_views: Some(1_000),
        ..Constraints::top(6)
    };

    let first = collector.collect(&channel(), &constraints).await.unwrap();
    let second = collector.collect(&channel(), &constraints).await.unwrap();

    assert_eq!(first.outcomes, second.outcomes);
    assert_eq!(first.videos, second.videos);
    assert_eq!(first.success_count, second.success_count);
}

#[tokio::test]
async fn test_invalid_constraints_fail_before_listing() {
    let provider = Arc::new(ScriptedProvider::new(twelve_videos()));
    let collector = Collector::new(provider.clone(), settings(4));

    let constraints = Constraints {
        min_duration_seconds: Some(1_200),
        max_duration_seconds: Some(60),
        ..Constraints::top(5)
    };
    let error = collector.collect(&channel(), &constraints).await.unwrap_err();

    assert!(matches!(error, CollectorError::ConstraintViolation(_)));
    assert_eq!(provider.list_calls(), 0);
}

#[tokio::test]
async fn test_no_matching_videos_is_an_empty_result() {
    let provider = Arc::new(ScriptedProvider::new(twelve_videos()));
    let collector = Collector::new(provider.clone(), settings(4));

    let constraints = Constraints {
        min_views: Some(10_000_000),
        ..Constraints::top(5)
    };
    let result = collector.collect(&channel(), &constraints).await.unwrap();

    assert!(result.outcomes.is_empty());
    assert_eq!(result.success_count, 0);
    assert_eq!(provider.fetch_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_cancellation_keeps_finished_work() {
    let listing: Vec<_> = (0..4).map(|i| video(&format!("v{}", i), 1_000 - i)).collect();
    let provider = ScriptedProvider::new(listing)
        .script("v0", Script::delayed(0))
        .script("v1", Script::delayed(10_000))
        .script("v2", Script::delayed(10_000))
        .script("v3", Script::delayed(10_000));

    let token = CancellationToken::new();
    let collector = Collector::new(Arc::new(provider), settings(2)).with_cancellation(token.clone());

    let canceller = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        token.cancel();
    });

    let started = Instant::now();
    let result = collector.collect(&channel(), &Constraints::top(4)).await.unwrap();
    canceller.await.unwrap();

    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(ids(&result.outcomes), vec!["v0", "v1", "v2", "v3"]);
    assert!(result.outcomes[0].is_success());
    for outcome in &result.outcomes[1..] {
        assert!(matches!(
            outcome,
            FetchOutcome::Failure { reason: FailureReason::Cancelled, .. }
        ));
    }
    assert_eq!(result.success_count, 1);
    assert_eq!(result.failure_count, 3);
}

#[tokio::test]
async fn test_cancelled_before_start() {
    let provider = Arc::new(ScriptedProvider::new(twelve_videos()));
    let token = CancellationToken::new();
    token.cancel();

    let collector = Collector::new(provider.clone(), settings(4)).with_cancellation(token);
    let error = collector.collect(&channel(), &Constraints::top(3)).await.unwrap_err();

    assert!(matches!(error, CollectorError::Cancelled));
    assert_eq!(provider.list_calls(), 0);
}

#[tokio::test]
async fn test_flat_listing_is_hydrated_for_selected_videos_only() {
    let listing: Vec<_> = (0..6)
        .map(|i| VideoDescriptor {
            original_language: None,
            available_languages: BTreeMap::new(),
            complete: false,
            ..video(&format!("v{}", i), 100 * (i + 1))
        })
        .collect();
    let provider = Arc::new(
        ScriptedProvider::new(listing)
            .with_languages("v5", vec!["de", "en"])
            .with_languages("v4", vec!["ru"]),
    );

    let collector = Collector::new(provider.clone(), settings(3));
    let result = collector.collect(&channel(), &Constraints::top(3)).await.unwrap();

    assert_eq!(provider.describe_calls.load(Ordering::SeqCst), 3);
    assert_eq!(ids(&result.outcomes), vec!["v5", "v4", "v3"]);

    let languages: Vec<_> = result
        .outcomes
        .iter()
        .map(|o| match o {
            FetchOutcome::Success { language, .. } => language.as_str(),
            FetchOutcome::Failure { .. } => "-",
        })
        .collect();
    assert_eq!(languages, vec!["de", "ru", "en"]);
    assert!(result.videos.iter().all(|v| v.complete));
    assert_eq!(result.videos[0].view_count, 600);
}

#[tokio::test]
async fn test_video_without_transcripts_is_not_fetched() {
    let mut silent = video("silent00000", 5_000);
    silent.available_languages.clear();
    let provider = Arc::new(ScriptedProvider::new(vec![silent, video("talky000000", 10)]));

    let collector = Collector::new(provider.clone(), settings(2));
    let result = collector.collect(&channel(), &Constraints::top(2)).await.unwrap();

    assert!(matches!(
        &result.outcomes[0],
        FetchOutcome::Failure { reason: FailureReason::NoTranscript, .. }
    ));
    assert!(result.outcomes[1].is_success());
    assert_eq!(provider.fetch_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_single_video_reference() {
    let provider = Arc::new(ScriptedProvider::new(twelve_videos()));
    let collector = Collector::new(provider.clone(), settings(4));

    let reference = VideoRef::Video { id: "v03".to_string() };
    let result = collector.collect(&reference, &Constraints::top(10)).await.unwrap();

    assert_eq!(ids(&result.outcomes), vec!["v03"]);
    assert_eq!(*provider.list_limits.lock().unwrap(), vec![1]);
    assert_eq!(result.source, "https://www.youtube.com/watch?v=v03");
}

#[tokio::test]
async fn test_rate_limited_lookup_is_retried() {
    let mut listed = video("v0", 10);
    listed.complete = false;
    listed.available_languages.clear();
    let provider = Arc::new(ScriptedProvider {
        describe_failures: 1,
        ..ScriptedProvider::new(vec![listed])
    });

    let collector = Collector::new(provider.clone(), settings(1));
    let result = collector.collect(&channel(), &Constraints::top(1)).await.unwrap();

    assert_eq!(provider.describe_calls.load(Ordering::SeqCst), 2);
    assert_eq!(result.success_count, 1);
}

#[tokio::test]
async fn test_date_sort_asks_for_newest_listing() {
    let provider = Arc::new(ScriptedProvider::new(twelve_videos()));
    let collector = Collector::new(provider.clone(), settings(4));

    let constraints = Constraints {
        sort_key: SortKey::Date,
        ..Constraints::top(2)
    };
    let result = collector.collect(&channel(), &constraints).await.unwrap();

    assert_eq!(*provider.list_orders.lock().unwrap(), vec![SortKey::Date]);
    // Undated listing entries keep the provider's newest-first order
    assert_eq!(ids(&result.outcomes), vec!["v00", "v01"]);
}
