use futures_util::FutureExt;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use super::{CollectionEvent, EventSink, FetchOutcome, WorkItem};
use crate::provider::{FailureReason, ProviderError, TranscriptProvider, VideoDescriptor};

#[derive(Debug, Clone)]
pub struct CoordinatorSettings {
    /// Maximum fetches in flight
    pub concurrency: usize,
    /// Retries after the first attempt, transient failures only
    pub max_retries: u32,
    /// Delay before the first retry, doubled for each further one
    pub retry_backoff: Duration,
    /// Deadline for a single attempt
    pub fetch_timeout: Duration,
}

impl Default for CoordinatorSettings {
    fn default() -> Self {
        Self {
            concurrency: 4,
            max_retries: 2,
            retry_backoff: Duration::from_millis(500),
            fetch_timeout: Duration::from_secs(90),
        }
    }
}

impl CoordinatorSettings {
    fn backoff(&self, attempt: u32) -> Duration {
        self.retry_backoff
            .saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)))
    }
}

/// State of one result slot
enum Slot<T> {
    /// Never dispatched, or abandoned on cancellation
    Empty,
    Done(T),
    Panicked(String),
}

/// Bounded worker pool writing each result into the slot of its input index
pub struct Coordinator {
    provider: Arc<dyn TranscriptProvider>,
    settings: CoordinatorSettings,
    events: EventSink,
    cancel: CancellationToken,
}

impl Coordinator {
    pub fn new(
        provider: Arc<dyn TranscriptProvider>,
        settings: CoordinatorSettings,
        events: EventSink,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            provider,
            settings,
            events,
            cancel,
        }
    }

    /// Fetch transcripts for `items`. The output has one outcome per item, in input order.
    pub async fn run(&self, items: Vec<WorkItem>) -> Vec<FetchOutcome> {
        if items.is_empty() {
            return Vec::new();
        }

        tracing::info!(
            "Fetching {} transcripts with {} workers",
            items.len(),
            self.settings.concurrency.max(1)
        );

        let ids: Vec<String> = items.iter().map(|item| item.descriptor.id.clone()).collect();
        let provider = Arc::clone(&self.provider);
        let settings = self.settings.clone();
        let events = self.events.clone();

        let slots = self
            .run_slots(items, move |item| {
                fetch_with_retry(Arc::clone(&provider), settings.clone(), events.clone(), item)
            })
            .await;

        slots
            .into_iter()
            .zip(ids)
            .map(|(slot, video_id)| {
                let outcome = match slot {
                    Slot::Done(outcome) => return outcome,
                    Slot::Empty => FetchOutcome::cancelled(video_id),
                    Slot::Panicked(message) => {
                        tracing::error!("Worker for {} panicked: {}", video_id, message);
                        FetchOutcome::Failure {
                            video_id,
                            reason: FailureReason::Internal,
                            detail: Some(format!("worker panicked: {}", message)),
                        }
                    }
                };
                self.events.emit(CollectionEvent::Completed {
                    video_id: outcome.video_id().to_string(),
                    status: outcome.status(),
                });
                outcome
            })
            .collect()
    }

    /// Complete descriptors that came from a flat listing. Already complete ones are
    /// passed through without a provider call. Output order matches input order.
    pub async fn hydrate(
        &self,
        descriptors: Vec<VideoDescriptor>,
    ) -> Vec<Result<VideoDescriptor, ProviderError>> {
        if descriptors.iter().all(|d| d.complete) {
            return descriptors.into_iter().map(Ok).collect();
        }

        let provider = Arc::clone(&self.provider);
        let settings = self.settings.clone();
        let events = self.events.clone();

        let slots = self
            .run_slots(descriptors, move |descriptor| {
                let provider = Arc::clone(&provider);
                let settings = settings.clone();
                let events = events.clone();
                async move {
                    if descriptor.complete {
                        return Ok(descriptor);
                    }
                    tracing::debug!("Looking up transcript languages for {}", descriptor.id);
                    let video_id = descriptor.id.clone();
                    let full = call_with_retry(&settings, &events, &video_id, || {
                        provider.describe_video(&video_id)
                    })
                    .await?;
                    Ok(merge_listing(descriptor, full))
                }
            })
            .await;

        slots
            .into_iter()
            .map(|slot| match slot {
                Slot::Done(result) => result,
                Slot::Empty => Err(ProviderError::permanent(
                    FailureReason::Cancelled,
                    Some("run was cancelled before metadata lookup".to_string()),
                )),
                Slot::Panicked(message) => Err(ProviderError::permanent(
                    FailureReason::Internal,
                    Some(format!("worker panicked: {}", message)),
                )),
            })
            .collect()
    }

    /// Run `work` over `items` with at most `concurrency` tasks in flight.
    ///
    /// Each task returns its own index, and only this loop writes `slots`, once per
    /// index. Cancellation stops dispatching, aborts tasks still running and leaves
    /// their slots empty; results that already arrived are kept.
    async fn run_slots<I, O, F, Fut>(&self, items: Vec<I>, work: F) -> Vec<Slot<O>>
    where
        I: Send + 'static,
        O: Send + 'static,
        F: Fn(I) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = O> + Send + 'static,
    {
        let mut slots: Vec<Slot<O>> = items.iter().map(|_| Slot::Empty).collect();
        let semaphore = Arc::new(Semaphore::new(self.settings.concurrency.max(1)));
        let work = Arc::new(work);
        let mut tasks = JoinSet::new();

        for (index, item) in items.into_iter().enumerate() {
            let permit = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    tracing::warn!("Cancelled with {} items not dispatched", slots.len() - index);
                    break;
                }
                permit = Arc::clone(&semaphore).acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };

            let work = Arc::clone(&work);
            tasks.spawn(async move {
                let _permit = permit;
                let result = AssertUnwindSafe(work(item)).catch_unwind().await;
                (index, result)
            });
        }

        let mut aborted = false;
        loop {
            let joined = if aborted {
                tasks.join_next().await
            } else {
                tokio::select! {
                    biased;
                    joined = tasks.join_next() => joined,
                    _ = self.cancel.cancelled() => {
                        tracing::warn!("Cancelled with {} tasks in flight", tasks.len());
                        tasks.abort_all();
                        aborted = true;
                        continue;
                    }
                }
            };

            match joined {
                Some(Ok((index, Ok(output)))) => slots[index] = Slot::Done(output),
                Some(Ok((index, Err(payload)))) => slots[index] = Slot::Panicked(panic_message(payload)),
                // Aborted task; its slot stays empty
                Some(Err(e)) => tracing::debug!("Worker ended without a result: {}", e),
                None => break,
            }
        }

        slots
    }
}

/// Fetch one transcript; transient failures are retried by [`call_with_retry`]
async fn fetch_with_retry(
    provider: Arc<dyn TranscriptProvider>,
    settings: CoordinatorSettings,
    events: EventSink,
    item: WorkItem,
) -> FetchOutcome {
    let video_id = item.descriptor.id.clone();
    let language = item.language.clone();
    events.emit(CollectionEvent::Started {
        video_id: video_id.clone(),
        language: language.clone(),
    });

    let result = call_with_retry(&settings, &events, &video_id, || {
        provider.fetch_transcript(&video_id, &language)
    })
    .await;

    let outcome = match result {
        Ok(text) if text.trim().is_empty() => FetchOutcome::Failure {
            video_id: video_id.clone(),
            reason: FailureReason::EmptyTranscript,
            detail: Some(format!("{} transcript is empty", language)),
        },
        Ok(text) => {
            tracing::info!("Fetched {} transcript for {} ({} chars)", language, video_id, text.len());
            FetchOutcome::Success {
                video_id: video_id.clone(),
                language: language.clone(),
                text,
            }
        }
        Err(error) => {
            tracing::warn!("Failed to fetch transcript for {}: {}", video_id, error);
            FetchOutcome::failure(video_id.clone(), &error)
        }
    };

    events.emit(CollectionEvent::Completed {
        video_id,
        status: outcome.status(),
    });
    outcome
}

/// Run one provider call under the per-attempt deadline, retrying transient
/// failures with exponential backoff up to `max_retries` times
async fn call_with_retry<T, F, Fut>(
    settings: &CoordinatorSettings,
    events: &EventSink,
    video_id: &str,
    mut call: F,
) -> Result<T, ProviderError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ProviderError>>,
{
    let mut attempt = 0;
    loop {
        let result = match tokio::time::timeout(settings.fetch_timeout, call()).await {
            Ok(result) => result,
            Err(_) => Err(ProviderError::transient(
                FailureReason::Timeout,
                Some(format!("no response within {}s", settings.fetch_timeout.as_secs())),
            )),
        };

        match result {
            Err(error) if error.is_transient() && attempt < settings.max_retries => {
                attempt += 1;
                let delay = settings.backoff(attempt);
                tracing::warn!(
                    "Retrying {} in {:?} (attempt {}/{}): {}",
                    video_id,
                    delay,
                    attempt,
                    settings.max_retries,
                    error
                );
                events.emit(CollectionEvent::Retrying {
                    video_id: video_id.to_string(),
                    attempt,
                    reason: error.reason,
                });
                tokio::time::sleep(delay).await;
            }
            other => return other,
        }
    }
}

/// Keep listing fields the detailed lookup did not report
fn merge_listing(listed: VideoDescriptor, mut full: VideoDescriptor) -> VideoDescriptor {
    if full.view_count == 0 {
        full.view_count = listed.view_count;
    }
    if full.duration_seconds == 0 {
        full.duration_seconds = listed.duration_seconds;
    }
    if full.upload_date.is_none() {
        full.upload_date = listed.upload_date;
    }
    full.complete = true;
    full
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
