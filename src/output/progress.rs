use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;

use crate::collector::{CollectionEvent, OutcomeStatus};

/// Renders collection events as a spinner during listing and a bar while
/// transcripts are fetched.
pub struct ProgressReporter {
    bar: ProgressBar,
    quiet: bool,
    in_flight: HashMap<String, String>,
}

impl ProgressReporter {
    pub fn new(quiet: bool) -> Self {
        let bar = if quiet {
            ProgressBar::hidden()
        } else {
            let spinner = ProgressBar::new_spinner();
            spinner.set_style(
                ProgressStyle::default_spinner()
                    .template("{spinner:.green} [{elapsed_precise}] {msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_spinner()),
            );
            spinner.enable_steady_tick(Duration::from_millis(120));
            spinner
        };
        bar.set_message("Listing videos...");

        Self {
            bar,
            quiet,
            in_flight: HashMap::new(),
        }
    }

    /// Drain `events` on a background task until every sender is dropped
    pub fn spawn(mut self, mut events: UnboundedReceiver<CollectionEvent>) -> JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                self.handle(&event);
            }
            self.bar.finish_and_clear();
        })
    }

    pub fn handle(&mut self, event: &CollectionEvent) {
        match event {
            CollectionEvent::VersionWarning(warning) => {
                self.println(format!("{} {}", style("⚠").yellow().bold(), warning));
            }
            CollectionEvent::Listed { count } => {
                self.bar.set_message(format!("Found {} candidate videos", count));
            }
            CollectionEvent::Selected { count } => {
                self.bar.set_length(*count as u64);
                self.bar.set_position(0);
                self.bar.set_style(
                    ProgressStyle::default_bar()
                        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                        .unwrap_or_else(|_| ProgressStyle::default_bar()),
                );
                self.bar.set_message("Fetching transcripts...");
            }
            CollectionEvent::Started { video_id, language } => {
                self.in_flight.insert(video_id.clone(), language.clone());
                self.bar.set_message(format!("{} ({})", video_id, language));
            }
            CollectionEvent::Retrying { video_id, attempt, reason } => {
                tracing::debug!("Retrying {} (attempt {}): {}", video_id, attempt, reason);
                self.bar
                    .set_message(format!("{} retry {} after {}", video_id, attempt, reason));
            }
            CollectionEvent::Completed { video_id, status } => {
                let language = self.in_flight.remove(video_id);
                self.bar.inc(1);

                let line = match status {
                    OutcomeStatus::Succeeded => format!(
                        "  {} {} {}",
                        style("✓").green(),
                        video_id,
                        style(language.unwrap_or_default()).dim()
                    ),
                    OutcomeStatus::Failed(reason) => {
                        format!("  {} {} {}", style("✗").red(), video_id, style(reason).yellow())
                    }
                    OutcomeStatus::Cancelled => {
                        format!("  {} {} {}", style("-").dim(), video_id, style("cancelled").dim())
                    }
                };
                self.println(line);
            }
        }
    }

    fn println(&self, line: String) {
        if !self.quiet {
            self.bar.println(line);
        }
    }
}
