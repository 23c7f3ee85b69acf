use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use transcript_collector::cli::{Cli, Commands, OutputFormat};
use transcript_collector::collector::{
    is_outdated, Collector, CollectorSettings, Constraints, VideoLister,
};
use transcript_collector::config::Config;
use transcript_collector::output::{self, ProgressReporter};
use transcript_collector::provider::{TranscriptProvider, VideoRef, YtDlpProvider};
use transcript_collector::utils::{self, format_duration, format_views, minutes_to_seconds};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        "transcript_collector=debug"
    } else if cli.quiet {
        "transcript_collector=warn"
    } else {
        "transcript_collector=info"
    };

    // Initialize tracing; stdout is reserved for exported transcripts
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = Config::load().await?;

    if !matches!(cli.command, Commands::Config { .. }) {
        let missing_deps = utils::check_dependencies(&config.provider.yt_dlp_path).await;
        if !missing_deps.is_empty() {
            eprintln!("⚠️  Dependency check warnings:");
            for dep in missing_deps {
                eprintln!("   • {}", dep);
            }
        }
    }

    match cli.command {
        Commands::Collect {
            reference,
            top,
            sort,
            min_duration,
            max_duration,
            min_views,
            workers,
            fallback_langs,
            output,
            format,
            copy,
            debug,
        } => {
            let reference = VideoRef::parse(&reference)?;

            let mut config = config;
            if let Some(workers) = workers {
                config.collection.workers = workers;
            }
            if !fallback_langs.is_empty() {
                config.collection.fallback_languages = fallback_langs;
            }

            let constraints = Constraints {
                max_count: top.unwrap_or(config.collection.default_top),
                sort_key: sort,
                min_duration_seconds: min_duration.map(minutes_to_seconds),
                max_duration_seconds: max_duration.map(minutes_to_seconds),
                min_views,
            };

            let format = match format {
                Some(format) => format,
                None => config.app.default_output_format.parse::<OutputFormat>()?,
            };

            let provider: Arc<dyn TranscriptProvider> = Arc::new(YtDlpProvider::new(&config.provider));
            let cancel = CancellationToken::new();
            let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
            let reporter = ProgressReporter::new(cli.quiet).spawn(rx);

            let ctrl_c = {
                let cancel = cancel.clone();
                tokio::spawn(async move {
                    if tokio::signal::ctrl_c().await.is_ok() {
                        tracing::warn!("Interrupted, finishing with the transcripts collected so far");
                        cancel.cancel();
                    }
                })
            };

            tracing::info!("Collecting transcripts for {}", reference);

            let collector = Collector::new(provider, CollectorSettings::from_config(&config))
                .with_events(tx)
                .with_cancellation(cancel);
            let result = collector.collect(&reference, &constraints).await;

            // Closing the event channel lets the progress task finish
            drop(collector);
            ctrl_c.abort();
            let _ = reporter.await;

            let result = result?;

            let destination = output.or_else(|| {
                config
                    .app
                    .output_dir
                    .as_ref()
                    .map(|dir| utils::default_output_path(Some(dir), format.extension()))
            });

            match destination {
                Some(path) => {
                    output::save_to_file(&result, &path, format).await?;
                    println!("Transcripts saved to: {}", path.display());
                }
                None => {
                    output::print_to_console(&result, format)?;
                }
            }

            if copy {
                let content = output::render(&result, format)?;
                match output::copy_to_clipboard(&content) {
                    Ok(()) => eprintln!("📋 Export copied to clipboard"),
                    Err(e) => tracing::warn!("Could not copy to clipboard: {}", e),
                }
            }

            output::print_summary(&result);
            if debug {
                output::print_diagnostics(&result);
            }
        }
        Commands::Videos { reference, limit, sort } => {
            let reference = VideoRef::parse(&reference)?;
            let provider: Arc<dyn TranscriptProvider> = Arc::new(YtDlpProvider::new(&config.provider));
            let lister = VideoLister::new(provider, config.provider.min_version.clone());

            let listing = lister.list(&reference, limit, sort).await?;
            if let Some(warning) = &listing.warning {
                eprintln!("⚠️  {}", warning);
            }

            println!("Videos for {} ({}):", reference, listing.videos.len());
            for (index, video) in listing.videos.iter().enumerate() {
                println!(
                    "  {:>3}. [{}] {} views - {} ({})",
                    index + 1,
                    format_duration(video.duration_seconds),
                    format_views(video.view_count),
                    video.title,
                    video.id
                );
            }
        }
        Commands::CheckVersion => {
            let provider = YtDlpProvider::new(&config.provider);
            let current = provider.protocol_version().await?;

            match config.provider.min_version.as_deref() {
                Some(required) if is_outdated(&current, required) => {
                    println!("yt-dlp {} is older than the supported minimum {}", current, required);
                    println!("Update with: pip install -U yt-dlp");
                }
                Some(required) => {
                    println!("yt-dlp {} is up to date (minimum {})", current, required);
                }
                None => {
                    println!("yt-dlp {}", current);
                }
            }
        }
        Commands::Config { show } => {
            if show {
                config.display();
            } else {
                config.save().await?;
                println!("Configuration written to: {}", Config::config_path()?.display());
            }
        }
    }

    Ok(())
}
