use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::collector::SortKey;

#[derive(Parser)]
#[command(
    name = "yt-transcripts",
    about = "Collect transcripts for the top videos of a YouTube channel",
    version,
    long_about = "Lists the videos of a YouTube channel (or takes a single video), keeps the ones matching your duration and view filters, and downloads their transcripts in parallel using yt-dlp."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable progress indicators
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Collect transcripts for a channel or a single video
    Collect {
        /// Channel URL, @handle, video URL or video id
        #[arg(value_name = "CHANNEL_OR_VIDEO")]
        reference: String,

        /// Number of videos to collect (defaults to collection.default_top)
        #[arg(short, long, value_name = "N")]
        top: Option<usize>,

        /// Sort order applied before taking the top videos
        #[arg(short, long, value_enum, default_value = "views")]
        sort: SortKey,

        /// Skip videos shorter than this many minutes
        #[arg(long, value_name = "MIN")]
        min_duration: Option<u64>,

        /// Skip videos longer than this many minutes
        #[arg(long, value_name = "MIN")]
        max_duration: Option<u64>,

        /// Skip videos with fewer views
        #[arg(long, value_name = "N")]
        min_views: Option<u64>,

        /// Parallel downloads (1-10, defaults to collection.workers)
        #[arg(short, long, value_name = "N")]
        workers: Option<usize>,

        /// Fallback transcript language, repeatable; replaces the configured list
        #[arg(long = "fallback-lang", value_name = "LANG")]
        fallback_langs: Vec<String>,

        /// Output file path (prints to console if not specified)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Output format (defaults to app.default_output_format)
        #[arg(short, long, value_enum)]
        format: Option<OutputFormat>,

        /// Also put the rendered export on the system clipboard
        #[arg(long)]
        copy: bool,

        /// Print the per-video failure trail after the run
        #[arg(long)]
        debug: bool,
    },

    /// List candidate videos without downloading transcripts
    Videos {
        /// Channel URL, @handle, video URL or video id
        #[arg(value_name = "CHANNEL_OR_VIDEO")]
        reference: String,

        /// Maximum number of videos to list
        #[arg(short, long, default_value = "30")]
        limit: usize,

        /// Which end of the channel to list from
        #[arg(short, long, value_enum, default_value = "views")]
        sort: SortKey,
    },

    /// Compare the installed yt-dlp with the minimum supported release
    CheckVersion,

    /// Show or initialise the configuration file
    Config {
        /// Show current configuration
        #[arg(short, long)]
        show: bool,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    /// Plain text with a table of contents
    Text,
    /// Full collection result as JSON
    Json,
    /// Markdown document
    Markdown,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Text => "txt",
            OutputFormat::Json => "json",
            OutputFormat::Markdown => "md",
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Markdown => write!(f, "markdown"),
        }
    }
}

impl std::str::FromStr for OutputFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        <Self as ValueEnum>::from_str(s, true)
            .map_err(|_| anyhow::anyhow!("Unknown output format: {}", s))
    }
}
