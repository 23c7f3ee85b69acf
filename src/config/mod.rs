use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// yt-dlp provider configuration
    #[serde(default)]
    pub provider: ProviderConfig,

    /// Collection pipeline settings
    #[serde(default)]
    pub collection: CollectionConfig,

    /// Application settings
    #[serde(default)]
    pub app: AppConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// yt-dlp executable
    pub yt_dlp_path: String,

    /// Browser to read cookies from (e.g. "chrome"), passed straight to yt-dlp
    pub cookies_from_browser: Option<String>,

    /// Oldest yt-dlp release known to work; older versions trigger a warning
    pub min_version: Option<String>,

    /// Timeout for channel listing in seconds
    pub list_timeout_secs: u64,

    /// Timeout for metadata and version lookups in seconds
    pub lookup_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectionConfig {
    /// Parallel transcript fetches
    pub workers: usize,

    /// Retries for transient failures
    pub max_retries: u32,

    /// Initial retry backoff in milliseconds, doubled per attempt
    pub retry_backoff_ms: u64,

    /// Per-attempt transcript fetch timeout in seconds
    pub fetch_timeout_secs: u64,

    /// Languages tried, in order, when the original language has no transcript
    pub fallback_languages: Vec<String>,

    /// Channel entries listed per requested video, to leave room for filtering
    pub candidate_multiplier: usize,

    /// Number of videos collected when --top is not given
    pub default_top: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Default output format
    pub default_output_format: String,

    /// Directory for exported files when --output is not given
    pub output_dir: Option<PathBuf>,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            yt_dlp_path: "yt-dlp".to_string(),
            cookies_from_browser: None,
            min_version: Some("2026.02.04".to_string()),
            list_timeout_secs: 120,
            lookup_timeout_secs: 45,
        }
    }
}

impl Default for CollectionConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            max_retries: 2,
            retry_backoff_ms: 500,
            fetch_timeout_secs: 90,
            fallback_languages: vec!["en".to_string(), "ru".to_string()],
            candidate_multiplier: 3,
            default_top: 10,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            default_output_format: "text".to_string(),
            output_dir: None,
        }
    }
}

/// Upper bound on parallel fetches; more only invites rate limiting
pub const MAX_WORKERS: usize = 10;

impl Config {
    /// Load configuration from file or create default
    pub async fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            let content = fs_err::read_to_string(&config_path)
                .context("Failed to read config file")?;

            let config: Config = serde_yaml::from_str(&content)
                .context("Failed to parse config file")?;

            config.validate()?;
            Ok(config)
        } else {
            let config = Self::default();
            if let Err(e) = config.save().await {
                tracing::warn!("Could not write default config: {:#}", e);
            }
            Ok(config)
        }
    }

    /// Save configuration to file
    pub async fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;

        if let Some(parent) = config_path.parent() {
            fs_err::create_dir_all(parent)?;
        }

        let content = serde_yaml::to_string(self)
            .context("Failed to serialize config")?;

        fs_err::write(&config_path, content)
            .context("Failed to write config file")?;

        Ok(())
    }

    /// Get configuration file path
    pub fn config_path() -> Result<PathBuf> {
        // First try current directory for easy testing
        let local_config = PathBuf::from("config.yaml");
        if local_config.exists() {
            return Ok(local_config);
        }

        let config_dir = dirs::config_dir()
            .context("Could not determine config directory")?;

        Ok(config_dir.join("transcript-collector").join("config.yaml"))
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.provider.yt_dlp_path.trim().is_empty() {
            anyhow::bail!("provider.yt_dlp_path must not be empty");
        }

        if self.provider.list_timeout_secs == 0 || self.provider.lookup_timeout_secs == 0 {
            anyhow::bail!("provider timeouts must be greater than zero");
        }

        if self.collection.workers == 0 {
            anyhow::bail!("collection.workers must be at least 1");
        }

        if self.collection.fetch_timeout_secs == 0 {
            anyhow::bail!("collection.fetch_timeout_secs must be greater than zero");
        }

        if self.collection.fallback_languages.iter().any(|l| l.trim().is_empty()) {
            anyhow::bail!("collection.fallback_languages must not contain empty codes");
        }

        if self.collection.candidate_multiplier == 0 {
            anyhow::bail!("collection.candidate_multiplier must be at least 1");
        }

        self.app
            .default_output_format
            .parse::<crate::cli::OutputFormat>()
            .context("app.default_output_format must be text, json or markdown")?;

        Ok(())
    }

    /// Worker count clamped to the supported range
    pub fn workers(&self) -> usize {
        self.collection.workers.clamp(1, MAX_WORKERS)
    }

    /// Display current configuration
    pub fn display(&self) {
        println!("Current Configuration:");
        println!("  yt-dlp: {}", self.provider.yt_dlp_path);
        if let Some(browser) = &self.provider.cookies_from_browser {
            println!("  Cookies From: {}", browser);
        }
        if let Some(version) = &self.provider.min_version {
            println!("  Minimum yt-dlp: {}", version);
        }
        println!("  Workers: {}", self.workers());
        println!("  Max Retries: {}", self.collection.max_retries);
        println!("  Fetch Timeout: {}s", self.collection.fetch_timeout_secs);
        println!("  Fallback Languages: {}", self.collection.fallback_languages.join(", "));
        println!("  Default Format: {}", self.app.default_output_format);
        if let Ok(path) = Self::config_path() {
            println!("  Config File: {}", path.display());
        }
    }
}
