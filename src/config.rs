//! Configuration system for xcrawl.
//!
//! Provides layered configuration from multiple sources:
//!
//! 1. **Compiled defaults** - Sensible defaults built into the binary
//! 2. **User config file** - `~/.config/xcrawl/config.toml` (or `--config`)
//! 3. **Environment variables** - `XCRAWL_*` prefix
//! 4. **CLI arguments** - Highest priority, always wins
//!
//! # Example Configuration File
//!
//! ```toml
//! [paths]
//! archive_dir = "~/.local/share/xcrawl/archives"
//!
//! [feed]
//! page_size = 200
//!
//! [collector]
//! on_empty_page = "stop"
//!
//! [crawl]
//! accounts = ["@a", "@b"]
//! start_dates = [[2020, 3, 14]]
//! end_dates = [[2020, 3, 21]]
//!
//! [output]
//! log_level = "warn"
//! ```

use crate::error::{CrawlError, Result, ResultExt};
use crate::window::DateTriple;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Main configuration structure for xcrawl.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub paths: PathsConfig,
    pub feed: FeedConfig,
    pub collector: CollectorConfig,
    /// Default crawl plan, used when no accounts are given on the command line.
    pub crawl: CrawlConfig,
    pub output: OutputConfig,
}

/// Path configuration for archives and logs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Directory holding one workbook per account.
    /// Environment variable: `XCRAWL_ARCHIVE_DIR`
    pub archive_dir: Option<PathBuf>,

    /// Additional log file sink.
    /// Environment variable: `XCRAWL_LOG_FILE`
    pub log_file: Option<PathBuf>,
}

/// Timeline endpoint configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    /// Environment variable: `XCRAWL_BASE_URL`
    pub base_url: String,

    /// Environment variable: `XCRAWL_BEARER_TOKEN`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bearer_token: Option<String>,

    /// Posts per page (1-200).
    /// Environment variable: `XCRAWL_PAGE_SIZE`
    pub page_size: u32,

    /// Ask the endpoint to include reposts.
    pub include_retweets: bool,

    /// Per-request timeout.
    pub timeout_secs: u64,
}

/// Pagination behavior.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectorConfig {
    /// Upper bound on pages per account (0 = unlimited).
    pub max_pages: usize,

    /// What an empty page means.
    pub on_empty_page: EmptyPagePolicy,
}

/// Handling of a page that contains no posts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmptyPagePolicy {
    /// Treat it as the end of the feed.
    #[default]
    Stop,
    /// Fail the account with an empty-page error.
    Fail,
}

/// Default crawl plan.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CrawlConfig {
    pub accounts: Vec<String>,
    pub start_dates: Vec<DateTriple>,
    pub end_dates: Vec<DateTriple>,
}

/// Output formatting configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Enable colored output.
    pub colors: bool,

    /// Suppress non-essential output (progress bars, etc.).
    pub quiet: bool,

    /// Log level when neither `-q` nor `-v` is given.
    /// Environment variable: `XCRAWL_LOG_LEVEL`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,

    /// stderr log layout: `compact`, `pretty` or `full`.
    /// Environment variable: `XCRAWL_LOG_FORMAT`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_format: Option<String>,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.twitter.com".to_string(),
            bearer_token: None,
            page_size: 200,
            include_retweets: true,
            timeout_secs: 30,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            colors: true,
            quiet: false,
            log_level: None,
            log_format: None,
        }
    }
}

impl Config {
    /// Load configuration from all sources.
    ///
    /// Priority (highest to lowest):
    /// 1. Environment variables
    /// 2. Config file (`explicit_path`, else ~/.config/xcrawl/config.toml)
    /// 3. Compiled defaults
    ///
    /// # Errors
    ///
    /// Returns [`CrawlError::Config`] if `explicit_path` is missing or invalid.
    /// Problems with the implicit user config file are only logged.
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        let mut config = Self::default();

        let file_config = match explicit_path {
            Some(path) => Some(Self::parse_file(path)?),
            None => Self::load_user_config(),
        };
        if let Some(file_config) = file_config {
            config.merge(file_config);
        }

        config.apply_env_overrides();

        debug!(
            archive_dir = ?config.paths.archive_dir,
            base_url = %config.feed.base_url,
            has_token = config.feed.bearer_token.is_some(),
            "Configuration loaded"
        );
        Ok(config)
    }

    /// Read and parse one config file.
    ///
    /// # Errors
    ///
    /// Returns [`CrawlError::Config`] if the file cannot be read or parsed.
    pub fn parse_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).config_context(path)?;
        let config = toml::from_str(&content).config_context(path)?;
        info!("Loaded config from: {}", path.display());
        Ok(config)
    }

    /// Load configuration from a file, logging instead of failing.
    pub fn load_from_file(path: &Path) -> Option<Self> {
        if !path.exists() {
            debug!("Config file not found: {}", path.display());
            return None;
        }

        match Self::parse_file(path) {
            Ok(config) => Some(config),
            Err(e) => {
                warn!("{e}");
                None
            }
        }
    }

    fn load_user_config() -> Option<Self> {
        let config_path = Self::user_config_path()?;
        Self::load_from_file(&config_path)
    }

    /// Get the path to the user configuration file.
    #[must_use]
    pub fn user_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("xcrawl").join("config.toml"))
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(dir) = std::env::var("XCRAWL_ARCHIVE_DIR") {
            self.paths.archive_dir = Some(PathBuf::from(dir));
        }
        if let Ok(file) = std::env::var("XCRAWL_LOG_FILE") {
            self.paths.log_file = Some(PathBuf::from(file));
        }

        if let Ok(url) = std::env::var("XCRAWL_BASE_URL") {
            self.feed.base_url = url;
        }
        if let Ok(token) = std::env::var("XCRAWL_BEARER_TOKEN") {
            self.feed.bearer_token = Some(token);
        }
        if let Ok(size) = std::env::var("XCRAWL_PAGE_SIZE") {
            match size.parse() {
                Ok(n) => self.feed.page_size = n,
                Err(_) => warn!("Ignoring invalid XCRAWL_PAGE_SIZE: {size}"),
            }
        }

        if std::env::var("XCRAWL_NO_COLOR").is_ok() || std::env::var("NO_COLOR").is_ok() {
            self.output.colors = false;
        }
        if std::env::var("XCRAWL_QUIET").is_ok() {
            self.output.quiet = true;
        }
        if let Ok(level) = std::env::var("XCRAWL_LOG_LEVEL") {
            self.output.log_level = Some(level);
        }
        if let Ok(format) = std::env::var("XCRAWL_LOG_FORMAT") {
            self.output.log_format = Some(format);
        }
    }

    /// Merge another config into this one (other takes precedence).
    fn merge(&mut self, other: Self) {
        if other.paths.archive_dir.is_some() {
            self.paths.archive_dir = other.paths.archive_dir;
        }
        if other.paths.log_file.is_some() {
            self.paths.log_file = other.paths.log_file;
        }

        self.feed.base_url = other.feed.base_url;
        if other.feed.bearer_token.is_some() {
            self.feed.bearer_token = other.feed.bearer_token;
        }
        self.feed.page_size = other.feed.page_size;
        self.feed.include_retweets = other.feed.include_retweets;
        self.feed.timeout_secs = other.feed.timeout_secs;

        self.collector = other.collector;

        if !other.crawl.accounts.is_empty() {
            self.crawl = other.crawl;
        }

        self.output.colors = other.output.colors;
        self.output.quiet = other.output.quiet;
        if other.output.log_level.is_some() {
            self.output.log_level = other.output.log_level;
        }
        if other.output.log_format.is_some() {
            self.output.log_format = other.output.log_format;
        }
    }

    /// Get the archive directory, using defaults if not configured.
    #[must_use]
    pub fn archive_dir(&self) -> PathBuf {
        self.paths
            .archive_dir
            .clone()
            .unwrap_or_else(crate::default_archive_dir)
    }

    /// Write the default configuration to the user config file.
    ///
    /// # Errors
    ///
    /// Returns an error if the config directory cannot be determined,
    /// the parent directory cannot be created, or the file cannot be written.
    pub fn save_default() -> Result<PathBuf> {
        let config_path = Self::user_config_path().ok_or_else(|| {
            CrawlError::invalid_argument("could not determine config directory")
        })?;

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent).path_context("create", parent)?;
        }

        std::fs::write(&config_path, Self::default_config_content())
            .path_context("write", &config_path)?;
        info!("Saved config to: {}", config_path.display());
        Ok(config_path)
    }

    /// Generate a default configuration file content.
    #[must_use]
    pub fn default_config_content() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}
