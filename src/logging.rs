//! Logging setup for xcrawl.
//!
//! Log lines go to stderr so that stdout stays clean for command output.
//! An optional log file receives the same events without ANSI colors.
//!
//! # Usage
//!
//! ```rust
//! use xcrawl::logging::{init_logging, LogConfig};
//!
//! let config = LogConfig::default();
//! init_logging(&config).ok();
//!
//! tracing::info!("Application started");
//! ```

use crate::error::{CrawlError, Result, ResultExt};
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing_subscriber::{
    EnvFilter, Layer, Registry,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Logging configuration.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Minimum log level to display.
    pub level: LogLevel,
    /// Output format for stderr.
    pub format: LogFormat,
    /// Include timestamps in stderr output.
    pub timestamps: bool,
    /// Include target (module path) in log output.
    pub target: bool,
    /// Enable ANSI colors on stderr.
    pub colors: bool,
    /// Append logs to this file as well.
    pub file: Option<PathBuf>,
}

/// Log level configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
    Off,
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable multi-line format.
    Pretty,
    /// Compact single-line format.
    Compact,
    /// Full format with thread and source location.
    Full,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            format: LogFormat::Compact,
            timestamps: true,
            target: false,
            colors: true,
            file: None,
        }
    }
}

impl LogConfig {
    /// Errors only.
    #[must_use]
    pub const fn quiet() -> Self {
        Self {
            level: LogLevel::Error,
            format: LogFormat::Compact,
            timestamps: false,
            target: false,
            colors: true,
            file: None,
        }
    }

    /// Debug level with module targets.
    #[must_use]
    pub const fn verbose() -> Self {
        Self {
            level: LogLevel::Debug,
            format: LogFormat::Pretty,
            timestamps: true,
            target: true,
            colors: true,
            file: None,
        }
    }

    /// Everything, with source locations.
    #[must_use]
    pub const fn trace() -> Self {
        Self {
            level: LogLevel::Trace,
            format: LogFormat::Full,
            timestamps: true,
            target: true,
            colors: true,
            file: None,
        }
    }

    #[must_use]
    pub fn with_file(mut self, file: Option<PathBuf>) -> Self {
        self.file = file;
        self
    }

    #[must_use]
    pub const fn with_colors(mut self, colors: bool) -> Self {
        self.colors = colors;
        self
    }
}

impl LogLevel {
    /// Convert to env filter directive string.
    const fn to_filter_string(self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warn => "warn",
            Self::Info => "info",
            Self::Debug => "debug",
            Self::Trace => "trace",
            Self::Off => "off",
        }
    }
}

impl std::str::FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "error" | "e" => Ok(Self::Error),
            "warn" | "warning" | "w" => Ok(Self::Warn),
            "info" | "i" => Ok(Self::Info),
            "debug" | "d" => Ok(Self::Debug),
            "trace" | "t" => Ok(Self::Trace),
            "off" | "none" | "quiet" => Ok(Self::Off),
            _ => Err(format!("Invalid log level: {s}")),
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pretty" | "p" => Ok(Self::Pretty),
            "compact" | "c" => Ok(Self::Compact),
            "full" | "f" => Ok(Self::Full),
            _ => Err(format!("Invalid log format: {s}")),
        }
    }
}

/// Install the global subscriber.
///
/// `RUST_LOG` overrides the configured level. Calling this more than once is
/// harmless; later calls leave the first subscriber in place.
///
/// # Errors
///
/// Returns an error if the log file cannot be opened.
pub fn init_logging(config: &LogConfig) -> Result<()> {
    let env_filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        EnvFilter::new(format!("xcrawl={}", config.level.to_filter_string()))
    };

    let mut layers: Vec<BoxedLayer> = vec![stderr_layer(config)];

    if let Some(path) = &config.file {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .path_context("open log file", path)?;
        layers.push(
            fmt::layer()
                .with_writer(Mutex::new(file))
                .with_ansi(false)
                .with_target(config.target)
                .boxed(),
        );
    }

    tracing_subscriber::registry()
        .with(layers)
        .with(env_filter)
        .try_init()
        .ok();
    Ok(())
}

fn stderr_layer(config: &LogConfig) -> BoxedLayer {
    match config.format {
        LogFormat::Pretty => {
            let layer = fmt::layer()
                .pretty()
                .with_writer(std::io::stderr)
                .with_ansi(config.colors)
                .with_target(config.target);
            if config.timestamps {
                layer.boxed()
            } else {
                layer.without_time().boxed()
            }
        }
        LogFormat::Compact => {
            let layer = fmt::layer()
                .compact()
                .with_writer(std::io::stderr)
                .with_ansi(config.colors)
                .with_target(config.target);
            if config.timestamps {
                layer.boxed()
            } else {
                layer.without_time().boxed()
            }
        }
        LogFormat::Full => fmt::layer()
            .with_writer(std::io::stderr)
            .with_ansi(config.colors)
            .with_target(config.target)
            .with_span_events(FmtSpan::ENTER | FmtSpan::EXIT)
            .with_thread_names(true)
            .with_file(true)
            .with_line_number(true)
            .boxed(),
    }
}

/// Pick the CLI logging setup.
///
/// `-q` and `-v` select a preset; without them `level` applies on top of the
/// default. `format` replaces the preset's stderr layout.
///
/// # Errors
///
/// Returns [`CrawlError::InvalidArgument`] for an unknown level or format.
pub fn cli_log_config(
    quiet: bool,
    verbose: u8,
    level: Option<&str>,
    format: Option<&str>,
) -> Result<LogConfig> {
    let level = level
        .map(str::parse::<LogLevel>)
        .transpose()
        .map_err(CrawlError::invalid_argument)?;
    let format = format
        .map(str::parse::<LogFormat>)
        .transpose()
        .map_err(CrawlError::invalid_argument)?;

    let mut config = if quiet {
        LogConfig::quiet()
    } else {
        match verbose {
            0 => LogConfig {
                level: level.unwrap_or(LogLevel::Info),
                ..LogConfig::default()
            },
            1 => LogConfig::verbose(),
            _ => LogConfig::trace(),
        }
    };
    if let Some(format) = format {
        config.format = format;
    }
    Ok(config)
}

/// Logs the start and end of an operation with its duration.
pub struct OperationGuard {
    name: String,
    start: std::time::Instant,
}

impl OperationGuard {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        tracing::info!(operation = %name, "Starting operation");
        Self {
            name,
            start: std::time::Instant::now(),
        }
    }

    pub fn complete(self) {
        tracing::info!(
            operation = %self.name,
            duration_ms = self.start.elapsed().as_millis(),
            "Operation completed"
        );
    }

    pub fn fail(self, error: &dyn std::error::Error) {
        tracing::error!(
            operation = %self.name,
            duration_ms = self.start.elapsed().as_millis(),
            error = %error,
            "Operation failed"
        );
    }
}
