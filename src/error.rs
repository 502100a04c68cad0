//! Custom error types for xcrawl.
//!
//! Every failure carries an [`ErrorKind`] tag so the orchestration loop can
//! log and skip an account without inspecting error messages.

use serde::Serialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Primary error type for xcrawl operations.
#[derive(Error, Debug)]
pub enum CrawlError {
    // =========================================================================
    // Feed Errors
    // =========================================================================
    /// Feed connection could not be set up (missing token, bad client).
    #[error("Authentication failed: {reason}")]
    Auth { reason: String },

    /// The feed answered with an error or an unreadable page.
    #[error("Failed to fetch timeline for '{account}': {message}")]
    Fetch {
        account: String,
        status: Option<u16>,
        code: Option<i64>,
        message: String,
    },

    /// The feed refused the request because of its rate limit.
    #[error("Rate limited while fetching '{account}': {message}")]
    RateLimited {
        account: String,
        code: Option<i64>,
        message: String,
    },

    /// A page came back empty where a post was required.
    #[error("Feed returned an empty page for '{account}' (page {page})")]
    EmptyPage { account: String, page: usize },

    /// Transport-level HTTP failure.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    // =========================================================================
    // Archive Errors
    // =========================================================================
    /// File read/write error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Path-specific IO error with context.
    #[error("Failed to {operation} '{path}': {source}")]
    PathError {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Spreadsheet codec failure.
    #[error("Workbook error in '{path}': {reason}")]
    Workbook { path: PathBuf, reason: String },

    /// A sheet exists but its rows cannot be read as posts.
    #[error("Sheet '{sheet}' row {row}: {reason}")]
    SheetFormat {
        sheet: String,
        row: usize,
        reason: String,
    },

    /// Sheet position outside the workbook.
    #[error("Sheet index {index} out of range for workbook with {len} sheets")]
    SheetIndex { index: usize, len: usize },

    /// Sheet names must be unique within a workbook.
    #[error("Sheet '{name}' already exists")]
    DuplicateSheet { name: String },

    // =========================================================================
    // Input Errors
    // =========================================================================
    /// Invalid calendar date.
    #[error("Invalid date '{value}' in {context}")]
    InvalidDate { value: String, context: String },

    /// Window whose start lies after its end.
    #[error("Start date {start} is after end date {end}")]
    InvalidWindow { start: String, end: String },

    /// Invalid command-line or plan argument.
    #[error("Invalid argument: {reason}")]
    InvalidArgument { reason: String },

    /// Configuration file parsing error.
    #[error("Invalid configuration in '{path}': {reason}")]
    Config { path: PathBuf, reason: String },

    // =========================================================================
    // Generic Errors
    // =========================================================================
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias for xcrawl operations.
pub type Result<T> = std::result::Result<T, CrawlError>;

/// Coarse classification of a [`CrawlError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Auth,
    Fetch,
    RateLimit,
    EmptyPage,
    FileIo,
    Input,
    Other,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Auth => "auth",
            Self::Fetch => "fetch",
            Self::RateLimit => "rate_limit",
            Self::EmptyPage => "empty_page",
            Self::FileIo => "file_io",
            Self::Input => "input",
            Self::Other => "other",
        };
        f.write_str(name)
    }
}

impl CrawlError {
    /// Create an authentication error.
    pub fn auth(reason: impl Into<String>) -> Self {
        Self::Auth {
            reason: reason.into(),
        }
    }

    /// Create a fetch error without API detail.
    pub fn fetch(account: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Fetch {
            account: account.into(),
            status: None,
            code: None,
            message: message.into(),
        }
    }

    /// Create a workbook codec error.
    pub fn workbook(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::Workbook {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// Create a sheet format error.
    pub fn sheet_format(sheet: impl Into<String>, row: usize, reason: impl Into<String>) -> Self {
        Self::SheetFormat {
            sheet: sheet.into(),
            row,
            reason: reason.into(),
        }
    }

    /// Create an invalid date error.
    pub fn invalid_date(value: impl Into<String>, context: impl Into<String>) -> Self {
        Self::InvalidDate {
            value: value.into(),
            context: context.into(),
        }
    }

    /// Create an invalid argument error.
    pub fn invalid_argument(reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            reason: reason.into(),
        }
    }

    /// Create a path error with context.
    pub fn path_error(
        operation: &'static str,
        path: impl Into<PathBuf>,
        source: std::io::Error,
    ) -> Self {
        Self::PathError {
            operation,
            path: path.into(),
            source,
        }
    }

    /// Classify this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Auth { .. } => ErrorKind::Auth,
            Self::Fetch { .. } | Self::Http(_) => ErrorKind::Fetch,
            Self::RateLimited { .. } => ErrorKind::RateLimit,
            Self::EmptyPage { .. } => ErrorKind::EmptyPage,
            Self::Io(_)
            | Self::PathError { .. }
            | Self::Workbook { .. }
            | Self::SheetFormat { .. } => ErrorKind::FileIo,
            Self::SheetIndex { .. }
            | Self::DuplicateSheet { .. }
            | Self::InvalidDate { .. }
            | Self::InvalidWindow { .. }
            | Self::InvalidArgument { .. }
            | Self::Config { .. } => ErrorKind::Input,
            Self::Other(_) => ErrorKind::Other,
        }
    }

    /// API error code reported by the feed, if any.
    #[must_use]
    pub const fn code(&self) -> Option<i64> {
        match self {
            Self::Fetch { code, .. } | Self::RateLimited { code, .. } => *code,
            _ => None,
        }
    }

    /// API error message reported by the feed, if any.
    #[must_use]
    pub fn message(&self) -> Option<&str> {
        match self {
            Self::Fetch { message, .. } | Self::RateLimited { message, .. } => Some(message.as_str()),
            _ => None,
        }
    }

    /// Whether the whole run must stop rather than skip one account.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self.kind(), ErrorKind::Auth)
    }

    /// Get a suggestion for how to fix this error, if applicable.
    #[must_use]
    pub const fn suggestion(&self) -> Option<&'static str> {
        match self {
            Self::Auth { .. } => Some(
                "Set XCRAWL_BEARER_TOKEN or add bearer_token under [feed] in the config file.",
            ),
            Self::RateLimited { .. } => Some("Wait for the rate-limit window to reset and rerun."),
            Self::InvalidDate { .. } => Some("Use YYYY-MM-DD dates, e.g. 2020-03-14."),
            Self::InvalidWindow { .. } => Some("Swap --start and --end."),
            Self::SheetFormat { .. } => Some(
                "The archive was edited by hand; restore the header row or move the file away.",
            ),
            _ => None,
        }
    }
}

/// Extension trait for attaching file context to foreign errors.
pub trait ResultExt<T, E> {
    /// Wrap an IO failure as [`CrawlError::PathError`].
    ///
    /// # Errors
    ///
    /// Returns the original error with the operation and path attached.
    fn path_context(self, operation: &'static str, path: &Path) -> Result<T>
    where
        E: Into<std::io::Error>;

    /// Wrap a spreadsheet library failure as [`CrawlError::Workbook`].
    ///
    /// # Errors
    ///
    /// Returns the original error message with the workbook path attached.
    fn workbook_context(self, path: &Path) -> Result<T>
    where
        E: std::fmt::Display;

    /// Wrap a read or parse failure as [`CrawlError::Config`].
    ///
    /// # Errors
    ///
    /// Returns the original error message with the config path attached.
    fn config_context(self, path: &Path) -> Result<T>
    where
        E: std::fmt::Display;
}

impl<T, E> ResultExt<T, E> for std::result::Result<T, E> {
    fn path_context(self, operation: &'static str, path: &Path) -> Result<T>
    where
        E: Into<std::io::Error>,
    {
        self.map_err(|e| CrawlError::path_error(operation, path, e.into()))
    }

    fn workbook_context(self, path: &Path) -> Result<T>
    where
        E: std::fmt::Display,
    {
        self.map_err(|e| CrawlError::workbook(path, e))
    }

    fn config_context(self, path: &Path) -> Result<T>
    where
        E: std::fmt::Display,
    {
        self.map_err(|e| CrawlError::Config {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }
}

// =============================================================================
// CLI Error Formatting
// =============================================================================

use colored::Colorize;

/// Format a structured CLI error with explanation and suggestions.
#[must_use]
pub fn format_error(title: &str, explanation: &str, suggestions: &[&str]) -> String {
    use std::fmt::Write;

    let mut output = format!("{} {}", "✗".red().bold(), title.bold());

    if !explanation.is_empty() {
        let _ = write!(output, "\n\n   {explanation}");
    }

    if !suggestions.is_empty() {
        output.push_str("\n\n   ");
        if suggestions.len() == 1 {
            let _ = write!(output, "{} {}", "Hint:".cyan(), suggestions[0]);
        } else {
            let _ = write!(output, "{}:", "Try".cyan());
            for suggestion in suggestions {
                let _ = write!(output, "\n     {} {}", "•".dimmed(), suggestion);
            }
        }
    }

    output
}
