//! xcrawl - incremental timeline crawler with spreadsheet archives
//!
//! Collects an account's posts for a calendar window from a paginated
//! timeline feed and merges them into a per-account workbook.
//!
//! # Modules
//!
//! - [`cli`] - Command-line interface definitions
//! - [`collector`] - Paginated window collection
//! - [`config`] - Layered configuration
//! - [`crawler`] - Multi-account orchestration
//! - [`error`] - Error types with kind tags
//! - [`feed`] - Feed source trait and HTTP client
//! - [`storage`] - Per-account archives
//! - [`workbook`] - In-memory workbooks and the xlsx codec

pub mod cli;
pub mod collector;
pub mod config;
pub mod crawler;
pub mod error;
pub mod feed;
pub mod logging;
pub mod model;
pub mod storage;
pub mod window;
pub mod workbook;

pub use collector::Collector;
pub use config::Config;
pub use crawler::{AccountFailure, CrawlJob, CrawlOutcome, CrawlPlan, Crawler, JobResult};
pub use error::{CrawlError, ErrorKind, Result, ResultExt, format_error};
pub use feed::{FeedSource, TwitterFeed};
pub use model::{FeedPost, PostRecord, PostTable};
pub use storage::{ArchiveStore, ArchiveSummary, MAIN_SHEET, SheetSummary};
pub use window::{DateTriple, DateWindow};
pub use workbook::{Workbook, WorkbookCodec, XlsxCodec};

/// Default archive directory name
pub const DEFAULT_ARCHIVE_DIR: &str = "archives";

/// Standard width for divider lines in CLI output
pub const CONTENT_DIVIDER_WIDTH: usize = 60;

const BYTES_PER_KB: u64 = 1024;
const BYTES_PER_MB: u64 = 1024 * 1024;
const BYTES_PER_GB: u64 = 1024 * 1024 * 1024;

/// Get the default data directory for xcrawl
#[must_use]
pub fn default_data_dir() -> std::path::PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| std::path::PathBuf::from("."))
        .join("xcrawl")
}

/// Get the default archive directory
#[must_use]
pub fn default_archive_dir() -> std::path::PathBuf {
    default_data_dir().join(DEFAULT_ARCHIVE_DIR)
}

/// Format an unsigned integer with thousands separators.
#[must_use]
pub fn format_number(value: u64) -> String {
    let mut out = String::with_capacity(24);

    for (idx, ch) in value.to_string().chars().rev().enumerate() {
        if idx > 0 && idx % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }

    out.chars().rev().collect()
}

/// Format a usize with thousands separators.
#[must_use]
pub fn format_number_usize(value: usize) -> String {
    format_number(u64::try_from(value).unwrap_or(u64::MAX))
}

/// Format bytes into a human-friendly string.
#[must_use]
pub fn format_bytes(bytes: u64) -> String {
    if bytes < BYTES_PER_KB {
        format!("{bytes} B")
    } else if bytes < BYTES_PER_MB {
        format_bytes_with_unit(bytes, BYTES_PER_KB, "KB")
    } else if bytes < BYTES_PER_GB {
        format_bytes_with_unit(bytes, BYTES_PER_MB, "MB")
    } else {
        format_bytes_with_unit(bytes, BYTES_PER_GB, "GB")
    }
}

fn format_bytes_with_unit(bytes: u64, unit: u64, suffix: &str) -> String {
    let whole = bytes / unit;
    let tenths = (bytes % unit) * 10 / unit;
    format!("{whole}.{tenths} {suffix}")
}
