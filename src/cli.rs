//! CLI definitions for xcrawl.
//!
//! Uses clap for argument parsing with derive macros.

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// xcrawl - archive an account's posts into a spreadsheet
#[derive(Parser, Debug)]
#[command(name = "xcrawl")]
#[command(version)]
#[command(about = "Collect posts for a date window and merge them into per-account spreadsheets")]
#[command(long_about = r#"
xcrawl walks an account's timeline newest-first, keeps the posts that fall
inside a date window, and merges them into <archive-dir>/<account>.xlsx.

Each run adds a batch sheet named <start>_to_<end>_<NNN> with the posts it
collected, and refreshes main_sheet (always the first sheet) with the
de-duplicated, newest-first union of everything collected so far.

Quick start:
  1. export XCRAWL_BEARER_TOKEN=...
  2. xcrawl crawl @someone --start 2020-03-14 --end 2020-03-21
  3. xcrawl sheets @someone
"#)]
pub struct Cli {
    /// Config file (default: ~/.config/xcrawl/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Directory holding the account workbooks
    #[arg(long, global = true)]
    pub archive_dir: Option<PathBuf>,

    /// Also append logs to this file
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    /// Output format
    #[arg(long, short = 'f', default_value = "text", global = true)]
    pub format: OutputFormat,

    /// Be verbose (-v debug, -vv trace)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Be quiet (suppress non-error output)
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Collect posts and update the archives
    Crawl(CrawlArgs),

    /// List the sheets of an account's archive
    Sheets(SheetsArgs),

    /// Show or initialize configuration
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Args, Debug)]
pub struct CrawlArgs {
    /// Accounts to crawl (default: [crawl].accounts from the config file)
    pub accounts: Vec<String>,

    /// First day of the window (YYYY-MM-DD); once for all accounts or once per account
    #[arg(long, short = 's')]
    pub start: Vec<String>,

    /// Last day of the window (YYYY-MM-DD); once for all accounts or once per account
    #[arg(long, short = 'e')]
    pub end: Vec<String>,
}

#[derive(Args, Debug)]
pub struct SheetsArgs {
    /// Account whose archive to inspect
    pub account: String,
}

#[derive(Args, Debug)]
pub struct ConfigArgs {
    /// Show the effective configuration
    #[arg(long)]
    pub show: bool,

    /// Write the default configuration file
    #[arg(long)]
    pub init: bool,
}

#[derive(Args, Debug, Clone)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}

#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
    JsonPretty,
}

impl OutputFormat {
    #[must_use]
    pub const fn is_json(self) -> bool {
        matches!(self, Self::Json | Self::JsonPretty)
    }
}
