//! xcrawl - timeline crawler CLI
//!
//! Main entry point for the xcrawl command-line tool.

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::io;
use std::path::PathBuf;
use tracing::debug;

use xcrawl::cli::{Cli, Commands, CompletionsArgs, ConfigArgs, CrawlArgs, OutputFormat, SheetsArgs};
use xcrawl::window::parse_date_triple;
use xcrawl::*;

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(dir) = &cli.archive_dir {
        config.paths.archive_dir = Some(dir.clone());
    }
    if let Some(file) = &cli.log_file {
        config.paths.log_file = Some(file.clone());
    }
    if cli.quiet {
        config.output.quiet = true;
    }
    if !config.output.colors {
        colored::control::set_override(false);
    }

    let log_config = logging::cli_log_config(
        config.output.quiet,
        cli.verbose,
        config.output.log_level.as_deref(),
        config.output.log_format.as_deref(),
    )?
    .with_colors(config.output.colors)
    .with_file(config.paths.log_file.clone());
    logging::init_logging(&log_config)?;
    debug!(command = ?cli.command, "Starting xcrawl");

    match &cli.command {
        Commands::Crawl(args) => cmd_crawl(&cli, &config, args),
        Commands::Sheets(args) => cmd_sheets(&cli, &config, args),
        Commands::Config(args) => cmd_config(&cli, &config, args),
        Commands::Completions(args) => cmd_completions(args),
    }
}

fn print_json<T: Serialize>(format: OutputFormat, value: &T) -> Result<()> {
    let json = if format == OutputFormat::JsonPretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{json}");
    Ok(())
}

fn parse_dates(values: &[String], flag: &str, fallback: &[DateTriple]) -> Result<Vec<DateTriple>> {
    if values.is_empty() {
        return Ok(fallback.to_vec());
    }
    values
        .iter()
        .map(|v| parse_date_triple(v).with_context(|| format!("invalid {flag} date")))
        .collect()
}

#[derive(Serialize)]
struct AccountReport<'a> {
    account: &'a str,
    posts: usize,
    newest: Option<String>,
    oldest: Option<String>,
    archive: &'a std::path::Path,
}

#[derive(Serialize)]
struct CrawlReport<'a> {
    accounts: Vec<AccountReport<'a>>,
    failed: &'a [AccountFailure],
    total_posts: usize,
}

fn cmd_crawl(cli: &Cli, config: &Config, args: &CrawlArgs) -> Result<()> {
    let accounts = if args.accounts.is_empty() {
        config.crawl.accounts.clone()
    } else {
        args.accounts.clone()
    };
    if accounts.is_empty() {
        anyhow::bail!(
            "No accounts given. Pass them as arguments or set [crawl].accounts in {}",
            Config::user_config_path().map_or_else(|| "the config file".to_string(), |p| p.display().to_string())
        );
    }
    let starts = parse_dates(&args.start, "--start", &config.crawl.start_dates)?;
    let ends = parse_dates(&args.end, "--end", &config.crawl.end_dates)?;
    let plan = CrawlPlan::from_parallel(&accounts, &starts, &ends)?;

    let feed = match TwitterFeed::connect(&config.feed) {
        Ok(feed) => feed,
        Err(e) => {
            eprintln!(
                "{}",
                format_error("Cannot reach the timeline feed", &e.to_string(), &e.suggestion().into_iter().collect::<Vec<_>>())
            );
            return Err(e.into());
        }
    };
    let archive_dir = config.archive_dir();
    let crawler = Crawler::new(
        Collector::new(feed, &config.collector),
        ArchiveStore::open(&archive_dir),
    );

    let show_progress = !cli.format.is_json() && !config.output.quiet;
    let pb = if show_progress {
        let pb = ProgressBar::new(plan.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")
                .context("invalid progress template")?
                .progress_chars("##-"),
        );
        pb
    } else {
        ProgressBar::hidden()
    };

    if show_progress {
        println!("{}", "Crawling accounts...".bold().cyan());
        println!("  Archive dir: {}", archive_dir.display());
        println!();
    }

    let outcome = crawler.run_with(&plan, |job, result| {
        pb.inc(1);
        match result {
            JobResult::Saved { table, .. } => pb.println(format!(
                "  {} {} {} posts",
                "✓".green(),
                job.account,
                format_number_usize(table.len())
            )),
            JobResult::Failed(failure) => pb.println(format!(
                "  {} {} [{}] {}",
                "✗".red(),
                job.account,
                failure.kind,
                failure.message
            )),
        }
        pb.set_message(job.account.clone());
    });
    pb.finish_and_clear();

    if cli.format.is_json() {
        let accounts = outcome
            .collected
            .iter()
            .filter_map(|(account, table)| {
                let archive = outcome.archives.get(account)?;
                let span = table.span();
                Some(AccountReport {
                    account,
                    posts: table.len(),
                    newest: span.map(|(newest, _)| newest.to_rfc3339()),
                    oldest: span.map(|(_, oldest)| oldest.to_rfc3339()),
                    archive,
                })
            })
            .collect();
        print_json(
            cli.format,
            &CrawlReport {
                accounts,
                failed: &outcome.failed,
                total_posts: outcome.total_posts(),
            },
        )?;
    } else if !config.output.quiet {
        println!();
        println!("{}", "─".repeat(CONTENT_DIVIDER_WIDTH));
        println!(
            "  {} account(s) saved, {} failed, {} posts",
            outcome.collected.len(),
            outcome.failed.len(),
            format_number_usize(outcome.total_posts())
        );
    }

    if !outcome.is_success() {
        anyhow::bail!("{} of {} account(s) failed", outcome.failed.len(), plan.len());
    }
    Ok(())
}

fn cmd_sheets(cli: &Cli, config: &Config, args: &SheetsArgs) -> Result<()> {
    let store = ArchiveStore::open(config.archive_dir());
    let Some(summary) = store.describe(&args.account)? else {
        anyhow::bail!(
            "No archive for '{}' in {}. Run 'xcrawl crawl {}' first.",
            args.account,
            store.root().display(),
            args.account
        );
    };

    if cli.format.is_json() {
        return print_json(cli.format, &summary);
    }

    println!("{}", summary.path.display().to_string().bold().cyan());
    println!("  Size: {}", format_bytes(summary.size_bytes));
    println!("{}", "─".repeat(CONTENT_DIVIDER_WIDTH));
    for (index, sheet) in summary.sheets.iter().enumerate() {
        let name = if sheet.name == MAIN_SHEET {
            sheet.name.bold().to_string()
        } else {
            sheet.name.clone()
        };
        println!("  {index:>3}  {name:<40} {:>10}", format_number_usize(sheet.rows));
    }
    Ok(())
}

fn cmd_config(cli: &Cli, config: &Config, args: &ConfigArgs) -> Result<()> {
    if args.init {
        let path: PathBuf = Config::save_default()?;
        println!("{} Wrote {}", "✓".green(), path.display());
        if !args.show {
            return Ok(());
        }
    }

    let mut shown = config.clone();
    if shown.feed.bearer_token.is_some() {
        shown.feed.bearer_token = Some("********".to_string());
    }
    if shown.paths.archive_dir.is_none() {
        shown.paths.archive_dir = Some(config.archive_dir());
    }

    if cli.format.is_json() {
        return print_json(cli.format, &shown);
    }
    println!("{}", "Current Configuration".bold().cyan());
    if let Some(path) = cli.config.clone().or_else(Config::user_config_path) {
        println!("  Config file: {}", path.display());
    }
    println!("{}", "─".repeat(CONTENT_DIVIDER_WIDTH));
    print!("{}", toml::to_string_pretty(&shown)?);
    Ok(())
}

fn cmd_completions(args: &CompletionsArgs) -> Result<()> {
    let mut cmd = Cli::command();
    generate(args.shell, &mut cmd, "xcrawl", &mut io::stdout());
    Ok(())
}
