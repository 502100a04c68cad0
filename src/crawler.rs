//! Multi-account crawl orchestration.
//!
//! A [`CrawlPlan`] is an ordered list of (account, start, end) jobs. The
//! [`Crawler`] runs them one after another; a failing account is logged and
//! skipped so the rest of the plan still runs.

use crate::collector::Collector;
use crate::error::{CrawlError, ErrorKind, Result};
use crate::feed::FeedSource;
use crate::logging::OperationGuard;
use crate::model::PostTable;
use crate::storage::ArchiveStore;
use crate::window::{DateTriple, DateWindow};
use crate::workbook::{WorkbookCodec, XlsxCodec};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

/// One account and the inclusive calendar range to crawl for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CrawlJob {
    pub account: String,
    pub start: DateTriple,
    pub end: DateTriple,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrawlPlan {
    jobs: Vec<CrawlJob>,
}

impl CrawlPlan {
    /// Pair accounts with date triples position by position.
    ///
    /// A single start/end pair applies to every account.
    ///
    /// # Errors
    ///
    /// Returns [`CrawlError::InvalidArgument`] when the lists cannot be paired.
    pub fn from_parallel(
        accounts: &[String],
        start_dates: &[DateTriple],
        end_dates: &[DateTriple],
    ) -> Result<Self> {
        if accounts.is_empty() {
            return Ok(Self::default());
        }

        let (starts, ends) = if start_dates.len() == 1 && end_dates.len() == 1 {
            (
                vec![start_dates[0]; accounts.len()],
                vec![end_dates[0]; accounts.len()],
            )
        } else if start_dates.len() == accounts.len() && end_dates.len() == accounts.len() {
            (start_dates.to_vec(), end_dates.to_vec())
        } else {
            return Err(CrawlError::invalid_argument(format!(
                "{} account(s) need either one start/end pair or one per account, got {} start and {} end date(s)",
                accounts.len(),
                start_dates.len(),
                end_dates.len()
            )));
        };

        let jobs = accounts
            .iter()
            .zip(starts)
            .zip(ends)
            .map(|((account, start), end)| CrawlJob {
                account: account.clone(),
                start,
                end,
            })
            .collect();
        Ok(Self { jobs })
    }

    #[must_use]
    pub fn jobs(&self) -> &[CrawlJob] {
        &self.jobs
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}

/// Why an account was skipped.
#[derive(Debug, Clone, Serialize)]
pub struct AccountFailure {
    pub account: String,
    pub kind: ErrorKind,
    pub code: Option<i64>,
    pub message: String,
}

impl AccountFailure {
    fn new(account: &str, error: &CrawlError) -> Self {
        Self {
            account: account.to_string(),
            kind: error.kind(),
            code: error.code(),
            message: error.to_string(),
        }
    }
}

/// Result of a whole run.
#[derive(Debug, Default)]
pub struct CrawlOutcome {
    /// Collected table per successful account.
    pub collected: BTreeMap<String, PostTable>,
    /// Archive written per successful account.
    pub archives: BTreeMap<String, PathBuf>,
    pub failed: Vec<AccountFailure>,
}

impl CrawlOutcome {
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    #[must_use]
    pub fn total_posts(&self) -> usize {
        self.collected.values().map(PostTable::len).sum()
    }
}

/// Progress notification for one finished job.
#[derive(Debug, Clone, Copy)]
pub enum JobResult<'a> {
    Saved {
        table: &'a PostTable,
        archive: &'a Path,
    },
    Failed(&'a AccountFailure),
}

/// Runs collect-then-persist for every job of a plan.
pub struct Crawler<F, C = XlsxCodec> {
    collector: Collector<F>,
    store: ArchiveStore<C>,
}

impl<F: FeedSource, C: WorkbookCodec> Crawler<F, C> {
    pub const fn new(collector: Collector<F>, store: ArchiveStore<C>) -> Self {
        Self { collector, store }
    }

    #[must_use]
    pub const fn collector(&self) -> &Collector<F> {
        &self.collector
    }

    #[must_use]
    pub const fn store(&self) -> &ArchiveStore<C> {
        &self.store
    }

    pub fn run(&self, plan: &CrawlPlan) -> CrawlOutcome {
        self.run_with(plan, |_, _| {})
    }

    /// Run every job, calling `on_result` after each one.
    ///
    /// Failed accounts are recorded and skipped. A fatal error (bad
    /// credentials) stops the run; jobs not yet started are not attempted.
    pub fn run_with<P>(&self, plan: &CrawlPlan, mut on_result: P) -> CrawlOutcome
    where
        P: FnMut(&CrawlJob, JobResult<'_>),
    {
        let mut outcome = CrawlOutcome::default();
        info!(accounts = plan.len(), "Starting crawl");

        for job in plan.jobs() {
            let guard = OperationGuard::new(format!("crawl {}", job.account));
            match self.run_job(job) {
                Ok((table, archive)) => {
                    guard.complete();
                    on_result(job, JobResult::Saved {
                        table: &table,
                        archive: &archive,
                    });
                    outcome.archives.insert(job.account.clone(), archive);
                    outcome.collected.insert(job.account.clone(), table);
                }
                Err(err) => {
                    warn!(
                        account = %job.account,
                        kind = %err.kind(),
                        code = ?err.code(),
                        message = err.message().unwrap_or_default(),
                        error = %err,
                        "Skipping account"
                    );
                    let fatal = err.is_fatal();
                    guard.fail(&err);
                    let failure = AccountFailure::new(&job.account, &err);
                    on_result(job, JobResult::Failed(&failure));
                    outcome.failed.push(failure);
                    if fatal {
                        error!("Fatal error, stopping the crawl");
                        break;
                    }
                }
            }
        }

        info!(
            succeeded = outcome.collected.len(),
            failed = outcome.failed.len(),
            posts = outcome.total_posts(),
            "Crawl finished"
        );
        outcome
    }

    fn run_job(&self, job: &CrawlJob) -> Result<(PostTable, PathBuf)> {
        let window = DateWindow::from_triples(job.start, job.end)?;
        let table = self.collector.collect(&job.account, &window)?;
        let archive = self.store.persist(&table, &window)?;
        Ok((table, archive))
    }
}
