//! Per-account spreadsheet archives.
//!
//! Each account owns one workbook. `main_sheet` holds the de-duplicated,
//! newest-first union of everything collected so far and always sits at
//! index 0; every run also appends a batch sheet with exactly the rows it
//! collected. Writes go to a temporary file that replaces the archive in one
//! rename.

use crate::error::{CrawlError, Result, ResultExt};
use crate::model::{PostRecord, PostTable};
use crate::window::DateWindow;
use crate::workbook::{Cell, Sheet, Workbook, WorkbookCodec, XlsxCodec};
use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use serde::Serialize;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Name of the cumulative sheet.
pub const MAIN_SHEET: &str = "main_sheet";

/// Header row of every post sheet.
pub const COLUMNS: [&str; 7] = [
    "timestamp",
    "body",
    "hashtags",
    "mentions",
    "language",
    "is_repost",
    "repost_count",
];

const BATCH_SUFFIX_SPACE: u32 = 1000;

static EMPTY_CELL: Cell = Cell::Empty;

/// Archive directory with one workbook per account.
pub struct ArchiveStore<C = XlsxCodec> {
    root: PathBuf,
    codec: C,
}

/// Sheet listing of one archive.
#[derive(Debug, Clone, Serialize)]
pub struct ArchiveSummary {
    pub path: PathBuf,
    pub size_bytes: u64,
    pub sheets: Vec<SheetSummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SheetSummary {
    pub name: String,
    pub rows: usize,
}

impl ArchiveStore<XlsxCodec> {
    pub fn open(root: impl Into<PathBuf>) -> Self {
        Self::with_codec(root, XlsxCodec)
    }
}

impl<C: WorkbookCodec> ArchiveStore<C> {
    pub fn with_codec(root: impl Into<PathBuf>, codec: C) -> Self {
        Self {
            root: root.into(),
            codec,
        }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Archive file for `account`: the identifier without its leading `@`.
    ///
    /// # Errors
    ///
    /// Returns [`CrawlError::InvalidArgument`] for identifiers that cannot name a file.
    pub fn archive_path(&self, account: &str) -> Result<PathBuf> {
        let stem = account_file_stem(account)?;
        Ok(self.root.join(format!("{stem}.{}", self.codec.extension())))
    }

    /// Merge `table` into the account's archive and write it back.
    ///
    /// Running this twice with the same table leaves `main_sheet` unchanged
    /// the second time; only another batch sheet is added.
    ///
    /// # Errors
    ///
    /// Returns file, codec, or sheet-format errors. On error the archive on
    /// disk is left as it was.
    pub fn persist(&self, table: &PostTable, window: &DateWindow) -> Result<PathBuf> {
        let path = self.archive_path(table.account())?;
        info!(
            account = table.account(),
            posts = table.len(),
            path = %path.display(),
            "Saving posts to archive"
        );

        fs::create_dir_all(&self.root).path_context("create directory", &self.root)?;

        let mut workbook = if path.is_file() {
            self.codec.read(&path)?
        } else {
            debug!(path = %path.display(), "Creating new archive");
            Workbook::new()
        };

        let existing = take_main_records(&mut workbook)?;
        let merged = merge_records(existing, table.records());

        let batch_name = batch_sheet_name(&workbook, window, time_seed())?;
        workbook.push_sheet(records_to_sheet(&batch_name, table.records()))?;
        workbook.push_sheet(records_to_sheet(MAIN_SHEET, &merged))?;
        workbook.move_sheet(None, None)?;

        self.write_atomic(&workbook, &path)?;
        info!(
            account = table.account(),
            batch_sheet = %batch_name,
            main_rows = merged.len(),
            "Archive updated"
        );
        Ok(path)
    }

    /// Read the `main_sheet` rows of an account's archive.
    ///
    /// # Errors
    ///
    /// Returns an error if the archive is missing or unreadable.
    pub fn load_main(&self, account: &str) -> Result<Vec<PostRecord>> {
        let path = self.archive_path(account)?;
        let workbook = self.codec.read(&path)?;
        workbook
            .sheet(MAIN_SHEET)
            .map_or_else(|| Ok(Vec::new()), records_from_sheet)
    }

    /// List the sheets of an account's archive, or `None` if it has none yet.
    ///
    /// # Errors
    ///
    /// Returns an error if the archive exists but cannot be read.
    pub fn describe(&self, account: &str) -> Result<Option<ArchiveSummary>> {
        let path = self.archive_path(account)?;
        if !path.is_file() {
            return Ok(None);
        }
        let size_bytes = fs::metadata(&path)
            .path_context("stat", &path)?
            .len();
        let workbook = self.codec.read(&path)?;
        let sheets = workbook
            .sheets()
            .iter()
            .map(|s| SheetSummary {
                name: s.name.clone(),
                rows: s.data_rows(),
            })
            .collect();
        Ok(Some(ArchiveSummary {
            path,
            size_bytes,
            sheets,
        }))
    }

    fn write_atomic(&self, workbook: &Workbook, path: &Path) -> Result<()> {
        let temp = tempfile::Builder::new()
            .prefix(".xcrawl-")
            .suffix(&format!(".{}.tmp", self.codec.extension()))
            .tempfile_in(&self.root)
            .path_context("create temporary file in", &self.root)?;

        self.codec.write(workbook, temp.path())?;
        temp.persist(path).path_context("replace", path)?;
        Ok(())
    }
}

/// File stem for an account identifier.
///
/// # Errors
///
/// Returns [`CrawlError::InvalidArgument`] for empty identifiers or ones
/// containing path separators.
pub fn account_file_stem(account: &str) -> Result<&str> {
    let stem = account.trim().strip_prefix('@').unwrap_or_else(|| account.trim());
    if stem.is_empty() || stem == "." || stem == ".." || stem.contains(['/', '\\']) {
        return Err(CrawlError::invalid_argument(format!(
            "'{account}' is not a usable account identifier"
        )));
    }
    Ok(stem)
}

/// Union of existing and incoming rows, newest first, first of each
/// `(timestamp, body)` pair kept.
///
/// The sort is stable, so on a full tie the existing row wins.
#[must_use]
pub fn merge_records(existing: Vec<PostRecord>, incoming: &[PostRecord]) -> Vec<PostRecord> {
    let mut union = existing;
    union.extend_from_slice(incoming);
    union.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

    let mut seen = HashSet::with_capacity(union.len());
    union
        .into_iter()
        .filter(|record| seen.insert(record.dedup_key()))
        .collect()
}

/// Unique batch sheet name: `<window label>_<NNN>`.
///
/// Starts from `seed % 1000` and counts upward until the name is free.
///
/// # Errors
///
/// Returns [`CrawlError::DuplicateSheet`] once all suffixes for the window are used.
pub fn batch_sheet_name(workbook: &Workbook, window: &DateWindow, seed: u32) -> Result<String> {
    let label = window.label();
    (0..BATCH_SUFFIX_SPACE)
        .map(|offset| format!("{label}_{:03}", (seed + offset) % BATCH_SUFFIX_SPACE))
        .find(|name| !workbook.contains(name))
        .ok_or(CrawlError::DuplicateSheet { name: label })
}

fn time_seed() -> u32 {
    Utc::now().timestamp_subsec_millis()
}

/// Remove `main_sheet` and return its rows.
///
/// An archive without a main sheet is rebuilt from its batch sheets.
fn take_main_records(workbook: &mut Workbook) -> Result<Vec<PostRecord>> {
    if let Some(main) = workbook.remove_sheet(MAIN_SHEET) {
        return records_from_sheet(&main);
    }
    if workbook.is_empty() {
        return Ok(Vec::new());
    }

    warn!(
        sheets = workbook.len(),
        "Archive has no {MAIN_SHEET}; rebuilding it from batch sheets"
    );
    let mut recovered = Vec::new();
    for sheet in workbook.sheets() {
        match records_from_sheet(sheet) {
            Ok(records) => recovered = merge_records(recovered, &records),
            Err(e) => warn!(sheet = %sheet.name, error = %e, "Skipping unreadable sheet"),
        }
    }
    Ok(recovered)
}

/// Render rows under the standard header.
#[must_use]
pub fn records_to_sheet(name: &str, records: &[PostRecord]) -> Sheet {
    let header = COLUMNS.iter().map(|c| Cell::text(*c)).collect();
    let mut rows = Vec::with_capacity(records.len() + 1);
    rows.push(header);
    rows.extend(records.iter().map(record_to_row));
    Sheet::new(name, rows)
}

#[allow(clippy::cast_precision_loss)]
fn record_to_row(record: &PostRecord) -> Vec<Cell> {
    vec![
        Cell::text(record.timestamp.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
        Cell::text(record.body.as_str()),
        Cell::text(list_to_text(&record.hashtags)),
        Cell::text(list_to_text(&record.mentions)),
        Cell::text(record.language.clone().unwrap_or_default()),
        Cell::Bool(record.is_repost),
        Cell::Number(record.repost_count as f64),
    ]
}

fn list_to_text(items: &[String]) -> String {
    serde_json::to_string(items).unwrap_or_default()
}

/// Parse a post sheet, locating columns by header name.
///
/// # Errors
///
/// Returns [`CrawlError::SheetFormat`] when the header lacks `timestamp` or
/// `body`, or a row has no readable timestamp.
pub fn records_from_sheet(sheet: &Sheet) -> Result<Vec<PostRecord>> {
    let Some(header) = sheet.rows.first() else {
        return Ok(Vec::new());
    };
    let column = |name: &str| {
        header
            .iter()
            .position(|cell| matches!(cell, Cell::Text(t) if t.trim() == name))
    };
    let timestamp_col = column("timestamp")
        .ok_or_else(|| CrawlError::sheet_format(&sheet.name, 0, "missing 'timestamp' column"))?;
    let body_col = column("body")
        .ok_or_else(|| CrawlError::sheet_format(&sheet.name, 0, "missing 'body' column"))?;
    let hashtags_col = column("hashtags");
    let mentions_col = column("mentions");
    let language_col = column("language");
    let repost_col = column("is_repost");
    let count_col = column("repost_count");

    let mut records = Vec::with_capacity(sheet.data_rows());
    for (index, row) in sheet.rows.iter().enumerate().skip(1) {
        let cell = |col: Option<usize>| col.and_then(|c| row.get(c)).unwrap_or(&EMPTY_CELL);

        if row.iter().all(Cell::is_empty) {
            continue;
        }

        let timestamp = parse_timestamp(cell(Some(timestamp_col))).ok_or_else(|| {
            CrawlError::sheet_format(&sheet.name, index, "missing or unreadable timestamp")
        })?;
        let body = cell_text(cell(Some(body_col)));

        records.push(PostRecord {
            timestamp,
            is_repost: match cell(repost_col) {
                Cell::Bool(b) => *b,
                Cell::Text(t) => t.eq_ignore_ascii_case("true"),
                Cell::Number(n) => *n != 0.0,
                Cell::Empty => crate::model::is_repost_text(&body),
            },
            body,
            hashtags: text_to_list(&cell_text(cell(hashtags_col))),
            mentions: text_to_list(&cell_text(cell(mentions_col))),
            language: Some(cell_text(cell(language_col))).filter(|l| !l.is_empty()),
            repost_count: cell_count(cell(count_col)),
        });
    }
    Ok(records)
}

fn cell_text(cell: &Cell) -> String {
    match cell {
        Cell::Empty => String::new(),
        Cell::Text(t) => t.clone(),
        Cell::Number(n) => n.to_string(),
        Cell::Bool(b) => b.to_string(),
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn cell_count(cell: &Cell) -> u64 {
    match cell {
        Cell::Number(n) if n.is_finite() && *n >= 0.0 => n.round() as u64,
        Cell::Text(t) => t.trim().parse().unwrap_or(0),
        _ => 0,
    }
}

fn parse_timestamp(cell: &Cell) -> Option<DateTime<Utc>> {
    let Cell::Text(text) = cell else {
        return None;
    };
    let text = text.trim();
    DateTime::parse_from_rfc3339(text)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S")
                .ok()
                .map(|naive| naive.and_utc())
        })
}

/// JSON array text, with a comma-separated fallback for hand-edited cells.
fn text_to_list(text: &str) -> Vec<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Vec::new();
    }
    serde_json::from_str(trimmed).unwrap_or_else(|_| {
        trimmed
            .trim_start_matches('[')
            .trim_end_matches(']')
            .split(',')
            .map(|item| item.trim().trim_matches(['\'', '"']).to_string())
            .filter(|item| !item.is_empty())
            .collect()
    })
}
