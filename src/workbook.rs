//! In-memory workbooks and the spreadsheet codec seam.
//!
//! A [`Workbook`] is an ordered list of named sheets of plain cells. A
//! [`WorkbookCodec`] moves whole workbooks to and from disk; [`XlsxCodec`]
//! does so for `.xlsx` files.

use crate::error::{CrawlError, Result, ResultExt};
use calamine::{Data, Reader, Xlsx, open_workbook};
use std::path::Path;
use tracing::debug;

/// A single spreadsheet cell.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
}

impl Cell {
    /// Text cell, or [`Cell::Empty`] for an empty string.
    pub fn text(value: impl Into<String>) -> Self {
        let value = value.into();
        if value.is_empty() {
            Self::Empty
        } else {
            Self::Text(value)
        }
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }
}

/// A named sheet; the first row is conventionally the header.
#[derive(Debug, Clone, PartialEq)]
pub struct Sheet {
    pub name: String,
    pub rows: Vec<Vec<Cell>>,
}

impl Sheet {
    pub fn new(name: impl Into<String>, rows: Vec<Vec<Cell>>) -> Self {
        Self {
            name: name.into(),
            rows,
        }
    }

    /// Number of rows below the header.
    #[must_use]
    pub fn data_rows(&self) -> usize {
        self.rows.len().saturating_sub(1)
    }
}

/// Ordered collection of uniquely named sheets.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Workbook {
    sheets: Vec<Sheet>,
}

impl Workbook {
    #[must_use]
    pub const fn new() -> Self {
        Self { sheets: Vec::new() }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.sheets.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sheets.is_empty()
    }

    #[must_use]
    pub fn sheets(&self) -> &[Sheet] {
        &self.sheets
    }

    #[must_use]
    pub fn sheet_names(&self) -> Vec<&str> {
        self.sheets.iter().map(|s| s.name.as_str()).collect()
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.sheets.iter().any(|s| s.name == name)
    }

    #[must_use]
    pub fn sheet(&self, name: &str) -> Option<&Sheet> {
        self.sheets.iter().find(|s| s.name == name)
    }

    /// Append a sheet at the end.
    ///
    /// # Errors
    ///
    /// Returns [`CrawlError::DuplicateSheet`] if the name is taken.
    pub fn push_sheet(&mut self, sheet: Sheet) -> Result<()> {
        if self.contains(&sheet.name) {
            return Err(CrawlError::DuplicateSheet { name: sheet.name });
        }
        self.sheets.push(sheet);
        Ok(())
    }

    /// Remove and return the sheet called `name`.
    pub fn remove_sheet(&mut self, name: &str) -> Option<Sheet> {
        let index = self.sheets.iter().position(|s| s.name == name)?;
        Some(self.sheets.remove(index))
    }

    /// Move the sheet at `from` (default: last) to position `to` (default: first).
    ///
    /// # Errors
    ///
    /// Returns [`CrawlError::SheetIndex`] when either position is out of range.
    pub fn move_sheet(&mut self, from: Option<usize>, to: Option<usize>) -> Result<()> {
        let len = self.sheets.len();
        let from = match from {
            Some(index) => index,
            None => len
                .checked_sub(1)
                .ok_or(CrawlError::SheetIndex { index: 0, len })?,
        };
        let to = to.unwrap_or(0);
        if from >= len {
            return Err(CrawlError::SheetIndex { index: from, len });
        }
        if to >= len {
            return Err(CrawlError::SheetIndex { index: to, len });
        }

        let sheet = self.sheets.remove(from);
        self.sheets.insert(to, sheet);
        Ok(())
    }
}

/// Reads and writes whole workbooks.
pub trait WorkbookCodec {
    /// File extension without the dot.
    fn extension(&self) -> &'static str;

    /// Read every sheet of the workbook at `path`, in file order.
    ///
    /// # Errors
    ///
    /// Returns [`CrawlError::Workbook`] if the file cannot be decoded.
    fn read(&self, path: &Path) -> Result<Workbook>;

    /// Write `workbook` to `path`, replacing any existing content.
    ///
    /// # Errors
    ///
    /// Returns [`CrawlError::Workbook`] if the file cannot be encoded.
    fn write(&self, workbook: &Workbook, path: &Path) -> Result<()>;
}

/// Office Open XML spreadsheets.
#[derive(Debug, Clone, Copy, Default)]
pub struct XlsxCodec;

impl WorkbookCodec for XlsxCodec {
    fn extension(&self) -> &'static str {
        "xlsx"
    }

    fn read(&self, path: &Path) -> Result<Workbook> {
        let mut xlsx: Xlsx<_> = open_workbook(path).workbook_context(path)?;

        let mut workbook = Workbook::new();
        for name in xlsx.sheet_names() {
            let range = xlsx
                .worksheet_range(&name)
                .map_err(|e| CrawlError::workbook(path, format!("sheet '{name}': {e}")))?;
            let rows = range
                .rows()
                .map(|row| row.iter().map(cell_from_data).collect())
                .collect();
            workbook.push_sheet(Sheet::new(name, rows))?;
        }

        debug!(path = %path.display(), sheets = workbook.len(), "Read workbook");
        Ok(workbook)
    }

    fn write(&self, workbook: &Workbook, path: &Path) -> Result<()> {
        let mut book = rust_xlsxwriter::Workbook::new();

        for sheet in workbook.sheets() {
            let worksheet = book.add_worksheet();
            worksheet
                .set_name(sheet.name.as_str())
                .map_err(|e| CrawlError::workbook(path, format!("sheet '{}': {e}", sheet.name)))?;

            for (row_index, row) in sheet.rows.iter().enumerate() {
                let row_num = u32::try_from(row_index)
                    .map_err(|_| CrawlError::workbook(path, "too many rows"))?;
                for (col_index, cell) in row.iter().enumerate() {
                    let col_num = u16::try_from(col_index)
                        .map_err(|_| CrawlError::workbook(path, "too many columns"))?;
                    let written = match cell {
                        Cell::Empty => continue,
                        Cell::Text(text) => worksheet.write_string(row_num, col_num, text.as_str()),
                        Cell::Number(n) => worksheet.write_number(row_num, col_num, *n),
                        Cell::Bool(b) => worksheet.write_boolean(row_num, col_num, *b),
                    };
                    written.map_err(|e| {
                        CrawlError::workbook(
                            path,
                            format!("sheet '{}' cell ({row_index}, {col_index}): {e}", sheet.name),
                        )
                    })?;
                }
            }
        }

        book.save(path).workbook_context(path)?;
        debug!(path = %path.display(), sheets = workbook.len(), "Wrote workbook");
        Ok(())
    }
}

#[allow(clippy::cast_precision_loss)]
fn cell_from_data(value: &Data) -> Cell {
    match value {
        Data::Empty => Cell::Empty,
        Data::String(s) => Cell::text(unescape_ooxml(s)),
        Data::DateTimeIso(s) | Data::DurationIso(s) => Cell::text(s.as_str()),
        Data::Float(f) => Cell::Number(*f),
        Data::Int(i) => Cell::Number(*i as f64),
        Data::Bool(b) => Cell::Bool(*b),
        other => Cell::text(other.to_string()),
    }
}

/// Decode the `_xHHHH_` character escapes that xlsx writers emit for
/// control characters.
///
/// `_x005F_` is an escaped underscore, so `_x005F_x000D_` reads back as the
/// literal text `_x000D_`.
fn unescape_ooxml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(pos) = rest.find("_x") {
        out.push_str(&rest[..pos]);
        let candidate = &rest[pos..];
        match escaped_char(candidate) {
            Some(ch) => {
                out.push(ch);
                rest = &candidate[7..];
            }
            None => {
                out.push('_');
                rest = &candidate[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

/// Character encoded by a leading `_xHHHH_`, if `text` starts with one.
fn escaped_char(text: &str) -> Option<char> {
    let hex = text.get(2..6)?;
    if text.as_bytes().get(6) != Some(&b'_') || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    u32::from_str_radix(hex, 16).ok().and_then(char::from_u32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn named(names: &[&str]) -> Workbook {
        let mut wb = Workbook::new();
        for name in names {
            wb.push_sheet(Sheet::new(*name, vec![])).unwrap();
        }
        wb
    }

    #[test]
    fn move_sheet_defaults_to_last_to_first() {
        let mut wb = named(&["a", "b", "main_sheet"]);
        wb.move_sheet(None, None).unwrap();
        assert_eq!(wb.sheet_names(), ["main_sheet", "a", "b"]);
    }

    #[test]
    fn move_sheet_explicit_positions() {
        let mut wb = named(&["a", "b", "c", "d"]);
        wb.move_sheet(Some(0), Some(2)).unwrap();
        assert_eq!(wb.sheet_names(), ["b", "c", "a", "d"]);
        wb.move_sheet(Some(3), None).unwrap();
        assert_eq!(wb.sheet_names(), ["d", "b", "c", "a"]);
    }

    #[test]
    fn move_sheet_rejects_bad_indices() {
        let mut wb = named(&["a", "b"]);
        assert!(matches!(
            wb.move_sheet(Some(2), None),
            Err(CrawlError::SheetIndex { index: 2, len: 2 })
        ));
        assert!(wb.move_sheet(None, Some(5)).is_err());
        assert!(Workbook::new().move_sheet(None, None).is_err());
    }

    #[test]
    fn sheet_names_must_be_unique() {
        let mut wb = named(&["a"]);
        let err = wb.push_sheet(Sheet::new("a", vec![])).unwrap_err();
        assert!(matches!(err, CrawlError::DuplicateSheet { .. }));
    }

    #[test]
    fn remove_sheet_returns_it() {
        let mut wb = named(&["a", "b"]);
        assert_eq!(wb.remove_sheet("a").map(|s| s.name), Some("a".to_string()));
        assert!(wb.remove_sheet("a").is_none());
        assert_eq!(wb.sheet_names(), ["b"]);
    }

    #[test]
    fn empty_text_becomes_empty_cell() {
        assert_eq!(Cell::text(""), Cell::Empty);
        assert_eq!(Cell::text("x"), Cell::Text("x".to_string()));
    }

    #[test]
    fn xlsx_preserves_sheet_order_and_cells() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("book.xlsx");

        let mut wb = Workbook::new();
        wb.push_sheet(Sheet::new(
            "main_sheet",
            vec![
                vec![Cell::text("name"), Cell::text("count"), Cell::text("flag")],
                vec![Cell::text("héllo 🦀"), Cell::Number(3.0), Cell::Bool(true)],
                vec![Cell::text("=1+1"), Cell::Empty, Cell::Bool(false)],
            ],
        ))
        .unwrap();
        wb.push_sheet(Sheet::new(
            "2020-03-14_to_2020-03-21_042",
            vec![vec![Cell::text("name")], vec![Cell::text("only")]],
        ))
        .unwrap();

        XlsxCodec.write(&wb, &path).unwrap();
        let back = XlsxCodec.read(&path).unwrap();

        assert_eq!(back.sheet_names(), ["main_sheet", "2020-03-14_to_2020-03-21_042"]);
        let main = back.sheet("main_sheet").unwrap();
        assert_eq!(main.rows[1][0], Cell::text("héllo 🦀"));
        assert_eq!(main.rows[1][1], Cell::Number(3.0));
        assert_eq!(main.rows[1][2], Cell::Bool(true));
        assert_eq!(main.rows[2][0], Cell::text("=1+1"));
        assert!(main.rows[2][1].is_empty());
        assert_eq!(main.data_rows(), 2);
    }

    #[test]
    fn unescape_decodes_character_escapes() {
        assert_eq!(unescape_ooxml("line1_x000D_\nline2"), "line1\r\nline2");
        assert_eq!(unescape_ooxml("bell_x0007_x"), "bell\u{7}x");
        assert_eq!(unescape_ooxml("A_x005F_x0041_B"), "A_x0041_B");
        assert_eq!(unescape_ooxml("_x00e9_"), "é");
    }

    #[test]
    fn unescape_leaves_other_underscores_alone() {
        assert_eq!(unescape_ooxml("snake_case_x"), "snake_case_x");
        assert_eq!(unescape_ooxml("_xZZZZ_"), "_xZZZZ_");
        assert_eq!(unescape_ooxml("_x12"), "_x12");
        assert_eq!(unescape_ooxml("_x12345_"), "_x12345_");
        assert_eq!(unescape_ooxml("_xD800_"), "_xD800_");
        assert_eq!(unescape_ooxml("__x0041_"), "_A");
        assert_eq!(unescape_ooxml("ü_x"), "ü_x");
    }

    #[test]
    fn xlsx_round_trips_control_characters() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("book.xlsx");
        let texts = [
            "line1\r\nline2",
            "bell\u{7}x",
            "A_x0041_B",
            "_x005F_",
            "tab\there",
            "  padded  ",
        ];

        let mut wb = Workbook::new();
        wb.push_sheet(Sheet::new(
            "s",
            texts.iter().map(|t| vec![Cell::text(*t)]).collect(),
        ))
        .unwrap();

        XlsxCodec.write(&wb, &path).unwrap();
        let once = XlsxCodec.read(&path).unwrap();
        assert_eq!(once, wb);

        XlsxCodec.write(&once, &path).unwrap();
        assert_eq!(XlsxCodec.read(&path).unwrap(), wb);
    }

    #[test]
    fn reading_garbage_is_a_workbook_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.xlsx");
        std::fs::write(&path, b"not a zip").unwrap();
        let err = XlsxCodec.read(&path).unwrap_err();
        assert!(matches!(err, CrawlError::Workbook { .. }));
    }
}
