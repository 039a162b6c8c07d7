//! In-memory workbook and its directory-of-CSV file form.
//!
//! A workbook directory holds one `<sheet>.csv` per sheet, header row first.
//!
//! # Invariants
//! - Sheet names are unique case-insensitively and at most
//!   [`SHEET_NAME_MAX_CHARS`] characters.
//! - Header lookups ignore case and surrounding whitespace.

use crate::transfer::{TransferError, TransferResult};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

/// Spreadsheet sheet-name length limit.
pub const SHEET_NAME_MAX_CHARS: usize = 31;
const SHEET_FILE_EXTENSION: &str = "csv";

static UNSAFE_SHEET_CHARS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"[\[\]:*?/\\<>|"]"#).expect("valid sheet name regex"));

/// One named table of strings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Sheet {
    pub name: String,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Sheet {
    pub fn new(name: impl Into<String>, headers: Vec<String>) -> Self {
        Self {
            name: name.into(),
            headers,
            rows: Vec::new(),
        }
    }

    pub fn push_row(&mut self, row: Vec<String>) {
        self.rows.push(row);
    }

    /// Index of `column`, matching headers case-insensitively.
    pub fn column_index(&self, column: &str) -> Option<usize> {
        let wanted = column.trim();
        self.headers
            .iter()
            .position(|header| header.trim().eq_ignore_ascii_case(wanted))
    }

    /// Cell text, or `""` for cells past the end of a short row.
    pub fn cell(&self, row: usize, column: usize) -> &str {
        self.rows
            .get(row)
            .and_then(|cells| cells.get(column))
            .map_or("", |value| value.as_str())
    }
}

/// Ordered collection of sheets.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Workbook {
    sheets: Vec<Sheet>,
}

impl Workbook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a sheet, renaming it if its name is too long or already used.
    ///
    /// Returns the name the sheet was stored under.
    pub fn add_sheet(&mut self, mut sheet: Sheet) -> String {
        let used: HashSet<String> = self.sheets.iter().map(|s| s.name.to_lowercase()).collect();
        sheet.name = unique_sheet_name(&sheet.name, &used);
        let name = sheet.name.clone();
        self.sheets.push(sheet);
        name
    }

    pub fn sheet(&self, name: &str) -> Option<&Sheet> {
        self.sheets
            .iter()
            .find(|sheet| sheet.name.eq_ignore_ascii_case(name))
    }

    pub fn sheets(&self) -> &[Sheet] {
        &self.sheets
    }

    pub fn sheet_names(&self) -> Vec<&str> {
        self.sheets.iter().map(|s| s.name.as_str()).collect()
    }
}

/// Truncates a sheet name to [`SHEET_NAME_MAX_CHARS`] characters.
pub fn truncate_sheet_name(name: &str) -> String {
    name.chars().take(SHEET_NAME_MAX_CHARS).collect()
}

fn unique_sheet_name(name: &str, used: &HashSet<String>) -> String {
    let base = truncate_sheet_name(name);
    if !used.contains(&base.to_lowercase()) {
        return base;
    }

    let mut suffix_no = 2usize;
    loop {
        let suffix = format!("~{suffix_no}");
        let keep = SHEET_NAME_MAX_CHARS.saturating_sub(suffix.chars().count());
        let candidate = format!("{}{suffix}", name.chars().take(keep).collect::<String>());
        if !used.contains(&candidate.to_lowercase()) {
            return candidate;
        }
        suffix_no += 1;
    }
}

/// File stem used for a sheet: unsafe path characters become `_`.
pub fn sheet_file_stem(sheet_name: &str) -> String {
    UNSAFE_SHEET_CHARS_RE
        .replace_all(sheet_name, "_")
        .into_owned()
}

/// Writes every sheet as `<dir>/<sheet>.csv`, creating `dir` if needed.
pub fn write_workbook_dir(workbook: &Workbook, dir: &Path) -> TransferResult<()> {
    fs::create_dir_all(dir).map_err(|source| TransferError::Io {
        path: dir.to_path_buf(),
        source,
    })?;

    for sheet in workbook.sheets() {
        let path = dir.join(format!(
            "{}.{SHEET_FILE_EXTENSION}",
            sheet_file_stem(&sheet.name)
        ));
        write_sheet(sheet, &path).map_err(|source| TransferError::Csv {
            path: path.clone(),
            source,
        })?;
    }
    Ok(())
}

/// Reads every `*.csv` file of `dir` as one sheet named after its stem.
///
/// Sheets are ordered by file name.
pub fn read_workbook_dir(dir: &Path) -> TransferResult<Workbook> {
    let io_error = |source| TransferError::Io {
        path: dir.to_path_buf(),
        source,
    };

    let mut paths: Vec<PathBuf> = Vec::new();
    for entry in fs::read_dir(dir).map_err(io_error)? {
        let path = entry.map_err(io_error)?.path();
        let is_sheet = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case(SHEET_FILE_EXTENSION));
        if path.is_file() && is_sheet {
            paths.push(path);
        }
    }
    paths.sort();

    let mut workbook = Workbook::new();
    for path in paths {
        let name = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default();
        let sheet = read_sheet(&name, &path).map_err(|source| TransferError::Csv {
            path: path.clone(),
            source,
        })?;
        workbook.add_sheet(sheet);
    }
    Ok(workbook)
}

fn write_sheet(sheet: &Sheet, path: &Path) -> Result<(), csv::Error> {
    let mut writer = csv::WriterBuilder::new().flexible(true).from_path(path)?;
    writer.write_record(&sheet.headers)?;
    for row in &sheet.rows {
        writer.write_record(row)?;
    }
    writer.flush()?;
    Ok(())
}

fn read_sheet(name: &str, path: &Path) -> Result<Sheet, csv::Error> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)?;
    let headers = reader
        .headers()?
        .iter()
        .map(|header| header.trim_start_matches('\u{feff}').to_string())
        .collect();

    let mut sheet = Sheet::new(name, headers);
    for record in reader.records() {
        let record = record?;
        sheet.push_row(record.iter().map(str::to_string).collect());
    }
    Ok(sheet)
}

#[cfg(test)]
mod tests {
    use super::{sheet_file_stem, truncate_sheet_name, Sheet, Workbook, SHEET_NAME_MAX_CHARS};

    #[test]
    fn long_sheet_names_are_truncated_to_limit() {
        let name = "A process name that is far too long for a sheet";
        assert_eq!(truncate_sheet_name(name).chars().count(), SHEET_NAME_MAX_CHARS);
    }

    #[test]
    fn colliding_sheet_names_get_a_suffix_within_limit() {
        let long = "x".repeat(40);
        let mut workbook = Workbook::new();
        let first = workbook.add_sheet(Sheet::new(long.clone(), vec![]));
        let second = workbook.add_sheet(Sheet::new(long, vec![]));

        assert_eq!(first.chars().count(), SHEET_NAME_MAX_CHARS);
        assert_ne!(first, second);
        assert!(second.ends_with("~2"));
        assert_eq!(second.chars().count(), SHEET_NAME_MAX_CHARS);
    }

    #[test]
    fn sheet_file_stem_replaces_path_characters() {
        assert_eq!(sheet_file_stem("Paint/Dry: A*"), "Paint_Dry_ A_");
    }

    #[test]
    fn column_index_ignores_case_and_padding() {
        let sheet = Sheet::new("frame", vec![" ID ".to_string(), "Name".to_string()]);
        assert_eq!(sheet.column_index("id"), Some(0));
        assert_eq!(sheet.column_index("name"), Some(1));
        assert_eq!(sheet.column_index("process_id"), None);
    }
}
