//! External source files (CSV / spreadsheet rosters)
//!
//! Government rosters come as CSV (UTF-8 or Big5) or Excel workbooks with a
//! few title rows above the real header. The header row is the first of the
//! leading rows that mentions a name column; data columns are found by
//! keyword.

use calamine::{open_workbook_auto, Data, Reader};
use std::path::Path;

use crate::error::IngestError;

/// Rows searched for the header
const HEADER_SEARCH_ROWS: usize = 10;

const NAME_KEYWORDS: &[&str] = &["名稱", "單位", "站名"];
const ADDRESS_KEYWORDS: &[&str] = &["地址", "地點"];
const PHONE_KEYWORDS: &[&str] = &["電話", "連絡"];
const TIME_KEYWORDS: &[&str] = &["時間", "時段"];

/// One data row, cells trimmed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceRow {
    /// 1-based row number in the file
    pub line: usize,
    pub name: String,
    pub address: String,
    pub phone: String,
    pub time: String,
}

/// Column positions resolved from the header row
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ColumnMap {
    pub name: Option<usize>,
    pub address: Option<usize>,
    pub phone: Option<usize>,
    pub time: Option<usize>,
}

impl ColumnMap {
    pub fn from_header(header: &[String]) -> Self {
        let find = |keywords: &[&str]| {
            header
                .iter()
                .position(|h| keywords.iter().any(|k| h.contains(k)))
        };
        Self {
            name: find(NAME_KEYWORDS),
            address: find(ADDRESS_KEYWORDS),
            phone: find(PHONE_KEYWORDS),
            time: find(TIME_KEYWORDS),
        }
    }
}

fn source_error(path: &Path, message: impl Into<String>) -> IngestError {
    IngestError::Source {
        path: path.display().to_string(),
        message: message.into(),
    }
}

/// Read a file as text, falling back to Big5 when it is not UTF-8
pub fn read_file_as_utf8(path: &Path) -> Result<String, IngestError> {
    let bytes = std::fs::read(path)?;

    let text = match String::from_utf8(bytes) {
        Ok(s) => s,
        Err(e) => {
            let bytes = e.into_bytes();
            let (decoded, _, had_errors) = encoding_rs::BIG5.decode(&bytes);
            if had_errors {
                tracing::warn!(path = %path.display(), "Source is neither UTF-8 nor clean Big5");
            }
            decoded.into_owned()
        }
    };

    Ok(text.trim_start_matches('\u{feff}').to_string())
}

/// Parse CSV text into raw rows
pub fn parse_csv(content: &str) -> Result<Vec<Vec<String>>, csv::Error> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(content.as_bytes());

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows.push(record.iter().map(|field| field.trim().to_string()).collect());
    }
    Ok(rows)
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.trim().to_string(),
        Data::Int(n) => n.to_string(),
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", *f as i64),
        Data::Float(f) => f.to_string(),
        Data::Bool(b) => b.to_string(),
        other => other.to_string().trim().to_string(),
    }
}

/// First worksheet of a workbook as raw rows
pub fn read_workbook(path: &Path) -> Result<Vec<Vec<String>>, IngestError> {
    let mut workbook = open_workbook_auto(path)
        .map_err(|e| source_error(path, format!("failed to open workbook: {}", e)))?;

    let sheet_name = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| source_error(path, "workbook contains no sheets"))?;

    let range = workbook
        .worksheet_range(&sheet_name)
        .map_err(|e| source_error(path, format!("failed to read sheet '{}': {}", sheet_name, e)))?;

    Ok(range
        .rows()
        .map(|row| row.iter().map(cell_text).collect())
        .collect())
}

/// Raw rows of a source file, by extension
pub fn read_raw_rows(path: &Path) -> Result<Vec<Vec<String>>, IngestError> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    match extension.as_str() {
        "xlsx" | "xls" | "xlsb" | "ods" => read_workbook(path),
        _ => {
            let content = read_file_as_utf8(path)?;
            parse_csv(&content).map_err(|e| source_error(path, format!("CSV error: {}", e)))
        }
    }
}

/// Locate the header and turn the rows below it into [`SourceRow`]s
///
/// Returns `None` when no header row is found.
pub fn extract_rows(raw: &[Vec<String>]) -> Option<(ColumnMap, Vec<SourceRow>)> {
    let header_index = raw.iter().take(HEADER_SEARCH_ROWS).position(|row| {
        row.iter()
            .any(|cell| NAME_KEYWORDS.iter().any(|k| cell.contains(k)))
    })?;

    let columns = ColumnMap::from_header(&raw[header_index]);
    let cell = |row: &[String], index: Option<usize>| {
        index
            .and_then(|i| row.get(i))
            .map(|s| s.trim().to_string())
            .unwrap_or_default()
    };

    let rows = raw
        .iter()
        .enumerate()
        .skip(header_index + 1)
        .map(|(index, row)| SourceRow {
            line: index + 1,
            name: cell(row, columns.name),
            address: cell(row, columns.address),
            phone: cell(row, columns.phone),
            time: cell(row, columns.time),
        })
        .collect();

    Some((columns, rows))
}

/// Read a source file into data rows
pub fn load_source(path: &Path) -> Result<Vec<SourceRow>, IngestError> {
    let raw = read_raw_rows(path)?;
    let (columns, rows) = extract_rows(&raw).ok_or_else(|| {
        source_error(
            path,
            format!("no header row in the first {} rows", HEADER_SEARCH_ROWS),
        )
    })?;

    tracing::debug!(
        path = %path.display(),
        rows = rows.len(),
        ?columns,
        "Parsed source file"
    );
    Ok(rows)
}
