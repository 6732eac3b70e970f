//! Delimited-text reader with delimiter detection.

use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::error::{EtlError, Result};
use crate::record::RecordSet;

use super::spreadsheet::SpreadsheetReader;

/// Delimiters to try when auto-detecting.
const DELIMITERS: &[u8] = &[b'\t', b',', b';', b'|'];

/// Delimiter of staged files.
pub const STAGED_DELIMITER: u8 = b'|';

/// Reads delimited files into record sets.
pub struct DelimitedReader {
    /// `None` auto-detects.
    delimiter: Option<u8>,
}

impl DelimitedReader {
    /// Create a reader that auto-detects the delimiter.
    pub fn new() -> Self {
        Self { delimiter: None }
    }

    /// Create a reader with a known delimiter.
    pub fn with_delimiter(delimiter: u8) -> Self {
        Self {
            delimiter: Some(delimiter),
        }
    }

    /// Read a file into a record set.
    pub fn read_file(&self, path: impl AsRef<Path>) -> Result<RecordSet> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(EtlError::NotFound(path.to_path_buf()));
        }

        let contents = std::fs::read(path).map_err(|e| EtlError::io(path, e))?;
        self.read_bytes(&contents)
    }

    /// Read in-memory bytes into a record set.
    pub fn read_bytes(&self, bytes: &[u8]) -> Result<RecordSet> {
        let delimiter = match self.delimiter {
            Some(d) => d,
            None => detect_delimiter(bytes)?,
        };

        let mut reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .has_headers(true)
            .flexible(true)
            .from_reader(bytes);

        let headers: Vec<String> = reader
            .headers()?
            .iter()
            .map(|s| s.trim_start_matches('\u{feff}').to_string())
            .collect();

        if headers.iter().all(|h| h.is_empty()) {
            return Err(EtlError::EmptyData("No columns found".to_string()));
        }
        if let Some(idx) = headers.iter().position(|h| h.is_empty()) {
            return Err(EtlError::Parse {
                row: 0,
                column: idx + 1,
                message: "Empty column header".to_string(),
            });
        }

        let expected_cols = headers.len();
        let mut rows = Vec::new();

        for result in reader.records() {
            let record = result?;
            let mut row: Vec<String> = record.iter().map(|s| s.to_string()).collect();

            // Ragged rows are padded or cut to the header width
            row.resize(expected_cols, String::new());
            rows.push(row);
        }

        if rows.is_empty() {
            return Err(EtlError::EmptyData("No data rows found".to_string()));
        }

        Ok(RecordSet::from_strings(headers, rows))
    }
}

impl Default for DelimitedReader {
    fn default() -> Self {
        Self::new()
    }
}

/// Read a tabular file, choosing the reader from its extension.
///
/// `.csv` files are staged files and use the pipe delimiter; `.tsv` and
/// `.txt` are auto-detected. Workbooks are read from their first sheet.
pub fn read_table(path: impl AsRef<Path>) -> Result<RecordSet> {
    let path = path.as_ref();
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "csv" => DelimitedReader::with_delimiter(STAGED_DELIMITER).read_file(path),
        "tsv" | "txt" => DelimitedReader::new().read_file(path),
        "xlsx" | "xls" | "xlsm" | "xlsb" | "ods" => SpreadsheetReader::new().read_file(path),
        other => Err(EtlError::UnsupportedFormat(format!(
            "{}: unknown extension '{}'",
            path.display(),
            other
        ))),
    }
}

/// Detect the delimiter by analyzing the first few lines.
pub fn detect_delimiter(bytes: &[u8]) -> Result<u8> {
    let reader = BufReader::new(bytes);
    let lines: Vec<String> = reader
        .lines()
        .take(10)
        .filter_map(|l| l.ok())
        .filter(|l| !l.trim().is_empty())
        .collect();

    if lines.is_empty() {
        return Err(EtlError::EmptyData("No lines to analyze".to_string()));
    }

    let mut best_delimiter = b',';
    let mut best_score = 0;

    for &delim in DELIMITERS {
        let counts: Vec<usize> = lines
            .iter()
            .map(|line| count_delimiter_in_line(line, delim))
            .collect();

        let first_count = counts[0];
        if first_count == 0 {
            continue;
        }

        let consistent = counts.iter().all(|&c| c == first_count);
        let variance: f64 = if counts.len() > 1 {
            let mean = counts.iter().sum::<usize>() as f64 / counts.len() as f64;
            counts.iter().map(|&c| (c as f64 - mean).powi(2)).sum::<f64>() / counts.len() as f64
        } else {
            0.0
        };

        // Higher count with lower variance wins; tabs get a small bonus
        let score = if consistent {
            first_count * 1000 + (if delim == b'\t' { 100 } else { 0 })
        } else if variance < 1.0 {
            first_count * 100
        } else {
            first_count
        };

        if score > best_score {
            best_score = score;
            best_delimiter = delim;
        }
    }

    Ok(best_delimiter)
}

/// Count delimiter occurrences in a line, respecting quotes.
fn count_delimiter_in_line(line: &str, delimiter: u8) -> usize {
    let delim_char = delimiter as char;
    let mut count = 0;
    let mut in_quotes = false;

    for ch in line.chars() {
        match ch {
            '"' => in_quotes = !in_quotes,
            c if c == delim_char && !in_quotes => count += 1,
            _ => {}
        }
    }

    count
}
