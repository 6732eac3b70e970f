//! Workbook reader for spreadsheet extracts.

use std::path::Path;

use calamine::{Data, Reader, open_workbook_auto};
use tracing::debug;

use crate::error::{EtlError, Result};
use crate::record::{RecordSet, Value};

/// Reads one worksheet of a workbook into a record set.
///
/// The first row holds the headers. Whole-number cells become integers,
/// since workbooks store every number as a float.
pub struct SpreadsheetReader {
    sheet: usize,
}

impl SpreadsheetReader {
    /// Reader for the first worksheet.
    pub fn new() -> Self {
        Self { sheet: 0 }
    }

    pub fn with_sheet(sheet: usize) -> Self {
        Self { sheet }
    }

    pub fn read_file(&self, path: impl AsRef<Path>) -> Result<RecordSet> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(EtlError::NotFound(path.to_path_buf()));
        }

        let mut workbook = open_workbook_auto(path)?;
        let range = workbook.worksheet_range_at(self.sheet).ok_or_else(|| {
            EtlError::EmptyData(format!("{} has no worksheet {}", path.display(), self.sheet))
        })??;

        let mut rows = range.rows();
        let headers: Vec<String> = match rows.next() {
            Some(first) => first.iter().map(|cell| cell.to_string().trim().to_string()).collect(),
            None => return Err(EtlError::EmptyData(format!("{} is empty", path.display()))),
        };
        if let Some(idx) = headers.iter().position(|h| h.is_empty()) {
            return Err(EtlError::Parse {
                row: 0,
                column: idx + 1,
                message: "Empty column header".to_string(),
            });
        }

        let data: Vec<Vec<Value>> = rows
            .map(|row| row.iter().map(cell_value).collect::<Vec<_>>())
            .filter(|row| row.iter().any(|v| !v.is_null()))
            .collect();
        if data.is_empty() {
            return Err(EtlError::EmptyData(format!("{} has no data rows", path.display())));
        }

        debug!(path = %path.display(), rows = data.len(), "Worksheet read");
        Ok(RecordSet::from_values(headers, data))
    }
}

impl Default for SpreadsheetReader {
    fn default() -> Self {
        Self::new()
    }
}

fn cell_value(cell: &Data) -> Value {
    match cell {
        Data::Empty | Data::Error(_) => Value::Null,
        Data::Int(n) => Value::Int(*n),
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 9.0e15 => Value::Int(*f as i64),
        Data::Float(f) => Value::Float(*f),
        Data::Bool(b) => Value::Bool(*b),
        Data::String(s) if Value::is_null_token(s) => Value::Null,
        Data::String(s) => Value::Text(s.clone()),
        Data::DateTime(dt) => dt
            .as_datetime()
            .map(Value::Timestamp)
            .unwrap_or(Value::Float(dt.as_f64())),
        Data::DateTimeIso(s) | Data::DurationIso(s) => Value::Text(s.clone()),
    }
}
