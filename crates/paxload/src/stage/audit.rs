//! Audit columns and staged file persistence.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::info;

use crate::error::{EtlError, Result};
use crate::input::STAGED_DELIMITER;
use crate::record::{ColumnType, RecordSet, Value};

pub const EXTRACT_DT: &str = "extract_dt";
pub const SOURCE: &str = "source";
pub const PROC_STATUS: &str = "proc_status";

/// Names of the three audit columns, in order.
pub const AUDIT_COLUMNS: [&str; 3] = [EXTRACT_DT, SOURCE, PROC_STATUS];

/// Pipeline stage recorded in `proc_status` and staged file names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Extracted,
    Transformed,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Extracted => "extracted",
            Stage::Transformed => "transformed",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Receipt for a persisted staged file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StagedFile {
    pub path: PathBuf,
    pub source: String,
    pub stage: Stage,
    pub rows: usize,
    pub columns: usize,
    /// SHA-256 of the written bytes.
    pub checksum: String,
}

/// `{source}_{YYYYMMDD}_{stage}.csv`
pub fn staged_file_name(source: &str, date: NaiveDate, stage: Stage) -> String {
    format!("{}_{}_{}.csv", source, date.format("%Y%m%d"), stage)
}

/// Full path of a staged file under `dir`.
pub fn staged_path(dir: &Path, source: &str, date: NaiveDate, stage: Stage) -> PathBuf {
    dir.join(staged_file_name(source, date, stage))
}

/// Stamps record sets with provenance and writes them to a staging directory.
pub struct AuditStamper {
    staging_dir: PathBuf,
}

impl AuditStamper {
    pub fn new(staging_dir: impl Into<PathBuf>) -> Self {
        Self {
            staging_dir: staging_dir.into(),
        }
    }

    pub fn staging_dir(&self) -> &Path {
        &self.staging_dir
    }

    /// Set the audit columns. Existing audit columns are overwritten in place.
    pub fn stamp(&self, data: &mut RecordSet, source: &str, extracted_at: NaiveDateTime, stage: Stage) {
        data.add_constant_column(EXTRACT_DT, ColumnType::DateTime, Value::Timestamp(extracted_at));
        data.add_constant_column(SOURCE, ColumnType::String, Value::Text(source.to_string()));
        data.add_constant_column(PROC_STATUS, ColumnType::String, Value::Text(stage.to_string()));
    }

    /// Stamp and persist a record set, returning it with the file receipt.
    pub fn stage(
        &self,
        mut data: RecordSet,
        source: &str,
        extracted_at: NaiveDateTime,
        stage: Stage,
    ) -> Result<(RecordSet, StagedFile)> {
        self.stamp(&mut data, source, extracted_at, stage);

        let path = staged_path(&self.staging_dir, source, extracted_at.date(), stage);
        let (rows, columns) = (data.row_count(), data.column_count());
        let checksum = write_staged(&path, &data)?;

        let receipt = StagedFile {
            path,
            source: source.to_string(),
            stage,
            rows,
            columns,
            checksum,
        };
        info!(
            source,
            stage = %stage,
            rows,
            path = %receipt.path.display(),
            checksum = %receipt.checksum,
            "Staged file written"
        );
        Ok((data, receipt))
    }
}

/// Write a record set as pipe-delimited text and return its checksum.
pub fn write_staged(path: &Path, data: &RecordSet) -> Result<String> {
    let persistence = |e: &dyn fmt::Display| {
        EtlError::Persistence(format!("Cannot write {}: {}", path.display(), e))
    };

    let mut writer = csv::WriterBuilder::new()
        .delimiter(STAGED_DELIMITER)
        .from_writer(Vec::new());
    writer.write_record(&data.headers)?;
    for row in 0..data.row_count() {
        writer.write_record(data.row_strings(row))?;
    }
    let bytes = writer.into_inner().map_err(|e| persistence(&e))?;

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| persistence(&e))?;
    }
    fs::write(path, &bytes).map_err(|e| persistence(&e))?;

    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(format!("sha256:{:x}", hasher.finalize()))
}
