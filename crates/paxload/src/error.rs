//! Error types for the paxload library.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for pipeline operations.
#[derive(Debug, Error)]
pub enum EtlError {
    /// Error reading or writing a file.
    #[error("IO error for '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Input file does not exist.
    #[error("File not found: {0}")]
    NotFound(PathBuf),

    /// Error parsing delimited data.
    #[error("Parse error at row {row}, column {column}: {message}")]
    Parse {
        row: usize,
        column: usize,
        message: String,
    },

    /// Error from the CSV library.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Error from the workbook reader.
    #[error("Spreadsheet error: {0}")]
    Spreadsheet(#[from] calamine::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// File format not supported.
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// Empty file or no rows returned.
    #[error("Empty data: {0}")]
    EmptyData(String),

    /// Network or payload failure while retrieving a source page.
    #[error("Fetch error for '{endpoint}': {message}")]
    Fetch { endpoint: String, message: String },

    /// A column failed its declared type conversion.
    #[error("Cannot coerce column '{column}' to {target}: {message}")]
    Coercion {
        column: String,
        target: String,
        message: String,
    },

    /// Identity columns required for the business key are absent.
    #[error("Missing identity columns for {kind}: {}", missing.join(", "))]
    KeyDerivation { kind: String, missing: Vec<String> },

    /// Staging write or destination write failed.
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Staged file does not match the destination table layout.
    #[error("Schema mismatch for table '{table}': {message}")]
    SchemaMismatch { table: String, message: String },

    /// Error from the destination database.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl EtlError {
    /// Short stable label for outcome maps and log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            EtlError::Io { .. } | EtlError::NotFound(_) => "io",
            EtlError::Parse { .. } | EtlError::Csv(_) | EtlError::Spreadsheet(_) | EtlError::Json(_) => "parse",
            EtlError::UnsupportedFormat(_) => "unsupported_format",
            EtlError::EmptyData(_) => "empty_data",
            EtlError::Fetch { .. } => "fetch",
            EtlError::Coercion { .. } => "coercion",
            EtlError::KeyDerivation { .. } => "key_derivation",
            EtlError::Persistence(_) | EtlError::Database(_) => "persistence",
            EtlError::SchemaMismatch { .. } => "schema_mismatch",
            EtlError::Config(_) => "config",
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        EtlError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, EtlError>;
