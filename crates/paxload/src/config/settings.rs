//! Run configuration: directories, source locations, fetch and warehouse settings.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::catalog::SourceKind;
use crate::error::{EtlError, Result};
use crate::load::TableSpec;
use crate::transform::CleanOptions;

/// Where a source's raw records come from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SourceLocation {
    /// Paginated JSON collection behind the configured API base URL.
    Api {
        endpoint: String,
        /// Columns projected from each JSON object, in order. Empty means
        /// every key seen across the collection.
        #[serde(default)]
        columns: Vec<String>,
    },
    /// Delimited flat file. `None` auto-detects the delimiter.
    Delimited {
        path: PathBuf,
        #[serde(default)]
        delimiter: Option<u8>,
    },
    /// Spreadsheet extract.
    Spreadsheet { path: PathBuf },
}

/// One configured source: its kind and where to fetch it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceDescriptor {
    pub kind: SourceKind,
    pub location: SourceLocation,
}

impl SourceDescriptor {
    pub fn new(kind: SourceKind, location: SourceLocation) -> Self {
        Self { kind, location }
    }

    /// Source label used for staging and the audit `source` column.
    pub fn name(&self) -> &'static str {
        self.kind.source_name()
    }
}

/// Remote API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Base URL, e.g. `http://localhost:8000`.
    pub base_url: String,
    /// Rows requested per page.
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    /// Pause between page requests, in milliseconds.
    #[serde(default = "default_page_delay_ms")]
    pub page_delay_ms: u64,
    /// Per-request timeout, in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl FetchConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            page_size: default_page_size(),
            page_delay_ms: default_page_delay_ms(),
            timeout_secs: default_timeout_secs(),
        }
    }

    pub fn page_delay(&self) -> Duration {
        Duration::from_millis(self.page_delay_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Destination database settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WarehouseConfig {
    pub path: PathBuf,
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

impl WarehouseConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            busy_timeout_ms: default_busy_timeout_ms(),
        }
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}

/// Complete configuration for one pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Staging directory for extracted files.
    pub extract_dir: PathBuf,
    /// Staging directory for transformed files.
    pub transform_dir: PathBuf,
    pub sources: Vec<SourceDescriptor>,
    pub fetch: FetchConfig,
    pub warehouse: WarehouseConfig,
    #[serde(default)]
    pub clean: CleanOptions,
}

impl PipelineConfig {
    /// Load `.env` from the working directory (if any), then read the process
    /// environment.
    pub fn from_env() -> Result<Self> {
        load_dotenv(None)?;
        Self::from_process_env()
    }

    /// Load a specific env file, then read the process environment.
    pub fn from_env_file(path: impl AsRef<Path>) -> Result<Self> {
        load_dotenv(Some(path.as_ref()))?;
        Self::from_process_env()
    }

    /// Read the process environment as it stands.
    pub fn from_process_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from a variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let require = |key: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| EtlError::Config(format!("{} is not set", key)))
        };

        let extract_dir = PathBuf::from(require("DESTINATION_PATH")?);
        let transform_dir = PathBuf::from(require("TRANSFORMED_PATH")?);

        let host = require("API_URL")?;
        let port = require("API_PORT")?;
        let mut fetch = FetchConfig::new(format!("http://{}:{}", host, port));
        if let Some(size) = parse_var(&lookup, "PAGE_SIZE")? {
            if size == 0 {
                return Err(EtlError::Config("PAGE_SIZE must be positive".to_string()));
            }
            fetch.page_size = size as usize;
        }
        if let Some(ms) = parse_var(&lookup, "PAGE_DELAY_MS")? {
            fetch.page_delay_ms = ms;
        }
        if let Some(secs) = parse_var(&lookup, "HTTP_TIMEOUT_SECS")? {
            fetch.timeout_secs = secs;
        }

        let warehouse_path = lookup("WAREHOUSE_PATH")
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| "warehouse.db".to_string());

        let mut sources = default_sources(
            PathBuf::from(require("PATH_EXCEL")?),
            PathBuf::from(require("PATH_CSV_LEG")?),
            PathBuf::from(require("PATH_CSV_CHARGE")?),
        );
        for source in &mut sources {
            let key = match source.kind {
                SourceKind::Booking => "BOOKING_NEW_COLUMNS",
                SourceKind::BookingPassenger => "BOOKING_PASSENGER_NEW_COLUMNS",
                _ => continue,
            };
            if let (Some(list), SourceLocation::Api { columns, .. }) = (lookup(key), &mut source.location) {
                let parsed = parse_column_list(&list);
                if !parsed.is_empty() {
                    *columns = parsed;
                }
            }
        }

        Ok(Self {
            extract_dir,
            transform_dir,
            sources,
            fetch,
            warehouse: WarehouseConfig::new(warehouse_path),
            clean: CleanOptions::default(),
        })
    }

    /// Descriptor for a source kind, if configured.
    pub fn source(&self, kind: SourceKind) -> Option<&SourceDescriptor> {
        self.sources.iter().find(|s| s.kind == kind)
    }
}

/// Load variables from an env file into the process environment.
///
/// Variables already set win. Without a path, a missing `./.env` is fine;
/// a named file that cannot be read is a configuration error.
pub fn load_dotenv(path: Option<&Path>) -> Result<()> {
    match path {
        Some(path) => dotenvy::from_path(path)
            .map_err(|e| EtlError::Config(format!("Cannot load {}: {}", path.display(), e))),
        None => {
            let _ = dotenvy::dotenv();
            Ok(())
        }
    }
}

/// The production source layout: two API collections, one spreadsheet
/// extract and two flat files.
///
/// API records are projected onto the source columns of their destination
/// table, so a key absent from some records still gets a column.
pub fn default_sources(segment: PathBuf, leg: PathBuf, charge: PathBuf) -> Vec<SourceDescriptor> {
    vec![
        SourceDescriptor::new(
            SourceKind::Booking,
            SourceLocation::Api {
                endpoint: "booking/new".to_string(),
                columns: table_columns(SourceKind::Booking),
            },
        ),
        SourceDescriptor::new(
            SourceKind::BookingPassenger,
            SourceLocation::Api {
                endpoint: "booking/passenger/new".to_string(),
                columns: table_columns(SourceKind::BookingPassenger),
            },
        ),
        SourceDescriptor::new(SourceKind::JourneySegment, SourceLocation::Spreadsheet { path: segment }),
        SourceDescriptor::new(
            SourceKind::JourneyLeg,
            SourceLocation::Delimited {
                path: leg,
                delimiter: Some(b';'),
            },
        ),
        SourceDescriptor::new(
            SourceKind::JourneyCharge,
            SourceLocation::Delimited {
                path: charge,
                delimiter: Some(b','),
            },
        ),
    ]
}

fn table_columns(kind: SourceKind) -> Vec<String> {
    TableSpec::for_kind(kind)
        .source_columns()
        .into_iter()
        .map(String::from)
        .collect()
}

/// Split a comma-separated column list, dropping blanks.
fn parse_column_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(String::from)
        .collect()
}

fn parse_var(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<u64>> {
    match lookup(key).filter(|v| !v.trim().is_empty()) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| EtlError::Config(format!("{} must be a whole number, got '{}'", key, raw))),
    }
}

fn default_page_size() -> usize {
    1000
}

fn default_page_delay_ms() -> u64 {
    1000
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_busy_timeout_ms() -> u64 {
    5000
}
