//! Logging setup.
//!
//! Console output always goes to stderr. Setting `LOG_DIR` adds a daily
//! rolling file sink, and `LOG_FILE_NAME` names a plain file that receives
//! the first error of the run, provided that file does not exist yet.
//!
//! ```no_run
//! use paxload::logging::{LogConfig, init_logging};
//!
//! let config = LogConfig::from_env().unwrap();
//! let _guard = init_logging(&config).unwrap();
//! tracing::info!("Pipeline starting");
//! ```

use std::fmt::{self as stdfmt, Write as _};
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt};

use crate::error::{EtlError, Result};

/// Output format for every sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = EtlError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "text" | "pretty" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            _ => Err(EtlError::Config(format!("Invalid log format: {}", s))),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogConfig {
    /// Filter directive, e.g. `info` or `paxload=debug`.
    pub level: String,
    pub format: LogFormat,
    /// Directory for the daily rolling log file; console only when unset.
    pub log_dir: Option<PathBuf>,
    pub log_file_prefix: String,
    /// Plain file receiving the first error of the run.
    pub first_error_file: Option<PathBuf>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Text,
            log_dir: None,
            log_file_prefix: "paxload".to_string(),
            first_error_file: None,
        }
    }
}

impl LogConfig {
    /// Read `LOG_LEVEL`, `LOG_FORMAT`, `LOG_DIR` and `LOG_FILE_NAME`.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(level) = lookup("LOG_LEVEL") {
            config.level = level;
        }
        if let Some(format) = lookup("LOG_FORMAT") {
            config.format = format.parse()?;
        }
        config.log_dir = lookup("LOG_DIR").map(PathBuf::from);
        config.first_error_file = lookup("LOG_FILE_NAME").map(PathBuf::from);

        Ok(config)
    }

    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.level = level.into();
        self
    }
}

/// Install the global subscriber.
///
/// The returned guard flushes the file sink when dropped; keep it alive
/// for the whole run. Fails if a subscriber is already installed.
pub fn init_logging(config: &LogConfig) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .map_err(|e| EtlError::Config(format!("Invalid log level '{}': {}", config.level, e)))?;

    let mut layers: Vec<Box<dyn Layer<Registry> + Send + Sync>> = Vec::new();

    let console = fmt::layer().with_writer(std::io::stderr).with_target(false);
    layers.push(match config.format {
        LogFormat::Text => console.boxed(),
        LogFormat::Json => console.json().boxed(),
    });

    let mut guard = None;
    if let Some(dir) = &config.log_dir {
        fs::create_dir_all(dir).map_err(|e| EtlError::io(dir, e))?;
        let appender = tracing_appender::rolling::daily(dir, &config.log_file_prefix);
        let (writer, worker) = tracing_appender::non_blocking(appender);
        guard = Some(worker);

        let file = fmt::layer().with_writer(writer).with_ansi(false);
        layers.push(match config.format {
            LogFormat::Text => file.boxed(),
            LogFormat::Json => file.json().boxed(),
        });
    }

    if let Some(path) = &config.first_error_file {
        layers.push(FirstErrorLayer::new(path).boxed());
    }

    tracing_subscriber::registry()
        .with(layers)
        .with(filter)
        .try_init()
        .map_err(|e| EtlError::Config(format!("Logging already initialised: {}", e)))?;

    Ok(guard)
}

/// Writes the first `ERROR` event of the process to a plain file.
///
/// An existing file is left alone, so an earlier run's first error is kept.
pub struct FirstErrorLayer {
    path: PathBuf,
    seen: AtomicBool,
}

impl FirstErrorLayer {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            seen: AtomicBool::new(false),
        }
    }
}

impl<S: Subscriber> Layer<S> for FirstErrorLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        if *event.metadata().level() != Level::ERROR || self.seen.swap(true, Ordering::SeqCst) {
            return;
        }

        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);
        // Nowhere to report a failure from inside the subscriber.
        let _ = write_first_error(&self.path, event.metadata().target(), &visitor.render());
    }
}

fn write_first_error(path: &Path, target: &str, message: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let mut file = match OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::AlreadyExists => return Ok(()),
        Err(e) => return Err(e),
    };
    writeln!(
        file,
        "{} ERROR {}: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
        target,
        message
    )
}

#[derive(Default)]
struct MessageVisitor {
    message: String,
    fields: String,
}

impl MessageVisitor {
    fn render(&self) -> String {
        if self.fields.is_empty() {
            self.message.clone()
        } else {
            format!("{}{}", self.message, self.fields)
        }
    }
}

impl Visit for MessageVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        } else {
            let _ = write!(self.fields, " {}={}", field.name(), value);
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn stdfmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{:?}", value);
        } else {
            let _ = write!(self.fields, " {}={:?}", field.name(), value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;
    use tracing::{error, warn};

    #[test]
    fn test_config_from_lookup() {
        let config = LogConfig::from_lookup(|key| match key {
            "LOG_LEVEL" => Some("debug".to_string()),
            "LOG_FORMAT" => Some("JSON".to_string()),
            "LOG_FILE_NAME" => Some("first_error.log".to_string()),
            _ => None,
        })
        .unwrap();

        assert_eq!(config.level, "debug");
        assert_eq!(config.format, LogFormat::Json);
        assert_eq!(config.log_dir, None);
        assert_eq!(config.first_error_file, Some(PathBuf::from("first_error.log")));
        assert!(LogConfig::from_lookup(|_| Some("xml".to_string())).is_err());
    }

    #[test]
    fn test_first_error_written_once() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("first_error.log");
        let subscriber = tracing_subscriber::registry().with(FirstErrorLayer::new(&path));

        tracing::subscriber::with_default(subscriber, || {
            warn!("only a warning");
            error!(table = "Booking", "load failed");
            error!("second failure");
        });

        let written = fs::read_to_string(&path).unwrap();
        assert!(written.contains("load failed table=Booking"));
        assert!(!written.contains("second failure"));
        assert!(!written.contains("only a warning"));
    }

    #[test]
    fn test_existing_file_is_kept() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("first_error.log");
        fs::write(&path, "earlier run\n").unwrap();
        let subscriber = tracing_subscriber::registry().with(FirstErrorLayer::new(&path));

        tracing::subscriber::with_default(subscriber, || {
            error!("new failure");
        });

        assert_eq!(fs::read_to_string(&path).unwrap(), "earlier run\n");
    }
}
