//! Paxload: batch pipeline moving passenger booking records into a warehouse.
//!
//! Records arrive from a paginated API, delimited flat files and spreadsheet
//! exports. Each source is cleaned, type-coerced, canonicalised and keyed,
//! then staged to disk before being loaded into one destination table per
//! source kind.
//!
//! # Stages
//!
//! - **Extract**: fetch or read each source, stamp it `extracted`, stage it
//! - **Transform**: clean, coerce, canonicalise, derive business key and
//!   change hash, stamp it `transformed`, stage it
//! - **Load**: full replace or hash-keyed upsert into the warehouse
//!
//! Sources and tables run concurrently; one failure never stops the others.
//!
//! # Example
//!
//! ```no_run
//! use paxload::{LoadMode, Paxload, PipelineConfig, RunStage};
//!
//! let config = PipelineConfig::from_env().unwrap();
//! let pipeline = Paxload::new(config).unwrap();
//! let now = chrono::Local::now().naive_local();
//!
//! let report = pipeline
//!     .run(&RunStage::ALL, now, || Ok(LoadMode::Incremental))
//!     .unwrap();
//! println!("Failures: {}", report.failure_count());
//! ```

pub mod config;
pub mod error;
pub mod input;
pub mod load;
pub mod logging;
pub mod pipeline;
pub mod record;
pub mod stage;
pub mod transform;

mod paxload;

pub use crate::paxload::{Paxload, RunReport, RunStage};
pub use config::{Catalog, PipelineConfig, SourceKind};
pub use error::{EtlError, Result};
pub use load::{LoadMode, LoadStrategist, Warehouse};
pub use pipeline::{Outcome, OutcomeMap, SourceOrchestrator};
pub use record::{ColumnType, RecordSet, Value};
pub use transform::{TransformChain, TransformReport};
