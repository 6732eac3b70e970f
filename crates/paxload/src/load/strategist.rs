//! Concurrent per-table loading of transformed staged files.

use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};

use chrono::NaiveDate;
use tracing::{error, info, info_span};

use crate::config::{PipelineConfig, WarehouseConfig};
use crate::error::Result;
use crate::input::{DelimitedReader, STAGED_DELIMITER};
use crate::pipeline::{Outcome, OutcomeMap, TaskSummary, run_tasks};
use crate::stage::{Stage, staged_path};

use super::mode::LoadMode;
use super::tables::{TableSpec, default_tables};
use super::warehouse::Warehouse;

/// Loads each table's staged file into the warehouse, one task per table.
///
/// Tasks read and parse their staged files concurrently, then take turns
/// on a single writer connection, so one table waiting on another never
/// runs into the database busy timeout.
pub struct LoadStrategist {
    staging_dir: PathBuf,
    warehouse: WarehouseConfig,
    tables: Vec<TableSpec>,
}

impl LoadStrategist {
    /// Strategist for the five default tables, reading from the transform
    /// staging directory.
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            staging_dir: config.transform_dir.clone(),
            warehouse: config.warehouse.clone(),
            tables: default_tables(),
        }
    }

    pub fn with_tables(mut self, tables: Vec<TableSpec>) -> Self {
        self.tables = tables;
        self
    }

    pub fn tables(&self) -> &[TableSpec] {
        &self.tables
    }

    /// Load every table concurrently in the same mode.
    ///
    /// If the warehouse cannot be opened, every table fails with that error.
    pub fn load_all(&self, mode: LoadMode, date: NaiveDate) -> OutcomeMap {
        match Warehouse::open(&self.warehouse) {
            Ok(warehouse) => self.load_with(&Mutex::new(warehouse), mode, date),
            Err(err) => {
                error!(kind = err.kind(), "Cannot open warehouse: {}", err);
                let mut outcomes = OutcomeMap::new();
                for spec in &self.tables {
                    outcomes.insert(spec.name.clone(), Outcome::failed(&err));
                }
                outcomes
            }
        }
    }

    /// Load every table through a shared writer.
    pub fn load_with(&self, writer: &Mutex<Warehouse>, mode: LoadMode, date: NaiveDate) -> OutcomeMap {
        info!(tables = self.tables.len(), mode = %mode, "Loading tables");
        let tasks = self
            .tables
            .iter()
            .map(|spec| (spec.name.clone(), spec))
            .collect();

        run_tasks("load", tasks, |_, spec| {
            let rows = self.load_table(writer, spec, mode, date)?;
            Ok(TaskSummary {
                rows,
                issues: 0,
                detail: format!("{} load", mode),
            })
        })
    }

    /// Load one table from its `transformed` staged file for `date`.
    pub fn load_table(
        &self,
        writer: &Mutex<Warehouse>,
        spec: &TableSpec,
        mode: LoadMode,
        date: NaiveDate,
    ) -> Result<usize> {
        let _span = info_span!("load", table = %spec.name).entered();

        let path = staged_path(&self.staging_dir, &spec.name, date, Stage::Transformed);
        let data = DelimitedReader::with_delimiter(STAGED_DELIMITER).read_file(&path)?;

        // A panicked sibling already rolled its transaction back on unwind.
        let mut warehouse = writer.lock().unwrap_or_else(PoisonError::into_inner);
        warehouse.ensure_table(spec)?;
        warehouse.load(spec, &data, mode)
    }
}
