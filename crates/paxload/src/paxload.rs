//! Main Paxload struct and public API.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::{Catalog, PipelineConfig};
use crate::error::{EtlError, Result};
use crate::input::{HttpFetcher, PageFetcher};
use crate::load::{LoadMode, LoadStrategist};
use crate::pipeline::{OutcomeMap, SourceOrchestrator};

/// One of the three pipeline stages an operator can select.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStage {
    Extract,
    Transform,
    Load,
}

impl RunStage {
    /// Every stage, in execution order.
    pub const ALL: [RunStage; 3] = [RunStage::Extract, RunStage::Transform, RunStage::Load];

    pub fn as_str(&self) -> &'static str {
        match self {
            RunStage::Extract => "extract",
            RunStage::Transform => "transform",
            RunStage::Load => "load",
        }
    }
}

impl fmt::Display for RunStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RunStage {
    type Err = EtlError;

    fn from_str(s: &str) -> Result<Self> {
        RunStage::ALL
            .into_iter()
            .find(|stage| stage.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| EtlError::Config(format!("Unknown stage: {}", s)))
    }
}

/// Outcome maps of every stage that ran, in order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunReport {
    pub stages: Vec<(RunStage, OutcomeMap)>,
}

impl RunReport {
    pub fn outcomes(&self, stage: RunStage) -> Option<&OutcomeMap> {
        self.stages.iter().find(|(s, _)| *s == stage).map(|(_, o)| o)
    }

    pub fn failure_count(&self) -> usize {
        self.stages.iter().map(|(_, o)| o.failure_count()).sum()
    }
}

/// The pipeline: configuration, lookup tables and a page fetcher.
pub struct Paxload {
    config: PipelineConfig,
    catalog: Catalog,
    fetcher: Arc<dyn PageFetcher>,
}

impl Paxload {
    /// Pipeline fetching over HTTP with the production catalog.
    pub fn new(config: PipelineConfig) -> Result<Self> {
        let fetcher = HttpFetcher::new(&config.fetch)?;
        Ok(Self::with_fetcher(config, fetcher))
    }

    pub fn with_fetcher(config: PipelineConfig, fetcher: impl PageFetcher + 'static) -> Self {
        Self {
            config,
            catalog: Catalog::default(),
            fetcher: Arc::new(fetcher),
        }
    }

    pub fn with_catalog(mut self, catalog: Catalog) -> Self {
        self.catalog = catalog;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn extract(&self, run_at: NaiveDateTime) -> OutcomeMap {
        self.orchestrator().extract_all(run_at)
    }

    pub fn transform(&self, run_at: NaiveDateTime) -> OutcomeMap {
        self.orchestrator().transform_all(run_at)
    }

    pub fn load(&self, mode: LoadMode, run_at: NaiveDateTime) -> OutcomeMap {
        LoadStrategist::new(&self.config).load_all(mode, run_at.date())
    }

    /// Run the given stages in order. `mode` is only consulted for the
    /// load stage and is resolved lazily, so the operator is asked after
    /// the earlier stages have finished.
    pub fn run(
        &self,
        stages: &[RunStage],
        run_at: NaiveDateTime,
        mode: impl FnOnce() -> Result<LoadMode>,
    ) -> Result<RunReport> {
        let mut mode = Some(mode);
        let mut report = RunReport::default();

        for &stage in stages {
            info!(stage = %stage, "Stage starting");
            let outcomes = match stage {
                RunStage::Extract => self.extract(run_at),
                RunStage::Transform => self.transform(run_at),
                RunStage::Load => {
                    let choose = mode
                        .take()
                        .ok_or_else(|| EtlError::Config("Load stage selected twice".to_string()))?;
                    self.load(choose()?, run_at)
                }
            };
            info!(
                stage = %stage,
                succeeded = outcomes.success_count(),
                failed = outcomes.failure_count(),
                "Stage finished"
            );
            report.stages.push((stage, outcomes));
        }

        Ok(report)
    }

    fn orchestrator(&self) -> SourceOrchestrator<'_> {
        SourceOrchestrator::new(&self.config, &self.catalog, self.fetcher.as_ref())
    }
}
