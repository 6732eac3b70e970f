//! Concurrent orchestration of the per-source pipelines.

mod orchestrator;
mod outcome;

pub use orchestrator::SourceOrchestrator;
pub use outcome::{Outcome, OutcomeMap, TaskSummary, run_tasks};
