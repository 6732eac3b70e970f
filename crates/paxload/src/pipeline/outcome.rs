//! Per-task outcomes and the join-barrier task runner.

use std::thread;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::error::{EtlError, Result};

/// What a successful task reports back.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskSummary {
    /// Rows staged or loaded.
    pub rows: usize,
    /// Non-fatal issues raised along the way.
    pub issues: usize,
    pub detail: String,
}

/// Result of one source or table task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Success(TaskSummary),
    Failed { kind: String, message: String },
}

impl Outcome {
    pub fn failed(err: &EtlError) -> Self {
        Outcome::Failed {
            kind: err.kind().to_string(),
            message: err.to_string(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success(_))
    }
}

/// Outcome per task name, in task order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OutcomeMap {
    outcomes: IndexMap<String, Outcome>,
}

impl OutcomeMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, outcome: Outcome) {
        self.outcomes.insert(name.into(), outcome);
    }

    pub fn get(&self, name: &str) -> Option<&Outcome> {
        self.outcomes.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Outcome)> {
        self.outcomes.iter()
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn success_count(&self) -> usize {
        self.outcomes.values().filter(|o| o.is_success()).count()
    }

    pub fn failure_count(&self) -> usize {
        self.len() - self.success_count()
    }

    pub fn all_succeeded(&self) -> bool {
        self.failure_count() == 0
    }
}

/// Run every task on its own scoped thread and wait for all of them.
///
/// Each task owns its input and writes only its own slot, so the map is
/// filled after the join without locking. Errors and panics become
/// [`Outcome::Failed`]; no task can stop its siblings.
pub fn run_tasks<T, F>(stage: &str, tasks: Vec<(String, T)>, work: F) -> OutcomeMap
where
    T: Send,
    F: Fn(&str, T) -> Result<TaskSummary> + Sync,
{
    let work = &work;
    let mut slots: Vec<(String, Outcome)> = Vec::with_capacity(tasks.len());

    thread::scope(|scope| {
        let handles: Vec<_> = tasks
            .into_iter()
            .map(|(name, input)| {
                let handle = scope.spawn({
                    let name = name.clone();
                    move || work(&name, input)
                });
                (name, handle)
            })
            .collect();

        for (name, handle) in handles {
            let outcome = match handle.join() {
                Ok(Ok(summary)) => {
                    info!(stage, task = %name, rows = summary.rows, issues = summary.issues, "Task completed");
                    Outcome::Success(summary)
                }
                Ok(Err(err)) => {
                    error!(stage, task = %name, kind = err.kind(), "Task failed: {}", err);
                    Outcome::failed(&err)
                }
                Err(_) => {
                    error!(stage, task = %name, "Task panicked");
                    Outcome::Failed {
                        kind: "panic".to_string(),
                        message: format!("{} task panicked", name),
                    }
                }
            };
            slots.push((name, outcome));
        }
    });

    let mut outcomes = OutcomeMap::new();
    for (name, outcome) in slots {
        outcomes.insert(name, outcome);
    }
    outcomes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EtlError;

    #[test]
    fn test_failures_do_not_stop_siblings() {
        let tasks = vec![
            ("a".to_string(), 1usize),
            ("b".to_string(), 2),
            ("c".to_string(), 3),
        ];
        let outcomes = run_tasks("test", tasks, |_, n| {
            if n == 2 {
                return Err(EtlError::Persistence("disk full".into()));
            }
            Ok(TaskSummary {
                rows: n,
                ..TaskSummary::default()
            })
        });

        assert_eq!(outcomes.len(), 3);
        assert_eq!(outcomes.success_count(), 2);
        assert!(matches!(
            outcomes.get("b"),
            Some(Outcome::Failed { kind, .. }) if kind == "persistence"
        ));
        let names: Vec<_> = outcomes.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_panic_becomes_failure() {
        let outcomes = run_tasks("test", vec![("boom".to_string(), ()), ("ok".to_string(), ())], |name, _| {
            if name == "boom" {
                panic!("unexpected");
            }
            Ok(TaskSummary::default())
        });

        assert_eq!(outcomes.failure_count(), 1);
        assert!(outcomes.get("ok").unwrap().is_success());
    }
}
