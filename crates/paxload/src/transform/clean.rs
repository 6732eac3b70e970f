//! Row and value cleanup applied before type coercion.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::record::{ColumnType, RecordSet, Value};

use super::report::TransformReport;

const STEP: &str = "clean";

/// Cleanup switches.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleanOptions {
    /// Fill nulls in numeric columns with the column mean.
    #[serde(default = "default_true")]
    pub impute_numeric_mean: bool,
}

impl Default for CleanOptions {
    fn default() -> Self {
        Self {
            impute_numeric_mean: true,
        }
    }
}

fn default_true() -> bool {
    true
}

/// Drops empty rows, trims text and imputes numeric gaps.
pub struct Cleaner {
    options: CleanOptions,
}

impl Cleaner {
    pub fn new(options: CleanOptions) -> Self {
        Self { options }
    }

    pub fn apply(&self, data: &mut RecordSet, report: &mut TransformReport) {
        let before = data.row_count();
        data.retain_rows(|row| row.iter().any(|v| !v.is_null()));
        let dropped = before - data.row_count();
        if dropped > 0 {
            report.rows_dropped += dropped;
            report.add_change(STEP, "", dropped, format!("Dropped {} empty rows", dropped));
        }

        for col in 0..data.column_count() {
            match data.types[col] {
                ColumnType::String => self.trim_column(data, col, report),
                t if t.is_numeric() && self.options.impute_numeric_mean => {
                    self.impute_column(data, col, report)
                }
                _ => {}
            }
        }
    }

    fn trim_column(&self, data: &mut RecordSet, col: usize, report: &mut TransformReport) {
        let mut changed = 0;
        for row in &mut data.rows {
            let replacement = match &row[col] {
                Value::Text(s) if s.trim().len() != s.len() => match s.trim() {
                    "" => Value::Null,
                    trimmed => Value::Text(trimmed.to_string()),
                },
                _ => continue,
            };
            row[col] = replacement;
            changed += 1;
        }

        if changed > 0 {
            let column = &data.headers[col];
            report.add_change(STEP, column, changed, format!("Trimmed {} values in '{}'", changed, column));
        }
    }

    fn impute_column(&self, data: &mut RecordSet, col: usize, report: &mut TransformReport) {
        let present: Vec<f64> = data.column_values(col).filter_map(Value::as_f64).collect();
        let missing = data.row_count() - present.len();
        if missing == 0 || present.is_empty() {
            return;
        }

        let mean = present.iter().sum::<f64>() / present.len() as f64;
        let fill = match data.types[col] {
            ColumnType::Integer => Value::Int(mean.round() as i64),
            _ => Value::Float(mean),
        };

        for row in &mut data.rows {
            if row[col].is_null() {
                row[col] = fill.clone();
            }
        }

        let column = &data.headers[col];
        debug!(column = %column, mean, missing, "Imputed numeric nulls");
        report.add_change(
            STEP,
            column,
            missing,
            format!("Filled {} nulls in '{}' with mean {}", missing, column, fill),
        );
    }
}

impl Default for Cleaner {
    fn default() -> Self {
        Self::new(CleanOptions::default())
    }
}
