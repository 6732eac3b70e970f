//! Declared type conversions per source kind.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Timelike};
use tracing::debug;

use crate::config::{Catalog, SourceKind};
use crate::error::EtlError;
use crate::record::{ColumnType, RecordSet, Value, parse_interval};

use super::report::TransformReport;

const STEP: &str = "coerce";

/// Accepted timestamp layouts, tried in order.
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
    "%Y/%m/%d %H:%M:%S",
];

/// Accepted date-only layouts; the time is midnight.
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d/%m/%Y", "%Y/%m/%d"];

/// Parse a timestamp in any accepted layout, truncated to whole seconds.
pub fn parse_timestamp(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();

    let parsed = DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(text, fmt).ok())
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
        .or_else(|| DateTime::parse_from_rfc3339(text).ok().map(|dt| dt.naive_local()))?;

    Some(truncate_seconds(parsed))
}

fn truncate_seconds(ts: NaiveDateTime) -> NaiveDateTime {
    ts.with_nanosecond(0).unwrap_or(ts)
}

/// Convert one value to the target type.
pub fn coerce_value(value: &Value, target: ColumnType) -> std::result::Result<Value, String> {
    if value.is_null() {
        return Ok(Value::Null);
    }
    let fail = || Err(format!("cannot read '{}' as {}", value, target));

    match target {
        ColumnType::String => Ok(value.clone().into_text()),
        ColumnType::Integer => match value {
            Value::Int(n) => Ok(Value::Int(*n)),
            Value::Float(_) => value.as_i64().map(Value::Int).map_or_else(fail, Ok),
            Value::Bool(b) => Ok(Value::Int(*b as i64)),
            Value::Text(s) => {
                let s = s.trim();
                match s.parse::<i64>() {
                    Ok(n) => Ok(Value::Int(n)),
                    Err(_) => match s.parse::<f64>() {
                        Ok(f) if f.fract() == 0.0 && f.is_finite() => Ok(Value::Int(f as i64)),
                        _ => fail(),
                    },
                }
            }
            _ => fail(),
        },
        ColumnType::Float => match value {
            Value::Int(_) | Value::Float(_) => value.as_f64().map(Value::Float).map_or_else(fail, Ok),
            Value::Text(s) => match s.trim().parse::<f64>() {
                Ok(f) if f.is_finite() => Ok(Value::Float(f)),
                _ => fail(),
            },
            _ => fail(),
        },
        ColumnType::Boolean => match value {
            Value::Bool(b) => Ok(Value::Bool(*b)),
            Value::Int(0) => Ok(Value::Bool(false)),
            Value::Int(1) => Ok(Value::Bool(true)),
            Value::Text(s) => match s.trim().to_lowercase().as_str() {
                "true" | "yes" | "1" | "t" | "y" => Ok(Value::Bool(true)),
                "false" | "no" | "0" | "f" | "n" => Ok(Value::Bool(false)),
                _ => fail(),
            },
            _ => fail(),
        },
        ColumnType::DateTime => match value {
            Value::Timestamp(ts) => Ok(Value::Timestamp(truncate_seconds(*ts))),
            Value::Text(s) => parse_timestamp(s).map(Value::Timestamp).map_or_else(fail, Ok),
            _ => fail(),
        },
        ColumnType::Interval => match value {
            Value::Interval(d) => Ok(Value::Interval(*d)),
            Value::Text(s) => parse_interval(s).map(Value::Interval).map_or_else(fail, Ok),
            _ => fail(),
        },
    }
}

/// Applies the per-kind datetime columns and declared conversions.
///
/// Undeclared columns keep the type the record set inferred for them:
/// text for mixed or textual columns, numeric and boolean columns as they are.
pub struct TypeCoercer<'a> {
    catalog: &'a Catalog,
}

impl<'a> TypeCoercer<'a> {
    pub fn new(catalog: &'a Catalog) -> Self {
        Self { catalog }
    }

    /// Coerce every declared column that is present. A column that fails is
    /// reported and left as it was; the remaining columns are still coerced.
    pub fn apply(&self, kind: SourceKind, data: &mut RecordSet, report: &mut TransformReport) {
        let rules = self.catalog.rules(kind);

        for column in &rules.datetime_columns {
            self.coerce_column(data, column, ColumnType::DateTime, report);
        }

        for (column, target) in &rules.conversions {
            if rules.datetime_columns.contains(column) {
                continue;
            }
            self.coerce_column(data, column, *target, report);
        }
    }

    fn coerce_column(
        &self,
        data: &mut RecordSet,
        column: &str,
        target: ColumnType,
        report: &mut TransformReport,
    ) {
        let Some(idx) = data.column_index(column) else {
            return;
        };

        let converted: std::result::Result<Vec<Value>, String> = data
            .column_values(idx)
            .map(|value| coerce_value(value, target))
            .collect();

        match converted {
            Ok(values) => {
                data.replace_column(idx, target, values);
                debug!(column, target = %target, "Coerced column");
                report.add_change(STEP, column, data.row_count(), format!("Coerced '{}' to {}", column, target));
            }
            Err(message) => {
                let err = EtlError::Coercion {
                    column: column.to_string(),
                    target: target.to_string(),
                    message,
                };
                report.add_issue(STEP, column, &err);
            }
        }
    }
}
