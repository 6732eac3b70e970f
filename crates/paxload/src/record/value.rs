//! Cell values and logical column types.

use std::fmt;

use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Canonical text layout for timestamps in staged files.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const SECONDS_PER_DAY: i64 = 86_400;

/// Logical type of a record set column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    /// Whole numbers.
    Integer,
    /// Floating-point numbers.
    Float,
    /// Text values.
    String,
    /// Boolean values.
    Boolean,
    /// Date and time, whole seconds.
    DateTime,
    /// Elapsed time between two timestamps.
    Interval,
}

impl ColumnType {
    /// Returns true if this type is numeric.
    pub fn is_numeric(&self) -> bool {
        matches!(self, ColumnType::Integer | ColumnType::Float)
    }

    /// Returns true if this type is temporal.
    pub fn is_temporal(&self) -> bool {
        matches!(self, ColumnType::DateTime | ColumnType::Interval)
    }

    /// Widest type able to hold values of both inputs.
    pub fn unify(self, other: ColumnType) -> ColumnType {
        match (self, other) {
            (a, b) if a == b => a,
            (ColumnType::Integer, ColumnType::Float) | (ColumnType::Float, ColumnType::Integer) => {
                ColumnType::Float
            }
            _ => ColumnType::String,
        }
    }

    /// Label used in log lines and error messages.
    pub fn label(&self) -> &'static str {
        match self {
            ColumnType::Integer => "integer",
            ColumnType::Float => "float",
            ColumnType::String => "string",
            ColumnType::Boolean => "boolean",
            ColumnType::DateTime => "datetime",
            ColumnType::Interval => "interval",
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A single cell.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Int(i64),
    Float(f64),
    Text(String),
    Bool(bool),
    Timestamp(NaiveDateTime),
    Interval(Duration),
}

impl Value {
    /// Check if a raw token represents a missing value.
    pub fn is_null_token(token: &str) -> bool {
        let trimmed = token.trim();
        trimmed.is_empty()
            || trimmed.eq_ignore_ascii_case("na")
            || trimmed.eq_ignore_ascii_case("n/a")
            || trimmed.eq_ignore_ascii_case("null")
            || trimmed.eq_ignore_ascii_case("none")
            || trimmed.eq_ignore_ascii_case("nan")
            || trimmed.eq_ignore_ascii_case("nat")
    }

    /// Parse a raw token from a delimited file into the narrowest value.
    ///
    /// Timestamps are not detected here; declared datetime columns are
    /// converted later by the type coercer.
    pub fn sniff(token: &str) -> Value {
        if Value::is_null_token(token) {
            return Value::Null;
        }
        let trimmed = token.trim();

        if trimmed.eq_ignore_ascii_case("true") {
            return Value::Bool(true);
        }
        if trimmed.eq_ignore_ascii_case("false") {
            return Value::Bool(false);
        }
        if let Ok(n) = trimmed.parse::<i64>() {
            return Value::Int(n);
        }
        if let Ok(f) = trimmed.parse::<f64>() {
            if f.is_finite() {
                return Value::Float(f);
            }
        }

        Value::Text(token.to_string())
    }

    /// Logical type of this value, `None` for nulls.
    pub fn column_type(&self) -> Option<ColumnType> {
        match self {
            Value::Null => None,
            Value::Int(_) => Some(ColumnType::Integer),
            Value::Float(_) => Some(ColumnType::Float),
            Value::Text(_) => Some(ColumnType::String),
            Value::Bool(_) => Some(ColumnType::Boolean),
            Value::Timestamp(_) => Some(ColumnType::DateTime),
            Value::Interval(_) => Some(ColumnType::Interval),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Numeric view of the value, if it has one.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(n) => Some(*n as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            Value::Float(f) if f.fract() == 0.0 => Some(*f as i64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_timestamp(&self) -> Option<NaiveDateTime> {
        match self {
            Value::Timestamp(ts) => Some(*ts),
            _ => None,
        }
    }

    /// Convert into a text cell, keeping nulls as nulls.
    pub fn into_text(self) -> Value {
        match self {
            Value::Null => Value::Null,
            Value::Text(s) => Value::Text(s),
            other => Value::Text(other.to_string()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Int(n) => write!(f, "{}", n),
            Value::Float(x) => write!(f, "{}", x),
            Value::Text(s) => f.write_str(s),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Timestamp(ts) => write!(f, "{}", ts.format(TIMESTAMP_FORMAT)),
            Value::Interval(d) => f.write_str(&format_interval(*d)),
        }
    }
}

/// Render an interval as `{days} days HH:MM:SS`.
///
/// Days are floored so the clock part is always non-negative, e.g. minus
/// one hour renders as `-1 days 23:00:00`.
pub fn format_interval(duration: Duration) -> String {
    let total = duration.num_seconds();
    let days = total.div_euclid(SECONDS_PER_DAY);
    let rem = total.rem_euclid(SECONDS_PER_DAY);
    format!(
        "{} days {:02}:{:02}:{:02}",
        days,
        rem / 3600,
        (rem % 3600) / 60,
        rem % 60
    )
}

/// Parse an interval rendered by [`format_interval`].
pub fn parse_interval(text: &str) -> Option<Duration> {
    let (days_part, clock) = text.trim().split_once(" days ")?;
    let days: i64 = days_part.trim().parse().ok()?;

    let mut parts = clock.trim().split(':');
    let hours: i64 = parts.next()?.parse().ok()?;
    let minutes: i64 = parts.next()?.parse().ok()?;
    let seconds: i64 = parts.next()?.parse().ok()?;
    if parts.next().is_some() {
        return None;
    }

    let total = days
        .checked_mul(SECONDS_PER_DAY)?
        .checked_add(hours.checked_mul(3600)?)?
        .checked_add(minutes.checked_mul(60)?)?
        .checked_add(seconds)?;
    Duration::try_seconds(total)
}
