//! Row-level derivations that bring every source into canonical shape.
//!
//! Each derivation checks for its input columns and is skipped silently when
//! they are absent. Currency, age, charge and channel derivations are further
//! gated by the source kind's [`KindRules`](crate::config::KindRules); the
//! elapsed-time derivation applies to any kind with both timestamps.

use chrono::{Datelike, NaiveDate, NaiveDateTime};

use crate::config::{Catalog, Derivation, SourceKind};
use crate::record::{ColumnType, RecordSet, Value};

use super::coerce::parse_timestamp;
use super::report::TransformReport;

const STEP: &str = "canonicalize";

pub const FOREIGN_AMOUNT: &str = "ForeignAmount";
pub const FOREIGN_CURRENCY: &str = "ForeignCurrencyCode";
pub const CURRENCY_CODE: &str = "CurrencyCode";
pub const CHARGE_AMOUNT: &str = "ChargeAmount";
pub const DATE_OF_BIRTH: &str = "DOB";
pub const AGE: &str = "age";
pub const IS_ADULT: &str = "IsAdult";
pub const CREATED_DATE: &str = "CreatedDate";
pub const MODIFIED_DATE: &str = "ModifiedDate";
pub const TIME_TO_MODIFY: &str = "TimeToModify";
pub const CHARGE_LABEL: &str = "PassengerJourneyCharge";
pub const CHANNEL_TYPE: &str = "ChannelType";

pub const CHARGED: &str = "Charged";
pub const NOT_CHARGED: &str = "Not Charged";

const ADULT_AGE: i64 = 18;
const UNKNOWN_BIRTH_YEAR: i32 = 9999;

/// Applies the canonical derivations for a source kind.
pub struct Canonicalizer<'a> {
    catalog: &'a Catalog,
    today: NaiveDate,
}

impl<'a> Canonicalizer<'a> {
    /// Create a canonicalizer that computes ages relative to `today`.
    pub fn new(catalog: &'a Catalog, today: NaiveDate) -> Self {
        Self { catalog, today }
    }

    pub fn apply(&self, kind: SourceKind, data: &mut RecordSet, report: &mut TransformReport) {
        let rules = self.catalog.rules(kind);

        if rules.derives(Derivation::Currency)
            && data.has_columns(&[FOREIGN_AMOUNT, FOREIGN_CURRENCY, CURRENCY_CODE, CHARGE_AMOUNT])
        {
            self.convert_currency(data, FOREIGN_AMOUNT, FOREIGN_CURRENCY, report);
        }
        if rules.derives(Derivation::Age) && data.has_column(DATE_OF_BIRTH) {
            self.derive_age(data, report);
        }
        if data.has_columns(&[CREATED_DATE, MODIFIED_DATE]) {
            self.derive_elapsed(data, report);
        }
        if rules.derives(Derivation::ChargeClass) && data.has_column(CHARGE_AMOUNT) {
            self.classify_charge(data, report);
        }
        if rules.derives(Derivation::ChannelLabel) && data.has_column(CHANNEL_TYPE) {
            self.relabel_channel(data, report);
        }
    }

    /// Convert every known non-base amount to the base currency, rounded to
    /// cents, and relabel those rows with the base currency code.
    fn convert_currency(
        &self,
        data: &mut RecordSet,
        amount_column: &str,
        currency_column: &str,
        report: &mut TransformReport,
    ) {
        let (Some(amount_idx), Some(code_idx)) =
            (data.column_index(amount_column), data.column_index(currency_column))
        else {
            return;
        };
        let rates = self.catalog.rates();
        let mut converted = 0;

        let mut amounts = Vec::with_capacity(data.row_count());
        let mut codes = Vec::with_capacity(data.row_count());
        for row in &data.rows {
            let amount = &row[amount_idx];
            let code = &row[code_idx];

            let rate = code
                .as_str()
                .map(str::trim)
                .filter(|c| *c != rates.base)
                .and_then(|c| rates.rate(c));

            match (rate, amount.as_f64()) {
                (Some(rate), Some(value)) => {
                    amounts.push(Value::Float(round_cents(value * rate)));
                    codes.push(Value::Text(rates.base.clone()));
                    converted += 1;
                }
                _ => {
                    amounts.push(amount.as_f64().map(Value::Float).unwrap_or_else(|| amount.clone()));
                    codes.push(code.clone());
                }
            }
        }

        let amount_type = if amounts.iter().all(|v| v.is_null() || matches!(v, Value::Float(_))) {
            ColumnType::Float
        } else {
            data.types[amount_idx]
        };
        data.replace_column(amount_idx, amount_type, amounts);
        data.replace_column(code_idx, ColumnType::String, codes);

        report.add_change(
            STEP,
            amount_column,
            converted,
            format!("Converted {} amounts to {}", converted, rates.base),
        );
    }

    /// Derive `age` and `IsAdult` from the date of birth.
    fn derive_age(&self, data: &mut RecordSet, report: &mut TransformReport) {
        let Some(dob_idx) = data.column_index(DATE_OF_BIRTH) else {
            return;
        };
        let current_year = self.today.year() as i64;

        let (ages, adults): (Vec<Value>, Vec<Value>) = data
            .column_values(dob_idx)
            .map(|dob| match birth_year(dob) {
                Some(year) if year != UNKNOWN_BIRTH_YEAR => {
                    let age = current_year - year as i64;
                    (Value::Int(age), Value::Bool(age >= ADULT_AGE))
                }
                _ => (Value::Null, Value::Bool(false)),
            })
            .unzip();

        data.add_column(AGE, ColumnType::Integer, ages);
        data.add_column(IS_ADULT, ColumnType::Boolean, adults);
        report.add_column(STEP, AGE, format!("Derived age from '{}'", DATE_OF_BIRTH));
        report.add_column(STEP, IS_ADULT, "Derived adult flag");
    }

    /// Derive `TimeToModify` as modification minus creation.
    fn derive_elapsed(&self, data: &mut RecordSet, report: &mut TransformReport) {
        let (Some(created_idx), Some(modified_idx)) =
            (data.column_index(CREATED_DATE), data.column_index(MODIFIED_DATE))
        else {
            return;
        };

        let elapsed: Vec<Value> = data
            .rows
            .iter()
            .map(|row| match (timestamp_of(&row[created_idx]), timestamp_of(&row[modified_idx])) {
                (Some(created), Some(modified)) => Value::Interval(modified - created),
                _ => Value::Null,
            })
            .collect();

        data.add_column(TIME_TO_MODIFY, ColumnType::Interval, elapsed);
        report.add_column(STEP, TIME_TO_MODIFY, "Derived modification delay");
    }

    /// Label each charge as charged when its amount is strictly positive.
    fn classify_charge(&self, data: &mut RecordSet, report: &mut TransformReport) {
        let Some(amount_idx) = data.column_index(CHARGE_AMOUNT) else {
            return;
        };

        let labels: Vec<Value> = data
            .column_values(amount_idx)
            .map(|amount| {
                let charged = amount.as_f64().is_some_and(|a| a > 0.0);
                Value::Text(if charged { CHARGED } else { NOT_CHARGED }.to_string())
            })
            .collect();

        data.add_column(CHARGE_LABEL, ColumnType::String, labels);
        report.add_column(STEP, CHARGE_LABEL, format!("Classified '{}'", CHARGE_AMOUNT));
    }

    /// Replace numeric channel codes with their labels.
    fn relabel_channel(&self, data: &mut RecordSet, report: &mut TransformReport) {
        let Some(idx) = data.column_index(CHANNEL_TYPE) else {
            return;
        };
        let channels = self.catalog.channels();
        let mut changed = 0;

        let labels: Vec<Value> = data
            .column_values(idx)
            .map(|code| {
                let numeric = code
                    .as_i64()
                    .or_else(|| code.as_str().and_then(|s| s.trim().parse().ok()));
                match numeric {
                    Some(n) => {
                        changed += 1;
                        Value::Text(channels.label(n))
                    }
                    None => code.clone().into_text(),
                }
            })
            .collect();

        data.replace_column(idx, ColumnType::String, labels);
        report.add_change(STEP, CHANNEL_TYPE, changed, "Relabeled channel codes");
    }
}

/// Birth year from the first four characters of a date of birth.
fn birth_year(dob: &Value) -> Option<i32> {
    match dob {
        Value::Timestamp(ts) => Some(ts.year()),
        Value::Text(s) => s.trim().get(..4).and_then(|y| y.parse().ok()),
        Value::Int(n) => n.to_string().get(..4).and_then(|y| y.parse().ok()),
        _ => None,
    }
}

/// Timestamp view of a cell, parsing text left behind by a failed coercion.
fn timestamp_of(value: &Value) -> Option<NaiveDateTime> {
    match value {
        Value::Timestamp(ts) => Some(*ts),
        Value::Text(s) => parse_timestamp(s),
        _ => None,
    }
}

fn round_cents(amount: f64) -> f64 {
    (amount * 100.0).round() / 100.0
}
