//! Business key and change hash generation.

use crate::config::{Catalog, SourceKind};
use crate::error::EtlError;
use crate::record::{ColumnType, RecordSet, Value};

use super::report::TransformReport;

const STEP: &str = "keys";

pub const BUSINESS_KEY: &str = "business_key";
pub const HASH: &str = "hash";

/// Placeholder for null identity values.
pub const NULL_PLACEHOLDER: &str = "NULL";

/// Join identity values with underscores, rendering nulls as `NULL`.
pub fn business_key<'v>(values: impl IntoIterator<Item = &'v Value>) -> String {
    values
        .into_iter()
        .map(|v| match v {
            Value::Null => NULL_PLACEHOLDER.to_string(),
            other => other.to_string(),
        })
        .collect::<Vec<_>>()
        .join("_")
}

/// MD5 hex digest over the same concatenation as [`business_key`].
pub fn change_hash<'v>(values: impl IntoIterator<Item = &'v Value>) -> String {
    format!("{:x}", md5::compute(business_key(values).as_bytes()))
}

/// Derives `business_key` and `hash` from a kind's identity columns.
///
/// Both columns come from the one identity list in the catalog, so a key and
/// its hash always describe the same identity.
pub struct KeyGenerator<'a> {
    catalog: &'a Catalog,
}

impl<'a> KeyGenerator<'a> {
    pub fn new(catalog: &'a Catalog) -> Self {
        Self { catalog }
    }

    /// Add both identity columns. Returns false, leaving the record set
    /// untouched, when an identity column is missing.
    pub fn apply(&self, kind: SourceKind, data: &mut RecordSet, report: &mut TransformReport) -> bool {
        let Some(indices) = self.identity_indices(kind, data, report) else {
            return false;
        };

        self.add_business_key(data, &indices, report);
        self.add_change_hash(data, &indices, report);
        true
    }

    /// Resolve the identity columns, reporting any that are absent.
    fn identity_indices(
        &self,
        kind: SourceKind,
        data: &RecordSet,
        report: &mut TransformReport,
    ) -> Option<Vec<usize>> {
        let identity = &self.catalog.rules(kind).identity_columns;
        let missing = data.missing_columns(identity);

        if !missing.is_empty() {
            let err = EtlError::KeyDerivation {
                kind: kind.to_string(),
                missing: missing.iter().map(|c| c.to_string()).collect(),
            };
            report.add_issue(STEP, &missing.join(","), &err);
            return None;
        }

        identity.iter().map(|c| data.column_index(c)).collect()
    }

    fn add_business_key(&self, data: &mut RecordSet, indices: &[usize], report: &mut TransformReport) {
        let keys = data
            .rows
            .iter()
            .map(|row| Value::Text(business_key(indices.iter().map(|&i| &row[i]))))
            .collect();
        data.add_column(BUSINESS_KEY, ColumnType::String, keys);
        report.add_column(STEP, BUSINESS_KEY, "Derived business key");
    }

    fn add_change_hash(&self, data: &mut RecordSet, indices: &[usize], report: &mut TransformReport) {
        let hashes = data
            .rows
            .iter()
            .map(|row| Value::Text(change_hash(indices.iter().map(|&i| &row[i]))))
            .collect();
        data.add_column(HASH, ColumnType::String, hashes);
        report.add_column(STEP, HASH, "Derived change hash");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(headers: &[&str], rows: &[&[&str]]) -> RecordSet {
        RecordSet::from_strings(
            headers.iter().map(|h| h.to_string()).collect(),
            rows.iter()
                .map(|r| r.iter().map(|c| c.to_string()).collect())
                .collect(),
        )
    }

    #[test]
    fn test_business_key_with_nulls() {
        let values = [Value::Int(10), Value::Null, Value::Text("HK".into())];
        assert_eq!(business_key(&values), "10_NULL_HK");
    }

    #[test]
    fn test_hash_is_md5_of_key() {
        let values = [Value::Int(1), Value::Int(2)];
        assert_eq!(change_hash(&values), format!("{:x}", md5::compute("1_2")));
        assert_eq!(change_hash(&values).len(), 32);
    }

    #[test]
    fn test_generator_adds_both_columns() {
        let catalog = Catalog::default();
        let mut rs = table(
            &["PassengerID", "SegmentID", "ChargeAmount"],
            &[&["100", "7", "10"], &["100", "8", "0"]],
        );
        let mut report = TransformReport::new();
        assert!(KeyGenerator::new(&catalog).apply(SourceKind::JourneyCharge, &mut rs, &mut report));

        let key = rs.column_index(BUSINESS_KEY).unwrap();
        let hash = rs.column_index(HASH).unwrap();
        assert_eq!(rs.get(0, key), Some(&Value::Text("100_7".into())));
        assert_eq!(rs.get(1, key), Some(&Value::Text("100_8".into())));
        assert_ne!(rs.get(0, hash), rs.get(1, hash));
    }

    #[test]
    fn test_missing_identity_leaves_record_set() {
        let catalog = Catalog::default();
        let mut rs = table(&["PassengerID", "SegmentID"], &[&["1", "2"]]);
        let original = rs.clone();
        let mut report = TransformReport::new();

        assert!(!KeyGenerator::new(&catalog).apply(SourceKind::JourneyLeg, &mut rs, &mut report));
        assert_eq!(rs, original);
        assert_eq!(report.issues_of("key_derivation").count(), 1);
        assert!(report.issues[0].message.contains("InventoryLegID"));
    }
}
