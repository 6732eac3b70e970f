//! In-memory tabular record set.

use super::value::{ColumnType, Value};

/// An ordered table of rows sharing one named, typed column schema.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordSet {
    /// Column headers.
    pub headers: Vec<String>,
    /// Logical type of each column, parallel to `headers`.
    pub types: Vec<ColumnType>,
    /// Row data (row-major order).
    pub rows: Vec<Vec<Value>>,
}

impl RecordSet {
    /// Create a record set from already-typed parts.
    pub fn new(headers: Vec<String>, types: Vec<ColumnType>, rows: Vec<Vec<Value>>) -> Self {
        Self {
            headers,
            types,
            rows,
        }
    }

    /// Create an empty record set with text columns.
    pub fn empty(headers: Vec<String>) -> Self {
        let types = vec![ColumnType::String; headers.len()];
        Self::new(headers, types, Vec::new())
    }

    /// Build a record set from loosely typed values.
    ///
    /// Each column gets the unified type of its non-null values; columns with
    /// irreconcilable values become text. Columns with no values at all are
    /// text. Short rows are padded with nulls.
    pub fn from_values(headers: Vec<String>, mut rows: Vec<Vec<Value>>) -> Self {
        let width = headers.len();
        for row in &mut rows {
            row.resize(width, Value::Null);
        }

        let mut types = Vec::with_capacity(width);
        for col in 0..width {
            let column_type = rows
                .iter()
                .filter_map(|row| row[col].column_type())
                .reduce(ColumnType::unify)
                .unwrap_or(ColumnType::String);

            for row in &mut rows {
                let cell = std::mem::replace(&mut row[col], Value::Null);
                row[col] = conform(cell, column_type);
            }
            types.push(column_type);
        }

        Self::new(headers, types, rows)
    }

    /// Build a record set from raw text cells.
    ///
    /// Cells in columns that resolve to text keep the token exactly as
    /// written, so `00123` or `1.50` in an identifier column survive.
    pub fn from_strings(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        let sniffed = rows
            .iter()
            .map(|row| row.iter().map(|cell| Value::sniff(cell)).collect())
            .collect();
        let mut data = Self::from_values(headers, sniffed);

        for (col, column_type) in data.types.iter().enumerate() {
            if *column_type != ColumnType::String {
                continue;
            }
            for (row, raw) in data.rows.iter_mut().zip(&rows) {
                if let Some(token) = raw.get(col).filter(|_| !row[col].is_null()) {
                    row[col] = Value::Text(token.clone());
                }
            }
        }
        data
    }

    /// Get the number of columns.
    pub fn column_count(&self) -> usize {
        self.headers.len()
    }

    /// Get the number of rows.
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Find the index of a column by name.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    /// Check that every named column is present.
    pub fn has_columns(&self, names: &[&str]) -> bool {
        names.iter().all(|name| self.has_column(name))
    }

    /// Columns from `names` that are absent.
    pub fn missing_columns<'a>(&self, names: &'a [String]) -> Vec<&'a str> {
        names
            .iter()
            .filter(|name| !self.has_column(name))
            .map(|name| name.as_str())
            .collect()
    }

    pub fn column_type(&self, name: &str) -> Option<ColumnType> {
        self.column_index(name).map(|idx| self.types[idx])
    }

    /// Get all values for a column by index.
    pub fn column_values(&self, index: usize) -> impl Iterator<Item = &Value> {
        self.rows.iter().map(move |row| &row[index])
    }

    /// Get a specific cell value.
    pub fn get(&self, row: usize, col: usize) -> Option<&Value> {
        self.rows.get(row).and_then(|r| r.get(col))
    }

    /// Set a specific cell value.
    pub fn set(&mut self, row: usize, col: usize, value: Value) {
        if let Some(cell) = self.rows.get_mut(row).and_then(|r| r.get_mut(col)) {
            *cell = value;
        }
    }

    /// Replace every value and the type of an existing column.
    pub fn replace_column(&mut self, index: usize, column_type: ColumnType, values: Vec<Value>) {
        debug_assert_eq!(values.len(), self.rows.len());
        self.types[index] = column_type;
        for (row, value) in self.rows.iter_mut().zip(values) {
            row[index] = value;
        }
    }

    /// Add a column, or overwrite an existing column of the same name in place.
    pub fn add_column(&mut self, name: impl Into<String>, column_type: ColumnType, values: Vec<Value>) {
        let name = name.into();
        match self.column_index(&name) {
            Some(idx) => self.replace_column(idx, column_type, values),
            None => {
                debug_assert_eq!(values.len(), self.rows.len());
                self.headers.push(name);
                self.types.push(column_type);
                for (row, value) in self.rows.iter_mut().zip(values) {
                    row.push(value);
                }
            }
        }
    }

    /// Add a column holding the same value in every row.
    pub fn add_constant_column(&mut self, name: impl Into<String>, column_type: ColumnType, value: Value) {
        let values = vec![value; self.rows.len()];
        self.add_column(name, column_type, values);
    }

    /// Keep only rows for which the predicate returns true.
    pub fn retain_rows(&mut self, mut keep: impl FnMut(&[Value]) -> bool) {
        self.rows.retain(|row| keep(row));
    }

    /// Render one row's cells as staged text.
    pub fn row_strings(&self, row: usize) -> Vec<String> {
        self.rows
            .get(row)
            .map(|r| r.iter().map(|v| v.to_string()).collect())
            .unwrap_or_default()
    }
}

/// Convert a value to fit a column of the given type.
fn conform(value: Value, column_type: ColumnType) -> Value {
    match (value, column_type) {
        (Value::Null, _) => Value::Null,
        (Value::Int(n), ColumnType::Float) => Value::Float(n as f64),
        (v, ColumnType::String) => v.into_text(),
        (v, _) => v,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_from_strings_infers_types() {
        let rs = RecordSet::from_strings(
            headers(&["id", "amount", "code", "flag", "empty"]),
            vec![
                vec!["1".into(), "2.5".into(), "ABC".into(), "true".into(), "".into()],
                vec!["2".into(), "3".into(), "17".into(), "false".into(), "NA".into()],
            ],
        );

        assert_eq!(
            rs.types,
            vec![
                ColumnType::Integer,
                ColumnType::Float,
                ColumnType::String,
                ColumnType::Boolean,
                ColumnType::String,
            ]
        );
        assert_eq!(rs.get(1, 1), Some(&Value::Float(3.0)));
        assert_eq!(rs.get(1, 2), Some(&Value::Text("17".into())));
        assert_eq!(rs.get(0, 4), Some(&Value::Null));
    }

    #[test]
    fn test_text_columns_keep_raw_tokens() {
        let rs = RecordSet::from_strings(
            headers(&["RecordLocator", "CustomerNumber"]),
            vec![
                vec!["ABCDEF".into(), "X12".into()],
                vec!["123E45".into(), "00123".into()],
                vec!["1.50".into(), "007".into()],
                vec!["".into(), "NA".into()],
            ],
        );

        assert_eq!(rs.types, vec![ColumnType::String, ColumnType::String]);
        assert_eq!(rs.get(1, 0), Some(&Value::Text("123E45".into())));
        assert_eq!(rs.get(2, 0), Some(&Value::Text("1.50".into())));
        assert_eq!(rs.get(1, 1), Some(&Value::Text("00123".into())));
        assert_eq!(rs.get(2, 1), Some(&Value::Text("007".into())));
        assert_eq!(rs.rows[3], vec![Value::Null, Value::Null]);
    }

    #[test]
    fn test_add_column_overwrites_in_place() {
        let mut rs = RecordSet::from_strings(headers(&["a", "b"]), vec![vec!["1".into(), "x".into()]]);
        rs.add_constant_column("b", ColumnType::Integer, Value::Int(9));
        rs.add_constant_column("c", ColumnType::Boolean, Value::Bool(true));

        assert_eq!(rs.headers, headers(&["a", "b", "c"]));
        assert_eq!(rs.rows[0], vec![Value::Int(1), Value::Int(9), Value::Bool(true)]);
        assert_eq!(rs.column_type("b"), Some(ColumnType::Integer));
    }

    #[test]
    fn test_missing_columns() {
        let rs = RecordSet::empty(headers(&["PassengerID"]));
        let wanted = headers(&["PassengerID", "SegmentID"]);
        assert_eq!(rs.missing_columns(&wanted), vec!["SegmentID"]);
    }
}
