//! SQLite destination store.

use std::fs;
use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;
use rusqlite::types::{ToSqlOutput, Value as SqlValue, ValueRef};
use rusqlite::{Connection, ToSql, TransactionBehavior, params_from_iter};
use tracing::{debug, info};

use crate::config::WarehouseConfig;
use crate::error::{EtlError, Result};
use crate::record::{RecordSet, Value};

use super::mode::LoadMode;
use super::tables::{SqlType, TableSpec};

static IDENTIFIER: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").ok());

/// Check that a table or column name is safe to interpolate into SQL.
pub fn is_valid_identifier(name: &str) -> bool {
    IDENTIFIER.as_ref().is_some_and(|re| re.is_match(name))
}

/// A connection to the destination database.
pub struct Warehouse {
    conn: Connection,
    path: PathBuf,
}

impl Warehouse {
    /// Open (or create) the database file named by the config.
    pub fn open(config: &WarehouseConfig) -> Result<Self> {
        if let Some(parent) = config.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| EtlError::io(parent, e))?;
            }
        }

        let conn = Connection::open(&config.path)?;
        conn.busy_timeout(config.busy_timeout())?;
        debug!(path = %config.path.display(), "Warehouse opened");

        Ok(Self {
            conn,
            path: config.path.clone(),
        })
    }

    /// In-memory database, used by tests and dry runs.
    pub fn open_in_memory() -> Result<Self> {
        Ok(Self {
            conn: Connection::open_in_memory()?,
            path: PathBuf::from(":memory:"),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Create the table if it does not exist yet.
    pub fn ensure_table(&self, spec: &TableSpec) -> Result<()> {
        self.conn.execute_batch(&create_table_sql(spec)?)?;
        Ok(())
    }

    pub fn ensure_tables(&self, specs: &[TableSpec]) -> Result<()> {
        for spec in specs {
            self.ensure_table(spec)?;
        }
        Ok(())
    }

    /// Load every row of a staged record set into the table.
    ///
    /// Runs in one transaction; any failure rolls the whole table back.
    /// Returns the number of rows written.
    pub fn load(&mut self, spec: &TableSpec, data: &RecordSet, mode: LoadMode) -> Result<usize> {
        validate_spec(spec)?;
        let positions = column_positions(spec, data)?;
        let sql = match mode {
            LoadMode::Full => insert_sql(spec),
            LoadMode::Incremental => upsert_sql(spec),
        };

        let tx = self.conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        match mode {
            LoadMode::Full => {
                // Identity-only hashes repeat across rows; only the upsert needs them unique.
                tx.execute_batch(&drop_hash_index_sql(spec))?;
                let deleted = tx.execute(&format!("DELETE FROM {}", quote(&spec.name)), [])?;
                debug!(table = %spec.name, rows = deleted, "Existing rows deleted");
            }
            LoadMode::Incremental => tx.execute_batch(&hash_index_sql(spec))?,
        }

        let mut written = 0;
        {
            let mut stmt = tx.prepare(&sql)?;
            for row in 0..data.row_count() {
                let params = positions.iter().zip(&spec.columns).map(|(&col, def)| {
                    data.get(row, col)
                        .map_or(Value::Null, |v| conform(v, def.sql_type))
                });
                written += stmt.execute(params_from_iter(params))?;
            }
        }
        tx.commit()?;

        info!(table = %spec.name, mode = %mode, rows = written, "Table loaded");
        Ok(written)
    }

    pub fn row_count(&self, table: &str) -> Result<usize> {
        if !is_valid_identifier(table) {
            return Err(invalid_identifier(table, table));
        }
        let count: i64 = self
            .conn
            .query_row(&format!("SELECT COUNT(*) FROM {}", quote(table)), [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// Read one column for the row with the given hash.
    pub fn lookup(&self, table: &str, hash: &str, column: &str) -> Result<Option<SqlValue>> {
        for name in [table, column] {
            if !is_valid_identifier(name) {
                return Err(invalid_identifier(table, name));
            }
        }
        let sql = format!("SELECT {} FROM {} WHERE \"hash\" = ?1", quote(column), quote(table));
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query([hash])?;
        match rows.next()? {
            Some(row) => Ok(Some(row.get(0)?)),
            None => Ok(None),
        }
    }
}

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Value::Null => ToSqlOutput::Owned(SqlValue::Null),
            Value::Int(n) => ToSqlOutput::Owned(SqlValue::Integer(*n)),
            Value::Float(f) => ToSqlOutput::Owned(SqlValue::Real(*f)),
            Value::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
            Value::Bool(b) => ToSqlOutput::Owned(SqlValue::Integer(i64::from(*b))),
            Value::Timestamp(_) | Value::Interval(_) => ToSqlOutput::Owned(SqlValue::Text(self.to_string())),
        })
    }
}

/// Bring a staged value in line with the destination column type.
fn conform(value: &Value, sql_type: SqlType) -> Value {
    match (sql_type, value) {
        (_, Value::Null) => Value::Null,
        (SqlType::Integer, Value::Float(_)) => value.as_i64().map_or_else(|| value.clone(), Value::Int),
        (SqlType::Real, Value::Int(n)) => Value::Float(*n as f64),
        (SqlType::Boolean, Value::Int(n)) => Value::Bool(*n != 0),
        (SqlType::Text | SqlType::Timestamp | SqlType::Interval, _) => value.clone().into_text(),
        _ => value.clone(),
    }
}

fn column_positions(spec: &TableSpec, data: &RecordSet) -> Result<Vec<usize>> {
    if data.column_count() != spec.columns.len() {
        return Err(EtlError::SchemaMismatch {
            table: spec.name.clone(),
            message: format!(
                "staged data has {} columns, table expects {}",
                data.column_count(),
                spec.columns.len()
            ),
        });
    }

    spec.columns
        .iter()
        .map(|def| {
            data.column_index(&def.name).ok_or_else(|| EtlError::SchemaMismatch {
                table: spec.name.clone(),
                message: format!("staged data has no column '{}'", def.name),
            })
        })
        .collect()
}

fn validate_spec(spec: &TableSpec) -> Result<()> {
    let names = std::iter::once(spec.name.as_str())
        .chain(spec.columns.iter().map(|c| c.name.as_str()))
        .chain(spec.primary_key.iter().map(String::as_str));
    for name in names {
        if !is_valid_identifier(name) {
            return Err(invalid_identifier(&spec.name, name));
        }
    }
    if !spec.columns.iter().any(|c| c.name == spec.hash_column) {
        return Err(EtlError::SchemaMismatch {
            table: spec.name.clone(),
            message: format!("table has no hash column '{}'", spec.hash_column),
        });
    }
    Ok(())
}

fn invalid_identifier(table: &str, name: &str) -> EtlError {
    EtlError::SchemaMismatch {
        table: table.to_string(),
        message: format!("invalid identifier '{}'", name),
    }
}

fn quote(name: &str) -> String {
    format!("\"{}\"", name)
}

fn create_table_sql(spec: &TableSpec) -> Result<String> {
    validate_spec(spec)?;

    let mut defs: Vec<String> = spec
        .columns
        .iter()
        .map(|c| format!("{} {}", quote(&c.name), c.sql_type.declaration()))
        .collect();
    if !spec.primary_key.is_empty() {
        let key: Vec<String> = spec.primary_key.iter().map(|c| quote(c)).collect();
        defs.push(format!("PRIMARY KEY ({})", key.join(", ")));
    }

    Ok(format!(
        "CREATE TABLE IF NOT EXISTS {} (\n    {}\n);",
        quote(&spec.name),
        defs.join(",\n    ")
    ))
}

fn hash_index_name(spec: &TableSpec) -> String {
    quote(&format!("ux_{}_{}", spec.name, spec.hash_column))
}

/// Unique index backing the incremental upsert's conflict target.
fn hash_index_sql(spec: &TableSpec) -> String {
    format!(
        "CREATE UNIQUE INDEX IF NOT EXISTS {} ON {} ({});",
        hash_index_name(spec),
        quote(&spec.name),
        quote(&spec.hash_column)
    )
}

fn drop_hash_index_sql(spec: &TableSpec) -> String {
    format!("DROP INDEX IF EXISTS {};", hash_index_name(spec))
}

fn insert_sql(spec: &TableSpec) -> String {
    let columns: Vec<String> = spec.columns.iter().map(|c| quote(&c.name)).collect();
    let placeholders: Vec<String> = (1..=spec.columns.len()).map(|i| format!("?{}", i)).collect();
    format!(
        "INSERT INTO {} ({}) VALUES ({})",
        quote(&spec.name),
        columns.join(", "),
        placeholders.join(", ")
    )
}

fn upsert_sql(spec: &TableSpec) -> String {
    let updates: Vec<String> = spec
        .columns
        .iter()
        .filter(|c| c.name != spec.hash_column)
        .map(|c| format!("{0} = excluded.{0}", quote(&c.name)))
        .collect();
    format!(
        "{} ON CONFLICT({}) DO UPDATE SET {}",
        insert_sql(spec),
        quote(&spec.hash_column),
        updates.join(", ")
    )
}
