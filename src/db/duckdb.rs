//! Embedded DuckDB backend.
//!
//! Serves both sides of a run: existing keys of protected tables are read
//! from it and fixture rows are written to it. Table identities of the form
//! `namespace.name` map to DuckDB schemas.

use super::{Dialect, KeyLookup, RowSink};
use crate::synth::RowRecord;
use anyhow::{Context, Result};
use duckdb::types::{Value as DuckValue, ValueRef};
use duckdb::{params_from_iter, Connection};
use serde_json::{Number, Value};
use std::path::Path;

/// DuckDB connection used as key lookup and row sink
pub struct DuckDbStore {
    conn: Connection,
}

impl DuckDbStore {
    /// Open (or create) a database file
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open DuckDB database: {}", path.display()))?;
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn =
            Connection::open_in_memory().context("Failed to create in-memory DuckDB database")?;
        Ok(Self { conn })
    }

    /// Execute a statement that doesn't return results (e.g., CREATE)
    pub fn execute(&self, sql: &str) -> Result<usize> {
        self.conn
            .execute(sql, [])
            .with_context(|| format!("Failed to execute: {}", sql))
    }

    /// Execute a batch of `;`-separated statements
    pub fn execute_batch(&self, sql: &str) -> Result<()> {
        self.conn
            .execute_batch(sql)
            .context("Failed to execute statement batch")
    }

    pub fn row_count(&self, table: &str) -> Result<usize> {
        let sql = format!("SELECT COUNT(*) FROM {}", quote_table(table));
        let count: i64 = self
            .conn
            .query_row(&sql, [], |row| row.get(0))
            .with_context(|| format!("Failed to count rows of {}", table))?;
        Ok(count as usize)
    }

    /// All values of `column` in `table`, in storage order
    pub fn column_values(&self, table: &str, column: &str) -> Result<Vec<Value>> {
        self.select_values(table, column, "")
    }

    /// Values of `column`, followed by `tail` (ORDER BY, LIMIT).
    ///
    /// Types without a JSON counterpart (DATE, TIMESTAMP, DECIMAL, ...) are
    /// returned as DuckDB's own text rendering, which casts back on insert.
    fn select_values(&self, table: &str, column: &str, tail: &str) -> Result<Vec<Value>> {
        let column = Dialect::Postgres.quote_identifier(column);
        let sql = format!(
            "SELECT {column}, CAST({column} AS VARCHAR) FROM {} {tail}",
            quote_table(table)
        );
        let mut stmt = self
            .conn
            .prepare(&sql)
            .with_context(|| format!("Failed to prepare query: {}", sql))?;
        let mut rows = stmt
            .query([])
            .with_context(|| format!("Failed to execute query: {}", sql))?;

        let mut values = Vec::new();
        while let Some(row) = rows.next()? {
            let value = match to_json(row.get_ref(0)?) {
                Some(value) => value,
                None => row
                    .get::<_, Option<String>>(1)?
                    .map_or(Value::Null, Value::String),
            };
            values.push(value);
        }
        Ok(values)
    }
}

impl KeyLookup for DuckDbStore {
    /// Keys come back sorted by value so repeated runs see the same list
    fn fetch_keys(
        &mut self,
        table: &str,
        key: &str,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<Value>> {
        let column = Dialect::Postgres.quote_identifier(key);
        self.select_values(
            table,
            key,
            &format!("ORDER BY {column} LIMIT {limit} OFFSET {offset}"),
        )
    }
}

impl RowSink for DuckDbStore {
    fn insert(&mut self, table: &str, row: &RowRecord) -> Result<()> {
        if row.is_empty() {
            self.execute(&format!("INSERT INTO {} DEFAULT VALUES", quote_table(table)))?;
            return Ok(());
        }

        let columns: Vec<String> = row
            .columns()
            .map(|c| Dialect::Postgres.quote_identifier(c))
            .collect();
        let placeholders = vec!["?"; columns.len()].join(", ");
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            quote_table(table),
            columns.join(", "),
            placeholders
        );
        let params: Vec<DuckValue> = row.iter().map(|(_, v)| to_duck(v)).collect();

        self.conn
            .execute(&sql, params_from_iter(params))
            .with_context(|| format!("Failed to insert into {}", table))?;
        Ok(())
    }

    fn delete_all(&mut self, table: &str) -> Result<()> {
        self.execute(&format!("DELETE FROM {}", quote_table(table)))?;
        Ok(())
    }
}

fn quote_table(identity: &str) -> String {
    Dialect::Postgres.quote_table(identity)
}

/// Nested objects and arrays are bound as JSON text
fn to_duck(value: &Value) -> DuckValue {
    match value {
        Value::Null => DuckValue::Null,
        Value::Bool(b) => DuckValue::Boolean(*b),
        Value::Number(n) => match n.as_i64() {
            Some(i) => DuckValue::BigInt(i),
            None => DuckValue::Double(n.as_f64().unwrap_or_default()),
        },
        Value::String(s) => DuckValue::Text(s.clone()),
        Value::Array(_) | Value::Object(_) => DuckValue::Text(value.to_string()),
    }
}

/// `None` for types that have no direct JSON form
fn to_json(value: ValueRef<'_>) -> Option<Value> {
    let value = match value {
        ValueRef::Null => Value::Null,
        ValueRef::Boolean(b) => Value::Bool(b),
        ValueRef::TinyInt(n) => Value::from(n),
        ValueRef::SmallInt(n) => Value::from(n),
        ValueRef::Int(n) => Value::from(n),
        ValueRef::BigInt(n) => Value::from(n),
        ValueRef::UTinyInt(n) => Value::from(n),
        ValueRef::USmallInt(n) => Value::from(n),
        ValueRef::UInt(n) => Value::from(n),
        ValueRef::UBigInt(n) => Value::from(n),
        ValueRef::HugeInt(n) => Value::String(n.to_string()),
        ValueRef::Float(f) => Number::from_f64(f as f64).map_or(Value::Null, Value::Number),
        ValueRef::Double(f) => Number::from_f64(f).map_or(Value::Null, Value::Number),
        ValueRef::Text(s) => Value::String(String::from_utf8_lossy(s).into_owned()),
        _ => return None,
    };
    Some(value)
}
