//! SQL script backend: renders fixture rows as INSERT/DELETE statements.
//!
//! Nothing is executed; the script is written to any `io::Write` and can be
//! replayed against Postgres, MySQL or SQLite.

use super::RowSink;
use crate::synth::RowRecord;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::io::Write;

/// Target SQL dialect of a generated script
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    #[default]
    Postgres,
    MySql,
    Sqlite,
}

impl std::str::FromStr for Dialect {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "postgres" | "postgresql" | "pg" => Ok(Dialect::Postgres),
            "mysql" | "mariadb" => Ok(Dialect::MySql),
            "sqlite" | "sqlite3" => Ok(Dialect::Sqlite),
            _ => Err(format!(
                "Unknown dialect: {}. Valid options: postgres, mysql, sqlite",
                s
            )),
        }
    }
}

impl std::fmt::Display for Dialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Dialect::Postgres => write!(f, "postgres"),
            Dialect::MySql => write!(f, "mysql"),
            Dialect::Sqlite => write!(f, "sqlite"),
        }
    }
}

impl Dialect {
    pub fn quote_identifier(&self, name: &str) -> String {
        match self {
            Dialect::MySql => format!("`{}`", name.replace('`', "``")),
            Dialect::Postgres | Dialect::Sqlite => format!("\"{}\"", name.replace('"', "\"\"")),
        }
    }

    /// Quote a table identity; `namespace.name` becomes two quoted parts.
    /// SQLite has no schemas, so the identity is quoted as one name there.
    pub fn quote_table(&self, identity: &str) -> String {
        match (self, identity.split_once('.')) {
            (Dialect::Postgres | Dialect::MySql, Some((namespace, name))) => format!(
                "{}.{}",
                self.quote_identifier(namespace),
                self.quote_identifier(name)
            ),
            _ => self.quote_identifier(identity),
        }
    }

    pub fn quote_string(&self, value: &str) -> String {
        match self {
            Dialect::MySql => {
                let escaped = value
                    .replace('\\', "\\\\")
                    .replace('\'', "\\'")
                    .replace('\n', "\\n")
                    .replace('\r', "\\r")
                    .replace('\t', "\\t")
                    .replace('\0', "\\0");
                format!("'{}'", escaped)
            }
            Dialect::Postgres | Dialect::Sqlite => format!("'{}'", value.replace('\'', "''")),
        }
    }

    /// SQL literal for a row value. Nested objects and arrays are stored as
    /// JSON text.
    pub fn literal(&self, value: &Value) -> String {
        match value {
            Value::Null => "NULL".to_string(),
            Value::Bool(b) => match self {
                Dialect::Postgres => b.to_string().to_uppercase(),
                Dialect::MySql | Dialect::Sqlite => (*b as u8).to_string(),
            },
            Value::Number(n) => n.to_string(),
            Value::String(s) => self.quote_string(s),
            Value::Array(_) | Value::Object(_) => self.quote_string(&value.to_string()),
        }
    }

    pub fn insert_statement(&self, table: &str, row: &RowRecord) -> String {
        if row.is_empty() {
            return match self {
                Dialect::MySql => format!("INSERT INTO {} () VALUES ();", self.quote_table(table)),
                Dialect::Postgres | Dialect::Sqlite => {
                    format!("INSERT INTO {} DEFAULT VALUES;", self.quote_table(table))
                }
            };
        }

        let columns: Vec<String> = row.columns().map(|c| self.quote_identifier(c)).collect();
        let values: Vec<String> = row.iter().map(|(_, v)| self.literal(v)).collect();
        format!(
            "INSERT INTO {} ({}) VALUES ({});",
            self.quote_table(table),
            columns.join(", "),
            values.join(", ")
        )
    }

    pub fn delete_statement(&self, table: &str) -> String {
        format!("DELETE FROM {};", self.quote_table(table))
    }
}

/// `RowSink` that writes statements instead of executing them
pub struct SqlScriptWriter<W: Write> {
    writer: W,
    dialect: Dialect,
    statements: usize,
}

impl<W: Write> SqlScriptWriter<W> {
    pub fn new(writer: W, dialect: Dialect) -> Self {
        Self {
            writer,
            dialect,
            statements: 0,
        }
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub fn statements(&self) -> usize {
        self.statements
    }

    /// Write a `-- ` comment line
    pub fn comment(&mut self, text: &str) -> Result<()> {
        for line in text.lines() {
            writeln!(self.writer, "-- {}", line).context("Failed to write script")?;
        }
        Ok(())
    }

    pub fn begin(&mut self) -> Result<()> {
        let stmt = match self.dialect {
            Dialect::MySql => "START TRANSACTION;",
            Dialect::Postgres | Dialect::Sqlite => "BEGIN;",
        };
        self.write_statement(stmt)
    }

    pub fn commit(&mut self) -> Result<()> {
        self.write_statement("COMMIT;")
    }

    pub fn finish(mut self) -> Result<W> {
        self.writer.flush().context("Failed to flush script")?;
        Ok(self.writer)
    }

    fn write_statement(&mut self, stmt: &str) -> Result<()> {
        writeln!(self.writer, "{}", stmt).context("Failed to write script")?;
        self.statements += 1;
        Ok(())
    }
}

impl<W: Write> RowSink for SqlScriptWriter<W> {
    fn insert(&mut self, table: &str, row: &RowRecord) -> Result<()> {
        let stmt = self.dialect.insert_statement(table, row);
        self.write_statement(&stmt)
    }

    fn delete_all(&mut self, table: &str) -> Result<()> {
        let stmt = self.dialect.delete_statement(table);
        self.write_statement(&stmt)
    }
}
