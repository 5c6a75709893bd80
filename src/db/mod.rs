//! Storage interfaces used by the seeding core, and their backends.
//!
//! - `KeyLookup`: read existing keys of protected/reference tables
//! - `RowSink`: insert fixture rows and purge earlier ones
//!
//! Backends: an embedded DuckDB database, a SQL script writer and a static
//! key map fed from configuration.

pub mod duckdb;
pub mod script;

pub use self::duckdb::DuckDbStore;
pub use self::script::{Dialect, SqlScriptWriter};

use crate::synth::RowRecord;
use ahash::AHashMap;
use anyhow::Result;
use serde_json::Value;

/// Read access to rows that already exist in the target database
pub trait KeyLookup {
    /// Up to `limit` values of `key` from `table`, skipping `offset` rows,
    /// in a stable order.
    fn fetch_keys(&mut self, table: &str, key: &str, offset: usize, limit: usize)
        -> Result<Vec<Value>>;
}

/// Write access to the target database
pub trait RowSink {
    fn insert(&mut self, table: &str, row: &RowRecord) -> Result<()>;
    fn delete_all(&mut self, table: &str) -> Result<()>;
}

/// Lookup that knows no existing rows
#[derive(Debug, Clone, Copy, Default)]
pub struct NoLookup;

impl KeyLookup for NoLookup {
    fn fetch_keys(&mut self, _: &str, _: &str, _: usize, _: usize) -> Result<Vec<Value>> {
        Ok(Vec::new())
    }
}

/// Lookup over a fixed map of table identity → key values
#[derive(Debug, Clone, Default)]
pub struct StaticLookup {
    keys: AHashMap<String, Vec<Value>>,
}

impl StaticLookup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_keys(mut self, table: impl Into<String>, keys: Vec<Value>) -> Self {
        self.keys.insert(table.into(), keys);
        self
    }

    pub fn from_map(keys: AHashMap<String, Vec<Value>>) -> Self {
        Self { keys }
    }
}

impl KeyLookup for StaticLookup {
    /// Keys are served for any requested key field; the map holds one key
    /// column per table.
    fn fetch_keys(
        &mut self,
        table: &str,
        _key: &str,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<Value>> {
        Ok(self
            .keys
            .get(table)
            .map(|keys| keys.iter().skip(offset).take(limit).cloned().collect())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_static_lookup_paging() {
        let mut lookup =
            StaticLookup::new().with_keys("auth.users", vec![json!("u1"), json!("u2"), json!("u3")]);
        assert_eq!(
            lookup.fetch_keys("auth.users", "id", 1, 10).unwrap(),
            vec![json!("u2"), json!("u3")]
        );
        assert_eq!(
            lookup.fetch_keys("auth.users", "id", 0, 1).unwrap(),
            vec![json!("u1")]
        );
        assert!(lookup.fetch_keys("auth.other", "id", 0, 10).unwrap().is_empty());
    }

    #[test]
    fn test_no_lookup() {
        assert!(NoLookup.fetch_keys("any", "id", 0, 10).unwrap().is_empty());
    }
}
