//! Existing-key resolution for protected/reference tables.

use crate::db::KeyLookup;
use ahash::{AHashMap, AHashSet};
use serde::Serialize;
use serde_json::Value;
use std::fmt;

/// Keys fetched per protected table and key field
pub const DEFAULT_LOOKUP_BATCH: usize = 100;

/// Existing keys of a protected table could not be read
#[derive(Debug, Clone, PartialEq, Eq, Serialize, schemars::JsonSchema)]
pub struct LookupError {
    pub table: String,
    pub key: String,
    pub reason: String,
}

impl fmt::Display for LookupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "lookup of {}.{} failed: {}",
            self.table, self.key, self.reason
        )
    }
}

impl std::error::Error for LookupError {}

/// Run-scoped resolver for references into protected tables.
///
/// Each (table, key) pair is fetched once; later rows are served from the
/// cache so every row of a run sees the same key list.
pub struct ReferenceResolver<'a> {
    lookup: &'a mut dyn KeyLookup,
    protected: AHashSet<String>,
    batch: usize,
    cache: AHashMap<(String, String), Result<Vec<Value>, LookupError>>,
}

impl<'a> ReferenceResolver<'a> {
    pub fn new(lookup: &'a mut dyn KeyLookup) -> Self {
        Self {
            lookup,
            protected: AHashSet::new(),
            batch: DEFAULT_LOOKUP_BATCH,
            cache: AHashMap::new(),
        }
    }

    pub fn with_protected<I, S>(mut self, tables: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.protected
            .extend(tables.into_iter().map(|t| t.as_ref().to_lowercase()));
        self
    }

    pub fn with_batch(mut self, batch: usize) -> Self {
        self.batch = batch.max(1);
        self
    }

    pub fn is_protected(&self, table: &str) -> bool {
        self.protected.contains(&table.to_lowercase())
    }

    /// Existing keys of `table.key`, fetching them on first use
    pub fn existing_keys(&mut self, table: &str, key: &str) -> Result<&[Value], LookupError> {
        let cache_key = (table.to_string(), key.to_string());
        if !self.cache.contains_key(&cache_key) {
            let fetched = self
                .lookup
                .fetch_keys(table, key, 0, self.batch)
                .map_err(|e| LookupError {
                    table: table.to_string(),
                    key: key.to_string(),
                    reason: format!("{:#}", e),
                });
            self.cache.insert(cache_key.clone(), fetched);
        }

        match self.cache.get(&cache_key) {
            Some(Ok(keys)) => Ok(keys.as_slice()),
            Some(Err(e)) => Err(e.clone()),
            None => Ok(&[]),
        }
    }

    /// Key for row `index`: the `index`-th existing key, or the last one when
    /// the table has fewer rows. `None` when the table is empty.
    pub fn existing_key(
        &mut self,
        table: &str,
        key: &str,
        index: usize,
    ) -> Result<Option<Value>, LookupError> {
        let keys = self.existing_keys(table, key)?;
        Ok(keys.get(index).or_else(|| keys.last()).cloned())
    }

    /// Lookups that failed during this run
    pub fn errors(&self) -> Vec<LookupError> {
        let mut errors: Vec<LookupError> = self
            .cache
            .values()
            .filter_map(|r| r.as_ref().err().cloned())
            .collect();
        errors.sort_by(|a, b| (&a.table, &a.key).cmp(&(&b.table, &b.key)));
        errors
    }

    /// Keys already fetched for `table.key`, without triggering a lookup
    pub fn cached_keys(&self, table: &str, key: &str) -> Option<&[Value]> {
        match self.cache.get(&(table.to_string(), key.to_string())) {
            Some(Ok(keys)) => Some(keys.as_slice()),
            _ => None,
        }
    }
}
