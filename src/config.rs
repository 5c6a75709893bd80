//! YAML configuration for seeding runs.
//!
//! ```yaml
//! default:
//!   rows: 25
//!   seed: 42
//! protected:
//!   - auth.users
//! tables:
//!   public.audit_log:
//!     skip: true
//!   public.posts:
//!     rows: 100
//! reference_keys:
//!   auth.users: ["6f1c...", "9a0b..."]
//! ```

use crate::db::StaticLookup;
use crate::fixture::{PopulateOptions, DEFAULT_ROWS_PER_TABLE};
use crate::schema::SchemaGraph;
use crate::synth::{DEFAULT_ARRAY_LEN, DEFAULT_LOOKUP_BATCH};
use ahash::AHashMap;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Per-table settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TableConfig {
    /// Row count for this table (overrides default)
    pub rows: Option<usize>,
    /// Leave this table empty
    pub skip: bool,
    /// Treat this table as protected (never synthesized or purged)
    pub protected: bool,
}

/// Default generation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DefaultConfig {
    pub rows: usize,
    /// Elements per array field without `x-count`
    pub array_len: usize,
    /// Existing keys fetched per protected table
    pub lookup_batch: usize,
    /// Seed for scalar values (random when unset)
    pub seed: Option<u64>,
}

impl Default for DefaultConfig {
    fn default() -> Self {
        Self {
            rows: DEFAULT_ROWS_PER_TABLE,
            array_len: DEFAULT_ARRAY_LEN,
            lookup_batch: DEFAULT_LOOKUP_BATCH,
            seed: None,
        }
    }
}

/// Complete YAML configuration for the seed command
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SeedYamlConfig {
    pub default: DefaultConfig,
    /// Tables whose existing rows are referenced but never touched
    pub protected: Vec<String>,
    /// Per-table settings
    pub tables: BTreeMap<String, TableConfig>,
    /// Known keys of protected tables, used when no database is attached
    pub reference_keys: BTreeMap<String, Vec<Value>>,
}

impl SeedYamlConfig {
    /// Load configuration from a YAML file
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("Invalid config: {}", path.display()))
    }

    pub fn parse(content: &str) -> anyhow::Result<Self> {
        let config: SeedYamlConfig = serde_yaml_ng::from_str(content)?;
        Ok(config)
    }

    /// Get configuration for a specific table
    pub fn get_table_config(&self, table_name: &str) -> Option<&TableConfig> {
        self.tables.get(table_name).or_else(|| {
            let lower = table_name.to_lowercase();
            self.tables
                .iter()
                .find(|(k, _)| k.to_lowercase() == lower)
                .map(|(_, v)| v)
        })
    }

    pub fn should_skip(&self, table_name: &str) -> bool {
        self.get_table_config(table_name).is_some_and(|c| c.skip)
    }

    /// All tables marked protected, from the list and per-table settings
    pub fn protected_tables(&self) -> Vec<String> {
        let mut tables = self.protected.clone();
        tables.extend(
            self.tables
                .iter()
                .filter(|(_, c)| c.protected)
                .map(|(name, _)| name.clone()),
        );
        tables
    }

    /// Populate options for the tables of `graph`, with `rows` as the
    /// default count
    pub fn populate_options(&self, graph: &SchemaGraph, rows: usize) -> PopulateOptions {
        let mut options = PopulateOptions::with_rows(rows);
        for table in graph.schema.iter() {
            let Some(config) = self.get_table_config(&table.identity) else {
                continue;
            };
            if let Some(rows) = config.rows {
                options.overrides.insert(table.identity.clone(), rows);
            }
            if config.skip {
                options.skip.insert(table.identity.clone());
            }
        }
        options
    }

    pub fn static_lookup(&self) -> StaticLookup {
        let keys: AHashMap<String, Vec<Value>> = self
            .reference_keys
            .iter()
            .map(|(table, keys)| (table.clone(), keys.clone()))
            .collect();
        StaticLookup::from_map(keys)
    }
}
