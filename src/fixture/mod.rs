//! Fixture store: synthesized rows per table, filled in dependency order.
//!
//! `populate` walks the insertion order and makes every table's rows
//! available to the tables after it. The `writer` submodule persists the
//! store and purges earlier fixture rows.

mod writer;

pub use writer::{flush, purge, FlushReport, InsertionError, PurgeFailure, PurgeReport, TableFlushStats};

use crate::provider::ValueProvider;
use crate::schema::{SchemaGraph, TableId};
use crate::synth::{ReferenceResolver, RowRecord, RowSynthesizer, UnresolvedReference};
use ahash::{AHashMap, AHashSet};
use indicatif::ProgressBar;
use serde::Serialize;
use std::fmt;

/// Rows generated per table when nothing else is configured
pub const DEFAULT_ROWS_PER_TABLE: usize = 10;

/// Synthesized rows keyed by table identity, in generation order
#[derive(Debug, Clone, Default)]
pub struct FixtureStore {
    index: AHashMap<String, usize>,
    tables: Vec<(String, Vec<RowRecord>)>,
}

impl FixtureStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a row to `table`
    pub fn push(&mut self, table: &str, row: RowRecord) {
        let slot = match self.index.get(table) {
            Some(&slot) => slot,
            None => {
                self.tables.push((table.to_string(), Vec::new()));
                self.index.insert(table.to_string(), self.tables.len() - 1);
                self.tables.len() - 1
            }
        };
        self.tables[slot].1.push(row);
    }

    /// Rows of `table` (exact identity first, then case-insensitive)
    pub fn rows(&self, table: &str) -> &[RowRecord] {
        let slot = self.index.get(table).copied().or_else(|| {
            self.tables
                .iter()
                .position(|(name, _)| name.eq_ignore_ascii_case(table))
        });
        match slot {
            Some(slot) => &self.tables[slot].1,
            None => &[],
        }
    }

    /// Tables in the order they were first filled
    pub fn tables(&self) -> impl Iterator<Item = (&str, &[RowRecord])> {
        self.tables
            .iter()
            .map(|(name, rows)| (name.as_str(), rows.as_slice()))
    }

    pub fn row_count(&self, table: &str) -> usize {
        self.rows(table).len()
    }

    pub fn total_rows(&self) -> usize {
        self.tables.iter().map(|(_, rows)| rows.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.total_rows() == 0
    }
}

/// How many rows to synthesize, and for which tables
#[derive(Debug, Clone)]
pub struct PopulateOptions {
    /// Rows per table
    pub rows: usize,
    /// Per-table row counts overriding `rows`
    pub overrides: AHashMap<String, usize>,
    /// Tables left empty (in addition to protected ones)
    pub skip: AHashSet<String>,
}

impl Default for PopulateOptions {
    fn default() -> Self {
        Self::with_rows(DEFAULT_ROWS_PER_TABLE)
    }
}

impl PopulateOptions {
    pub fn with_rows(rows: usize) -> Self {
        Self {
            rows,
            overrides: AHashMap::new(),
            skip: AHashSet::new(),
        }
    }

    pub fn rows_for(&self, table: &str) -> usize {
        self.overrides.get(table).copied().unwrap_or(self.rows)
    }

    pub fn skips(&self, table: &str) -> bool {
        self.skip.contains(table)
    }
}

/// What happened to one table during population
#[derive(Debug, Clone, PartialEq, Eq, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum PopulateStatus {
    Generated,
    Protected,
    Skipped,
}

impl fmt::Display for PopulateStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PopulateStatus::Generated => write!(f, "generated"),
            PopulateStatus::Protected => write!(f, "protected"),
            PopulateStatus::Skipped => write!(f, "skipped"),
        }
    }
}

#[derive(Debug, Clone, Serialize, schemars::JsonSchema)]
pub struct TablePopulateStats {
    pub table: String,
    pub status: PopulateStatus,
    pub rows: usize,
}

/// Statistics from a populate run
#[derive(Debug, Clone, Default, Serialize, schemars::JsonSchema)]
pub struct PopulateReport {
    pub tables: Vec<TablePopulateStats>,
    pub unresolved: Vec<UnresolvedReference>,
}

impl PopulateReport {
    pub fn total_rows(&self) -> usize {
        self.tables.iter().map(|t| t.rows).sum()
    }
}

/// Synthesize rows for every table in `order`.
///
/// `order` must be a topological order of `graph`; each table's rows are
/// pushed before the next table starts so they can be referenced.
pub fn populate<P: ValueProvider>(
    graph: &SchemaGraph,
    order: &[TableId],
    options: &PopulateOptions,
    synthesizer: &mut RowSynthesizer<P>,
    resolver: &mut ReferenceResolver<'_>,
    progress: Option<&ProgressBar>,
) -> (FixtureStore, PopulateReport) {
    let mut store = FixtureStore::new();
    let mut report = PopulateReport::default();

    for &id in order {
        let Some(table) = graph.schema.table(id) else {
            continue;
        };

        let status = if table.protected || resolver.is_protected(&table.identity) {
            PopulateStatus::Protected
        } else if options.skips(&table.identity) {
            PopulateStatus::Skipped
        } else {
            PopulateStatus::Generated
        };

        let mut rows = 0;
        if status == PopulateStatus::Generated {
            if let Some(pb) = progress {
                pb.set_message(table.identity.clone());
            }
            for index in 0..options.rows_for(&table.identity) {
                let out = synthesizer.synthesize(table, index, &store, resolver);
                report.unresolved.extend(out.unresolved);
                store.push(&table.identity, out.row);
                rows += 1;
                if let Some(pb) = progress {
                    pb.inc(1);
                }
            }
        }

        report.tables.push(TablePopulateStats {
            table: table.identity.clone(),
            status,
            rows,
        });
    }

    (store, report)
}
