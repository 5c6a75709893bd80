use super::FixtureStore;
use crate::db::RowSink;
use crate::schema::{SchemaGraph, TableId};
use crate::synth::RowRecord;
use indicatif::ProgressBar;
use serde::Serialize;
use std::fmt;

/// A row the sink rejected
#[derive(Debug, Clone, Serialize, schemars::JsonSchema)]
pub struct InsertionError {
    pub table: String,
    pub row: RowRecord,
    pub reason: String,
}

impl fmt::Display for InsertionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "insert into {} failed: {} (row {})", self.table, self.reason, self.row)
    }
}

impl std::error::Error for InsertionError {}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, schemars::JsonSchema)]
pub struct TableFlushStats {
    pub table: String,
    pub attempted: usize,
    pub inserted: usize,
}

/// Result of writing a fixture store
#[derive(Debug, Clone, Default, Serialize, schemars::JsonSchema)]
pub struct FlushReport {
    pub tables: Vec<TableFlushStats>,
    pub errors: Vec<InsertionError>,
}

impl FlushReport {
    pub fn attempted(&self) -> usize {
        self.tables.iter().map(|t| t.attempted).sum()
    }

    pub fn inserted(&self) -> usize {
        self.tables.iter().map(|t| t.inserted).sum()
    }

    pub fn stats(&self, table: &str) -> Option<&TableFlushStats> {
        self.tables.iter().find(|t| t.table == table)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, schemars::JsonSchema)]
pub struct PurgeFailure {
    pub table: String,
    pub reason: String,
}

impl fmt::Display for PurgeFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "purge of {} failed: {}", self.table, self.reason)
    }
}

#[derive(Debug, Clone, Default, Serialize, schemars::JsonSchema)]
pub struct PurgeReport {
    /// Tables emptied, in the order they were purged
    pub purged: Vec<String>,
    pub failures: Vec<PurgeFailure>,
}

/// Insert every stored row, table by table in `order`.
///
/// A rejected row is recorded and the next row is attempted.
pub fn flush(
    store: &FixtureStore,
    graph: &SchemaGraph,
    order: &[TableId],
    sink: &mut dyn RowSink,
    progress: Option<&ProgressBar>,
) -> FlushReport {
    let mut report = FlushReport::default();

    for &id in order {
        let Some(table) = graph.table_name(id) else {
            continue;
        };
        let rows = store.rows(table);
        if rows.is_empty() {
            continue;
        }
        if let Some(pb) = progress {
            pb.set_message(table.to_string());
        }

        let mut stats = TableFlushStats {
            table: table.to_string(),
            attempted: 0,
            inserted: 0,
        };
        for row in rows {
            stats.attempted += 1;
            match sink.insert(table, row) {
                Ok(()) => stats.inserted += 1,
                Err(e) => report.errors.push(InsertionError {
                    table: table.to_string(),
                    row: row.clone(),
                    reason: format!("{:#}", e),
                }),
            }
            if let Some(pb) = progress {
                pb.inc(1);
            }
        }
        report.tables.push(stats);
    }

    report
}

/// Delete all rows of every non-protected table, children before parents.
///
/// `order` is the insertion order; it is walked backwards.
pub fn purge(graph: &SchemaGraph, order: &[TableId], sink: &mut dyn RowSink) -> PurgeReport {
    let mut report = PurgeReport::default();

    for &id in order.iter().rev() {
        let Some(table) = graph.schema.table(id) else {
            continue;
        };
        if table.protected {
            continue;
        }
        match sink.delete_all(&table.identity) {
            Ok(()) => report.purged.push(table.identity.clone()),
            Err(e) => report.failures.push(PurgeFailure {
                table: table.identity.clone(),
                reason: format!("{:#}", e),
            }),
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FieldSpec, ForeignRef, ScalarSpec, ScalarType, TableSchema};
    use anyhow::{bail, Result};
    use serde_json::json;

    #[derive(Default)]
    struct RecordingSink {
        log: Vec<String>,
        reject: Option<&'static str>,
    }

    impl RowSink for RecordingSink {
        fn insert(&mut self, table: &str, row: &RowRecord) -> Result<()> {
            if Some(table) == self.reject && row.get("n") == Some(&json!(1)) {
                bail!("constraint violation");
            }
            self.log.push(format!("insert {}", table));
            Ok(())
        }

        fn delete_all(&mut self, table: &str) -> Result<()> {
            if Some(table) == self.reject {
                bail!("permission denied");
            }
            self.log.push(format!("delete {}", table));
            Ok(())
        }
    }

    fn graph() -> SchemaGraph {
        let int = || FieldSpec::Scalar(ScalarSpec::new(ScalarType::Integer));
        SchemaGraph::build(
            vec![
                TableSchema::new("users").field("id", int()).protected(),
                TableSchema::new("A").field("n", int()),
                TableSchema::new("B")
                    .field("a", FieldSpec::ForeignRef(ForeignRef::new("A")))
                    .field("u", FieldSpec::ForeignRef(ForeignRef::new("users"))),
            ]
            .into_iter()
            .collect(),
        )
    }

    fn row(n: i64) -> RowRecord {
        RowRecord::from_map(json!({ "n": n }).as_object().unwrap().clone())
    }

    #[test]
    fn test_flush_in_order_and_continue_on_failure() {
        let graph = graph();
        let order = graph.topo_sort().unwrap();
        let mut store = FixtureStore::new();
        store.push("B", row(0));
        for n in 0..3 {
            store.push("A", row(n));
        }

        let mut sink = RecordingSink {
            reject: Some("A"),
            ..Default::default()
        };
        let report = flush(&store, &graph, &order, &mut sink, None);

        assert_eq!(sink.log, vec!["insert A", "insert A", "insert B"]);
        assert_eq!(report.stats("A").map(|s| (s.attempted, s.inserted)), Some((3, 2)));
        assert_eq!(report.stats("B").map(|s| (s.attempted, s.inserted)), Some((1, 1)));
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].row.get("n"), Some(&json!(1)));
        assert!(report.errors[0].reason.contains("constraint"));
        assert_eq!(report.attempted(), 4);
        assert_eq!(report.inserted(), 3);
    }

    #[test]
    fn test_purge_reverse_order_skips_protected() {
        let graph = graph();
        let order = graph.topo_sort().unwrap();
        let mut sink = RecordingSink::default();

        let report = purge(&graph, &order, &mut sink);

        assert_eq!(sink.log, vec!["delete B", "delete A"]);
        assert_eq!(report.purged, vec!["B", "A"]);
        assert!(report.failures.is_empty());
    }

    #[test]
    fn test_purge_failure_does_not_stop() {
        let graph = graph();
        let order = graph.topo_sort().unwrap();
        let mut sink = RecordingSink {
            reject: Some("B"),
            ..Default::default()
        };

        let report = purge(&graph, &order, &mut sink);

        assert_eq!(report.purged, vec!["A"]);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].table, "B");
    }
}
