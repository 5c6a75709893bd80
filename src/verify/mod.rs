//! Verify module for fixture-store soundness checking.
//!
//! Checks run against a populated store:
//! - insertion order: every referenced table comes before its referencing tables
//! - FK integrity: each reference value is a key of a parent row present when
//!   the row was synthesized (earlier rows for self-references, fetched keys
//!   for protected tables)
//! - unset references: reference fields left out of a row

use crate::fixture::FixtureStore;
use crate::schema::{Field, FieldSpec, ForeignRef, SchemaGraph, TableId};
use crate::synth::{ReferenceResolver, RowRecord};
use ahash::{AHashMap, AHashSet};
use serde::Serialize;
use serde_json::Value;
use std::fmt;

/// Maximum number of issues to collect
const MAX_ISSUES: usize = 1000;

/// Issue severity level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "ERROR"),
            Severity::Warning => write!(f, "WARNING"),
        }
    }
}

/// A problem found in the fixture store
#[derive(Debug, Clone, Serialize, schemars::JsonSchema)]
pub struct VerifyIssue {
    pub code: &'static str,
    pub severity: Severity,
    pub message: String,
    pub table: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub row: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl VerifyIssue {
    fn error(code: &'static str, table: &str, message: impl Into<String>) -> Self {
        Self {
            code,
            severity: Severity::Error,
            message: message.into(),
            table: table.to_string(),
            row: None,
            field: None,
        }
    }

    fn warning(code: &'static str, table: &str, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            ..Self::error(code, table, message)
        }
    }

    fn at(mut self, row: usize, field: &str) -> Self {
        self.row = Some(row);
        self.field = Some(field.to_string());
        self
    }
}

impl fmt::Display for VerifyIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}] table={}", self.severity, self.code, self.table)?;
        if let Some(row) = self.row {
            write!(f, " row={}", row)?;
        }
        if let Some(ref field) = self.field {
            write!(f, " field={}", field)?;
        }
        write!(f, ": {}", self.message)
    }
}

#[derive(Debug, Clone, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    Ok,
    Failed(usize),
}

impl fmt::Display for CheckStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CheckStatus::Ok => write!(f, "OK"),
            CheckStatus::Failed(n) => write!(f, "{} issues", n),
        }
    }
}

impl CheckStatus {
    fn from_count(n: usize) -> Self {
        if n == 0 {
            CheckStatus::Ok
        } else {
            CheckStatus::Failed(n)
        }
    }
}

#[derive(Debug, Clone, Serialize, schemars::JsonSchema)]
pub struct VerifyStats {
    pub errors: usize,
    pub warnings: usize,
    pub tables_checked: usize,
    pub rows_checked: usize,
    pub references_checked: usize,
    /// References into protected tables whose keys were never fetched
    pub references_unverified: usize,
}

#[derive(Debug, Clone, Serialize, schemars::JsonSchema)]
pub struct VerifyChecks {
    pub order: CheckStatus,
    pub fk_integrity: CheckStatus,
    pub unset_references: CheckStatus,
}

/// Verification summary with collected issues
#[derive(Debug, Clone, Serialize, schemars::JsonSchema)]
pub struct VerifySummary {
    pub issues: Vec<VerifyIssue>,
    pub summary: VerifyStats,
    pub checks: VerifyChecks,
}

impl VerifySummary {
    pub fn has_errors(&self) -> bool {
        self.summary.errors > 0
    }

    pub fn has_warnings(&self) -> bool {
        self.summary.warnings > 0
    }
}

/// Parent keys of one (table, key) pair: rendered key → first row index
type KeyIndex = AHashMap<String, usize>;

struct Verifier<'a> {
    graph: &'a SchemaGraph,
    store: &'a FixtureStore,
    protected_keys: AHashMap<(String, String), Option<AHashSet<String>>>,
    key_indexes: AHashMap<(String, String), KeyIndex>,
    issues: Vec<VerifyIssue>,
    errors: usize,
    warnings: usize,
    order_errors: usize,
    fk_errors: usize,
    unset: usize,
    rows_checked: usize,
    references_checked: usize,
    references_unverified: usize,
}

/// Verify `store` against `graph` and the insertion `order`.
///
/// `resolver` supplies the keys fetched for protected tables during the run.
pub fn verify(
    graph: &SchemaGraph,
    order: &[TableId],
    store: &FixtureStore,
    resolver: &ReferenceResolver<'_>,
) -> VerifySummary {
    let mut verifier = Verifier {
        graph,
        store,
        protected_keys: AHashMap::new(),
        key_indexes: AHashMap::new(),
        issues: Vec::new(),
        errors: 0,
        warnings: 0,
        order_errors: 0,
        fk_errors: 0,
        unset: 0,
        rows_checked: 0,
        references_checked: 0,
        references_unverified: 0,
    };

    verifier.check_order(order);

    let mut tables_checked = 0;
    for table in graph.schema.iter() {
        if table.protected {
            continue;
        }
        for (_, fk) in table.foreign_refs() {
            if resolver.is_protected(&fk.table) {
                let keys = resolver.cached_keys(&fk.table, &fk.key).map(|keys| {
                    keys.iter().map(render_key).collect::<AHashSet<String>>()
                });
                verifier
                    .protected_keys
                    .insert((fk.table.to_lowercase(), fk.key.clone()), keys);
            }
        }

        tables_checked += 1;
        for (index, row) in store.rows(&table.identity).iter().enumerate() {
            verifier.rows_checked += 1;
            verifier.check_row(&table.identity, &table.fields, index, row);
        }
    }

    VerifySummary {
        summary: VerifyStats {
            errors: verifier.errors,
            warnings: verifier.warnings,
            tables_checked,
            rows_checked: verifier.rows_checked,
            references_checked: verifier.references_checked,
            references_unverified: verifier.references_unverified,
        },
        checks: VerifyChecks {
            order: CheckStatus::from_count(verifier.order_errors),
            fk_integrity: CheckStatus::from_count(verifier.fk_errors),
            unset_references: CheckStatus::from_count(verifier.unset),
        },
        issues: verifier.issues,
    }
}

impl<'a> Verifier<'a> {
    /// Count every issue; keep only the first `MAX_ISSUES`
    fn add_issue(&mut self, issue: VerifyIssue) {
        match issue.severity {
            Severity::Error => self.errors += 1,
            Severity::Warning => self.warnings += 1,
        }
        if self.issues.len() < MAX_ISSUES {
            self.issues.push(issue);
        }
    }

    fn check_order(&mut self, order: &[TableId]) {
        let position: AHashMap<TableId, usize> =
            order.iter().enumerate().map(|(i, &id)| (id, i)).collect();

        for (parent, child) in self.graph.edges() {
            let parent_name = self.graph.table_name(parent).unwrap_or_default().to_string();
            let child_name = self.graph.table_name(child).unwrap_or_default().to_string();
            match (position.get(&parent), position.get(&child)) {
                (Some(p), Some(c)) if p < c => {}
                (Some(_), Some(_)) => {
                    self.order_errors += 1;
                    self.add_issue(VerifyIssue::error(
                        "ORDER",
                        &child_name,
                        format!("ordered before its parent {}", parent_name),
                    ));
                }
                _ => {
                    self.order_errors += 1;
                    let missing = if position.contains_key(&parent) {
                        child_name.clone()
                    } else {
                        parent_name
                    };
                    self.add_issue(VerifyIssue::error(
                        "ORDER_MISSING",
                        &missing,
                        "table missing from insertion order",
                    ));
                }
            }
        }
    }

    fn check_row(&mut self, table: &str, fields: &[Field], index: usize, row: &RowRecord) {
        for field in fields {
            self.check_value(table, &field.spec, row.get(&field.name), &field.name, index);
        }
    }

    fn check_value(
        &mut self,
        table: &str,
        spec: &FieldSpec,
        value: Option<&Value>,
        path: &str,
        index: usize,
    ) {
        match spec {
            FieldSpec::ForeignRef(fk) => self.check_reference(table, fk, value, path, index),
            FieldSpec::Object(fields) => {
                if let Some(Value::Object(map)) = value {
                    for field in fields {
                        let nested = format!("{}.{}", path, field.name);
                        self.check_value(table, &field.spec, map.get(&field.name), &nested, index);
                    }
                }
            }
            FieldSpec::Array(array) => {
                if let Some(Value::Array(elements)) = value {
                    if array.items.is_empty() {
                        return;
                    }
                    let element_path = format!("{}[]", path);
                    for (i, element) in elements.iter().enumerate() {
                        let shape = &array.items[i % array.items.len()];
                        self.check_value(table, shape, Some(element), &element_path, index);
                    }
                }
            }
            FieldSpec::Scalar(_) | FieldSpec::Generated => {}
        }
    }

    fn check_reference(
        &mut self,
        table: &str,
        fk: &ForeignRef,
        value: Option<&Value>,
        path: &str,
        index: usize,
    ) {
        let protected_key = (fk.table.to_lowercase(), fk.key.clone());
        let protected = self.protected_keys.contains_key(&protected_key);
        // Unprotected references outside the schema set cannot be checked
        if !protected && self.graph.schema.get_table_id(&fk.table).is_none() {
            return;
        }

        let Some(value) = value else {
            self.unset += 1;
            self.add_issue(
                VerifyIssue::warning(
                    "FK_UNSET",
                    table,
                    format!("reference to {}.{} was left unset", fk.table, fk.key),
                )
                .at(index, path),
            );
            return;
        };

        self.references_checked += 1;
        let rendered = render_key(value);

        let known = if let Some(keys) = self.protected_keys.get(&protected_key) {
            match keys {
                Some(keys) => keys.contains(&rendered),
                None => {
                    self.references_unverified += 1;
                    return;
                }
            }
        } else {
            let self_reference = fk.table.eq_ignore_ascii_case(table);
            match self.key_index(&fk.table, &fk.key).get(&rendered) {
                Some(&first) => !self_reference || first < index,
                None => false,
            }
        };

        if !known {
            self.fk_errors += 1;
            self.add_issue(
                VerifyIssue::error(
                    "FK_MISSING_PARENT",
                    table,
                    format!("{} is not a key of {}.{}", rendered, fk.table, fk.key),
                )
                .at(index, path),
            );
        }
    }

    fn key_index(&mut self, table: &str, key: &str) -> &KeyIndex {
        let store = self.store;
        self.key_indexes
            .entry((table.to_lowercase(), key.to_string()))
            .or_insert_with(|| {
                let mut index = KeyIndex::new();
                for (i, row) in store.rows(table).iter().enumerate() {
                    if let Some(value) = row.get(key) {
                        index.entry(render_key(value)).or_insert(i);
                    }
                }
                index
            })
    }
}

fn render_key(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{NoLookup, StaticLookup};
    use crate::schema::{ArraySpec, ScalarSpec, ScalarType, TableSchema};
    use serde_json::json;

    fn int() -> FieldSpec {
        FieldSpec::Scalar(ScalarSpec::new(ScalarType::Integer))
    }

    fn fk(table: &str) -> FieldSpec {
        FieldSpec::ForeignRef(ForeignRef::new(table))
    }

    fn row(value: Value) -> RowRecord {
        RowRecord::from_map(value.as_object().unwrap().clone())
    }

    fn graph() -> SchemaGraph {
        SchemaGraph::build(
            vec![
                TableSchema::new("A").field("id", int()),
                TableSchema::new("B").field("id", int()).field("a_id", fk("A")).field(
                    "a_ids",
                    FieldSpec::Array(ArraySpec {
                        items: vec![fk("A")],
                        count: None,
                    }),
                ),
            ]
            .into_iter()
            .collect(),
        )
    }

    #[test]
    fn test_sound_store_passes() {
        let graph = graph();
        let order = graph.topo_sort().unwrap();
        let mut store = FixtureStore::new();
        store.push("A", row(json!({ "id": 1 })));
        store.push("A", row(json!({ "id": 2 })));
        store.push("B", row(json!({ "id": 10, "a_id": 1, "a_ids": [1, 2] })));

        let mut lookup = NoLookup;
        let resolver = ReferenceResolver::new(&mut lookup);
        let summary = verify(&graph, &order, &store, &resolver);

        assert!(!summary.has_errors(), "{:?}", summary.issues);
        assert!(!summary.has_warnings());
        assert_eq!(summary.summary.references_checked, 3);
        assert_eq!(summary.summary.rows_checked, 3);
    }

    #[test]
    fn test_dangling_and_unset_references() {
        let graph = graph();
        let order = graph.topo_sort().unwrap();
        let mut store = FixtureStore::new();
        store.push("A", row(json!({ "id": 1 })));
        store.push("B", row(json!({ "id": 10, "a_ids": [1, 99] })));

        let mut lookup = NoLookup;
        let resolver = ReferenceResolver::new(&mut lookup);
        let summary = verify(&graph, &order, &store, &resolver);

        assert_eq!(summary.summary.errors, 1);
        assert_eq!(summary.summary.warnings, 1);
        let dangling = summary
            .issues
            .iter()
            .find(|i| i.code == "FK_MISSING_PARENT")
            .unwrap();
        assert_eq!(dangling.field.as_deref(), Some("a_ids[]"));
        assert_eq!(dangling.row, Some(0));
        assert!(matches!(summary.checks.fk_integrity, CheckStatus::Failed(1)));
        assert!(matches!(summary.checks.unset_references, CheckStatus::Failed(1)));
    }

    #[test]
    fn test_wrong_order_is_reported() {
        let graph = graph();
        let mut order = graph.topo_sort().unwrap();
        order.reverse();
        let store = FixtureStore::new();
        let mut lookup = NoLookup;
        let resolver = ReferenceResolver::new(&mut lookup);

        let summary = verify(&graph, &order, &store, &resolver);
        assert!(matches!(summary.checks.order, CheckStatus::Failed(1)));
        assert_eq!(summary.issues[0].code, "ORDER");
    }

    #[test]
    fn test_self_reference_must_point_backwards() {
        let graph = SchemaGraph::build(
            vec![TableSchema::new("cat").field("id", int()).field("parent", fk("cat"))]
                .into_iter()
                .collect(),
        );
        let order = graph.topo_sort().unwrap();
        let mut store = FixtureStore::new();
        store.push("cat", row(json!({ "id": 1 })));
        store.push("cat", row(json!({ "id": 2, "parent": 1 })));
        store.push("cat", row(json!({ "id": 3, "parent": 3 })));

        let mut lookup = NoLookup;
        let resolver = ReferenceResolver::new(&mut lookup);
        let summary = verify(&graph, &order, &store, &resolver);

        let codes: Vec<(&str, Option<usize>)> =
            summary.issues.iter().map(|i| (i.code, i.row)).collect();
        assert_eq!(
            codes,
            vec![("FK_UNSET", Some(0)), ("FK_MISSING_PARENT", Some(2))]
        );
    }

    #[test]
    fn test_protected_keys_from_resolver() {
        let graph = SchemaGraph::build(
            vec![
                TableSchema::new("auth.users").field("id", int()).protected(),
                TableSchema::new("C").field("user_id", fk("auth.users")),
            ]
            .into_iter()
            .collect(),
        );
        let order = graph.topo_sort().unwrap();
        let mut store = FixtureStore::new();
        store.push("C", row(json!({ "user_id": "u1" })));
        store.push("C", row(json!({ "user_id": "ghost" })));

        let mut lookup = StaticLookup::new().with_keys("auth.users", vec![json!("u0"), json!("u1")]);
        let mut resolver = ReferenceResolver::new(&mut lookup).with_protected(["auth.users"]);

        let unverified = verify(&graph, &order, &store, &resolver);
        assert_eq!(unverified.summary.references_unverified, 2);
        assert!(!unverified.has_errors());

        resolver.existing_keys("auth.users", "id").unwrap();
        let summary = verify(&graph, &order, &store, &resolver);
        assert_eq!(summary.summary.errors, 1);
        assert_eq!(summary.issues[0].row, Some(1));
    }

    #[test]
    fn test_protected_table_outside_set_is_checked() {
        let graph = SchemaGraph::build(
            vec![TableSchema::new("C").field("user_id", fk("auth.users"))]
                .into_iter()
                .collect(),
        );
        let order = graph.topo_sort().unwrap();
        let mut store = FixtureStore::new();
        store.push("C", row(json!({ "user_id": "u0" })));
        store.push("C", row(json!({ "user_id": "ghost" })));
        store.push("C", row(json!({})));

        let mut lookup = StaticLookup::new().with_keys("auth.users", vec![json!("u0"), json!("u1")]);
        let mut resolver = ReferenceResolver::new(&mut lookup).with_protected(["auth.users"]);
        resolver.existing_keys("auth.users", "id").unwrap();

        let summary = verify(&graph, &order, &store, &resolver);
        assert_eq!(summary.summary.references_checked, 2);
        assert_eq!(summary.summary.references_unverified, 0);
        assert_eq!(summary.summary.errors, 1);
        assert_eq!(summary.summary.warnings, 1);
        let codes: Vec<(&str, Option<usize>)> =
            summary.issues.iter().map(|i| (i.code, i.row)).collect();
        assert_eq!(
            codes,
            vec![("FK_MISSING_PARENT", Some(1)), ("FK_UNSET", Some(2))]
        );
    }

    #[test]
    fn test_totals_count_issues_past_the_cap() {
        let graph = graph();
        let order = graph.topo_sort().unwrap();
        let mut store = FixtureStore::new();
        store.push("A", row(json!({ "id": 1 })));
        for i in 0..(MAX_ISSUES + 200) {
            store.push("B", row(json!({ "id": i })));
        }

        let mut lookup = NoLookup;
        let resolver = ReferenceResolver::new(&mut lookup);
        let summary = verify(&graph, &order, &store, &resolver);

        assert_eq!(summary.issues.len(), MAX_ISSUES);
        assert_eq!(summary.summary.warnings, MAX_ISSUES + 200);
        assert!(matches!(
            summary.checks.unset_references,
            CheckStatus::Failed(n) if n == MAX_ISSUES + 200
        ));
    }
}
