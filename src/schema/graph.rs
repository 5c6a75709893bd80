//! Schema dependency graph for FK-aware fixture synthesis.
//!
//! Provides:
//! - Dependency graph construction from foreign references at any depth
//! - Cycle detection with the offending path
//! - Topological sorting for insertion order (and its reverse for purging)

use super::{walk_foreign_refs, SchemaSet, TableId};
use std::fmt;

/// A foreign reference to a table outside the schema set
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalReference {
    /// Table holding the reference
    pub owner: TableId,
    /// Dotted path of the referencing field
    pub field: String,
    /// Identity of the unknown referenced table
    pub target: String,
}

/// The dependency graph has a cycle, so no insertion order exists
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleError {
    /// Tables along the cycle; the first table is repeated at the end
    pub path: Vec<String>,
}

impl fmt::Display for CycleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "circular foreign-key dependency: {}",
            self.path.join(" -> ")
        )
    }
}

impl std::error::Error for CycleError {}

/// Schema dependency graph built from foreign references.
///
/// The graph represents parent → child relationships where:
/// - A parent is a table referenced by another table's foreign reference
/// - A child is a table holding a foreign reference to another table
///
/// Self-references are kept out of the edge lists; see `self_referencing`.
#[derive(Debug)]
pub struct SchemaGraph {
    /// The underlying schemas
    pub schema: SchemaSet,
    /// For each table, the tables it references
    pub parents: Vec<Vec<TableId>>,
    /// For each table, the tables referencing it
    pub children: Vec<Vec<TableId>>,
    /// Tables with a foreign reference to themselves
    pub self_referencing: Vec<TableId>,
    /// References to tables outside the set, skipped from the graph
    pub external_refs: Vec<ExternalReference>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum VisitState {
    Unvisited,
    InProgress,
    Finished,
}

impl SchemaGraph {
    /// Build a dependency graph from a schema set
    pub fn build(schema: SchemaSet) -> Self {
        let n = schema.len();
        let mut parents: Vec<Vec<TableId>> = vec![Vec::new(); n];
        let mut children: Vec<Vec<TableId>> = vec![Vec::new(); n];
        let mut self_referencing = Vec::new();
        let mut external_refs = Vec::new();

        for table in schema.iter() {
            let child_id = table.id;

            walk_foreign_refs(&table.fields, &mut |path, fk| {
                let Some(parent_id) = schema.get_table_id(&fk.table) else {
                    external_refs.push(ExternalReference {
                        owner: child_id,
                        field: path.to_string(),
                        target: fk.table.clone(),
                    });
                    return;
                };

                if parent_id == child_id {
                    if !self_referencing.contains(&child_id) {
                        self_referencing.push(child_id);
                    }
                    return;
                }

                if !parents[child_id.0 as usize].contains(&parent_id) {
                    parents[child_id.0 as usize].push(parent_id);
                }
                if !children[parent_id.0 as usize].contains(&child_id) {
                    children[parent_id.0 as usize].push(child_id);
                }
            });
        }

        Self {
            schema,
            parents,
            children,
            self_referencing,
            external_refs,
        }
    }

    /// Get the number of tables in the graph
    pub fn len(&self) -> usize {
        self.schema.len()
    }

    /// Check if the graph is empty
    pub fn is_empty(&self) -> bool {
        self.schema.is_empty()
    }

    /// Get the table identity for a table ID
    pub fn table_name(&self, id: TableId) -> Option<&str> {
        self.schema.table(id).map(|t| t.identity.as_str())
    }

    /// Table identities for a sequence of IDs
    pub fn names(&self, ids: &[TableId]) -> Vec<String> {
        ids.iter()
            .filter_map(|&id| self.table_name(id).map(str::to_string))
            .collect()
    }

    /// All edges as (referenced, referencing) pairs
    pub fn edges(&self) -> Vec<(TableId, TableId)> {
        self.children
            .iter()
            .enumerate()
            .flat_map(|(parent, children)| {
                children
                    .iter()
                    .map(move |&child| (TableId(parent as u32), child))
            })
            .collect()
    }

    /// Check if a table references itself
    pub fn has_self_reference(&self, id: TableId) -> bool {
        self.self_referencing.contains(&id)
    }

    /// Topological sort using depth-first search.
    ///
    /// Nodes are started in input order and children are followed in edge
    /// insertion order, so the result is stable for a given input. A node is
    /// emitted after all of its descendants finish; the returned order is the
    /// reverse of finish order, which puts every parent before its children.
    pub fn topo_sort(&self) -> Result<Vec<TableId>, CycleError> {
        let n = self.len();
        let mut state = vec![VisitState::Unvisited; n];
        let mut finished = Vec::with_capacity(n);
        let mut path = Vec::new();

        for start in 0..n {
            if state[start] == VisitState::Unvisited {
                self.visit(TableId(start as u32), &mut state, &mut path, &mut finished)?;
            }
        }

        finished.reverse();
        Ok(finished)
    }

    fn visit(
        &self,
        id: TableId,
        state: &mut [VisitState],
        path: &mut Vec<TableId>,
        finished: &mut Vec<TableId>,
    ) -> Result<(), CycleError> {
        state[id.0 as usize] = VisitState::InProgress;
        path.push(id);

        for &child in &self.children[id.0 as usize] {
            match state[child.0 as usize] {
                VisitState::Finished => {}
                VisitState::InProgress => return Err(self.cycle_error(path, child)),
                VisitState::Unvisited => self.visit(child, state, path, finished)?,
            }
        }

        path.pop();
        state[id.0 as usize] = VisitState::Finished;
        finished.push(id);
        Ok(())
    }

    fn cycle_error(&self, path: &[TableId], back_to: TableId) -> CycleError {
        let start = path.iter().position(|&id| id == back_to).unwrap_or(0);
        let mut ids: Vec<TableId> = path[start..].to_vec();
        ids.push(back_to);
        CycleError {
            path: self.names(&ids),
        }
    }

    /// Order for deleting fixture rows: children before parents
    pub fn purge_order(&self) -> Result<Vec<TableId>, CycleError> {
        let mut order = self.topo_sort()?;
        order.reverse();
        Ok(order)
    }

    /// Get root tables (tables with no parents/dependencies)
    pub fn root_tables(&self) -> Vec<TableId> {
        self.parents
            .iter()
            .enumerate()
            .filter(|(_, parents)| parents.is_empty())
            .map(|(i, _)| TableId(i as u32))
            .collect()
    }

    /// Get leaf tables (tables with no children/dependents)
    pub fn leaf_tables(&self) -> Vec<TableId> {
        self.children
            .iter()
            .enumerate()
            .filter(|(_, children)| children.is_empty())
            .map(|(i, _)| TableId(i as u32))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ArraySpec, Field, FieldSpec, ForeignRef, TableSchema};

    fn fk(table: &str) -> FieldSpec {
        FieldSpec::ForeignRef(ForeignRef::new(table))
    }

    fn graph(tables: Vec<TableSchema>) -> SchemaGraph {
        SchemaGraph::build(tables.into_iter().collect())
    }

    #[test]
    fn test_parent_before_child() {
        let g = graph(vec![
            TableSchema::new("B").field("a_id", fk("A")),
            TableSchema::new("A"),
        ]);
        let order = g.names(&g.topo_sort().unwrap());
        assert_eq!(order, vec!["A", "B"]);
    }

    #[test]
    fn test_duplicate_edges_collapse() {
        let g = graph(vec![
            TableSchema::new("A"),
            TableSchema::new("B")
                .field("created_by", fk("A"))
                .field("updated_by", fk("A"))
                .field(
                    "meta",
                    FieldSpec::Object(vec![Field::new("owner", fk("A"))]),
                ),
        ]);
        assert_eq!(g.edges(), vec![(TableId(0), TableId(1))]);
        assert_eq!(g.parents[1], vec![TableId(0)]);
    }

    #[test]
    fn test_nested_array_shapes_add_edges() {
        let g = graph(vec![
            TableSchema::new("images"),
            TableSchema::new("files"),
            TableSchema::new("posts").field(
                "attachments",
                FieldSpec::Array(ArraySpec {
                    items: vec![fk("images"), fk("files")],
                    count: None,
                }),
            ),
        ]);
        assert_eq!(g.parents[2], vec![TableId(0), TableId(1)]);
        let order = g.names(&g.topo_sort().unwrap());
        assert_eq!(order.last().map(String::as_str), Some("posts"));
    }

    #[test]
    fn test_external_reference_is_skipped() {
        let g = graph(vec![
            TableSchema::new("public.posts")
                .field("author_id", fk("auth.users"))
                .field("category_id", fk("public.categories")),
            TableSchema::new("public.categories"),
        ]);
        assert_eq!(
            g.external_refs,
            vec![ExternalReference {
                owner: TableId(0),
                field: "author_id".to_string(),
                target: "auth.users".to_string(),
            }]
        );
        let order = g.names(&g.topo_sort().unwrap());
        assert_eq!(order, vec!["public.categories", "public.posts"]);
    }

    #[test]
    fn test_self_reference_is_not_a_cycle() {
        let g = graph(vec![TableSchema::new("categories").field("parent_id", fk("categories"))]);
        assert!(g.has_self_reference(TableId(0)));
        assert!(g.edges().is_empty());
        assert_eq!(g.topo_sort().unwrap(), vec![TableId(0)]);
    }

    #[test]
    fn test_two_table_cycle() {
        let g = graph(vec![
            TableSchema::new("A").field("b_id", fk("B")),
            TableSchema::new("B").field("a_id", fk("A")),
        ]);
        let err = g.topo_sort().unwrap_err();
        assert!(err.path.contains(&"A".to_string()) || err.path.contains(&"B".to_string()));
        assert_eq!(err.path.first(), err.path.last());
        assert_eq!(err.to_string(), "circular foreign-key dependency: A -> B -> A");
    }

    #[test]
    fn test_cycle_path_excludes_prefix() {
        // root -> x -> y -> z -> x
        let g = graph(vec![
            TableSchema::new("root"),
            TableSchema::new("x").field("root_id", fk("root")).field("z_id", fk("z")),
            TableSchema::new("y").field("x_id", fk("x")),
            TableSchema::new("z").field("y_id", fk("y")),
        ]);
        let err = g.topo_sort().unwrap_err();
        assert_eq!(err.path, vec!["x", "y", "z", "x"]);
    }

    #[test]
    fn test_isolated_tables_appear_once() {
        let g = graph(vec![
            TableSchema::new("lonely"),
            TableSchema::new("A"),
            TableSchema::new("B").field("a_id", fk("A")),
            TableSchema::new("also_lonely"),
        ]);
        let order = g.topo_sort().unwrap();
        assert_eq!(order.len(), 4);
        let mut sorted = order.clone();
        sorted.sort();
        sorted.dedup();
        assert_eq!(sorted.len(), 4);
        assert_eq!(order, g.topo_sort().unwrap());
    }

    #[test]
    fn test_purge_order_is_reverse() {
        let g = graph(vec![
            TableSchema::new("A"),
            TableSchema::new("B").field("a_id", fk("A")),
            TableSchema::new("C").field("b_id", fk("B")),
        ]);
        assert_eq!(g.names(&g.purge_order().unwrap()), vec!["C", "B", "A"]);
    }

    #[test]
    fn test_roots_and_leaves() {
        let g = graph(vec![
            TableSchema::new("A"),
            TableSchema::new("B").field("a_id", fk("A")),
        ]);
        assert_eq!(g.root_tables(), vec![TableId(0)]);
        assert_eq!(g.leaf_tables(), vec![TableId(1)]);
    }
}
