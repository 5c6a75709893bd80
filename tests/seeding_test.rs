//! Library-level seeding scenarios: ordering, protected tables, cycles and
//! reference soundness on generated schema sets.

use fixture_seeder::config::SeedYamlConfig;
use fixture_seeder::db::{KeyLookup, NoLookup, RowSink, StaticLookup};
use fixture_seeder::fixture::PopulateStatus;
use fixture_seeder::schema::{CycleError, JsonSchemaValues};
use fixture_seeder::seeder::{self, Plan, SeedOptions, SeedSummary};
use fixture_seeder::synth::RowRecord;
use schema_gen::{blog, chain, cycle, Generator, Shape};
use serde_json::{json, Value};

/// Sink that keeps inserted rows in memory
#[derive(Default)]
struct MemorySink {
    rows: Vec<(String, RowRecord)>,
}

impl MemorySink {
    fn rows_of(&self, table: &str) -> Vec<&RowRecord> {
        self.rows
            .iter()
            .filter(|(t, _)| t == table)
            .map(|(_, r)| r)
            .collect()
    }
}

impl RowSink for MemorySink {
    fn insert(&mut self, table: &str, row: &RowRecord) -> anyhow::Result<()> {
        self.rows.push((table.to_string(), row.clone()));
        Ok(())
    }

    fn delete_all(&mut self, table: &str) -> anyhow::Result<()> {
        self.rows.retain(|(t, _)| t != table);
        Ok(())
    }
}

fn options(rows: usize) -> SeedOptions {
    SeedOptions {
        rows,
        seed: Some(42),
        ..SeedOptions::default()
    }
}

fn run(
    docs: Vec<Value>,
    protected: &[String],
    rows: usize,
    lookup: &mut dyn KeyLookup,
) -> (Plan, MemorySink, SeedSummary) {
    let plan = Plan::load(&JsonSchemaValues::new(docs), protected).unwrap();
    let opts = options(rows);
    let synthesis = seeder::synthesize(&plan, &opts, &SeedYamlConfig::default(), lookup).unwrap();
    let mut sink = MemorySink::default();
    let report = seeder::write(&plan, &synthesis, &opts, &mut sink).unwrap();
    let summary = SeedSummary::new(&plan, &synthesis, Some(&report));
    (plan, sink, summary)
}

// =============================================================================
// Ordering
// =============================================================================

#[test]
fn test_parent_inserted_before_child() {
    let docs = vec![
        json!({ "title": "B", "properties": {
            "id": { "type": "integer" },
            "a_id": { "type": "integer", "x-foreign-table": "A" }
        } }),
        json!({ "title": "A", "properties": { "id": { "type": "integer" } } }),
    ];
    let (plan, sink, summary) = run(docs, &[], 3, &mut NoLookup);

    assert_eq!(plan.order_names(), vec!["A", "B"]);
    assert_eq!(sink.rows[0].0, "A");
    assert_eq!(sink.rows[3].0, "B");

    let a_ids: Vec<&Value> = sink.rows_of("A").iter().map(|r| r.get("id").unwrap()).collect();
    for (i, row) in sink.rows_of("B").iter().enumerate() {
        assert_eq!(row.get("a_id").unwrap(), a_ids[i % a_ids.len()]);
    }
    assert_eq!(summary.totals.warnings, 0);
}

#[test]
fn test_chain_order_reverses_input() {
    let plan = Plan::load(&JsonSchemaValues::new(chain(6)), &[]).unwrap();
    assert_eq!(
        plan.order_names(),
        vec!["public.t0", "public.t1", "public.t2", "public.t3", "public.t4", "public.t5"]
    );
    assert_eq!(plan.purge_names()[0], "public.t5");
}

#[test]
fn test_generated_sets_respect_every_edge() {
    for seed in [1, 2, 3, 4, 5] {
        let docs = Generator::new(seed, Shape::medium()).generate();
        let plan = Plan::load(&JsonSchemaValues::new(docs), &[]).unwrap();
        assert_eq!(plan.order.len(), Shape::medium().tables);

        let position = |id| plan.order.iter().position(|t| *t == id).unwrap();
        for (parent, child) in plan.graph.edges() {
            assert!(
                position(parent) < position(child),
                "seed {}: {:?} must come before {:?}",
                seed,
                plan.graph.table_name(parent),
                plan.graph.table_name(child)
            );
        }
    }
}

#[test]
fn test_dropping_root_tables_keeps_set_sortable() {
    let docs = Generator::new(9, Shape::medium()).generate();
    let full = Plan::load(&JsonSchemaValues::new(docs.clone()), &[]).unwrap();
    let roots = full.graph.names(&full.graph.root_tables());
    assert!(!roots.is_empty());

    let rest: Vec<Value> = docs
        .into_iter()
        .filter(|d| !roots.iter().any(|r| d["title"] == r.as_str()))
        .collect();
    let plan = Plan::load(&JsonSchemaValues::new(rest), &[]).unwrap();
    assert_eq!(plan.order.len(), Shape::medium().tables - roots.len());
    assert!(plan
        .graph
        .external_refs
        .iter()
        .all(|r| roots.contains(&r.target)));
}

// =============================================================================
// Protected tables
// =============================================================================

#[test]
fn test_protected_keys_reused_and_last_key_repeated() {
    let docs = vec![
        json!({ "title": "auth.users", "properties": { "id": { "type": "string" } } }),
        json!({ "title": "public.c", "properties": {
            "user_id": { "type": "string", "x-foreign-table": "auth.users" }
        } }),
    ];
    let mut lookup = StaticLookup::new().with_keys(
        "auth.users",
        vec![json!("u0"), json!("u1"), json!("u2")],
    );
    let (_, sink, summary) = run(docs, &["auth.users".to_string()], 5, &mut lookup);

    assert!(sink.rows_of("auth.users").is_empty());
    let refs: Vec<&Value> = sink
        .rows_of("public.c")
        .iter()
        .map(|r| r.get("user_id").unwrap())
        .collect();
    assert_eq!(refs, vec!["u0", "u1", "u2", "u2", "u2"]);

    let users = summary.tables.iter().find(|t| t.table == "auth.users").unwrap();
    assert_eq!(users.status, PopulateStatus::Protected);
    assert_eq!(users.generated, 0);
    assert_eq!(users.attempted, 0);
}

#[test]
fn test_protected_table_without_schema_uses_existing_keys() {
    let docs = vec![json!({ "title": "C", "properties": {
        "user_id": { "type": "string", "x-foreign-table": "auth.users" }
    } })];
    let plan = Plan::load(&JsonSchemaValues::new(docs), &["auth.users".to_string()]).unwrap();
    assert_eq!(plan.protected_names(), vec!["auth.users"]);
    assert_eq!(plan.graph.external_refs.len(), 1);

    let mut lookup = StaticLookup::new().with_keys("auth.users", vec![json!("u0"), json!("u1")]);
    let opts = options(5);
    let synthesis = seeder::synthesize(&plan, &opts, &SeedYamlConfig::default(), &mut lookup).unwrap();
    assert!(synthesis.populate.unresolved.is_empty());
    assert_eq!(synthesis.verify.summary.references_checked, 5);
    assert_eq!(synthesis.verify.summary.references_unverified, 0);
    assert!(!synthesis.verify.has_errors());

    let mut sink = MemorySink::default();
    let report = seeder::write(&plan, &synthesis, &opts, &mut sink).unwrap();
    let refs: Vec<&Value> = sink
        .rows_of("C")
        .iter()
        .map(|r| r.get("user_id").unwrap())
        .collect();
    assert_eq!(refs, vec!["u0", "u1", "u1", "u1", "u1"]);

    let summary = SeedSummary::new(&plan, &synthesis, Some(&report));
    assert!(summary.external_references[0].protected);
    assert_eq!(summary.totals.warnings, 0);
}

#[test]
fn test_protected_table_from_config_without_schema() {
    let config = SeedYamlConfig::parse(
        r#"
protected: [auth.users]
reference_keys:
  auth.users: [u0, u1]
"#,
    )
    .unwrap();
    let docs = vec![json!({ "title": "C", "properties": {
        "user_id": { "type": "string", "x-foreign-table": "auth.users" }
    } })];
    let plan = Plan::load(&JsonSchemaValues::new(docs), &config.protected_tables()).unwrap();

    let mut lookup = config.static_lookup();
    let synthesis = seeder::synthesize(&plan, &options(3), &config, &mut lookup).unwrap();
    let refs: Vec<&Value> = synthesis
        .store
        .rows("C")
        .iter()
        .map(|r| r.get("user_id").unwrap())
        .collect();
    assert_eq!(refs, vec!["u0", "u1", "u1"]);
    assert!(synthesis.populate.unresolved.is_empty());
}

#[test]
fn test_empty_protected_table_leaves_reference_unset() {
    let (_, sink, summary) = run(blog(), &[], 2, &mut NoLookup);

    for post in sink.rows_of("public.posts") {
        assert!(post.get("author_id").is_none());
    }
    assert!(summary
        .unresolved
        .iter()
        .any(|u| u.table == "public.posts" && u.field == "author_id"));
    assert!(!summary.has_errors());
}

// =============================================================================
// Cycles
// =============================================================================

#[test]
fn test_cycle_aborts_before_any_insert() {
    let source = JsonSchemaValues::new(cycle(2));
    let err = Plan::load(&source, &[]).unwrap_err();
    let cycle = err.downcast_ref::<CycleError>().expect("cycle error");
    assert_eq!(cycle.path.first(), cycle.path.last());
    assert!(cycle.path.iter().any(|t| t == "public.c0"));
    assert!(cycle.path.iter().any(|t| t == "public.c1"));
}

// =============================================================================
// Reference soundness
// =============================================================================

#[test]
fn test_blog_references_are_sound() {
    let mut lookup = StaticLookup::new().with_keys("auth.users", vec![json!("a"), json!("b")]);
    let (_, sink, summary) = run(blog(), &[], 4, &mut lookup);

    let post_ids: Vec<&Value> = sink
        .rows_of("public.posts")
        .iter()
        .map(|r| r.get("id").unwrap())
        .collect();
    let users = [json!("a"), json!("b")];

    let comments = sink.rows_of("public.comments");
    assert_eq!(comments.len(), 4);
    for (i, comment) in comments.iter().enumerate() {
        assert!(post_ids.contains(&comment.get("post_id").unwrap()));
        assert!(users.contains(comment.get_path("meta.editor_id").unwrap()));

        let mentions = comment.get("mentions").unwrap().as_array().unwrap();
        assert_eq!(mentions.len(), 2);
        assert!(mentions.iter().all(|m| users.contains(m)));

        // first row has no earlier sibling to point at
        match comment.get("parent_id") {
            None => assert_eq!(i, 0),
            Some(parent) => {
                let earlier: Vec<&Value> =
                    comments[..i].iter().map(|c| c.get("id").unwrap()).collect();
                assert!(earlier.contains(&parent));
            }
        }
    }

    assert_eq!(summary.unresolved.len(), 1);
    assert_eq!(summary.totals.inserted, 8);
}

#[test]
fn test_generated_set_verifies_clean() {
    let docs = Generator::new(11, Shape::small()).generate();
    let keys: Vec<Value> = (0..5).map(|i| json!(format!("k{}", i))).collect();
    let plan = Plan::load(&JsonSchemaValues::new(docs), &[]).unwrap();
    let mut lookup = StaticLookup::new().with_keys(Generator::table_name(0), keys);

    let synthesis =
        seeder::synthesize(&plan, &options(6), &SeedYamlConfig::default(), &mut lookup).unwrap();
    assert!(
        !synthesis.verify.has_errors(),
        "{:?}",
        synthesis.verify.issues
    );
    assert_eq!(
        synthesis.store.total_rows(),
        6 * (Shape::small().tables - Shape::small().protected)
    );
}

#[test]
fn test_same_seed_same_rows() {
    let first = run(blog(), &[], 3, &mut NoLookup).1;
    let second = run(blog(), &[], 3, &mut NoLookup).1;

    let strip = |sink: &MemorySink| -> Vec<String> {
        sink.rows
            .iter()
            .map(|(t, r)| {
                let mut row = r.as_map().clone();
                row.remove("published_at");
                format!("{}:{}", t, Value::Object(row))
            })
            .collect()
    };
    assert_eq!(strip(&first), strip(&second));
}
