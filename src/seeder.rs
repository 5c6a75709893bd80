//! Seeding pipeline shared by the `order`, `seed` and `verify` commands.
//!
//! 1. [`Plan::load`]: read schemas, apply protected markers, build the graph
//!    and its insertion order. A cycle stops here, before any database work.
//! 2. [`synthesize`]: populate a fixture store and check it.
//! 3. [`write`]: optionally purge earlier fixtures, then insert the store.

use crate::config::SeedYamlConfig;
use crate::db::{KeyLookup, RowSink};
use crate::fixture::{
    flush, populate, purge, FixtureStore, FlushReport, InsertionError, PopulateReport,
    PopulateStatus, PurgeReport,
};
use crate::progress;
use crate::provider::FakeProvider;
use crate::schema::{SchemaGraph, SchemaLoadError, SchemaSource, TableId};
use crate::synth::{LookupError, ReferenceResolver, RowSynthesizer, UnresolvedReference};
use crate::verify::{verify, VerifySummary};
use anyhow::Result;
use serde::Serialize;

/// Run-wide generation settings
#[derive(Debug, Clone)]
pub struct SeedOptions {
    pub rows: usize,
    pub array_len: usize,
    pub lookup_batch: usize,
    pub seed: Option<u64>,
    /// Delete rows of all non-protected tables before inserting
    pub purge: bool,
    pub progress: bool,
}

impl SeedOptions {
    pub fn from_config(config: &SeedYamlConfig) -> Self {
        Self {
            rows: config.default.rows,
            array_len: config.default.array_len,
            lookup_batch: config.default.lookup_batch,
            seed: config.default.seed,
            purge: false,
            progress: false,
        }
    }
}

impl Default for SeedOptions {
    fn default() -> Self {
        Self::from_config(&SeedYamlConfig::default())
    }
}

/// A schema graph with a valid insertion order
#[derive(Debug)]
pub struct Plan {
    pub graph: SchemaGraph,
    pub order: Vec<TableId>,
    /// Protected identities: `x-protected` tables of the set, then configured
    /// names, including tables that are only referenced
    pub protected: Vec<String>,
    pub load_errors: Vec<SchemaLoadError>,
}

impl Plan {
    /// Load schemas from `source` and order them.
    ///
    /// Fails with a [`crate::schema::CycleError`] (downcastable from the
    /// returned error) when the references form a cycle.
    pub fn load(source: &dyn SchemaSource, protected: &[String]) -> Result<Self> {
        let load = source.load()?;
        let mut schemas = load.schemas;
        schemas.mark_protected(protected);

        let mut protected_all = schemas.protected_identities();
        for name in protected {
            if !protected_all.iter().any(|p| p.eq_ignore_ascii_case(name)) {
                protected_all.push(name.clone());
            }
        }

        let graph = SchemaGraph::build(schemas);
        let order = graph.topo_sort()?;
        Ok(Self {
            graph,
            order,
            protected: protected_all,
            load_errors: load.errors,
        })
    }

    pub fn order_names(&self) -> Vec<String> {
        self.graph.names(&self.order)
    }

    pub fn purge_names(&self) -> Vec<String> {
        let mut names = self.order_names();
        names.retain(|name| {
            self.graph
                .schema
                .get_table(name)
                .is_some_and(|t| !t.protected)
        });
        names.reverse();
        names
    }

    pub fn protected_names(&self) -> Vec<String> {
        self.protected.clone()
    }

    pub fn is_protected(&self, identity: &str) -> bool {
        self.protected.iter().any(|p| p.eq_ignore_ascii_case(identity))
    }
}

/// Output of the generation phase
#[derive(Debug)]
pub struct Synthesis {
    pub store: FixtureStore,
    pub populate: PopulateReport,
    pub lookup_errors: Vec<LookupError>,
    pub verify: VerifySummary,
}

/// Populate a fixture store for `plan` and verify it
pub fn synthesize(
    plan: &Plan,
    options: &SeedOptions,
    config: &SeedYamlConfig,
    lookup: &mut dyn KeyLookup,
) -> Result<Synthesis> {
    let populate_options = config.populate_options(&plan.graph, options.rows);
    let expected: usize = plan
        .graph
        .schema
        .iter()
        .filter(|t| !t.protected && !populate_options.skips(&t.identity))
        .map(|t| populate_options.rows_for(&t.identity))
        .sum();

    let mut synthesizer =
        RowSynthesizer::new(FakeProvider::new(options.seed)).with_array_len(options.array_len);
    let mut resolver = ReferenceResolver::new(lookup)
        .with_protected(&plan.protected)
        .with_batch(options.lookup_batch);

    let pb = progress::optional_row_bar(options.progress, expected as u64, "Generating rows...")?;
    let (store, report) = populate(
        &plan.graph,
        &plan.order,
        &populate_options,
        &mut synthesizer,
        &mut resolver,
        pb.as_ref(),
    );
    if let Some(pb) = pb {
        pb.finish_with_message("generated");
    }

    let verify = verify(&plan.graph, &plan.order, &store, &resolver);
    Ok(Synthesis {
        store,
        populate: report,
        lookup_errors: resolver.errors(),
        verify,
    })
}

/// Output of the write phase
#[derive(Debug, Default)]
pub struct WriteReport {
    pub purge: Option<PurgeReport>,
    pub flush: FlushReport,
}

/// Purge (if requested) and insert the synthesized rows
pub fn write(
    plan: &Plan,
    synthesis: &Synthesis,
    options: &SeedOptions,
    sink: &mut dyn RowSink,
) -> Result<WriteReport> {
    let purge_report = options
        .purge
        .then(|| purge(&plan.graph, &plan.order, sink));

    let pb = progress::optional_row_bar(
        options.progress,
        synthesis.store.total_rows() as u64,
        "Inserting rows...",
    )?;
    let flush_report = flush(&synthesis.store, &plan.graph, &plan.order, sink, pb.as_ref());
    if let Some(pb) = pb {
        pb.finish_with_message("inserted");
    }

    Ok(WriteReport {
        purge: purge_report,
        flush: flush_report,
    })
}

/// Per-table line of the run summary
#[derive(Debug, Clone, Serialize, schemars::JsonSchema)]
pub struct TableSummary {
    pub table: String,
    pub status: PopulateStatus,
    pub generated: usize,
    pub attempted: usize,
    pub inserted: usize,
}

#[derive(Debug, Clone, Serialize, schemars::JsonSchema)]
pub struct ExternalReferenceSummary {
    pub table: String,
    pub field: String,
    pub target: String,
    /// Target is protected, so existing keys are used
    pub protected: bool,
}

#[derive(Debug, Clone, Default, Serialize, schemars::JsonSchema)]
pub struct SeedTotals {
    pub tables: usize,
    pub generated: usize,
    pub attempted: usize,
    pub inserted: usize,
    pub warnings: usize,
    pub errors: usize,
}

/// JSON output of the seed command
#[derive(Debug, Clone, Serialize, schemars::JsonSchema)]
pub struct SeedSummary {
    pub dry_run: bool,
    pub order: Vec<String>,
    pub tables: Vec<TableSummary>,
    pub unresolved: Vec<UnresolvedReference>,
    pub insertion_errors: Vec<InsertionError>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub purge: Option<PurgeReport>,
    pub schema_errors: Vec<String>,
    pub lookup_errors: Vec<LookupError>,
    pub external_references: Vec<ExternalReferenceSummary>,
    pub totals: SeedTotals,
}

impl SeedSummary {
    /// Summary of a run; `write` is `None` for dry runs
    pub fn new(plan: &Plan, synthesis: &Synthesis, write: Option<&WriteReport>) -> Self {
        let tables: Vec<TableSummary> = synthesis
            .populate
            .tables
            .iter()
            .map(|t| {
                let flushed = write.and_then(|w| w.flush.stats(&t.table));
                TableSummary {
                    table: t.table.clone(),
                    status: t.status.clone(),
                    generated: t.rows,
                    attempted: flushed.map_or(0, |s| s.attempted),
                    inserted: flushed.map_or(0, |s| s.inserted),
                }
            })
            .collect();

        let insertion_errors = write.map(|w| w.flush.errors.clone()).unwrap_or_default();
        let purge = write.and_then(|w| w.purge.clone());
        let purge_failures = purge.as_ref().map_or(0, |p| p.failures.len());

        let external_references: Vec<ExternalReferenceSummary> = plan
            .graph
            .external_refs
            .iter()
            .map(|r| ExternalReferenceSummary {
                table: plan.graph.table_name(r.owner).unwrap_or_default().to_string(),
                field: r.field.clone(),
                target: r.target.clone(),
                protected: plan.is_protected(&r.target),
            })
            .collect();

        let totals = SeedTotals {
            tables: tables.len(),
            generated: synthesis.populate.total_rows(),
            attempted: tables.iter().map(|t| t.attempted).sum(),
            inserted: tables.iter().map(|t| t.inserted).sum(),
            warnings: synthesis.populate.unresolved.len()
                + synthesis.lookup_errors.len()
                + plan.load_errors.len()
                + external_references.iter().filter(|r| !r.protected).count(),
            errors: insertion_errors.len() + purge_failures,
        };

        Self {
            dry_run: write.is_none(),
            order: plan.order_names(),
            tables,
            unresolved: synthesis.populate.unresolved.clone(),
            insertion_errors,
            purge,
            schema_errors: plan.load_errors.iter().map(|e| e.to_string()).collect(),
            lookup_errors: synthesis.lookup_errors.clone(),
            external_references,
            totals,
        }
    }

    pub fn has_errors(&self) -> bool {
        self.totals.errors > 0
    }
}
