use super::{load_config, protected_tables};
use crate::config::SeedYamlConfig;
use crate::db::{Dialect, DuckDbStore, KeyLookup, RowSink, SqlScriptWriter};
use crate::schema::JsonSchemaFiles;
use crate::seeder::{self, Plan, SeedOptions, SeedSummary};
use anyhow::{Context, Result};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::time::Instant;

pub struct SeedArgs {
    pub schemas: PathBuf,
    pub config: Option<PathBuf>,
    pub database: Option<PathBuf>,
    pub output: Option<PathBuf>,
    pub dialect: String,
    pub rows: Option<usize>,
    pub array_len: Option<usize>,
    pub seed: Option<u64>,
    pub protected: Option<String>,
    pub purge: bool,
    pub dry_run: bool,
    pub strict: bool,
    pub progress: bool,
    pub json: bool,
}

pub fn run(args: SeedArgs) -> Result<()> {
    let config = load_config(args.config.as_deref())?;
    let dialect: Dialect = args.dialect.parse().map_err(|e: String| anyhow::anyhow!(e))?;
    let protected = protected_tables(&config, args.protected.as_deref());

    let mut options = SeedOptions::from_config(&config);
    if let Some(rows) = args.rows {
        options.rows = rows;
    }
    if let Some(len) = args.array_len {
        options.array_len = len;
    }
    if args.seed.is_some() {
        options.seed = args.seed;
    }
    options.purge = args.purge;
    options.progress = args.progress && !args.json;

    if args.json && args.database.is_none() && args.output.is_none() && !args.dry_run {
        anyhow::bail!("--json writes to stdout; use --output, --database or --dry-run with it");
    }

    let source = JsonSchemaFiles::new(&args.schemas);
    if !args.json {
        eprintln!("Loading schemas: {}", source.pattern());
    }

    let start_time = Instant::now();
    // A cycle aborts here, before anything is purged or inserted
    let plan = Plan::load(&source, &protected)?;

    if !args.json {
        eprintln!(
            "Insertion order ({} tables): {}",
            plan.order.len(),
            plan.order_names().join(", ")
        );
    }

    let summary = match args.database {
        Some(ref path) => {
            let mut db = DuckDbStore::open(path)?;
            run_phases(&plan, &options, &config, &mut db, args.dry_run)?
        }
        None => {
            let mut lookup = config.static_lookup();
            let synthesis = seeder::synthesize(&plan, &options, &config, &mut lookup)?;
            if args.dry_run {
                SeedSummary::new(&plan, &synthesis, None)
            } else {
                let writer: Box<dyn Write> = match args.output {
                    Some(ref path) => Box::new(BufWriter::new(
                        File::create(path)
                            .with_context(|| format!("Failed to create {}", path.display()))?,
                    )),
                    None => Box::new(BufWriter::new(std::io::stdout())),
                };
                let mut script = SqlScriptWriter::new(writer, dialect);
                script.comment(&format!(
                    "fixture rows for {} tables ({})",
                    plan.order.len(),
                    dialect
                ))?;
                script.begin()?;
                let report = seeder::write(&plan, &synthesis, &options, &mut script)?;
                script.commit()?;
                script.finish()?;
                SeedSummary::new(&plan, &synthesis, Some(&report))
            }
        }
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_summary(&summary, args.output.as_ref(), start_time.elapsed().as_secs_f64());
    }

    if summary.has_errors() || (args.strict && summary.totals.warnings > 0) {
        std::process::exit(1);
    }

    Ok(())
}

/// Generate against `backend` and write back into it
fn run_phases<B: KeyLookup + RowSink>(
    plan: &Plan,
    options: &SeedOptions,
    config: &SeedYamlConfig,
    backend: &mut B,
    dry_run: bool,
) -> Result<SeedSummary> {
    let synthesis = seeder::synthesize(plan, options, config, backend)?;
    if dry_run {
        return Ok(SeedSummary::new(plan, &synthesis, None));
    }
    let report = seeder::write(plan, &synthesis, options, backend)?;
    Ok(SeedSummary::new(plan, &synthesis, Some(&report)))
}

fn print_summary(summary: &SeedSummary, output: Option<&PathBuf>, elapsed: f64) {
    for err in &summary.schema_errors {
        eprintln!("Warning: {}", err);
    }
    for ext in summary.external_references.iter().filter(|r| !r.protected) {
        eprintln!(
            "Warning: {}.{} references {} outside the schema set",
            ext.table, ext.field, ext.target
        );
    }
    for err in &summary.lookup_errors {
        eprintln!("Warning: {}", err);
    }
    for unresolved in &summary.unresolved {
        eprintln!("Warning: unresolved reference {}", unresolved);
    }
    if let Some(ref purge) = summary.purge {
        for failure in &purge.failures {
            eprintln!("Error: {}", failure);
        }
    }
    for err in &summary.insertion_errors {
        eprintln!("Error: {}", err);
    }

    eprintln!();
    if summary.dry_run {
        eprintln!("Seed summary (dry run, nothing written):");
    } else {
        eprintln!("Seed summary:");
    }
    for table in &summary.tables {
        eprintln!(
            "  {:<32} {:>9}  generated {:>6}  inserted {:>6}/{}",
            table.table,
            table.status.to_string(),
            table.generated,
            table.inserted,
            table.attempted
        );
    }
    if let Some(ref purge) = summary.purge {
        eprintln!("  Purged: {} tables", purge.purged.len());
    }
    eprintln!();
    eprintln!(
        "  Total: {} rows generated, {} of {} inserted, {} warnings, {} errors",
        summary.totals.generated,
        summary.totals.inserted,
        summary.totals.attempted,
        summary.totals.warnings,
        summary.totals.errors
    );
    if let Some(path) = output {
        eprintln!("  Script written to: {}", path.display());
    }
    eprintln!("  Time: {:.3}s", elapsed);
}
