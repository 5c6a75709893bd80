use super::{load_config, protected_tables};
use crate::db::DuckDbStore;
use crate::progress;
use crate::schema::JsonSchemaFiles;
use crate::seeder::{self, Plan, SeedOptions};
use std::path::PathBuf;
use std::time::Instant;

#[allow(clippy::too_many_arguments)]
pub fn run(
    schemas: PathBuf,
    config: Option<PathBuf>,
    database: Option<PathBuf>,
    rows: Option<usize>,
    seed: Option<u64>,
    protected: Option<String>,
    strict: bool,
    json: bool,
) -> anyhow::Result<()> {
    let config = load_config(config.as_deref())?;
    let protected = protected_tables(&config, protected.as_deref());

    let mut options = SeedOptions::from_config(&config);
    if let Some(rows) = rows {
        options.rows = rows;
    }
    if seed.is_some() {
        options.seed = seed;
    }

    let source = JsonSchemaFiles::new(&schemas);
    if !json {
        eprintln!("Verifying fixture generation for: {}", source.pattern());
        eprintln!();
    }

    let start_time = Instant::now();
    let pb = if json {
        None
    } else {
        Some(progress::spinner("Generating fixtures...")?)
    };

    let plan = Plan::load(&source, &protected)?;
    let synthesis = match database {
        Some(ref path) => {
            let mut db = DuckDbStore::open(path)?;
            seeder::synthesize(&plan, &options, &config, &mut db)?
        }
        None => {
            let mut lookup = config.static_lookup();
            seeder::synthesize(&plan, &options, &config, &mut lookup)?
        }
    };
    let summary = synthesis.verify;

    if let Some(pb) = pb {
        pb.finish_with_message("done");
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        for err in &plan.load_errors {
            eprintln!("WARNING [SCHEMA]: {}", err);
        }
        for issue in &summary.issues {
            eprintln!("{}", issue);
        }
        if !summary.issues.is_empty() || !plan.load_errors.is_empty() {
            eprintln!();
        }

        eprintln!("Verification summary:");
        eprintln!("  Tables checked: {}", summary.summary.tables_checked);
        eprintln!("  Rows checked: {}", summary.summary.rows_checked);
        eprintln!(
            "  References checked: {} ({} unverified)",
            summary.summary.references_checked, summary.summary.references_unverified
        );
        eprintln!("  Time: {:.3?}", start_time.elapsed());
        eprintln!();
        eprintln!("  Checks:");
        eprintln!("    - Insertion order:   {}", summary.checks.order);
        eprintln!("    - FK integrity:      {}", summary.checks.fk_integrity);
        eprintln!("    - Unset references:  {}", summary.checks.unset_references);
        eprintln!();
        eprintln!(
            "  Total: {} errors, {} warnings",
            summary.summary.errors, summary.summary.warnings
        );
        eprintln!();

        if summary.has_errors() {
            eprintln!("Result: FAILED");
        } else if summary.has_warnings() && strict {
            eprintln!("Result: FAILED (--strict mode, warnings treated as errors)");
        } else if summary.has_warnings() {
            eprintln!("Result: PASSED (with warnings)");
        } else {
            eprintln!("Result: PASSED");
        }
    }

    if summary.has_errors() || (strict && summary.has_warnings()) {
        std::process::exit(1);
    }

    Ok(())
}
