//! Order command - print tables in dependency-safe insertion order.

use super::{load_config, protected_tables};
use crate::schema::{CycleError, JsonSchemaFiles};
use crate::seeder::Plan;
use anyhow::Result;
use serde::Serialize;
use std::path::PathBuf;

/// JSON output of the order command
#[derive(Debug, Serialize, schemars::JsonSchema)]
pub struct OrderJsonOutput {
    /// `true` when the order lists children before parents
    pub reverse: bool,
    pub tables: Vec<String>,
    pub protected: Vec<String>,
    pub self_referencing: Vec<String>,
    pub external_references: Vec<String>,
    pub schema_errors: Vec<String>,
}

pub fn run(
    schemas: PathBuf,
    config: Option<PathBuf>,
    protected: Option<String>,
    reverse: bool,
    check: bool,
    json: bool,
) -> Result<()> {
    let config = load_config(config.as_deref())?;
    let protected = protected_tables(&config, protected.as_deref());
    let source = JsonSchemaFiles::new(&schemas);

    if !json {
        eprintln!("Analyzing schemas for insertion order: {}", source.pattern());
    }

    let plan = match Plan::load(&source, &protected) {
        Ok(plan) => plan,
        Err(e) => {
            let Some(cycle) = e.downcast_ref::<CycleError>() else {
                return Err(e);
            };
            eprintln!("\nError: {}", cycle);
            eprintln!("Tables on the cycle:");
            for table in &cycle.path[..cycle.path.len().saturating_sub(1)] {
                eprintln!("  - {}", table);
            }
            if check {
                eprintln!("\nCheck FAILED: Cannot determine valid ordering due to cycles.");
            }
            std::process::exit(1);
        }
    };

    if !json {
        for err in &plan.load_errors {
            eprintln!("Warning: {}", err);
        }
    }

    let mut tables = plan.order_names();
    if reverse {
        tables.reverse();
    }

    if json {
        let output = OrderJsonOutput {
            reverse,
            tables,
            protected: plan.protected_names(),
            self_referencing: plan.graph.names(&plan.graph.self_referencing),
            external_references: plan
                .graph
                .external_refs
                .iter()
                .map(|r| {
                    format!(
                        "{}.{} -> {}",
                        plan.graph.table_name(r.owner).unwrap_or_default(),
                        r.field,
                        r.target
                    )
                })
                .collect(),
            schema_errors: plan.load_errors.iter().map(|e| e.to_string()).collect(),
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    if plan.graph.is_empty() {
        eprintln!("No tables found.");
        return Ok(());
    }

    if check {
        eprintln!("Check PASSED: Tables can be ordered topologically.");
        eprintln!("\nSuggested order ({} tables):", tables.len());
        for (i, table) in tables.iter().enumerate() {
            eprintln!("  {}. {}", i + 1, table);
        }
        return Ok(());
    }

    for table in &tables {
        println!("{}", table);
    }

    for r in &plan.graph.external_refs {
        eprintln!(
            "Note: {}.{} references {} outside the schema set{}",
            plan.graph.table_name(r.owner).unwrap_or_default(),
            r.field,
            r.target,
            if plan.is_protected(&r.target) {
                " (protected)"
            } else {
                ""
            }
        );
    }
    eprintln!(
        "\n{} tables in {} order.",
        tables.len(),
        if reverse { "purge" } else { "insertion" }
    );

    Ok(())
}
