//! JSON Schema generation for CLI output types.
//!
//! Covers every command with `--json` output; exported via the `schema`
//! subcommand.

use schemars::{schema_for, Schema};
use std::collections::BTreeMap;

/// All JSON schemas for commands that support --json output.
/// BTreeMap keeps the output order stable.
pub fn all_schemas() -> BTreeMap<&'static str, Schema> {
    let mut schemas = BTreeMap::new();
    schemas.insert("order", schema_for!(crate::cmd::order::OrderJsonOutput));
    schemas.insert("seed", schema_for!(crate::seeder::SeedSummary));
    schemas.insert("verify", schema_for!(crate::verify::VerifySummary));
    schemas
}

/// Schema of a single command's output
pub fn get_schema(command: &str) -> Option<Schema> {
    all_schemas().remove(command)
}

pub fn schema_names() -> Vec<&'static str> {
    all_schemas().keys().copied().collect()
}
