use crate::json_schema;
use anyhow::{bail, Context, Result};
use std::fs;
use std::path::PathBuf;

pub fn run(command: Option<String>, output_dir: Option<PathBuf>, list: bool) -> Result<()> {
    if list {
        for name in json_schema::schema_names() {
            println!("{}", name);
        }
        return Ok(());
    }

    if let Some(dir) = output_dir {
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create directory: {}", dir.display()))?;
        for (name, schema) in json_schema::all_schemas() {
            if command.as_deref().is_some_and(|c| c != name) {
                continue;
            }
            let path = dir.join(format!("{}.schema.json", name));
            fs::write(&path, serde_json::to_string_pretty(&schema)? + "\n")
                .with_context(|| format!("Failed to write {}", path.display()))?;
            eprintln!("Wrote {}", path.display());
        }
        return Ok(());
    }

    match command {
        Some(name) => {
            let Some(schema) = json_schema::get_schema(&name) else {
                bail!(
                    "unknown command: {}. Available: {}",
                    name,
                    json_schema::schema_names().join(", ")
                );
            };
            println!("{}", serde_json::to_string_pretty(&schema)?);
        }
        None => {
            println!(
                "{}",
                serde_json::to_string_pretty(&json_schema::all_schemas())?
            );
        }
    }
    Ok(())
}
