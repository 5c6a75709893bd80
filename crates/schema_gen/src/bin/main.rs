//! CLI for generating schema sets.
//!
//! Usage:
//!   gen-schemas --shape medium --seed 42 --output-dir /tmp/medium
//!   gen-schemas --preset blog --output-dir /tmp/blog

use clap::Parser;
use schema_gen::{blog, chain, cycle, write_dir, Generator, Shape};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "gen-schemas")]
#[command(about = "Generate JSON table schemas for fixture-seeder", long_about = None)]
struct Args {
    /// Shape preset for random sets: small, medium, large
    #[arg(short, long, default_value = "small")]
    shape: String,

    /// Random seed for reproducibility
    #[arg(long, default_value = "12345")]
    seed: u64,

    /// Number of tables (overrides the shape's table count)
    #[arg(long)]
    tables: Option<usize>,

    /// Fixed set instead of a random one: blog, chain, cycle
    #[arg(long)]
    preset: Option<String>,

    /// Directory to write one JSON file per table into
    #[arg(short, long)]
    output_dir: PathBuf,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let docs = match args.preset.as_deref() {
        Some("blog") => blog(),
        Some("chain") => chain(args.tables.unwrap_or(5)),
        Some("cycle") => cycle(args.tables.unwrap_or(3)),
        Some(other) => anyhow::bail!("Unknown preset: {}. Use blog, chain, or cycle", other),
        None => {
            let mut shape: Shape = args.shape.parse().map_err(|e: String| anyhow::anyhow!(e))?;
            if let Some(tables) = args.tables {
                shape.tables = tables;
                shape.protected = shape.protected.min(tables);
            }
            Generator::new(args.seed, shape).generate()
        }
    };

    let paths = write_dir(&docs, &args.output_dir)?;
    eprintln!(
        "Wrote {} schema files to {}",
        paths.len(),
        args.output_dir.display()
    );
    Ok(())
}
