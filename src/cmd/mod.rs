pub mod order;
mod schema;
mod seed;
mod verify;

use crate::config::SeedYamlConfig;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use std::io;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "fixture-seeder")]
#[command(version)]
#[command(
    about = "Seed a database with referentially consistent fixture rows from JSON table schemas",
    long_about = None
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Print the dependency-safe insertion order of the tables
    Order {
        /// Schema directory, JSON file or glob pattern (e.g., schemas/*.json)
        schemas: PathBuf,

        /// YAML config file (protected tables are read from it)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Additional protected tables (comma-separated)
        #[arg(long)]
        protected: Option<String>,

        /// Print the purge order (children before parents) instead
        #[arg(long)]
        reverse: bool,

        /// Only check that an order exists; exit 1 on cycles
        #[arg(long)]
        check: bool,

        /// Output results as JSON
        #[arg(long)]
        json: bool,
    },

    /// Generate fixture rows and insert them
    Seed {
        /// Schema directory, JSON file or glob pattern (e.g., schemas/*.json)
        schemas: PathBuf,

        /// YAML config file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// DuckDB database file to read reference keys from and insert into
        #[arg(long, conflicts_with = "output")]
        database: Option<PathBuf>,

        /// Write a SQL script instead of inserting (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// SQL dialect of the script: postgres, mysql, or sqlite
        #[arg(short, long, default_value = "postgres")]
        dialect: String,

        /// Rows per table (overrides config default)
        #[arg(long)]
        rows: Option<usize>,

        /// Elements per array field without a fixed count
        #[arg(long)]
        array_len: Option<usize>,

        /// Seed for reproducible scalar values
        #[arg(long)]
        seed: Option<u64>,

        /// Additional protected tables (comma-separated)
        #[arg(long)]
        protected: Option<String>,

        /// Delete earlier fixture rows of all non-protected tables first
        #[arg(long)]
        purge: bool,

        /// Generate and report without writing anything
        #[arg(long)]
        dry_run: bool,

        /// Exit with an error when warnings were reported
        #[arg(long)]
        strict: bool,

        /// Show progress during generation and insertion
        #[arg(short, long)]
        progress: bool,

        /// Output results as JSON
        #[arg(long)]
        json: bool,
    },

    /// Generate fixture rows and check their foreign-key soundness without writing
    Verify {
        /// Schema directory, JSON file or glob pattern (e.g., schemas/*.json)
        schemas: PathBuf,

        /// YAML config file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// DuckDB database file to read reference keys from
        #[arg(long)]
        database: Option<PathBuf>,

        /// Rows per table (overrides config default)
        #[arg(long)]
        rows: Option<usize>,

        /// Seed for reproducible scalar values
        #[arg(long)]
        seed: Option<u64>,

        /// Additional protected tables (comma-separated)
        #[arg(long)]
        protected: Option<String>,

        /// Treat warnings as errors
        #[arg(long)]
        strict: bool,

        /// Output results as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the JSON schema of a command's --json output
    Schema {
        /// Command name (order, seed, verify); all when omitted
        #[arg(long)]
        command: Option<String>,

        /// Write one <command>.schema.json file per command into this directory
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// List available schema names
        #[arg(long)]
        list: bool,
    },

    /// Generate shell completion scripts
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: Shell,
    },
}

pub fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Order {
            schemas,
            config,
            protected,
            reverse,
            check,
            json,
        } => order::run(schemas, config, protected, reverse, check, json),
        Commands::Seed {
            schemas,
            config,
            database,
            output,
            dialect,
            rows,
            array_len,
            seed,
            protected,
            purge,
            dry_run,
            strict,
            progress,
            json,
        } => seed::run(seed::SeedArgs {
            schemas,
            config,
            database,
            output,
            dialect,
            rows,
            array_len,
            seed,
            protected,
            purge,
            dry_run,
            strict,
            progress,
            json,
        }),
        Commands::Verify {
            schemas,
            config,
            database,
            rows,
            seed,
            protected,
            strict,
            json,
        } => verify::run(schemas, config, database, rows, seed, protected, strict, json),
        Commands::Schema {
            command,
            output_dir,
            list,
        } => schema::run(command, output_dir, list),
        Commands::Completions { shell } => {
            generate(
                shell,
                &mut Cli::command(),
                "fixture-seeder",
                &mut io::stdout(),
            );
            Ok(())
        }
    }
}

/// Config from `path`, or the defaults when no file was given
fn load_config(path: Option<&Path>) -> anyhow::Result<SeedYamlConfig> {
    match path {
        Some(path) => SeedYamlConfig::load(path),
        None => Ok(SeedYamlConfig::default()),
    }
}

/// Protected tables from the config plus a comma-separated CLI list
fn protected_tables(config: &SeedYamlConfig, extra: Option<&str>) -> Vec<String> {
    let mut tables = config.protected_tables();
    if let Some(extra) = extra {
        tables.extend(
            extra
                .split(',')
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty()),
        );
    }
    tables
}
