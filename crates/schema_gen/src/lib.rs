//! Table-schema set generator for fixture-seeder tests and benchmarks.
//!
//! Produces JSON Schema documents in the layout fixture-seeder loads: one
//! document per table, `title` naming the table, `x-foreign-table` marking
//! references. Random sets are acyclic and deterministic for a given seed.
//!
//! # Example
//!
//! ```rust
//! use schema_gen::{Generator, Shape};
//!
//! let mut gen = Generator::new(42, Shape::medium());
//! let docs = gen.generate();
//! assert_eq!(docs.len(), Shape::medium().tables);
//! ```

pub mod generator;
pub mod presets;

pub use generator::{Generator, Shape};
pub use presets::{blog, chain, cycle};

use serde_json::Value;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Write each document to `<dir>/<NNN>_<title>.json` and return the paths.
///
/// The numeric prefix keeps the documents' order when read back sorted.
pub fn write_dir(docs: &[Value], dir: &Path) -> io::Result<Vec<PathBuf>> {
    fs::create_dir_all(dir)?;
    let mut paths = Vec::with_capacity(docs.len());
    for (i, doc) in docs.iter().enumerate() {
        let title = doc
            .get("title")
            .and_then(Value::as_str)
            .unwrap_or("table")
            .replace(['.', '/'], "_");
        let path = dir.join(format!("{:03}_{}.json", i, title));
        let body = serde_json::to_string_pretty(doc).map_err(io::Error::other)?;
        fs::write(&path, body)?;
        paths.push(path);
    }
    Ok(paths)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_dir_keeps_order() {
        let dir = std::env::temp_dir().join(format!("schema_gen_{}", std::process::id()));
        let paths = write_dir(&blog(), &dir).unwrap();
        assert_eq!(paths.len(), 3);
        assert!(paths[0].ends_with("000_auth_users.json"));
        let mut sorted = paths.clone();
        sorted.sort();
        assert_eq!(sorted, paths);
        fs::remove_dir_all(&dir).unwrap();
    }
}
