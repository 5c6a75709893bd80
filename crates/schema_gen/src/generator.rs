//! Random acyclic schema sets.
//!
//! Table `i` may only reference tables with a lower index, so every set has a
//! valid insertion order. Documents are shuffled before they are returned so
//! the input order says nothing about that order.

use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde_json::{json, Map, Value};

/// Size and density of a generated schema set
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Shape {
    pub tables: usize,
    /// Upper bound of foreign references per table
    pub max_refs: usize,
    /// Plain scalar columns per table besides `id`
    pub columns: usize,
    /// Tables `0..protected` are marked `x-protected`
    pub protected: usize,
    /// Chance that a table references itself
    pub self_ref_ratio: f64,
}

impl Shape {
    pub fn small() -> Self {
        Self {
            tables: 8,
            max_refs: 2,
            columns: 3,
            protected: 1,
            self_ref_ratio: 0.1,
        }
    }

    pub fn medium() -> Self {
        Self {
            tables: 50,
            max_refs: 3,
            columns: 6,
            protected: 3,
            self_ref_ratio: 0.1,
        }
    }

    pub fn large() -> Self {
        Self {
            tables: 400,
            max_refs: 4,
            columns: 10,
            protected: 10,
            self_ref_ratio: 0.05,
        }
    }
}

impl std::str::FromStr for Shape {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "small" | "s" => Ok(Shape::small()),
            "medium" | "m" => Ok(Shape::medium()),
            "large" | "l" => Ok(Shape::large()),
            _ => Err(format!("Unknown shape: {}. Use small, medium, or large", s)),
        }
    }
}

const SCALAR_KINDS: &[&str] = &["string", "integer", "number", "boolean", "date-time", "enum"];

/// Deterministic schema-set generator
pub struct Generator {
    rng: ChaCha8Rng,
    shape: Shape,
}

impl Generator {
    pub fn new(seed: u64, shape: Shape) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
            shape,
        }
    }

    /// Table identity for index `i`
    pub fn table_name(i: usize) -> String {
        format!("public.table_{:03}", i)
    }

    pub fn generate(&mut self) -> Vec<Value> {
        let mut docs: Vec<Value> = (0..self.shape.tables).map(|i| self.table(i)).collect();
        docs.shuffle(&mut self.rng);
        docs
    }

    fn table(&mut self, index: usize) -> Value {
        let mut properties = Map::new();
        properties.insert("id".to_string(), json!({ "type": "string", "format": "uuid" }));

        for c in 0..self.shape.columns {
            let kind = SCALAR_KINDS[self.rng.random_range(0..SCALAR_KINDS.len())];
            properties.insert(format!("col_{}", c), scalar(kind));
        }

        if index > 0 && self.shape.max_refs > 0 {
            let refs = self.rng.random_range(0..=self.shape.max_refs);
            for r in 0..refs {
                let target = self.rng.random_range(0..index);
                properties.insert(
                    format!("ref_{}", r),
                    json!({ "type": "string", "x-foreign-table": Self::table_name(target) }),
                );
            }
        }

        if self.rng.random_bool(self.shape.self_ref_ratio) {
            properties.insert(
                "parent_id".to_string(),
                json!({ "type": "string", "x-foreign-table": Self::table_name(index) }),
            );
        }

        let mut doc = json!({
            "title": Self::table_name(index),
            "type": "object",
            "properties": properties
        });
        if index < self.shape.protected {
            doc["x-protected"] = Value::Bool(true);
        }
        doc
    }
}

fn scalar(kind: &str) -> Value {
    match kind {
        "date-time" => json!({ "type": "string", "format": "date-time" }),
        "enum" => json!({ "type": "string", "enum": ["new", "active", "closed"] }),
        ty => json!({ "type": ty }),
    }
}
