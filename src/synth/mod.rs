//! Row synthesis: one candidate row per (table, index).
//!
//! Scalars come from a [`ValueProvider`]. Foreign references are resolved
//! without randomness:
//! - protected tables: existing keys fetched once per run, row `index` takes
//!   key `index`, clamped to the last available key
//! - other tables: row `index mod n` of the rows already synthesized for the
//!   referenced table
//!
//! A reference with nothing to point at is left out of the row and reported
//! as an [`UnresolvedReference`].

mod resolver;

pub use resolver::{LookupError, ReferenceResolver, DEFAULT_LOOKUP_BATCH};

use crate::fixture::FixtureStore;
use crate::provider::ValueProvider;
use crate::schema::{Field, FieldSpec, ForeignRef, ScalarFormat, ScalarSpec, ScalarType};
use crate::schema::TableSchema;
use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;

/// Array length used when the schema does not fix one
pub const DEFAULT_ARRAY_LEN: usize = 2;

/// One synthesized row: field name → value, in schema order
#[derive(Debug, Clone, Default, PartialEq, Serialize, schemars::JsonSchema)]
#[serde(transparent)]
pub struct RowRecord {
    fields: Map<String, Value>,
}

impl RowRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_map(fields: Map<String, Value>) -> Self {
        Self { fields }
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Follow a dotted path (`meta.owner_id`) into nested objects
    pub fn get_path(&self, path: &str) -> Option<&Value> {
        let mut parts = path.split('.');
        let mut current = self.fields.get(parts.next()?)?;
        for part in parts {
            current = current.as_object()?.get(part)?;
        }
        Some(current)
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.fields
    }
}

impl fmt::Display for RowRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let json = serde_json::to_string(&self.fields).map_err(|_| fmt::Error)?;
        write!(f, "{}", json)
    }
}

/// Why a foreign reference was left unset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum UnresolvedReason {
    /// The referenced table has no rows to point at
    NoRows,
    /// Parent rows exist but do not carry the key field
    MissingKey,
    /// Existing keys could not be read
    LookupFailed,
}

impl fmt::Display for UnresolvedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnresolvedReason::NoRows => write!(f, "no rows available"),
            UnresolvedReason::MissingKey => write!(f, "parent rows lack the key field"),
            UnresolvedReason::LookupFailed => write!(f, "existing-key lookup failed"),
        }
    }
}

/// A foreign reference that could not be resolved; the field was omitted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, schemars::JsonSchema)]
pub struct UnresolvedReference {
    pub table: String,
    pub field: String,
    pub target: String,
    pub key: String,
    pub index: usize,
    pub reason: UnresolvedReason,
}

impl fmt::Display for UnresolvedReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{} (row {}) -> {}.{}: {}",
            self.table, self.field, self.index, self.target, self.key, self.reason
        )
    }
}

/// Output of one synthesis call
#[derive(Debug, Clone)]
pub struct SynthesizedRow {
    pub row: RowRecord,
    pub unresolved: Vec<UnresolvedReference>,
}

/// Per-row state threaded through the recursive field walk
struct RowContext<'a, 'r> {
    table: &'a str,
    index: usize,
    store: &'a FixtureStore,
    resolver: &'a mut ReferenceResolver<'r>,
    unresolved: Vec<UnresolvedReference>,
}

/// Produces candidate rows from table schemas
pub struct RowSynthesizer<P: ValueProvider> {
    provider: P,
    array_len: usize,
}

impl<P: ValueProvider> RowSynthesizer<P> {
    pub fn new(provider: P) -> Self {
        Self {
            provider,
            array_len: DEFAULT_ARRAY_LEN,
        }
    }

    /// Element count for arrays without a fixed count
    pub fn with_array_len(mut self, len: usize) -> Self {
        self.array_len = len;
        self
    }

    /// Synthesize row `index` of `table`.
    ///
    /// Callers skip protected tables. `store` must hold every row generated
    /// so far in this run; rows of `table` itself serve self-references.
    pub fn synthesize(
        &mut self,
        table: &TableSchema,
        index: usize,
        store: &FixtureStore,
        resolver: &mut ReferenceResolver<'_>,
    ) -> SynthesizedRow {
        let mut ctx = RowContext {
            table: &table.identity,
            index,
            store,
            resolver,
            unresolved: Vec::new(),
        };
        let fields = self.object(&table.fields, "", &mut ctx);
        SynthesizedRow {
            row: RowRecord::from_map(fields),
            unresolved: ctx.unresolved,
        }
    }

    fn object(&mut self, fields: &[Field], prefix: &str, ctx: &mut RowContext<'_, '_>) -> Map<String, Value> {
        let mut out = Map::new();
        for field in fields {
            let path = if prefix.is_empty() {
                field.name.clone()
            } else {
                format!("{}.{}", prefix, field.name)
            };
            if let Some(value) = self.value(&field.spec, &path, ctx) {
                out.insert(field.name.clone(), value);
            }
        }
        out
    }

    /// `None` means the field is left out of the row
    fn value(&mut self, spec: &FieldSpec, path: &str, ctx: &mut RowContext<'_, '_>) -> Option<Value> {
        match spec {
            FieldSpec::Generated => None,
            FieldSpec::Scalar(scalar) => Some(self.scalar(scalar)),
            FieldSpec::ForeignRef(fk) => resolve_reference(fk, path, ctx),
            FieldSpec::Object(fields) => Some(Value::Object(self.object(fields, path, ctx))),
            FieldSpec::Array(array) => {
                if array.items.is_empty() {
                    return Some(Value::Array(Vec::new()));
                }
                let count = array.count.unwrap_or(self.array_len);
                let element_path = format!("{}[]", path);
                let elements = (0..count)
                    .filter_map(|i| {
                        let shape = &array.items[i % array.items.len()];
                        self.value(shape, &element_path, ctx)
                    })
                    .collect();
                Some(Value::Array(elements))
            }
        }
    }

    fn scalar(&mut self, spec: &ScalarSpec) -> Value {
        if let Some(allowed) = &spec.allowed {
            if let Some(value) = self.provider.pick_one_of(allowed) {
                return value;
            }
        }

        match (spec.ty, spec.format) {
            (ScalarType::String, Some(ScalarFormat::Uuid)) => Value::String(self.provider.uuid()),
            (ScalarType::String, Some(ScalarFormat::DateTime)) => {
                Value::String(self.provider.recent_timestamp())
            }
            (ScalarType::String, None) => Value::String(self.provider.string()),
            (ScalarType::Integer, _) => Value::from(self.provider.integer()),
            (ScalarType::Number, _) => Value::from(self.provider.number()),
            (ScalarType::Boolean, _) => Value::Bool(self.provider.boolean()),
        }
    }
}

fn resolve_reference(fk: &ForeignRef, path: &str, ctx: &mut RowContext<'_, '_>) -> Option<Value> {
    let outcome = if ctx.resolver.is_protected(&fk.table) {
        match ctx.resolver.existing_key(&fk.table, &fk.key, ctx.index) {
            Ok(Some(value)) => Ok(value),
            Ok(None) => Err(UnresolvedReason::NoRows),
            Err(_) => Err(UnresolvedReason::LookupFailed),
        }
    } else {
        let rows = ctx.store.rows(&fk.table);
        if rows.is_empty() {
            Err(UnresolvedReason::NoRows)
        } else {
            rows[ctx.index % rows.len()]
                .get(&fk.key)
                .cloned()
                .ok_or(UnresolvedReason::MissingKey)
        }
    };

    match outcome {
        Ok(value) => Some(value),
        Err(reason) => {
            ctx.unresolved.push(UnresolvedReference {
                table: ctx.table.to_string(),
                field: path.to_string(),
                target: fk.table.clone(),
                key: fk.key.clone(),
                index: ctx.index,
                reason,
            });
            None
        }
    }
}
