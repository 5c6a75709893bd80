//! Table schema model for dependency-aware fixture synthesis.
//!
//! This module provides:
//! - Typed table/field definitions derived from JSON Schema documents
//! - A recursive foreign-reference visitor over nested fields
//! - Dependency graph construction with cycle detection and topological sorting

mod graph;
pub mod json;

pub use graph::*;
pub use json::{JsonSchemaFiles, JsonSchemaValues, SchemaLoad, SchemaLoadError, SchemaSource};

use ahash::AHashMap;
use serde_json::Value;
use std::fmt;

/// Unique identifier for a table within a schema set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TableId(pub u32);

impl fmt::Display for TableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TableId({})", self.0)
    }
}

/// Scalar value type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarType {
    String,
    Number,
    Integer,
    Boolean,
}

impl ScalarType {
    /// Parse a JSON Schema `type` keyword
    pub fn from_json_type(name: &str) -> Option<Self> {
        match name {
            "string" => Some(ScalarType::String),
            "number" => Some(ScalarType::Number),
            "integer" => Some(ScalarType::Integer),
            "boolean" => Some(ScalarType::Boolean),
            _ => None,
        }
    }

    /// Infer the scalar type of an enum member
    pub fn of_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(_) => Some(ScalarType::String),
            Value::Bool(_) => Some(ScalarType::Boolean),
            Value::Number(n) if n.is_i64() || n.is_u64() => Some(ScalarType::Integer),
            Value::Number(_) => Some(ScalarType::Number),
            _ => None,
        }
    }
}

impl fmt::Display for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScalarType::String => write!(f, "string"),
            ScalarType::Number => write!(f, "number"),
            ScalarType::Integer => write!(f, "integer"),
            ScalarType::Boolean => write!(f, "boolean"),
        }
    }
}

/// String format hint that changes how a scalar is generated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarFormat {
    Uuid,
    DateTime,
}

impl ScalarFormat {
    /// Parse a JSON Schema `format` keyword. Formats without a dedicated
    /// generator are treated as plain values of the declared type.
    pub fn from_json_format(name: &str) -> Option<Self> {
        match name {
            "uuid" => Some(ScalarFormat::Uuid),
            "date-time" => Some(ScalarFormat::DateTime),
            _ => None,
        }
    }
}

/// Scalar field: type plus optional format and enum constraint
#[derive(Debug, Clone, PartialEq)]
pub struct ScalarSpec {
    pub ty: ScalarType,
    pub format: Option<ScalarFormat>,
    pub allowed: Option<Vec<Value>>,
}

impl ScalarSpec {
    pub fn new(ty: ScalarType) -> Self {
        Self {
            ty,
            format: None,
            allowed: None,
        }
    }

    pub fn with_format(mut self, format: ScalarFormat) -> Self {
        self.format = Some(format);
        self
    }

    pub fn with_enum(mut self, values: Vec<Value>) -> Self {
        self.allowed = Some(values);
        self
    }
}

/// Reference to a key field of another table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignRef {
    /// Identity of the referenced table
    pub table: String,
    /// Key field in the referenced table
    pub key: String,
}

impl ForeignRef {
    pub const DEFAULT_KEY: &'static str = "id";

    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            key: Self::DEFAULT_KEY.to_string(),
        }
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = key.into();
        self
    }
}

/// Array field: one or more element shapes and an optional fixed length
#[derive(Debug, Clone, PartialEq)]
pub struct ArraySpec {
    pub items: Vec<FieldSpec>,
    pub count: Option<usize>,
}

/// Field definition, exactly one variant per field
#[derive(Debug, Clone, PartialEq)]
pub enum FieldSpec {
    Scalar(ScalarSpec),
    ForeignRef(ForeignRef),
    Object(Vec<Field>),
    Array(ArraySpec),
    /// Value assigned by the database (identity column, trigger, default)
    Generated,
}

/// Named field within a table or nested object
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: String,
    pub spec: FieldSpec,
}

impl Field {
    pub fn new(name: impl Into<String>, spec: FieldSpec) -> Self {
        Self {
            name: name.into(),
            spec,
        }
    }
}

/// Walk every foreign reference in `fields`, at any depth.
///
/// The callback receives the dotted path of the field (`meta.owner_id`,
/// `lines[].product_id`) and the reference. Arrays with several item shapes
/// are visited once per shape.
pub fn walk_foreign_refs<F>(fields: &[Field], visit: &mut F)
where
    F: FnMut(&str, &ForeignRef),
{
    for field in fields {
        walk_spec(&field.name, &field.spec, visit);
    }
}

fn walk_spec<F>(path: &str, spec: &FieldSpec, visit: &mut F)
where
    F: FnMut(&str, &ForeignRef),
{
    match spec {
        FieldSpec::ForeignRef(fk) => visit(path, fk),
        FieldSpec::Object(fields) => {
            for field in fields {
                walk_spec(&format!("{}.{}", path, field.name), &field.spec, visit);
            }
        }
        FieldSpec::Array(array) => {
            let element_path = format!("{}[]", path);
            for item in &array.items {
                walk_spec(&element_path, item, visit);
            }
        }
        FieldSpec::Scalar(_) | FieldSpec::Generated => {}
    }
}

/// Complete table schema definition
#[derive(Debug, Clone)]
pub struct TableSchema {
    /// Stable identity, usually `<namespace>.<name>`
    pub identity: String,
    /// Table ID within the schema set
    pub id: TableId,
    /// Field definitions in declaration order
    pub fields: Vec<Field>,
    /// Existing rows are used as-is; never synthesized or purged
    pub protected: bool,
}

impl TableSchema {
    pub fn new(identity: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            id: TableId(0),
            fields: Vec::new(),
            protected: false,
        }
    }

    pub fn field(mut self, name: impl Into<String>, spec: FieldSpec) -> Self {
        self.fields.push(Field::new(name, spec));
        self
    }

    pub fn protected(mut self) -> Self {
        self.protected = true;
        self
    }

    /// Get a top-level field by name
    pub fn get_field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// All foreign references of this table as (field path, reference)
    pub fn foreign_refs(&self) -> Vec<(String, ForeignRef)> {
        let mut refs = Vec::new();
        walk_foreign_refs(&self.fields, &mut |path, fk| {
            refs.push((path.to_string(), fk.clone()))
        });
        refs
    }
}

/// The set of table schemas taking part in one run
#[derive(Debug, Clone, Default)]
pub struct SchemaSet {
    /// Map from identity to table ID
    pub tables: AHashMap<String, TableId>,
    /// Table schemas indexed by TableId
    pub table_schemas: Vec<TableSchema>,
}

impl SchemaSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a table schema, returning its ID. A second schema with an
    /// identity already present, ignoring case, is rejected.
    pub fn add_table(&mut self, mut schema: TableSchema) -> Result<TableId, SchemaLoadError> {
        if self.get_table_id(&schema.identity).is_some() {
            return Err(SchemaLoadError::Duplicate {
                identity: schema.identity,
            });
        }
        let id = TableId(self.table_schemas.len() as u32);
        schema.id = id;
        self.tables.insert(schema.identity.clone(), id);
        self.table_schemas.push(schema);
        Ok(id)
    }

    /// Get table ID by identity (exact match first, then case-insensitive)
    pub fn get_table_id(&self, identity: &str) -> Option<TableId> {
        if let Some(&id) = self.tables.get(identity) {
            return Some(id);
        }
        self.table_schemas
            .iter()
            .find(|t| t.identity.eq_ignore_ascii_case(identity))
            .map(|t| t.id)
    }

    pub fn table(&self, id: TableId) -> Option<&TableSchema> {
        self.table_schemas.get(id.0 as usize)
    }

    pub fn get_table(&self, identity: &str) -> Option<&TableSchema> {
        self.get_table_id(identity).and_then(|id| self.table(id))
    }

    /// Flag the named tables as protected. Names not in the set are ignored.
    pub fn mark_protected<S: AsRef<str>>(&mut self, identities: &[S]) {
        for identity in identities {
            if let Some(id) = self.get_table_id(identity.as_ref()) {
                self.table_schemas[id.0 as usize].protected = true;
            }
        }
    }

    /// Identities of all protected tables in the set
    pub fn protected_identities(&self) -> Vec<String> {
        self.table_schemas
            .iter()
            .filter(|t| t.protected)
            .map(|t| t.identity.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.table_schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table_schemas.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TableSchema> {
        self.table_schemas.iter()
    }
}

impl FromIterator<TableSchema> for SchemaSet {
    /// Collect schemas, dropping later duplicates of an identity
    fn from_iter<I: IntoIterator<Item = TableSchema>>(iter: I) -> Self {
        let mut set = SchemaSet::new();
        for schema in iter {
            let _ = set.add_table(schema);
        }
        set
    }
}
