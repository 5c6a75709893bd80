//! JSON Schema loader for table descriptions produced by the schema converter.
//!
//! Each document describes one table:
//!
//! ```json
//! {
//!   "title": "public.posts",
//!   "type": "object",
//!   "properties": {
//!     "id": { "type": "integer", "x-generated": true },
//!     "author_id": { "type": "string", "format": "uuid", "x-foreign-table": "auth.users" },
//!     "status": { "type": "string", "enum": ["draft", "published"] },
//!     "tags": { "type": "array", "items": { "type": "string" }, "x-count": 3 }
//!   }
//! }
//! ```
//!
//! A file may hold a single document or an array of documents.

use super::{ArraySpec, Field, FieldSpec, ForeignRef, ScalarFormat, ScalarSpec, ScalarType};
use super::{SchemaSet, TableSchema};
use anyhow::{Context, Result};
use serde_json::{Map, Value};
use std::fmt;
use std::fs;
use std::path::PathBuf;

/// Marks a table whose rows must never be synthesized or purged
pub const PROTECTED_KEYWORD: &str = "x-protected";
/// Names the table a field references
pub const FOREIGN_TABLE_KEYWORD: &str = "x-foreign-table";
/// Names the referenced key field (defaults to `id`)
pub const FOREIGN_KEY_KEYWORD: &str = "x-foreign-key";
/// Marks a value assigned by the database
pub const GENERATED_KEYWORD: &str = "x-generated";
/// Fixed element count for array fields
pub const COUNT_KEYWORD: &str = "x-count";

/// A schema document that could not be turned into a table
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaLoadError {
    /// No `title` to place the schema in the dependency graph
    MissingIdentity { origin: String },
    /// A field has a shape the synthesizer cannot handle
    Unsupported {
        table: String,
        field: String,
        reason: String,
    },
    /// Input is not a JSON object / not valid JSON
    Parse { origin: String, reason: String },
    /// Two documents share one identity
    Duplicate { identity: String },
}

impl fmt::Display for SchemaLoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchemaLoadError::MissingIdentity { origin } => {
                write!(f, "{}: schema has no title, cannot place it in the graph", origin)
            }
            SchemaLoadError::Unsupported {
                table,
                field,
                reason,
            } => write!(f, "{}.{}: unsupported field: {}", table, field, reason),
            SchemaLoadError::Parse { origin, reason } => write!(f, "{}: {}", origin, reason),
            SchemaLoadError::Duplicate { identity } => {
                write!(f, "{}: duplicate table identity, later schema ignored", identity)
            }
        }
    }
}

impl std::error::Error for SchemaLoadError {}

/// Result of loading schemas: the usable tables and the rejected documents
#[derive(Debug, Default)]
pub struct SchemaLoad {
    pub schemas: SchemaSet,
    pub errors: Vec<SchemaLoadError>,
}

impl SchemaLoad {
    fn push_document(&mut self, doc: &Value, origin: &str) {
        match doc {
            Value::Array(docs) => {
                for (i, doc) in docs.iter().enumerate() {
                    self.push_document(doc, &format!("{}[{}]", origin, i));
                }
            }
            _ => match parse_table_schema(doc, origin) {
                Ok(table) => {
                    if let Err(e) = self.schemas.add_table(table) {
                        self.errors.push(e);
                    }
                }
                Err(e) => self.errors.push(e),
            },
        }
    }
}

/// Source of table schemas (the schema-conversion collaborator's output)
pub trait SchemaSource {
    fn load(&self) -> Result<SchemaLoad>;
}

/// Schemas read from JSON files matching a glob pattern, in path order
#[derive(Debug, Clone)]
pub struct JsonSchemaFiles {
    pattern: String,
}

impl JsonSchemaFiles {
    /// Accepts a directory (all `*.json` files inside it), a single file or
    /// a glob pattern.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let pattern = if path.is_dir() {
            path.join("*.json").to_string_lossy().to_string()
        } else {
            path.to_string_lossy().to_string()
        };
        Self { pattern }
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    fn files(&self) -> Result<Vec<PathBuf>> {
        let mut files: Vec<PathBuf> = glob::glob(&self.pattern)
            .with_context(|| format!("Invalid schema pattern: {}", self.pattern))?
            .filter_map(|entry| entry.ok())
            .filter(|p| p.is_file())
            .collect();
        files.sort();
        Ok(files)
    }
}

impl SchemaSource for JsonSchemaFiles {
    fn load(&self) -> Result<SchemaLoad> {
        let files = self.files()?;
        if files.is_empty() {
            anyhow::bail!("no schema files match: {}", self.pattern);
        }

        let mut load = SchemaLoad::default();
        for path in files {
            let origin = path.display().to_string();
            let content = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read schema file: {}", origin))?;
            match serde_json::from_str::<Value>(&content) {
                Ok(doc) => load.push_document(&doc, &origin),
                Err(e) => load.errors.push(SchemaLoadError::Parse {
                    origin,
                    reason: e.to_string(),
                }),
            }
        }
        Ok(load)
    }
}

/// Schemas held in memory, e.g. handed over directly by the converter
#[derive(Debug, Clone, Default)]
pub struct JsonSchemaValues {
    documents: Vec<Value>,
}

impl JsonSchemaValues {
    pub fn new(documents: Vec<Value>) -> Self {
        Self { documents }
    }
}

impl SchemaSource for JsonSchemaValues {
    fn load(&self) -> Result<SchemaLoad> {
        let mut load = SchemaLoad::default();
        for (i, doc) in self.documents.iter().enumerate() {
            load.push_document(doc, &format!("document[{}]", i));
        }
        Ok(load)
    }
}

/// Parse one JSON Schema document into a table schema
pub fn parse_table_schema(doc: &Value, origin: &str) -> Result<TableSchema, SchemaLoadError> {
    let obj = doc.as_object().ok_or_else(|| SchemaLoadError::Parse {
        origin: origin.to_string(),
        reason: "schema document is not a JSON object".to_string(),
    })?;

    let identity = obj
        .get("title")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| SchemaLoadError::MissingIdentity {
            origin: origin.to_string(),
        })?;

    let mut table = TableSchema::new(identity);
    table.protected = obj
        .get(PROTECTED_KEYWORD)
        .and_then(Value::as_bool)
        .unwrap_or(false);
    table.fields = parse_properties(identity, "", obj.get("properties"))?;
    Ok(table)
}

fn parse_properties(
    table: &str,
    prefix: &str,
    properties: Option<&Value>,
) -> Result<Vec<Field>, SchemaLoadError> {
    let Some(properties) = properties else {
        return Ok(Vec::new());
    };
    let map = properties
        .as_object()
        .ok_or_else(|| unsupported(table, prefix, "`properties` is not an object"))?;

    map.iter()
        .map(|(name, value)| {
            let path = join_path(prefix, name);
            parse_field(table, &path, value).map(|spec| Field::new(name.clone(), spec))
        })
        .collect()
}

fn parse_field(table: &str, path: &str, value: &Value) -> Result<FieldSpec, SchemaLoadError> {
    let obj = value
        .as_object()
        .ok_or_else(|| unsupported(table, path, "property definition is not an object"))?;

    if flag(obj, GENERATED_KEYWORD) || flag(obj, "readOnly") {
        return Ok(FieldSpec::Generated);
    }

    if let Some(target) = obj.get(FOREIGN_TABLE_KEYWORD) {
        let target = target
            .as_str()
            .ok_or_else(|| unsupported(table, path, "`x-foreign-table` is not a string"))?;
        let mut fk = ForeignRef::new(target);
        if let Some(key) = obj.get(FOREIGN_KEY_KEYWORD).and_then(Value::as_str) {
            fk = fk.with_key(key);
        }
        return Ok(FieldSpec::ForeignRef(fk));
    }

    let declared = primary_type(table, path, obj.get("type"))?;

    if let Some(values) = obj.get("enum") {
        let values = values
            .as_array()
            .filter(|v| !v.is_empty())
            .ok_or_else(|| unsupported(table, path, "`enum` must be a non-empty array"))?;
        let values: Vec<Value> = values.iter().filter(|v| !v.is_null()).cloned().collect();
        let ty = match declared {
            Some(name) => ScalarType::from_json_type(name),
            None => values.first().and_then(ScalarType::of_value),
        }
        .ok_or_else(|| unsupported(table, path, "cannot determine enum value type"))?;
        if values.is_empty() {
            return Err(unsupported(table, path, "`enum` only allows null"));
        }
        return Ok(FieldSpec::Scalar(ScalarSpec::new(ty).with_enum(values)));
    }

    match declared {
        Some("object") => Ok(FieldSpec::Object(parse_properties(
            table,
            path,
            obj.get("properties"),
        )?)),
        Some("array") => parse_array(table, path, obj),
        Some(name) => {
            let ty = ScalarType::from_json_type(name)
                .ok_or_else(|| unsupported(table, path, &format!("unknown type `{}`", name)))?;
            let mut spec = ScalarSpec::new(ty);
            if let Some(format) = obj
                .get("format")
                .and_then(Value::as_str)
                .and_then(ScalarFormat::from_json_format)
            {
                spec = spec.with_format(format);
            }
            Ok(FieldSpec::Scalar(spec))
        }
        None if obj.contains_key("properties") => Ok(FieldSpec::Object(parse_properties(
            table,
            path,
            obj.get("properties"),
        )?)),
        None => Err(unsupported(table, path, "missing `type`")),
    }
}

fn parse_array(
    table: &str,
    path: &str,
    obj: &Map<String, Value>,
) -> Result<FieldSpec, SchemaLoadError> {
    let element_path = format!("{}[]", path);
    let shapes: Vec<&Value> = match obj.get("items") {
        Some(Value::Array(items)) => items.iter().collect(),
        Some(items) if items.is_object() => {
            match items.get("anyOf").or_else(|| items.get("oneOf")) {
                Some(Value::Array(alternatives)) => alternatives.iter().collect(),
                _ => vec![items],
            }
        }
        _ => return Err(unsupported(table, path, "array without `items`")),
    };
    if shapes.is_empty() {
        return Err(unsupported(table, path, "array `items` is empty"));
    }

    let items = shapes
        .into_iter()
        .map(|shape| parse_field(table, &element_path, shape))
        .collect::<Result<Vec<_>, _>>()?;

    let count = obj
        .get(COUNT_KEYWORD)
        .or_else(|| obj.get("minItems"))
        .and_then(Value::as_u64)
        .map(|n| n as usize);

    Ok(FieldSpec::Array(ArraySpec { items, count }))
}

/// The first non-null entry of a `type` keyword (`"string"` or `["string", "null"]`)
fn primary_type<'a>(
    table: &str,
    path: &str,
    ty: Option<&'a Value>,
) -> Result<Option<&'a str>, SchemaLoadError> {
    match ty {
        None => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.as_str())),
        Some(Value::Array(types)) => Ok(types
            .iter()
            .filter_map(Value::as_str)
            .find(|t| *t != "null")),
        Some(_) => Err(unsupported(table, path, "`type` is neither a string nor an array")),
    }
}

fn flag(obj: &Map<String, Value>, key: &str) -> bool {
    obj.get(key).and_then(Value::as_bool).unwrap_or(false)
}

fn join_path(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", prefix, name)
    }
}

fn unsupported(table: &str, field: &str, reason: &str) -> SchemaLoadError {
    SchemaLoadError::Unsupported {
        table: table.to_string(),
        field: field.to_string(),
        reason: reason.to_string(),
    }
}
