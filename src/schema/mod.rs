//! Declarative schema definitions.
//!
//! A schema maps table names to their fields and optional seed rows. It can
//! be built in code or loaded from a JSON or TOML file, and is turned into a
//! single SQL script by [`compile`].

mod compiler;
mod ordered;

pub use compiler::{compile, CompiledSchema};
pub use ordered::OrderedMap;

use crate::error::{RippleError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use tracing::info;

/// SQL type tags accepted in field declarations.
///
/// These are forwarded verbatim into the generated DDL and never checked
/// against what the engine supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SqlType {
    Null,
    Real,
    Integer,
    Int,
    Text,
    Blob,
    Date,
    True,
    False,
}

impl SqlType {
    /// Returns the tag as written in DDL.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Null => "NULL",
            Self::Real => "REAL",
            Self::Integer => "INTEGER",
            Self::Int => "INT",
            Self::Text => "TEXT",
            Self::Blob => "BLOB",
            Self::Date => "DATE",
            Self::True => "TRUE",
            Self::False => "FALSE",
        }
    }
}

impl fmt::Display for SqlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A value in a seed row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RowValue {
    /// Rendered as a bare numeral.
    Integer(i64),
    /// Rendered as a bare numeral.
    Real(f64),
    /// Rendered single-quoted, verbatim. Embedded quotes are not escaped.
    Text(String),
    /// Rendered as raw SQL, e.g. `plusFive(10)`, evaluated by the engine.
    Function { func: String },
}

impl RowValue {
    /// Creates a function-call value.
    pub fn function(call: impl Into<String>) -> Self {
        Self::Function { func: call.into() }
    }

    /// Renders the value as a SQL literal or expression.
    pub fn to_sql(&self) -> String {
        match self {
            Self::Integer(i) => i.to_string(),
            Self::Real(f) => f.to_string(),
            Self::Text(s) => format!("'{s}'"),
            Self::Function { func } => func.clone(),
        }
    }
}

impl From<i64> for RowValue {
    fn from(v: i64) -> Self {
        Self::Integer(v)
    }
}

impl From<i32> for RowValue {
    fn from(v: i32) -> Self {
        Self::Integer(v as i64)
    }
}

impl From<f64> for RowValue {
    fn from(v: f64) -> Self {
        Self::Real(v)
    }
}

impl From<&str> for RowValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for RowValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

/// Definition of one table: ordered fields plus optional seed rows.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TableSchema {
    /// Field name to type tag, in column order.
    pub fields: OrderedMap<SqlType>,

    /// Seed rows. Every row must give a value for every declared field.
    #[serde(default, alias = "values", skip_serializing_if = "Vec::is_empty")]
    pub rows: Vec<OrderedMap<RowValue>>,
}

impl TableSchema {
    /// Creates an empty table definition.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a field declaration.
    pub fn field(mut self, name: impl Into<String>, sql_type: SqlType) -> Self {
        self.fields.insert(name, sql_type);
        self
    }

    /// Appends a seed row.
    pub fn row<K, V, I>(mut self, values: I) -> Self
    where
        K: Into<String>,
        V: Into<RowValue>,
        I: IntoIterator<Item = (K, V)>,
    {
        self.rows.push(
            values
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        );
        self
    }
}

/// A whole schema: table name to definition, in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Schema {
    pub tables: OrderedMap<TableSchema>,
}

impl Schema {
    /// Creates an empty schema.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a table definition.
    pub fn table(mut self, name: impl Into<String>, table: TableSchema) -> Self {
        self.tables.insert(name, table);
        self
    }

    /// Returns the table names in declaration order.
    pub fn table_names(&self) -> Vec<String> {
        self.tables.keys().map(str::to_string).collect()
    }

    /// Parses a schema from JSON.
    pub fn from_json_str(content: &str) -> Result<Self> {
        serde_json::from_str(content)
            .map_err(|e| RippleError::schema(format!("Invalid JSON schema: {e}")))
    }

    /// Parses a schema from TOML.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| RippleError::schema(format!("Invalid TOML schema: {e}")))
    }

    /// Loads a schema file, choosing the format by extension (`.toml`, otherwise JSON).
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            RippleError::io(format!("Failed to read schema {}: {e}", path.display()))
        })?;

        let is_toml = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));

        let schema = if is_toml {
            Self::from_toml_str(&content)?
        } else {
            Self::from_json_str(&content)?
        };
        info!(
            "Loaded schema {} with {} tables",
            path.display(),
            schema.tables.len()
        );
        Ok(schema)
    }
}

/// Whether generated DDL may assume the tables do not exist yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompileMode {
    /// Plain `CREATE TABLE`.
    #[default]
    Fresh,
    /// `CREATE TABLE IF NOT EXISTS`, used when resuming from a prior image.
    Cautious,
}

impl CompileMode {
    /// Picks the mode from the prior database image, if any.
    pub fn for_data(data: Option<&[u8]>) -> Self {
        match data {
            Some(bytes) if !bytes.is_empty() => Self::Cautious,
            _ => Self::Fresh,
        }
    }

    /// Returns the `CREATE TABLE` prefix for this mode.
    pub fn create_table(&self) -> &'static str {
        match self {
            Self::Fresh => "CREATE TABLE",
            Self::Cautious => "CREATE TABLE IF NOT EXISTS",
        }
    }
}

/// A schema together with the database image it should be applied to.
#[derive(Debug, Clone, Default)]
pub struct SchemaSource {
    pub schema: Schema,
    pub data: Option<Vec<u8>>,
}

impl SchemaSource {
    /// Creates a source with no prior image.
    pub fn new(schema: Schema) -> Self {
        Self { schema, data: None }
    }

    /// Attaches a prior database image.
    pub fn with_data(mut self, data: Vec<u8>) -> Self {
        self.data = Some(data);
        self
    }

    /// Loads the schema file and, if given, the image file.
    pub fn load(schema_path: Option<&Path>, data_path: Option<&Path>) -> Result<Self> {
        let schema = match schema_path {
            Some(path) => Schema::load(path)?,
            None => Schema::default(),
        };

        let data = match data_path {
            Some(path) => Some(std::fs::read(path).map_err(|e| {
                RippleError::io(format!("Failed to read data file {}: {e}", path.display()))
            })?),
            None => None,
        };

        Ok(Self { schema, data })
    }

    /// Returns the compilation mode implied by the image.
    pub fn mode(&self) -> CompileMode {
        CompileMode::for_data(self.data.as_deref())
    }

    /// Compiles the schema in the implied mode.
    pub fn compile(&self) -> Result<CompiledSchema> {
        compile(&self.schema, self.mode())
    }
}
