//! Schema to SQL compilation.
//!
//! Produces one script: per table, a `CREATE TABLE` statement immediately
//! followed by one `INSERT INTO ... VALUES` per seed row, with no separator
//! beyond each statement's own semicolon.

use crate::error::{RippleError, Result};

use super::{CompileMode, Schema, TableSchema};

/// Output of [`compile`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledSchema {
    /// The DDL and DML script.
    pub script: String,
    /// Table names in declaration order, ready to use as a known-table list.
    pub tables: Vec<String>,
}

/// Compiles `schema` into a SQL script.
///
/// Row values are emitted in field declaration order, whatever order the
/// row itself lists them in. A row that omits a declared field, or names an
/// undeclared one, is an error.
pub fn compile(schema: &Schema, mode: CompileMode) -> Result<CompiledSchema> {
    let mut script = String::new();

    for (name, table) in schema.tables.iter() {
        if name.is_empty() {
            return Err(RippleError::schema("table name must not be empty"));
        }
        compile_table(&mut script, name, table, mode)?;
    }

    Ok(CompiledSchema {
        script,
        tables: schema.table_names(),
    })
}

fn compile_table(out: &mut String, name: &str, table: &TableSchema, mode: CompileMode) -> Result<()> {
    if table.fields.is_empty() {
        return Err(RippleError::schema(format!(
            "table '{name}' declares no fields"
        )));
    }

    let columns = table
        .fields
        .iter()
        .map(|(field, sql_type)| format!("{field} {sql_type}"))
        .collect::<Vec<_>>()
        .join(", ");
    out.push_str(&format!("{} {name} ({columns});", mode.create_table()));

    for (index, row) in table.rows.iter().enumerate() {
        if let Some(extra) = row.keys().find(|key| !table.fields.contains_key(key)) {
            return Err(RippleError::schema(format!(
                "row {index} of '{name}' has a value for undeclared field '{extra}'"
            )));
        }

        let values = table
            .fields
            .keys()
            .map(|field| {
                row.get(field).map(|v| v.to_sql()).ok_or_else(|| {
                    RippleError::schema(format!(
                        "row {index} of '{name}' has no value for field '{field}'"
                    ))
                })
            })
            .collect::<Result<Vec<_>>>()?
            .join(", ");
        out.push_str(&format!("INSERT INTO {name} VALUES ({values});"));
    }

    Ok(())
}
