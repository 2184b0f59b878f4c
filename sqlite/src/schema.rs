//! Identifier validation and DDL generation.
//!
//! Identifiers (table and column names) cannot be bound as statement
//! parameters, so every identifier that reaches a SQL string passes through
//! [`validate_identifier`] first. Data values are always bound.
//!
//! Column *definitions* (`"Title TEXT UNIQUE"`) are trusted free-form SQL:
//! only their leading column name is validated, and statement separators are
//! rejected.

use serde::{Deserialize, Serialize};

use crate::catalog::ColumnInfo;
use crate::error::{Result, SqlDbError};

/// Name of the integer primary key added to every created table.
pub const PRIMARY_KEY: &str = "id";

/// Validates that an identifier contains only ASCII alphanumerics and
/// underscores and does not start with a digit.
pub fn validate_identifier(name: &str) -> Result<&str> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    };
    if valid {
        Ok(name)
    } else {
        Err(SqlDbError::InvalidIdentifier(name.to_string()))
    }
}

/// Validates a column reference used in a SELECT projection.
///
/// Accepts `*`, `column`, `table.column` and `table.*`.
pub(crate) fn validate_projection(column: &str) -> Result<&str> {
    if column == "*" {
        return Ok(column);
    }
    match column.split_once('.') {
        Some((table, "*")) => validate_identifier(table).map(|_| column),
        Some((table, name)) => {
            validate_identifier(table)?;
            validate_identifier(name).map(|_| column)
        }
        None => validate_identifier(column),
    }
}

/// Validates a free-form column definition and returns its column name.
pub fn definition_name(definition: &str) -> Result<&str> {
    if definition.contains(';') {
        return Err(SqlDbError::InvalidIdentifier(definition.to_string()));
    }
    let name = definition
        .split_whitespace()
        .next()
        .ok_or_else(|| SqlDbError::InvalidIdentifier(definition.to_string()))?;
    validate_identifier(name)
}

/// Splits a comma-joined field list (`"Name, Title"`) into validated names.
pub(crate) fn split_fields(fields: &str) -> Result<Vec<&str>> {
    fields
        .split(',')
        .map(|field| validate_identifier(field.trim()))
        .collect()
}

/// Shape of a table to create.
///
/// The `id INTEGER PRIMARY KEY` column is added automatically and must not
/// appear in `fields`.
///
/// # Examples
///
/// ```
/// use sqldb::TableSpec;
///
/// let spec = TableSpec::new("WebPages", ["URLS TEXT UNIQUE", "HTML TEXT"]);
/// assert_eq!(spec.fields.len(), 2);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSpec {
    /// Table name.
    pub name: String,
    /// Column definitions in declaration order, e.g. `"Title TEXT UNIQUE"`.
    pub fields: Vec<String>,
}

impl TableSpec {
    pub fn new<I, S>(name: impl Into<String>, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            fields: fields.into_iter().map(Into::into).collect(),
        }
    }
}

/// Generates the `CREATE TABLE IF NOT EXISTS` statement for a [`TableSpec`].
pub fn generate_create_sql(spec: &TableSpec) -> Result<String> {
    validate_identifier(&spec.name)?;

    let mut columns = vec![format!("{PRIMARY_KEY} INTEGER PRIMARY KEY")];
    for field in &spec.fields {
        let name = definition_name(field)?;
        if name.eq_ignore_ascii_case(PRIMARY_KEY) {
            return Err(SqlDbError::Schema(format!(
                "column '{PRIMARY_KEY}' is added automatically to table '{}'",
                spec.name
            )));
        }
        columns.push(field.trim().to_string());
    }

    Ok(format!(
        "CREATE TABLE IF NOT EXISTS {} ({})",
        spec.name,
        columns.join(", ")
    ))
}

/// Renders column definitions for a rebuilt table, in the given order.
///
/// Type, `NOT NULL`, `DEFAULT`, `UNIQUE` and primary key membership are
/// re-declared. Single-column keys and unique constraints are declared
/// inline; composite ones become trailing table constraints, with key
/// columns in key order.
pub(crate) fn column_definitions(columns: &[ColumnInfo], unique: &[Vec<String>]) -> String {
    let mut key_columns: Vec<&ColumnInfo> = columns.iter().filter(|c| c.is_primary_key()).collect();
    key_columns.sort_by_key(|c| c.primary_key);
    let inline_key = key_columns.len() == 1;

    let inline_unique = |name: &str| {
        unique
            .iter()
            .any(|u| u.len() == 1 && u[0].eq_ignore_ascii_case(name))
    };

    let mut definitions: Vec<String> = columns
        .iter()
        .map(|column| {
            let mut def = column.name.clone();
            if !column.decl_type.is_empty() {
                def.push(' ');
                def.push_str(&column.decl_type);
            }
            if inline_key && column.is_primary_key() {
                def.push_str(" PRIMARY KEY");
            }
            if column.notnull {
                def.push_str(" NOT NULL");
            }
            if inline_unique(&column.name) {
                def.push_str(" UNIQUE");
            }
            if let Some(default) = &column.default {
                def.push_str(&format!(" DEFAULT ({default})"));
            }
            def
        })
        .collect();

    if key_columns.len() > 1 {
        let names: Vec<&str> = key_columns.iter().map(|c| c.name.as_str()).collect();
        definitions.push(format!("PRIMARY KEY ({})", names.join(", ")));
    }
    for constraint in unique.iter().filter(|u| u.len() > 1) {
        definitions.push(format!("UNIQUE ({})", constraint.join(", ")));
    }

    definitions.join(", ")
}
