//! SELECT construction with join inference.
//!
//! A caller names the source table and the columns it wants. Columns the
//! source table does not hold are looked up in the catalog to find the join
//! target, unless the caller names one. The join syntax comes from
//! [`JoinKind`].
//!
//! # Example
//!
//! ```
//! use sqldb::{Database, JoinKind, SelectOptions, TableSpec};
//!
//! let mut db = Database::open_in_memory().unwrap();
//! db.create_table(&TableSpec::new("Artists", ["Name TEXT"])).unwrap();
//! db.create_table(&TableSpec::new("Albums", ["ArtistId INTEGER", "Title TEXT"])).unwrap();
//!
//! // `Title` is not in Artists, so Albums is inferred as the join target.
//! let rows = db
//!     .select("Artists", &["Name", "Title"], SelectOptions::new().join(JoinKind::Inner).key("id"))
//!     .unwrap();
//! assert!(rows.is_empty());
//! ```

use std::fmt;
use std::str::FromStr;

use rusqlite::Connection;
use rusqlite::types::Value;
use tracing::{debug, warn};

use crate::catalog::{self, TargetResolution};
use crate::error::{Result, SqlDbError};
use crate::schema::{validate_identifier, validate_projection};

/// One result row, fields in requested column order.
pub type Row = Vec<Value>;

/// The join clause appended after `FROM <table>`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum JoinKind {
    /// No join clause.
    #[default]
    None,
    /// `LEFT JOIN <target> USING(<key>)`.
    Left,
    /// `INNER JOIN <target> USING(<key>)`.
    Inner,
    /// `CROSS JOIN <target>`.
    Cross,
    /// `NATURAL JOIN <target>`.
    Natural,
}

impl JoinKind {
    /// Whether the join needs a `USING(<key>)` column.
    pub fn needs_key(self) -> bool {
        matches!(self, Self::Left | Self::Inner)
    }

    fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Left => "left",
            Self::Inner => "inner",
            Self::Cross => "cross",
            Self::Natural => "natural",
        }
    }
}

impl fmt::Display for JoinKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JoinKind {
    type Err = SqlDbError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "none" | "null" | "" => Ok(Self::None),
            "left" => Ok(Self::Left),
            "inner" => Ok(Self::Inner),
            "cross" => Ok(Self::Cross),
            "natural" => Ok(Self::Natural),
            _ => Err(SqlDbError::InvalidJoinKind(s.to_string())),
        }
    }
}

/// Optional parts of a [`select`] call.
#[derive(Debug, Clone, Default)]
pub struct SelectOptions {
    /// Explicit join target; inferred from the columns when absent.
    pub target: Option<String>,
    /// Join kind.
    pub join: JoinKind,
    /// Column named in `USING(...)`; required for left and inner joins.
    pub key: Option<String>,
    /// Condition appended verbatim after `WHERE`.
    pub where_clause: Option<String>,
    /// Values bound to `?` placeholders in the where clause.
    pub params: Vec<Value>,
    /// Refuse to infer a join target.
    pub strict: bool,
}

impl SelectOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn target(mut self, table: impl Into<String>) -> Self {
        self.target = Some(table.into());
        self
    }

    pub fn join(mut self, kind: JoinKind) -> Self {
        self.join = kind;
        self
    }

    pub fn key(mut self, column: impl Into<String>) -> Self {
        self.key = Some(column.into());
        self
    }

    /// Sets the where clause. It is not escaped; bind data with [`bind`](Self::bind).
    pub fn filter(mut self, condition: impl Into<String>) -> Self {
        self.where_clause = Some(condition.into());
        self
    }

    pub fn bind(mut self, value: impl Into<Value>) -> Self {
        self.params.push(value.into());
        self
    }

    pub fn strict(mut self) -> Self {
        self.strict = true;
        self
    }
}

/// A fully resolved query shape, built per call and never stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinSpec {
    pub source_table: String,
    pub columns: Vec<String>,
    pub target_table: Option<String>,
    pub join_kind: JoinKind,
    pub foreign_key: Option<String>,
    pub condition: Option<String>,
}

impl JoinSpec {
    /// Resolves the join target for a query against the live catalog.
    pub fn plan<S: AsRef<str>>(
        conn: &Connection,
        table: &str,
        columns: &[S],
        options: &SelectOptions,
    ) -> Result<Self> {
        validate_identifier(table)?;
        let columns: Vec<String> = columns
            .iter()
            .map(|c| validate_projection(c.as_ref()).map(str::to_string))
            .collect::<Result<_>>()?;

        let own = catalog::column_names(conn, table)?;
        let absent: Vec<String> = columns
            .iter()
            .filter(|c| c.as_str() != "*" && !c.contains('.') && !own.contains(c))
            .cloned()
            .collect();

        let target_table = match &options.target {
            Some(target) => Some(validate_identifier(target)?.to_string()),
            None if absent.is_empty() => None,
            None if options.strict => return Err(SqlDbError::TargetRequired(absent)),
            None => Some(infer_target(conn, &absent)?),
        };

        Ok(Self {
            source_table: table.to_string(),
            columns,
            target_table,
            join_kind: options.join,
            foreign_key: options.key.clone(),
            condition: options.where_clause.clone(),
        })
    }

    /// Renders the SELECT statement.
    pub fn to_sql(&self) -> Result<String> {
        let mut sql = format!(
            "SELECT {} FROM {}",
            self.columns.join(", "),
            self.source_table
        );

        if self.join_kind != JoinKind::None {
            let target =
                self.target_table
                    .as_deref()
                    .ok_or_else(|| SqlDbError::AmbiguousOrNotFound {
                        columns: self.columns.clone(),
                        candidates: Vec::new(),
                    })?;

            match self.join_kind {
                JoinKind::Left | JoinKind::Inner => {
                    let key = self
                        .foreign_key
                        .as_deref()
                        .ok_or(SqlDbError::MissingKey(self.join_kind))?;
                    validate_identifier(key)?;
                    let keyword = if self.join_kind == JoinKind::Left { "LEFT" } else { "INNER" };
                    sql.push_str(&format!(" {keyword} JOIN {target} USING({key})"));
                }
                JoinKind::Cross => sql.push_str(&format!(" CROSS JOIN {target}")),
                JoinKind::Natural => sql.push_str(&format!(" NATURAL JOIN {target}")),
                JoinKind::None => {}
            }
        }

        if let Some(condition) = &self.condition {
            sql.push_str(" WHERE ");
            sql.push_str(condition);
        }

        Ok(sql)
    }
}

/// Picks a join target for columns missing from the source table.
///
/// An ambiguous match falls back to the alphabetically first candidate and
/// is reported at `warn`.
fn infer_target(conn: &Connection, absent: &[String]) -> Result<String> {
    match catalog::resolve_table_containing(conn, absent)? {
        TargetResolution::Resolved(table) => Ok(table),
        TargetResolution::Ambiguous(candidates) => {
            warn!(
                columns = ?absent,
                candidates = ?candidates,
                chosen = %candidates[0],
                "join target is ambiguous; using the first candidate"
            );
            Ok(candidates[0].clone())
        }
        TargetResolution::NotFound => Err(SqlDbError::AmbiguousOrNotFound {
            columns: absent.to_vec(),
            candidates: Vec::new(),
        }),
    }
}

/// Builds the SELECT statement without executing it.
pub fn build_select<S: AsRef<str>>(
    conn: &Connection,
    table: &str,
    columns: &[S],
    options: &SelectOptions,
) -> Result<String> {
    JoinSpec::plan(conn, table, columns, options)?.to_sql()
}

/// Runs a SELECT and returns every row.
///
/// # Errors
///
/// - [`SqlDbError::AmbiguousOrNotFound`] when the join target cannot be resolved
/// - [`SqlDbError::MissingKey`] when a left or inner join has no key
/// - [`SqlDbError::QueryExecution`] when the engine rejects the statement
pub fn select<S: AsRef<str>>(
    conn: &Connection,
    table: &str,
    columns: &[S],
    options: &SelectOptions,
) -> Result<Vec<Row>> {
    let sql = build_select(conn, table, columns, options)?;
    debug!(statement = %sql, params = options.params.len(), "select");

    let mut stmt = conn.prepare(&sql).map_err(|e| SqlDbError::query(&sql, e))?;
    let width = stmt.column_count();
    let rows = stmt
        .query_map(rusqlite::params_from_iter(options.params.iter()), |row| {
            (0..width).map(|i| row.get::<_, Value>(i)).collect::<rusqlite::Result<Row>>()
        })
        .and_then(|rows| rows.collect::<rusqlite::Result<Vec<_>>>())
        .map_err(|e| SqlDbError::query(&sql, e))?;

    Ok(rows)
}
