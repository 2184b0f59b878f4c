//! Error types for database, query, and migration operations.
//!
//! Every failure surfaces immediately to the caller. Nothing is retried: an
//! embedded single-process engine has no transient failure class.

use thiserror::Error;

use crate::query::JoinKind;

/// Errors that can occur while working with a [`Database`](crate::Database).
#[derive(Debug, Error)]
pub enum SqlDbError {
    /// The database file could not be opened.
    #[error("connection error: {0}")]
    Connection(#[source] rusqlite::Error),

    /// A table or column existence rule was violated.
    #[error("schema error: {0}")]
    Schema(String),

    /// The named column does not exist in the table.
    #[error("column '{column}' not found in table '{table}'")]
    ColumnNotFound { table: String, column: String },

    /// An alteration name outside the four supported operations.
    #[error("unknown alter operation '{0}': expected rename_table, add_column, drop_column or rename_column")]
    UnknownOperation(String),

    /// A join kind name that does not map to [`JoinKind`].
    #[error("invalid join kind '{0}': expected none, left, inner, cross or natural")]
    InvalidJoinKind(String),

    /// No table (or no unambiguous table) holds the requested columns.
    #[error("no table resolves columns [{}] (candidates: [{}])", .columns.join(", "), .candidates.join(", "))]
    AmbiguousOrNotFound {
        columns: Vec<String>,
        candidates: Vec<String>,
    },

    /// Join inference was needed but strict mode demands an explicit target.
    #[error("columns [{}] are not in the source table and no join target was given", .0.join(", "))]
    TargetRequired(Vec<String>),

    /// A keyed join was requested without a join key.
    #[error("{0} join requires a key column")]
    MissingKey(JoinKind),

    /// The number of values does not match the number of named fields.
    #[error("expected {expected} values, got {actual}")]
    ArityMismatch { expected: usize, actual: usize },

    /// The table has no rows.
    #[error("table '{0}' is empty")]
    EmptyTable(String),

    /// Identifier contains characters outside `[A-Za-z0-9_]`.
    #[error("invalid identifier '{0}': must contain only ASCII alphanumeric characters and underscores")]
    InvalidIdentifier(String),

    /// The engine rejected a statement.
    #[error("query failed: {source}\n  statement: {statement}")]
    QueryExecution {
        statement: String,
        #[source]
        source: rusqlite::Error,
    },

    /// The rebuild script template is malformed.
    #[error("rebuild template error: {0}")]
    Template(String),

    /// File I/O failure while loading a template.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing failure while loading a template.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SqlDbError {
    /// Wraps an engine error together with the statement that produced it.
    pub(crate) fn query(statement: impl Into<String>, source: rusqlite::Error) -> Self {
        Self::QueryExecution {
            statement: statement.into(),
            source,
        }
    }
}

/// Convenience alias for results with [`SqlDbError`].
pub type Result<T> = std::result::Result<T, SqlDbError>;
