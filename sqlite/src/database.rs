//! The [`Database`] session: one owned connection plus the rebuild template.
//!
//! Row writes open a deferred transaction lazily and stay pending until
//! [`save`](Database::save). Dropping the session without saving rolls them
//! back. Catalog reads and queries see pending writes.

use std::path::Path;

use rusqlite::Connection;
use rusqlite::types::ToSql;
use tracing::{debug, info};

use crate::catalog::{self, ColumnInfo, TargetResolution};
use crate::error::{Result, SqlDbError};
use crate::migration::{Alteration, Migrator};
use crate::query::{self, Row, SelectOptions};
use crate::rows;
use crate::schema::{TableSpec, generate_create_sql};
use crate::script::RebuildScript;

/// A single-connection session over a SQLite database.
///
/// Every operation runs synchronously on the one connection. Methods that
/// change data or schema take `&mut self`, so a session cannot interleave a
/// rebuild with other writes. Separate processes writing the same file must
/// serialize table migrations themselves.
///
/// # Examples
///
/// ```
/// use sqldb::{Database, SelectOptions, TableSpec};
/// use rusqlite::params;
///
/// let mut db = Database::open_in_memory().unwrap();
/// db.create_table(&TableSpec::new("WebPages", ["URLS TEXT UNIQUE", "TITLE TEXT"])).unwrap();
///
/// db.write("WebPages", "URLS, TITLE", params!["https://example.com", "Example"]).unwrap();
/// db.save().unwrap();
///
/// let rows = db.select("WebPages", &["TITLE"], SelectOptions::new()).unwrap();
/// assert_eq!(rows.len(), 1);
/// ```
pub struct Database {
    conn: Connection,
    script: RebuildScript,
}

impl Database {
    /// Opens (or creates) a database file.
    ///
    /// # Errors
    ///
    /// Returns [`SqlDbError::Connection`] if the file cannot be opened.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let conn = Connection::open(path).map_err(SqlDbError::Connection)?;
        info!(path = %path.display(), sqlite = rusqlite::version(), "connected");
        Self::from_connection(conn)
    }

    /// Opens a private in-memory database.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(SqlDbError::Connection)?;
        Self::from_connection(conn)
    }

    /// Wraps an already open connection, using the embedded rebuild template.
    pub fn from_connection(conn: Connection) -> Result<Self> {
        Ok(Self {
            conn,
            script: RebuildScript::embedded()?,
        })
    }

    /// Replaces the rebuild template used by column drop and rename.
    pub fn with_rebuild_script(mut self, script: RebuildScript) -> Self {
        self.script = script;
        self
    }

    /// Creates a table with an `id INTEGER PRIMARY KEY` followed by the
    /// spec's fields. Does nothing if the table already exists.
    pub fn create_table(&mut self, spec: &TableSpec) -> Result<()> {
        let sql = generate_create_sql(spec)?;
        debug!(statement = %sql, "create table");
        self.conn
            .execute_batch(&sql)
            .map_err(|e| SqlDbError::query(&sql, e))?;
        info!(table = %spec.name, fields = spec.fields.len(), "created table");
        Ok(())
    }

    /// See [`catalog::list_tables`].
    pub fn list_tables(&self) -> Result<Vec<String>> {
        catalog::list_tables(&self.conn)
    }

    /// See [`catalog::column_info`]. Read fresh on every call.
    pub fn column_info(&self, table: &str) -> Result<Vec<ColumnInfo>> {
        catalog::column_info(&self.conn, table)
    }

    /// See [`catalog::column_names`]. Read fresh on every call.
    pub fn column_names(&self, table: &str) -> Result<Vec<String>> {
        catalog::column_names(&self.conn, table)
    }

    /// See [`catalog::find_table_containing`]; first alphabetical match wins.
    pub fn find_table_containing<S: AsRef<str>>(&self, columns: &[S]) -> Result<String> {
        catalog::find_table_containing(&self.conn, columns)
    }

    /// See [`catalog::resolve_table_containing`].
    pub fn resolve_table_containing<S: AsRef<str>>(
        &self,
        columns: &[S],
    ) -> Result<TargetResolution> {
        catalog::resolve_table_containing(&self.conn, columns)
    }

    /// Runs a SELECT with optional join inference. See [`query::select`].
    pub fn select<S: AsRef<str>>(
        &self,
        table: &str,
        columns: &[S],
        options: SelectOptions,
    ) -> Result<Vec<Row>> {
        query::select(&self.conn, table, columns, &options)
    }

    /// Returns the SELECT statement [`select`](Self::select) would run.
    pub fn build_select<S: AsRef<str>>(
        &self,
        table: &str,
        columns: &[S],
        options: &SelectOptions,
    ) -> Result<String> {
        query::build_select(&self.conn, table, columns, options)
    }

    /// Inserts one row, skipping it on a uniqueness violation.
    /// See [`rows::write`].
    pub fn write(&mut self, table: &str, fields: &str, data: &[&dyn ToSql]) -> Result<usize> {
        self.begin_pending()?;
        rows::write(&self.conn, table, fields, data)
    }

    /// Sets one field on the row with the given `id`. See [`rows::update_row`].
    pub fn update_row(
        &mut self,
        table: &str,
        field: &str,
        id: i64,
        value: &dyn ToSql,
    ) -> Result<usize> {
        self.begin_pending()?;
        rows::update_row(&self.conn, table, field, id, value)
    }

    /// See [`rows::max_id`].
    pub fn max_id(&self, table: &str) -> Result<i64> {
        rows::max_id(&self.conn, table)
    }

    /// See [`rows::delete_null_rows`].
    pub fn delete_null_rows(&mut self, table: &str, field: &str) -> Result<usize> {
        self.begin_pending()?;
        rows::delete_null_rows(&self.conn, table, field)
    }

    /// See [`rows::row_count`].
    pub fn row_count(&self, table: &str) -> Result<usize> {
        rows::row_count(&self.conn, table)
    }

    /// Commits every write made since the last save.
    ///
    /// Must be called before the session ends or pending writes are lost.
    pub fn save(&mut self) -> Result<()> {
        if self.conn.is_autocommit() {
            return Ok(());
        }
        info!("saving pending writes");
        self.conn
            .execute_batch("COMMIT")
            .map_err(|e| SqlDbError::query("COMMIT", e))
    }

    /// Whether there are writes waiting for [`save`](Self::save).
    pub fn has_pending_writes(&self) -> bool {
        !self.conn.is_autocommit()
    }

    /// Applies a schema change. See [`Migrator::alter`].
    pub fn alter(&mut self, table: &str, alteration: Alteration) -> Result<()> {
        Migrator::new(&mut self.conn, &self.script).alter(table, &alteration)
    }

    pub fn rename_table(&mut self, old: &str, new: &str) -> Result<()> {
        Migrator::new(&mut self.conn, &self.script).rename_table(old, new)
    }

    pub fn add_column(&mut self, table: &str, definition: &str) -> Result<()> {
        Migrator::new(&mut self.conn, &self.script).add_column(table, definition)
    }

    pub fn drop_column(&mut self, table: &str, column: &str) -> Result<()> {
        Migrator::new(&mut self.conn, &self.script).drop_column(table, column)
    }

    pub fn rename_column(&mut self, table: &str, column: &str, new_name: &str) -> Result<()> {
        Migrator::new(&mut self.conn, &self.script).rename_column(table, column, new_name)
    }

    /// Returns a reference to the underlying connection.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Consumes the session and returns the underlying connection.
    pub fn into_connection(self) -> Connection {
        self.conn
    }

    fn begin_pending(&self) -> Result<()> {
        if self.conn.is_autocommit() {
            self.conn
                .execute_batch("BEGIN DEFERRED")
                .map_err(|e| SqlDbError::query("BEGIN DEFERRED", e))?;
        }
        Ok(())
    }
}
