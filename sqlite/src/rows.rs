//! Row-level writes and lookups.
//!
//! Data values are always bound as statement parameters; only table and
//! column names are interpolated, after validation.

use rusqlite::types::ToSql;
use rusqlite::{Connection, OptionalExtension, params};
use tracing::debug;

use crate::error::{Result, SqlDbError};
use crate::schema::{PRIMARY_KEY, split_fields, validate_identifier};

/// Inserts one row with `INSERT OR IGNORE`.
///
/// `fields` is a comma-joined list of column names (`"Name, Title"`), one
/// per value in `data`. A row that violates a uniqueness constraint is
/// skipped silently; that is the only engine condition this crate swallows.
/// The return value is the number of rows inserted, so `0` means skipped.
///
/// # Errors
///
/// Returns [`SqlDbError::ArityMismatch`] when `data` and `fields` differ in
/// length.
pub fn write(conn: &Connection, table: &str, fields: &str, data: &[&dyn ToSql]) -> Result<usize> {
    validate_identifier(table)?;
    let names = split_fields(fields)?;
    if names.len() != data.len() {
        return Err(SqlDbError::ArityMismatch {
            expected: names.len(),
            actual: data.len(),
        });
    }

    let placeholders: Vec<String> = (1..=data.len()).map(|i| format!("?{i}")).collect();
    let sql = format!(
        "INSERT OR IGNORE INTO {table} ({}) VALUES ({})",
        names.join(", "),
        placeholders.join(", ")
    );
    debug!(statement = %sql, "write");

    conn.execute(&sql, data).map_err(|e| SqlDbError::query(&sql, e))
}

/// Sets `field` to `value` on the row whose `id` is `id`.
///
/// Returns the number of rows changed (`0` when no row has that id).
pub fn update_row(
    conn: &Connection,
    table: &str,
    field: &str,
    id: i64,
    value: &dyn ToSql,
) -> Result<usize> {
    validate_identifier(table)?;
    validate_identifier(field)?;
    let sql = format!("UPDATE {table} SET {field} = ?1 WHERE {PRIMARY_KEY} = ?2");
    debug!(statement = %sql, id, "update row");

    conn.execute(&sql, params![value, id])
        .map_err(|e| SqlDbError::query(&sql, e))
}

/// Returns the highest `id` in the table.
///
/// # Errors
///
/// Returns [`SqlDbError::EmptyTable`] when the table has no rows.
pub fn max_id(conn: &Connection, table: &str) -> Result<i64> {
    validate_identifier(table)?;
    let sql = format!("SELECT {PRIMARY_KEY} FROM {table} ORDER BY {PRIMARY_KEY} DESC LIMIT 1");

    conn.query_row(&sql, [], |row| row.get::<_, i64>(0))
        .optional()
        .map_err(|e| SqlDbError::query(&sql, e))?
        .ok_or_else(|| SqlDbError::EmptyTable(table.to_string()))
}

/// Deletes every row whose `field` is NULL and returns how many went.
pub fn delete_null_rows(conn: &Connection, table: &str, field: &str) -> Result<usize> {
    validate_identifier(table)?;
    validate_identifier(field)?;
    let sql = format!("DELETE FROM {table} WHERE {field} IS NULL");
    debug!(statement = %sql, "delete null rows");

    conn.execute(&sql, []).map_err(|e| SqlDbError::query(&sql, e))
}

/// Counts the rows in a table.
pub fn row_count(conn: &Connection, table: &str) -> Result<usize> {
    validate_identifier(table)?;
    let sql = format!("SELECT COUNT(*) FROM {table}");
    let count: i64 = conn
        .query_row(&sql, [], |row| row.get(0))
        .map_err(|e| SqlDbError::query(&sql, e))?;
    Ok(count as usize)
}
