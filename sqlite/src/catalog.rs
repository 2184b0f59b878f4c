//! Catalog introspection over SQLite's internal metadata.
//!
//! Every function here reads the engine's catalog on each call. Nothing is
//! cached: the schema can change between calls (a rebuild replaces the
//! table wholesale), so the engine stays the only source of truth. Callers
//! that need a stable view across several calls should take one snapshot
//! with [`column_info`] and work from it.

use std::collections::HashSet;

use rusqlite::{Connection, params};
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{Result, SqlDbError};
use crate::schema::validate_identifier;

// `_` is a LIKE wildcard and must be escaped.
const LIST_TABLES_SQL: &str = "SELECT name FROM sqlite_master \
     WHERE type = 'table' AND name NOT LIKE 'sqlite\\_%' ESCAPE '\\' ORDER BY name";

const TABLE_INFO_SQL: &str = "SELECT cid, name, type, \"notnull\", dflt_value, pk \
     FROM pragma_table_info(?1) ORDER BY cid";

const UNIQUE_CONSTRAINTS_SQL: &str = "SELECT il.name, ii.name \
     FROM pragma_index_list(?1) AS il JOIN pragma_index_info(il.name) AS ii \
     WHERE il.origin = 'u' ORDER BY il.seq, ii.seqno";

/// Metadata for one column, as reported by `PRAGMA table_info`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnInfo {
    /// Zero-based position in storage order.
    pub ordinal: usize,
    /// Column name.
    pub name: String,
    /// Declared type (may be empty for untyped columns).
    pub decl_type: String,
    /// Whether the column carries a `NOT NULL` constraint.
    pub notnull: bool,
    /// Default value expression as written in the table definition.
    pub default: Option<String>,
    /// One-based position in the primary key, `0` when not part of it.
    pub primary_key: usize,
}

impl ColumnInfo {
    /// Whether the column is part of the primary key.
    pub fn is_primary_key(&self) -> bool {
        self.primary_key > 0
    }
}

/// Outcome of searching the catalog for a table holding a set of columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetResolution {
    /// Exactly one table holds every column.
    Resolved(String),
    /// Several tables qualify, listed in alphabetical order.
    Ambiguous(Vec<String>),
    /// No table holds every column.
    NotFound,
}

/// Returns every user table name in alphabetical order.
///
/// SQLite's internal `sqlite_*` tables are excluded.
pub fn list_tables(conn: &Connection) -> Result<Vec<String>> {
    let mut stmt = conn
        .prepare(LIST_TABLES_SQL)
        .map_err(|e| SqlDbError::query(LIST_TABLES_SQL, e))?;
    let tables = stmt
        .query_map([], |row| row.get::<_, String>(0))
        .and_then(|rows| rows.collect::<std::result::Result<Vec<_>, _>>())
        .map_err(|e| SqlDbError::query(LIST_TABLES_SQL, e))?;
    Ok(tables)
}

/// Returns the stored name of the user table matching `table`, compared
/// case-insensitively like SQLite itself resolves table names.
pub fn stored_table_name(conn: &Connection, table: &str) -> Result<Option<String>> {
    Ok(list_tables(conn)?
        .into_iter()
        .find(|t| t.eq_ignore_ascii_case(table)))
}

/// Returns whether a user table with this name exists.
pub fn table_exists(conn: &Connection, table: &str) -> Result<bool> {
    Ok(stored_table_name(conn, table)?.is_some())
}

/// Returns full column metadata for `table` in storage order.
///
/// # Errors
///
/// Returns [`SqlDbError::Schema`] if the table does not exist.
pub fn column_info(conn: &Connection, table: &str) -> Result<Vec<ColumnInfo>> {
    validate_identifier(table)?;
    let mut stmt = conn
        .prepare(TABLE_INFO_SQL)
        .map_err(|e| SqlDbError::query(TABLE_INFO_SQL, e))?;
    let columns = stmt
        .query_map(params![table], |row| {
            Ok(ColumnInfo {
                ordinal: row.get::<_, i64>(0)? as usize,
                name: row.get(1)?,
                decl_type: row.get(2)?,
                notnull: row.get::<_, i64>(3)? != 0,
                default: row.get(4)?,
                primary_key: row.get::<_, i64>(5)? as usize,
            })
        })
        .and_then(|rows| rows.collect::<std::result::Result<Vec<_>, _>>())
        .map_err(|e| SqlDbError::query(TABLE_INFO_SQL, e))?;

    if columns.is_empty() {
        return Err(SqlDbError::Schema(format!("no such table: {table}")));
    }
    Ok(columns)
}

/// Returns the column names of `table` in storage order.
pub fn column_names(conn: &Connection, table: &str) -> Result<Vec<String>> {
    Ok(column_info(conn, table)?
        .into_iter()
        .map(|c| c.name)
        .collect())
}

/// Returns the `UNIQUE` constraints declared on `table`, each as its column
/// names in constraint order.
///
/// Primary keys and indexes created with `CREATE INDEX` are not included.
pub fn unique_constraints(conn: &Connection, table: &str) -> Result<Vec<Vec<String>>> {
    validate_identifier(table)?;
    let mut stmt = conn
        .prepare(UNIQUE_CONSTRAINTS_SQL)
        .map_err(|e| SqlDbError::query(UNIQUE_CONSTRAINTS_SQL, e))?;
    let entries = stmt
        .query_map(params![table], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })
        .and_then(|rows| rows.collect::<std::result::Result<Vec<_>, _>>())
        .map_err(|e| SqlDbError::query(UNIQUE_CONSTRAINTS_SQL, e))?;

    let mut constraints: Vec<(String, Vec<String>)> = Vec::new();
    for (index, column) in entries {
        match constraints.last_mut() {
            Some((name, columns)) if *name == index => columns.push(column),
            _ => constraints.push((index, vec![column])),
        }
    }
    Ok(constraints.into_iter().map(|(_, columns)| columns).collect())
}

/// Searches every table for one whose columns include all of `columns`.
///
/// Tables are scanned in [`list_tables`] order and every qualifying table is
/// reported, so callers can tell a unique match from an ambiguous one.
pub fn resolve_table_containing<S: AsRef<str>>(
    conn: &Connection,
    columns: &[S],
) -> Result<TargetResolution> {
    let mut candidates = Vec::new();
    for table in list_tables(conn)? {
        // Tables created outside this crate may carry names the identifier
        // rules reject; they can never be join targets.
        if validate_identifier(&table).is_err() {
            continue;
        }
        let names: HashSet<String> = column_names(conn, &table)?.into_iter().collect();
        if columns.iter().all(|c| names.contains(c.as_ref())) {
            candidates.push(table);
        }
    }

    debug!(
        columns = ?columns.iter().map(AsRef::as_ref).collect::<Vec<_>>(),
        candidates = ?candidates,
        "resolved join target candidates"
    );

    Ok(match candidates.len() {
        0 => TargetResolution::NotFound,
        1 => TargetResolution::Resolved(candidates.remove(0)),
        _ => TargetResolution::Ambiguous(candidates),
    })
}

/// Returns the first table, alphabetically, whose columns include all of
/// `columns`.
///
/// This is a best-effort heuristic: when several tables qualify the
/// alphabetically first one wins, which may not be the table the caller
/// meant. The choice is logged at `warn`. Pass an explicit join target, or
/// use [`resolve_table_containing`], when that matters.
///
/// # Errors
///
/// Returns [`SqlDbError::AmbiguousOrNotFound`] if no table qualifies.
pub fn find_table_containing<S: AsRef<str>>(conn: &Connection, columns: &[S]) -> Result<String> {
    match resolve_table_containing(conn, columns)? {
        TargetResolution::Resolved(table) => Ok(table),
        TargetResolution::Ambiguous(mut candidates) => {
            warn!(
                chosen = %candidates[0],
                candidates = ?candidates,
                "several tables hold the requested columns; using the first"
            );
            Ok(candidates.remove(0))
        }
        TargetResolution::NotFound => Err(SqlDbError::AmbiguousOrNotFound {
            columns: columns.iter().map(|c| c.as_ref().to_string()).collect(),
            candidates: Vec::new(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE Artists (id INTEGER PRIMARY KEY, Name TEXT NOT NULL);
             CREATE TABLE Albums (id INTEGER PRIMARY KEY, ArtistId INTEGER, Title TEXT DEFAULT 'untitled');
             CREATE TABLE Singles (id INTEGER PRIMARY KEY, Title TEXT);",
        )
        .unwrap();
        conn
    }

    #[test]
    fn test_list_tables_sorted() {
        let conn = fixture();
        assert_eq!(list_tables(&conn).unwrap(), vec!["Albums", "Artists", "Singles"]);
    }

    #[test]
    fn test_list_tables_skips_internal() {
        let conn = fixture();
        conn.execute_batch("CREATE TABLE seq (id INTEGER PRIMARY KEY AUTOINCREMENT, v TEXT);")
            .unwrap();
        let tables = list_tables(&conn).unwrap();
        assert!(tables.contains(&"seq".to_string()));
        assert!(!tables.iter().any(|t| t.starts_with("sqlite_")));
    }

    #[test]
    fn test_list_tables_keeps_sqlite_prefixed_user_tables() {
        let conn = fixture();
        conn.execute_batch(
            "CREATE TABLE SqliteStats (id INTEGER PRIMARY KEY);
             CREATE TABLE sqlites (id INTEGER PRIMARY KEY);",
        )
        .unwrap();
        let tables = list_tables(&conn).unwrap();
        assert!(tables.contains(&"SqliteStats".to_string()));
        assert!(tables.contains(&"sqlites".to_string()));
        assert!(table_exists(&conn, "SqliteStats").unwrap());
    }

    #[test]
    fn test_table_lookup_ignores_case() {
        let conn = fixture();
        assert_eq!(stored_table_name(&conn, "artists").unwrap().as_deref(), Some("Artists"));
        assert!(table_exists(&conn, "ALBUMS").unwrap());
        assert_eq!(stored_table_name(&conn, "Genres").unwrap(), None);
    }

    #[test]
    fn test_composite_key_positions() {
        let conn = fixture();
        conn.execute_batch("CREATE TABLE Tracks (b INTEGER, a INTEGER, PRIMARY KEY (a, b));")
            .unwrap();
        let info = column_info(&conn, "Tracks").unwrap();
        assert_eq!(info[0].primary_key, 2);
        assert_eq!(info[1].primary_key, 1);
    }

    #[test]
    fn test_unique_constraints() {
        let conn = fixture();
        conn.execute_batch(
            "CREATE TABLE Pages (id INTEGER PRIMARY KEY, Url TEXT UNIQUE, Host TEXT, Path TEXT,
                                 UNIQUE (Host, Path));
             CREATE INDEX pages_path ON Pages (Path);",
        )
        .unwrap();
        let mut constraints = unique_constraints(&conn, "Pages").unwrap();
        constraints.sort();
        assert_eq!(
            constraints,
            vec![
                vec!["Host".to_string(), "Path".to_string()],
                vec!["Url".to_string()],
            ]
        );
        assert!(unique_constraints(&conn, "Artists").unwrap().is_empty());
    }

    #[test]
    fn test_column_info_reports_metadata() {
        let conn = fixture();
        let info = column_info(&conn, "Albums").unwrap();
        assert_eq!(info.len(), 3);
        assert_eq!(info[0].name, "id");
        assert!(info[0].is_primary_key());
        assert_eq!(info[2].decl_type, "TEXT");
        assert_eq!(info[2].default.as_deref(), Some("'untitled'"));

        let artists = column_info(&conn, "Artists").unwrap();
        assert!(artists[1].notnull);
        assert!(!artists[1].is_primary_key());
    }

    #[test]
    fn test_column_info_missing_table() {
        let conn = fixture();
        assert!(matches!(column_info(&conn, "Nope"), Err(SqlDbError::Schema(_))));
    }

    #[test]
    fn test_column_names_order() {
        let conn = fixture();
        assert_eq!(column_names(&conn, "Albums").unwrap(), vec!["id", "ArtistId", "Title"]);
    }

    #[test]
    fn test_resolution_variants() {
        let conn = fixture();
        assert_eq!(
            resolve_table_containing(&conn, &["ArtistId"]).unwrap(),
            TargetResolution::Resolved("Albums".to_string())
        );
        assert_eq!(
            resolve_table_containing(&conn, &["Title"]).unwrap(),
            TargetResolution::Ambiguous(vec!["Albums".to_string(), "Singles".to_string()])
        );
        assert_eq!(
            resolve_table_containing(&conn, &["Genre"]).unwrap(),
            TargetResolution::NotFound
        );
    }

    #[test]
    fn test_find_table_containing_first_match_wins() {
        let conn = fixture();
        assert_eq!(find_table_containing(&conn, &["Title"]).unwrap(), "Albums");
        assert!(matches!(
            find_table_containing(&conn, &["Title", "Genre"]),
            Err(SqlDbError::AmbiguousOrNotFound { .. })
        ));
    }
}
