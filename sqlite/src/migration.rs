//! Schema changes: rename table, add column, drop column, rename column.
//!
//! Renaming a table and adding a column map to single `ALTER TABLE`
//! statements. Dropping and renaming a column go through a table REBUILD:
//! a shadow table with the new shape is created, the data is copied across
//! with explicit column lists, the original is dropped and the shadow takes
//! its name. The script comes from a [`RebuildScript`] template.
//!
//! The rebuild runs inside a savepoint, so it either replaces the table
//! completely or leaves it untouched. When the session already has pending
//! writes the savepoint nests inside that transaction and the rebuild
//! becomes durable with the next [`save`](crate::Database::save); otherwise
//! it is committed on completion.
//!
//! The rebuilt table keeps the primary key and every `UNIQUE` constraint
//! that does not involve a dropped column. Indexes created with
//! `CREATE INDEX`, triggers, `CHECK` and foreign key constraints are not
//! carried over.
//!
//! # Example
//!
//! ```
//! use sqldb::{Alteration, Database, TableSpec};
//!
//! let mut db = Database::open_in_memory().unwrap();
//! db.create_table(&TableSpec::new("Customers", ["Name TEXT", "gender TEXT"])).unwrap();
//!
//! db.alter("Customers", Alteration::DropColumn { column: "gender".into() }).unwrap();
//! assert_eq!(db.column_names("Customers").unwrap(), vec!["id", "Name"]);
//! ```

use rusqlite::Connection;
use tracing::{debug, info, warn};

use crate::catalog::{self, ColumnInfo};
use crate::error::{Result, SqlDbError};
use crate::schema::{PRIMARY_KEY, column_definitions, definition_name, validate_identifier};
use crate::script::RebuildScript;

/// One schema change against a single table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Alteration {
    /// `ALTER TABLE <table> RENAME TO <new_name>`.
    RenameTable { new_name: String },
    /// `ALTER TABLE <table> ADD COLUMN <definition>`.
    AddColumn { definition: String },
    /// Rebuild without `column`.
    DropColumn { column: String },
    /// Rebuild with `column` renamed to `new_name`.
    RenameColumn { column: String, new_name: String },
}

impl Alteration {
    /// Builds an alteration from its operation name and arguments.
    ///
    /// Accepted names are `rename_table`, `add_column`, `drop_column` and
    /// `rename_column` (dashes are accepted in place of underscores).
    ///
    /// # Errors
    ///
    /// Returns [`SqlDbError::UnknownOperation`] for any other name and
    /// [`SqlDbError::ArityMismatch`] when the argument count is wrong.
    pub fn parse<S: AsRef<str>>(operation: &str, args: &[S]) -> Result<Self> {
        let expected = match operation.replace('-', "_").as_str() {
            "rename_table" | "add_column" | "drop_column" => 1,
            "rename_column" => 2,
            _ => return Err(SqlDbError::UnknownOperation(operation.to_string())),
        };
        if args.len() != expected {
            return Err(SqlDbError::ArityMismatch {
                expected,
                actual: args.len(),
            });
        }

        let arg = |i: usize| args[i].as_ref().to_string();
        Ok(match operation.replace('-', "_").as_str() {
            "rename_table" => Self::RenameTable { new_name: arg(0) },
            "add_column" => Self::AddColumn { definition: arg(0) },
            "drop_column" => Self::DropColumn { column: arg(0) },
            _ => Self::RenameColumn {
                column: arg(0),
                new_name: arg(1),
            },
        })
    }

    /// Operation name as accepted by [`parse`](Self::parse).
    pub fn name(&self) -> &'static str {
        match self {
            Self::RenameTable { .. } => "rename_table",
            Self::AddColumn { .. } => "add_column",
            Self::DropColumn { .. } => "drop_column",
            Self::RenameColumn { .. } => "rename_column",
        }
    }
}

/// Column lists and definitions for a rebuilt table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RebuildPlan {
    /// Column definitions of the new shape.
    pub definitions: String,
    /// Columns of the new shape, in order.
    pub new_columns: Vec<String>,
    /// Matching source columns of the current shape.
    pub old_columns: Vec<String>,
}

impl RebuildPlan {
    /// Plans a rebuild that keeps every column except `column`.
    ///
    /// `unique` lists the table's unique constraints; a composite one that
    /// includes `column` is dropped with it.
    pub fn drop_column(
        table: &str,
        columns: &[ColumnInfo],
        unique: &[Vec<String>],
        column: &str,
    ) -> Result<Self> {
        let target = find_column(table, columns, column)?;
        if target.name.eq_ignore_ascii_case(PRIMARY_KEY) {
            return Err(SqlDbError::Schema(format!(
                "cannot drop primary key column '{PRIMARY_KEY}' from '{table}'"
            )));
        }

        let retained: Vec<ColumnInfo> = columns
            .iter()
            .filter(|c| c.ordinal != target.ordinal)
            .cloned()
            .collect();
        let names = checked_names(&retained)?;

        let (kept, lost): (Vec<Vec<String>>, Vec<Vec<String>>) = unique
            .iter()
            .cloned()
            .partition(|u| !u.iter().any(|c| c.eq_ignore_ascii_case(&target.name)));
        for constraint in lost.iter().filter(|u| u.len() > 1) {
            warn!(table, column = %target.name, constraint = ?constraint, "dropping unique constraint with its column");
        }

        Ok(Self {
            definitions: column_definitions(&retained, &kept),
            new_columns: names.clone(),
            old_columns: names,
        })
    }

    /// Plans a rebuild that renames `column` to `new_name` in place.
    pub fn rename_column(
        table: &str,
        columns: &[ColumnInfo],
        unique: &[Vec<String>],
        column: &str,
        new_name: &str,
    ) -> Result<Self> {
        validate_identifier(new_name)?;
        let target = find_column(table, columns, column)?;
        if target.name.eq_ignore_ascii_case(PRIMARY_KEY) {
            return Err(SqlDbError::Schema(format!(
                "cannot rename primary key column '{PRIMARY_KEY}' in '{table}'"
            )));
        }
        if columns
            .iter()
            .any(|c| c.ordinal != target.ordinal && c.name.eq_ignore_ascii_case(new_name))
        {
            return Err(SqlDbError::Schema(format!(
                "column '{new_name}' already exists in '{table}'"
            )));
        }

        let old_columns = checked_names(columns)?;
        let renamed: Vec<ColumnInfo> = columns
            .iter()
            .map(|c| {
                let mut c = c.clone();
                if c.ordinal == target.ordinal {
                    c.name = new_name.to_string();
                }
                c
            })
            .collect();
        let unique: Vec<Vec<String>> = unique
            .iter()
            .map(|u| {
                u.iter()
                    .map(|c| {
                        if c.eq_ignore_ascii_case(&target.name) {
                            new_name.to_string()
                        } else {
                            c.clone()
                        }
                    })
                    .collect()
            })
            .collect();

        Ok(Self {
            definitions: column_definitions(&renamed, &unique),
            new_columns: renamed.into_iter().map(|c| c.name).collect(),
            old_columns,
        })
    }

    /// Renders the executable script for `table`.
    pub fn render(&self, script: &RebuildScript, table: &str) -> String {
        script.render(
            &self.definitions,
            &self.new_columns.join(", "),
            &self.old_columns.join(", "),
            table,
        )
    }
}

fn find_column<'c>(table: &str, columns: &'c [ColumnInfo], column: &str) -> Result<&'c ColumnInfo> {
    columns
        .iter()
        .find(|c| c.name.eq_ignore_ascii_case(column))
        .ok_or_else(|| SqlDbError::ColumnNotFound {
            table: table.to_string(),
            column: column.to_string(),
        })
}

fn checked_names(columns: &[ColumnInfo]) -> Result<Vec<String>> {
    columns
        .iter()
        .map(|c| validate_identifier(&c.name).map(str::to_string))
        .collect()
}

/// Applies schema changes on a borrowed connection.
pub struct Migrator<'a> {
    conn: &'a mut Connection,
    script: &'a RebuildScript,
}

impl<'a> Migrator<'a> {
    pub fn new(conn: &'a mut Connection, script: &'a RebuildScript) -> Self {
        Self { conn, script }
    }

    /// Applies one [`Alteration`] to `table`.
    pub fn alter(&mut self, table: &str, alteration: &Alteration) -> Result<()> {
        info!(table, operation = alteration.name(), "altering table");
        match alteration {
            Alteration::RenameTable { new_name } => self.rename_table(table, new_name),
            Alteration::AddColumn { definition } => self.add_column(table, definition),
            Alteration::DropColumn { column } => self.drop_column(table, column),
            Alteration::RenameColumn { column, new_name } => {
                self.rename_column(table, column, new_name)
            }
        }
    }

    /// Renames a table.
    ///
    /// # Errors
    ///
    /// Returns [`SqlDbError::Schema`] if `old` does not exist or `new` is
    /// already taken.
    pub fn rename_table(&mut self, old: &str, new: &str) -> Result<()> {
        validate_identifier(old)?;
        validate_identifier(new)?;
        let tables = catalog::list_tables(self.conn)?;
        let Some(stored) = tables.iter().find(|t| t.eq_ignore_ascii_case(old)) else {
            return Err(SqlDbError::Schema(format!("no such table: {old}")));
        };
        if tables
            .iter()
            .any(|t| t != stored && t.eq_ignore_ascii_case(new))
        {
            return Err(SqlDbError::Schema(format!("table '{new}' already exists")));
        }

        if stored == new {
            debug!(table = %stored, "rename to the same name");
            return Ok(());
        }
        if !stored.eq_ignore_ascii_case(new) {
            return self.execute(&format!("ALTER TABLE {stored} RENAME TO {new}"));
        }

        // SQLite treats a case-only rename as a collision with the table
        // itself, so it goes through a staging name.
        let staging = format!("{new}__rename");
        let script = format!(
            "ALTER TABLE {stored} RENAME TO {staging}; ALTER TABLE {staging} RENAME TO {new};"
        );
        debug!(statement = %script, "alter");
        let sp = self
            .conn
            .savepoint()
            .map_err(|e| SqlDbError::query("SAVEPOINT", e))?;
        sp.execute_batch(&script)
            .map_err(|e| SqlDbError::query(&script, e))?;
        sp.commit().map_err(|e| SqlDbError::query("RELEASE", e))
    }

    /// Appends a column described by a definition such as `"zip TEXT"`.
    ///
    /// # Errors
    ///
    /// Returns [`SqlDbError::Schema`] if the column name is already in use.
    pub fn add_column(&mut self, table: &str, definition: &str) -> Result<()> {
        let name = definition_name(definition)?;
        let existing = catalog::column_names(self.conn, table)?;
        if existing.iter().any(|c| c.eq_ignore_ascii_case(name)) {
            return Err(SqlDbError::Schema(format!(
                "column '{name}' already exists in '{table}'"
            )));
        }

        self.execute(&format!("ALTER TABLE {table} ADD COLUMN {}", definition.trim()))
    }

    /// Removes a column by rebuilding the table.
    ///
    /// # Errors
    ///
    /// Returns [`SqlDbError::ColumnNotFound`] if the column is absent.
    pub fn drop_column(&mut self, table: &str, column: &str) -> Result<()> {
        let columns = catalog::column_info(self.conn, table)?;
        let unique = catalog::unique_constraints(self.conn, table)?;
        let plan = RebuildPlan::drop_column(table, &columns, &unique, column)?;
        self.rebuild(table, &plan)
    }

    /// Renames a column by rebuilding the table.
    ///
    /// # Errors
    ///
    /// Returns [`SqlDbError::ColumnNotFound`] if the column is absent and
    /// [`SqlDbError::Schema`] if `new_name` is already in use.
    pub fn rename_column(&mut self, table: &str, column: &str, new_name: &str) -> Result<()> {
        let columns = catalog::column_info(self.conn, table)?;
        let unique = catalog::unique_constraints(self.conn, table)?;
        let plan = RebuildPlan::rename_column(table, &columns, &unique, column, new_name)?;
        self.rebuild(table, &plan)
    }

    /// Runs a rebuild script as one unit; any failure rolls it back entirely.
    fn rebuild(&mut self, table: &str, plan: &RebuildPlan) -> Result<()> {
        let script = plan.render(self.script, table);
        debug!(table, script = %script, "rebuilding table");

        let sp = self
            .conn
            .savepoint()
            .map_err(|e| SqlDbError::query("SAVEPOINT", e))?;
        // Dropping `sp` on the error path rolls the savepoint back.
        sp.execute_batch(&script)
            .map_err(|e| SqlDbError::query(&script, e))?;
        sp.commit().map_err(|e| SqlDbError::query("RELEASE", e))?;

        info!(table, columns = plan.new_columns.len(), "table rebuilt");
        Ok(())
    }

    fn execute(&self, sql: &str) -> Result<()> {
        debug!(statement = %sql, "alter");
        self.conn
            .execute_batch(sql)
            .map_err(|e| SqlDbError::query(sql, e))
    }
}
