//! A thin convenience layer over SQLite.
//!
//! `sqldb` wraps one [`rusqlite::Connection`] and offers table creation,
//! insert-or-ignore writes, SELECTs with inferred joins, and schema changes
//! SQLite has no table-preserving primitive for (column drop and rename),
//! implemented as an atomic table rebuild.
//!
//! # Architecture
//!
//! - **`catalog`**: table and column introspection, join-target resolution
//! - **`query`**: SELECT construction with join inference
//! - **`rows`**: insert-or-ignore, point updates, max id, null cleanup
//! - **`migration`**: rename table, add/drop/rename column
//! - **`schema`**: identifier validation and DDL generation
//! - **`script`**: the rebuild script template
//! - **`database`**: the [`Database`] session tying them together
//!
//! # Quick start
//!
//! ```
//! use sqldb::{Alteration, Database, JoinKind, SelectOptions, TableSpec};
//! use rusqlite::params;
//!
//! let mut db = Database::open_in_memory().unwrap();
//! db.create_table(&TableSpec::new("Artists", ["Name TEXT"])).unwrap();
//! db.create_table(&TableSpec::new("Albums", ["ArtistId INTEGER", "Title TEXT"])).unwrap();
//!
//! db.write("Artists", "Name", params!["Miles"]).unwrap();
//! db.write("Albums", "ArtistId, Title", params![1, "Kind of Blue"]).unwrap();
//! db.save().unwrap();
//!
//! let rows = db
//!     .select(
//!         "Albums",
//!         &["Title", "Name"],
//!         SelectOptions::new().target("Artists").join(JoinKind::Inner).key("id"),
//!     )
//!     .unwrap();
//! assert_eq!(rows.len(), 1);
//!
//! db.alter("Albums", Alteration::RenameColumn {
//!     column: "Title".into(),
//!     new_name: "AlbumTitle".into(),
//! })
//! .unwrap();
//! ```
//!
//! # Identifiers
//!
//! Table and column names are interpolated into SQL and must contain only
//! ASCII alphanumerics and underscores. Data values are always bound.
//! `where` clauses passed to [`SelectOptions::filter`] are appended as
//! written; bind data into them with [`SelectOptions::bind`].

pub mod catalog;
mod database;
mod error;
pub mod migration;
pub mod query;
pub mod rows;
pub mod schema;
mod script;

pub use catalog::{ColumnInfo, TargetResolution};
pub use database::Database;
pub use error::{Result, SqlDbError};
pub use migration::{Alteration, Migrator, RebuildPlan};
pub use query::{JoinKind, JoinSpec, Row, SelectOptions};
pub use schema::TableSpec;
pub use script::RebuildScript;
