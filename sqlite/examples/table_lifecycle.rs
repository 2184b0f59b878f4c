//! Table lifecycle example.
//!
//! Creates two tables, writes rows, queries them with an inferred join and
//! then reshapes one table with every supported alteration.
//!
//! # Usage
//!
//! ```bash
//! cargo run -p sqldb --example table_lifecycle
//! ```

use rusqlite::params;
use rusqlite::types::Value;
use sqldb::{Alteration, Database, JoinKind, SelectOptions, TableSpec};

fn main() {
    // === Step 1: Create tables ===
    println!("=== Create ===");
    let mut db = Database::open_in_memory().unwrap();
    db.create_table(&TableSpec::new("Artists", ["Name TEXT UNIQUE"])).unwrap();
    db.create_table(&TableSpec::new("Albums", ["ArtistId INTEGER", "Title TEXT", "Year INTEGER"]))
        .unwrap();
    for table in db.list_tables().unwrap() {
        println!("{table}: {:?}", db.column_names(&table).unwrap());
    }

    // === Step 2: Write rows ===
    println!("\n=== Write ===");
    db.write("Artists", "Name", params!["Miles Davis"]).unwrap();
    db.write("Artists", "Name", params!["Nina Simone"]).unwrap();
    let skipped = db.write("Artists", "Name", params!["Miles Davis"]).unwrap();
    println!("Duplicate artist inserted {skipped} rows");

    db.write("Albums", "ArtistId, Title, Year", params![1, "Kind of Blue", 1959]).unwrap();
    db.write("Albums", "ArtistId, Title, Year", params![2, "Pastel Blues", 1965]).unwrap();
    db.write("Albums", "ArtistId, Title", params![2, "Untitled"]).unwrap();
    db.save().unwrap();
    println!("Highest album id: {}", db.max_id("Albums").unwrap());

    // === Step 3: Query with an inferred join target ===
    println!("\n=== Select ===");
    let options = SelectOptions::new().join(JoinKind::Inner).key("id");
    println!("{}", db.build_select("Artists", &["Name", "Title"], &options).unwrap());
    for row in db.select("Artists", &["Name", "Title"], options).unwrap() {
        println!("  {}", render(&row));
    }

    // === Step 4: Clean up and reshape ===
    println!("\n=== Alter ===");
    let removed = db.delete_null_rows("Albums", "Year").unwrap();
    db.save().unwrap();
    println!("Removed {removed} albums without a year");

    db.alter("Albums", Alteration::AddColumn { definition: "Label TEXT".into() })
        .unwrap();
    db.alter("Albums", Alteration::DropColumn { column: "Year".into() })
        .unwrap();
    db.alter(
        "Albums",
        Alteration::RenameColumn {
            column: "Title".into(),
            new_name: "AlbumTitle".into(),
        },
    )
    .unwrap();
    db.alter("Albums", Alteration::RenameTable { new_name: "Records".into() })
        .unwrap();

    for table in db.list_tables().unwrap() {
        println!("{table}: {:?}", db.column_names(&table).unwrap());
    }
    for row in db
        .select("Records", &["id", "AlbumTitle"], SelectOptions::new())
        .unwrap()
    {
        println!("  {}", render(&row));
    }
}

fn render(row: &[Value]) -> String {
    row.iter()
        .map(|value| match value {
            Value::Null => "NULL".to_string(),
            Value::Integer(i) => i.to_string(),
            Value::Real(f) => f.to_string(),
            Value::Text(s) => s.clone(),
            Value::Blob(b) => format!("<{} bytes>", b.len()),
        })
        .collect::<Vec<_>>()
        .join(" | ")
}
