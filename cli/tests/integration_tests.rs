use std::fs;
use std::path::Path;
use std::process::Output;

fn sqldb(args: &[&str]) -> Output {
    std::process::Command::new(env!("CARGO_BIN_EXE_sqldb"))
        .args(args)
        .output()
        .expect("failed to run sqldb")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn path_str(path: &Path) -> &str {
    path.to_str().unwrap()
}

/// Creates `music.db` with an Artists table holding two rows.
fn music_db(dir: &Path) -> std::path::PathBuf {
    let base = dir.join("music");
    let out = sqldb(&["create", path_str(&base), "-t", "Artists", "-f", "Name TEXT UNIQUE", "Genre TEXT"]);
    assert!(out.status.success(), "create failed: {}", String::from_utf8_lossy(&out.stderr));

    let db = dir.join("music.db");
    for name in ["Miles", "Nina"] {
        let out = sqldb(&["write", path_str(&db), "Artists", "-f", "Name, Genre", name, "jazz"]);
        assert!(out.status.success());
    }
    db
}

// ---------------------------------------------------------------------------
// Create / inspect
// ---------------------------------------------------------------------------

#[test]
fn create_appends_db_extension_and_adds_id() {
    let dir = tempfile::tempdir().unwrap();
    let db = music_db(dir.path());
    assert!(db.exists());

    let out = sqldb(&["columns", path_str(&db), "Artists"]);
    assert!(out.status.success());
    let text = stdout(&out);
    let id = text.find(" id ").unwrap();
    let name = text.find("Name").unwrap();
    let genre = text.find("Genre").unwrap();
    assert!(id < name && name < genre, "unexpected column order:\n{text}");
}

#[test]
fn create_from_spec_file() {
    let dir = tempfile::tempdir().unwrap();
    let spec = dir.path().join("pages.json");
    fs::write(&spec, r#"{"name": "WebPages", "fields": ["URLS TEXT UNIQUE", "HTML TEXT"]}"#).unwrap();
    let db = dir.path().join("web.db");

    let out = sqldb(&["create", path_str(&db), "--spec", path_str(&spec)]);
    assert!(out.status.success());

    let out = sqldb(&["tables", path_str(&db)]);
    assert_eq!(stdout(&out).trim(), "WebPages");
}

#[test]
fn write_reports_skipped_duplicates() {
    let dir = tempfile::tempdir().unwrap();
    let db = music_db(dir.path());

    let out = sqldb(&["write", path_str(&db), "Artists", "-f", "Name", "Miles"]);
    assert!(out.status.success());
    assert!(stdout(&out).contains("skipped"));
}

// ---------------------------------------------------------------------------
// Select / alter
// ---------------------------------------------------------------------------

#[test]
fn select_with_where_clause() {
    let dir = tempfile::tempdir().unwrap();
    let db = music_db(dir.path());

    let out = sqldb(&["select", path_str(&db), "Artists", "Name", "--where", "id = 2"]);
    assert!(out.status.success());
    assert_eq!(stdout(&out), "Name\nNina\n");
}

#[test]
fn select_rejects_unknown_join_kind() {
    let dir = tempfile::tempdir().unwrap();
    let db = music_db(dir.path());

    let out = sqldb(&["select", path_str(&db), "Artists", "Name", "--join", "sideways"]);
    assert!(!out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("invalid join kind"));
}

#[test]
fn alter_drop_and_rename_columns() {
    let dir = tempfile::tempdir().unwrap();
    let db = music_db(dir.path());

    let out = sqldb(&["alter", path_str(&db), "Artists", "drop_column", "Genre"]);
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    let out = sqldb(&["alter", path_str(&db), "Artists", "rename_column", "Name", "Artist"]);
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));

    let out = sqldb(&["select", path_str(&db), "Artists", "id", "Artist", "--where", "1 = 1 ORDER BY id"]);
    assert_eq!(stdout(&out), "id\tArtist\n1\tMiles\n2\tNina\n");
}

#[test]
fn alter_unknown_operation_fails() {
    let dir = tempfile::tempdir().unwrap();
    let db = music_db(dir.path());

    let out = sqldb(&["alter", path_str(&db), "Artists", "truncate"]);
    assert!(!out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("unknown alter operation"));
}

#[test]
fn alter_with_invalid_script_template_fails() {
    let dir = tempfile::tempdir().unwrap();
    let db = music_db(dir.path());
    let script = dir.path().join("scripts.json");
    fs::write(&script, r#"{"rebuild": ["DROP TABLE {table};"]}"#).unwrap();

    let out = sqldb(&["alter", path_str(&db), "Artists", "drop_column", "Genre", "--script", path_str(&script)]);
    assert!(!out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("missing slot"));

    let out = sqldb(&["columns", path_str(&db), "Artists"]);
    assert!(stdout(&out).contains("Genre"));
}
