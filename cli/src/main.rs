use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use rusqlite::types::{ToSql, Value};
use sqldb::{Alteration, Database, JoinKind, RebuildScript, SelectOptions, TableSpec};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "sqldb")]
#[command(about = "Create, query and reshape SQLite tables")]
#[command(version)]
struct Cli {
    /// Log every statement that is executed.
    #[arg(long, short, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Create a database and a table in it.
    Create(CreateArgs),
    /// List the tables in a database.
    Tables(DbArgs),
    /// Show column metadata for a table.
    Columns(ColumnsArgs),
    /// Insert one row, skipping it if it violates a unique constraint.
    Write(WriteArgs),
    /// Query a table, optionally joining another one.
    Select(SelectArgs),
    /// Rename a table, or add, drop or rename a column.
    Alter(AlterArgs),
}

#[derive(Debug, Args)]
struct DbArgs {
    /// Database file path.
    db: PathBuf,
}

#[derive(Debug, Args)]
struct CreateArgs {
    /// Name of the database; `.db` is appended when there is no extension.
    filename: PathBuf,
    /// Name of the table to create.
    #[arg(long, short, required_unless_present = "spec")]
    table: Option<String>,
    /// Field definitions, e.g. "URLS TEXT UNIQUE".
    #[arg(long, short, num_args = 0..)]
    fields: Vec<String>,
    /// JSON file holding a table spec ({"name": ..., "fields": [...]}).
    #[arg(long, conflicts_with_all = ["table", "fields"])]
    spec: Option<PathBuf>,
}

#[derive(Debug, Args)]
struct ColumnsArgs {
    /// Database file path.
    db: PathBuf,
    /// Table name.
    table: String,
}

#[derive(Debug, Args)]
struct WriteArgs {
    /// Database file path.
    db: PathBuf,
    /// Table name.
    table: String,
    /// Comma-separated field names, one per value.
    #[arg(long, short)]
    fields: String,
    /// Values; integers and reals are stored as numbers, NULL as null.
    values: Vec<String>,
}

#[derive(Debug, Args)]
struct SelectArgs {
    /// Database file path.
    db: PathBuf,
    /// Source table.
    table: String,
    /// Columns to return, in order.
    #[arg(required = true)]
    columns: Vec<String>,
    /// Table to join; inferred from the columns when omitted.
    #[arg(long)]
    target: Option<String>,
    /// Join kind: none, left, inner, cross or natural.
    #[arg(long, default_value = "none")]
    join: String,
    /// Join column for left and inner joins.
    #[arg(long)]
    key: Option<String>,
    /// Condition appended after WHERE.
    #[arg(long = "where")]
    condition: Option<String>,
    /// Fail instead of inferring a join target.
    #[arg(long)]
    strict: bool,
}

#[derive(Debug, Args)]
struct AlterArgs {
    /// Database file path.
    db: PathBuf,
    /// Table to alter.
    table: String,
    /// rename_table, add_column, drop_column or rename_column.
    operation: String,
    /// Operation arguments.
    args: Vec<String>,
    /// JSON rebuild script template to use instead of the built-in one.
    #[arg(long)]
    script: Option<PathBuf>,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Command::Create(args) => run_create(args),
        Command::Tables(args) => run_tables(args),
        Command::Columns(args) => run_columns(args),
        Command::Write(args) => run_write(args),
        Command::Select(args) => run_select(args),
        Command::Alter(args) => run_alter(args),
    };

    if let Err(err) = result {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("sqldb=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("sqldb=warn"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();
}

fn run_create(args: CreateArgs) -> Result<(), String> {
    let spec = match (&args.spec, args.table) {
        (Some(path), _) => load_spec(path)?,
        (None, Some(table)) => TableSpec::new(table, args.fields),
        (None, None) => return Err("Specify --table or --spec".to_string()),
    };

    let path = database_path(&args.filename);
    let mut db = open(&path)?;
    db.create_table(&spec)
        .map_err(|e| format!("Failed to create table '{}': {e}", spec.name))?;
    println!("Created table {} in {}", spec.name, path.display());
    Ok(())
}

fn run_tables(args: DbArgs) -> Result<(), String> {
    let db = open(&args.db)?;
    for table in db.list_tables().map_err(|e| e.to_string())? {
        println!("{table}");
    }
    Ok(())
}

fn run_columns(args: ColumnsArgs) -> Result<(), String> {
    let db = open(&args.db)?;
    let columns = db.column_info(&args.table).map_err(|e| e.to_string())?;
    println!("{:<4} {:<20} {:<12} {:<8} {:<12} pk", "#", "name", "type", "notnull", "default");
    for column in columns {
        println!(
            "{:<4} {:<20} {:<12} {:<8} {:<12} {}",
            column.ordinal,
            column.name,
            column.decl_type,
            if column.notnull { "yes" } else { "no" },
            column.default.as_deref().unwrap_or("-"),
            if column.is_primary_key() { "yes" } else { "no" },
        );
    }
    Ok(())
}

fn run_write(args: WriteArgs) -> Result<(), String> {
    let mut db = open(&args.db)?;
    let values: Vec<Value> = args.values.iter().map(|v| parse_value(v)).collect();
    let data: Vec<&dyn ToSql> = values.iter().map(|v| v as &dyn ToSql).collect();

    let inserted = db
        .write(&args.table, &args.fields, &data)
        .map_err(|e| e.to_string())?;
    db.save().map_err(|e| e.to_string())?;

    if inserted == 0 {
        println!("Row skipped (unique constraint)");
    } else {
        println!("Inserted row {}", db.max_id(&args.table).map_err(|e| e.to_string())?);
    }
    Ok(())
}

fn run_select(args: SelectArgs) -> Result<(), String> {
    let db = open(&args.db)?;
    let join: JoinKind = args.join.parse().map_err(|e: sqldb::SqlDbError| e.to_string())?;

    let mut options = SelectOptions::new().join(join);
    if let Some(target) = args.target {
        options = options.target(target);
    }
    if let Some(key) = args.key {
        options = options.key(key);
    }
    if let Some(condition) = args.condition {
        options = options.filter(condition);
    }
    if args.strict {
        options = options.strict();
    }

    let rows = db
        .select(&args.table, &args.columns, options)
        .map_err(|e| e.to_string())?;
    println!("{}", args.columns.join("\t"));
    for row in rows {
        let cells: Vec<String> = row.iter().map(format_value).collect();
        println!("{}", cells.join("\t"));
    }
    Ok(())
}

fn run_alter(args: AlterArgs) -> Result<(), String> {
    let alteration = Alteration::parse(&args.operation, &args.args).map_err(|e| e.to_string())?;
    let mut db = open(&args.db)?;
    if let Some(path) = &args.script {
        let script = RebuildScript::load(path)
            .map_err(|e| format!("Failed to load rebuild script '{}': {e}", path.display()))?;
        db = db.with_rebuild_script(script);
    }

    db.alter(&args.table, alteration).map_err(|e| e.to_string())?;
    db.save().map_err(|e| e.to_string())?;
    println!("Altered table {} ({})", args.table, args.operation);
    Ok(())
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn open(path: &Path) -> Result<Database, String> {
    Database::open(path).map_err(|e| format!("Failed to open database '{}': {e}", path.display()))
}

fn load_spec(path: &Path) -> Result<TableSpec, String> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| format!("Failed to read '{}': {e}", path.display()))?;
    serde_json::from_str(&text).map_err(|e| format!("Invalid table spec '{}': {e}", path.display()))
}

/// Appends `.db` to a bare database name.
fn database_path(filename: &Path) -> PathBuf {
    if filename.extension().is_some() {
        filename.to_path_buf()
    } else {
        filename.with_extension("db")
    }
}

fn parse_value(raw: &str) -> Value {
    if raw.eq_ignore_ascii_case("null") {
        Value::Null
    } else if let Ok(i) = raw.parse::<i64>() {
        Value::Integer(i)
    } else if let Ok(f) = raw.parse::<f64>() {
        Value::Real(f)
    } else {
        Value::Text(raw.to_string())
    }
}

fn format_value(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Integer(i) => i.to_string(),
        Value::Real(f) => f.to_string(),
        Value::Text(s) => s.clone(),
        Value::Blob(b) => format!("<{} bytes>", b.len()),
    }
}
