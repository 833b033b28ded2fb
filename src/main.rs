use clap::{Parser, Subcommand};
use colored::Colorize;
use eyre::{Context, Result, eyre};
use serde_json::Value;
use std::path::PathBuf;
use std::process;
use todostore::config::{DEFAULT_DB_NAME, validate_db_name};
use todostore::{Key, RecordStore, StoreConfig};

#[derive(Parser)]
#[command(name = "todostore")]
#[command(about = "TodoStore CLI - read and write Todo records in a local versioned store")]
#[command(version)]
struct Cli {
    /// Directory holding the store (default: user data directory)
    #[arg(short, long)]
    store_path: Option<PathBuf>,

    /// Database name inside the store directory
    #[arg(long, default_value = DEFAULT_DB_NAME, value_parser = parse_db_name)]
    db_name: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Add a new record from a JSON object (an id is generated if missing)
    Add { json: String },

    /// Print the record with the given id
    Get { id: Key },

    /// Print every record, one JSON object per line
    List,

    /// Create or replace a record from a JSON object
    Update { json: String },

    /// Delete the record with the given id
    Delete { id: Key },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Setup tracing; stdout is reserved for records
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();

    let cli = Cli::parse();

    let config = match &cli.store_path {
        Some(path) => StoreConfig::in_directory(path),
        None => StoreConfig::default(),
    }
    .with_db_name(cli.db_name);
    let store = RecordStore::new(config);

    match cli.command {
        Commands::Add { json } => {
            let record = with_generated_id(parse_record(&json)?)?;
            let key = store.add(&record).await?;
            eprintln!("{} {}", "Added".green(), key);
        }
        Commands::Get { id } => match store.get(id.clone()).await? {
            Some(todo) => println!("{}", serde_json::to_string(&todo)?),
            None => {
                eprintln!("{} {}", "Not found:".yellow(), id);
                process::exit(1);
            }
        },
        Commands::List => {
            let todos = store.get_all().await?;
            for todo in &todos {
                println!("{}", serde_json::to_string(todo)?);
            }
            eprintln!("{} record(s)", todos.len());
        }
        Commands::Update { json } => {
            let key = store.update(&parse_record(&json)?).await?;
            eprintln!("{} {}", "Stored".green(), key);
        }
        Commands::Delete { id } => {
            store.delete(id.clone()).await?;
            eprintln!("{} {}", "Deleted".green(), id);
        }
    }

    Ok(())
}

fn parse_db_name(name: &str) -> std::result::Result<String, String> {
    validate_db_name(name).map_err(|e| e.to_string())?;
    Ok(name.to_string())
}

fn parse_record(json: &str) -> Result<Value> {
    let value: Value = serde_json::from_str(json).context("Invalid JSON record")?;
    if !value.is_object() {
        return Err(eyre!("Record must be a JSON object"));
    }
    Ok(value)
}

/// Fill in a UUID v7 string id when the object has none
fn with_generated_id(mut value: Value) -> Result<Value> {
    let map = value
        .as_object_mut()
        .ok_or_else(|| eyre!("Record must be a JSON object"))?;
    if !map.contains_key("id") {
        map.insert("id".to_string(), Value::from(uuid::Uuid::now_v7().to_string()));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_get_with_int_and_text_ids() {
        let cli = Cli::try_parse_from(["todostore", "get", "42"]).unwrap();
        assert!(matches!(cli.command, Commands::Get { id: Key::Int(42) }));

        let cli = Cli::try_parse_from(["todostore", "-s", "/tmp/x", "delete", "abc"]).unwrap();
        assert_eq!(cli.store_path, Some(PathBuf::from("/tmp/x")));
        assert!(matches!(cli.command, Commands::Delete { id: Key::Text(ref s) } if s == "abc"));
    }

    #[test]
    fn test_db_name_default() {
        let cli = Cli::try_parse_from(["todostore", "list"]).unwrap();
        assert_eq!(cli.db_name, DEFAULT_DB_NAME);
    }

    #[test]
    fn test_db_name_with_path_separator_is_rejected() {
        assert!(Cli::try_parse_from(["todostore", "--db-name", "../x", "list"]).is_err());
        assert!(Cli::try_parse_from(["todostore", "--db-name", "nested/x", "list"]).is_err());

        let cli = Cli::try_parse_from(["todostore", "--db-name", "Work", "list"]).unwrap();
        assert_eq!(cli.db_name, "Work");
    }

    #[test]
    fn test_get_keeps_leading_zero_ids_as_text() {
        let cli = Cli::try_parse_from(["todostore", "get", "007"]).unwrap();
        assert!(matches!(cli.command, Commands::Get { id: Key::Text(ref s) } if s == "007"));
    }

    #[test]
    fn test_parse_record_requires_object() {
        assert!(parse_record("{\"id\": 1}").is_ok());
        assert!(parse_record("[1, 2]").is_err());
        assert!(parse_record("not json").is_err());
    }

    #[test]
    fn test_generated_id_only_when_missing() {
        let kept = with_generated_id(json!({"id": 7, "title": "x"})).unwrap();
        assert_eq!(kept["id"], json!(7));

        let generated = with_generated_id(json!({"title": "x"})).unwrap();
        assert!(generated["id"].as_str().is_some_and(|s| !s.is_empty()));
    }
}
