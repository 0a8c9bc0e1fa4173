//! sqlstore CLI
//!
//! Command-line access to an embedded sqlstore database.

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use sqlstore::{DatastoreError, Key, Query, SqliteOptions};
use tracing_subscriber::{fmt, EnvFilter};

/// sqlstore CLI
#[derive(Parser, Debug)]
#[command(name = "sqlstore")]
#[command(about = "Key-value datastore over a SQLite table")]
#[command(version)]
struct Args {
    /// Database path or file: URI
    #[arg(short, long, default_value = "./sqlstore.db")]
    dsn: String,

    /// Table holding the key/value rows
    #[arg(short, long, default_value = "blocks")]
    table: String,

    /// Fail instead of creating the table when it is missing
    #[arg(long)]
    no_create: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Get a value by key
    Get {
        /// The key to get
        key: String,
    },

    /// Set a key-value pair
    Put {
        /// The key to set
        key: String,

        /// The value to set
        value: String,
    },

    /// Delete a key
    Delete {
        /// The key to delete
        key: String,
    },

    /// Check whether a key exists
    Has {
        key: String,
    },

    /// Print the size of a value in bytes
    Size {
        key: String,
    },

    /// List entries below a prefix
    Query {
        /// Key prefix (all keys when omitted)
        #[arg(short, long, default_value = "")]
        prefix: String,

        #[arg(short, long)]
        limit: Option<u64>,

        #[arg(short, long)]
        offset: Option<u64>,

        /// Print keys and sizes only
        #[arg(short, long)]
        keys_only: bool,
    },
}

fn main() -> ExitCode {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,sqlstore=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    tracing::debug!("sqlstore v{}", sqlstore::VERSION);

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(DatastoreError::NotFound) => {
            eprintln!("not found");
            ExitCode::from(2)
        }
        Err(e) => {
            tracing::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> sqlstore::Result<()> {
    let store = SqliteOptions::builder()
        .dsn(args.dsn)
        .table(args.table)
        .no_create(args.no_create)
        .build()
        .create()?;

    match args.command {
        Commands::Get { key } => {
            let value = store.get(&Key::new(key))?;
            println!("{}", String::from_utf8_lossy(&value));
        }
        Commands::Put { key, value } => {
            store.put(&Key::new(key), value.as_bytes())?;
        }
        Commands::Delete { key } => {
            store.delete(&Key::new(key))?;
        }
        Commands::Has { key } => {
            println!("{}", store.has(&Key::new(key))?);
        }
        Commands::Size { key } => {
            println!("{}", store.get_size(&Key::new(key))?);
        }
        Commands::Query {
            prefix,
            limit,
            offset,
            keys_only,
        } => {
            let mut query = Query::new().prefix(prefix).returns_sizes();
            query.limit = limit;
            query.offset = offset;
            query.keys_only = keys_only;

            for entry in store.query(query)? {
                let entry = entry?;
                match entry.value {
                    Some(value) => println!("{}\t{}", entry.key, String::from_utf8_lossy(&value)),
                    None => println!("{}\t{}", entry.key, entry.size.unwrap_or_default()),
                }
            }
        }
    }

    store.close()
}
