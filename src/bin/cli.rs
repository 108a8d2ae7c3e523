//! infodb CLI
//!
//! Command-line front end for an infodb database file.

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use infodb::record::{fold_whitespace, ANONYMOUS_AUTHOR};
use infodb::{Config, Entry, InfoDbError, Record, Store};
use tracing_subscriber::{fmt, EnvFilter};

/// infodb CLI
#[derive(Parser, Debug)]
#[command(name = "infodb-cli")]
#[command(about = "Look up, learn and forget info entries")]
#[command(version)]
struct Args {
    /// Database file
    #[arg(short, long, default_value = "./infodb.sqlite3")]
    db: String,

    /// Print records and stats as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show the record for a key, or a random one when no key is given
    Info {
        /// The key to look up
        key: Vec<String>,
    },

    /// Add an entry, written as `key = description`
    Learn {
        /// The entry text
        #[arg(required = true)]
        text: Vec<String>,

        /// Who contributed the entry
        #[arg(short, long, default_value = ANONYMOUS_AUTHOR)]
        author: String,
    },

    /// Delete a record, or only the entries with a given description
    Forget {
        /// The key to forget
        #[arg(required = true)]
        key: Vec<String>,

        /// Only remove entries with this description
        #[arg(short = 'D', long)]
        description: Option<String>,
    },

    /// Show slot bookkeeping counters
    Stats,
}

fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn,infodb=info"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config = Config::builder().path(&args.db).build();
    let store = match Store::open_with_config(config) {
        Ok(store) => store,
        Err(e) => {
            tracing::error!("Failed to open database `{}': {}", args.db, e);
            return ExitCode::FAILURE;
        }
    };

    let code = match run(&store, args.command, args.json) {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("Storage error: {}", e);
            println!("has a storage problem :o");
            ExitCode::FAILURE
        }
    };

    if let Err(e) = store.close() {
        tracing::error!("Failed to close database: {}", e);
        return ExitCode::FAILURE;
    }
    code
}

fn run(store: &Store, command: Commands, json: bool) -> infodb::Result<ExitCode> {
    match command {
        Commands::Info { key } => {
            let record = match fold_whitespace(&key.join(" ")) {
                Some(key) => store.fetch(&key),
                None => store.fetch_random(),
            };

            // A malformed record reads as unknown; the store already logged it
            match record {
                Ok(Some(record)) => print_record(&record, json)?,
                Ok(None) | Err(InfoDbError::MalformedRecord(_)) => println!("has no idea..."),
                Err(e) => return Err(e),
            }
            Ok(ExitCode::SUCCESS)
        }

        Commands::Learn { text, author } => {
            let Some((key, description)) = parse_learn(&text.join(" ")) else {
                println!("did not understand (?)");
                return Ok(ExitCode::from(2));
            };

            let author = fold_whitespace(&author).unwrap_or_else(|| ANONYMOUS_AUTHOR.to_string());
            store.append(&key, Entry::new(author, description.as_str())?)?;
            println!("Ok, {} = {}", key, description);
            Ok(ExitCode::SUCCESS)
        }

        Commands::Forget { key, description } => {
            let Some(key) = fold_whitespace(&key.join(" ")) else {
                println!("did not understand (?)");
                return Ok(ExitCode::from(2));
            };

            match description.as_deref().and_then(fold_whitespace) {
                Some(description) => {
                    if store.remove_entry(&key, &description)? {
                        println!("Ok, forgot {} = {}", key, description);
                    } else {
                        println!("has no idea...");
                    }
                }
                None => {
                    store.remove(&key)?;
                    println!("Ok, forgot {}", key);
                }
            }
            Ok(ExitCode::SUCCESS)
        }

        Commands::Stats => {
            let stats = store.stats()?;
            if json {
                println!("{}", to_json(&stats)?);
            } else {
                println!("records:  {}", stats.used);
                println!("capacity: {}", stats.capacity);
                println!("free:     {}", stats.free);
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Split `key = description`, folding whitespace on both sides
fn parse_learn(text: &str) -> Option<(String, String)> {
    let (key, description) = text.split_once('=')?;
    Some((fold_whitespace(key)?, fold_whitespace(description)?))
}

fn print_record(record: &Record, json: bool) -> infodb::Result<()> {
    if json {
        println!("{}", to_json(record)?);
    } else {
        println!("{}", record);
    }
    Ok(())
}

fn to_json<T: serde::Serialize>(value: &T) -> infodb::Result<String> {
    serde_json::to_string_pretty(value).map_err(|e| InfoDbError::Serialization(e.to_string()))
}
