//! StashKV CLI
//!
//! Inspect and edit a store file from the shell. Keys and values are
//! taken and printed as UTF-8 text.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use stashkv::storage::IndexRecovery;
use stashkv::{Config, FileStorage, Record, Storage, SyncStrategy};
use tracing_subscriber::{fmt, EnvFilter};

/// StashKV CLI
#[derive(Parser, Debug)]
#[command(name = "stashkv-cli")]
#[command(about = "Inspect and edit a StashKV store file")]
#[command(version)]
struct Args {
    /// Store file
    #[arg(short, long, default_value = "./stashkv.db")]
    file: PathBuf,

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

    /// Store a key-value pair
    Put {
        /// The key to set
        key: String,

        /// The value to set
        value: String,
    },

    /// Delete a key
    Del {
        /// The key to delete
        key: String,
    },

    /// List keys, optionally only those starting with a prefix
    Keys {
        /// Key prefix
        prefix: Option<String>,
    },

    /// Scan the file and print recovery statistics
    Stats,
}

fn main() -> ExitCode {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,stashkv=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> stashkv::Result<()> {
    if let Commands::Stats = args.command {
        let stats = IndexRecovery::verify(&args.file)?;
        println!("records:   {}", stats.records_recovered);
        println!("used:      {} bytes", stats.used_len);
        println!("file size: {} bytes", stats.file_len);
        return Ok(());
    }

    let config = Config::builder()
        .path(&args.file)
        .sync_strategy(SyncStrategy::EveryWrite)
        .build();
    let storage = FileStorage::open(&config)?;

    match args.command {
        Commands::Get { key } => match storage.get(key.as_bytes())? {
            Some(record) => println!("{}", String::from_utf8_lossy(record.payload())),
            None => println!("(nil)"),
        },
        Commands::Put { key, value } => {
            storage.put(Record::new(key, value))?;
            println!("OK");
        }
        Commands::Del { key } => match storage.remove(key.as_bytes())? {
            Some(_) => println!("1"),
            None => println!("0"),
        },
        Commands::Keys { prefix } => {
            let prefix = prefix.unwrap_or_default();
            for key in storage.prefixed_with(prefix.as_bytes())? {
                println!("{}", String::from_utf8_lossy(&key));
            }
        }
        Commands::Stats => {}
    }

    Ok(())
}
