//! BinVault CLI
//!
//! Command-line interface for inspecting and editing a BinVault file.

use std::process::ExitCode;

use binvault::{Codec, Config, CrcPolicy, StorageManager};
use clap::{Parser, Subcommand};
use serde_json::Value;
use tracing_subscriber::{fmt, EnvFilter};

/// BinVault CLI
#[derive(Parser, Debug)]
#[command(name = "binvault-cli")]
#[command(about = "Inspect and edit a BinVault storage file")]
#[command(version)]
struct Args {
    /// Storage file (created if missing)
    #[arg(short, long, default_value = "data.bv")]
    file: String,

    /// Block size used when the file is created
    #[arg(short, long, default_value = "256")]
    block_size: u32,

    /// CRC policy: 0 = disabled, 1 = warn, 2 = strict
    #[arg(long, default_value = "2")]
    crc: u8,

    /// Use the plain-text JSON codec instead of MessagePack
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List collections
    List,

    /// Print a collection's records as JSON
    Read {
        /// Collection name
        name: String,
    },

    /// Replace a collection's records with a JSON array
    Write {
        /// Collection name
        name: String,

        /// Records, e.g. '[{"id":1}]'
        records: String,
    },

    /// Remove a collection
    Rm {
        /// Collection name
        name: String,
    },

    /// Compact the file
    Optimize,

    /// Check the whole-file CRC
    Verify,

    /// Print layout statistics
    Stats,
}

fn main() -> ExitCode {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn,binvault=info"));

    fmt().with_env_filter(filter).with_target(true).with_writer(std::io::stderr).init();

    let args = Args::parse();

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> binvault::Result<()> {
    let config = Config::builder()
        .path(&args.file)
        .preferred_size(args.block_size)
        .crc(CrcPolicy::try_from(args.crc)?)
        .codec(if args.json { Codec::Json } else { Codec::MessagePack })
        .build()?;

    let mut db = StorageManager::open_with(config)?;

    match args.command {
        Commands::List => {
            for name in db.collections()? {
                println!("{}", name);
            }
        }
        Commands::Read { name } => {
            let records = db.read(&name)?;
            print_json(&records)?;
        }
        Commands::Write { name, records } => {
            let records: Vec<Value> = serde_json::from_str(&records)
                .map_err(|e| binvault::VaultError::Serialization(format!("records must be a JSON array: {}", e)))?;
            db.write(&name, &records)?;
            println!("wrote {} record(s) to '{}'", records.len(), name);
        }
        Commands::Rm { name } => {
            db.remove_collection(&name)?;
            println!("removed '{}'", name);
        }
        Commands::Optimize => {
            let before = db.stats()?;
            db.optimize()?;
            let after = db.stats()?;
            println!("file size: {} -> {} bytes", before.file_size, after.file_size);
        }
        Commands::Verify => {
            let crc = db.verify()?;
            println!(
                "stored {:#010x} computed {:#010x} ({})",
                crc.stored,
                crc.computed,
                if crc.is_unset() {
                    "unset"
                } else if crc.is_valid() {
                    "ok"
                } else {
                    "MISMATCH"
                }
            );
        }
        Commands::Stats => {
            print_json(&db.stats()?)?;
        }
    }

    db.close()
}

fn print_json<T: serde::Serialize>(value: &T) -> binvault::Result<()> {
    let text = serde_json::to_string_pretty(value).map_err(|e| binvault::VaultError::Serialization(e.to_string()))?;
    println!("{}", text);
    Ok(())
}
