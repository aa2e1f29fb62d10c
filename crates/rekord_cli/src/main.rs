//! Rekord CLI
//!
//! Offline tools for Rekord directory databases. Every command takes the
//! directory lock, so it fails while a process has the database open.
//!
//! # Commands
//!
//! - `inspect` - Display the manifest and per-table entry counts
//! - `verify` - Checksum every segment entry
//! - `dump` - List a table's records as of a revision

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Rekord command-line database tools.
#[derive(Parser)]
#[command(name = "rekord")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the database directory
    #[arg(global = true, short, long)]
    path: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Display the manifest and per-table entry counts
    Inspect {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Verify the checksum of every segment entry
    Verify,

    /// List a table's records as of a revision
    Dump {
        /// Table to dump
        #[arg(short, long)]
        table: String,

        /// Revision to reconstruct (defaults to the stored revision)
        #[arg(long)]
        at: Option<u64>,

        /// Include removed records, ignoring --at
        #[arg(short, long)]
        all: bool,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Inspect { format } => {
            let path = cli.path.ok_or("Database path required for inspect")?;
            commands::inspect::run(&path, &format)?;
        }
        Commands::Verify => {
            let path = cli.path.ok_or("Database path required for verify")?;
            commands::verify::run(&path)?;
        }
        Commands::Dump {
            table,
            at,
            all,
            format,
        } => {
            let path = cli.path.ok_or("Database path required for dump")?;
            commands::dump::run(&path, &table, at, all, &format)?;
        }
        Commands::Version => {
            println!("Rekord CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("Rekord Core v{}", rekord_core::VERSION);
        }
    }

    Ok(())
}
