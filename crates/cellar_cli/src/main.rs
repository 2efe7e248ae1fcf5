//! Cellar CLI
//!
//! Command-line tools for Cellar stores.
//!
//! # Commands
//!
//! - `get` / `set` / `delete` - Single-key access
//! - `scan` - List pairs under a key prefix
//! - `apply` - Apply a binary operation log atomically
//! - `stats` - Show key count, live bytes and WAL size
//! - `compact` - Rewrite the WAL down to the live keys
//! - `verify` - Check every WAL record without opening the store

mod commands;
mod error;

use clap::{Parser, Subcommand};
use commands::OutputFormat;
use error::{CliError, CliResult};
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// Cellar command-line store tools.
#[derive(Parser)]
#[command(name = "cellar")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the store directory
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
    /// Print the value stored under a key
    Get {
        /// Key (UTF-8)
        key: String,
    },

    /// Store a value under a key, creating the store if needed
    Set {
        /// Key (UTF-8)
        key: String,

        /// Value (UTF-8)
        value: String,
    },

    /// Remove a key
    Delete {
        /// Key (UTF-8)
        key: String,
    },

    /// List pairs whose key starts with a prefix
    Scan {
        /// Key prefix; everything when omitted
        #[arg(long, default_value = "")]
        prefix: String,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Apply a binary operation log file as one transaction
    Apply {
        /// File holding the encoded operation log
        file: PathBuf,
    },

    /// Show store statistics
    Stats {
        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Rewrite the WAL to reclaim space
    Compact,

    /// Verify WAL integrity
    Verify,

    /// Show version information
    Version,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> CliResult<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();

    if let Commands::Version = cli.command {
        writeln!(out, "Cellar CLI v{}", env!("CARGO_PKG_VERSION"))?;
        writeln!(out, "Cellar Core v{}", cellar_core::VERSION)?;
        return Ok(());
    }

    let path = cli.path.ok_or(CliError::MissingPath)?;
    match cli.command {
        Commands::Get { key } => commands::kv::get(&path, &key, &mut out),
        Commands::Set { key, value } => commands::kv::set(&path, &key, &value, &mut out),
        Commands::Delete { key } => commands::kv::delete(&path, &key, &mut out),
        Commands::Scan { prefix, format } => commands::scan::run(&path, &prefix, format, &mut out),
        Commands::Apply { file } => commands::apply::run(&path, &file, &mut out),
        Commands::Stats { format } => commands::stats::run(&path, format, &mut out),
        Commands::Compact => commands::compact::run(&path, &mut out),
        Commands::Verify => commands::verify::run(&path, &mut out),
        Commands::Version => Ok(()),
    }
}
