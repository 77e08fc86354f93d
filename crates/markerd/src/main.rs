//! markerd - versioned map-marker store.
//!
//! This is the main entry point for the markerd CLI.

mod commands;

use clap::{Parser, Subcommand};
use commands::*;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "markerd")]
#[command(author, version, about = "Versioned map-marker store", long_about = None)]
struct Cli {
    /// Config file (defaults to markerd.json in the working directory)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server
    Serve {
        /// Address to bind to (overrides the config)
        #[arg(short, long)]
        address: Option<String>,
        /// Write logs to the markerd log file instead of stderr
        #[arg(long)]
        log_file: bool,
    },
    /// List backups with the changes each one introduced
    History {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print the contents of a backup
    Show {
        /// Backup file name
        id: String,
    },
    /// Make a backup current again
    Restore {
        /// Backup file name
        id: String,
    },
    /// Save a document read from a file, or stdin when omitted or `-`
    Save {
        file: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let cwd = std::env::current_dir()?;
    let (config, base_dir) = load_config(cli.config.as_deref(), &cwd).await?;

    let (serving, log_file) = match &cli.command {
        Commands::Serve { log_file, .. } => (true, *log_file),
        _ => (false, false),
    };
    if let Some(path) = init_logging(&config, cli.verbose, serving, log_file) {
        eprintln!("Logging to {}", path.display());
    }

    match cli.command {
        Commands::Serve { address, .. } => run_server(&config, &base_dir, address).await,
        Commands::History { json } => show_history(&config, &base_dir, json).await,
        Commands::Show { id } => show_backup(&config, &base_dir, &id).await,
        Commands::Restore { id } => restore_backup(&config, &base_dir, &id).await,
        Commands::Save { file } => save_document(&config, &base_dir, file.as_deref()).await,
    }
}
