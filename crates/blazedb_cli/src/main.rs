//! BlazeDB CLI
//!
//! Command-line access to BlazeDB databases.
//!
//! # Commands
//!
//! - `open` - open a database and start an interactive shell
//! - `manager` - start a multi-database shell
//! - `restore-backup` - copy the sibling safe-write backup into place
//! - `show-backup` - print the backup location
//!
//! Exit codes: 0 on success, 1 on bad usage, 1 on runtime errors.

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// BlazeDB command-line database tools.
#[derive(Parser)]
#[command(name = "blazedb")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Open a database and start an interactive shell
    Open {
        /// Path to the database file
        db_path: PathBuf,

        /// Password the database is (or will be) bound to
        password: String,

        /// Project tag stamped on inserted records
        #[arg(short, long, default_value = "default")]
        project: String,
    },

    /// Start a multi-database shell
    Manager,

    /// Copy the sibling safe-write backup into place
    RestoreBackup {
        /// Path to the database file
        db_path: PathBuf,
    },

    /// Print the backup location for a database
    ShowBackup {
        /// Path to the database file
        db_path: PathBuf,
    },
}

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            // clap renders its own message; usage mistakes exit 1
            let _ = err.print();
            std::process::exit(1);
        }
    };

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let result = match cli.command {
        Commands::Open {
            db_path,
            password,
            project,
        } => commands::open::run(&db_path, &password, &project),
        Commands::Manager => commands::manager::run(),
        Commands::RestoreBackup { db_path } => commands::backup::restore(&db_path),
        Commands::ShowBackup { db_path } => commands::backup::show(&db_path),
    };

    if let Err(err) = result {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}
