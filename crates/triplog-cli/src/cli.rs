use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "triplog")]
#[command(about = "Record vehicle trips and sync them to the server")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Optional path to local database file
    #[arg(long, value_name = "PATH")]
    pub db_path: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Record a trip from a JSONL trace stream
    Record {
        /// Trace input path; stdin when omitted
        input: Option<PathBuf>,
    },
    /// List trip history, newest first
    Trips {
        /// Include live and deleted trips
        #[arg(long)]
        all: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Store a server-issued JWT as the current user
    Login {
        /// The JWT; read from stdin when omitted
        token: Option<String>,
    },
    /// Forget the current user
    Logout,
    /// Show the current user
    Whoami,
    /// Upload unsynced trips to the server
    Sync {
        /// Treat connectivity as cellular (vital traces only)
        #[arg(long)]
        cellular: bool,
    },
}
