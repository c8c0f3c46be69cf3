//! Triplog CLI - record vehicle trips and sync them from the terminal

mod cli;
mod commands;
mod error;

use clap::Parser;

use crate::cli::{Cli, Commands};
use crate::error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("triplog=info".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();
    let db_path = commands::common::resolve_db_path(cli.db_path);

    match cli.command {
        Commands::Record { input } => {
            commands::record::run_record(input.as_deref(), &db_path).await
        }
        Commands::Trips { all, json } => commands::trips::run_trips(all, json, &db_path),
        Commands::Login { token } => commands::auth_cmd::run_login(token.as_deref(), &db_path),
        Commands::Logout => commands::auth_cmd::run_logout(&db_path),
        Commands::Whoami => commands::auth_cmd::run_whoami(&db_path),
        Commands::Sync { cellular } => commands::sync::run_sync(cellular, &db_path).await,
    }
}
