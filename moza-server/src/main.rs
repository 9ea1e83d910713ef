//! Moza CLI - banking API server and operator commands

use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;

mod commands;
mod output;

use commands::{fund, logs, migrate, serve, status};

/// Moza - a small banking backend
#[derive(Parser)]
#[command(name = "moza", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP API
    Serve {
        /// Address to bind (defaults to server.host)
        #[arg(long)]
        host: Option<String>,
        /// Port to listen on (defaults to server.port)
        #[arg(long)]
        port: Option<u16>,
    },

    /// Apply pending database migrations
    Migrate {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show store counts and balances
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Credit an account directly
    Fund {
        /// Bank account id
        #[arg(long)]
        account_id: i64,
        /// Amount to add, at most two decimal places
        #[arg(long)]
        amount: Decimal,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// View and manage the audit log
    Logs {
        #[command(subcommand)]
        command: logs::LogsCommands,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            output::error(&format!("{:#}", e));
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Serve { host, port } => serve::run(host, port),
        Commands::Migrate { json } => migrate::run(json),
        Commands::Status { json } => status::run(json),
        Commands::Fund { account_id, amount, json } => fund::run(account_id, amount, json),
        Commands::Logs { command } => logs::run(command),
    }
}
