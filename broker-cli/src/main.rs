// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! # Tool Access Broker CLI
//!
//! The `toolbroker` binary is both the daemon and the operator/debugging
//! client for the Tool Access Broker.
//!
//! ## Architecture
//!
//! - **Default mode**: CLI commands talk to a running daemon over HTTP
//! - **Daemon mode**: `toolbroker --daemon` runs the broker as a background
//!   service, reading all configuration from the environment
//! - **Detection**: PID file + HTTP `/health` check

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing::info;

mod commands;
mod daemon;

use commands::{AccessCommand, AgentCommand, DaemonCommand, PolicyCommand, ToolCommand};

/// Tool Access Broker — mediate, authorize and audit agent access to tools
#[derive(Parser)]
#[command(name = "toolbroker")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Run as the background daemon service
    #[arg(long, global = true)]
    daemon: bool,

    /// HTTP API port
    #[arg(long, global = true, env = "TOOLBROKER_PORT", default_value = "8000")]
    port: u16,

    /// HTTP API host
    #[arg(long, global = true, env = "TOOLBROKER_HOST", default_value = "127.0.0.1")]
    host: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, env = "TOOLBROKER_LOG_LEVEL", default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage daemon lifecycle
    #[command(name = "daemon")]
    Daemon {
        #[command(subcommand)]
        command: DaemonCommand,
    },

    /// Agent registry operations
    #[command(name = "agent")]
    Agent {
        #[command(subcommand)]
        command: AgentCommand,
    },

    /// Tool registry operations
    #[command(name = "tool")]
    Tool {
        #[command(subcommand)]
        command: ToolCommand,
    },

    /// Policy operations
    #[command(name = "policy")]
    Policy {
        #[command(subcommand)]
        command: PolicyCommand,
    },

    /// Access hot path: request, validate, revoke
    #[command(name = "access")]
    Access {
        #[command(subcommand)]
        command: AccessCommand,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    init_logging(&cli.log_level)?;

    if cli.daemon {
        info!("starting toolbroker daemon");
        return daemon::start_daemon(cli.host, cli.port).await;
    }

    match cli.command {
        Some(Commands::Daemon { command }) => commands::daemon::handle_command(command, &cli.host, cli.port).await,
        Some(Commands::Agent { command }) => commands::agent::handle_command(command, &cli.host, cli.port).await,
        Some(Commands::Tool { command }) => commands::tool::handle_command(command, &cli.host, cli.port).await,
        Some(Commands::Policy { command }) => commands::policy::handle_command(command, &cli.host, cli.port).await,
        Some(Commands::Access { command }) => commands::access::handle_command(command, &cli.host, cli.port).await,
        None => {
            eprintln!("{}", "No command specified. Use --help for usage.".yellow());
            std::process::exit(1);
        }
    }
}

/// Initialize tracing subscriber for logging
fn init_logging(level: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
        .context("Failed to create log filter")?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .init();

    Ok(())
}
