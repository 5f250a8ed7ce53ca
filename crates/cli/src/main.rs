// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! fustor: CLI for running and querying the Fustor daemons.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

mod client;
mod commands;
mod exit_error;
mod output;

use exit_error::ExitError;

#[derive(Parser)]
#[command(name = "fustor", version, about = "File-tree metadata fusion")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the fusion daemon in the foreground
    Fusion {
        /// Config file (default: $FUSTOR_HOME/fusion.toml)
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Run the agent in the foreground
    Agent {
        /// Config file (default: $FUSTOR_HOME/agent.toml)
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Query a view's tree
    Tree {
        /// View id
        view: String,
        /// Subtree to start from
        #[arg(long, default_value = "/")]
        path: String,
        #[arg(long)]
        recursive: bool,
        #[arg(long)]
        max_depth: Option<usize>,
        /// Print bare paths without stat fields
        #[arg(long)]
        only_path: bool,
        #[arg(long)]
        json: bool,
        /// Server address
        #[arg(long, default_value = fustor_fusion::config::DEFAULT_LISTEN)]
        server: String,
    },

    /// Query a view's counters and readiness
    Stats {
        view: String,
        #[arg(long)]
        json: bool,
        #[arg(long, default_value = fustor_fusion::config::DEFAULT_LISTEN)]
        server: String,
    },

    /// Show daemon status
    Status {
        #[arg(long)]
        json: bool,
        #[arg(long, default_value = fustor_fusion::config::DEFAULT_LISTEN)]
        server: String,
    },

    /// List live sessions
    Sessions {
        #[arg(long)]
        json: bool,
        #[arg(long, default_value = fustor_fusion::config::DEFAULT_LISTEN)]
        server: String,
    },

    /// Ask the fusion daemon to stop
    Shutdown {
        #[arg(long, default_value = fustor_fusion::config::DEFAULT_LISTEN)]
        server: String,
    },
}

fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let filter = EnvFilter::try_from_env("FUSTOR_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing();

    let result: Result<(), ExitError> = match cli.command {
        Command::Fusion { config } => commands::fusion::run(config).await,
        Command::Agent { config } => commands::agent::run(config).await,
        Command::Tree { view, path, recursive, max_depth, only_path, json, server } => {
            commands::query::tree(&server, &view, &path, recursive, max_depth, only_path, json)
                .await
        }
        Command::Stats { view, json, server } => commands::query::stats(&server, &view, json).await,
        Command::Status { json, server } => commands::status::status(&server, json).await,
        Command::Sessions { json, server } => commands::status::sessions(&server, json).await,
        Command::Shutdown { server } => commands::status::shutdown(&server).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("fustor: {}", e.message);
            ExitCode::from(e.code)
        }
    }
}
