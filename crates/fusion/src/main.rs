// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! fusiond: the Fustor fusion daemon.

use std::process::ExitCode;

use tracing::error;
use tracing_subscriber::EnvFilter;

use fustor_fusion::lifecycle::{self, Paths};

fn init_tracing(paths: &Paths) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let filter = EnvFilter::try_from_env("FUSTOR_LOG")
        .unwrap_or_else(|_| EnvFilter::new("info"));
    match std::fs::File::options().create(true).append(true).open(&paths.log_path) {
        Ok(file) => {
            let (writer, guard) = tracing_appender::non_blocking(file);
            tracing_subscriber::fmt().with_env_filter(filter).with_writer(writer).init();
            Some(guard)
        }
        Err(_) => {
            tracing_subscriber::fmt().with_env_filter(filter).init();
            None
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let paths = match Paths::resolve() {
        Ok(paths) => paths,
        Err(e) => {
            eprintln!("fusiond: {e}");
            return ExitCode::from(e.exit_code() as u8);
        }
    };
    if let Err(e) = std::fs::create_dir_all(&paths.home) {
        eprintln!("fusiond: cannot create {}: {e}", paths.home.display());
        return ExitCode::from(2);
    }
    let _guard = init_tracing(&paths);

    let started = match lifecycle::startup(paths).await {
        Ok(started) => started,
        Err(e) => {
            error!("startup failed: {e}");
            eprintln!("fusiond: {e}");
            return ExitCode::from(e.exit_code() as u8);
        }
    };
    match lifecycle::run(started).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("fatal: {e}");
            eprintln!("fusiond: {e}");
            ExitCode::from(e.exit_code() as u8)
        }
    }
}
