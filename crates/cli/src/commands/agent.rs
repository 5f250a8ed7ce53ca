// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::path::PathBuf;

use crate::exit_error::ExitError;

/// Run the agent in the foreground.
pub async fn run(config: Option<PathBuf>) -> Result<(), ExitError> {
    let config_path = match config {
        Some(path) => path,
        None => {
            let paths = fustor_fusion::lifecycle::Paths::resolve().map_err(ExitError::from)?;
            paths.home.join("agent.toml")
        }
    };
    fustor_agent::lifecycle::run(&config_path).await?;
    Ok(())
}
