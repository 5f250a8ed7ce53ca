// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::path::PathBuf;

use fustor_fusion::lifecycle::{self, Paths};

use crate::exit_error::ExitError;

/// Run the fusion daemon in the foreground.
pub async fn run(config: Option<PathBuf>) -> Result<(), ExitError> {
    let mut paths = Paths::resolve().map_err(ExitError::from)?;
    if let Some(config_path) = config {
        paths.config_path = config_path;
    }
    let started = lifecycle::startup(paths).await?;
    lifecycle::run(started).await?;
    Ok(())
}
