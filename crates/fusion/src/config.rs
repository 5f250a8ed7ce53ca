// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fusion daemon configuration (`fusion.toml`).
//!
//! ```toml
//! listen = "127.0.0.1:7461"
//!
//! [[views]]
//! id = "projects"
//!
//! [[pipes]]
//! id = "nfs-projects"
//! api_key = "k-2f9a"
//! view = "projects"
//!
//! [pipes.consistency]
//! hot_window_secs = 30.0
//! ```

use std::collections::HashSet;
use std::path::Path;

use fustor_core::{Consistency, PipeId, ViewId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_LISTEN: &str = "127.0.0.1:7461";

/// Errors loading or validating configuration. Fatal at startup; rejected
/// (keeping the running config) at hot-reload.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Cannot read config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// One queryable view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewConfig {
    pub id: ViewId,
}

/// One pipe: an api key bound to a view, plus consistency overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipeConfig {
    pub id: PipeId,
    pub api_key: String,
    pub view: ViewId,
    #[serde(default = "default_schema")]
    pub schema: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub consistency: Consistency,
}

fn default_true() -> bool {
    true
}

fn default_schema() -> String {
    fustor_core::FS_SCHEMA.to_string()
}

/// Root fusion configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FusionConfig {
    #[serde(default = "default_listen")]
    pub listen: String,
    /// Trust window of the process-wide logical clock.
    #[serde(default = "default_trust_window")]
    pub trust_window_secs: f64,
    #[serde(default)]
    pub views: Vec<ViewConfig>,
    #[serde(default)]
    pub pipes: Vec<PipeConfig>,
}

fn default_listen() -> String {
    DEFAULT_LISTEN.to_string()
}

fn default_trust_window() -> f64 {
    1.0
}

impl FusionConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let config: Self = toml::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Structural validation beyond what serde enforces.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pipes.is_empty() {
            return Err(ConfigError::Invalid("at least one pipe is required".into()));
        }
        let view_ids: HashSet<&ViewId> = self.views.iter().map(|v| &v.id).collect();
        if view_ids.len() != self.views.len() {
            return Err(ConfigError::Invalid("duplicate view id".into()));
        }

        let mut pipe_ids = HashSet::new();
        let mut api_keys = HashSet::new();
        let mut bound_views = HashSet::new();
        for pipe in &self.pipes {
            if pipe.api_key.is_empty() {
                return Err(ConfigError::Invalid(format!("pipe {} has an empty api_key", pipe.id)));
            }
            if !pipe_ids.insert(&pipe.id) {
                return Err(ConfigError::Invalid(format!("duplicate pipe id {}", pipe.id)));
            }
            if !api_keys.insert(&pipe.api_key) {
                return Err(ConfigError::Invalid(format!(
                    "pipe {} reuses another pipe's api_key",
                    pipe.id
                )));
            }
            if !view_ids.contains(&pipe.view) {
                return Err(ConfigError::Invalid(format!(
                    "pipe {} references unknown view {}",
                    pipe.id, pipe.view
                )));
            }
            // One pipe per view: the view's tree is the pipe's tree.
            if !bound_views.insert(&pipe.view) {
                return Err(ConfigError::Invalid(format!(
                    "view {} is bound by more than one pipe",
                    pipe.view
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
