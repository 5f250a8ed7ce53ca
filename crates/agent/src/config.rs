// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent daemon configuration (`agent.toml`).
//!
//! ```toml
//! agent_id = "node-a"
//! server = "127.0.0.1:7461"
//!
//! [[pipes]]
//! name = "projects"
//! root = "/mnt/share/projects"
//! api_key = "k-2f9a"
//!
//! [[pipes.fields_mapping]]
//! from = "modified_time"
//! to = "modified_time"
//! ```

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use fustor_core::{AgentId, Consistency, FieldMapping};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors loading or validating agent configuration.
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

/// One watched subtree bound to a server-side pipe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentPipeConfig {
    /// Local name, used in logs and task ids.
    pub name: String,
    /// Root directory of the watched subtree.
    pub root: PathBuf,
    pub api_key: String,
    #[serde(default = "default_schema")]
    pub schema: String,
    #[serde(default)]
    pub fields_mapping: FieldMapping,
    /// Watched-directory budget before LRU eviction kicks in.
    #[serde(default = "default_watch_limit")]
    pub watch_limit: usize,
    #[serde(default)]
    pub consistency: Consistency,
}

fn default_schema() -> String {
    fustor_core::FS_SCHEMA.to_string()
}

fn default_watch_limit() -> usize {
    65_536
}

/// Root agent configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentConfig {
    pub agent_id: AgentId,
    /// Fusion server address, `host:port`.
    pub server: String,
    #[serde(default)]
    pub pipes: Vec<AgentPipeConfig>,
}

impl AgentConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let config: Self = toml::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.agent_id.as_str().is_empty() {
            return Err(ConfigError::Invalid("agent_id must not be empty".into()));
        }
        if self.server.is_empty() {
            return Err(ConfigError::Invalid("server must not be empty".into()));
        }
        if self.pipes.is_empty() {
            return Err(ConfigError::Invalid("at least one pipe is required".into()));
        }
        let mut names = HashSet::new();
        for pipe in &self.pipes {
            if pipe.api_key.is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "pipe {} has an empty api_key",
                    pipe.name
                )));
            }
            if !names.insert(&pipe.name) {
                return Err(ConfigError::Invalid(format!("duplicate pipe name {}", pipe.name)));
            }
            if !pipe.root.is_absolute() {
                return Err(ConfigError::Invalid(format!(
                    "pipe {} root must be absolute, got {}",
                    pipe.name,
                    pipe.root.display()
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
