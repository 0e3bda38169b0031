//! Configuration types for Shardmeta
//!
//! This module defines configuration structures used across components.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration for the metadata gateway
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Node data directory holding global and per-index state
    pub data_dir: PathBuf,
    /// State file format configuration
    pub state: StateFormatConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("/var/lib/shardmeta"),
            state: StateFormatConfig::default(),
        }
    }
}

impl GatewayConfig {
    /// Create config with data directory
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Default::default()
        }
    }

    /// Reject settings the state format cannot honour
    pub fn validate(&self) -> Result<()> {
        if self.data_dir.as_os_str().is_empty() {
            return Err(Error::configuration("data_dir must not be empty"));
        }
        self.state.validate()
    }
}

/// Generational state file configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct StateFormatConfig {
    /// Generations kept per location after a successful write (newest included)
    pub retained_generations: usize,
    /// fsync the state file and its directory on every write
    pub fsync: bool,
}

impl Default for StateFormatConfig {
    fn default() -> Self {
        Self {
            retained_generations: 2,
            fsync: true,
        }
    }
}

impl StateFormatConfig {
    /// Reject settings the state format cannot honour
    pub fn validate(&self) -> Result<()> {
        if self.retained_generations == 0 {
            return Err(Error::configuration(
                "state.retained_generations must be at least 1",
            ));
        }
        Ok(())
    }
}
