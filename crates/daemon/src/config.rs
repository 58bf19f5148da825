// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon configuration.
//!
//! Loaded from `config.toml` in the state directory; every field has a
//! default so a missing file means a default daemon. Concurrency caps use
//! `0` for unlimited, matching the wire convention.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::model::registry::IdAllocation;
use crate::model::EngineConfig;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// On-disk daemon configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ActivitydConfig {
    /// Standard background slots; 0 means unlimited.
    pub background_concurrency: u32,
    /// Interactive background slots; 0 means unlimited.
    pub background_interactive_concurrency: u32,
    pub yield_timeout_secs: u64,
    /// Wake-lock debounce window for powerDebounce activities; 0 disables.
    pub power_debounce_secs: u64,
    /// Whether the EXTERNAL gate bit starts set. When false, a private-bus
    /// `enable` call is required before anything schedules.
    pub external_enabled: bool,
    /// Optional public socket; private socket always exists.
    pub public_socket: Option<PathBuf>,
}

impl Default for ActivitydConfig {
    fn default() -> Self {
        Self {
            background_concurrency: 1,
            background_interactive_concurrency: 2,
            yield_timeout_secs: 60,
            power_debounce_secs: 10,
            external_enabled: true,
            public_socket: None,
        }
    }
}

impl ActivitydConfig {
    /// Load from `config.toml` under the state dir; absent file is default.
    pub fn load(state_dir: &Path) -> Result<Self, ConfigError> {
        let path = state_dir.join("config.toml");
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(&path)?;
        let config = toml::from_str(&raw)?;
        tracing::info!(path = %path.display(), "configuration loaded");
        Ok(config)
    }

    /// Resolve into the engine's tunables.
    pub fn engine_config(&self) -> EngineConfig {
        let cap = |n: u32| if n == 0 { None } else { Some(n) };
        let allocation = if crate::env::monotonic_ids() {
            IdAllocation::Monotonic
        } else {
            IdAllocation::Random
        };
        EngineConfig {
            background_concurrency: cap(self.background_concurrency),
            background_interactive_concurrency: cap(self.background_interactive_concurrency),
            yield_timeout: Duration::from_secs(self.yield_timeout_secs),
            power_debounce: (self.power_debounce_secs > 0)
                .then(|| Duration::from_secs(self.power_debounce_secs)),
            allocation,
        }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
