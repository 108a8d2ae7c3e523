//! Configuration for infodb
//!
//! Centralized configuration with sensible defaults.

use std::path::PathBuf;

use crate::error::{InfoDbError, Result};

/// Main configuration for an infodb store
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Storage Configuration
    // -------------------------------------------------------------------------
    /// Database file backing the engine
    pub path: PathBuf,

    /// Create the database file (and its parent directory) when absent
    pub create_if_missing: bool,

    /// How long the engine waits on a locked database file (milliseconds)
    pub busy_timeout_ms: u64,

    // -------------------------------------------------------------------------
    // Sampling Configuration
    // -------------------------------------------------------------------------
    /// Upper bound on slot draws per `fetch_random` call.
    /// `None` keeps drawing until a live slot is hit.
    pub max_random_draws: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./infodb.sqlite3"),
            create_if_missing: true,
            busy_timeout_ms: 5000,
            max_random_draws: Some(1 << 20),
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Reject settings the store cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.path.as_os_str().is_empty() {
            return Err(InfoDbError::Config("database path is empty".to_string()));
        }
        if self.max_random_draws == Some(0) {
            return Err(InfoDbError::Config(
                "max_random_draws must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the database file path
    pub fn path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.path = path.into();
        self
    }

    /// Set whether a missing database is created on open
    pub fn create_if_missing(mut self, create: bool) -> Self {
        self.config.create_if_missing = create;
        self
    }

    /// Set the busy timeout (in milliseconds)
    pub fn busy_timeout_ms(mut self, ms: u64) -> Self {
        self.config.busy_timeout_ms = ms;
        self
    }

    /// Set the random sampling bound (`None` for unbounded)
    pub fn max_random_draws(mut self, draws: Option<u64>) -> Self {
        self.config.max_random_draws = draws;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
