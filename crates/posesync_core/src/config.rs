//! # Engine Configuration
//!
//! Loaded once at startup, usually from a TOML file:
//!
//! ```toml
//! initial_capacity = 1024
//! worker_threads = 2
//!
//! [parallel]
//! min_batch_size = 64
//! num_threads = 4
//! ```
//!
//! Every key is optional; missing keys take the [`Default`] value.

use std::path::Path;

use serde::Deserialize;

use crate::error::{SyncError, SyncResult};

/// Slots reserved per column when the engine initializes.
pub const DEFAULT_INITIAL_CAPACITY: usize = 256;

/// Configuration for per-slot batching inside a single job.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ParConfig {
    /// Minimum number of slots per batch. Prevents thread overhead
    /// from dominating for small workloads. Default: 64.
    pub min_batch_size: usize,
    /// Number of batch threads. `None` uses
    /// [`std::thread::available_parallelism`]. Default: `None`.
    pub num_threads: Option<usize>,
}

impl Default for ParConfig {
    fn default() -> Self {
        Self {
            min_batch_size: 64,
            num_threads: None,
        }
    }
}

impl ParConfig {
    /// Forces every pass onto the job's own thread.
    #[must_use]
    pub const fn sequential() -> Self {
        Self {
            min_batch_size: usize::MAX,
            num_threads: Some(1),
        }
    }

    /// Number of threads a pass may fan out to.
    #[must_use]
    pub fn effective_threads(&self) -> usize {
        self.num_threads
            .unwrap_or_else(|| std::thread::available_parallelism().map_or(1, |n| n.get()))
            .max(1)
    }
}

/// Top-level engine configuration.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Slots reserved per column at initialization.
    pub initial_capacity: usize,
    /// Number of job dispatch threads.
    pub worker_threads: usize,
    /// Per-slot batching inside a job.
    pub parallel: ParConfig,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            initial_capacity: DEFAULT_INITIAL_CAPACITY,
            worker_threads: 2,
            parallel: ParConfig::default(),
        }
    }
}

impl SyncConfig {
    /// Parses a configuration from TOML text and validates it.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::ConfigParse`] for malformed TOML and
    /// [`SyncError::InvalidConfig`] for out-of-range values.
    pub fn from_toml_str(text: &str) -> SyncResult<Self> {
        let config: Self = toml::from_str(text).map_err(|e| SyncError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::ConfigIo`] when the file cannot be read, otherwise
    /// the same errors as [`SyncConfig::from_toml_str`].
    pub fn from_file(path: impl AsRef<Path>) -> SyncResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| SyncError::ConfigIo {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::from_toml_str(&text)
    }

    /// Checks value ranges.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::InvalidConfig`] naming the first bad key.
    pub fn validate(&self) -> SyncResult<()> {
        if self.worker_threads == 0 {
            return Err(SyncError::InvalidConfig(
                "worker_threads must be at least 1".into(),
            ));
        }
        if self.parallel.min_batch_size == 0 {
            return Err(SyncError::InvalidConfig(
                "parallel.min_batch_size must be at least 1".into(),
            ));
        }
        if self.parallel.num_threads == Some(0) {
            return Err(SyncError::InvalidConfig(
                "parallel.num_threads must be at least 1".into(),
            ));
        }
        Ok(())
    }
}
