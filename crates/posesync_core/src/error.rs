//! # Sync Error Types
//!
//! All errors that can surface from the synchronization engine.
//!
//! Slot operations themselves never fail: an uninitialized or disposed engine
//! turns them into silent no-ops, and caller bugs (bad index, bad chunk) panic.
//! What remains is configuration and job completion.

use thiserror::Error;

/// Errors that can occur in the synchronization engine.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    /// Invalid configuration value.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Configuration text could not be parsed.
    #[error("failed to parse configuration: {0}")]
    ConfigParse(String),

    /// Configuration file could not be read.
    #[error("failed to read configuration file {path}: {reason}")]
    ConfigIo {
        /// Path that was read.
        path: String,
        /// Underlying IO error message.
        reason: String,
    },

    /// A scheduled job panicked before completing its pass.
    #[error("job `{job}` panicked")]
    WorkerPanicked {
        /// Name of the job that panicked.
        job: &'static str,
    },

    /// A job dispatch thread could not be started.
    #[error("failed to spawn job thread: {0}")]
    ThreadSpawn(String),
}

/// Result type for engine operations.
pub type SyncResult<T> = Result<T, SyncError>;
