//! Error taxonomy for the synchronization core

use thiserror::Error;

/// Result type for synchronization operations
pub type Result<T> = std::result::Result<T, SyncError>;

/// Errors raised while preparing or synchronizing a repository.
///
/// Every error belongs to exactly one repository. Host code decides what is
/// fatal: configuration errors abort startup, the rest are retried on the next
/// scheduled tick.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Invalid repository specification, or a local path that cannot be adopted
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The external tool could not be started or exited unsuccessfully
    #[error("`{command}` failed: {detail}")]
    Execution { command: String, detail: String },

    /// No tag could be resolved on the remote in tag-tracking mode
    #[error("cannot resolve latest tag for {remote}: {detail}")]
    TagResolution { remote: String, detail: String },
}

impl SyncError {
    pub fn configuration(message: impl Into<String>) -> Self {
        SyncError::Configuration(message.into())
    }

    pub fn execution(command: impl Into<String>, detail: impl Into<String>) -> Self {
        SyncError::Execution {
            command: command.into(),
            detail: detail.into(),
        }
    }

    /// Whether this error should abort startup rather than wait for the next tick
    pub fn is_fatal(&self) -> bool {
        matches!(self, SyncError::Configuration(_))
    }
}
