//! Error types for the Codeden core.
//!
//! Every failure a request can hit maps onto one variant here. The
//! dispatcher turns these into `RunResult::Failure` values; nothing in the
//! request path panics the host.

use std::path::PathBuf;

use thiserror::Error;

use crate::process::ProcessError;

#[derive(Debug, Error)]
pub enum CoreError {
    /// Language id not present in the registry.
    #[error("Language not supported: {0}")]
    UnknownLanguage(String),

    #[error("Unknown action: {0} (expected run, compile or compile-run)")]
    InvalidAction(String),

    /// Writing the scratch file (or any other save) failed.
    #[error("Failed to write {path}: {source}")]
    Persistence {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Compiler exited non-zero. Carries the diagnostic text.
    #[error("{0}")]
    Build(String),

    #[error("Timed out after {0} ms")]
    Timeout(u64),

    #[error("Failed to start process: {0}")]
    Spawn(String),

    #[error("Terminal error: {0}")]
    Pty(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<ProcessError> for CoreError {
    fn from(err: ProcessError) -> Self {
        match err {
            ProcessError::TimedOut { timeout_ms, .. } => CoreError::Timeout(timeout_ms),
            ProcessError::Spawn { command, source } => {
                CoreError::Spawn(format!("{}: {}", command, source))
            }
            ProcessError::Io(e) => CoreError::Io(e),
        }
    }
}

impl From<CoreError> for String {
    fn from(err: CoreError) -> Self {
        err.to_string()
    }
}

impl serde::Serialize for CoreError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}
