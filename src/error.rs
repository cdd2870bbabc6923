//! Error handling for procrun.
use std::path::PathBuf;

use thiserror::Error;

/// Defines all possible errors surfaced by the supervisor.
#[derive(Debug, Error)]
pub enum SupervisorError {
    /// Error reading the supervisor settings file.
    #[error("Failed to read config file {path:?}: {source}")]
    ConfigReadError {
        /// The settings file that could not be read.
        path: PathBuf,
        /// The underlying error that occurred.
        #[source]
        source: std::io::Error,
    },

    /// Error parsing YAML configuration.
    #[error("Invalid YAML format: {0}")]
    ConfigParseError(#[from] serde_yaml::Error),

    /// A duration setting could not be parsed.
    #[error("Invalid duration value: '{0}'")]
    InvalidDuration(String),

    /// Error reading a Procfile.
    #[error("Failed to read Procfile {path:?}: {source}")]
    ProcfileReadError {
        /// The Procfile that could not be read.
        path: PathBuf,
        /// The underlying error that occurred.
        #[source]
        source: std::io::Error,
    },

    /// Error creating pipes for, or starting, a process.
    #[error("Failed to start process '{process}': {source}")]
    SpawnError {
        /// The process name that failed to start.
        process: String,
        /// The underlying error that occurred.
        #[source]
        source: std::io::Error,
    },

    /// Error for poisoned mutex.
    #[error("Mutex is poisoned: {0}")]
    MutexPoisonError(String),

    /// Error for the session log.
    #[error("Session log error: {0}")]
    SessionLog(#[from] SessionLogError),
}

/// Implement the `From` trait to convert a `std::sync::PoisonError` into a `SupervisorError`.
impl<T> From<std::sync::PoisonError<T>> for SupervisorError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        SupervisorError::MutexPoisonError(err.to_string())
    }
}

/// Error type for session log operations.
#[derive(Debug, Error)]
pub enum SessionLogError {
    /// Error reading, appending to, or clearing the session log.
    #[error("Failed to access session log: {0}")]
    Io(#[from] std::io::Error),
}
