//! Error types for RunLog

use std::path::PathBuf;

/// RunLog error type
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Run not found: {0}")]
    RunNotFound(String),

    #[error("Invalid run id: {0}")]
    InvalidRunId(String),

    #[error("Failed to set up watch: {0}")]
    WatchSetup(String),

    #[error("Watch error: {0}")]
    Watch(String),

    #[error("Streaming unsupported")]
    StreamingUnsupported,

    #[error("Sink closed")]
    SinkClosed,

    #[error("Config error: {0}")]
    ConfigError(String),

    #[error("Config file not found: {0}")]
    ConfigNotFound(PathBuf),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlError(#[from] toml::de::Error),
}

/// Result type alias for RunLog
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Error::ConfigError(msg.into())
    }

    pub fn watch_setup<S: Into<String>>(msg: S) -> Self {
        Error::WatchSetup(msg.into())
    }

    pub fn watch<S: Into<String>>(msg: S) -> Self {
        Error::Watch(msg.into())
    }

    /// True when the error means the run's log does not exist
    pub fn is_not_found(&self) -> bool {
        match self {
            Error::RunNotFound(_) => true,
            Error::IoError(e) => e.kind() == std::io::ErrorKind::NotFound,
            _ => false,
        }
    }
}
