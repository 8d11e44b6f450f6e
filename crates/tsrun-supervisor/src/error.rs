use std::path::PathBuf;
use thiserror::Error;

/// Filesystem watch failure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WatchError {
    #[error("Invalid watch root: {}", .0.display())]
    InvalidRoot(PathBuf),

    #[error("Watcher failed: {0}")]
    WatcherFailed(String),
}

/// Supervisor and front-end failure.
#[derive(Error, Debug)]
pub enum SupervisorError {
    #[error("Failed to start '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to transform eval input: {0}")]
    Transform(String),

    #[error("Failed to install signal handler: {0}")]
    Signal(#[source] std::io::Error),

    #[error(transparent)]
    Watch(#[from] WatchError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
