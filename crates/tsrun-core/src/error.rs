use std::path::PathBuf;
use thiserror::Error;

/// Core error type for tsrun configuration loading.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Failed to read config at {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config at {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Cannot resolve \"extends\": \"{extends}\" in {path}")]
    ExtendsNotFound { path: PathBuf, extends: String },

    #[error("Config extends chain is circular at {path}")]
    ExtendsCycle { path: PathBuf },
}
