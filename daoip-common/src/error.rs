//! Common error types for the DAOIP-5 tooling

use std::path::PathBuf;
use thiserror::Error;

/// Common result type for DAOIP-5 operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across the DAOIP-5 crates
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error tied to a specific path
    #[error("IO error at {path}: {source}")]
    PathIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Wrap an I/O error with the path it occurred on
    pub fn at_path(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::PathIo {
            path: path.into(),
            source,
        }
    }
}
