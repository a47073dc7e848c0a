//! Error types for daoip-etl

use daoip_common::Error as CommonError;
use std::path::PathBuf;
use thiserror::Error;

/// Pipeline error type
#[derive(Debug, Error)]
pub enum EtlError {
    /// Field mapping is missing, malformed, or inconsistent
    #[error("Mapping error: {0}")]
    Mapping(String),

    /// Source file could not be read as the configured format
    #[error("Source error in {path}: {message}")]
    Source { path: PathBuf, message: String },

    /// Another run holds the grant system lock
    #[error("Grant system directory is locked: {0}")]
    Locked(PathBuf),

    /// Requested grant system or file does not exist
    #[error("Not found: {0}")]
    NotFound(PathBuf),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// daoip-common error
    #[error("Common error: {0}")]
    Common(#[from] CommonError),
}

impl EtlError {
    pub fn source_error(path: impl Into<PathBuf>, message: impl ToString) -> Self {
        EtlError::Source {
            path: path.into(),
            message: message.to_string(),
        }
    }
}

/// Result type for pipeline operations
pub type EtlResult<T> = Result<T, EtlError>;
