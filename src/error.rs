//! Error types for script resolution and chain traversal

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChainIndexError {
    #[error("Invalid script: {0}")]
    InvalidScript(String),

    #[error("Index consistency violation: {0}")]
    IndexConsistencyViolation(String),

    #[error("Storage access failed: {0}")]
    StorageAccess(String),

    #[error("Invalid block range [{start}, {end}) for chain of {size} blocks")]
    InvalidRange { start: u32, end: u32, size: u32 },

    #[error("Segment count must be at least 1")]
    InvalidSegmentCount,

    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<serde_json::Error> for ChainIndexError {
    fn from(err: serde_json::Error) -> Self {
        ChainIndexError::Config(err.to_string())
    }
}

impl From<std::io::Error> for ChainIndexError {
    fn from(err: std::io::Error) -> Self {
        ChainIndexError::Config(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ChainIndexError>;
