//! Error types for slotbot

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using slotbot Error
pub type Result<T> = std::result::Result<T, Error>;

/// slotbot error types
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{} not found", .0.display())]
    FileNotFound(PathBuf),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("client index {index} out of range ({len} clients configured)")]
    ClientIndexOutOfRange { index: usize, len: usize },

    #[error("No storage state found. {0}")]
    NoStorageState(String),

    #[error("Browser error: {0}")]
    Browser(String),

    #[error("Element not found: {0}")]
    ElementNotFound(String),

    #[error("Timeout after {millis}ms waiting for: {what}")]
    Timeout { what: String, millis: u64 },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Build a timeout error from the awaited target and the elapsed budget.
    pub fn timeout(what: impl Into<String>, budget: std::time::Duration) -> Self {
        Error::Timeout {
            what: what.into(),
            millis: budget.as_millis() as u64,
        }
    }
}
