//! Statship error types.

use thiserror::Error;

/// Result alias used across all Statship crates.
pub type Result<T> = std::result::Result<T, StatshipError>;

/// Top-level error type.
#[derive(Error, Debug)]
pub enum StatshipError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Summary error: {0}")]
    Summary(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
