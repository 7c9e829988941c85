//! Error types for Superpull

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for Superpull operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for Superpull operations
#[derive(Error, Debug)]
pub enum Error {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The root folder of a scan does not exist
    #[error("Directory not found: {}", .0.display())]
    DirectoryNotFound(PathBuf),

    /// A clone URL that cannot be used as given
    #[error("Invalid repo url: '{0}'")]
    InvalidUrl(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}
