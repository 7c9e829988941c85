//! Error types for hosting API operations

use thiserror::Error;

/// Result type for hosting API operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while enumerating repositories
#[derive(Error, Debug)]
pub enum Error {
    /// Network or protocol failure talking to the API
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Credentials missing, invalid or insufficient
    #[error("Authentication error: {0}")]
    Auth(String),

    /// The listing address does not exist
    #[error("Not found: '{0}'")]
    NotFound(String),

    /// Unexpected response status
    #[error("Get '{address}', StatusCode: {status}")]
    Status { status: u16, address: String },

    /// Response body is not the expected JSON
    #[error("Parse error: {0}")]
    Parse(String),

    /// Configured base address or link is not a valid URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Name filter does not compile
    #[error("Invalid name pattern: {0}")]
    Pattern(#[from] regex::Error),

    /// Error from the core crate
    #[error(transparent)]
    Core(#[from] superpull_core::Error),
}

impl Error {
    /// Whether the same request is worth repeating
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http(_) | Self::Parse(_) => true,
            Self::Status { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        let status = |status| Error::Status {
            status,
            address: "orgs/acme/repos".to_string(),
        };
        assert!(status(502).is_transient());
        assert!(status(429).is_transient());
        assert!(!status(422).is_transient());
        assert!(Error::Parse("eof".to_string()).is_transient());
        assert!(!Error::Auth("bad credentials".to_string()).is_transient());
    }
}
