//! Error types for the application

use thiserror::Error;

use crate::das::session::SessionState;

/// Result type alias using our ClientError
pub type Result<T> = std::result::Result<T, ClientError>;

/// Main error type for terminal and engine operations
#[derive(Error, Debug)]
pub enum ClientError {
    /// Stream-level failure; the session is closed when this is raised
    #[error("Transport error: {0}")]
    Transport(String),

    /// A settle/drain cycle produced no bytes
    #[error("No data received: {0}")]
    TimeoutNoData(String),

    /// Operation arguments rejected before any I/O
    #[error("Invalid command arguments: {0}")]
    InvalidCommandArgs(String),

    /// A tabular reply row did not match the header width
    #[error("Reshape error: expected {expected} columns, found {found} in row {row:?}")]
    Reshape {
        expected: usize,
        found: usize,
        row: String,
    },

    /// Login was refused by the terminal
    #[error("Authentication error: {0}")]
    Authentication(String),

    /// Command issued while the session is not ready
    #[error("Session not ready: {0:?}")]
    NotReady(SessionState),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Generic internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ClientError {
    /// Whether this error ends the session rather than a single step
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ClientError::Transport(_) | ClientError::Authentication(_) | ClientError::NotReady(_)
        )
    }
}

impl From<std::io::Error> for ClientError {
    fn from(err: std::io::Error) -> Self {
        ClientError::Transport(err.to_string())
    }
}
