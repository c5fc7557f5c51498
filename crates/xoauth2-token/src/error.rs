//! Error types for credential management.

use std::path::PathBuf;

/// Result type alias for credential operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Failure classes surfaced to the authentication exchange.
///
/// The peer only ever learns the class, never the message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Network or HTTP layer failure.
    TransportFailure,
    /// Malformed or unexpected payload.
    ProtocolFailure,
    /// Missing or invalid static configuration.
    ConfigFailure,
    /// Credential record open/parse/write/replace failure.
    StorageFailure,
    /// Refresh attempts exhausted.
    AttemptBudgetExceeded,
}

/// Credential management error types.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The token endpoint could not be reached.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The token endpoint answered with something unusable.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Credential record could not be read or written.
    #[error("Storage error for {}: {reason}", path.display())]
    Storage {
        /// Record path involved.
        path: PathBuf,
        /// What went wrong.
        reason: String,
    },

    /// Too many refresh attempts for this record.
    #[error("Refresh attempt budget of {attempts} exhausted")]
    AttemptBudgetExceeded {
        /// Attempts already made.
        attempts: u32,
    },
}

impl Error {
    /// Creates a storage error for the given path.
    #[must_use]
    pub fn storage(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Storage {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Returns the failure class of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Transport(_) => ErrorKind::TransportFailure,
            Self::Protocol(_) => ErrorKind::ProtocolFailure,
            Self::Config(_) => ErrorKind::ConfigFailure,
            Self::Storage { .. } => ErrorKind::StorageFailure,
            Self::AttemptBudgetExceeded { .. } => ErrorKind::AttemptBudgetExceeded,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(
            Error::Transport("timeout".into()).kind(),
            ErrorKind::TransportFailure
        );
        assert_eq!(
            Error::storage("/tmp/x", "denied").kind(),
            ErrorKind::StorageFailure
        );
        assert_eq!(
            Error::AttemptBudgetExceeded { attempts: 2 }.kind(),
            ErrorKind::AttemptBudgetExceeded
        );
    }

    #[test]
    fn test_storage_message_includes_path() {
        let err = Error::storage("/var/lib/token.json", "permission denied");
        assert_eq!(
            err.to_string(),
            "Storage error for /var/lib/token.json: permission denied"
        );
    }
}
