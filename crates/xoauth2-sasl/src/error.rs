//! Error types for the XOAUTH2 exchange.

use std::fmt;

pub use xoauth2_token::ErrorKind;

/// Result type alias for exchange operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Status code reported by the host framework, passed through unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HostCode(pub i32);

impl fmt::Display for HostCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Failure code that may be shown to the peer.
///
/// Carries no message, so storage paths and transport details stay in the
/// diagnostic trace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireCode {
    /// Generic failure.
    Fail,
    /// Protocol violation or unusable payload.
    BadProtocol,
    /// Code returned by the host, unchanged.
    Host(HostCode),
}

/// Exchange error types.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Credential lifecycle failure (refresh, persistence, attempt budget).
    #[error(transparent)]
    Token(#[from] xoauth2_token::Error),

    /// Server challenge was not a JSON object.
    #[error("Malformed server challenge: {0}")]
    MalformedChallenge(String),

    /// Server answered with a status other than 400/401.
    #[error("Server rejected token with status {status}")]
    Rejected {
        /// Status string sent by the server.
        status: String,
    },

    /// Name or secret unresolved and prompting not permitted.
    #[error("Authentication name or secret unavailable")]
    MissingCredentials,

    /// The credential record named by the secret could not be loaded.
    #[error("Unable to load credential record: {source}")]
    CredentialUnavailable {
        /// Load failure.
        #[source]
        source: xoauth2_token::Error,
    },

    /// The host refused to canonicalize the authentication name.
    #[error("Identity canonicalization failed with code {code}")]
    Canonicalization {
        /// Host status code.
        code: HostCode,
    },
}

impl Error {
    /// Returns the failure class of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Token(e) | Self::CredentialUnavailable { source: e } => e.kind(),
            Self::MalformedChallenge(_)
            | Self::Rejected { .. }
            | Self::MissingCredentials
            | Self::Canonicalization { .. } => ErrorKind::ProtocolFailure,
        }
    }

    /// Returns the code to report to the peer.
    #[must_use]
    pub const fn wire_code(&self) -> WireCode {
        match self {
            Self::Token(e) => match e.kind() {
                ErrorKind::ProtocolFailure => WireCode::BadProtocol,
                _ => WireCode::Fail,
            },
            Self::MalformedChallenge(_) | Self::Rejected { .. } | Self::MissingCredentials => {
                WireCode::BadProtocol
            }
            Self::CredentialUnavailable { .. } => WireCode::Fail,
            Self::Canonicalization { code } => WireCode::Host(*code),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_failure_is_generic_on_wire() {
        let err = Error::CredentialUnavailable {
            source: xoauth2_token::Error::storage("/secret/path.json", "unable to open"),
        };
        assert_eq!(err.kind(), ErrorKind::StorageFailure);
        assert_eq!(err.wire_code(), WireCode::Fail);
    }

    #[test]
    fn test_token_errors_map_by_kind() {
        let transport = Error::from(xoauth2_token::Error::Transport("refused".into()));
        assert_eq!(transport.kind(), ErrorKind::TransportFailure);
        assert_eq!(transport.wire_code(), WireCode::Fail);

        let protocol = Error::from(xoauth2_token::Error::Protocol("status 400".into()));
        assert_eq!(protocol.wire_code(), WireCode::BadProtocol);

        let budget = Error::from(xoauth2_token::Error::AttemptBudgetExceeded { attempts: 2 });
        assert_eq!(budget.kind(), ErrorKind::AttemptBudgetExceeded);
        assert_eq!(budget.wire_code(), WireCode::Fail);
    }

    #[test]
    fn test_exchange_errors() {
        let rejected = Error::Rejected {
            status: "500".into(),
        };
        assert_eq!(rejected.kind(), ErrorKind::ProtocolFailure);
        assert_eq!(rejected.wire_code(), WireCode::BadProtocol);
        assert_eq!(rejected.to_string(), "Server rejected token with status 500");

        assert_eq!(Error::MissingCredentials.wire_code(), WireCode::BadProtocol);
    }

    #[test]
    fn test_canonicalization_code_passes_through() {
        let err = Error::Canonicalization { code: HostCode(-13) };
        assert_eq!(err.wire_code(), WireCode::Host(HostCode(-13)));
        assert!(err.to_string().contains("-13"));
    }
}
