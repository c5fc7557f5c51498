//! XOAUTH2 wire formats.
//!
//! - Client response: `user=<user>\x01auth=Bearer <token>\x01\x01`
//! - Server challenge: `{"status":"401","schemes":"bearer","scope":"..."}`

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde_json::Value;

use crate::error::{Error, Result};

/// Properties a host needs to register the mechanism.
#[allow(clippy::struct_excessive_bools)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mechanism {
    /// Mechanism name.
    pub name: &'static str,
    /// The client sends the first message.
    pub client_first: bool,
    /// Authorization identity may differ from authentication identity.
    pub allows_proxy: bool,
    /// Maximum security strength factor.
    pub max_ssf: u32,
    /// Anonymous login is not supported.
    pub no_anonymous: bool,
    /// Credentials are passed to the server.
    pub passes_credentials: bool,
}

/// The XOAUTH2 mechanism.
pub const MECHANISM: Mechanism = Mechanism {
    name: "XOAUTH2",
    client_first: true,
    allows_proxy: true,
    max_ssf: 60,
    no_anonymous: true,
    passes_credentials: true,
};

/// First client message of the exchange.
#[derive(Clone, PartialEq, Eq)]
pub struct InitialResponse(Vec<u8>);

impl InitialResponse {
    /// Builds the response for `user` and `token`.
    #[must_use]
    pub fn new(user: &str, token: &str) -> Self {
        Self(format!("user={user}\x01auth=Bearer {token}\x01\x01").into_bytes())
    }

    /// Returns the raw response bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Consumes the response, returning its bytes.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    /// Returns the base64 form used by IMAP `AUTHENTICATE` and SMTP `AUTH`.
    #[must_use]
    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.0)
    }
}

impl std::fmt::Debug for InitialResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("InitialResponse")
            .field(&format_args!("{} bytes", self.0.len()))
            .finish()
    }
}

/// What the server asked for after the token was sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChallengeStatus {
    /// No status: authentication proceeds.
    Accepted,
    /// 400 or 401: the token should be refreshed and the exchange retried.
    RefreshRequired,
    /// Any other status.
    Rejected(String),
}

/// Server challenge sent after a rejected token.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Challenge {
    /// `status` field, if present.
    pub status: Option<String>,
}

impl Challenge {
    /// Parses a challenge. Trailing NUL bytes are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedChallenge`] if the bytes are not a JSON object.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let end = bytes
            .iter()
            .rposition(|b| *b != 0)
            .map_or(0, |last| last + 1);

        let root: Value = serde_json::from_slice(&bytes[..end])
            .map_err(|e| Error::MalformedChallenge(e.to_string()))?;
        let Value::Object(fields) = root else {
            return Err(Error::MalformedChallenge("expected a JSON object".into()));
        };

        let status = match fields.get("status") {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => Some(s.clone()),
            Some(other) => Some(other.to_string()),
        };
        Ok(Self { status })
    }

    /// Classifies the challenge status.
    #[must_use]
    pub fn classify(&self) -> ChallengeStatus {
        match self.status.as_deref() {
            None | Some("") => ChallengeStatus::Accepted,
            Some("400" | "401") => ChallengeStatus::RefreshRequired,
            Some(other) => ChallengeStatus::Rejected(other.to_string()),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_response_format() {
        let response = InitialResponse::new("test@test.com", "abc");
        assert_eq!(response.as_bytes(), b"user=test@test.com\x01auth=Bearer abc\x01\x01");
    }

    #[test]
    fn test_response_base64() {
        let response = InitialResponse::new("user@example.com", "token123");
        let decoded = STANDARD.decode(response.to_base64()).unwrap();
        assert_eq!(decoded, response.as_bytes());
        assert!(!format!("{response:?}").contains("token123"));
    }

    #[test]
    fn test_parse_challenge() {
        let json = br#"{"status":"401","schemes":"bearer","scope":"https://mail.google.com/"}"#;
        let challenge = Challenge::parse(json).unwrap();
        assert_eq!(challenge.status.as_deref(), Some("401"));
        assert_eq!(challenge.classify(), ChallengeStatus::RefreshRequired);
    }

    #[test]
    fn test_parse_challenge_with_trailing_nul() {
        let challenge = Challenge::parse(b"{\"status\":\"400\"}\0").unwrap();
        assert_eq!(challenge.classify(), ChallengeStatus::RefreshRequired);
    }

    #[test]
    fn test_missing_or_blank_status_is_accepted() {
        assert_eq!(
            Challenge::parse(b"{}").unwrap().classify(),
            ChallengeStatus::Accepted
        );
        assert_eq!(
            Challenge::parse(br#"{"status":""}"#).unwrap().classify(),
            ChallengeStatus::Accepted
        );
    }

    #[test]
    fn test_numeric_status() {
        let challenge = Challenge::parse(br#"{"status":401}"#).unwrap();
        assert_eq!(challenge.classify(), ChallengeStatus::RefreshRequired);
    }

    #[test]
    fn test_other_status_rejected() {
        let challenge = Challenge::parse(br#"{"status":"500"}"#).unwrap();
        assert_eq!(challenge.classify(), ChallengeStatus::Rejected("500".into()));
    }

    #[test]
    fn test_malformed_challenge() {
        assert!(matches!(
            Challenge::parse(b"not json"),
            Err(Error::MalformedChallenge(_))
        ));
        assert!(matches!(
            Challenge::parse(b"[1, 2]"),
            Err(Error::MalformedChallenge(_))
        ));
        assert!(Challenge::parse(b"\0\0").is_err());
    }

    #[test]
    fn test_mechanism_descriptor() {
        assert_eq!(MECHANISM.name, "XOAUTH2");
        assert!(MECHANISM.client_first);
        assert_eq!(MECHANISM.max_ssf, 60);
    }
}
