//! Credential resolution through host prompts and callbacks.

use crate::error::HostCode;

/// Field a prompt asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PromptId {
    /// Authentication (user) name.
    AuthName,
    /// Secret; for XOAUTH2 this is the path of the credential record.
    Password,
    /// Terminates a prompt list.
    ListEnd,
}

/// A field the host must ask the user for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PromptRequest {
    /// Requested field.
    pub id: PromptId,
    /// Challenge text.
    pub challenge: &'static str,
    /// Prompt text.
    pub prompt: &'static str,
}

impl PromptRequest {
    /// Prompt for the authentication name.
    pub const AUTH_NAME: Self = Self {
        id: PromptId::AuthName,
        challenge: "Authentication Name",
        prompt: "Authentication Name",
    };

    /// Prompt for the secret.
    pub const PASSWORD: Self = Self {
        id: PromptId::Password,
        challenge: "Password",
        prompt: "Password",
    };

    /// List terminator.
    pub const LIST_END: Self = Self {
        id: PromptId::ListEnd,
        challenge: "",
        prompt: "",
    };

    /// Builds the request list for the missing fields, terminated by
    /// [`PromptRequest::LIST_END`].
    #[must_use]
    pub fn for_missing(auth_name: bool, password: bool) -> Vec<Self> {
        let mut requests = Vec::with_capacity(usize::from(auth_name) + usize::from(password) + 1);
        if auth_name {
            requests.push(Self::AUTH_NAME);
        }
        if password {
            requests.push(Self::PASSWORD);
        }
        requests.push(Self::LIST_END);
        requests
    }
}

/// A value supplied by the host in answer to a [`PromptRequest`].
#[derive(Clone, PartialEq, Eq)]
pub struct PromptAnswer {
    /// Answered field.
    pub id: PromptId,
    /// Supplied value.
    pub value: String,
}

impl std::fmt::Debug for PromptAnswer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PromptAnswer")
            .field("id", &self.id)
            .field("value_len", &self.value.len())
            .finish()
    }
}

impl PromptAnswer {
    /// Creates an answer.
    #[must_use]
    pub fn new(id: PromptId, value: impl Into<String>) -> Self {
        Self {
            id,
            value: value.into(),
        }
    }
}

/// Returns the non-empty answer for `id`, if one was supplied.
pub(crate) fn find_answer(answers: Option<&[PromptAnswer]>, id: PromptId) -> Option<&str> {
    answers?
        .iter()
        .take_while(|answer| answer.id != PromptId::ListEnd)
        .find(|answer| answer.id == id)
        .map(|answer| answer.value.as_str())
        .filter(|value| !value.is_empty())
}

/// Callbacks the host framework provides to the mechanism.
///
/// Every method has a default, so a host only implements what it supports.
/// `Ok(None)` means the host has no callback for that value.
pub trait Host {
    /// Returns the authentication name.
    ///
    /// # Errors
    ///
    /// Returns the host's status code if the callback fails.
    fn auth_name(&mut self) -> Result<Option<String>, HostCode> {
        Ok(None)
    }

    /// Returns the secret, which names the credential record.
    ///
    /// # Errors
    ///
    /// Returns the host's status code if the callback fails.
    fn secret(&mut self) -> Result<Option<String>, HostCode> {
        Ok(None)
    }

    /// Canonicalizes the authentication name.
    ///
    /// # Errors
    ///
    /// Returns the host's status code, which is reported to the caller
    /// unchanged.
    fn canonicalize(&mut self, name: &str) -> Result<String, HostCode> {
        Ok(name.to_string())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_for_missing_both() {
        let requests = PromptRequest::for_missing(true, true);
        assert_eq!(requests.len(), 3);
        assert_eq!(requests.capacity(), 3);
        assert_eq!(requests[0].prompt, "Authentication Name");
        assert_eq!(requests[1].prompt, "Password");
        assert_eq!(requests[2].id, PromptId::ListEnd);
    }

    #[test]
    fn test_for_missing_one() {
        let requests = PromptRequest::for_missing(false, true);
        assert_eq!(requests, vec![PromptRequest::PASSWORD, PromptRequest::LIST_END]);
    }

    #[test]
    fn test_find_answer() {
        let answers = [
            PromptAnswer::new(PromptId::AuthName, ""),
            PromptAnswer::new(PromptId::Password, "/tmp/token.json"),
        ];
        assert_eq!(find_answer(Some(&answers), PromptId::AuthName), None);
        assert_eq!(
            find_answer(Some(&answers), PromptId::Password),
            Some("/tmp/token.json")
        );
        assert_eq!(find_answer(None, PromptId::Password), None);
    }

    #[test]
    fn test_find_answer_stops_at_list_end() {
        let answers = [
            PromptAnswer::new(PromptId::ListEnd, ""),
            PromptAnswer::new(PromptId::AuthName, "ignored"),
        ];
        assert_eq!(find_answer(Some(&answers), PromptId::AuthName), None);
    }

    #[test]
    fn test_answer_debug_hides_value() {
        let answer = PromptAnswer::new(PromptId::Password, "hunter2");
        assert!(!format!("{answer:?}").contains("hunter2"));
    }

    #[test]
    fn test_default_host() {
        struct Bare;
        impl Host for Bare {}

        let mut host = Bare;
        assert_eq!(host.auth_name(), Ok(None));
        assert_eq!(host.secret(), Ok(None));
        assert_eq!(host.canonicalize("user").unwrap(), "user");
    }
}
