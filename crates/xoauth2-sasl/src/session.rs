//! The client side of one XOAUTH2 exchange.

use std::sync::Arc;

use xoauth2_token::{DiagnosticLog, HttpPost, StaticConfig, TokenStore};

use crate::error::{Error, HostCode, Result};
use crate::prompt::{Host, PromptAnswer, PromptId, PromptRequest, find_answer};
use crate::wire::{Challenge, ChallengeStatus, InitialResponse};

/// Outcome of a successful [`AuthSession::step`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// Bytes to send to the server (possibly empty).
    Response(Vec<u8>),
    /// The host must answer these prompts and call `step` again.
    NeedInteraction(Vec<PromptRequest>),
    /// The token was refreshed; the host should restart the exchange.
    RetryExchange,
}

enum State {
    Initial,
    TokenSent(TokenStore),
}

impl State {
    const fn name(&self) -> &'static str {
        match self {
            Self::Initial => "Initial",
            Self::TokenSent(_) => "TokenSent",
        }
    }
}

/// One authentication attempt.
///
/// Owns the diagnostic trace and, once the token is sent, the credential
/// store. A failed step marks the trace for reporting when the session is
/// dropped.
pub struct AuthSession {
    config: Arc<StaticConfig>,
    http: Arc<dyn HttpPost>,
    log: DiagnosticLog,
    enable_updates: bool,
    user: Option<String>,
    state: State,
}

impl std::fmt::Debug for AuthSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthSession")
            .field("state", &self.state.name())
            .field("user", &self.user)
            .field("enable_updates", &self.enable_updates)
            .finish_non_exhaustive()
    }
}

impl AuthSession {
    /// Creates a session reporting failures as `config` directs.
    #[must_use]
    pub fn new(config: Arc<StaticConfig>, http: Arc<dyn HttpPost>) -> Self {
        let log = DiagnosticLog::from_config(&config);
        log.append("AuthSession: created");
        Self {
            config,
            http,
            log,
            enable_updates: true,
            user: None,
            state: State::Initial,
        }
    }

    /// Replaces the diagnostic log. The replacement starts with the
    /// creation entry.
    #[must_use]
    pub fn with_diagnostics(mut self, log: DiagnosticLog) -> Self {
        log.append("AuthSession: created");
        self.log = log;
        self
    }

    /// Sets whether refreshed tokens are written back to the record.
    #[must_use]
    pub fn with_persistence(mut self, enable_updates: bool) -> Self {
        self.enable_updates = enable_updates;
        self
    }

    /// Returns the diagnostic log.
    #[must_use]
    pub const fn diagnostics(&self) -> &DiagnosticLog {
        &self.log
    }

    /// Returns the canonical user name once the token has been sent.
    #[must_use]
    pub fn user(&self) -> Option<&str> {
        self.user.as_deref()
    }

    /// Returns true once the initial response has been produced.
    #[must_use]
    pub const fn token_sent(&self) -> bool {
        matches!(self.state, State::TokenSent(_))
    }

    /// Advances the exchange.
    ///
    /// `server` holds the server's bytes for this step; `prompts` holds
    /// answers to earlier prompts, and being `Some` means the host can
    /// prompt.
    ///
    /// # Errors
    ///
    /// Returns an error if the exchange cannot continue. The diagnostic
    /// trace is then marked for reporting.
    pub fn step<H: Host + ?Sized>(
        &mut self,
        host: &mut H,
        server: &[u8],
        prompts: Option<&[PromptAnswer]>,
    ) -> Result<Step> {
        self.log.append(format!(
            "AuthSession::step: called with state {}",
            self.state.name()
        ));

        let result = match self.state {
            State::Initial => self.initial_step(host, prompts),
            State::TokenSent(ref mut store) => Self::token_sent_step(&self.log, store, server),
        };

        match &result {
            Ok(step) => self.log.append(format!(
                "AuthSession::step: new state {} and outcome {}",
                self.state.name(),
                describe(step)
            )),
            Err(e) => {
                self.log.append(format!(
                    "AuthSession::step: new state {} and error: {e}",
                    self.state.name()
                ));
                self.log.mark_failure_flush();
                tracing::debug!(state = self.state.name(), "XOAUTH2 step failed: {e}");
            }
        }
        result
    }

    fn initial_step<H: Host + ?Sized>(
        &mut self,
        host: &mut H,
        prompts: Option<&[PromptAnswer]>,
    ) -> Result<Step> {
        let auth_name = self.resolve(prompts, PromptId::AuthName, || host.auth_name());
        let secret = self.resolve(prompts, PromptId::Password, || host.secret());

        let (auth_name, secret) = match (auth_name, secret) {
            (Some(auth_name), Some(secret)) => (auth_name, secret),
            (auth_name, secret) => {
                if prompts.is_none() {
                    return Err(Error::MissingCredentials);
                }
                self.log.append("AuthSession::initial_step: requesting prompts");
                return Ok(Step::NeedInteraction(PromptRequest::for_missing(
                    auth_name.is_none(),
                    secret.is_none(),
                )));
            }
        };

        let user = host
            .canonicalize(&auth_name)
            .map_err(|code| Error::Canonicalization { code })?;

        let mut store = TokenStore::open(
            self.log.clone(),
            Arc::clone(&self.config),
            Arc::clone(&self.http),
            secret,
            self.enable_updates,
        )
        .map_err(|source| Error::CredentialUnavailable { source })?;

        let token = store.get_access_token()?;
        let response = InitialResponse::new(&user, &token);
        self.log.append(format!(
            "AuthSession::initial_step: sending token for user {user}"
        ));

        self.user = Some(user);
        self.state = State::TokenSent(store);
        Ok(Step::Response(response.into_bytes()))
    }

    fn token_sent_step(
        log: &DiagnosticLog,
        store: &mut TokenStore,
        server: &[u8],
    ) -> Result<Step> {
        if server.is_empty() {
            return Ok(Step::Response(Vec::new()));
        }
        log.append(format!(
            "AuthSession::token_sent_step: from server: {}",
            String::from_utf8_lossy(server)
        ));

        match Challenge::parse(server)?.classify() {
            ChallengeStatus::RefreshRequired => {
                tracing::debug!("server rejected token, refreshing");
                store.refresh()?;
                Ok(Step::RetryExchange)
            }
            ChallengeStatus::Accepted => {
                log.append("AuthSession::token_sent_step: blank status, assuming we're okay");
                Ok(Step::Response(Vec::new()))
            }
            ChallengeStatus::Rejected(status) => Err(Error::Rejected { status }),
        }
    }

    /// Prompt answer first, then the host callback. Callback failures are
    /// traced and count as unresolved.
    fn resolve(
        &self,
        prompts: Option<&[PromptAnswer]>,
        id: PromptId,
        callback: impl FnOnce() -> std::result::Result<Option<String>, HostCode>,
    ) -> Option<String> {
        if let Some(answer) = find_answer(prompts, id) {
            return Some(answer.to_string());
        }
        match callback() {
            Ok(value) => value.filter(|v| !v.is_empty()),
            Err(code) => {
                self.log.append(format!(
                    "AuthSession::resolve: {id:?} callback err={code}"
                ));
                None
            }
        }
    }
}

impl Drop for AuthSession {
    fn drop(&mut self) {
        self.log.append("AuthSession: destroyed");
    }
}

const fn describe(step: &Step) -> &'static str {
    match step {
        Step::Response(_) => "Response",
        Step::NeedInteraction(_) => "NeedInteraction",
        Step::RetryExchange => "RetryExchange",
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use xoauth2_token::{HttpResponse, MemorySink, PostRequest, Verbosity};

    struct NoHttp;

    impl HttpPost for NoHttp {
        fn post(&self, _request: &PostRequest<'_>) -> xoauth2_token::Result<HttpResponse> {
            Err(xoauth2_token::Error::Transport("offline".into()))
        }
    }

    struct FailingHost;

    impl Host for FailingHost {
        fn auth_name(&mut self) -> std::result::Result<Option<String>, HostCode> {
            Err(HostCode(-1))
        }
    }

    fn session() -> AuthSession {
        AuthSession::new(Arc::new(StaticConfig::new("id", "secret")), Arc::new(NoHttp))
    }

    #[test]
    fn test_prompts_requested_for_missing_fields() {
        let mut session = session();
        let step = session.step(&mut FailingHost, b"", Some(&[])).unwrap();
        let Step::NeedInteraction(requests) = step else {
            panic!("expected prompts, got {step:?}");
        };
        assert_eq!(requests.len(), 3);
        assert!(!session.token_sent());
        assert!(!session.diagnostics().is_flush_marked());
        assert!(
            session
                .diagnostics()
                .lines()
                .iter()
                .any(|l| l.contains("callback err=-1"))
        );
    }

    #[test]
    fn test_missing_credentials_without_prompting() {
        let mut session = session();
        let err = session.step(&mut FailingHost, b"", None).unwrap_err();
        assert!(matches!(err, Error::MissingCredentials));
        assert!(session.diagnostics().is_flush_marked());
    }

    #[test]
    fn test_canonicalization_error_propagates() {
        struct Refusing;
        impl Host for Refusing {
            fn canonicalize(&mut self, _name: &str) -> std::result::Result<String, HostCode> {
                Err(HostCode(-13))
            }
        }

        let mut session = session();
        let answers = [
            PromptAnswer::new(PromptId::AuthName, "user"),
            PromptAnswer::new(PromptId::Password, "/nonexistent"),
        ];
        let err = session.step(&mut Refusing, b"", Some(&answers)).unwrap_err();
        assert!(matches!(err, Error::Canonicalization { code: HostCode(-13) }));
    }

    #[test]
    fn test_unloadable_record() {
        struct Bare;
        impl Host for Bare {}

        let sink = MemorySink::new();
        let mut session =
            session().with_diagnostics(DiagnosticLog::new(sink.clone(), Verbosity::Summary));
        let answers = [
            PromptAnswer::new(PromptId::AuthName, "user"),
            PromptAnswer::new(PromptId::Password, "/nonexistent/token.json"),
        ];
        let err = session.step(&mut Bare, b"", Some(&answers)).unwrap_err();
        assert!(matches!(err, Error::CredentialUnavailable { .. }));
        assert!(!session.token_sent());

        drop(session);
        let flushed = sink.flushed();
        assert_eq!(flushed.len(), 2);
        assert!(flushed[0].contains("error: Unable to load credential record"));
    }

    #[test]
    fn test_injected_log_records_creation() {
        let log = DiagnosticLog::new(MemorySink::new(), Verbosity::FullTrace);
        let session = session().with_diagnostics(log.clone());
        assert!(!session.token_sent());

        let lines = log.lines();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].ends_with("AuthSession: created"));

        drop(session);
        assert!(log.lines().last().unwrap().ends_with("AuthSession: destroyed"));
    }

    #[test]
    fn test_session_is_send() {
        fn assert_send<T: Send>() {}
        assert_send::<AuthSession>();
    }
}
