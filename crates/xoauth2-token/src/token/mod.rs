//! Credential lifecycle: load, freshness check, refresh, persist.

mod record;

pub use record::{CredentialRecord, Overrides};

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use serde::Deserialize;
use url::form_urlencoded;

use crate::config::{Effective, StaticConfig};
use crate::diag::DiagnosticLog;
use crate::encoding::{optional_text, parse_seconds};
use crate::error::{Error, Result};
use crate::http::{HttpPost, PostRequest};

/// Refreshes allowed per [`TokenStore`].
pub const MAX_REFRESH_ATTEMPTS: u32 = 2;

/// Token endpoint response. Fields are optional so that a missing field is
/// reported as a protocol error rather than a parse error.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(default, deserialize_with = "optional_text::deserialize")]
    access_token: Option<String>,
    #[serde(default, deserialize_with = "optional_text::deserialize")]
    expires_in: Option<String>,
    #[serde(default, deserialize_with = "optional_text::deserialize")]
    refresh_token: Option<String>,
}

/// A refreshed access token and its lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Refreshed {
    access_token: String,
    expires_in: i64,
    refresh_token: Option<String>,
}

impl TokenResponse {
    fn parse(body: &str) -> Result<Refreshed> {
        let response: Self = serde_json::from_str(body)
            .map_err(|e| Error::Protocol(format!("malformed token response: {e}")))?;

        let (Some(access_token), Some(expires_in)) = (response.access_token, response.expires_in)
        else {
            return Err(Error::Protocol(
                "token response lacks access_token or expires_in".into(),
            ));
        };

        let expires_in = parse_seconds(&expires_in)
            .filter(|secs| *secs > 0)
            .ok_or_else(|| Error::Protocol(format!("invalid expires_in '{expires_in}'")))?;

        Ok(Refreshed {
            access_token,
            expires_in,
            refresh_token: response.refresh_token,
        })
    }
}

/// Builds the form body for a refresh-token or client-credentials grant.
fn request_body(settings: &Effective<'_>, refresh_token: Option<&str>) -> String {
    let mut form = form_urlencoded::Serializer::new(String::new());
    form.append_pair("client_id", settings.client_id)
        .append_pair("client_secret", settings.client_secret);

    if settings.use_client_credentials {
        form.append_pair("grant_type", "client_credentials")
            .append_pair("scope", settings.scope);
    } else {
        form.append_pair("grant_type", "refresh_token")
            .append_pair("refresh_token", refresh_token.unwrap_or_default());
    }

    form.finish()
}

fn non_empty(value: &str) -> Option<&str> {
    (!value.is_empty()).then_some(value)
}

fn now() -> i64 {
    Utc::now().timestamp()
}

/// Owns one credential record for the duration of an authentication attempt.
pub struct TokenStore {
    log: DiagnosticLog,
    config: Arc<StaticConfig>,
    http: Arc<dyn HttpPost>,
    path: PathBuf,
    enable_updates: bool,
    record: CredentialRecord,
    refresh_attempts: u32,
}

impl std::fmt::Debug for TokenStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenStore")
            .field("path", &self.path)
            .field("enable_updates", &self.enable_updates)
            .field("expiry", &self.record.expiry)
            .field("refresh_attempts", &self.refresh_attempts)
            .finish_non_exhaustive()
    }
}

impl TokenStore {
    /// Loads the record at `path`.
    ///
    /// With `enable_updates` false, refreshed tokens are kept in memory only.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the record cannot be read or parsed, or if
    /// it lacks a refresh token while neither externally managed nor using
    /// client credentials.
    pub fn open(
        log: DiagnosticLog,
        config: Arc<StaticConfig>,
        http: Arc<dyn HttpPost>,
        path: impl Into<PathBuf>,
        enable_updates: bool,
    ) -> Result<Self> {
        let path = path.into();
        log.append(format!("TokenStore::open: file={}", path.display()));

        let record = CredentialRecord::load(&path).inspect_err(|e| {
            log.append(format!("TokenStore::open: {e}"));
        })?;

        let settings = config.effective(&record.overrides);
        if record.refresh_token.is_none()
            && !(settings.manage_token_externally || settings.use_client_credentials)
        {
            log.append("TokenStore::open: missing refresh_token");
            return Err(Error::storage(&path, "missing refresh_token"));
        }

        log.append(format!(
            "TokenStore::open: expiry={}, user={}",
            record.expiry,
            record.user.as_deref().unwrap_or_default()
        ));

        Ok(Self {
            log,
            config,
            http,
            path,
            enable_updates,
            record,
            refresh_attempts: 0,
        })
    }

    /// Returns the record path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the in-memory record.
    #[must_use]
    pub const fn record(&self) -> &CredentialRecord {
        &self.record
    }

    /// Returns how many refreshes this store has attempted.
    #[must_use]
    pub const fn refresh_attempts(&self) -> u32 {
        self.refresh_attempts
    }

    /// Returns the settings in effect for this record.
    #[must_use]
    pub fn settings(&self) -> Effective<'_> {
        self.config.effective(&self.record.overrides)
    }

    /// Returns true if the access token expires within the refresh window.
    #[must_use]
    pub fn needs_refresh(&self) -> bool {
        let settings = self.settings();
        !settings.manage_token_externally
            && now().saturating_add(settings.refresh_window) >= self.record.expiry
    }

    /// Returns a usable access token, refreshing it first if it is about to
    /// expire. Externally managed tokens are returned as stored.
    ///
    /// # Errors
    ///
    /// Returns the refresh error if a needed refresh fails.
    pub fn get_access_token(&mut self) -> Result<String> {
        if self.settings().manage_token_externally {
            return Ok(self.record.access_token.clone());
        }

        if self.needs_refresh() {
            self.log
                .append("TokenStore::get_access_token: token expired. refreshing.");
            self.refresh()?;
        }

        Ok(self.record.access_token.clone())
    }

    /// Obtains a new access token from the token endpoint and persists it.
    ///
    /// # Errors
    ///
    /// - [`Error::AttemptBudgetExceeded`] after [`MAX_REFRESH_ATTEMPTS`] refreshes
    /// - [`Error::Transport`] if the endpoint cannot be reached
    /// - [`Error::Protocol`] on a non-200 status or an unusable response
    /// - [`Error::Storage`] if persisting the record fails
    pub fn refresh(&mut self) -> Result<()> {
        if self.refresh_attempts >= MAX_REFRESH_ATTEMPTS {
            self.log.append("TokenStore::refresh: exceeded maximum attempts");
            return Err(Error::AttemptBudgetExceeded {
                attempts: self.refresh_attempts,
            });
        }
        self.refresh_attempts += 1;
        self.log.append(format!(
            "TokenStore::refresh: attempt {}",
            self.refresh_attempts
        ));

        let refreshed = self.request_token()?;

        self.record.access_token = refreshed.access_token;
        if let Some(refresh_token) = refreshed.refresh_token {
            if self.record.refresh_token.as_ref() != Some(&refresh_token) {
                self.log
                    .append("TokenStore::refresh: response includes updated refresh token");
                self.record.refresh_token = Some(refresh_token);
            }
        }
        self.record.expiry = now().saturating_add(refreshed.expires_in);

        self.write()
    }

    fn request_token(&self) -> Result<Refreshed> {
        let settings = self.settings();
        let body = request_body(&settings, self.record.refresh_token.as_deref());
        let grant = if settings.use_client_credentials {
            "client_credentials"
        } else {
            "refresh_token"
        };
        self.log.append(format!(
            "TokenStore::refresh: token_endpoint={}, grant_type={grant}",
            settings.token_endpoint
        ));

        let response = self
            .http
            .post(&PostRequest {
                url: settings.token_endpoint,
                body: &body,
                proxy: non_empty(settings.proxy),
                ca_bundle_file: non_empty(settings.ca_bundle_file),
                ca_certs_dir: non_empty(settings.ca_certs_dir),
            })
            .inspect_err(|e| self.log.append(format!("TokenStore::refresh: {e}")))?;

        self.log.append(format!(
            "TokenStore::refresh: code={}",
            response.status
        ));

        if response.status != 200 {
            self.log.append("TokenStore::refresh: request failed");
            return Err(Error::Protocol(format!(
                "token endpoint returned status {}",
                response.status
            )));
        }

        TokenResponse::parse(&response.body)
            .inspect_err(|e| self.log.append(format!("TokenStore::refresh: {e}")))
    }

    fn write(&self) -> Result<()> {
        if !self.enable_updates {
            self.log.append(format!(
                "TokenStore::write: skipping write to {}",
                self.path.display()
            ));
            return Ok(());
        }

        self.record
            .save_atomic(&self.path)
            .inspect_err(|e| self.log.append(format!("TokenStore::write: {e}")))
    }
}
