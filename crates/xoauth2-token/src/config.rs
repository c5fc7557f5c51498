//! Process-wide static configuration.
//!
//! Every value a credential record may override has its fallback here. The
//! configuration is loaded once and then shared read-only (`Arc<StaticConfig>`)
//! with every session.

use std::path::Path;
use std::sync::{Arc, OnceLock};

use serde::Deserialize;
use url::Url;

use crate::diag::Verbosity;
use crate::encoding::{optional_text, parse_decimal, parse_strict_flag};
use crate::error::{Error, Result};
use crate::token::Overrides;

/// Location of the system-wide configuration file.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/sasl/xoauth2.conf";

/// Token endpoint used when neither config nor record names one.
pub const DEFAULT_TOKEN_ENDPOINT: &str = "https://accounts.google.com/o/oauth2/token";

/// Seconds before expiry at which a token is considered stale.
pub const DEFAULT_REFRESH_WINDOW: i64 = 10;

static GLOBAL: OnceLock<Arc<StaticConfig>> = OnceLock::new();

/// Static configuration supplying defaults for every overridable setting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticConfig {
    /// OAuth2 client ID.
    pub client_id: String,
    /// OAuth2 client secret.
    pub client_secret: String,
    /// Token endpoint URL.
    pub token_endpoint: String,
    /// Proxy for token requests (empty = direct).
    pub proxy: String,
    /// PEM bundle of trusted CAs (empty = system roots).
    pub ca_bundle_file: String,
    /// Directory of PEM CA certificates (empty = none).
    pub ca_certs_dir: String,
    /// Scope requested by the client-credentials grant.
    pub scope: String,
    /// Refresh window in seconds.
    pub refresh_window: i64,
    /// Tokens are refreshed by something else; never refresh here.
    pub manage_token_externally: bool,
    /// Use the client-credentials grant instead of a refresh token.
    pub use_client_credentials: bool,
    /// Report failed attempts on the host's log channel.
    pub log_to_syslog_on_failure: bool,
    /// Report the full trace instead of a summary.
    pub log_full_trace_on_failure: bool,
}

#[derive(Debug, Default, Deserialize)]
struct RawConfig {
    #[serde(default, deserialize_with = "optional_text::deserialize")]
    client_id: Option<String>,
    #[serde(default, deserialize_with = "optional_text::deserialize")]
    client_secret: Option<String>,
    #[serde(default, deserialize_with = "optional_text::deserialize")]
    token_endpoint: Option<String>,
    #[serde(default, deserialize_with = "optional_text::deserialize")]
    proxy: Option<String>,
    #[serde(default, deserialize_with = "optional_text::deserialize")]
    ca_bundle_file: Option<String>,
    #[serde(default, deserialize_with = "optional_text::deserialize")]
    ca_certs_dir: Option<String>,
    #[serde(default, deserialize_with = "optional_text::deserialize")]
    scope: Option<String>,
    #[serde(default, deserialize_with = "optional_text::deserialize")]
    refresh_window: Option<String>,
    #[serde(default, deserialize_with = "optional_text::deserialize")]
    manage_token_externally: Option<String>,
    #[serde(default, deserialize_with = "optional_text::deserialize")]
    use_client_credentials: Option<String>,
    #[serde(default, deserialize_with = "optional_text::deserialize")]
    log_to_syslog_on_failure: Option<String>,
    #[serde(default, deserialize_with = "optional_text::deserialize")]
    log_full_trace_on_failure: Option<String>,
}

fn required(value: Option<String>, name: &str) -> Result<String> {
    value.ok_or_else(|| Error::Config(format!("missing required configuration value: {name}")))
}

fn flag(value: Option<String>, name: &str) -> Result<bool> {
    value.map_or(Ok(false), |text| {
        parse_strict_flag(&text).ok_or_else(|| {
            Error::Config(format!(
                "invalid value '{text}' for {name}: need either 'yes'/'true' or 'no'/'false'"
            ))
        })
    })
}

impl TryFrom<RawConfig> for StaticConfig {
    type Error = Error;

    fn try_from(raw: RawConfig) -> Result<Self> {
        let refresh_window = match raw.refresh_window {
            Some(text) => parse_decimal(&text).ok_or_else(|| {
                Error::Config(format!("invalid value '{text}' for refresh_window"))
            })?,
            None => DEFAULT_REFRESH_WINDOW,
        };

        let config = Self {
            client_id: required(raw.client_id, "client_id")?,
            client_secret: required(raw.client_secret, "client_secret")?,
            token_endpoint: raw
                .token_endpoint
                .unwrap_or_else(|| DEFAULT_TOKEN_ENDPOINT.to_string()),
            proxy: raw.proxy.unwrap_or_default(),
            ca_bundle_file: raw.ca_bundle_file.unwrap_or_default(),
            ca_certs_dir: raw.ca_certs_dir.unwrap_or_default(),
            scope: raw.scope.unwrap_or_default(),
            refresh_window,
            manage_token_externally: flag(raw.manage_token_externally, "manage_token_externally")?,
            use_client_credentials: flag(raw.use_client_credentials, "use_client_credentials")?,
            log_to_syslog_on_failure: flag(
                raw.log_to_syslog_on_failure,
                "log_to_syslog_on_failure",
            )?,
            log_full_trace_on_failure: flag(
                raw.log_full_trace_on_failure,
                "log_full_trace_on_failure",
            )?,
        };
        config.validate()?;
        Ok(config)
    }
}

impl StaticConfig {
    /// Creates a configuration with the given client credentials and defaults
    /// for everything else.
    #[must_use]
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            token_endpoint: DEFAULT_TOKEN_ENDPOINT.to_string(),
            proxy: String::new(),
            ca_bundle_file: String::new(),
            ca_certs_dir: String::new(),
            scope: String::new(),
            refresh_window: DEFAULT_REFRESH_WINDOW,
            manage_token_externally: false,
            use_client_credentials: false,
            log_to_syslog_on_failure: false,
            log_full_trace_on_failure: false,
        }
    }

    /// Loads configuration from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the file cannot be read, is not
    /// valid JSON, or lacks a required value.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("unable to read {}: {e}", path.display())))?;
        let config = Self::from_json(&contents)?;
        tracing::debug!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    /// Parses configuration from JSON text.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the text is invalid.
    pub fn from_json(text: &str) -> Result<Self> {
        let raw: RawConfig = serde_json::from_str(text)
            .map_err(|e| Error::Config(format!("malformed configuration: {e}")))?;
        raw.try_into()
    }

    /// Builds configuration from an in-memory JSON value, bypassing the
    /// configuration file. Intended for tests and embedding hosts.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the value is invalid.
    pub fn from_value(value: serde_json::Value) -> Result<Self> {
        let raw: RawConfig = serde_json::from_value(value)
            .map_err(|e| Error::Config(format!("malformed configuration: {e}")))?;
        raw.try_into()
    }

    /// Installs `config` as the process-wide configuration.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if a configuration is already installed.
    pub fn install(config: Self) -> Result<Arc<Self>> {
        let shared = Arc::new(config);
        GLOBAL
            .set(Arc::clone(&shared))
            .map_err(|_| Error::Config("configuration already initialized".into()))?;
        Ok(shared)
    }

    /// Returns the process-wide configuration, loading it from
    /// [`DEFAULT_CONFIG_PATH`] on first use.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the first load fails.
    pub fn global() -> Result<Arc<Self>> {
        if let Some(config) = GLOBAL.get() {
            return Ok(Arc::clone(config));
        }
        let loaded = Arc::new(Self::load(DEFAULT_CONFIG_PATH)?);
        Ok(Arc::clone(GLOBAL.get_or_init(|| loaded)))
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the token endpoint is not a URL or the refresh
    /// window is negative.
    pub fn validate(&self) -> Result<()> {
        Url::parse(&self.token_endpoint).map_err(|e| {
            Error::Config(format!("invalid token_endpoint '{}': {e}", self.token_endpoint))
        })?;
        if self.refresh_window < 0 {
            return Err(Error::Config("refresh_window must not be negative".into()));
        }
        Ok(())
    }

    /// Resolves every overridable setting: record override if present, else
    /// this configuration's value.
    #[must_use]
    pub fn effective<'a>(&'a self, overrides: &'a Overrides) -> Effective<'a> {
        Effective {
            client_id: overrides.client_id.as_deref().unwrap_or(&self.client_id),
            client_secret: overrides
                .client_secret
                .as_deref()
                .unwrap_or(&self.client_secret),
            token_endpoint: overrides
                .token_endpoint
                .as_deref()
                .unwrap_or(&self.token_endpoint),
            proxy: overrides.proxy.as_deref().unwrap_or(&self.proxy),
            ca_bundle_file: overrides
                .ca_bundle_file
                .as_deref()
                .unwrap_or(&self.ca_bundle_file),
            ca_certs_dir: overrides
                .ca_certs_dir
                .as_deref()
                .unwrap_or(&self.ca_certs_dir),
            scope: overrides.scope.as_deref().unwrap_or(&self.scope),
            refresh_window: overrides.refresh_window.unwrap_or(self.refresh_window),
            manage_token_externally: overrides
                .manage_token_externally
                .unwrap_or(self.manage_token_externally),
            use_client_credentials: overrides
                .use_client_credentials
                .unwrap_or(self.use_client_credentials),
        }
    }

    /// Returns how much of a failed attempt's trace gets reported.
    #[must_use]
    pub const fn verbosity(&self) -> Verbosity {
        if self.log_full_trace_on_failure {
            Verbosity::FullTrace
        } else {
            Verbosity::Summary
        }
    }
}

/// Settings in effect for one credential record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Effective<'a> {
    /// OAuth2 client ID.
    pub client_id: &'a str,
    /// OAuth2 client secret.
    pub client_secret: &'a str,
    /// Token endpoint URL.
    pub token_endpoint: &'a str,
    /// Proxy (empty = direct).
    pub proxy: &'a str,
    /// CA bundle file (empty = none).
    pub ca_bundle_file: &'a str,
    /// CA directory (empty = none).
    pub ca_certs_dir: &'a str,
    /// Client-credentials scope.
    pub scope: &'a str,
    /// Refresh window in seconds.
    pub refresh_window: i64,
    /// Externally managed token.
    pub manage_token_externally: bool,
    /// Client-credentials grant.
    pub use_client_credentials: bool,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_defaults_applied() {
        let config = StaticConfig::from_json(r#"{"client_id": "id", "client_secret": "secret"}"#)
            .unwrap();
        assert_eq!(config.token_endpoint, DEFAULT_TOKEN_ENDPOINT);
        assert_eq!(config.refresh_window, 10);
        assert!(!config.manage_token_externally);
        assert!(!config.use_client_credentials);
        assert_eq!(config, StaticConfig::new("id", "secret"));
    }

    #[test]
    fn test_missing_client_id() {
        let err = StaticConfig::from_value(json!({"client_secret": "secret"})).unwrap_err();
        assert!(matches!(err, Error::Config(ref msg) if msg.contains("client_id")));
    }

    #[test]
    fn test_invalid_flag() {
        let err = StaticConfig::from_value(json!({
            "client_id": "id",
            "client_secret": "secret",
            "use_client_credentials": "sometimes",
        }))
        .unwrap_err();
        assert!(matches!(err, Error::Config(ref msg) if msg.contains("use_client_credentials")));
    }

    #[test]
    fn test_string_encoded_values() {
        let config = StaticConfig::from_value(json!({
            "client_id": "id",
            "client_secret": "secret",
            "refresh_window": "300",
            "manage_token_externally": "Yes",
            "log_full_trace_on_failure": "true",
        }))
        .unwrap();
        assert_eq!(config.refresh_window, 300);
        assert!(config.manage_token_externally);
        assert_eq!(config.verbosity(), Verbosity::FullTrace);
    }

    #[test]
    fn test_invalid_endpoint() {
        let err = StaticConfig::from_value(json!({
            "client_id": "id",
            "client_secret": "secret",
            "token_endpoint": "not a url",
        }))
        .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = StaticConfig::load(dir.path().join("absent.conf")).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("xoauth2.conf");
        std::fs::write(&path, r#"{"client_id": "id", "client_secret": "s", "scope": "mail"}"#)
            .unwrap();
        let config = StaticConfig::load(&path).unwrap();
        assert_eq!(config.scope, "mail");
    }

    #[test]
    fn test_effective_prefers_overrides() {
        let config = StaticConfig::new("id", "secret");
        let overrides = Overrides {
            client_id: Some("record-id".into()),
            refresh_window: Some(0),
            use_client_credentials: Some(true),
            ..Overrides::default()
        };

        let effective = config.effective(&overrides);
        assert_eq!(effective.client_id, "record-id");
        assert_eq!(effective.client_secret, "secret");
        assert_eq!(effective.token_endpoint, DEFAULT_TOKEN_ENDPOINT);
        assert_eq!(effective.refresh_window, 0);
        assert!(effective.use_client_credentials);
        assert!(!effective.manage_token_externally);
    }

    #[test]
    fn test_effective_without_overrides() {
        let mut config = StaticConfig::new("id", "secret");
        config.refresh_window = 60;
        config.proxy = "http://proxy:3128".into();

        let overrides = Overrides::default();
        let effective = config.effective(&overrides);
        assert_eq!(effective.refresh_window, 60);
        assert_eq!(effective.proxy, "http://proxy:3128");
    }

    #[test]
    fn test_install_then_global() {
        let installed = StaticConfig::install(StaticConfig::new("global-id", "s")).unwrap();
        let fetched = StaticConfig::global().unwrap();
        assert!(Arc::ptr_eq(&installed, &fetched));
        assert!(StaticConfig::install(StaticConfig::new("other", "s")).is_err());
    }
}
