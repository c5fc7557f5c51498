//! On-disk credential record.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::encoding::{decimal, optional_decimal, optional_flag, optional_text};
use crate::error::{Error, Result};

static WRITE_SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Per-record settings that take precedence over [`StaticConfig`].
///
/// A `None` field means "use the configured default"; defaults are never
/// copied into the record.
///
/// [`StaticConfig`]: crate::StaticConfig
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Overrides {
    /// OAuth2 client ID.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "optional_text::deserialize"
    )]
    pub client_id: Option<String>,
    /// OAuth2 client secret.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "optional_text::deserialize"
    )]
    pub client_secret: Option<String>,
    /// Token endpoint URL.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "optional_text::deserialize"
    )]
    pub token_endpoint: Option<String>,
    /// Proxy URL.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "optional_text::deserialize"
    )]
    pub proxy: Option<String>,
    /// PEM bundle of trusted CAs.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "optional_text::deserialize"
    )]
    pub ca_bundle_file: Option<String>,
    /// Directory of PEM CA certificates.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "optional_text::deserialize"
    )]
    pub ca_certs_dir: Option<String>,
    /// Scope for the client-credentials grant.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "optional_text::deserialize"
    )]
    pub scope: Option<String>,
    /// Refresh window in seconds. `Some(0)` refreshes only once expired.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "optional_decimal"
    )]
    pub refresh_window: Option<i64>,
    /// Never refresh; the access token is maintained by someone else.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "optional_flag"
    )]
    pub manage_token_externally: Option<bool>,
    /// Use the client-credentials grant.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "optional_flag"
    )]
    pub use_client_credentials: Option<bool>,
}

/// An OAuth2 credential as persisted on disk.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialRecord {
    /// Current access token.
    #[serde(default)]
    pub access_token: String,
    /// Refresh token, absent for externally managed or client-credentials records.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "optional_text::deserialize"
    )]
    pub refresh_token: Option<String>,
    /// Access token expiry, seconds since the Unix epoch.
    #[serde(default, with = "decimal")]
    pub expiry: i64,
    /// User the credential belongs to.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "optional_text::deserialize"
    )]
    pub user: Option<String>,
    /// Per-record overrides.
    #[serde(flatten)]
    pub overrides: Overrides,
}

impl CredentialRecord {
    /// Creates a record holding a refresh token.
    #[must_use]
    pub fn new(
        access_token: impl Into<String>,
        refresh_token: impl Into<String>,
        expiry: i64,
    ) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: Some(refresh_token.into()),
            expiry,
            ..Self::default()
        }
    }

    /// Parses a record from JSON text.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not a valid record.
    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }

    /// Serializes the record, numbers and flags as strings.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Reads a record from `path`.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .map_err(|e| Error::storage(path, format!("unable to open: {e}")))?;
        Self::from_json(&contents).map_err(|e| Error::storage(path, format!("unable to parse: {e}")))
    }

    /// Writes the record beside `path` and atomically renames it into place.
    ///
    /// Readers of `path` see either the old or the new record, never a mix.
    ///
    /// # Errors
    ///
    /// Returns a storage error if writing or renaming fails. The temporary
    /// file is removed on failure.
    pub fn save_atomic(&self, path: &Path) -> Result<()> {
        let json = self
            .to_json()
            .map_err(|e| Error::storage(path, format!("unable to serialize: {e}")))?;

        let tmp_path = temp_path(path);
        if let Err(e) = write_private(&tmp_path, json.as_bytes()) {
            let _ = fs::remove_file(&tmp_path);
            return Err(Error::storage(&tmp_path, format!("unable to write: {e}")));
        }

        if let Err(e) = fs::rename(&tmp_path, path) {
            let _ = fs::remove_file(&tmp_path);
            return Err(Error::storage(path, format!("unable to replace: {e}")));
        }

        tracing::debug!(path = %path.display(), "persisted credential record");
        Ok(())
    }
}

/// `<path>.<pid>.<millis>.<seq>`, in the same directory as `path`.
fn temp_path(path: &Path) -> PathBuf {
    let seq = WRITE_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    let mut name = path.as_os_str().to_owned();
    name.push(format!(
        ".{}.{}.{seq}",
        std::process::id(),
        Utc::now().timestamp_millis()
    ));
    PathBuf::from(name)
}

/// Creates `path` (owner read/write only on unix) and writes `contents`.
fn write_private(path: &Path, contents: &[u8]) -> io::Result<()> {
    let mut options = OpenOptions::new();
    options.write(true).create_new(true);

    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options.open(path)?;
    file.write_all(contents)?;
    file.sync_all()
}
