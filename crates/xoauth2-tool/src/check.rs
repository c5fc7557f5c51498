//! Configuration and token refresh checks.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use xoauth2_token::{DiagnosticLog, HttpPost, StaticConfig, TokenStore};

/// Loads and validates the configuration at `path`.
pub fn config(path: &Path) -> Result<Arc<StaticConfig>> {
    let config = StaticConfig::load(path)
        .with_context(|| format!("unable to load configuration from {}", path.display()))?;
    Ok(Arc::new(config))
}

/// Performs one refresh of the record at `path` without writing it back.
///
/// On failure the diagnostic trace is flushed before returning.
pub fn refresh(
    config: Arc<StaticConfig>,
    http: Arc<dyn HttpPost>,
    path: &Path,
    log: &DiagnosticLog,
) -> Result<()> {
    let result = TokenStore::open(log.clone(), config, http, path, false)
        .and_then(|mut store| store.refresh());

    match &result {
        Ok(()) => tracing::debug!(path = %path.display(), "token refresh succeeded"),
        Err(_) => log.flush(),
    }
    result.with_context(|| format!("unable to refresh token in {}", path.display()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::fs;
    use std::sync::Mutex;
    use xoauth2_token::{CredentialRecord, HttpResponse, MemorySink, PostRequest, Verbosity};

    struct OneShot(Mutex<Option<HttpResponse>>);

    impl OneShot {
        fn new(status: u16, body: &str) -> Arc<Self> {
            Arc::new(Self(Mutex::new(Some(HttpResponse {
                status,
                body: body.to_string(),
            }))))
        }
    }

    impl HttpPost for OneShot {
        fn post(&self, _request: &PostRequest<'_>) -> xoauth2_token::Result<HttpResponse> {
            self.0
                .lock()
                .unwrap()
                .take()
                .ok_or_else(|| xoauth2_token::Error::Transport("exhausted".into()))
        }
    }

    fn config_file(dir: &tempfile::TempDir, contents: &str) -> std::path::PathBuf {
        let path = dir.path().join("xoauth2.conf");
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_config_check() {
        let dir = tempfile::tempdir().unwrap();
        let good = config_file(&dir, r#"{"client_id": "id", "client_secret": "secret"}"#);
        assert_eq!(config(&good).unwrap().client_id, "id");

        let bad = config_file(&dir, r#"{"client_id": "id"}"#);
        assert!(config(&bad).is_err());
        assert!(config(&dir.path().join("absent.conf")).is_err());
    }

    #[test]
    fn test_refresh_leaves_record_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token.json");
        CredentialRecord::new("access", "refresh", 0)
            .save_atomic(&path)
            .unwrap();
        let before = fs::read(&path).unwrap();

        let config = Arc::new(StaticConfig::new("id", "secret"));
        let http = OneShot::new(200, r#"{"access_token": "new", "expires_in": 3600}"#);
        refresh(config, http, &path, &DiagnosticLog::null()).unwrap();

        assert_eq!(fs::read(&path).unwrap(), before);
    }

    #[test]
    fn test_failed_refresh_flushes_trace() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token.json");
        CredentialRecord::new("access", "refresh", 0)
            .save_atomic(&path)
            .unwrap();

        let sink = MemorySink::new();
        let log = DiagnosticLog::new(sink.clone(), Verbosity::FullTrace);
        let config = Arc::new(StaticConfig::new("id", "secret"));
        let err = refresh(config, OneShot::new(401, ""), &path, &log).unwrap_err();

        assert!(err.to_string().contains("unable to refresh token"));
        assert!(sink.flushed().iter().any(|l| l.contains("code=401")));
    }
}
