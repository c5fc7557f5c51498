//! Synchronous HTTP POST used for token refresh.

use std::path::Path;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Certificate, Proxy};

use crate::error::{Error, Result};

const USER_AGENT: &str = "sasl xoauth2 token refresher";

/// A single form POST to a token endpoint.
#[derive(Debug, Clone, Copy)]
pub struct PostRequest<'a> {
    /// Endpoint URL.
    pub url: &'a str,
    /// `application/x-www-form-urlencoded` body.
    pub body: &'a str,
    /// Proxy URL, if any.
    pub proxy: Option<&'a str>,
    /// PEM bundle of trusted CAs, if any.
    pub ca_bundle_file: Option<&'a str>,
    /// Directory of PEM CA certificates, if any.
    pub ca_certs_dir: Option<&'a str>,
}

/// Response to a [`PostRequest`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response body.
    pub body: String,
}

/// Performs blocking POST requests.
///
/// Implementations return [`Error::Transport`] when no HTTP response was
/// obtained; any response, whatever its status, is `Ok`.
pub trait HttpPost: Send + Sync {
    /// Sends `request` and waits for the response.
    ///
    /// # Errors
    ///
    /// Returns a transport error if the request could not be completed.
    fn post(&self, request: &PostRequest<'_>) -> Result<HttpResponse>;
}

/// [`HttpPost`] backed by a blocking `reqwest` client.
///
/// A client is built per request since proxy and CA settings may differ
/// between credential records.
#[derive(Debug, Clone, Default)]
pub struct ReqwestPoster {
    timeout: Option<Duration>,
}

impl ReqwestPoster {
    /// Creates a poster with `reqwest`'s default timeout.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets an overall request timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    fn client_for(&self, request: &PostRequest<'_>) -> Result<Client> {
        let mut builder = Client::builder().user_agent(USER_AGENT);

        if let Some(timeout) = self.timeout {
            builder = builder.timeout(timeout);
        }

        if let Some(proxy) = request.proxy {
            let proxy = Proxy::all(proxy)
                .map_err(|e| Error::Transport(format!("invalid proxy '{proxy}': {e}")))?;
            builder = builder.proxy(proxy);
        }

        if let Some(bundle) = request.ca_bundle_file {
            let pem = std::fs::read(bundle)
                .map_err(|e| Error::Transport(format!("unable to read CA bundle {bundle}: {e}")))?;
            let certs = Certificate::from_pem_bundle(&pem)
                .map_err(|e| Error::Transport(format!("invalid CA bundle {bundle}: {e}")))?;
            for cert in certs {
                builder = builder.add_root_certificate(cert);
            }
        }

        if let Some(dir) = request.ca_certs_dir {
            for cert in load_cert_dir(Path::new(dir))? {
                builder = builder.add_root_certificate(cert);
            }
        }

        builder
            .build()
            .map_err(|e| Error::Transport(format!("unable to build HTTP client: {e}")))
    }
}

/// Loads every PEM certificate in `dir`, skipping files that are not PEM.
fn load_cert_dir(dir: &Path) -> Result<Vec<Certificate>> {
    let entries = std::fs::read_dir(dir).map_err(|e| {
        Error::Transport(format!("unable to read CA directory {}: {e}", dir.display()))
    })?;

    let mut certs = Vec::new();
    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let Ok(pem) = std::fs::read(&path) else {
            continue;
        };
        match Certificate::from_pem_bundle(&pem) {
            Ok(found) => certs.extend(found),
            Err(e) => tracing::debug!(path = %path.display(), "skipping CA file: {e}"),
        }
    }
    Ok(certs)
}

impl HttpPost for ReqwestPoster {
    fn post(&self, request: &PostRequest<'_>) -> Result<HttpResponse> {
        let client = self.client_for(request)?;

        let response = client
            .post(request.url)
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(request.body.to_string())
            .send()
            .map_err(|e| Error::Transport(format!("token request failed: {e}")))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .map_err(|e| Error::Transport(format!("unable to read token response: {e}")))?;

        tracing::debug!(url = request.url, status, "token endpoint responded");
        Ok(HttpResponse { status, body })
    }
}
