//! # xoauth2-token
//!
//! `OAuth2` credential lifecycle for the XOAUTH2 SASL mechanism.
//!
//! ## Features
//!
//! - **Credential records**: JSON files holding an access token, refresh token,
//!   expiry and optional per-record overrides
//! - **Refresh**: refresh-token and client-credentials grants with a bounded
//!   attempt budget
//! - **Atomic persistence**: refreshed records replace the file in one rename
//! - **Deferred diagnostics**: a per-attempt trace reported only on failure
//!
//! ## Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use xoauth2_token::{DiagnosticLog, ReqwestPoster, StaticConfig, TokenStore};
//!
//! let config = Arc::new(StaticConfig::load("/etc/sasl/xoauth2.conf")?);
//! let log = DiagnosticLog::from_config(&config);
//! let mut store = TokenStore::open(
//!     log,
//!     config,
//!     Arc::new(ReqwestPoster::new()),
//!     "/var/spool/xoauth2/user.json",
//!     true,
//! )?;
//!
//! // Refreshes first if the token expires within the refresh window.
//! let token = store.get_access_token()?;
//! ```
//!
//! ## Record format
//!
//! ```json
//! {
//!   "access_token": "ya29...",
//!   "refresh_token": "1//0g...",
//!   "expiry": "1700000000",
//!   "user": "someone@example.com",
//!   "refresh_window": "30"
//! }
//! ```
//!
//! Numbers are written as decimal strings; native JSON numbers are accepted
//! on read.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod config;
pub mod diag;
mod encoding;
mod error;
pub mod http;
pub mod token;

pub use config::{Effective, StaticConfig};
pub use diag::{
    ConsoleSink, DiagnosticLog, FailureReport, FaultChannelSink, LogSink, MemorySink, NullSink,
    Verbosity,
};
pub use error::{Error, ErrorKind, Result};
pub use http::{HttpPost, HttpResponse, PostRequest, ReqwestPoster};
pub use token::{CredentialRecord, MAX_REFRESH_ATTEMPTS, Overrides, TokenStore};
