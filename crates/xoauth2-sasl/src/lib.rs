//! # xoauth2-sasl
//!
//! Client side of the SASL `XOAUTH2` mechanism (Google/Microsoft).
//!
//! The secret the host supplies for a user is not a password but the path of
//! a credential record managed by [`xoauth2_token`]. Each exchange loads that
//! record, refreshes the access token if it is about to expire, and sends
//! `user=<user>\x01auth=Bearer <token>\x01\x01`. A `400`/`401` status from
//! the server triggers one more refresh and asks the host to retry.
//!
//! ## Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use xoauth2_sasl::{AuthSession, Host, HostCode, Step};
//! use xoauth2_token::{ReqwestPoster, StaticConfig};
//!
//! struct Smtp;
//!
//! impl Host for Smtp {
//!     fn auth_name(&mut self) -> Result<Option<String>, HostCode> {
//!         Ok(Some("user@example.com".into()))
//!     }
//!     fn secret(&mut self) -> Result<Option<String>, HostCode> {
//!         Ok(Some("/var/spool/xoauth2/user.json".into()))
//!     }
//! }
//!
//! let config = StaticConfig::global()?;
//! let mut session = AuthSession::new(config, Arc::new(ReqwestPoster::new()));
//!
//! if let Step::Response(bytes) = session.step(&mut Smtp, b"", None)? {
//!     // Send: AUTH XOAUTH2 <base64(bytes)>
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod error;
pub mod prompt;
pub mod session;
pub mod wire;

pub use error::{Error, ErrorKind, HostCode, Result, WireCode};
pub use prompt::{Host, PromptAnswer, PromptId, PromptRequest};
pub use session::{AuthSession, Step};
pub use wire::{Challenge, ChallengeStatus, InitialResponse, MECHANISM, Mechanism};
