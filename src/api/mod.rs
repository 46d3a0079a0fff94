//! Resilient request client for the vault API.
//!
//! Everything that talks to the network goes through [`ApiClient`]:
//!
//! - a fresh `X-Client-Request-Id` on every attempt
//! - `Authorization: Bearer` when the [`Session`] holds a credential
//! - non-2xx responses classified into [`ApiError`] / [`ApiErrorKind`]
//! - Retry-After extraction (seconds or HTTP-date) for 429s
//! - session expiry on 401, reported once through the [`ClientNotifier`]
//!
//! Nothing here retries automatically; rate-limit waits are advisory.

mod client;
mod error;
mod notify;
mod retry_after;
mod session;

pub use client::{
    ApiClient, ApiResponse, CLIENT_REQUEST_ID_HEADER, ResponseBody, SERVER_REQUEST_ID_HEADER,
};
pub use error::{ApiError, ApiErrorKind, HttpFailure};
pub use notify::{ChannelNotifier, ClientEvent, ClientNotifier, NoopNotifier, RateLimitAdvisory};
pub use retry_after::{DEFAULT_RETRY_AFTER_SECS, parse_retry_after};
pub use session::{Session, SessionEndReason, SessionError, TOKEN_ENV_VAR};
