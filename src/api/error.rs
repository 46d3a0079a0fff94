//! Error types for the request client.
//!
//! Every non-2xx response is folded into [`ApiError::Http`] carrying the
//! server envelope, so callers can branch on [`ApiError::kind`] instead of
//! raw status codes.

use std::fmt;

use thiserror::Error;

/// Server-side failure details extracted from a non-2xx response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpFailure {
    /// HTTP status code.
    pub status: u16,
    /// Message from the JSON envelope, or the raw response text.
    pub message: String,
    /// Origin path reported by the server (or the request path for non-JSON bodies).
    pub path: Option<String>,
    /// Server timestamp from the JSON envelope.
    pub timestamp: Option<String>,
    /// Server-assigned correlation id (`X-Request-ID`).
    pub request_id: Option<String>,
    /// Seconds to wait before retrying, only set for 429 responses.
    pub retry_after: Option<u64>,
}

/// Coarse classification of request client failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiErrorKind {
    /// Transport failure: DNS, connection refused, timeout, reset.
    Network,
    /// HTTP 401; the held credential has been cleared.
    Unauthorized,
    /// HTTP 403.
    Forbidden,
    /// HTTP 429; see [`HttpFailure::retry_after`].
    RateLimited,
    /// HTTP 404.
    NotFound,
    /// HTTP 409.
    Conflict,
    /// Any 5xx.
    Server,
    /// Any other non-2xx status.
    Client,
    /// A success response that should have been JSON but was not.
    MalformedResponse,
    /// The request could not be built (bad endpoint, unserializable body).
    InvalidRequest,
}

impl ApiErrorKind {
    /// Maps an HTTP status to its error kind.
    #[must_use]
    pub fn from_status(status: u16) -> Self {
        match status {
            401 => Self::Unauthorized,
            403 => Self::Forbidden,
            404 => Self::NotFound,
            409 => Self::Conflict,
            429 => Self::RateLimited,
            500..=599 => Self::Server,
            _ => Self::Client,
        }
    }

    /// Returns the stable string label.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Network => "network",
            Self::Unauthorized => "unauthorized",
            Self::Forbidden => "forbidden",
            Self::RateLimited => "rate_limited",
            Self::NotFound => "not_found",
            Self::Conflict => "conflict",
            Self::Server => "server",
            Self::Client => "client",
            Self::MalformedResponse => "malformed_response",
            Self::InvalidRequest => "invalid_request",
        }
    }
}

impl fmt::Display for ApiErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors returned by [`ApiClient`](super::ApiClient).
#[derive(Debug, Error)]
pub enum ApiError {
    /// Transport-level failure before any status was received.
    #[error("network error calling {endpoint}: {source}")]
    Network {
        /// Endpoint that was being called.
        endpoint: String,
        /// The underlying transport error.
        #[source]
        source: reqwest::Error,
    },

    /// Non-2xx response.
    #[error("HTTP {} from {endpoint}: {}", .failure.status, .failure.message)]
    Http {
        /// Endpoint that was being called.
        endpoint: String,
        /// Parsed failure envelope.
        failure: HttpFailure,
    },

    /// Success status, but the body was not valid JSON.
    #[error("invalid JSON response from {endpoint} (HTTP {status})")]
    MalformedResponse {
        /// Endpoint that was being called.
        endpoint: String,
        /// The success status that carried the bad body.
        status: u16,
    },

    /// The request could not be constructed.
    #[error("invalid request to {endpoint}: {reason}")]
    InvalidRequest {
        /// Endpoint that was being called.
        endpoint: String,
        /// What was wrong with it.
        reason: String,
    },
}

impl ApiError {
    /// Creates a network error.
    pub fn network(endpoint: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Network {
            endpoint: endpoint.into(),
            source,
        }
    }

    /// Creates an HTTP failure error.
    pub fn http(endpoint: impl Into<String>, failure: HttpFailure) -> Self {
        Self::Http {
            endpoint: endpoint.into(),
            failure,
        }
    }

    /// Creates a malformed-response error.
    pub fn malformed(endpoint: impl Into<String>, status: u16) -> Self {
        Self::MalformedResponse {
            endpoint: endpoint.into(),
            status,
        }
    }

    /// Creates an invalid-request error.
    pub fn invalid_request(endpoint: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidRequest {
            endpoint: endpoint.into(),
            reason: reason.into(),
        }
    }

    /// Returns the error classification.
    #[must_use]
    pub fn kind(&self) -> ApiErrorKind {
        match self {
            Self::Network { .. } => ApiErrorKind::Network,
            Self::Http { failure, .. } => ApiErrorKind::from_status(failure.status),
            Self::MalformedResponse { .. } => ApiErrorKind::MalformedResponse,
            Self::InvalidRequest { .. } => ApiErrorKind::InvalidRequest,
        }
    }

    /// Returns the HTTP status, if a response was received.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { failure, .. } => Some(failure.status),
            Self::MalformedResponse { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Returns the server failure envelope, if any.
    #[must_use]
    pub fn failure(&self) -> Option<&HttpFailure> {
        match self {
            Self::Http { failure, .. } => Some(failure),
            _ => None,
        }
    }

    /// Returns the Retry-After wait in seconds for rate-limited responses.
    #[must_use]
    pub fn retry_after(&self) -> Option<u64> {
        self.failure().and_then(|failure| failure.retry_after)
    }

    /// Returns the server-assigned correlation id, if the server sent one.
    #[must_use]
    pub fn server_request_id(&self) -> Option<&str> {
        self.failure().and_then(|failure| failure.request_id.as_deref())
    }

    /// Returns the human-readable message without endpoint decoration.
    #[must_use]
    pub fn message(&self) -> String {
        match self {
            Self::Network { source, .. } => format!("network error: {source}"),
            Self::Http { failure, .. } => failure.message.clone(),
            Self::MalformedResponse { .. } => "invalid JSON response".to_string(),
            Self::InvalidRequest { reason, .. } => reason.clone(),
        }
    }
}
