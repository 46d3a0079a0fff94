//! Transfer outcomes other than success.

use crate::api::{ApiError, ApiErrorKind};

/// Why a transfer did not produce a file record.
///
/// Cancellation, transport failure and server rejection are distinct so
/// callers never mistake a user abort for a fault.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    /// Cancelled by the caller.
    #[error("upload of {file_name} cancelled")]
    Cancelled {
        /// Name of the payload.
        file_name: String,
    },

    /// Transport failure before a response arrived.
    #[error("network error uploading {file_name}: {source}")]
    Network {
        /// Name of the payload.
        file_name: String,
        /// Underlying reqwest error.
        #[source]
        source: reqwest::Error,
    },

    /// The server answered with a non-2xx status, or the request could not be built.
    #[error("upload of {file_name} rejected: {source}")]
    Rejected {
        /// Name of the payload.
        file_name: String,
        /// Classified request error.
        #[source]
        source: ApiError,
    },

    /// 2xx response whose body was not the expected file record.
    #[error("invalid response uploading {file_name} (HTTP {status})")]
    InvalidResponse {
        /// Name of the payload.
        file_name: String,
        /// Status code of the response.
        status: u16,
    },
}

impl TransferError {
    /// Whether the transfer ended because the caller cancelled it.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }

    /// Underlying request error kind, if any.
    #[must_use]
    pub fn api_kind(&self) -> Option<ApiErrorKind> {
        match self {
            Self::Network { .. } => Some(ApiErrorKind::Network),
            Self::Rejected { source, .. } => Some(source.kind()),
            Self::InvalidResponse { .. } => Some(ApiErrorKind::MalformedResponse),
            Self::Cancelled { .. } => None,
        }
    }

    /// Human-readable failure text without the file name.
    #[must_use]
    pub fn failure_message(&self) -> String {
        match self {
            Self::Cancelled { .. } => "Upload cancelled".to_string(),
            Self::Network { source, .. } => {
                if source.is_timeout() {
                    "Network error: request timed out".to_string()
                } else {
                    "Network error".to_string()
                }
            }
            Self::Rejected { source, .. } => source.message(),
            Self::InvalidResponse { .. } => "Invalid JSON response".to_string(),
        }
    }
}
