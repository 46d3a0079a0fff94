//! Buckets upload failures for display.

use crate::api::ApiErrorKind;

use super::task::UploadErrorKind;

const TOO_LARGE: &[&str] = &[
    "too large",
    "size exceeded",
    "exceeds",
    "maximum upload size",
    "payload too large",
];
const DUPLICATE: &[&str] = &["duplicate", "already exists"];
const INVALID_TYPE: &[&str] = &[
    "invalid type",
    "invalid file type",
    "unsupported",
    "file type",
    "content type",
    "media type",
];
const FORBIDDEN: &[&str] = &[
    "forbidden",
    "access denied",
    "permission",
    "unauthorized",
    "not allowed",
];
const NETWORK: &[&str] = &["network", "timed out", "timeout", "connection"];

/// Classifies a failure from its message, falling back to the request error kind.
///
/// Message heuristics are checked in a fixed order so that, for example,
/// "file type not allowed" is an invalid type rather than a permission error.
#[must_use]
pub fn classify_upload_failure(message: &str, kind: Option<ApiErrorKind>) -> UploadErrorKind {
    let message = message.to_lowercase();
    let matches = |needles: &[&str]| needles.iter().any(|n| message.contains(n));

    if matches(TOO_LARGE) {
        UploadErrorKind::TooLarge
    } else if matches(DUPLICATE) {
        UploadErrorKind::Duplicate
    } else if matches(INVALID_TYPE) {
        UploadErrorKind::InvalidType
    } else if matches(FORBIDDEN) {
        UploadErrorKind::Forbidden
    } else if matches(NETWORK) {
        UploadErrorKind::Network
    } else {
        match kind {
            Some(ApiErrorKind::Network) => UploadErrorKind::Network,
            Some(ApiErrorKind::Forbidden | ApiErrorKind::Unauthorized) => {
                UploadErrorKind::Forbidden
            }
            Some(ApiErrorKind::Conflict) => UploadErrorKind::Duplicate,
            _ => UploadErrorKind::Unknown,
        }
    }
}
