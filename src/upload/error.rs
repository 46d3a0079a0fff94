//! Orchestrator errors.
//!
//! Transfer failures are not errors here: they end up on the task record.
//! These cover what happens before a task exists.

use crate::api::ApiError;

/// Largest accepted payload: 10 MiB.
pub const MAX_UPLOAD_BYTES: u64 = 10 * 1024 * 1024;

/// Client-local rejection. Never touches the network.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// Zero-byte payload.
    #[error("file is empty")]
    Empty,

    /// Payload above [`MAX_UPLOAD_BYTES`].
    #[error("file too large: {size} bytes (max 10 MB)")]
    TooLarge {
        /// Payload size.
        size: u64,
    },
}

/// Errors from [`UploadOrchestrator`](super::UploadOrchestrator) before a task starts.
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    /// The payload failed validation.
    #[error("{file_name}: {reason}")]
    Validation {
        /// Payload name.
        file_name: String,
        /// Why it was rejected.
        #[source]
        reason: ValidationError,
    },

    /// The listing used for duplicate detection could not be read.
    #[error("duplicate check for {file_name} failed: {source}")]
    DuplicateCheck {
        /// Payload name.
        file_name: String,
        /// Request error.
        #[source]
        source: ApiError,
    },

    /// Deleting the existing file for a replace failed.
    #[error("could not replace {file_name} (file {file_id}): {source}")]
    Replace {
        /// Payload name.
        file_name: String,
        /// Id of the file that should have been deleted.
        file_id: i64,
        /// Request error.
        #[source]
        source: ApiError,
    },
}

impl UploadError {
    /// Whether this is a client-local validation failure.
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation { .. })
    }
}

/// Checks the size bounds of a payload.
///
/// # Errors
///
/// Returns [`ValidationError`] for empty or oversized payloads.
pub fn validate_size(size: u64) -> Result<(), ValidationError> {
    if size == 0 {
        Err(ValidationError::Empty)
    } else if size > MAX_UPLOAD_BYTES {
        Err(ValidationError::TooLarge { size })
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounds() {
        assert_eq!(validate_size(0), Err(ValidationError::Empty));
        assert_eq!(validate_size(1), Ok(()));
        assert_eq!(validate_size(MAX_UPLOAD_BYTES), Ok(()));
        assert_eq!(
            validate_size(MAX_UPLOAD_BYTES + 1),
            Err(ValidationError::TooLarge {
                size: MAX_UPLOAD_BYTES + 1
            })
        );
    }

    #[test]
    fn test_validation_message_names_file() {
        let err = UploadError::Validation {
            file_name: "huge.bin".to_string(),
            reason: ValidationError::TooLarge { size: 20_000_000 },
        };
        assert!(err.is_validation());
        assert_eq!(
            err.to_string(),
            "huge.bin: file too large: 20000000 bytes (max 10 MB)"
        );
    }
}
