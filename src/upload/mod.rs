//! Upload orchestration.
//!
//! [`UploadOrchestrator`] validates submissions, detects name conflicts,
//! starts transfers through the [`TransferEngine`](crate::transfer::TransferEngine)
//! and keeps one [`UploadTask`] per transfer until it is swept.
//!
//! ```text
//! submit ─ validate ─ duplicate? ──no──▶ Uploading ─┬─▶ Success
//!                        │                          ├─▶ Error
//!                        ▼                          └─▶ Cancelled
//!                resolve_duplicate (replace | keep-both | cancel)
//! ```

mod classify;
mod duplicate;
mod error;
mod orchestrator;
mod task;

pub use classify::classify_upload_failure;
pub use duplicate::{
    DuplicateAction, DuplicateDecision, MAX_RENAME_ATTEMPTS, PendingUpload, unique_name,
};
pub use error::{MAX_UPLOAD_BYTES, UploadError, ValidationError, validate_size};
pub use orchestrator::{SubmitOptions, SubmitOutcome, UploadEvent, UploadOrchestrator};
pub use task::{TaskId, UploadErrorKind, UploadState, UploadTask};
