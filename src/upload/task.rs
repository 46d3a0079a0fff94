//! Upload task records and their state machine.

use std::fmt;

use tokio::time::Instant;
use uuid::Uuid;

/// Identifier of one upload task. Never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskId(Uuid);

impl TaskId {
    pub(crate) fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// The underlying UUID.
    #[must_use]
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Lifecycle of a task: `Uploading` then exactly one terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadState {
    /// Transfer in flight.
    Uploading,
    /// Stored; see [`UploadTask::result_file_id`].
    Success,
    /// Failed; see [`UploadTask::error_kind`].
    Error,
    /// Cancelled by the user.
    Cancelled,
}

impl UploadState {
    /// Whether the state is final.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Uploading)
    }

    /// Stable string label.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Uploading => "uploading",
            Self::Success => "success",
            Self::Error => "error",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for UploadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// User-facing bucket for a failed upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadErrorKind {
    /// Rejected for size.
    TooLarge,
    /// Transport failure or timeout.
    Network,
    /// Not permitted (401/403).
    Forbidden,
    /// Name conflict reported by the server.
    Duplicate,
    /// Unsupported file type.
    InvalidType,
    /// Anything else.
    Unknown,
}

impl UploadErrorKind {
    /// Stable string label.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::TooLarge => "too_large",
            Self::Network => "network",
            Self::Forbidden => "forbidden",
            Self::Duplicate => "duplicate",
            Self::InvalidType => "invalid_type",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for UploadErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of one upload.
///
/// Only the orchestrator mutates tasks; callers receive clones.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadTask {
    /// Task id.
    pub id: TaskId,
    /// Name the file is uploaded under.
    pub file_name: String,
    /// Payload size in bytes.
    pub size: u64,
    /// Completion in `[0, 100]`; never decreases while uploading.
    pub progress: f64,
    /// Current state.
    pub state: UploadState,
    /// Failure bucket, set in [`UploadState::Error`].
    pub error_kind: Option<UploadErrorKind>,
    /// Failure text, set in [`UploadState::Error`].
    pub error_message: Option<String>,
    /// Metadata id of the stored file, set in [`UploadState::Success`].
    pub result_file_id: Option<i64>,
    /// When the task was created or last changed state.
    pub last_transition: Instant,
}

impl UploadTask {
    pub(crate) fn new(id: TaskId, file_name: impl Into<String>, size: u64) -> Self {
        Self {
            id,
            file_name: file_name.into(),
            size,
            progress: 0.0,
            state: UploadState::Uploading,
            error_kind: None,
            error_message: None,
            result_file_id: None,
            last_transition: Instant::now(),
        }
    }

    /// Whether the task is still in flight.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.state == UploadState::Uploading
    }

    /// Raises progress; ignores decreases, non-finite values and terminal tasks.
    ///
    /// Returns whether the value changed.
    pub(crate) fn advance(&mut self, percent: f64) -> bool {
        if !self.is_active() || !percent.is_finite() {
            return false;
        }
        let percent = percent.clamp(0.0, 100.0);
        if percent > self.progress {
            self.progress = percent;
            true
        } else {
            false
        }
    }

    pub(crate) fn succeed(&mut self, file_id: i64) {
        self.state = UploadState::Success;
        self.progress = 100.0;
        self.result_file_id = Some(file_id);
    }

    pub(crate) fn fail(&mut self, kind: UploadErrorKind, message: String) {
        self.state = UploadState::Error;
        self.error_kind = Some(kind);
        self.error_message = Some(message);
    }

    pub(crate) fn mark_cancelled(&mut self) {
        self.state = UploadState::Cancelled;
    }
}
