//! Transfer engine: one streamed multipart upload at a time.
//!
//! [`TransferEngine::begin_upload`] returns an [`UploadHandle`] whose
//! outcome resolves to the created [`FileReference`](crate::files::FileReference)
//! or a [`TransferError`] that keeps cancellation, transport failure and
//! server rejection apart.

mod engine;
mod error;
mod payload;

pub use engine::{
    CHUNK_SIZE, CancelHandle, ProgressCallback, TransferEngine, TransferOutcome, UPLOAD_ENDPOINT,
    UPLOAD_FIELD, UploadHandle,
};
pub use error::TransferError;
pub use payload::{
    FALLBACK_MEDIA_TYPE, PayloadError, TransferProgress, UploadPayload, media_type_for,
};
