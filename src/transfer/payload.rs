//! Upload payloads and progress snapshots.

use std::path::{Path, PathBuf};

use bytes::Bytes;
use tracing::debug;

/// Media type used when the extension is unknown.
pub const FALLBACK_MEDIA_TYPE: &str = "application/octet-stream";

/// Errors building a payload from disk.
#[derive(Debug, thiserror::Error)]
pub enum PayloadError {
    /// The file could not be read.
    #[error("cannot read {path}: {source}")]
    Io {
        /// Path that failed.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The file is larger than the caller allows. Nothing was read.
    #[error("{path} is {size} bytes, above the {max_bytes} byte limit")]
    TooLarge {
        /// Offending path.
        path: PathBuf,
        /// Size on disk.
        size: u64,
        /// Limit passed to [`UploadPayload::from_path`].
        max_bytes: u64,
    },

    /// The path has no usable UTF-8 file name.
    #[error("path has no usable file name: {path}")]
    InvalidName {
        /// Offending path.
        path: PathBuf,
    },
}

/// A file to upload: name, media type and the full content.
///
/// Cloning is cheap; the content is reference counted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadPayload {
    /// Name sent as the multipart file name.
    pub file_name: String,
    /// MIME type sent with the part.
    pub media_type: String,
    /// File content.
    pub bytes: Bytes,
}

impl UploadPayload {
    /// Creates a payload, inferring the media type from the file name.
    #[must_use]
    pub fn new(file_name: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        let file_name = file_name.into();
        let media_type = media_type_for(&file_name).to_string();
        Self {
            file_name,
            media_type,
            bytes: bytes.into(),
        }
    }

    /// Overrides the inferred media type.
    #[must_use]
    pub fn with_media_type(mut self, media_type: impl Into<String>) -> Self {
        self.media_type = media_type.into();
        self
    }

    /// Reads a payload from disk, refusing files above `max_bytes`.
    ///
    /// The size is checked from metadata before any content is read.
    ///
    /// # Errors
    ///
    /// Returns [`PayloadError`] if the file cannot be read, has no name, or
    /// is larger than `max_bytes`.
    pub async fn from_path(path: impl AsRef<Path>, max_bytes: u64) -> Result<Self, PayloadError> {
        let path = path.as_ref();
        let io_error = |source| PayloadError::Io {
            path: path.to_path_buf(),
            source,
        };
        let too_large = |size| PayloadError::TooLarge {
            path: path.to_path_buf(),
            size,
            max_bytes,
        };
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .filter(|n| !n.is_empty())
            .ok_or_else(|| PayloadError::InvalidName {
                path: path.to_path_buf(),
            })?
            .to_string();

        let size = tokio::fs::metadata(path).await.map_err(io_error)?.len();
        if size > max_bytes {
            return Err(too_large(size));
        }
        let bytes = tokio::fs::read(path).await.map_err(io_error)?;
        // The file may have grown since the metadata read.
        if bytes.len() as u64 > max_bytes {
            return Err(too_large(bytes.len() as u64));
        }
        debug!(path = %path.display(), size = bytes.len(), "loaded upload payload");
        Ok(Self::new(file_name, bytes))
    }

    /// Payload size in bytes.
    #[must_use]
    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    /// Same content and media type under a different name.
    #[must_use]
    pub fn renamed(&self, file_name: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            media_type: self.media_type.clone(),
            bytes: self.bytes.clone(),
        }
    }
}

/// Progress of one transfer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransferProgress {
    /// Bytes handed to the transport so far.
    pub bytes_sent: u64,
    /// Total payload size.
    pub total_bytes: u64,
    /// Completion in `[0, 100]`; `None` when the total is zero.
    pub percent: Option<f64>,
}

impl TransferProgress {
    /// Builds a snapshot, computing the percentage when possible.
    #[must_use]
    pub fn new(bytes_sent: u64, total_bytes: u64) -> Self {
        #[allow(clippy::cast_precision_loss)]
        let percent = (total_bytes > 0)
            .then(|| (bytes_sent.min(total_bytes) as f64 / total_bytes as f64) * 100.0);
        Self {
            bytes_sent,
            total_bytes,
            percent,
        }
    }
}

/// Infers a MIME type from the file extension.
#[must_use]
pub fn media_type_for(file_name: &str) -> &'static str {
    let extension = Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match extension.as_deref() {
        Some("pdf") => "application/pdf",
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("tif" | "tiff") => "image/tiff",
        Some("bmp") => "image/bmp",
        Some("txt" | "log") => "text/plain",
        Some("md") => "text/markdown",
        Some("csv") => "text/csv",
        Some("html" | "htm") => "text/html",
        Some("json") => "application/json",
        Some("xml") => "application/xml",
        Some("zip") => "application/zip",
        Some("doc") => "application/msword",
        Some("docx") => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        Some("xls") => "application/vnd.ms-excel",
        Some("xlsx") => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        Some("ppt") => "application/vnd.ms-powerpoint",
        Some("pptx") => "application/vnd.openxmlformats-officedocument.presentationml.presentation",
        _ => FALLBACK_MEDIA_TYPE,
    }
}
