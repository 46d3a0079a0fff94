//! Streamed multipart upload with progress and cooperative cancellation.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use futures_util::stream;
use reqwest::Method;
use reqwest::multipart::{Form, Part};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, info_span, warn};

use super::error::TransferError;
use super::payload::{TransferProgress, UploadPayload};
use crate::api::{ApiClient, ApiError};
use crate::config::ClientConfig;
use crate::files::FileReference;

/// Upload endpoint.
pub const UPLOAD_ENDPOINT: &str = "/api/v1/files/upload";

/// Multipart field carrying the file.
pub const UPLOAD_FIELD: &str = "file";

/// Size of each body chunk handed to the transport.
pub const CHUNK_SIZE: usize = 64 * 1024;

/// Callback receiving progress ticks.
pub type ProgressCallback = Arc<dyn Fn(TransferProgress) + Send + Sync>;

/// Result of a single transfer.
pub type TransferOutcome = Result<FileReference, TransferError>;

/// Cloneable handle that cancels one transfer.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle(CancellationToken);

impl CancelHandle {
    /// Requests cancellation. Idempotent.
    pub fn cancel(&self) {
        self.0.cancel();
    }

    /// Whether cancellation has been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.is_cancelled()
    }
}

/// An upload that has been prepared but not yet driven.
///
/// The transfer starts when the outcome future is first polled.
pub struct UploadHandle {
    cancel: CancelHandle,
    outcome: BoxFuture<'static, TransferOutcome>,
}

impl fmt::Debug for UploadHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadHandle")
            .field("cancelled", &self.cancel.is_cancelled())
            .finish_non_exhaustive()
    }
}

impl UploadHandle {
    /// Cancels the transfer.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Returns a handle that can cancel the transfer from elsewhere.
    #[must_use]
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Drives the transfer to completion.
    ///
    /// # Errors
    ///
    /// Returns [`TransferError`] when the transfer was cancelled, failed in
    /// transport, or was rejected by the server.
    pub async fn wait(self) -> TransferOutcome {
        self.outcome.await
    }

    /// Splits the handle so the outcome can be spawned separately.
    #[must_use]
    pub fn into_parts(self) -> (CancelHandle, BoxFuture<'static, TransferOutcome>) {
        (self.cancel, self.outcome)
    }
}

/// Performs single-file uploads through the shared [`ApiClient`].
#[derive(Debug, Clone)]
pub struct TransferEngine {
    client: ApiClient,
    upload_timeout: Duration,
}

impl TransferEngine {
    /// Creates an engine using the upload timeout from `config`.
    #[must_use]
    pub fn new(client: ApiClient, config: &ClientConfig) -> Self {
        Self {
            client,
            upload_timeout: config.upload_timeout(),
        }
    }

    /// Prepares an upload of `payload`.
    ///
    /// `on_progress` is called each time a chunk is handed to the transport.
    /// Once the handle is cancelled the outcome is always
    /// [`TransferError::Cancelled`], even if the server already answered.
    #[must_use]
    pub fn begin_upload(&self, payload: UploadPayload, on_progress: ProgressCallback) -> UploadHandle {
        let cancel = CancelHandle::default();
        let token = cancel.0.clone();
        let engine = self.clone();
        let span = info_span!("upload", file_name = %payload.file_name, size = payload.size());

        let outcome = async move {
            let file_name = payload.file_name.clone();
            let result = tokio::select! {
                biased;
                () = token.cancelled() => Err(TransferError::Cancelled { file_name: file_name.clone() }),
                result = engine.send(payload, on_progress) => result,
            };
            // Cancellation wins over a response that raced it.
            if token.is_cancelled() {
                info!("upload cancelled");
                return Err(TransferError::Cancelled { file_name });
            }
            match &result {
                Ok(file) => info!(file_id = file.id, "upload complete"),
                Err(e) => warn!(error = %e, "upload failed"),
            }
            result
        }
        .instrument(span)
        .boxed();

        UploadHandle { cancel, outcome }
    }

    async fn send(&self, payload: UploadPayload, on_progress: ProgressCallback) -> TransferOutcome {
        let UploadPayload {
            file_name,
            media_type,
            bytes,
        } = payload;
        let rejected = |source: ApiError| TransferError::Rejected {
            file_name: file_name.clone(),
            source,
        };

        let url = self.client.endpoint_url(UPLOAD_ENDPOINT).map_err(rejected)?;
        let total = bytes.len() as u64;
        let part = Part::stream_with_length(progress_body(bytes, on_progress), total)
            .file_name(file_name.clone())
            .mime_str(&media_type)
            .map_err(|e| rejected(ApiError::invalid_request(UPLOAD_ENDPOINT, e.to_string())))?;
        let form = Form::new().part(UPLOAD_FIELD, part);

        // Credential and correlation id go on before the body is attached.
        let (builder, client_request_id) = self.client.request(Method::POST, url);
        debug!(%client_request_id, total, "sending upload");
        let response = builder
            .timeout(self.upload_timeout)
            .multipart(form)
            .send()
            .await
            .map_err(|source| TransferError::Network {
                file_name: file_name.clone(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            let error = self
                .client
                .failure_from_response(UPLOAD_ENDPOINT, response)
                .await;
            return Err(rejected(error));
        }

        let text = response.text().await.map_err(|source| TransferError::Network {
            file_name: file_name.clone(),
            source,
        })?;
        serde_json::from_str::<FileReference>(&text).map_err(|e| {
            debug!(error = %e, "upload response did not decode");
            TransferError::InvalidResponse {
                file_name: file_name.clone(),
                status: status.as_u16(),
            }
        })
    }
}

/// Wraps `bytes` in a streaming body that reports each chunk as it is pulled.
fn progress_body(bytes: Bytes, on_progress: ProgressCallback) -> reqwest::Body {
    let total = bytes.len() as u64;
    let mut sent = 0_u64;
    let chunks = split_chunks(bytes).into_iter().map(move |chunk| {
        sent += chunk.len() as u64;
        on_progress(TransferProgress::new(sent, total));
        Ok::<Bytes, std::io::Error>(chunk)
    });
    reqwest::Body::wrap_stream(stream::iter(chunks))
}

fn split_chunks(mut bytes: Bytes) -> Vec<Bytes> {
    let mut chunks = Vec::with_capacity(bytes.len().div_ceil(CHUNK_SIZE));
    while !bytes.is_empty() {
        let take = bytes.len().min(CHUNK_SIZE);
        chunks.push(bytes.split_to(take));
    }
    chunks
}
