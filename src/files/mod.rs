//! File metadata catalog and link resolution.
//!
//! The metadata service owns file records; this module only reads the
//! listing, deletes entries, probes text availability, and resolves
//! short-lived blob-store links (see [`LinkResolver`]).

mod links;

use async_trait::async_trait;
use reqwest::header::{ETAG, HeaderMap};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::{debug, instrument};

use crate::api::{ApiClient, ApiError};

pub use links::{LinkKind, LinkResolver, ResolvedLink};

/// Base path of the file endpoints.
pub const FILES_ENDPOINT: &str = "/api/v1/files";

/// Largest page size the listing endpoint serves.
pub const MAX_LIST_PAGE_SIZE: u32 = 100;

/// Read-only file metadata as reported by the metadata service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileReference {
    /// Metadata id.
    pub id: i64,
    /// Name the file was uploaded under.
    #[serde(rename = "originalFilename")]
    pub display_name: String,
    /// Size in bytes.
    #[serde(rename = "size")]
    pub size_bytes: u64,
    /// MIME type recorded at upload.
    #[serde(rename = "contentType", default)]
    pub media_type: String,
    /// Upload timestamp as sent by the server.
    #[serde(
        rename = "uploadTimestamp",
        default,
        deserialize_with = "string_or_number"
    )]
    pub created_at: Option<String>,
}

/// One page of the offset/limit file listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilePage {
    /// Files on this page, newest first.
    pub files: Vec<FileReference>,
    /// Zero-based page index.
    pub current_page: u32,
    /// Total page count.
    pub total_pages: u32,
    /// Total file count.
    pub total_elements: u64,
    /// Whether a later page exists.
    pub has_next: bool,
    /// Whether an earlier page exists.
    pub has_previous: bool,
}

/// Result of the extracted-text existence probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextAvailability {
    /// Whether extracted text exists for the file.
    pub has_text: bool,
    /// Length of the text in characters.
    pub text_length: u64,
    /// Validator for conditional requests, when the server sent one.
    pub etag: Option<String>,
}

impl TextAvailability {
    fn from_headers(headers: &HeaderMap) -> Self {
        let get = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());
        Self {
            has_text: get("x-has-text").is_some_and(|v| v.trim().eq_ignore_ascii_case("true")),
            text_length: get("x-text-length")
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(0),
            etag: get(ETAG.as_str()).map(str::to_string),
        }
    }
}

/// Listing and deletion as needed by the upload orchestrator.
#[async_trait]
pub trait FileCatalog: Send + Sync + std::fmt::Debug {
    /// Reads one page of the listing.
    async fn list(&self, page: u32, size: u32) -> Result<FilePage, ApiError>;

    /// Deletes a file by id.
    async fn delete(&self, file_id: i64) -> Result<(), ApiError>;
}

/// File endpoints of the vault API.
#[derive(Debug, Clone)]
pub struct FilesApi {
    client: ApiClient,
}

impl FilesApi {
    /// Creates the file API on top of a shared client.
    #[must_use]
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    /// Probes whether extracted text exists without transferring it.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] if the probe fails (404 when the file is unknown).
    #[instrument(skip(self))]
    pub async fn text_availability(&self, file_id: i64) -> Result<TextAvailability, ApiError> {
        let endpoint = format!("/api/v1/search/files/{file_id}/text");
        let headers = self.client.head(&endpoint).await?;
        let availability = TextAvailability::from_headers(&headers);
        debug!(file_id, has_text = availability.has_text, "text availability probed");
        Ok(availability)
    }
}

#[async_trait]
impl FileCatalog for FilesApi {
    #[instrument(skip(self))]
    async fn list(&self, page: u32, size: u32) -> Result<FilePage, ApiError> {
        let size = size.clamp(1, MAX_LIST_PAGE_SIZE);
        let endpoint = format!("{FILES_ENDPOINT}?page={page}&size={size}");
        let listing: FilePage = self.client.get_json(&endpoint).await?;
        debug!(
            page,
            returned = listing.files.len(),
            total = listing.total_elements,
            "listed files"
        );
        Ok(listing)
    }

    #[instrument(skip(self))]
    async fn delete(&self, file_id: i64) -> Result<(), ApiError> {
        let endpoint = format!("{FILES_ENDPOINT}/{file_id}");
        self.client.delete(&endpoint).await?;
        debug!(file_id, "deleted file");
        Ok(())
    }
}

pub(crate) fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s),
        Some(other) => Some(other.to_string()),
    })
}
