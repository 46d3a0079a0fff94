//! Two-step link indirection for downloads and inline previews.
//!
//! An authenticated request to a redirect-resolution endpoint yields a
//! short-lived blob-store URL. The credential never reaches the blob store,
//! and resolved links are never cached: each call resolves afresh.

use std::fmt;

use serde::Deserialize;
use tracing::{debug, instrument};
use url::Url;

use crate::api::{ApiClient, ApiError};

/// Which redirect endpoint produced a link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkKind {
    /// Attachment download.
    Download,
    /// Inline view.
    Preview,
}

impl LinkKind {
    fn endpoint(self, file_id: i64) -> String {
        match self {
            Self::Download => format!("/api/v1/files/download/{file_id}/redirect"),
            Self::Preview => format!("/api/v1/files/view/{file_id}/redirect"),
        }
    }
}

impl fmt::Display for LinkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Download => "download",
            Self::Preview => "preview",
        })
    }
}

/// A direct, time-limited blob-store URL. Single use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedLink {
    /// The pre-authorized URL.
    pub url: Url,
    /// Endpoint it came from.
    pub kind: LinkKind,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RedirectBody {
    download_url: Option<String>,
}

/// Resolves download and preview links.
#[derive(Debug, Clone)]
pub struct LinkResolver {
    client: ApiClient,
}

impl LinkResolver {
    /// Creates a resolver on top of a shared client.
    #[must_use]
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    /// Resolves a download (attachment) link for `file_id`.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] from the request client, or
    /// [`ApiError::MalformedResponse`] when the response has no usable URL.
    pub async fn resolve_download_link(&self, file_id: i64) -> Result<ResolvedLink, ApiError> {
        self.resolve(file_id, LinkKind::Download).await
    }

    /// Resolves an inline preview link for `file_id`.
    ///
    /// # Errors
    ///
    /// See [`resolve_download_link`](Self::resolve_download_link).
    pub async fn resolve_preview_link(&self, file_id: i64) -> Result<ResolvedLink, ApiError> {
        self.resolve(file_id, LinkKind::Preview).await
    }

    #[instrument(skip(self), fields(kind = %kind))]
    async fn resolve(&self, file_id: i64, kind: LinkKind) -> Result<ResolvedLink, ApiError> {
        let endpoint = kind.endpoint(file_id);
        let response = self.client.get(&endpoint).await?;
        let status = response.status;
        let body: RedirectBody = response.json(&endpoint)?;

        let url = body
            .download_url
            .filter(|u| !u.trim().is_empty())
            .and_then(|u| Url::parse(u.trim()).ok())
            .ok_or_else(|| ApiError::malformed(&endpoint, status))?;

        debug!(file_id, host = url.host_str().unwrap_or_default(), "resolved link");
        Ok(ResolvedLink { url, kind })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoints_per_kind() {
        assert_eq!(
            LinkKind::Download.endpoint(9),
            "/api/v1/files/download/9/redirect"
        );
        assert_eq!(LinkKind::Preview.endpoint(9), "/api/v1/files/view/9/redirect");
    }

    #[test]
    fn test_kind_display() {
        assert_eq!(LinkKind::Download.to_string(), "download");
        assert_eq!(LinkKind::Preview.to_string(), "preview");
    }
}
