//! Ranked full-text search with keyset pagination.

use serde::Deserialize;
use tracing::{debug, instrument, warn};
use url::form_urlencoded;

use super::cursor::SearchCursor;
use super::sanitize::sanitize_snippet;
use crate::api::{ApiClient, ApiError};
use crate::files::string_or_number;

/// Paginated search endpoint.
pub const SEARCH_ENDPOINT: &str = "/api/v1/search/text/paginated";

/// Largest page size the server accepts.
pub const MAX_SEARCH_PAGE_SIZE: u32 = 100;

/// One ranked hit. The snippet is already sanitized.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult {
    /// Metadata id of the matching file.
    pub file_id: i64,
    /// File name.
    pub filename: String,
    /// MIME type, when recorded.
    pub content_type: Option<String>,
    /// Size in bytes.
    pub size: u64,
    /// Upload time as sent by the server.
    pub uploaded_at: Option<String>,
    /// Match context restricted to `<mark>` highlights.
    pub snippet: String,
    /// OCR confidence in `[0, 1]`, when text came from OCR.
    pub ocr_confidence: Option<f32>,
    /// Relevance, higher is better.
    pub rank: f64,
}

/// One page of results.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SearchPage {
    /// Hits in `(rank DESC, id ASC)` order.
    pub results: Vec<SearchResult>,
    /// Cursor for the next page; present only when `has_more` is true.
    pub next_cursor: Option<SearchCursor>,
    /// Whether another page exists.
    pub has_more: bool,
    /// Number of results on this page.
    pub count: usize,
}

impl SearchPage {
    fn empty() -> Self {
        Self::default()
    }
}

/// Full extracted text of a file.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileText {
    /// Metadata id.
    pub file_id: i64,
    /// File name.
    pub filename: String,
    /// Extracted text; empty when none exists yet.
    #[serde(default)]
    pub text: String,
    /// OCR confidence, when reported.
    #[serde(default)]
    pub ocr_confidence: Option<f32>,
    /// OCR model version, when reported.
    #[serde(default)]
    pub model_version: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawResult {
    file_id: i64,
    #[serde(default)]
    filename: String,
    #[serde(default)]
    content_type: Option<String>,
    #[serde(default)]
    size: Option<u64>,
    #[serde(default, deserialize_with = "string_or_number")]
    uploaded_at: Option<String>,
    #[serde(default)]
    snippet: Option<String>,
    #[serde(default)]
    ocr_confidence: Option<f32>,
    #[serde(default)]
    rank: Option<f64>,
}

impl From<RawResult> for SearchResult {
    fn from(raw: RawResult) -> Self {
        Self {
            file_id: raw.file_id,
            filename: raw.filename,
            content_type: raw.content_type,
            size: raw.size.unwrap_or(0),
            uploaded_at: raw.uploaded_at,
            snippet: sanitize_snippet(raw.snippet.as_deref().unwrap_or_default()),
            ocr_confidence: raw.ocr_confidence,
            rank: raw.rank.unwrap_or(0.0),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSearchResponse {
    #[serde(default)]
    results: Vec<RawResult>,
    next_rank: Option<f64>,
    next_id: Option<i64>,
    #[serde(default)]
    has_more: bool,
}

/// Issues search queries through the shared client.
#[derive(Debug, Clone)]
pub struct SearchEngine {
    client: ApiClient,
}

impl SearchEngine {
    /// Creates an engine on top of a shared client.
    #[must_use]
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    /// Fetches one page of results for `query`.
    ///
    /// A blank query yields an empty page without a request. `page_size` is
    /// clamped to `1..=100`. `cursor` must come from a previous page of the
    /// same query and page size.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] from the request client.
    #[instrument(skip(self, query), fields(query = %query.trim()))]
    pub async fn search(
        &self,
        query: &str,
        cursor: Option<SearchCursor>,
        page_size: u32,
    ) -> Result<SearchPage, ApiError> {
        let query = query.trim();
        if query.is_empty() {
            debug!("blank query; skipping request");
            return Ok(SearchPage::empty());
        }

        let limit = clamp_page_size(page_size);
        let endpoint = search_endpoint(query, cursor, limit);
        let raw: RawSearchResponse = self.client.get_json(&endpoint).await?;
        let page = build_page(raw, cursor);

        debug!(
            count = page.count,
            has_more = page.has_more,
            next = ?page.next_cursor,
            "search page received"
        );
        Ok(page)
    }

    /// Fetches the full extracted text of a file.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] from the request client.
    #[instrument(skip(self))]
    pub async fn file_text(&self, file_id: i64) -> Result<FileText, ApiError> {
        let endpoint = format!("/api/v1/search/files/{file_id}/text");
        self.client.get_json(&endpoint).await
    }
}

/// Clamps a requested page size to what the server accepts.
#[must_use]
pub fn clamp_page_size(page_size: u32) -> u32 {
    page_size.clamp(1, MAX_SEARCH_PAGE_SIZE)
}

fn search_endpoint(query: &str, cursor: Option<SearchCursor>, limit: u32) -> String {
    let mut params = form_urlencoded::Serializer::new(String::new());
    params.append_pair("q", query);
    params.append_pair("limit", &limit.to_string());
    if let Some(cursor) = cursor {
        params.append_pair("lastRank", &cursor.rank.to_string());
        params.append_pair("lastId", &cursor.id.to_string());
    }
    format!("{SEARCH_ENDPOINT}?{}", params.finish())
}

fn build_page(raw: RawSearchResponse, cursor: Option<SearchCursor>) -> SearchPage {
    let received = raw.results.len();
    let results: Vec<SearchResult> = raw
        .results
        .into_iter()
        .map(SearchResult::from)
        .filter(|result| {
            cursor.is_none_or(|c| {
                let follows = c.precedes(result.rank, result.file_id);
                if !follows {
                    warn!(
                        file_id = result.file_id,
                        rank = result.rank,
                        cursor = %c,
                        "dropping result that does not follow the cursor"
                    );
                }
                follows
            })
        })
        .collect();

    if results.len() != received {
        debug!(received, kept = results.len(), "filtered out-of-order results");
    }

    let next_cursor = match (raw.has_more, raw.next_rank, raw.next_id) {
        (true, Some(rank), Some(id)) => Some(SearchCursor::new(rank, id)),
        (true, _, _) => {
            warn!("server reported more results without a cursor; treating as last page");
            None
        }
        _ => None,
    };

    SearchPage {
        count: results.len(),
        has_more: next_cursor.is_some(),
        next_cursor,
        results,
    }
}
