//! Client-side page history over a forward-only keyset protocol.

use tracing::debug;

use super::cursor::SearchCursor;
use super::engine::{SearchEngine, SearchPage, clamp_page_size};
use crate::api::ApiError;

/// Walks search pages forwards and backwards.
///
/// The server only pages forward. Going back pops the cursor stack and
/// replays the earlier cursor, so a previous page is re-fetched rather than
/// cached. Changing the query or page size discards the stack.
#[derive(Debug, Clone)]
pub struct SearchPager {
    engine: SearchEngine,
    page_size: u32,
    query: String,
    /// Cursor used for each visited page; the last entry is the current page.
    stack: Vec<Option<SearchCursor>>,
    current: Option<SearchPage>,
}

impl SearchPager {
    /// Creates a pager with no active query.
    #[must_use]
    pub fn new(engine: SearchEngine, page_size: u32) -> Self {
        Self {
            engine,
            page_size: clamp_page_size(page_size),
            query: String::new(),
            stack: Vec::new(),
            current: None,
        }
    }

    /// Active query, trimmed.
    #[must_use]
    pub fn query(&self) -> &str {
        &self.query
    }

    /// Page size in effect.
    #[must_use]
    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    /// Changes the page size; existing cursors become invalid and are dropped.
    pub fn set_page_size(&mut self, page_size: u32) {
        let page_size = clamp_page_size(page_size);
        if page_size != self.page_size {
            debug!(from = self.page_size, to = page_size, "page size changed; resetting cursors");
            self.page_size = page_size;
            self.reset();
        }
    }

    /// Current page, if a search has run.
    #[must_use]
    pub fn current(&self) -> Option<&SearchPage> {
        self.current.as_ref()
    }

    /// One-based number of the current page; zero before the first search.
    #[must_use]
    pub fn page_number(&self) -> usize {
        self.stack.len()
    }

    /// Whether [`previous_page`](Self::previous_page) can go back.
    #[must_use]
    pub fn has_previous(&self) -> bool {
        self.stack.len() > 1
    }

    /// Whether [`next_page`](Self::next_page) can go forward.
    #[must_use]
    pub fn has_next(&self) -> bool {
        self.current
            .as_ref()
            .is_some_and(|page| page.next_cursor.is_some())
    }

    /// Starts a search from the first page.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] from the request client; the pager is left reset.
    pub async fn search(&mut self, query: &str) -> Result<&SearchPage, ApiError> {
        let query = query.trim();
        if query != self.query {
            debug!(query, "query changed; resetting cursors");
        }
        self.query = query.to_string();
        self.reset();

        let page = self.fetch(None).await?;
        self.stack.push(None);
        Ok(self.current.insert(page))
    }

    /// Advances to the next page.
    ///
    /// Returns `Ok(None)` when there is no next page.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] from the request client; the current page is kept.
    pub async fn next_page(&mut self) -> Result<Option<&SearchPage>, ApiError> {
        let Some(cursor) = self.current.as_ref().and_then(|page| page.next_cursor) else {
            return Ok(None);
        };
        let page = self.fetch(Some(cursor)).await?;
        self.stack.push(Some(cursor));
        Ok(Some(self.current.insert(page)))
    }

    /// Goes back one page by replaying the earlier cursor.
    ///
    /// Returns `Ok(None)` when already on the first page.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] from the request client; the current page is kept.
    pub async fn previous_page(&mut self) -> Result<Option<&SearchPage>, ApiError> {
        if !self.has_previous() {
            return Ok(None);
        }
        let earlier = self.stack[self.stack.len() - 2];
        let page = self.fetch(earlier).await?;
        self.stack.pop();
        Ok(Some(self.current.insert(page)))
    }

    fn reset(&mut self) {
        self.stack.clear();
        self.current = None;
    }

    async fn fetch(&self, cursor: Option<SearchCursor>) -> Result<SearchPage, ApiError> {
        self.engine
            .search(&self.query, cursor, self.page_size)
            .await
    }
}
