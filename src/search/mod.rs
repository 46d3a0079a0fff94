//! Full-text search retrieval.
//!
//! [`SearchEngine`] issues one keyset-paginated query per page and sanitizes
//! every snippet before returning it. [`SearchPager`] layers a cursor stack
//! on top for previous-page navigation.

mod cursor;
mod engine;
mod pager;
mod sanitize;

pub use cursor::SearchCursor;
pub use engine::{
    FileText, MAX_SEARCH_PAGE_SIZE, SEARCH_ENDPOINT, SearchEngine, SearchPage, SearchResult,
    clamp_page_size,
};
pub use pager::SearchPager;
pub use sanitize::sanitize_snippet;
