//! Keyset cursor for ranked search.

use std::cmp::Ordering;
use std::fmt;

/// Position after the last result of a page.
///
/// Results are ordered by `(rank DESC, id ASC)`; a cursor is only
/// meaningful for the query and page size that produced it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchCursor {
    /// Relevance rank of the last result.
    pub rank: f64,
    /// File id of the last result, the tie-breaker.
    pub id: i64,
}

impl SearchCursor {
    /// Creates a cursor.
    #[must_use]
    pub fn new(rank: f64, id: i64) -> Self {
        Self { rank, id }
    }

    /// Whether a result at `(rank, id)` comes strictly after this cursor.
    #[must_use]
    pub fn precedes(&self, rank: f64, id: i64) -> bool {
        match rank.partial_cmp(&self.rank) {
            Some(Ordering::Less) => true,
            Some(Ordering::Equal) => id > self.id,
            Some(Ordering::Greater) | None => false,
        }
    }
}

impl fmt::Display for SearchCursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.rank, self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lower_rank_follows() {
        let cursor = SearchCursor::new(0.5, 10);
        assert!(cursor.precedes(0.4, 1));
        assert!(!cursor.precedes(0.6, 99));
    }

    #[test]
    fn test_equal_rank_breaks_ties_on_id() {
        let cursor = SearchCursor::new(0.5, 10);
        assert!(cursor.precedes(0.5, 11));
        assert!(!cursor.precedes(0.5, 10));
        assert!(!cursor.precedes(0.5, 9));
    }

    #[test]
    fn test_nan_rank_never_follows() {
        let cursor = SearchCursor::new(0.5, 10);
        assert!(!cursor.precedes(f64::NAN, 11));
    }
}
