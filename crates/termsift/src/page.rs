//! Paginated results.

use serde::Serialize;

use crate::traits::{SearchHits, Window};

/// One page of results plus what is needed to page through the rest.
///
/// `total` is the number of matching documents regardless of the window.
/// `complete` is `false` when the engine stopped collecting hits for
/// resource reasons; that is a normal outcome, not an error.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultPage<T> {
    /// Hits on this page, in engine order.
    pub items: Vec<T>,
    /// Requested offset.
    pub first_result: Option<u64>,
    /// Requested page size.
    pub max_results: Option<u64>,
    /// Number of matching documents.
    pub total: u64,
    /// Whether the engine collected every hit.
    pub complete: bool,
}

impl<T> ResultPage<T> {
    /// Builds a page from engine hits and the window that produced them.
    pub fn from_hits(hits: SearchHits<T>, window: Window) -> Self {
        ResultPage {
            items: hits.items,
            first_result: window.first_result,
            max_results: window.max_results,
            total: hits.total,
            complete: !hits.partial,
        }
    }

    /// Number of items on this page.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns `true` if this page holds no items.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Returns `true` if the engine collected every hit.
    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// Returns `true` if more matching documents follow this page.
    ///
    /// On an incomplete page `total` counts matches the engine never
    /// collected, so only a full page is assumed to have a successor.
    pub fn has_more(&self) -> bool {
        let end = self.first_result.unwrap_or(0) + self.items.len() as u64;
        if end >= self.total {
            return false;
        }
        self.complete
            || self
                .max_results
                .is_some_and(|max| max > 0 && self.items.len() as u64 == max)
    }

    /// Maps the items, keeping paging information.
    pub fn map<U, F>(self, f: F) -> ResultPage<U>
    where
        F: FnMut(T) -> U,
    {
        ResultPage {
            items: self.items.into_iter().map(f).collect(),
            first_result: self.first_result,
            max_results: self.max_results,
            total: self.total,
            complete: self.complete,
        }
    }
}

impl<T> IntoIterator for ResultPage<T> {
    type Item = T;
    type IntoIter = std::vec::IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}
