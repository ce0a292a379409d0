//! Page request/response shapes for list endpoints.

use serde::{Deserialize, Serialize};

/// Body of a list request: `{ start, length, search, meId }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    pub start: usize,
    pub length: usize,
    pub search: String,
    #[serde(rename = "meId")]
    pub me_id: Option<String>,
}

/// List responses nest the rows twice: `{ "data": { "data": [..] } }`. The
/// outer `data` is the [`ApiResponse`](crate::ApiResponse) payload; this is
/// the inner object.
#[derive(Debug, Clone, Deserialize)]
pub struct PageRows<T> {
    pub data: Vec<T>,
}

impl<T> PageRows<T> {
    pub fn into_items(self) -> Vec<T> {
        self.data
    }
}

/// One fetched window of a paginated list.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchPage<T> {
    pub cursor: usize,
    pub page_size: usize,
    pub items: Vec<T>,
    pub has_more: bool,
}

impl<T> FetchPage<T> {
    /// A short page (fewer rows than requested) is the only end-of-list signal.
    pub fn new(cursor: usize, page_size: usize, items: Vec<T>) -> Self {
        let has_more = items.len() >= page_size;
        Self {
            cursor,
            page_size,
            items,
            has_more,
        }
    }

    /// Offset of the window after this one.
    pub fn next_cursor(&self) -> usize {
        self.cursor + self.page_size
    }
}
