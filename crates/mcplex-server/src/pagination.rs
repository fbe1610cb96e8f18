//! Cursor-based pagination over registration order.

use mcplex_protocol::meta::Cursor;
use mcplex_protocol::{McpError, McpResult};

/// Page size used when the caller does not pass a limit.
pub const DEFAULT_PAGE_SIZE: usize = 50;

/// One page of a listing.
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next_cursor: Option<Cursor>,
    pub total: Option<u64>,
}

impl<T> Page<T> {
    pub fn has_more(&self) -> bool {
        self.next_cursor.is_some()
    }
}

/// Slice one page out of `items`.
///
/// Items are in registration order; the cursor encodes the absolute offset
/// of the next page, so folding every page reproduces the full order with
/// no duplicates and no omissions. A cursor past the end (items were
/// unregistered meanwhile) yields an empty final page rather than an error.
pub fn paginate<T: Clone>(
    items: &[T],
    cursor: Option<&Cursor>,
    limit: Option<usize>,
) -> McpResult<Page<T>> {
    let offset = match cursor {
        Some(cursor) => cursor
            .to_offset()
            .map_err(|e| McpError::invalid_params(e.to_string()))?,
        None => 0,
    };
    let limit = limit.unwrap_or(DEFAULT_PAGE_SIZE).max(1);
    let end = offset.saturating_add(limit).min(items.len());
    let page = if offset >= items.len() {
        Vec::new()
    } else {
        items[offset..end].to_vec()
    };
    let next_cursor = (end < items.len()).then(|| Cursor::from_offset(end));
    Ok(Page {
        items: page,
        next_cursor,
        total: Some(items.len() as u64),
    })
}

/// Fold every page of a paginated fetch into one list.
pub async fn list_all<T, F, Fut>(mut fetch_page: F) -> McpResult<Vec<T>>
where
    F: FnMut(Option<Cursor>) -> Fut,
    Fut: Future<Output = McpResult<Page<T>>>,
{
    let mut items = Vec::new();
    let mut cursor: Option<Cursor> = None;
    loop {
        let page = fetch_page(cursor.take()).await?;
        items.extend(page.items);
        match page.next_cursor {
            Some(next) => cursor = Some(next),
            None => return Ok(items),
        }
    }
}
