//! Page-number pagination over an already filtered and sorted list.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    pub current: usize,
    pub total: usize,
    pub total_items: usize,
    pub has_next: bool,
    pub has_prev: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub pagination: PageInfo,
}

/// Search result: everything (page 0) or one page.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Listing<T> {
    All(Vec<T>),
    Paged(Page<T>),
}

impl<T> Listing<T> {
    /// Items in this listing, regardless of shape.
    pub fn items(&self) -> &[T] {
        match self {
            Listing::All(items) => items,
            Listing::Paged(page) => &page.data,
        }
    }
}

/// Paginate `items` (1-based `page`). Page 0 returns the full list unchanged.
pub fn paginate<T>(items: Vec<T>, page: usize, page_size: usize) -> Listing<T> {
    if page == 0 || page_size == 0 {
        return Listing::All(items);
    }

    let total_items = items.len();
    let start = (page - 1).saturating_mul(page_size);
    let data: Vec<T> = items.into_iter().skip(start).take(page_size).collect();

    Listing::Paged(Page {
        data,
        pagination: PageInfo {
            current: page,
            total: total_items.div_ceil(page_size),
            total_items,
            has_next: start.saturating_add(page_size) < total_items,
            has_prev: page > 1,
        },
    })
}
