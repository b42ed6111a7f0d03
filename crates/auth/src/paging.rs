//! Sorting direction and page slicing shared by the listing queries.

use serde::{Deserialize, Serialize};

pub const DEFAULT_PAGE_SIZE: u32 = 10;
pub const MAX_PAGE_SIZE: u32 = 100;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub page_size: u32,
    /// Matches before paging.
    pub total: usize,
}

impl<T> Page<T> {
    /// Slice already filtered and sorted `items`.
    ///
    /// `page < 1` reads as the first page; a zero size falls back to
    /// [`DEFAULT_PAGE_SIZE`] and larger sizes are capped at [`MAX_PAGE_SIZE`].
    pub fn slice(items: Vec<T>, page: u32, page_size: u32) -> Self {
        let page = page.max(1);
        let page_size = match page_size {
            0 => DEFAULT_PAGE_SIZE,
            n => n.min(MAX_PAGE_SIZE),
        };
        let total = items.len();
        let skip = (page as usize - 1).saturating_mul(page_size as usize);
        let items = items
            .into_iter()
            .skip(skip)
            .take(page_size as usize)
            .collect();

        Self {
            items,
            page,
            page_size,
            total,
        }
    }
}
