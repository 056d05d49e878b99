//! This modules defines the common functionality for paging data.

use serde::{Deserialize, Serialize};

use crate::Error;

/// The config for pagination
#[derive(Debug, Clone)]
pub struct PaginationConfig {
    /// The page number to default to when not specified in a request.
    pub default_page: u64,
    /// The number of items per page when not specified in a request.
    pub default_page_size: u64,
    /// The largest page size a client may ask for.
    pub max_page_size: u64,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            default_page: 1,
            default_page_size: 20,
            max_page_size: 100,
        }
    }
}

impl PaginationConfig {
    /// Fill in the page and page size missing from a request.
    ///
    /// # Errors
    ///
    /// Returns an [Error::InvalidInput] if the page or page size is zero, the
    /// page size is larger than [PaginationConfig::max_page_size], or the page
    /// starts beyond the largest offset SQLite accepts.
    pub fn resolve(&self, page: Option<u64>, per_page: Option<u64>) -> Result<PageRequest, Error> {
        let page = page.unwrap_or(self.default_page);
        let per_page = per_page.unwrap_or(self.default_page_size);

        if page == 0 {
            return Err(Error::InvalidInput("page must be at least 1".to_owned()));
        }

        if per_page == 0 || per_page > self.max_page_size {
            return Err(Error::InvalidInput(format!(
                "per_page must be between 1 and {}",
                self.max_page_size
            )));
        }

        let offset = (page - 1)
            .checked_mul(per_page)
            .and_then(|offset| i64::try_from(offset).ok());

        if offset.is_none() || i64::try_from(per_page).is_err() {
            return Err(Error::InvalidInput(format!("page {page} is out of range")));
        }

        Ok(PageRequest { page, per_page })
    }
}

/// A validated request for one page of data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    /// The 1-based page number.
    pub page: u64,
    /// The number of items per page.
    pub per_page: u64,
}

impl PageRequest {
    /// The number of rows to skip in an SQL query.
    ///
    /// Saturates at [i64::MAX] for requests that did not come from
    /// [PaginationConfig::resolve].
    pub fn offset(&self) -> i64 {
        let offset = self.page.saturating_sub(1).saturating_mul(self.per_page);

        i64::try_from(offset).unwrap_or(i64::MAX)
    }

    /// The page size as an SQL `LIMIT`.
    pub fn limit(&self) -> i64 {
        i64::try_from(self.per_page).unwrap_or(i64::MAX)
    }
}

/// One page of items along with the information needed to fetch the others.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    /// The items on this page.
    pub items: Vec<T>,
    /// The 1-based page number.
    pub page: u64,
    /// The maximum number of items per page.
    pub per_page: u64,
    /// The number of items across all pages.
    pub total_items: u64,
    /// The number of pages.
    pub total_pages: u64,
}

impl<T> Page<T> {
    /// Wrap `items` fetched for `request` out of `total_items`.
    pub fn new(items: Vec<T>, request: PageRequest, total_items: u64) -> Self {
        Self {
            items,
            page: request.page,
            per_page: request.per_page,
            total_items,
            total_pages: total_items.div_ceil(request.per_page),
        }
    }
}
