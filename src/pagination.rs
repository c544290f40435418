//! This modules defines the common functionality for paging data.

use serde::Serialize;

/// The config for pagination
#[derive(Debug, Clone, PartialEq)]
pub struct PaginationConfig {
    /// The page number to default to when not specified in a request.
    pub default_page: u64,
    /// The number of transactions per page when not specified in a request.
    pub default_page_size: u64,
    /// The largest page size a request may ask for.
    pub max_page_size: u64,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            default_page: 1,
            default_page_size: 30,
            max_page_size: 200,
        }
    }
}

/// A validated page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    /// 1-based page index.
    pub page: u64,
    pub page_size: u64,
}

impl PageRequest {
    /// Build a page request from raw query values, falling back to `config` where they are
    /// missing or unusable.
    ///
    /// Pages below one become one. A page size of zero, or one that does not parse, becomes
    /// the default, and a page size above the maximum is capped.
    pub fn from_raw(page: Option<&str>, page_size: Option<&str>, config: &PaginationConfig) -> Self {
        let page = page
            .and_then(|page| page.trim().parse::<i64>().ok())
            .map(|page| page.max(1) as u64)
            .unwrap_or(config.default_page.max(1));

        let page_size = match page_size.and_then(|size| size.trim().parse::<i64>().ok()) {
            Some(size) if size > 0 => (size as u64).min(config.max_page_size),
            _ => config.default_page_size,
        };

        Self { page, page_size }
    }

    /// The number of rows to skip before this page.
    pub fn offset(&self) -> u64 {
        (self.page - 1).saturating_mul(self.page_size)
    }
}

/// Paging information returned alongside a page of results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    pub total_count: u64,
    pub current_page: u64,
    pub total_pages: u64,
    pub page_size: u64,
}

impl PageInfo {
    pub fn new(total_count: u64, request: PageRequest) -> Self {
        Self {
            total_count,
            current_page: request.page,
            total_pages: total_count.div_ceil(request.page_size),
            page_size: request.page_size,
        }
    }
}
