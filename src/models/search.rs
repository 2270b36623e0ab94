use serde::{Deserialize, Serialize};

use super::PortfolioResponse;

pub const DEFAULT_PAGE_SIZE: i64 = 50;
pub const MAX_PAGE_SIZE: i64 = 1000;

/// Search filter and page window. At most one of `name` / `name_like` is set;
/// the HTTP layer enforces that before calling the service.
#[derive(Debug, Clone, Deserialize)]
pub struct SearchQuery {
    pub name: Option<String>,
    pub name_like: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    DEFAULT_PAGE_SIZE
}

impl Default for SearchQuery {
    fn default() -> Self {
        Self {
            name: None,
            name_like: None,
            limit: DEFAULT_PAGE_SIZE,
            offset: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub total_elements: i64,
    pub total_pages: i64,
    pub current_page: i64,
    pub page_size: i64,
    pub has_next: bool,
    pub has_previous: bool,
}

impl Pagination {
    pub fn new(total_elements: i64, current_page: i64, page_size: i64) -> Self {
        let total_pages = if total_elements > 0 && page_size > 0 {
            (total_elements + page_size - 1) / page_size
        } else {
            0
        };

        Self {
            total_elements,
            total_pages,
            current_page,
            page_size,
            has_next: current_page < total_pages - 1,
            has_previous: current_page > 0,
        }
    }

    pub fn from_window(total_elements: i64, limit: i64, offset: i64) -> Self {
        let current_page = if limit > 0 { offset / limit } else { 0 };
        Self::new(total_elements, current_page, limit)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioSearchResponse {
    pub portfolios: Vec<PortfolioResponse>,
    pub pagination: Pagination,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExistsQuery {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExistsResponse {
    pub name: String,
    pub exists: bool,
}
