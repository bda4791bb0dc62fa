//! Success envelopes shared by all endpoints.

use serde::Serialize;

/// Standard success envelope: `{success, message, data}`.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub message: String,
    pub data: T,
}

impl<T> ApiResponse<T> {
    pub fn ok(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            message: message.into(),
            data,
        }
    }
}

/// Pagination metadata for list endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct PageMeta {
    pub total: i64,
    pub page: i64,
    pub limit: i64,
    pub total_pages: i64,
}

impl PageMeta {
    pub fn new(total: i64, page: i64, limit: i64) -> Self {
        let total_pages = (total as f64 / limit as f64).ceil() as i64;
        Self {
            total,
            page,
            limit,
            total_pages,
        }
    }
}

/// A page of results plus its metadata.
#[derive(Debug, Serialize)]
pub struct Paginated<T> {
    pub meta: PageMeta,
    pub items: Vec<T>,
}

/// Normalize 1-indexed page/limit query values, capping limit at 100.
pub fn page_params(page: Option<i64>, limit: Option<i64>) -> (i64, i64, i64) {
    let page = page.filter(|p| *p > 0).unwrap_or(1);
    let limit = limit.filter(|l| *l > 0).unwrap_or(10).min(100);
    let offset = (page - 1) * limit;
    (page, limit, offset)
}
