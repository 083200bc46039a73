//! Dashboard pagination

/// Default dashboard page size
pub const DEFAULT_PAGE_SIZE: i64 = 50;

/// Pagination metadata calculated from the total number of reports
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    /// Current page number (1-indexed)
    pub page: i64,
    pub total_pages: i64,
    /// Offset for the store's LIMIT/OFFSET listing
    pub offset: i64,
    pub page_size: i64,
}

/// Calculate pagination metadata, clamping `requested_page` into `[1, total_pages]`
///
/// # Examples
/// ```
/// use civic_review::pagination::calculate_pagination;
///
/// // 120 reports at 50 per page = 3 pages (50 + 50 + 20)
/// let p = calculate_pagination(120, 2, 50);
/// assert_eq!(p.page, 2);
/// assert_eq!(p.total_pages, 3);
/// assert_eq!(p.offset, 50);
///
/// let p = calculate_pagination(120, 99, 50);
/// assert_eq!(p.page, 3);
/// assert_eq!(p.offset, 100);
/// ```
pub fn calculate_pagination(total_results: i64, requested_page: i64, page_size: i64) -> Pagination {
    let page_size = page_size.max(1);
    let total_pages = (total_results.max(0) + page_size - 1) / page_size;
    let page = requested_page.max(1).min(total_pages.max(1));
    let offset = (page - 1) * page_size;

    Pagination {
        page,
        total_pages,
        offset,
        page_size,
    }
}
