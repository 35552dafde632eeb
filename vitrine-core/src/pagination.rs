//! Page arithmetic for catalog reads.
//!
//! Pages are 1-based. Page `n` with page size `s` skips `(n - 1) * s`
//! records.

/// Records per page when no size is configured.
pub const DEFAULT_PAGE_SIZE: u64 = 10;

/// Number of records to skip to reach `page`.
///
/// `page` must be at least 1; [`crate::QuerySpec`] guarantees this.
pub fn skip_for_page(page: u64, page_size: u64) -> u64 {
    page.saturating_sub(1).saturating_mul(page_size)
}

/// Number of pages needed to hold `total` records.
pub fn total_pages(total: u64, page_size: u64) -> u64 {
    if page_size == 0 {
        return 0;
    }
    total.div_ceil(page_size)
}
