//! Page bounds.
//!
//! # Invariants
//! - `0 < limit <= MAX_PAGE_SIZE`, `offset >= 0`.
//! - Out-of-range values are rejected, never clamped.

use crate::query::error::QueryError;

/// Hard upper bound for one page.
pub const MAX_PAGE_SIZE: u32 = 1000;
/// Page size used when a request does not name one.
pub const DEFAULT_PAGE_SIZE: u32 = 10;

/// Validated `[offset, offset + limit)` window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageSpec {
    offset: u64,
    limit: u32,
}

impl PageSpec {
    /// Builds a page bounded by [`MAX_PAGE_SIZE`].
    pub fn new(offset: i64, limit: i64) -> Result<Self, QueryError> {
        Self::bounded(offset, limit, MAX_PAGE_SIZE)
    }

    /// Builds a page bounded by `max` (itself capped at [`MAX_PAGE_SIZE`]).
    pub fn bounded(offset: i64, limit: i64, max: u32) -> Result<Self, QueryError> {
        let max = max.min(MAX_PAGE_SIZE);
        if offset < 0 {
            return Err(QueryError::NegativeOffset(offset));
        }
        if limit <= 0 {
            return Err(QueryError::ZeroLimit);
        }
        if limit > i64::from(max) {
            return Err(QueryError::PageSizeTooLarge { limit, max });
        }
        Ok(Self {
            offset: offset as u64,
            limit: limit as u32,
        })
    }

    /// Builds a page from a 1-based page number.
    pub fn from_page_number(page: i64, limit: i64, max: u32) -> Result<Self, QueryError> {
        if page < 1 {
            return Err(QueryError::invalid_parameter(
                "page",
                format!("page numbers start at 1, got {page}"),
            ));
        }
        let offset = (page - 1)
            .checked_mul(limit.max(0))
            .ok_or_else(|| QueryError::invalid_parameter("page", "page number too large"))?;
        Self::bounded(offset, limit, max)
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }
}

impl Default for PageSpec {
    fn default() -> Self {
        Self {
            offset: 0,
            limit: DEFAULT_PAGE_SIZE,
        }
    }
}

/// Per-deployment page size policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageLimits {
    pub default_limit: u32,
    pub max_limit: u32,
}

impl Default for PageLimits {
    fn default() -> Self {
        Self {
            default_limit: DEFAULT_PAGE_SIZE,
            max_limit: MAX_PAGE_SIZE,
        }
    }
}
