//! Filter/sort/pagination descriptors and the request parser producing them.
//!
//! # Responsibility
//! - Represent list queries as validated values independent of transport.
//! - Parse untyped request input into those values without executing them.
//!
//! # Invariants
//! - Filter, then sort, then page: descriptors are applied in that order.
//! - Invalid input fails with `QueryError`; nothing is silently dropped.

pub mod builder;
pub mod error;
pub mod filter;
pub mod page;
pub mod sort;

use crate::model::contract::EntityContract;
use error::QueryError;
use filter::FilterCriterion;
use page::PageSpec;
use serde::Serialize;
use sort::SortSpec;

/// Complete list query for one entity type.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListQuery {
    pub filters: Vec<FilterCriterion>,
    pub sort: SortSpec,
    pub page: PageSpec,
}

impl ListQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, criterion: FilterCriterion) -> Self {
        self.filters.push(criterion);
        self
    }

    pub fn sort(mut self, sort: SortSpec) -> Self {
        self.sort = sort;
        self
    }

    pub fn page(mut self, page: PageSpec) -> Self {
        self.page = page;
        self
    }

    /// Validates every descriptor against `contract` and returns the query
    /// with coerced filter values.
    pub fn validate(&self, contract: &EntityContract) -> Result<Self, QueryError> {
        let filters = self
            .filters
            .iter()
            .map(|criterion| criterion.validate(contract))
            .collect::<Result<Vec<_>, _>>()?;
        self.sort.validate(contract)?;
        Ok(Self {
            filters,
            sort: self.sort.clone(),
            page: self.page,
        })
    }
}

/// One page of results plus the size of the whole filtered set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListResult<E> {
    pub items: Vec<E>,
    /// Filtered set size, ignoring pagination.
    pub total_count: u64,
    pub offset: u64,
    pub limit: u32,
}

impl<E> ListResult<E> {
    /// Number of pages of size `limit` needed to cover `total_count`.
    pub fn page_count(&self) -> u64 {
        self.total_count.div_ceil(u64::from(self.limit.max(1)))
    }

    /// 1-based number of the page this result represents.
    pub fn page_number(&self) -> u64 {
        self.offset / u64::from(self.limit.max(1)) + 1
    }

    pub fn has_more(&self) -> bool {
        self.offset + (self.items.len() as u64) < self.total_count
    }

    pub fn map<T>(self, f: impl FnMut(E) -> T) -> ListResult<T> {
        ListResult {
            items: self.items.into_iter().map(f).collect(),
            total_count: self.total_count,
            offset: self.offset,
            limit: self.limit,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::ListResult;

    #[test]
    fn page_arithmetic_uses_total_count() {
        let result = ListResult {
            items: vec![1, 2],
            total_count: 5,
            offset: 2,
            limit: 2,
        };
        assert_eq!(result.page_count(), 3);
        assert_eq!(result.page_number(), 2);
        assert!(result.has_more());
    }
}
