//! Sort specifications.

use crate::model::contract::{EntityContract, ID_FIELD};
use crate::query::error::QueryError;
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    pub fn parse(value: &str) -> Result<Self, QueryError> {
        match value.trim().to_ascii_lowercase().as_str() {
            "asc" => Ok(Self::Asc),
            "desc" => Ok(Self::Desc),
            other => Err(QueryError::UnknownSortDirection(other.to_string())),
        }
    }

    pub fn as_sql(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortKey {
    pub field: String,
    pub direction: SortDirection,
}

/// Ordered sort keys; empty means "identifier ascending".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SortSpec {
    keys: Vec<SortKey>,
}

impl SortSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn then(mut self, field: impl Into<String>, direction: SortDirection) -> Self {
        self.keys.push(SortKey {
            field: field.into(),
            direction,
        });
        self
    }

    pub fn asc(self, field: impl Into<String>) -> Self {
        self.then(field, SortDirection::Asc)
    }

    pub fn desc(self, field: impl Into<String>) -> Self {
        self.then(field, SortDirection::Desc)
    }

    pub fn keys(&self) -> &[SortKey] {
        &self.keys
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Checks every key is a sortable contract field, listed once.
    pub fn validate(&self, contract: &EntityContract) -> Result<(), QueryError> {
        let mut seen = HashSet::new();
        for key in &self.keys {
            if contract.queryable_kind(&key.field).is_none() {
                return Err(QueryError::UnknownField(key.field.clone()));
            }
            if !contract.is_sortable(&key.field) {
                return Err(QueryError::NotSortable(key.field.clone()));
            }
            if !seen.insert(key.field.as_str()) {
                return Err(QueryError::invalid_parameter(
                    "sort",
                    format!("field `{}` listed more than once", key.field),
                ));
            }
        }
        Ok(())
    }

    /// Returns the keys with the identifier appended as final tiebreaker, so
    /// the ordering is total and page boundaries are stable.
    pub fn with_tiebreaker(&self) -> Self {
        let mut spec = self.clone();
        if !spec.keys.iter().any(|key| key.field == ID_FIELD) {
            spec.keys.push(SortKey {
                field: ID_FIELD.to_string(),
                direction: SortDirection::Asc,
            });
        }
        spec
    }
}
