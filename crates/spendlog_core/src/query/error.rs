//! Malformed filter/sort/page parameters.

use crate::model::value::FieldType;
use crate::query::filter::FilterOp;
use std::error::Error;
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, PartialEq)]
pub enum QueryError {
    /// Field is not declared on the entity contract.
    UnknownField(String),
    UnknownOperator(String),
    /// Operator is not defined for the field's type (e.g. `like` on numbers).
    UnsupportedOperator {
        field: String,
        op: FilterOp,
        kind: FieldType,
    },
    /// Value cannot be read as the field's type or has the wrong shape.
    InvalidValue {
        field: String,
        op: FilterOp,
        reason: String,
    },
    NotSortable(String),
    UnknownSortDirection(String),
    PageSizeTooLarge {
        limit: i64,
        max: u32,
    },
    ZeroLimit,
    NegativeOffset(i64),
    /// Reserved parameter (`sort`, `page`, ...) is malformed or repeated.
    InvalidParameter {
        name: String,
        reason: String,
    },
}

impl QueryError {
    pub(crate) fn invalid_value(field: &str, op: FilterOp, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.to_string(),
            op,
            reason: reason.into(),
        }
    }

    pub(crate) fn invalid_parameter(name: &str, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name: name.to_string(),
            reason: reason.into(),
        }
    }
}

impl Display for QueryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownField(field) => write!(f, "unknown query field `{field}`"),
            Self::UnknownOperator(op) => write!(f, "unknown filter operator `{op}`"),
            Self::UnsupportedOperator { field, op, kind } => write!(
                f,
                "operator `{op}` is not supported on {kind} field `{field}`"
            ),
            Self::InvalidValue { field, op, reason } => {
                write!(f, "invalid value for `{field}` `{op}`: {reason}")
            }
            Self::NotSortable(field) => write!(f, "field `{field}` is not sortable"),
            Self::UnknownSortDirection(direction) => {
                write!(f, "unknown sort direction `{direction}`; expected asc|desc")
            }
            Self::PageSizeTooLarge { limit, max } => {
                write!(f, "page size {limit} exceeds maximum {max}")
            }
            Self::ZeroLimit => write!(f, "page size must be greater than zero"),
            Self::NegativeOffset(offset) => write!(f, "offset must not be negative, got {offset}"),
            Self::InvalidParameter { name, reason } => {
                write!(f, "invalid parameter `{name}`: {reason}")
            }
        }
    }
}

impl Error for QueryError {}
