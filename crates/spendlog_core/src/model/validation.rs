//! Attribute validation failures for create and update payloads.

use crate::model::value::FieldType;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Attribute-level validation error raised before any write reaches storage.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// A required attribute is absent from a create payload.
    MissingField(String),
    /// The attribute is not declared on the entity contract.
    UnknownField(String),
    /// The attribute is managed by the repository (`id`, timestamps, ...).
    ReadOnlyField(String),
    /// A required attribute was given `null`.
    NullNotAllowed(String),
    /// Value shape does not match the declared type.
    TypeMismatch {
        field: String,
        expected: FieldType,
        found: &'static str,
    },
    /// Value has the right type but breaks a domain rule.
    InvalidValue { field: String, reason: String },
    /// A reference attribute points at a row that does not exist.
    BrokenReference(String),
}

impl ValidationError {
    /// Attribute name the error is about.
    pub fn field(&self) -> &str {
        match self {
            Self::MissingField(field)
            | Self::UnknownField(field)
            | Self::ReadOnlyField(field)
            | Self::NullNotAllowed(field)
            | Self::BrokenReference(field) => field,
            Self::TypeMismatch { field, .. } | Self::InvalidValue { field, .. } => field,
        }
    }

    pub fn invalid_value(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingField(field) => write!(f, "missing required field `{field}`"),
            Self::UnknownField(field) => write!(f, "unknown field `{field}`"),
            Self::ReadOnlyField(field) => write!(f, "field `{field}` is read-only"),
            Self::NullNotAllowed(field) => write!(f, "field `{field}` must not be null"),
            Self::TypeMismatch {
                field,
                expected,
                found,
            } => write!(f, "field `{field}` expects {expected}, got {found}"),
            Self::InvalidValue { field, reason } => {
                write!(f, "invalid value for `{field}`: {reason}")
            }
            Self::BrokenReference(field) => {
                write!(f, "field `{field}` references a missing record")
            }
        }
    }
}

impl Error for ValidationError {}
