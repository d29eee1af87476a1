//! Decoded storage rows.

use crate::model::id::EntityId;
use crate::model::value::FieldValue;
use serde::Serialize;
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Caller-visible attributes keyed by field name.
pub type Attributes = BTreeMap<String, FieldValue>;

/// One stored row decoded against its contract.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Record {
    pub id: EntityId,
    /// Declared attributes only; system attributes live in dedicated fields.
    pub attributes: Attributes,
    /// Present for versioned contracts.
    pub version: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Persisted value does not have the shape the entity expects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeError {
    pub field: String,
    pub expected: &'static str,
}

impl Display for DecodeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "field `{}` is not a valid {}", self.field, self.expected)
    }
}

impl Error for DecodeError {}

impl Record {
    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.attributes.get(field)
    }

    pub fn text(&self, field: &str) -> Result<String, DecodeError> {
        self.opt_text(field)?
            .ok_or_else(|| decode_error(field, "non-null text"))
    }

    pub fn opt_text(&self, field: &str) -> Result<Option<String>, DecodeError> {
        match self.get(field) {
            Some(FieldValue::Text(text)) => Ok(Some(text.clone())),
            Some(FieldValue::Null) | None => Ok(None),
            Some(_) => Err(decode_error(field, "text")),
        }
    }

    pub fn integer(&self, field: &str) -> Result<i64, DecodeError> {
        match self.get(field) {
            Some(FieldValue::Integer(number)) => Ok(*number),
            _ => Err(decode_error(field, "integer")),
        }
    }

    pub fn boolean(&self, field: &str) -> Result<bool, DecodeError> {
        match self.get(field) {
            Some(FieldValue::Bool(flag)) => Ok(*flag),
            _ => Err(decode_error(field, "bool")),
        }
    }

    pub fn version(&self) -> Result<i64, DecodeError> {
        self.version
            .ok_or_else(|| decode_error(crate::model::contract::VERSION_FIELD, "integer"))
    }
}

fn decode_error(field: &str, expected: &'static str) -> DecodeError {
    DecodeError {
        field: field.to_string(),
        expected,
    }
}
