//! Attribute values and their declared types.

use rusqlite::types::{ToSql, ToSqlOutput, Value, ValueRef};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Declared type of one entity attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    Text,
    Integer,
    Real,
    Bool,
    /// Unix epoch milliseconds stored as an integer.
    Timestamp,
}

impl FieldType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Integer => "integer",
            Self::Real => "real",
            Self::Bool => "bool",
            Self::Timestamp => "timestamp",
        }
    }

    /// Converts `value` into the canonical representation for this type.
    ///
    /// Returns `None` when the value cannot represent this type. `Null` is
    /// passed through; nullability is checked by the contract.
    pub fn coerce(self, value: FieldValue) -> Option<FieldValue> {
        match (self, value) {
            (_, FieldValue::Null) => Some(FieldValue::Null),
            (Self::Text, FieldValue::Text(text)) => Some(FieldValue::Text(text)),
            (Self::Integer | Self::Timestamp, FieldValue::Integer(number)) => {
                Some(FieldValue::Integer(number))
            }
            (Self::Real, FieldValue::Real(number)) if number.is_finite() => {
                Some(FieldValue::Real(number))
            }
            (Self::Real, FieldValue::Integer(number)) => Some(FieldValue::Real(number as f64)),
            (Self::Bool, FieldValue::Bool(flag)) => Some(FieldValue::Bool(flag)),
            _ => None,
        }
    }

    /// Parses an untyped request parameter into a value of this type.
    pub fn parse_str(self, raw: &str) -> Option<FieldValue> {
        match self {
            Self::Text => Some(FieldValue::Text(raw.to_string())),
            Self::Integer | Self::Timestamp => raw.trim().parse().ok().map(FieldValue::Integer),
            Self::Real => raw
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|number| number.is_finite())
                .map(FieldValue::Real),
            Self::Bool => match raw.trim().to_ascii_lowercase().as_str() {
                "true" | "1" => Some(FieldValue::Bool(true)),
                "false" | "0" => Some(FieldValue::Bool(false)),
                _ => None,
            },
        }
    }

    /// Converts a JSON scalar into a value of this type.
    ///
    /// Numeric strings are accepted for numeric types so that query bodies
    /// may quote timestamps.
    pub fn from_json(self, raw: &serde_json::Value) -> Option<FieldValue> {
        use serde_json::Value as Json;
        match (self, raw) {
            (_, Json::Null) => Some(FieldValue::Null),
            (Self::Text, Json::String(text)) => Some(FieldValue::Text(text.clone())),
            (Self::Integer | Self::Timestamp, Json::Number(number)) => {
                number.as_i64().map(FieldValue::Integer)
            }
            (Self::Real, Json::Number(number)) => number.as_f64().map(FieldValue::Real),
            (Self::Bool, Json::Bool(flag)) => Some(FieldValue::Bool(*flag)),
            (Self::Integer | Self::Timestamp | Self::Real | Self::Bool, Json::String(text)) => {
                self.parse_str(text)
            }
            _ => None,
        }
    }

    /// Decodes one stored column into a value of this type.
    pub fn decode(self, raw: ValueRef<'_>) -> Option<FieldValue> {
        match (self, raw) {
            (_, ValueRef::Null) => Some(FieldValue::Null),
            (Self::Text, ValueRef::Text(bytes)) => std::str::from_utf8(bytes)
                .ok()
                .map(|text| FieldValue::Text(text.to_string())),
            (Self::Integer | Self::Timestamp, ValueRef::Integer(number)) => {
                Some(FieldValue::Integer(number))
            }
            (Self::Real, ValueRef::Real(number)) => Some(FieldValue::Real(number)),
            (Self::Real, ValueRef::Integer(number)) => Some(FieldValue::Real(number as f64)),
            (Self::Bool, ValueRef::Integer(0)) => Some(FieldValue::Bool(false)),
            (Self::Bool, ValueRef::Integer(1)) => Some(FieldValue::Bool(true)),
            _ => None,
        }
    }
}

impl Display for FieldType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One attribute value as it travels between callers and storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Null,
    Bool(bool),
    Integer(i64),
    Real(f64),
    Text(String),
}

impl FieldValue {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Short name of the value's shape, used in error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Integer(_) => "integer",
            Self::Real(_) => "real",
            Self::Text(_) => "text",
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text.as_str()),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(number) => Some(*number),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(flag) => Some(*flag),
            _ => None,
        }
    }
}

impl Display for FieldValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::Bool(flag) => write!(f, "{flag}"),
            Self::Integer(number) => write!(f, "{number}"),
            Self::Real(number) => write!(f, "{number}"),
            Self::Text(text) => f.write_str(text),
        }
    }
}

impl ToSql for FieldValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Self::Null => ToSqlOutput::Owned(Value::Null),
            Self::Bool(flag) => ToSqlOutput::Owned(Value::Integer(i64::from(*flag))),
            Self::Integer(number) => ToSqlOutput::Owned(Value::Integer(*number)),
            Self::Real(number) => ToSqlOutput::Owned(Value::Real(*number)),
            Self::Text(text) => ToSqlOutput::Borrowed(ValueRef::Text(text.as_bytes())),
        })
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        Self::Real(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<crate::model::id::EntityId> for FieldValue {
    fn from(value: crate::model::id::EntityId) -> Self {
        Self::Text(value.into_inner())
    }
}

impl<T: Into<FieldValue>> From<Option<T>> for FieldValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::{FieldType, FieldValue};
    use rusqlite::types::ValueRef;
    use serde_json::json;

    #[test]
    fn parse_str_respects_declared_type() {
        assert_eq!(
            FieldType::Integer.parse_str(" 42 "),
            Some(FieldValue::Integer(42))
        );
        assert_eq!(FieldType::Integer.parse_str("4.2"), None);
        assert_eq!(
            FieldType::Bool.parse_str("TRUE"),
            Some(FieldValue::Bool(true))
        );
        assert_eq!(FieldType::Real.parse_str("NaN"), None);
    }

    #[test]
    fn coerce_widens_integer_to_real_only() {
        assert_eq!(
            FieldType::Real.coerce(FieldValue::Integer(3)),
            Some(FieldValue::Real(3.0))
        );
        assert_eq!(FieldType::Integer.coerce(FieldValue::Real(3.0)), None);
        assert_eq!(FieldType::Text.coerce(FieldValue::Integer(3)), None);
    }

    #[test]
    fn bool_columns_decode_only_zero_and_one() {
        assert_eq!(
            FieldType::Bool.decode(ValueRef::Integer(1)),
            Some(FieldValue::Bool(true))
        );
        assert_eq!(FieldType::Bool.decode(ValueRef::Integer(2)), None);
    }

    #[test]
    fn json_values_follow_declared_type() {
        assert_eq!(
            FieldType::Timestamp.from_json(&json!("1700000000000")),
            Some(FieldValue::Integer(1_700_000_000_000))
        );
        assert_eq!(FieldType::Text.from_json(&json!(5)), None);
        assert_eq!(
            FieldType::Text.from_json(&json!(null)),
            Some(FieldValue::Null)
        );
    }
}
