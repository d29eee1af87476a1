//! Sparse partial updates.
//!
//! A key that is absent means "leave untouched"; a key mapped to
//! `FieldValue::Null` means "set to null". Typed request structs express the
//! same intent per field with [`Patch`].

use crate::model::value::FieldValue;
use serde::{Deserialize, Deserializer};
use std::collections::BTreeMap;

/// Attribute-name → new-value mapping holding only the changed attributes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PartialUpdate {
    changes: BTreeMap<String, FieldValue>,
}

impl PartialUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `field` to `value` (use `FieldValue::Null` to clear it).
    pub fn set(mut self, field: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.changes.insert(field.into(), value.into());
        self
    }

    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<FieldValue>) {
        self.changes.insert(field.into(), value.into());
    }

    pub fn remove(&mut self, field: &str) -> Option<FieldValue> {
        self.changes.remove(field)
    }

    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.changes.get(field)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.changes.contains_key(field)
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.changes
            .iter()
            .map(|(field, value)| (field.as_str(), value))
    }
}

impl FromIterator<(String, FieldValue)> for PartialUpdate {
    fn from_iter<I: IntoIterator<Item = (String, FieldValue)>>(iter: I) -> Self {
        Self {
            changes: iter.into_iter().collect(),
        }
    }
}

/// Per-field update intent.
///
/// Deserializes with `#[serde(default)]` so that a missing key becomes
/// `Unchanged`, `null` becomes `Clear`, and any other value becomes `Set`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Patch<T> {
    #[default]
    Unchanged,
    Set(T),
    Clear,
}

impl<T> Patch<T> {
    pub fn is_unchanged(&self) -> bool {
        matches!(self, Self::Unchanged)
    }

    /// Records this intent for `field` on `update`.
    pub fn apply_to(self, field: &str, update: &mut PartialUpdate)
    where
        T: Into<FieldValue>,
    {
        match self {
            Self::Unchanged => {}
            Self::Set(value) => update.insert(field, value),
            Self::Clear => update.insert(field, FieldValue::Null),
        }
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Patch<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match Option::<T>::deserialize(deserializer)? {
            Some(value) => Self::Set(value),
            None => Self::Clear,
        })
    }
}
