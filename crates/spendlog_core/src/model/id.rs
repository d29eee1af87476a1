//! Entity identifiers.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use uuid::Uuid;

const GENERATED_SUFFIX_LEN: usize = 16;

/// Stable identifier of one stored entity, e.g. `CAT9F2C04A1B37E55D0`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(String);

impl EntityId {
    /// Wraps an existing identifier.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Generates a fresh identifier: `prefix` followed by 16 uppercase hex
    /// characters drawn from a v4 UUID.
    pub fn generate(prefix: &str) -> Self {
        let entropy = Uuid::new_v4().simple().to_string().to_ascii_uppercase();
        Self(format!("{prefix}{}", &entropy[..GENERATED_SUFFIX_LEN]))
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl Display for EntityId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntityId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for EntityId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl AsRef<str> for EntityId {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}
