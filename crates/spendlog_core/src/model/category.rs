//! Category module model.
//!
//! # Invariants
//! - `name` is unique among active categories, case-insensitively.
//! - `is_deleted` is the soft-delete tombstone; deleted rows keep their id.

use crate::model::contract::{DefaultValue, EntityContract, FieldDef};
use crate::model::entity::Entity;
use crate::model::id::EntityId;
use crate::model::record::{Attributes, DecodeError, Record};
use crate::model::update::{PartialUpdate, Patch};
use crate::model::value::{FieldType, FieldValue};
use serde::{Deserialize, Serialize};

pub const CATEGORY_NAME_FIELD: &str = "name";
pub const CATEGORY_DESCRIPTION_FIELD: &str = "description";
pub const CATEGORY_DELETED_FIELD: &str = "is_deleted";

const CATEGORY_FIELDS: &[FieldDef] = &[
    FieldDef::required(CATEGORY_NAME_FIELD, FieldType::Text)
        .unique()
        .sortable(),
    FieldDef::optional(CATEGORY_DESCRIPTION_FIELD, FieldType::Text),
    FieldDef::optional(CATEGORY_DELETED_FIELD, FieldType::Bool)
        .with_default(DefaultValue::Bool(false)),
];

pub static CATEGORY_CONTRACT: EntityContract = EntityContract {
    entity: "category",
    table: "categories",
    id_prefix: "CAT",
    fields: CATEGORY_FIELDS,
    versioned: false,
};

/// Expense grouping such as "Groceries" or "Rent".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: EntityId,
    pub name: String,
    pub description: Option<String>,
    pub is_deleted: bool,
    /// Unix epoch milliseconds.
    pub created_at: i64,
    /// Unix epoch milliseconds.
    pub updated_at: i64,
}

impl Entity for Category {
    fn contract() -> &'static EntityContract {
        &CATEGORY_CONTRACT
    }

    fn from_record(record: Record) -> Result<Self, DecodeError> {
        Ok(Self {
            name: record.text(CATEGORY_NAME_FIELD)?,
            description: record.opt_text(CATEGORY_DESCRIPTION_FIELD)?,
            is_deleted: record.boolean(CATEGORY_DELETED_FIELD)?,
            created_at: record.created_at,
            updated_at: record.updated_at,
            id: record.id,
        })
    }

    fn id(&self) -> &EntityId {
        &self.id
    }
}

/// Create payload for a category.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NewCategory {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

impl NewCategory {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn into_attributes(self) -> Attributes {
        let mut attributes = Attributes::new();
        attributes.insert(CATEGORY_NAME_FIELD.to_string(), FieldValue::from(self.name));
        if let Some(description) = self.description {
            attributes.insert(
                CATEGORY_DESCRIPTION_FIELD.to_string(),
                FieldValue::from(description),
            );
        }
        attributes
    }
}

/// Partial update payload for a category.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CategoryPatch {
    #[serde(default)]
    pub name: Patch<String>,
    #[serde(default)]
    pub description: Patch<String>,
}

impl CategoryPatch {
    pub fn into_update(self) -> PartialUpdate {
        let mut update = PartialUpdate::new();
        self.name.apply_to(CATEGORY_NAME_FIELD, &mut update);
        self.description
            .apply_to(CATEGORY_DESCRIPTION_FIELD, &mut update);
        update
    }
}
