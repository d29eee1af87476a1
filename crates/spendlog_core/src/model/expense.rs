//! Expense module model.
//!
//! # Invariants
//! - `category_id` references an existing category row.
//! - `version` starts at 1 and grows by one per applied update.

use crate::model::contract::{EntityContract, FieldDef, VERSION_FIELD};
use crate::model::entity::Entity;
use crate::model::id::EntityId;
use crate::model::record::{Attributes, DecodeError, Record};
use crate::model::update::{PartialUpdate, Patch};
use crate::model::value::{FieldType, FieldValue};
use serde::{Deserialize, Serialize};

pub const EXPENSE_CATEGORY_FIELD: &str = "category_id";
pub const EXPENSE_AMOUNT_FIELD: &str = "amount_cents";
pub const EXPENSE_DESCRIPTION_FIELD: &str = "description";
pub const EXPENSE_SPENT_AT_FIELD: &str = "spent_at";

const EXPENSE_FIELDS: &[FieldDef] = &[
    FieldDef::required(EXPENSE_CATEGORY_FIELD, FieldType::Text)
        .sortable()
        .references("categories"),
    FieldDef::required(EXPENSE_AMOUNT_FIELD, FieldType::Integer).sortable(),
    FieldDef::optional(EXPENSE_DESCRIPTION_FIELD, FieldType::Text),
    FieldDef::required(EXPENSE_SPENT_AT_FIELD, FieldType::Timestamp).sortable(),
];

pub static EXPENSE_CONTRACT: EntityContract = EntityContract {
    entity: "expense",
    table: "expenses",
    id_prefix: "EXP",
    fields: EXPENSE_FIELDS,
    versioned: true,
};

/// One spending record, amounts in minor currency units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Expense {
    pub id: EntityId,
    pub category_id: EntityId,
    pub amount_cents: i64,
    pub description: Option<String>,
    /// Unix epoch milliseconds.
    pub spent_at: i64,
    pub version: i64,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Entity for Expense {
    fn contract() -> &'static EntityContract {
        &EXPENSE_CONTRACT
    }

    fn from_record(record: Record) -> Result<Self, DecodeError> {
        Ok(Self {
            category_id: EntityId::new(record.text(EXPENSE_CATEGORY_FIELD)?),
            amount_cents: record.integer(EXPENSE_AMOUNT_FIELD)?,
            description: record.opt_text(EXPENSE_DESCRIPTION_FIELD)?,
            spent_at: record.integer(EXPENSE_SPENT_AT_FIELD)?,
            version: record.version()?,
            created_at: record.created_at,
            updated_at: record.updated_at,
            id: record.id,
        })
    }

    fn id(&self) -> &EntityId {
        &self.id
    }
}

/// Create payload for an expense.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NewExpense {
    pub category_id: EntityId,
    pub amount_cents: i64,
    #[serde(default)]
    pub description: Option<String>,
    pub spent_at: i64,
}

impl NewExpense {
    pub fn into_attributes(self) -> Attributes {
        let mut attributes = Attributes::new();
        attributes.insert(
            EXPENSE_CATEGORY_FIELD.to_string(),
            FieldValue::from(self.category_id),
        );
        attributes.insert(
            EXPENSE_AMOUNT_FIELD.to_string(),
            FieldValue::from(self.amount_cents),
        );
        if let Some(description) = self.description {
            attributes.insert(
                EXPENSE_DESCRIPTION_FIELD.to_string(),
                FieldValue::from(description),
            );
        }
        attributes.insert(
            EXPENSE_SPENT_AT_FIELD.to_string(),
            FieldValue::from(self.spent_at),
        );
        attributes
    }
}

/// Partial update payload for an expense.
///
/// `expected_version`, when set, turns the update into a compare-and-swap.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ExpensePatch {
    #[serde(default)]
    pub category_id: Patch<String>,
    #[serde(default)]
    pub amount_cents: Patch<i64>,
    #[serde(default)]
    pub description: Patch<String>,
    #[serde(default)]
    pub spent_at: Patch<i64>,
    #[serde(default)]
    pub expected_version: Option<i64>,
}

impl ExpensePatch {
    pub fn into_update(self) -> PartialUpdate {
        let mut update = PartialUpdate::new();
        self.category_id
            .apply_to(EXPENSE_CATEGORY_FIELD, &mut update);
        self.amount_cents
            .apply_to(EXPENSE_AMOUNT_FIELD, &mut update);
        self.description
            .apply_to(EXPENSE_DESCRIPTION_FIELD, &mut update);
        self.spent_at.apply_to(EXPENSE_SPENT_AT_FIELD, &mut update);
        if let Some(version) = self.expected_version {
            update.insert(VERSION_FIELD, version);
        }
        update
    }
}
