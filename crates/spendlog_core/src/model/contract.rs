//! Static entity contracts.
//!
//! # Responsibility
//! - Declare, per entity type, the attribute set, types, nullability,
//!   uniqueness, sortability and defaults.
//! - Validate create payloads and partial updates against that declaration.
//!
//! # Invariants
//! - `id`, `created_at`, `updated_at` (and `version` on versioned contracts)
//!   are system attributes: queryable and sortable, never caller-writable.
//! - A versioned contract accepts `version` inside a partial update only as
//!   the compare-and-swap token.

use crate::model::record::Attributes;
use crate::model::update::PartialUpdate;
use crate::model::validation::ValidationError;
use crate::model::value::{FieldType, FieldValue};

pub const ID_FIELD: &str = "id";
pub const CREATED_AT_FIELD: &str = "created_at";
pub const UPDATED_AT_FIELD: &str = "updated_at";
pub const VERSION_FIELD: &str = "version";

/// Value applied when an optional attribute is absent from a create payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefaultValue {
    Null,
    Bool(bool),
    Integer(i64),
}

impl DefaultValue {
    pub fn to_value(self) -> FieldValue {
        match self {
            Self::Null => FieldValue::Null,
            Self::Bool(flag) => FieldValue::Bool(flag),
            Self::Integer(number) => FieldValue::Integer(number),
        }
    }
}

/// Declaration of one caller-visible attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDef {
    pub name: &'static str,
    pub kind: FieldType,
    pub required: bool,
    /// Backed by a storage uniqueness constraint.
    pub unique: bool,
    pub sortable: bool,
    pub default: DefaultValue,
    /// Table this attribute references through a foreign key.
    pub references: Option<&'static str>,
}

impl FieldDef {
    pub const fn required(name: &'static str, kind: FieldType) -> Self {
        Self {
            name,
            kind,
            required: true,
            unique: false,
            sortable: false,
            default: DefaultValue::Null,
            references: None,
        }
    }

    pub const fn optional(name: &'static str, kind: FieldType) -> Self {
        Self {
            required: false,
            ..Self::required(name, kind)
        }
    }

    pub const fn unique(self) -> Self {
        Self {
            unique: true,
            ..self
        }
    }

    pub const fn sortable(self) -> Self {
        Self {
            sortable: true,
            ..self
        }
    }

    pub const fn with_default(self, default: DefaultValue) -> Self {
        Self { default, ..self }
    }

    pub const fn references(self, table: &'static str) -> Self {
        Self {
            references: Some(table),
            ..self
        }
    }
}

/// Static description of one storable entity type.
#[derive(Debug)]
pub struct EntityContract {
    /// Human-readable entity name used in errors and logs.
    pub entity: &'static str,
    /// Backing table; must be a plain SQL identifier.
    pub table: &'static str,
    /// Prefix of generated identifiers.
    pub id_prefix: &'static str,
    /// Caller-visible attributes, in column order.
    pub fields: &'static [FieldDef],
    /// Carries a `version` attribute with compare-and-swap updates.
    pub versioned: bool,
}

impl EntityContract {
    /// Declared (non-system) attribute by name.
    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|field| field.name == name)
    }

    pub fn is_system_field(&self, name: &str) -> bool {
        match name {
            ID_FIELD | CREATED_AT_FIELD | UPDATED_AT_FIELD => true,
            VERSION_FIELD => self.versioned,
            _ => false,
        }
    }

    /// Type of any attribute usable in filters and sorts.
    pub fn queryable_kind(&self, name: &str) -> Option<FieldType> {
        match name {
            ID_FIELD => Some(FieldType::Text),
            CREATED_AT_FIELD | UPDATED_AT_FIELD => Some(FieldType::Timestamp),
            VERSION_FIELD if self.versioned => Some(FieldType::Integer),
            _ => self.field(name).map(|field| field.kind),
        }
    }

    pub fn is_sortable(&self, name: &str) -> bool {
        self.is_system_field(name) || self.field(name).is_some_and(|field| field.sortable)
    }

    /// Every stored column in select order.
    pub fn columns(&self) -> Vec<&'static str> {
        let mut columns = Vec::with_capacity(self.fields.len() + 4);
        columns.push(ID_FIELD);
        columns.extend(self.fields.iter().map(|field| field.name));
        if self.versioned {
            columns.push(VERSION_FIELD);
        }
        columns.push(CREATED_AT_FIELD);
        columns.push(UPDATED_AT_FIELD);
        columns
    }

    pub fn unique_fields(&self) -> impl Iterator<Item = &FieldDef> {
        self.fields.iter().filter(|field| field.unique)
    }

    pub fn reference_fields(&self) -> impl Iterator<Item = &FieldDef> {
        self.fields.iter().filter(|field| field.references.is_some())
    }

    /// Static column name equal to `name`, if the contract stores one.
    pub fn column(&self, name: &str) -> Option<&'static str> {
        self.columns().into_iter().find(|column| *column == name)
    }

    /// Validates a create payload and returns the full attribute set with
    /// defaults applied and values in canonical form.
    pub fn validate_new(&self, attributes: &Attributes) -> Result<Attributes, ValidationError> {
        for name in attributes.keys() {
            if self.is_system_field(name) {
                return Err(ValidationError::ReadOnlyField(name.clone()));
            }
            if self.field(name).is_none() {
                return Err(ValidationError::UnknownField(name.clone()));
            }
        }

        let mut normalized = Attributes::new();
        for field in self.fields {
            let value = match attributes.get(field.name) {
                Some(value) => coerce_value(field, value.clone())?,
                None if field.required => {
                    return Err(ValidationError::MissingField(field.name.to_string()))
                }
                None => field.default.to_value(),
            };
            normalized.insert(field.name.to_string(), value);
        }
        Ok(normalized)
    }

    /// Validates a partial update and returns it with canonical values.
    ///
    /// The compare-and-swap `version` token is kept as-is when valid.
    pub fn validate_update(&self, update: &PartialUpdate) -> Result<PartialUpdate, ValidationError> {
        let mut normalized = PartialUpdate::new();
        for (name, value) in update.iter() {
            if self.versioned && name == VERSION_FIELD {
                if value.as_i64().is_none() {
                    return Err(ValidationError::TypeMismatch {
                        field: name.to_string(),
                        expected: FieldType::Integer,
                        found: value.kind_name(),
                    });
                }
                normalized = normalized.set(name, value.clone());
                continue;
            }
            if self.is_system_field(name) {
                return Err(ValidationError::ReadOnlyField(name.to_string()));
            }
            let field = self
                .field(name)
                .ok_or_else(|| ValidationError::UnknownField(name.to_string()))?;
            normalized = normalized.set(name, coerce_value(field, value.clone())?);
        }
        Ok(normalized)
    }
}

fn coerce_value(field: &FieldDef, value: FieldValue) -> Result<FieldValue, ValidationError> {
    let found = value.kind_name();
    let coerced = field
        .kind
        .coerce(value)
        .ok_or_else(|| ValidationError::TypeMismatch {
            field: field.name.to_string(),
            expected: field.kind,
            found,
        })?;
    if coerced.is_null() && field.required {
        return Err(ValidationError::NullNotAllowed(field.name.to_string()));
    }
    Ok(coerced)
}

#[cfg(test)]
mod tests {
    use super::{DefaultValue, EntityContract, FieldDef};
    use crate::model::record::Attributes;
    use crate::model::update::PartialUpdate;
    use crate::model::validation::ValidationError;
    use crate::model::value::{FieldType, FieldValue};

    const FIELDS: &[FieldDef] = &[
        FieldDef::required("title", FieldType::Text).sortable(),
        FieldDef::optional("score", FieldType::Real),
        FieldDef::optional("archived", FieldType::Bool).with_default(DefaultValue::Bool(false)),
    ];

    const CONTRACT: EntityContract = EntityContract {
        entity: "sample",
        table: "samples",
        id_prefix: "SMP",
        fields: FIELDS,
        versioned: true,
    };

    fn attrs(pairs: &[(&str, FieldValue)]) -> Attributes {
        pairs
            .iter()
            .map(|(name, value)| (name.to_string(), value.clone()))
            .collect()
    }

    #[test]
    fn validate_new_applies_defaults_and_coerces() {
        let normalized = CONTRACT
            .validate_new(&attrs(&[
                ("title", FieldValue::from("t")),
                ("score", FieldValue::Integer(2)),
            ]))
            .unwrap();
        assert_eq!(normalized["score"], FieldValue::Real(2.0));
        assert_eq!(normalized["archived"], FieldValue::Bool(false));
    }

    #[test]
    fn validate_new_rejects_system_unknown_and_missing_fields() {
        let err = CONTRACT
            .validate_new(&attrs(&[("id", FieldValue::from("x"))]))
            .unwrap_err();
        assert_eq!(err, ValidationError::ReadOnlyField("id".to_string()));

        let err = CONTRACT
            .validate_new(&attrs(&[("nope", FieldValue::Null)]))
            .unwrap_err();
        assert_eq!(err, ValidationError::UnknownField("nope".to_string()));

        let err = CONTRACT.validate_new(&Attributes::new()).unwrap_err();
        assert_eq!(err, ValidationError::MissingField("title".to_string()));
    }

    #[test]
    fn validate_update_keeps_version_token_and_rejects_nulling_required() {
        let update = PartialUpdate::new()
            .set("version", 3_i64)
            .set("score", FieldValue::Null);
        let normalized = CONTRACT.validate_update(&update).unwrap();
        assert_eq!(normalized.get("version"), Some(&FieldValue::Integer(3)));

        let err = CONTRACT
            .validate_update(&PartialUpdate::new().set("title", FieldValue::Null))
            .unwrap_err();
        assert_eq!(err, ValidationError::NullNotAllowed("title".to_string()));

        let err = CONTRACT
            .validate_update(&PartialUpdate::new().set("created_at", 1_i64))
            .unwrap_err();
        assert_eq!(err, ValidationError::ReadOnlyField("created_at".to_string()));
    }

    #[test]
    fn system_fields_are_queryable_and_sortable() {
        assert_eq!(CONTRACT.queryable_kind("id"), Some(FieldType::Text));
        assert_eq!(CONTRACT.queryable_kind("version"), Some(FieldType::Integer));
        assert!(CONTRACT.is_sortable("created_at"));
        assert!(CONTRACT.is_sortable("title"));
        assert!(!CONTRACT.is_sortable("score"));
    }
}
