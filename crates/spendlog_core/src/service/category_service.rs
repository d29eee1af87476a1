//! Category use-case service.
//!
//! # Responsibility
//! - Normalize category names and map name collisions to `DuplicateName`.
//! - Soft-delete categories, refusing while expenses still reference them.
//!
//! # Invariants
//! - Stored names are trimmed and never blank.
//! - Active names are unique case-insensitively; a soft-deleted category
//!   frees its name until restored.

use crate::model::category::{
    Category, CategoryPatch, NewCategory, CATEGORY_DELETED_FIELD, CATEGORY_NAME_FIELD,
};
use crate::model::entity::Entity;
use crate::model::expense::{Expense, EXPENSE_CATEGORY_FIELD};
use crate::model::id::EntityId;
use crate::model::record::Attributes;
use crate::model::update::PartialUpdate;
use crate::model::validation::ValidationError;
use crate::model::value::FieldValue;
use crate::query::filter::FilterCriterion;
use crate::repo::{ConflictError, Repository, SqliteRepository};
use crate::service::entity_service::EntityService;
use crate::service::error::{ServiceError, ServiceResult};
use crate::service::hooks::{DeletePolicy, HookContext, ServiceHooks};
use rusqlite::Connection;

/// Category rules plugged into the generic service.
#[derive(Debug, Clone, Copy, Default)]
pub struct CategoryHooks;

pub type CategoryService<'conn> =
    EntityService<Category, SqliteRepository<'conn, Category>, CategoryHooks>;

impl ServiceHooks<Category> for CategoryHooks {
    fn delete_policy(&self) -> DeletePolicy {
        DeletePolicy::Soft {
            flag: CATEGORY_DELETED_FIELD,
        }
    }

    fn before_create(
        &self,
        _ctx: &HookContext<'_>,
        attributes: &mut Attributes,
    ) -> ServiceResult<()> {
        if let Some(name) = attributes.get_mut(CATEGORY_NAME_FIELD) {
            normalize_name(name)?;
        }
        Ok(())
    }

    fn before_update(
        &self,
        _ctx: &HookContext<'_>,
        _current: &Category,
        update: &mut PartialUpdate,
    ) -> ServiceResult<()> {
        if let Some(mut name) = update.remove(CATEGORY_NAME_FIELD) {
            normalize_name(&mut name)?;
            update.insert(CATEGORY_NAME_FIELD, name);
        }
        Ok(())
    }

    fn before_delete(&self, ctx: &HookContext<'_>, target: &Category) -> ServiceResult<()> {
        let dependents = ctx.related::<Expense>()?.count(&[FilterCriterion::eq(
            EXPENSE_CATEGORY_FIELD,
            target.id.as_str(),
        )])?;
        if dependents > 0 {
            return Err(ServiceError::InUse {
                entity: Category::contract().entity,
                id: target.id.clone(),
                dependents,
            });
        }
        Ok(())
    }

    fn map_conflict(&self, conflict: ConflictError) -> ServiceError {
        match conflict {
            ConflictError::Unique { field, value } if field == CATEGORY_NAME_FIELD => {
                ServiceError::DuplicateName {
                    field,
                    value: value.map(|value| value.to_string()).unwrap_or_default(),
                }
            }
            other => ServiceError::Conflict(other),
        }
    }
}

impl<'conn> CategoryService<'conn> {
    /// Builds the category service over a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> ServiceResult<Self> {
        Ok(Self::new(SqliteRepository::try_new(conn)?, CategoryHooks))
    }

    pub fn create_category(&self, request: NewCategory) -> ServiceResult<Category> {
        self.create(request.into_attributes())
    }

    pub fn update_category(&self, id: &EntityId, patch: CategoryPatch) -> ServiceResult<Category> {
        self.update(id, patch.into_update())
    }
}

/// Trims a category name in place; blank names are rejected. Non-text values
/// are left for contract validation.
fn normalize_name(value: &mut FieldValue) -> ServiceResult<()> {
    if let FieldValue::Text(text) = value {
        let trimmed = text.trim().to_string();
        if trimmed.is_empty() {
            return Err(
                ValidationError::invalid_value(CATEGORY_NAME_FIELD, "must not be blank").into(),
            );
        }
        *text = trimmed;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::normalize_name;
    use crate::model::value::FieldValue;
    use crate::service::error::ErrorKind;

    #[test]
    fn names_are_trimmed_and_blank_names_rejected() {
        let mut name = FieldValue::from("  Groceries ");
        normalize_name(&mut name).unwrap();
        assert_eq!(name, FieldValue::from("Groceries"));

        let mut blank = FieldValue::from("   ");
        let err = normalize_name(&mut blank).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        let mut null = FieldValue::Null;
        normalize_name(&mut null).unwrap();
        assert_eq!(null, FieldValue::Null);
    }
}
