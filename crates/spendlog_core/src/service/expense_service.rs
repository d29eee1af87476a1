//! Expense use-case service.
//!
//! # Invariants
//! - `amount_cents` is strictly positive.
//! - `category_id` names an active (not soft-deleted) category whenever it
//!   is written.
//! - Updates carrying an expected version are compare-and-swap.

use crate::model::category::{Category, CATEGORY_DELETED_FIELD};
use crate::model::contract::ID_FIELD;
use crate::model::expense::{
    Expense, ExpensePatch, NewExpense, EXPENSE_AMOUNT_FIELD, EXPENSE_CATEGORY_FIELD,
    EXPENSE_SPENT_AT_FIELD,
};
use crate::model::id::EntityId;
use crate::model::record::Attributes;
use crate::model::update::PartialUpdate;
use crate::model::validation::ValidationError;
use crate::model::value::FieldValue;
use crate::query::filter::FilterCriterion;
use crate::query::page::PageSpec;
use crate::query::sort::SortSpec;
use crate::query::{ListQuery, ListResult};
use crate::repo::{Repository, SqliteRepository};
use crate::service::entity_service::EntityService;
use crate::service::error::ServiceResult;
use crate::service::hooks::{HookContext, ServiceHooks};
use rusqlite::Connection;

/// Expense rules plugged into the generic service.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExpenseHooks;

pub type ExpenseService<'conn> =
    EntityService<Expense, SqliteRepository<'conn, Expense>, ExpenseHooks>;

impl ServiceHooks<Expense> for ExpenseHooks {
    fn default_sort(&self) -> SortSpec {
        SortSpec::new().desc(EXPENSE_SPENT_AT_FIELD)
    }

    fn before_create(
        &self,
        ctx: &HookContext<'_>,
        attributes: &mut Attributes,
    ) -> ServiceResult<()> {
        if let Some(amount) = attributes.get(EXPENSE_AMOUNT_FIELD) {
            ensure_positive_amount(amount)?;
        }
        if let Some(category_id) = attributes.get(EXPENSE_CATEGORY_FIELD) {
            ensure_active_category(ctx, category_id)?;
        }
        Ok(())
    }

    fn before_update(
        &self,
        ctx: &HookContext<'_>,
        _current: &Expense,
        update: &mut PartialUpdate,
    ) -> ServiceResult<()> {
        if let Some(amount) = update.get(EXPENSE_AMOUNT_FIELD) {
            ensure_positive_amount(amount)?;
        }
        if let Some(category_id) = update.get(EXPENSE_CATEGORY_FIELD) {
            ensure_active_category(ctx, category_id)?;
        }
        Ok(())
    }
}

impl<'conn> ExpenseService<'conn> {
    /// Builds the expense service over a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> ServiceResult<Self> {
        Ok(Self::new(SqliteRepository::try_new(conn)?, ExpenseHooks))
    }

    pub fn create_expense(&self, request: NewExpense) -> ServiceResult<Expense> {
        self.create(request.into_attributes())
    }

    pub fn update_expense(&self, id: &EntityId, patch: ExpensePatch) -> ServiceResult<Expense> {
        self.update(id, patch.into_update())
    }

    /// Expenses of one category, newest first.
    pub fn list_for_category(
        &self,
        category_id: &EntityId,
        page: PageSpec,
    ) -> ServiceResult<ListResult<Expense>> {
        let query = ListQuery::new()
            .filter(FilterCriterion::eq(
                EXPENSE_CATEGORY_FIELD,
                category_id.as_str(),
            ))
            .page(page);
        self.list_query(query, false)
    }
}

/// Non-integers are left for contract validation.
fn ensure_positive_amount(amount: &FieldValue) -> ServiceResult<()> {
    match amount.as_i64() {
        Some(cents) if cents <= 0 => Err(ValidationError::invalid_value(
            EXPENSE_AMOUNT_FIELD,
            format!("must be greater than zero, got {cents}"),
        )
        .into()),
        _ => Ok(()),
    }
}

fn ensure_active_category(ctx: &HookContext<'_>, category_id: &FieldValue) -> ServiceResult<()> {
    let Some(category_id) = category_id.as_text() else {
        return Ok(());
    };
    let active = ctx.related::<Category>()?.count(&[
        FilterCriterion::eq(ID_FIELD, category_id),
        FilterCriterion::eq(CATEGORY_DELETED_FIELD, false),
    ])?;
    if active == 0 {
        return Err(ValidationError::BrokenReference(EXPENSE_CATEGORY_FIELD.to_string()).into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::ensure_positive_amount;
    use crate::model::value::FieldValue;

    #[test]
    fn amount_must_be_positive() {
        assert!(ensure_positive_amount(&FieldValue::Integer(1)).is_ok());
        assert!(ensure_positive_amount(&FieldValue::Integer(0)).is_err());
        assert!(ensure_positive_amount(&FieldValue::Integer(-5)).is_err());
        assert!(ensure_positive_amount(&FieldValue::from("12")).is_ok());
    }
}
