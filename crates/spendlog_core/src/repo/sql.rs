//! SQL fragments generated from validated query descriptors, and mapping of
//! SQLite constraint failures onto the repository taxonomy.
//!
//! # Invariants
//! - Only static contract column names are ever interpolated into SQL text;
//!   every caller value is bound as a parameter.

use crate::model::contract::{EntityContract, ID_FIELD};
use crate::model::id::EntityId;
use crate::model::validation::ValidationError;
use crate::model::value::FieldValue;
use crate::query::filter::{FilterCriterion, FilterOp, FilterValue};
use crate::query::sort::SortSpec;
use crate::repo::error::{ConflictError, RepoError, RepoResult};
use once_cell::sync::Lazy;
use regex::Regex;
use rusqlite::ffi;
use rusqlite::ErrorCode;

static CONSTRAINT_COLUMN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"constraint failed: (\w+)\.(\w+)").expect("valid constraint column regex")
});

/// `WHERE` clause plus its bind values, in placeholder order.
#[derive(Debug, Default)]
pub(crate) struct WhereClause {
    pub sql: String,
    pub binds: Vec<FieldValue>,
}

/// Builds the conjunction of `filters`. The filters must already be
/// validated against `contract`.
pub(crate) fn where_clause(
    contract: &EntityContract,
    filters: &[FilterCriterion],
) -> RepoResult<WhereClause> {
    let mut conditions = Vec::with_capacity(filters.len());
    let mut binds = Vec::new();

    for criterion in filters {
        let column = resolve_column(contract, &criterion.field)?;
        let condition = match (criterion.op, &criterion.value) {
            (FilterOp::Eq, FilterValue::Single(FieldValue::Null)) => format!("{column} IS NULL"),
            (FilterOp::Ne, FilterValue::Single(FieldValue::Null)) => {
                format!("{column} IS NOT NULL")
            }
            (FilterOp::Ne, FilterValue::Single(value)) => {
                binds.push(value.clone());
                format!("{column} IS NOT ?")
            }
            (
                op @ (FilterOp::Eq
                | FilterOp::Gt
                | FilterOp::Lt
                | FilterOp::Gte
                | FilterOp::Lte
                | FilterOp::Like),
                FilterValue::Single(value),
            ) => {
                binds.push(value.clone());
                format!("{column} {} ?", comparison_sql(op))
            }
            (FilterOp::In, FilterValue::List(values)) => {
                binds.extend(values.iter().cloned());
                format!("{column} IN ({})", placeholders(values.len()))
            }
            (FilterOp::Nin, FilterValue::List(values)) => {
                binds.extend(values.iter().cloned());
                format!(
                    "({column} IS NULL OR {column} NOT IN ({}))",
                    placeholders(values.len())
                )
            }
            (FilterOp::Between, FilterValue::Range(low, high)) => {
                binds.push(low.clone());
                binds.push(high.clone());
                format!("{column} BETWEEN ? AND ?")
            }
            (op, _) => {
                return Err(RepoError::InvalidData(format!(
                    "unvalidated operand for `{}` `{op}`",
                    criterion.field
                )))
            }
        };
        conditions.push(condition);
    }

    if conditions.is_empty() {
        return Ok(WhereClause::default());
    }
    Ok(WhereClause {
        sql: format!(" WHERE {}", conditions.join(" AND ")),
        binds,
    })
}

/// `ORDER BY` body for `sort`, always ending with the id tiebreaker.
pub(crate) fn order_clause(contract: &EntityContract, sort: &SortSpec) -> RepoResult<String> {
    let keys = sort
        .with_tiebreaker()
        .keys()
        .iter()
        .map(|key| {
            resolve_column(contract, &key.field)
                .map(|column| format!("{column} {}", key.direction.as_sql()))
        })
        .collect::<RepoResult<Vec<_>>>()?;
    Ok(keys.join(", "))
}

pub(crate) fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}

fn comparison_sql(op: FilterOp) -> &'static str {
    match op {
        FilterOp::Eq => "=",
        FilterOp::Gt => ">",
        FilterOp::Lt => "<",
        FilterOp::Gte => ">=",
        FilterOp::Lte => "<=",
        FilterOp::Like => "LIKE",
        FilterOp::Ne => "IS NOT",
        FilterOp::In => "IN",
        FilterOp::Nin => "NOT IN",
        FilterOp::Between => "BETWEEN",
    }
}

fn resolve_column(contract: &EntityContract, field: &str) -> RepoResult<&'static str> {
    contract.column(field).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "field `{field}` is not a column of `{}`",
            contract.table
        ))
    })
}

/// Operation whose SQL failed; decides how constraint failures read.
#[derive(Debug, Clone, Copy)]
pub(crate) enum WriteKind<'a> {
    Insert,
    Update,
    Delete(&'a EntityId),
}

/// Maps a failed write onto the repository taxonomy.
///
/// `attempted` looks up the value the caller tried to store for a field, so
/// that unique conflicts can report it.
pub(crate) fn classify_write_error(
    contract: &EntityContract,
    kind: WriteKind<'_>,
    err: rusqlite::Error,
    attempted: impl Fn(&str) -> Option<FieldValue>,
) -> RepoError {
    let constraint = match &err {
        rusqlite::Error::SqliteFailure(failure, message)
            if failure.code == ErrorCode::ConstraintViolation =>
        {
            Some((failure.extended_code, message.clone().unwrap_or_default()))
        }
        _ => None,
    };
    let Some((extended_code, message)) = constraint else {
        return RepoError::from(err);
    };
    let column = constrained_column(&message).and_then(|name| contract.column(&name));

    match extended_code {
        ffi::SQLITE_CONSTRAINT_UNIQUE | ffi::SQLITE_CONSTRAINT_PRIMARYKEY => {
            // Expression indexes (e.g. `lower(name)`) are reported
            // without a column name.
            let field = column
                .or_else(|| contract.unique_fields().next().map(|field| field.name))
                .unwrap_or(ID_FIELD);
            RepoError::Conflict(ConflictError::Unique {
                field: field.to_string(),
                value: attempted(field),
            })
        }
        ffi::SQLITE_CONSTRAINT_NOTNULL => RepoError::Validation(ValidationError::NullNotAllowed(
            column.unwrap_or(contract.entity).to_string(),
        )),
        ffi::SQLITE_CONSTRAINT_FOREIGNKEY => match kind {
            WriteKind::Delete(id) => {
                RepoError::Conflict(ConflictError::Referenced { id: id.clone() })
            }
            WriteKind::Insert | WriteKind::Update => {
                let fields = contract
                    .reference_fields()
                    .map(|field| field.name)
                    .collect::<Vec<_>>();
                RepoError::Validation(ValidationError::BrokenReference(fields.join(",")))
            }
        },
        ffi::SQLITE_CONSTRAINT_CHECK => RepoError::Validation(ValidationError::invalid_value(
            column.unwrap_or(contract.entity),
            message,
        )),
        _ => RepoError::from(err),
    }
}

fn constrained_column(message: &str) -> Option<String> {
    CONSTRAINT_COLUMN_RE
        .captures(message)
        .and_then(|captures| captures.get(2))
        .map(|column| column.as_str().to_string())
}

#[cfg(test)]
mod tests {
    use super::{constrained_column, order_clause, where_clause};
    use crate::model::expense::EXPENSE_CONTRACT;
    use crate::model::value::FieldValue;
    use crate::query::filter::{FilterCriterion, FilterOp};
    use crate::query::sort::SortSpec;

    #[test]
    fn where_clause_binds_values_in_placeholder_order() {
        let filters = vec![
            FilterCriterion::compare("amount_cents", FilterOp::Gte, 100_i64),
            FilterCriterion::eq("description", FieldValue::Null),
            FilterCriterion::between("spent_at", 1_i64, 9_i64),
            FilterCriterion::new(
                "category_id",
                FilterOp::Nin,
                crate::query::filter::FilterValue::List(vec!["a".into(), "b".into()]),
            ),
        ];
        let clause = where_clause(&EXPENSE_CONTRACT, &filters).unwrap();
        assert_eq!(
            clause.sql,
            " WHERE amount_cents >= ? AND description IS NULL AND spent_at BETWEEN ? AND ? \
             AND (category_id IS NULL OR category_id NOT IN (?, ?))"
        );
        assert_eq!(
            clause.binds,
            vec![
                FieldValue::Integer(100),
                FieldValue::Integer(1),
                FieldValue::Integer(9),
                FieldValue::from("a"),
                FieldValue::from("b"),
            ]
        );
    }

    #[test]
    fn unknown_columns_never_reach_sql() {
        let filters = vec![FilterCriterion::eq("amount_cents; DROP TABLE x", 1_i64)];
        assert!(where_clause(&EXPENSE_CONTRACT, &filters).is_err());
    }

    #[test]
    fn order_clause_appends_id_tiebreaker() {
        let order = order_clause(&EXPENSE_CONTRACT, &SortSpec::new().desc("spent_at")).unwrap();
        assert_eq!(order, "spent_at DESC, id ASC");
    }

    #[test]
    fn constrained_column_reads_sqlite_message() {
        assert_eq!(
            constrained_column("UNIQUE constraint failed: categories.name"),
            Some("name".to_string())
        );
        assert_eq!(
            constrained_column("NOT NULL constraint failed: expenses.spent_at"),
            Some("spent_at".to_string())
        );
        assert_eq!(constrained_column("UNIQUE constraint failed: index 'x'"), None);
    }
}
