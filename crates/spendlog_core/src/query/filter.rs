//! Filter criteria.
//!
//! # Invariants
//! - Criteria combine with logical AND.
//! - A criterion is only executed after `validate` resolved its field on the
//!   contract and coerced its values to the field type.

use crate::model::contract::EntityContract;
use crate::model::value::{FieldType, FieldValue};
use crate::query::error::QueryError;
use std::fmt::{Display, Formatter};

/// Comparison operator of one criterion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterOp {
    Eq,
    Ne,
    Gt,
    Lt,
    Gte,
    Lte,
    In,
    Nin,
    Like,
    Between,
}

impl FilterOp {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Eq => "eq",
            Self::Ne => "ne",
            Self::Gt => "gt",
            Self::Lt => "lt",
            Self::Gte => "gte",
            Self::Lte => "lte",
            Self::In => "in",
            Self::Nin => "nin",
            Self::Like => "like",
            Self::Between => "between",
        }
    }

    pub fn parse(value: &str) -> Result<Self, QueryError> {
        match value.trim().to_ascii_lowercase().as_str() {
            "eq" => Ok(Self::Eq),
            "ne" => Ok(Self::Ne),
            "gt" => Ok(Self::Gt),
            "lt" => Ok(Self::Lt),
            "gte" => Ok(Self::Gte),
            "lte" => Ok(Self::Lte),
            "in" => Ok(Self::In),
            "nin" => Ok(Self::Nin),
            "like" => Ok(Self::Like),
            "between" => Ok(Self::Between),
            other => Err(QueryError::UnknownOperator(other.to_string())),
        }
    }

    /// Whether the operator is defined for attributes of `kind`.
    pub fn supports(self, kind: FieldType) -> bool {
        match kind {
            FieldType::Text => true,
            FieldType::Integer | FieldType::Real | FieldType::Timestamp => self != Self::Like,
            FieldType::Bool => matches!(self, Self::Eq | Self::Ne | Self::In | Self::Nin),
        }
    }

    pub fn takes_list(self) -> bool {
        matches!(self, Self::In | Self::Nin)
    }
}

impl Display for FilterOp {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Operand of a criterion; its shape is fixed by the operator.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    Single(FieldValue),
    List(Vec<FieldValue>),
    Range(FieldValue, FieldValue),
}

/// `(field, op, value)` narrowing a result set.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterCriterion {
    pub field: String,
    pub op: FilterOp,
    pub value: FilterValue,
}

impl FilterCriterion {
    pub fn new(field: impl Into<String>, op: FilterOp, value: FilterValue) -> Self {
        Self {
            field: field.into(),
            op,
            value,
        }
    }

    pub fn eq(field: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        Self::new(field, FilterOp::Eq, FilterValue::Single(value.into()))
    }

    pub fn ne(field: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        Self::new(field, FilterOp::Ne, FilterValue::Single(value.into()))
    }

    pub fn compare(field: impl Into<String>, op: FilterOp, value: impl Into<FieldValue>) -> Self {
        Self::new(field, op, FilterValue::Single(value.into()))
    }

    pub fn one_of(field: impl Into<String>, values: Vec<FieldValue>) -> Self {
        Self::new(field, FilterOp::In, FilterValue::List(values))
    }

    pub fn like(field: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self::new(
            field,
            FilterOp::Like,
            FilterValue::Single(FieldValue::Text(pattern.into())),
        )
    }

    pub fn between(
        field: impl Into<String>,
        low: impl Into<FieldValue>,
        high: impl Into<FieldValue>,
    ) -> Self {
        Self::new(
            field,
            FilterOp::Between,
            FilterValue::Range(low.into(), high.into()),
        )
    }

    /// Resolves the field on `contract`, checks the operator/type matrix and
    /// the operand shape, and returns the criterion with coerced values.
    pub fn validate(&self, contract: &EntityContract) -> Result<Self, QueryError> {
        let kind = contract
            .queryable_kind(&self.field)
            .ok_or_else(|| QueryError::UnknownField(self.field.clone()))?;
        if !self.op.supports(kind) {
            return Err(QueryError::UnsupportedOperator {
                field: self.field.clone(),
                op: self.op,
                kind,
            });
        }

        let field = self.field.as_str();
        let op = self.op;
        let value = match (op, &self.value) {
            (FilterOp::Eq | FilterOp::Ne, FilterValue::Single(value)) => {
                FilterValue::Single(coerce(field, op, kind, value, true)?)
            }
            (
                FilterOp::Gt | FilterOp::Lt | FilterOp::Gte | FilterOp::Lte | FilterOp::Like,
                FilterValue::Single(value),
            ) => FilterValue::Single(coerce(field, op, kind, value, false)?),
            (FilterOp::In | FilterOp::Nin, FilterValue::List(values)) => {
                if values.is_empty() {
                    return Err(QueryError::invalid_value(
                        field,
                        op,
                        "expected at least one value",
                    ));
                }
                FilterValue::List(
                    values
                        .iter()
                        .map(|value| coerce(field, op, kind, value, false))
                        .collect::<Result<_, _>>()?,
                )
            }
            (FilterOp::Between, FilterValue::Range(low, high)) => FilterValue::Range(
                coerce(field, op, kind, low, false)?,
                coerce(field, op, kind, high, false)?,
            ),
            (_, other) => {
                return Err(QueryError::invalid_value(
                    field,
                    op,
                    format!("unexpected operand shape {}", shape_name(other)),
                ))
            }
        };

        Ok(Self {
            field: self.field.clone(),
            op,
            value,
        })
    }
}

fn coerce(
    field: &str,
    op: FilterOp,
    kind: FieldType,
    value: &FieldValue,
    allow_null: bool,
) -> Result<FieldValue, QueryError> {
    if value.is_null() {
        return if allow_null {
            Ok(FieldValue::Null)
        } else {
            Err(QueryError::invalid_value(field, op, "null is not allowed"))
        };
    }
    kind.coerce(value.clone()).ok_or_else(|| {
        QueryError::invalid_value(
            field,
            op,
            format!("expected {kind}, got {}", value.kind_name()),
        )
    })
}

fn shape_name(value: &FilterValue) -> &'static str {
    match value {
        FilterValue::Single(_) => "single",
        FilterValue::List(_) => "list",
        FilterValue::Range(..) => "range",
    }
}

#[cfg(test)]
mod tests {
    use super::{FilterCriterion, FilterOp, FilterValue};
    use crate::model::category::CATEGORY_CONTRACT;
    use crate::model::expense::EXPENSE_CONTRACT;
    use crate::model::value::{FieldType, FieldValue};
    use crate::query::error::QueryError;

    #[test]
    fn unknown_field_is_rejected() {
        let err = FilterCriterion::eq("nonexistent", 1_i64)
            .validate(&CATEGORY_CONTRACT)
            .unwrap_err();
        assert_eq!(err, QueryError::UnknownField("nonexistent".to_string()));
    }

    #[test]
    fn like_on_numeric_field_is_unsupported() {
        let err = FilterCriterion::like("amount_cents", "1%")
            .validate(&EXPENSE_CONTRACT)
            .unwrap_err();
        assert!(matches!(
            err,
            QueryError::UnsupportedOperator {
                op: FilterOp::Like,
                kind: FieldType::Integer,
                ..
            }
        ));
    }

    #[test]
    fn ordering_operators_reject_null_and_lists_must_be_non_empty() {
        let err = FilterCriterion::compare("spent_at", FilterOp::Gt, FieldValue::Null)
            .validate(&EXPENSE_CONTRACT)
            .unwrap_err();
        assert!(matches!(err, QueryError::InvalidValue { .. }));

        let err = FilterCriterion::one_of("id", Vec::new())
            .validate(&EXPENSE_CONTRACT)
            .unwrap_err();
        assert!(matches!(err, QueryError::InvalidValue { .. }));
    }

    #[test]
    fn operand_shape_must_match_operator() {
        let criterion = FilterCriterion::new(
            "name",
            FilterOp::In,
            FilterValue::Single(FieldValue::from("x")),
        );
        assert!(matches!(
            criterion.validate(&CATEGORY_CONTRACT),
            Err(QueryError::InvalidValue { .. })
        ));
    }

    #[test]
    fn bool_fields_only_accept_equality_style_operators() {
        assert!(FilterCriterion::eq("is_deleted", false)
            .validate(&CATEGORY_CONTRACT)
            .is_ok());
        assert!(matches!(
            FilterCriterion::compare("is_deleted", FilterOp::Gt, false)
                .validate(&CATEGORY_CONTRACT),
            Err(QueryError::UnsupportedOperator { .. })
        ));
    }
}
