//! Untyped request parameters → validated [`ListQuery`].
//!
//! Two input shapes are accepted:
//!
//! - string pairs, as forwarded from a query string:
//!   `name=Food`, `amount_cents[gte]=100`, `id[in]=A,B`,
//!   `spent_at[between]=1000,2000`, `sort=-created_at,name`,
//!   `offset=20` or `page=3`, `limit=50`, `include_deleted=true`;
//! - a JSON body ([`ListRequest`]) with `filters`, `sort_by`, `pagination`
//!   and `include_deleted`.
//!
//! The builder performs no storage access.

use crate::model::contract::EntityContract;
use crate::model::value::{FieldType, FieldValue};
use crate::query::error::QueryError;
use crate::query::filter::{FilterCriterion, FilterOp, FilterValue};
use crate::query::page::{PageLimits, PageSpec};
use crate::query::sort::{SortDirection, SortSpec};
use crate::query::ListQuery;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use std::collections::BTreeMap;

static FILTER_KEY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([A-Za-z_][A-Za-z0-9_]*)(?:\[([A-Za-z]+)\])?$").expect("valid filter key regex")
});

const SORT_PARAM: &str = "sort";
const OFFSET_PARAM: &str = "offset";
const LIMIT_PARAM: &str = "limit";
const PAGE_PARAM: &str = "page";
const INCLUDE_DELETED_PARAM: &str = "include_deleted";

/// Parser output: the query plus service-level visibility flag.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedList {
    pub query: ListQuery,
    /// Ask soft-delete modules to include tombstoned rows.
    pub include_deleted: bool,
}

/// JSON list request body.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ListRequest {
    pub filters: BTreeMap<String, FilterInput>,
    pub sort_by: Vec<SortInput>,
    pub pagination: Option<PaginationInput>,
    pub include_deleted: bool,
}

impl ListRequest {
    pub fn from_json(body: &str) -> Result<Self, QueryError> {
        serde_json::from_str(body)
            .map_err(|err| QueryError::invalid_parameter("body", err.to_string()))
    }
}

/// One filter entry of a JSON body.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum FilterInput {
    Expression(FilterExpression),
    Range(RangeInput),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FilterExpression {
    pub op: String,
    pub value: serde_json::Value,
}

/// Inclusive range, either bound optional (`{"from": .., "to": ..}`).
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RangeInput {
    #[serde(default)]
    pub from: Option<serde_json::Value>,
    #[serde(default)]
    pub to: Option<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SortInput {
    pub field: String,
    #[serde(default)]
    pub order: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PaginationInput {
    pub page: Option<i64>,
    pub offset: Option<i64>,
    pub limit: Option<i64>,
}

/// Parses request input for one entity contract.
#[derive(Debug, Clone, Copy)]
pub struct ListQueryBuilder<'c> {
    contract: &'c EntityContract,
    limits: PageLimits,
}

impl<'c> ListQueryBuilder<'c> {
    pub fn new(contract: &'c EntityContract) -> Self {
        Self {
            contract,
            limits: PageLimits::default(),
        }
    }

    pub fn with_limits(mut self, limits: PageLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Parses query-string style pairs.
    pub fn from_pairs<I, K, V>(&self, pairs: I) -> Result<ParsedList, QueryError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut filters = Vec::new();
        let mut sort: Option<SortSpec> = None;
        let mut paging = PagingParams::default();
        let mut include_deleted: Option<bool> = None;

        for (key, value) in pairs {
            let key = key.as_ref().trim();
            let value = value.as_ref();
            match key {
                SORT_PARAM => {
                    ensure_once(SORT_PARAM, sort.is_some())?;
                    sort = Some(parse_sort_param(value)?);
                }
                OFFSET_PARAM => paging.set_offset(parse_integer(OFFSET_PARAM, value)?)?,
                LIMIT_PARAM => paging.set_limit(parse_integer(LIMIT_PARAM, value)?)?,
                PAGE_PARAM => paging.set_page(parse_integer(PAGE_PARAM, value)?)?,
                INCLUDE_DELETED_PARAM => {
                    ensure_once(INCLUDE_DELETED_PARAM, include_deleted.is_some())?;
                    let flag = FieldType::Bool
                        .parse_str(value)
                        .and_then(|parsed| parsed.as_bool())
                        .ok_or_else(|| {
                            QueryError::invalid_parameter(
                                INCLUDE_DELETED_PARAM,
                                format!("expected true|false, got `{value}`"),
                            )
                        })?;
                    include_deleted = Some(flag);
                }
                _ => filters.push(self.parse_filter_pair(key, value)?),
            }
        }

        self.finish(
            filters,
            sort.unwrap_or_default(),
            paging,
            include_deleted.unwrap_or(false),
        )
    }

    /// Parses a JSON list request body.
    pub fn from_request(&self, request: &ListRequest) -> Result<ParsedList, QueryError> {
        let mut filters = Vec::new();
        for (field, input) in &request.filters {
            let kind = self.field_kind(field)?;
            match input {
                FilterInput::Expression(expression) => {
                    let op = FilterOp::parse(&expression.op)?;
                    self.ensure_supported(field, op, kind)?;
                    filters.push(FilterCriterion::new(
                        field.as_str(),
                        op,
                        json_operand(field, op, kind, &expression.value)?,
                    ));
                }
                FilterInput::Range(range) => {
                    filters.extend(range_criteria(field, kind, range)?);
                }
            }
        }

        let mut sort = SortSpec::new();
        for input in &request.sort_by {
            let direction = match input.order.as_deref() {
                Some(order) => SortDirection::parse(order)?,
                None => SortDirection::Asc,
            };
            sort = sort.then(input.field.as_str(), direction);
        }

        let mut paging = PagingParams::default();
        if let Some(pagination) = &request.pagination {
            if let Some(page) = pagination.page {
                paging.set_page(page)?;
            }
            if let Some(offset) = pagination.offset {
                paging.set_offset(offset)?;
            }
            if let Some(limit) = pagination.limit {
                paging.set_limit(limit)?;
            }
        }

        self.finish(filters, sort, paging, request.include_deleted)
    }

    fn finish(
        &self,
        filters: Vec<FilterCriterion>,
        sort: SortSpec,
        paging: PagingParams,
        include_deleted: bool,
    ) -> Result<ParsedList, QueryError> {
        let page = paging.resolve(self.limits)?;
        let query = ListQuery {
            filters,
            sort,
            page,
        }
        .validate(self.contract)?;
        Ok(ParsedList {
            query,
            include_deleted,
        })
    }

    fn parse_filter_pair(&self, key: &str, raw: &str) -> Result<FilterCriterion, QueryError> {
        let captures = FILTER_KEY_RE
            .captures(key)
            .ok_or_else(|| QueryError::UnknownField(key.to_string()))?;
        let field = captures.get(1).map_or("", |m| m.as_str());
        let op = match captures.get(2) {
            Some(op) => FilterOp::parse(op.as_str())?,
            None => FilterOp::Eq,
        };
        let kind = self.field_kind(field)?;
        self.ensure_supported(field, op, kind)?;

        let parse = |piece: &str| {
            kind.parse_str(piece).ok_or_else(|| {
                QueryError::invalid_value(field, op, format!("`{piece}` is not a valid {kind}"))
            })
        };
        let value = match op {
            FilterOp::In | FilterOp::Nin => FilterValue::List(
                split_list(raw)
                    .map(parse)
                    .collect::<Result<Vec<_>, _>>()?,
            ),
            FilterOp::Between => {
                let bounds = split_list(raw).collect::<Vec<_>>();
                match bounds.as_slice() {
                    [low, high] => FilterValue::Range(parse(*low)?, parse(*high)?),
                    _ => {
                        return Err(QueryError::invalid_value(
                            field,
                            op,
                            "expected exactly two comma-separated bounds",
                        ))
                    }
                }
            }
            _ => FilterValue::Single(parse(raw)?),
        };
        Ok(FilterCriterion::new(field, op, value))
    }

    fn field_kind(&self, field: &str) -> Result<FieldType, QueryError> {
        self.contract
            .queryable_kind(field)
            .ok_or_else(|| QueryError::UnknownField(field.to_string()))
    }

    fn ensure_supported(&self, field: &str, op: FilterOp, kind: FieldType) -> Result<(), QueryError> {
        if op.supports(kind) {
            Ok(())
        } else {
            Err(QueryError::UnsupportedOperator {
                field: field.to_string(),
                op,
                kind,
            })
        }
    }
}

#[derive(Debug, Default)]
struct PagingParams {
    offset: Option<i64>,
    page: Option<i64>,
    limit: Option<i64>,
}

impl PagingParams {
    fn set_offset(&mut self, offset: i64) -> Result<(), QueryError> {
        ensure_once(OFFSET_PARAM, self.offset.is_some())?;
        if self.page.is_some() {
            return Err(mutually_exclusive());
        }
        self.offset = Some(offset);
        Ok(())
    }

    fn set_page(&mut self, page: i64) -> Result<(), QueryError> {
        ensure_once(PAGE_PARAM, self.page.is_some())?;
        if self.offset.is_some() {
            return Err(mutually_exclusive());
        }
        self.page = Some(page);
        Ok(())
    }

    fn set_limit(&mut self, limit: i64) -> Result<(), QueryError> {
        ensure_once(LIMIT_PARAM, self.limit.is_some())?;
        self.limit = Some(limit);
        Ok(())
    }

    fn resolve(&self, limits: PageLimits) -> Result<PageSpec, QueryError> {
        let limit = self.limit.unwrap_or(i64::from(limits.default_limit));
        match self.page {
            Some(page) => PageSpec::from_page_number(page, limit, limits.max_limit),
            None => PageSpec::bounded(self.offset.unwrap_or(0), limit, limits.max_limit),
        }
    }
}

fn mutually_exclusive() -> QueryError {
    QueryError::invalid_parameter(PAGE_PARAM, "`page` and `offset` are mutually exclusive")
}

fn ensure_once(name: &str, already_set: bool) -> Result<(), QueryError> {
    if already_set {
        Err(QueryError::invalid_parameter(name, "given more than once"))
    } else {
        Ok(())
    }
}

fn parse_integer(name: &str, raw: &str) -> Result<i64, QueryError> {
    raw.trim()
        .parse()
        .map_err(|_| QueryError::invalid_parameter(name, format!("`{raw}` is not an integer")))
}

fn split_list(raw: &str) -> impl Iterator<Item = &str> {
    raw.split(',').map(str::trim).filter(|piece| !piece.is_empty())
}

/// Parses `-field`, `field`, `+field` or `field:asc|desc`, comma separated.
fn parse_sort_param(raw: &str) -> Result<SortSpec, QueryError> {
    let mut spec = SortSpec::new();
    for item in split_list(raw) {
        let (field, direction) = if let Some((field, direction)) = item.split_once(':') {
            (field.trim(), SortDirection::parse(direction)?)
        } else if let Some(field) = item.strip_prefix('-') {
            (field, SortDirection::Desc)
        } else {
            (item.strip_prefix('+').unwrap_or(item), SortDirection::Asc)
        };
        if field.is_empty() {
            return Err(QueryError::invalid_parameter(SORT_PARAM, "empty sort field"));
        }
        spec = spec.then(field, direction);
    }
    Ok(spec)
}

fn json_operand(
    field: &str,
    op: FilterOp,
    kind: FieldType,
    raw: &serde_json::Value,
) -> Result<FilterValue, QueryError> {
    let scalar = |value: &serde_json::Value| -> Result<FieldValue, QueryError> {
        kind.from_json(value).ok_or_else(|| {
            QueryError::invalid_value(field, op, format!("`{value}` is not a valid {kind}"))
        })
    };
    match (op, raw) {
        (FilterOp::In | FilterOp::Nin, serde_json::Value::Array(items)) => Ok(FilterValue::List(
            items.iter().map(scalar).collect::<Result<Vec<_>, _>>()?,
        )),
        (FilterOp::Between, serde_json::Value::Array(items)) if items.len() == 2 => {
            Ok(FilterValue::Range(scalar(&items[0])?, scalar(&items[1])?))
        }
        (FilterOp::In | FilterOp::Nin | FilterOp::Between, _) => Err(QueryError::invalid_value(
            field,
            op,
            "expected a JSON array operand",
        )),
        (_, serde_json::Value::Array(_)) => Err(QueryError::invalid_value(
            field,
            op,
            "expected a single value",
        )),
        _ => Ok(FilterValue::Single(scalar(raw)?)),
    }
}

fn range_criteria(
    field: &str,
    kind: FieldType,
    range: &RangeInput,
) -> Result<Vec<FilterCriterion>, QueryError> {
    let bound = |op: FilterOp, value: &Option<serde_json::Value>| -> Result<Option<FieldValue>, QueryError> {
        match value {
            None | Some(serde_json::Value::Null) => Ok(None),
            Some(raw) => kind.from_json(raw).map(Some).ok_or_else(|| {
                QueryError::invalid_value(field, op, format!("`{raw}` is not a valid {kind}"))
            }),
        }
    };
    let from = bound(FilterOp::Gte, &range.from)?;
    let to = bound(FilterOp::Lte, &range.to)?;
    match (from, to) {
        (Some(low), Some(high)) => Ok(vec![FilterCriterion::between(field, low, high)]),
        (Some(low), None) => Ok(vec![FilterCriterion::compare(field, FilterOp::Gte, low)]),
        (None, Some(high)) => Ok(vec![FilterCriterion::compare(field, FilterOp::Lte, high)]),
        (None, None) => Err(QueryError::invalid_value(
            field,
            FilterOp::Between,
            "range needs `from` or `to`",
        )),
    }
}
