//! Canonical filter and sort model for find and count.

use crate::document::{Document, FIELD_CREATED_AT};
use serde_json::Value;
use std::cmp::Ordering;

/// Comparison operator in a filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    /// Equal.
    Eq,
    /// Greater than.
    Gt,
    /// Less than.
    Lt,
    /// Greater than or equal.
    Gte,
    /// Less than or equal.
    Lte,
    /// Not equal.
    Ne,
    /// Member of a list of values.
    In,
}

impl FilterOp {
    /// Parses an operator name (`eq`, `gt`, `lt`, `gte`, `lte`, `ne`, `in`).
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "eq" => Some(Self::Eq),
            "gt" => Some(Self::Gt),
            "lt" => Some(Self::Lt),
            "gte" => Some(Self::Gte),
            "lte" => Some(Self::Lte),
            "ne" => Some(Self::Ne),
            "in" => Some(Self::In),
            _ => None,
        }
    }

    /// Returns the operator name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Eq => "eq",
            Self::Gt => "gt",
            Self::Lt => "lt",
            Self::Gte => "gte",
            Self::Lte => "lte",
            Self::Ne => "ne",
            Self::In => "in",
        }
    }
}

/// One filter condition. Multiple filters are ANDed.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    /// The document field to compare.
    pub field: String,
    /// The comparison operator.
    pub op: FilterOp,
    /// The comparison value. For [`FilterOp::In`] this is an array.
    pub value: Value,
}

impl Filter {
    /// Creates a filter condition.
    #[must_use]
    pub fn new(field: impl Into<String>, op: FilterOp, value: Value) -> Self {
        Self {
            field: field.into(),
            op,
            value,
        }
    }

    /// Creates an equality filter.
    #[must_use]
    pub fn eq(field: impl Into<String>, value: Value) -> Self {
        Self::new(field, FilterOp::Eq, value)
    }

    /// Returns true if the document satisfies this condition.
    ///
    /// A document lacking the field fails every operator except `ne`,
    /// which treats absence as "not equal".
    #[must_use]
    pub fn matches(&self, document: &Document) -> bool {
        let stored = document.get(&self.field);

        match self.op {
            FilterOp::Eq => stored.is_some_and(|v| values_equal(v, &self.value)),
            FilterOp::Ne => !stored.is_some_and(|v| values_equal(v, &self.value)),
            FilterOp::In => match (&self.value, stored) {
                (Value::Array(candidates), Some(v)) => {
                    candidates.iter().any(|c| values_equal(v, c))
                }
                _ => false,
            },
            FilterOp::Gt | FilterOp::Lt | FilterOp::Gte | FilterOp::Lte => {
                let Some(order) = stored.and_then(|v| compare_values(v, &self.value)) else {
                    return false;
                };
                match self.op {
                    FilterOp::Gt => order == Ordering::Greater,
                    FilterOp::Lt => order == Ordering::Less,
                    FilterOp::Gte => order != Ordering::Less,
                    FilterOp::Lte => order != Ordering::Greater,
                    _ => unreachable!(),
                }
            }
        }
    }
}

/// A single-field sort.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sort {
    /// The field to order by.
    pub field: String,
    /// True for descending order.
    pub descending: bool,
}

impl Sort {
    /// Creates an ascending sort on a field.
    #[must_use]
    pub fn ascending(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            descending: false,
        }
    }

    /// Creates a descending sort on a field.
    #[must_use]
    pub fn descending(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            descending: true,
        }
    }

    /// Parses a sort expression: a field name with an optional `-` prefix
    /// for descending order.
    #[must_use]
    pub fn parse(expr: &str) -> Self {
        match expr.strip_prefix('-') {
            Some(field) => Self::descending(field),
            None => Self::ascending(expr),
        }
    }

    /// The default sort: newest documents first.
    #[must_use]
    pub fn default_newest_first() -> Self {
        Self::descending(FIELD_CREATED_AT)
    }

    /// Compares two documents under this sort.
    ///
    /// Documents lacking the sort field order after documents that have
    /// it, regardless of direction.
    #[must_use]
    pub fn compare(&self, a: &Document, b: &Document) -> Ordering {
        let order = match (a.get(&self.field), b.get(&self.field)) {
            (Some(va), Some(vb)) => compare_values(va, vb).unwrap_or(Ordering::Equal),
            (Some(_), None) => return Ordering::Less,
            (None, Some(_)) => return Ordering::Greater,
            (None, None) => return Ordering::Equal,
        };
        if self.descending {
            order.reverse()
        } else {
            order
        }
    }
}

/// A find request: ANDed filters, one sort, offset pagination.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    /// Filter conditions, all of which must hold.
    pub filters: Vec<Filter>,
    /// Sort order. `None` means newest first.
    pub sort: Option<Sort>,
    /// Page size. `None` means the engine default.
    pub limit: Option<usize>,
    /// Number of matching documents to skip.
    pub offset: usize,
}

impl Query {
    /// Creates an empty query matching every document.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a filter condition.
    #[must_use]
    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    /// Sets the sort order.
    #[must_use]
    pub fn sort(mut self, sort: Sort) -> Self {
        self.sort = Some(sort);
        self
    }

    /// Sets the page size.
    #[must_use]
    pub const fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Sets the pagination offset.
    #[must_use]
    pub const fn offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    /// Returns true if the document satisfies every filter.
    #[must_use]
    pub fn matches(&self, document: &Document) -> bool {
        self.filters.iter().all(|f| f.matches(document))
    }
}

/// Equality with numeric coercion: `5` and `5.0` are equal.
#[must_use]
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (a.as_f64(), b.as_f64()) {
        (Some(na), Some(nb)) => na == nb,
        _ => a == b,
    }
}

/// Orders two JSON values when they are comparable.
///
/// Numbers compare numerically across integer and float representations,
/// strings lexicographically, booleans false-before-true. Mixed or
/// non-scalar types are incomparable and return `None`.
#[must_use]
pub fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(_), Value::Number(_)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Value::String(sa), Value::String(sb)) => Some(sa.cmp(sb)),
        (Value::Bool(ba), Value::Bool(bb)) => Some(ba.cmp(bb)),
        _ => None,
    }
}
