//! Filter clauses of a query request

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// The fixed set of filter operators.
///
/// Every operator has exactly one arm in the predicate builder, so adding a
/// variant here is a compile error until it is handled there.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FilterOperator {
    Equals,
    NotEquals,
    Contains,
    NotContains,
    StartsWith,
    EndsWith,
    Gt,
    Gte,
    Lt,
    Lte,
    InDateRange,
    NotInDateRange,
    BeforeDate,
    AfterDate,
    Set,
    NotSet,
}

impl FilterOperator {
    pub fn as_str(&self) -> &'static str {
        match self {
            FilterOperator::Equals => "equals",
            FilterOperator::NotEquals => "notEquals",
            FilterOperator::Contains => "contains",
            FilterOperator::NotContains => "notContains",
            FilterOperator::StartsWith => "startsWith",
            FilterOperator::EndsWith => "endsWith",
            FilterOperator::Gt => "gt",
            FilterOperator::Gte => "gte",
            FilterOperator::Lt => "lt",
            FilterOperator::Lte => "lte",
            FilterOperator::InDateRange => "inDateRange",
            FilterOperator::NotInDateRange => "notInDateRange",
            FilterOperator::BeforeDate => "beforeDate",
            FilterOperator::AfterDate => "afterDate",
            FilterOperator::Set => "set",
            FilterOperator::NotSet => "notSet",
        }
    }

    /// set / notSet take no values; every other operator needs at least one
    pub fn takes_values(&self) -> bool {
        !matches!(self, FilterOperator::Set | FilterOperator::NotSet)
    }
}

impl fmt::Display for FilterOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A filter on a single member
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberFilter {
    pub member: String,
    pub operator: FilterOperator,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub values: Option<Vec<Value>>,
}

impl MemberFilter {
    pub fn new(member: impl Into<String>, operator: FilterOperator) -> Self {
        Self {
            member: member.into(),
            operator,
            values: None,
        }
    }

    pub fn with_values<I, V>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.values = Some(values.into_iter().map(Into::into).collect());
        self
    }

    /// Values as a slice (absent values read as empty)
    pub fn values(&self) -> &[Value] {
        self.values.as_deref().unwrap_or(&[])
    }
}

/// A filter entry: either a member filter or a nested boolean group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterRequest {
    Or { or: Vec<FilterRequest> },
    And { and: Vec<FilterRequest> },
    Member(MemberFilter),
}

impl From<MemberFilter> for FilterRequest {
    fn from(filter: MemberFilter) -> Self {
        FilterRequest::Member(filter)
    }
}

impl FilterRequest {
    /// All member paths referenced by this filter, depth first
    pub fn members(&self) -> Vec<&str> {
        match self {
            FilterRequest::Member(f) => vec![f.member.as_str()],
            FilterRequest::Or { or: children } | FilterRequest::And { and: children } => {
                children.iter().flat_map(|c| c.members()).collect()
            }
        }
    }
}
