use serde::de::{self, MapAccess, SeqAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

use super::filter::FilterRequest;
use super::granularity::Granularity;
use crate::plan::SortDirection;

/// A date range as written in a request: a relative expression such as
/// `"last 30 days"`, or a literal `[start, end]` pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DateRangeExpr {
    Expression(String),
    Interval(Vec<String>),
}

impl DateRangeExpr {
    pub fn interval(start: impl Into<String>, end: impl Into<String>) -> Self {
        DateRangeExpr::Interval(vec![start.into(), end.into()])
    }

    /// An empty string or empty array means "no range was given"
    pub fn is_empty(&self) -> bool {
        match self {
            DateRangeExpr::Expression(s) => s.trim().is_empty(),
            DateRangeExpr::Interval(parts) => parts.is_empty(),
        }
    }
}

impl From<&str> for DateRangeExpr {
    fn from(s: &str) -> Self {
        DateRangeExpr::Expression(s.to_string())
    }
}

impl fmt::Display for DateRangeExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DateRangeExpr::Expression(s) => write!(f, "{}", s),
            DateRangeExpr::Interval(parts) => write!(f, "[{}]", parts.join(", ")),
        }
    }
}

/// A time dimension entry of a request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeDimensionRequest {
    pub dimension: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub granularity: Option<Granularity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_range: Option<DateRangeExpr>,
}

impl TimeDimensionRequest {
    pub fn new(dimension: impl Into<String>) -> Self {
        Self {
            dimension: dimension.into(),
            granularity: None,
            date_range: None,
        }
    }

    pub fn with_granularity(mut self, granularity: Granularity) -> Self {
        self.granularity = Some(granularity);
        self
    }

    pub fn with_date_range(mut self, range: impl Into<DateRangeExpr>) -> Self {
        self.date_range = Some(range.into());
        self
    }
}

/// Requested ordering, kept in the order the caller wrote it.
///
/// Accepts either `{"orders.count": "desc"}` or `[["orders.count", "desc"]]`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Order(pub Vec<(String, SortDirection)>);

impl Order {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &(String, SortDirection)> {
        self.0.iter()
    }
}

impl<'de> Deserialize<'de> for Order {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct OrderVisitor;

        impl<'de> Visitor<'de> for OrderVisitor {
            type Value = Order;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of member to asc/desc or a list of [member, direction] pairs")
            }

            fn visit_map<A>(self, mut map: A) -> Result<Order, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut entries = Vec::new();
                while let Some((member, direction)) = map.next_entry::<String, SortDirection>()? {
                    entries.push((member, direction));
                }
                Ok(Order(entries))
            }

            fn visit_seq<A>(self, mut seq: A) -> Result<Order, A::Error>
            where
                A: SeqAccess<'de>,
            {
                let mut entries = Vec::new();
                while let Some(pair) = seq.next_element::<(String, SortDirection)>()? {
                    entries.push(pair);
                }
                Ok(Order(entries))
            }

            fn visit_unit<E>(self) -> Result<Order, E>
            where
                E: de::Error,
            {
                Ok(Order::default())
            }
        }

        deserializer.deserialize_any(OrderVisitor)
    }
}

/// Declarative analytics query descriptor
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryRequest {
    #[serde(default)]
    pub measures: Vec<String>,
    #[serde(default)]
    pub dimensions: Vec<String>,
    #[serde(default)]
    pub time_dimensions: Vec<TimeDimensionRequest>,
    #[serde(default)]
    pub filters: Vec<FilterRequest>,
    #[serde(default, skip_serializing_if = "Order::is_empty")]
    pub order: Order,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<u64>,
}
