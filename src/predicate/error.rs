use thiserror::Error;

use crate::daterange::DateRangeError;
use crate::query::FilterOperator;
use crate::semantic_model::ValueKind;

/// Errors raised while turning a filter clause into a predicate
#[derive(Debug, Error, Clone, PartialEq)]
pub enum FilterError {
    #[error("filter on '{member}': operator '{operator}' takes no values")]
    UnexpectedValues {
        member: String,
        operator: FilterOperator,
    },

    #[error("filter on '{member}': operator '{operator}' requires at least one value")]
    MissingValues {
        member: String,
        operator: FilterOperator,
    },

    #[error("filter on '{member}': operator '{operator}' takes {expected} value(s), got {got}")]
    Arity {
        member: String,
        operator: FilterOperator,
        expected: &'static str,
        got: usize,
    },

    #[error("filter on '{member}': operator '{operator}' cannot be applied to a {kind} member")]
    IncompatibleType {
        member: String,
        operator: FilterOperator,
        kind: ValueKind,
    },

    #[error("filter on '{member}': invalid value {value}: {reason}")]
    InvalidValue {
        member: String,
        value: String,
        reason: String,
    },

    #[error("filter on '{member}': {source}")]
    DateRange {
        member: String,
        #[source]
        source: DateRangeError,
    },

    #[error("filter group is empty")]
    EmptyGroup,

    #[error("filter group mixes measures and dimensions: {0}")]
    MixedGroup(String),
}
