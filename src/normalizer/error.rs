use thiserror::Error;

use crate::daterange::DateRangeError;
use crate::predicate::FilterError;

/// Errors raised while validating a query against the registry
#[derive(Debug, Error, Clone, PartialEq)]
pub enum NormalizeError {
    #[error("member '{0}' is not defined in the schema")]
    UnknownMember(String),

    #[error("query must have at least one measure, dimension or time dimension with a granularity")]
    EmptyQuery,

    #[error("member '{0}' is listed more than once")]
    DuplicateMember(String),

    #[error("'{member}' is not a {expected}")]
    WrongMemberKind {
        member: String,
        expected: &'static str,
    },

    #[error("invalid dateRange on '{member}': {source}")]
    DateRange {
        member: String,
        #[source]
        source: DateRangeError,
    },

    #[error(transparent)]
    Filter(#[from] FilterError),

    #[error("cannot order by '{0}': it is not part of the query output")]
    InvalidOrder(String),
}
