use thiserror::Error;

use crate::daterange::DateRangeError;
use crate::planner::PlanError;
use crate::predicate::FilterError;

/// Errors raised while compiling or sequencing a funnel
#[derive(Debug, Error, Clone, PartialEq)]
pub enum FunnelError {
    #[error("cube '{cube}' cannot be a funnel's primary cube: {reason}")]
    NotSupported { cube: String, reason: String },

    /// The first step has no predecessor to measure a gap from
    #[error("step '{0}' is the first step and cannot declare timeToConvert")]
    StepOrder(String),

    #[error("a funnel needs at least one step")]
    NoSteps,

    #[error("invalid duration '{value}': {reason}")]
    InvalidDuration { value: String, reason: String },

    #[error("member '{0}' is not defined in the schema")]
    UnknownMember(String),

    #[error("step '{step}' filters on measure '{member}'; steps match events by dimension")]
    MeasureStep { step: String, member: String },

    #[error("step '{step}': {source}")]
    Filter {
        step: String,
        #[source]
        source: FilterError,
    },

    #[error("invalid funnel dateRange: {0}")]
    DateRange(#[source] DateRangeError),

    #[error(transparent)]
    Plan(#[from] PlanError),

    #[error("event for '{key}' names step {step}, but the funnel has {steps} steps")]
    StepOutOfRange { key: String, step: usize, steps: usize },

    #[error("events for '{key}' are not in time order")]
    OutOfOrder { key: String },
}
