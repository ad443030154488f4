//! Crate-level errors
//!
//! Each verb module owns its error type; [`CompileError`] wraps them for
//! callers that drive the whole pipeline and classifies them by [`ErrorKind`].

use std::fmt;
use thiserror::Error;

use crate::daterange::DateRangeError;
use crate::funnel::FunnelError;
use crate::normalizer::NormalizeError;
use crate::planner::PlanError;
use crate::predicate::FilterError;
use crate::security::SecurityError;
use crate::semantic_model::RegistryError;

/// Errors that can occur while loading schema or config files
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("failed to read '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid schema: {0}")]
    Registry(#[from] RegistryError),
}

/// Any failure to compile a query or funnel
#[derive(Debug, Error)]
pub enum CompileError {
    #[error(transparent)]
    Normalize(#[from] NormalizeError),

    #[error(transparent)]
    Plan(#[from] PlanError),

    #[error(transparent)]
    Security(#[from] SecurityError),

    #[error(transparent)]
    Funnel(#[from] FunnelError),

    #[error(transparent)]
    DateRange(#[from] DateRangeError),

    #[error(transparent)]
    Filter(#[from] FilterError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Parse(#[from] ParseError),
}

/// Caller-facing classification of a [`CompileError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    UnknownMember,
    EmptyQuery,
    InvalidFilter,
    InvalidDateRange,
    UnreachableCube,
    MissingSecurityContext,
    TenantFilter,
    FunnelNotSupported,
    FunnelStepOrder,
    /// Structurally invalid query (duplicates, wrong member kinds, bad order)
    InvalidQuery,
    /// Structurally invalid funnel (no steps, bad durations, bad event rows)
    InvalidFunnel,
    /// Schema or config could not be loaded
    Schema,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::UnknownMember => "UnknownMemberError",
            ErrorKind::EmptyQuery => "EmptyQueryError",
            ErrorKind::InvalidFilter => "InvalidFilterError",
            ErrorKind::InvalidDateRange => "InvalidDateRangeError",
            ErrorKind::UnreachableCube => "UnreachableCubeError",
            ErrorKind::MissingSecurityContext => "MissingSecurityContextError",
            ErrorKind::TenantFilter => "TenantFilterError",
            ErrorKind::FunnelNotSupported => "FunnelNotSupportedError",
            ErrorKind::FunnelStepOrder => "FunnelStepOrderError",
            ErrorKind::InvalidQuery => "InvalidQueryError",
            ErrorKind::InvalidFunnel => "InvalidFunnelError",
            ErrorKind::Schema => "SchemaError",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl CompileError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CompileError::Normalize(e) => normalize_kind(e),
            CompileError::Plan(e) => plan_kind(e),
            CompileError::Security(SecurityError::MissingSecurityContext) => {
                ErrorKind::MissingSecurityContext
            }
            CompileError::Security(SecurityError::TenantFilter { .. }) => ErrorKind::TenantFilter,
            CompileError::Funnel(e) => funnel_kind(e),
            CompileError::DateRange(_) => ErrorKind::InvalidDateRange,
            CompileError::Filter(e) => filter_kind(e),
            CompileError::Registry(_) | CompileError::Parse(_) => ErrorKind::Schema,
        }
    }
}

fn filter_kind(e: &FilterError) -> ErrorKind {
    match e {
        FilterError::DateRange { .. } => ErrorKind::InvalidDateRange,
        _ => ErrorKind::InvalidFilter,
    }
}

fn plan_kind(e: &PlanError) -> ErrorKind {
    match e {
        PlanError::EmptyQuery => ErrorKind::EmptyQuery,
        PlanError::UnreachableCube { .. } => ErrorKind::UnreachableCube,
        PlanError::UnknownCube(_) => ErrorKind::UnknownMember,
    }
}

fn normalize_kind(e: &NormalizeError) -> ErrorKind {
    match e {
        NormalizeError::UnknownMember(_) => ErrorKind::UnknownMember,
        NormalizeError::EmptyQuery => ErrorKind::EmptyQuery,
        NormalizeError::DateRange { .. } => ErrorKind::InvalidDateRange,
        NormalizeError::Filter(f) => filter_kind(f),
        NormalizeError::DuplicateMember(_)
        | NormalizeError::WrongMemberKind { .. }
        | NormalizeError::InvalidOrder(_) => ErrorKind::InvalidQuery,
    }
}

fn funnel_kind(e: &FunnelError) -> ErrorKind {
    match e {
        FunnelError::NotSupported { .. } => ErrorKind::FunnelNotSupported,
        FunnelError::StepOrder(_) => ErrorKind::FunnelStepOrder,
        FunnelError::UnknownMember(_) => ErrorKind::UnknownMember,
        FunnelError::MeasureStep { .. } => ErrorKind::InvalidFilter,
        FunnelError::Filter { source, .. } => filter_kind(source),
        FunnelError::DateRange(_) => ErrorKind::InvalidDateRange,
        FunnelError::Plan(p) => plan_kind(p),
        FunnelError::NoSteps
        | FunnelError::InvalidDuration { .. }
        | FunnelError::StepOutOfRange { .. }
        | FunnelError::OutOfOrder { .. } => ErrorKind::InvalidFunnel,
    }
}
