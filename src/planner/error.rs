//! Planner errors

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PlanError {
    /// No member to pick a primary cube from
    #[error("query must have at least one measure or dimension")]
    EmptyQuery,

    /// No chain of declared joins connects the two cubes
    #[error("cube '{to}' cannot be reached from '{from}' through declared joins")]
    UnreachableCube { from: String, to: String },

    #[error("cube '{0}' is not registered")]
    UnknownCube(String),
}
