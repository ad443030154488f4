//! Query planner (verb module)
//!
//! Transforms a NormalizedQuery into an unsecured QueryPlan.

mod build;
mod error;
mod join;

pub use build::plan_query;
pub use error::PlanError;
pub use join::plan_joins;
