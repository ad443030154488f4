//! Plan types (noun module)
//!
//! The abstract, dialect-free output of the compiler: a predicate/aggregate
//! expression tree plus the join, grouping, ordering and paging around it.

mod expr;
mod funnel_plan;
mod query_plan;

pub use expr::{AggregateExpr, BinaryOperator, Column, Expr, Literal, MatchKind};
pub use funnel_plan::{FunnelPlan, BINDING_KEY_COLUMN, EVENT_TIME_COLUMN, STEP_INDEX_COLUMN};
pub use query_plan::{
    GroupKey, JoinStep, QueryPlan, SortDirection, SortKey, TableRef, TenantPredicate,
};
