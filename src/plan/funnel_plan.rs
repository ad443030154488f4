//! Compiled funnel event-selection plan

use serde::Serialize;

use super::expr::Expr;
use super::query_plan::{JoinStep, SortKey, TableRef, TenantPredicate};

/// Output column carrying the binding-key value
pub const BINDING_KEY_COLUMN: &str = "binding_key";
/// Output column carrying the event time
pub const EVENT_TIME_COLUMN: &str = "event_time";
/// Output column carrying the first matching step index
pub const STEP_INDEX_COLUMN: &str = "step_index";

/// Selects candidate funnel events, one row per event that matches any step,
/// ordered by (binding key, event time).
///
/// The engine reads `(binding_key, event_time, step_index)` rows back and
/// sequences them with [`crate::funnel::FunnelEngine`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FunnelPlan {
    pub from: TableRef,
    pub joins: Vec<JoinStep>,
    pub binding_key: Expr,
    pub event_time: Expr,
    /// CASE WHEN step0 THEN 0 WHEN step1 THEN 1 ... END
    pub step_index: Expr,
    /// One predicate per step, in declared order
    pub step_predicates: Vec<Expr>,
    /// OR of step predicates AND time bounds AND tenant predicates
    pub filter: Option<Expr>,
    pub order_by: Vec<SortKey>,
    pub tenant_predicates: Vec<TenantPredicate>,
}

impl FunnelPlan {
    pub fn referenced_cubes(&self) -> Vec<&str> {
        std::iter::once(self.from.cube.as_str())
            .chain(self.joins.iter().map(|j| j.cube.as_str()))
            .collect()
    }

    pub fn is_secured(&self) -> bool {
        self.referenced_cubes()
            .iter()
            .all(|cube| self.tenant_predicates.iter().any(|t| t.cube == *cube))
    }

    /// Output column names in select order
    pub fn output_columns(&self) -> [&'static str; 3] {
        [BINDING_KEY_COLUMN, EVENT_TIME_COLUMN, STEP_INDEX_COLUMN]
    }
}
