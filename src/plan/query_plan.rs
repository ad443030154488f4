//! Compiled query plan

use serde::{Deserialize, Serialize};

use super::expr::{AggregateExpr, Column, Expr};
use crate::query::Granularity;
use crate::semantic_model::Relationship;

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SortDirection {
    #[serde(rename = "asc")]
    Ascending,
    #[serde(rename = "desc")]
    Descending,
}

/// The cube a plan reads from, with its physical relation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableRef {
    pub cube: String,
    pub table: String,
}

/// One left outer join onto a cube already present in the plan
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinStep {
    /// Cube being joined in
    pub cube: String,
    /// Physical relation of that cube
    pub table: String,
    /// Declared relationship, oriented from the left side
    pub relationship: Relationship,
    /// Key on the cube already in the plan
    pub left_key: Column,
    /// Key on the joined cube
    pub right_key: Column,
}

/// A GROUP BY key and the output column it produces
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupKey {
    pub alias: String,
    pub expr: Expr,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub granularity: Option<Granularity>,
}

/// A sort key with direction
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SortKey {
    /// Output column name to sort by
    pub column: String,
    pub direction: SortDirection,
}

/// Tenant predicate contributed by one cube's tenant filter
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TenantPredicate {
    pub cube: String,
    pub predicate: Expr,
}

/// The compiled result handed to an execution engine.
///
/// `filter` is the full WHERE tree: user dimension filters, resolved time
/// bounds and, once secured, every tenant predicate. `having` holds filters
/// on measures.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryPlan {
    pub from: TableRef,
    pub joins: Vec<JoinStep>,
    pub group_by: Vec<GroupKey>,
    pub aggregates: Vec<AggregateExpr>,
    pub filter: Option<Expr>,
    pub having: Option<Expr>,
    pub order_by: Vec<SortKey>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
    /// Filled by the security injector, one entry per referenced cube
    pub tenant_predicates: Vec<TenantPredicate>,
}

impl QueryPlan {
    /// The primary cube followed by every joined cube, in join order
    pub fn referenced_cubes(&self) -> Vec<&str> {
        std::iter::once(self.from.cube.as_str())
            .chain(self.joins.iter().map(|j| j.cube.as_str()))
            .collect()
    }

    /// True once every referenced cube carries a tenant predicate
    pub fn is_secured(&self) -> bool {
        self.referenced_cubes()
            .iter()
            .all(|cube| self.tenant_predicates.iter().any(|t| t.cube == *cube))
    }

    /// Output column names in select order: group keys, then aggregates
    pub fn output_columns(&self) -> Vec<&str> {
        self.group_by
            .iter()
            .map(|g| g.alias.as_str())
            .chain(self.aggregates.iter().map(|a| a.alias.as_str()))
            .collect()
    }
}
