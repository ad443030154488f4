//! Plan assembly: joins, grouping, aggregation, filters, ordering, paging

use super::error::PlanError;
use super::join::plan_joins;
use crate::normalizer::NormalizedQuery;
use crate::plan::{
    AggregateExpr, Column, Expr, GroupKey, QueryPlan, SortDirection, SortKey, TableRef,
};
use crate::predicate::between;
use crate::semantic_model::{Cube, Registry};

/// Build an unsecured plan from a normalized query.
///
/// The primary cube owns the first measure, else the first dimension, else
/// the first time dimension. Every other referenced cube is left-joined in
/// along the shortest declared join path.
pub fn plan_query(query: &NormalizedQuery<'_>, registry: &Registry) -> Result<QueryPlan, PlanError> {
    let primary = primary_cube(query).ok_or(PlanError::EmptyQuery)?;

    // 1. Joins
    let joins = plan_joins(
        registry,
        &primary.name,
        query.members().map(|m| m.cube.name.as_str()),
    )?;

    // 2. Grouping keys: dimensions, then time buckets
    let mut group_by: Vec<GroupKey> = query
        .dimensions
        .iter()
        .map(|d| GroupKey {
            alias: d.path(),
            expr: d.expr(),
            granularity: None,
        })
        .collect();
    for td in &query.time_dimensions {
        if let (Some(granularity), Some(alias)) = (td.granularity, td.alias()) {
            group_by.push(GroupKey {
                alias,
                expr: Expr::DateTrunc {
                    granularity,
                    expr: Box::new(td.member.expr()),
                },
                granularity: Some(granularity),
            });
        }
    }

    // 3. One aggregate per measure
    let aggregates: Vec<AggregateExpr> = query
        .measures
        .iter()
        .filter_map(|m| {
            let measure = m.as_measure()?;
            Some(AggregateExpr {
                func: measure.aggregation,
                expr: measure
                    .sql
                    .as_ref()
                    .map(|col| Expr::Column(Column::new(&m.cube.name, col))),
                alias: m.path(),
            })
        })
        .collect();

    // 4. WHERE: user filters AND every resolved time range
    let time_bounds = query.time_dimensions.iter().filter_map(|td| {
        td.date_range.map(|range| between(td.member.expr(), range))
    });
    let filter = Expr::and_all(query.where_filters.iter().cloned().chain(time_bounds));
    let having = Expr::and_all(query.having_filters.iter().cloned());

    // 5. Ordering
    let order_by = if !query.order.is_empty() {
        query.order.clone()
    } else {
        default_order(&aggregates, &group_by)
    };

    let plan = QueryPlan {
        from: TableRef {
            cube: primary.name.clone(),
            table: primary.table.clone(),
        },
        joins,
        group_by,
        aggregates,
        filter,
        having,
        order_by,
        limit: query.limit,
        offset: query.offset,
        tenant_predicates: Vec::new(),
    };

    tracing::debug!(
        primary = %plan.from.cube,
        joins = plan.joins.len(),
        group_keys = plan.group_by.len(),
        measures = plan.aggregates.len(),
        "Planned query"
    );
    Ok(plan)
}

fn primary_cube<'a>(query: &NormalizedQuery<'a>) -> Option<&'a Cube> {
    query
        .measures
        .first()
        .or_else(|| query.dimensions.first())
        .map(|m| m.cube)
}

/// First measure descending, else first grouping key ascending
fn default_order(aggregates: &[AggregateExpr], group_by: &[GroupKey]) -> Vec<SortKey> {
    if let Some(first) = aggregates.first() {
        return vec![SortKey {
            column: first.alias.clone(),
            direction: SortDirection::Descending,
        }];
    }
    group_by
        .first()
        .map(|g| SortKey {
            column: g.alias.clone(),
            direction: SortDirection::Ascending,
        })
        .into_iter()
        .collect()
}
