use chrono::{DateTime, Utc};
use std::collections::HashSet;

use super::error::NormalizeError;
use super::types::{Clause, NormalizedQuery, NormalizedTimeDimension};
use crate::daterange::DateRangeResolver;
use crate::plan::{Expr, SortKey};
use crate::predicate::{FilterError, PredicateBuilder};
use crate::query::{FilterRequest, Granularity, QueryRequest, TimeDimensionRequest};
use crate::semantic_model::{Member, Registry};

/// Normalize a query request against a registry
///
/// This turns member paths into registry references, resolves every
/// `dateRange` against `now` and builds every filter predicate.
///
/// # Arguments
/// * `registry` - The sealed cube registry
/// * `request` - The declarative query as received
/// * `resolver` - Date range resolver for the configured timezone
/// * `now` - Reference instant for relative date ranges
pub fn normalize_query<'a>(
    registry: &'a Registry,
    request: &QueryRequest,
    resolver: &DateRangeResolver,
    now: DateTime<Utc>,
) -> Result<NormalizedQuery<'a>, NormalizeError> {
    // 1. Measures and dimensions
    let measures = resolve_members(registry, &request.measures, true)?;
    let dimensions = resolve_members(registry, &request.dimensions, false)?;

    // 2. Time dimensions, with their date ranges resolved
    let time_dimensions = resolve_time_dimensions(registry, &request.time_dimensions, resolver, now)?;

    if measures.is_empty() && dimensions.is_empty() {
        return Err(NormalizeError::EmptyQuery);
    }

    // 3. Filters, split into WHERE and HAVING
    let builder = PredicateBuilder::new(resolver, now);
    let mut where_filters = Vec::new();
    let mut having_filters = Vec::new();
    let mut filter_members = Vec::new();
    for filter in &request.filters {
        let (expr, clause) = normalize_filter(registry, &builder, filter, &mut filter_members)?;
        match clause {
            Clause::Where => where_filters.push(expr),
            Clause::Having => having_filters.push(expr),
        }
    }

    let mut query = NormalizedQuery {
        measures,
        dimensions,
        time_dimensions,
        where_filters,
        having_filters,
        filter_members,
        order: Vec::new(),
        limit: request.limit,
        offset: request.offset,
    };

    // 4. Explicit ordering, checked against the output columns
    query.order = resolve_order(registry, request, &query)?;

    tracing::debug!(
        measures = query.measures.len(),
        dimensions = query.dimensions.len(),
        time_dimensions = query.time_dimensions.len(),
        where_filters = query.where_filters.len(),
        having_filters = query.having_filters.len(),
        "Normalized query"
    );
    Ok(query)
}

fn lookup<'a>(registry: &'a Registry, path: &str) -> Result<Member<'a>, NormalizeError> {
    registry
        .member(path)
        .ok_or_else(|| NormalizeError::UnknownMember(path.to_string()))
}

fn resolve_members<'a>(
    registry: &'a Registry,
    paths: &[String],
    measures: bool,
) -> Result<Vec<Member<'a>>, NormalizeError> {
    let mut seen = HashSet::new();
    paths
        .iter()
        .map(|path| {
            let member = lookup(registry, path)?;
            if member.is_measure() != measures {
                return Err(NormalizeError::WrongMemberKind {
                    member: path.clone(),
                    expected: if measures { "measure" } else { "dimension" },
                });
            }
            if !seen.insert(path.as_str()) {
                return Err(NormalizeError::DuplicateMember(path.clone()));
            }
            Ok(member)
        })
        .collect()
}

fn resolve_time_dimensions<'a>(
    registry: &'a Registry,
    requests: &[TimeDimensionRequest],
    resolver: &DateRangeResolver,
    now: DateTime<Utc>,
) -> Result<Vec<NormalizedTimeDimension<'a>>, NormalizeError> {
    let mut seen = HashSet::new();
    let mut out = Vec::with_capacity(requests.len());

    for td in requests {
        let member = lookup(registry, &td.dimension)?;
        if !member.as_dimension().is_some_and(|d| d.is_time()) {
            return Err(NormalizeError::WrongMemberKind {
                member: td.dimension.clone(),
                expected: "time dimension",
            });
        }

        // An empty string or empty list means no range; anything else must resolve
        let date_range = match &td.date_range {
            Some(range) if !range.is_empty() => Some(resolver.resolve(range, now).map_err(
                |source| NormalizeError::DateRange {
                    member: td.dimension.clone(),
                    source,
                },
            )?),
            _ => None,
        };

        let normalized = NormalizedTimeDimension {
            member,
            granularity: td.granularity,
            date_range,
        };
        if let Some(alias) = normalized.alias() {
            if !seen.insert(alias.clone()) {
                return Err(NormalizeError::DuplicateMember(alias));
            }
        }
        out.push(normalized);
    }
    Ok(out)
}

/// Build one filter entry, returning its predicate and the clause it belongs to
fn normalize_filter<'a>(
    registry: &'a Registry,
    builder: &PredicateBuilder<'_>,
    filter: &FilterRequest,
    members: &mut Vec<Member<'a>>,
) -> Result<(Expr, Clause), NormalizeError> {
    let (children, is_or) = match filter {
        FilterRequest::Member(f) => {
            let member = lookup(registry, &f.member)?;
            let expr = builder.build(f, &member)?;
            members.push(member);
            return Ok((expr, Clause::of(&member)));
        }
        FilterRequest::And { and } => (and, false),
        FilterRequest::Or { or } => (or, true),
    };

    let mut exprs = Vec::with_capacity(children.len());
    let mut clause = None;
    for child in children {
        let (expr, child_clause) = normalize_filter(registry, builder, child, members)?;
        match clause {
            None => clause = Some(child_clause),
            Some(existing) if existing != child_clause => {
                return Err(FilterError::MixedGroup(filter.members().join(", ")).into());
            }
            Some(_) => {}
        }
        exprs.push(expr);
    }

    let combined = if is_or {
        Expr::or_all(exprs)
    } else {
        Expr::and_all(exprs)
    };
    match (combined, clause) {
        (Some(expr), Some(clause)) => Ok((expr, clause)),
        _ => Err(FilterError::EmptyGroup.into()),
    }
}

fn resolve_order(
    registry: &Registry,
    request: &QueryRequest,
    query: &NormalizedQuery<'_>,
) -> Result<Vec<SortKey>, NormalizeError> {
    let outputs = query.output_aliases();
    let mut order: Vec<SortKey> = Vec::new();

    for (key, direction) in request.order.iter() {
        let column = if outputs.iter().any(|o| o == key) {
            key.clone()
        } else if let Some(alias) = query
            .time_dimensions
            .iter()
            .filter(|td| td.member.path() == *key)
            .find_map(|td| td.alias())
        {
            // `Cube.time` orders by its first grouped bucket
            alias
        } else if is_known_member(registry, key) {
            return Err(NormalizeError::InvalidOrder(key.clone()));
        } else {
            return Err(NormalizeError::UnknownMember(key.clone()));
        };

        if !order.iter().any(|s| s.column == column) {
            order.push(SortKey {
                column,
                direction: *direction,
            });
        }
    }
    Ok(order)
}

/// `Cube.member` or `Cube.member.granularity` naming a registered member
fn is_known_member(registry: &Registry, key: &str) -> bool {
    if registry.member(key).is_some() {
        return true;
    }
    match key.rsplit_once('.') {
        Some((path, granularity)) => {
            granularity.parse::<Granularity>().is_ok() && registry.member(path).is_some()
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::daterange::ResolvedDateRange;
    use crate::plan::SortDirection;
    use crate::query::{DateRangeExpr, FilterOperator, MemberFilter, Order};
    use crate::semantic_model::{Aggregation, Cube, Dimension, Measure, ValueKind};
    use chrono::TimeZone;

    fn registry() -> Registry {
        Registry::builder()
            .cube(
                Cube::new("orders", "public.orders")
                    .measure(Measure::new("count", Aggregation::Count))
                    .measure(Measure::new("revenue", Aggregation::Sum).with_sql("amount"))
                    .dimension(Dimension::new("status", ValueKind::String))
                    .dimension(Dimension::new("createdAt", ValueKind::Time).with_sql("created_at")),
            )
            .build()
            .unwrap()
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 11, 17, 0, 0, 0).unwrap()
    }

    fn normalize<'a>(registry: &'a Registry, request: &QueryRequest) -> Result<NormalizedQuery<'a>, NormalizeError> {
        normalize_query(registry, request, &DateRangeResolver::default(), now())
    }

    #[test]
    fn test_unknown_member() {
        let registry = registry();
        let request = QueryRequest {
            measures: vec!["orders.margin".into()],
            ..Default::default()
        };
        assert_eq!(
            normalize(&registry, &request).unwrap_err(),
            NormalizeError::UnknownMember("orders.margin".into())
        );
    }

    #[test]
    fn test_empty_query() {
        let registry = registry();
        assert_eq!(
            normalize(&registry, &QueryRequest::default()).unwrap_err(),
            NormalizeError::EmptyQuery
        );

        // time dimensions never make a query on their own
        let request = QueryRequest {
            time_dimensions: vec![TimeDimensionRequest::new("orders.createdAt").with_date_range("today")],
            ..Default::default()
        };
        assert_eq!(normalize(&registry, &request).unwrap_err(), NormalizeError::EmptyQuery);

        let request = QueryRequest {
            time_dimensions: vec![TimeDimensionRequest::new("orders.createdAt")
                .with_granularity(Granularity::Day)],
            ..Default::default()
        };
        assert_eq!(normalize(&registry, &request).unwrap_err(), NormalizeError::EmptyQuery);
    }

    #[test]
    fn test_duplicates_rejected() {
        let registry = registry();
        let request = QueryRequest {
            measures: vec!["orders.count".into(), "orders.count".into()],
            ..Default::default()
        };
        assert!(matches!(
            normalize(&registry, &request),
            Err(NormalizeError::DuplicateMember(_))
        ));
    }

    #[test]
    fn test_measure_listed_as_dimension() {
        let registry = registry();
        let request = QueryRequest {
            dimensions: vec!["orders.count".into()],
            ..Default::default()
        };
        assert!(matches!(
            normalize(&registry, &request),
            Err(NormalizeError::WrongMemberKind { expected: "dimension", .. })
        ));
    }

    #[test]
    fn test_literal_range_round_trip() {
        let registry = registry();
        let request = QueryRequest {
            measures: vec!["orders.count".into()],
            time_dimensions: vec![TimeDimensionRequest::new("orders.createdAt")
                .with_date_range(DateRangeExpr::interval("2024-01-01", "2024-12-31"))],
            ..Default::default()
        };
        let query = normalize(&registry, &request).unwrap();
        assert_eq!(
            query.time_dimensions[0].date_range,
            Some(
                ResolvedDateRange::new(
                    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
                    Utc.with_ymd_and_hms(2024, 12, 31, 23, 59, 59).unwrap()
                )
                .unwrap()
            )
        );
    }

    #[test]
    fn test_range_resolves_regardless_of_granularity() {
        let registry = registry();
        let request = QueryRequest {
            measures: vec!["orders.count".into()],
            time_dimensions: vec![TimeDimensionRequest::new("orders.createdAt")
                .with_granularity(Granularity::Week)
                .with_date_range("last 12 weeks")],
            ..Default::default()
        };
        let query = normalize(&registry, &request).unwrap();
        let range = query.time_dimensions[0].date_range.unwrap();
        assert_eq!(range.end, now());
        assert_eq!(range.start, now() - chrono::Duration::days(84));
    }

    #[test]
    fn test_unparseable_range_raises() {
        let registry = registry();
        let request = QueryRequest {
            measures: vec!["orders.count".into()],
            time_dimensions: vec![TimeDimensionRequest::new("orders.createdAt")
                .with_date_range("last twelve weeks")],
            ..Default::default()
        };
        assert!(matches!(
            normalize(&registry, &request),
            Err(NormalizeError::DateRange { .. })
        ));
    }

    #[test]
    fn test_empty_range_means_none() {
        let registry = registry();
        let request = QueryRequest {
            measures: vec!["orders.count".into()],
            time_dimensions: vec![TimeDimensionRequest::new("orders.createdAt")
                .with_date_range(DateRangeExpr::Interval(Vec::new()))],
            ..Default::default()
        };
        let query = normalize(&registry, &request).unwrap();
        assert!(query.time_dimensions[0].date_range.is_none());
    }

    #[test]
    fn test_filters_split_by_clause() {
        let registry = registry();
        let request = QueryRequest {
            measures: vec!["orders.count".into()],
            filters: vec![
                MemberFilter::new("orders.status", FilterOperator::Equals)
                    .with_values(["paid"])
                    .into(),
                MemberFilter::new("orders.revenue", FilterOperator::Gt)
                    .with_values([100])
                    .into(),
            ],
            ..Default::default()
        };
        let query = normalize(&registry, &request).unwrap();
        assert_eq!(query.where_filters.len(), 1);
        assert_eq!(query.having_filters.len(), 1);
        assert_eq!(query.filter_members.len(), 2);
    }

    #[test]
    fn test_mixed_group_rejected() {
        let registry = registry();
        let request = QueryRequest {
            measures: vec!["orders.count".into()],
            filters: vec![FilterRequest::Or {
                or: vec![
                    MemberFilter::new("orders.status", FilterOperator::Set).into(),
                    MemberFilter::new("orders.revenue", FilterOperator::Gt)
                        .with_values([1])
                        .into(),
                ],
            }],
            ..Default::default()
        };
        assert!(matches!(
            normalize(&registry, &request),
            Err(NormalizeError::Filter(FilterError::MixedGroup(_)))
        ));
    }

    #[test]
    fn test_order_resolution() {
        let registry = registry();
        let request = QueryRequest {
            measures: vec!["orders.count".into()],
            time_dimensions: vec![TimeDimensionRequest::new("orders.createdAt")
                .with_granularity(Granularity::Month)],
            order: Order(vec![
                ("orders.createdAt".into(), SortDirection::Ascending),
                ("orders.count".into(), SortDirection::Descending),
            ]),
            ..Default::default()
        };
        let query = normalize(&registry, &request).unwrap();
        let columns: Vec<&str> = query.order.iter().map(|s| s.column.as_str()).collect();
        assert_eq!(columns, vec!["orders.createdAt.month", "orders.count"]);
    }

    #[test]
    fn test_order_by_unselected_member() {
        let registry = registry();
        let request = QueryRequest {
            measures: vec!["orders.count".into()],
            order: Order(vec![("orders.status".into(), SortDirection::Ascending)]),
            ..Default::default()
        };
        assert_eq!(
            normalize(&registry, &request).unwrap_err(),
            NormalizeError::InvalidOrder("orders.status".into())
        );
    }
}
