//! Integration tests for query compilation
//!
//! Request JSON in, secured plan out: primary cube selection, join paths,
//! grouping, filters, ordering and paging.

mod common;

use common::{analytics_compiler, conjuncts, has_tenant_predicate, now, request, tenant, utc};
use cubeplan::plan::{BinaryOperator, GroupKey, Literal, SortDirection, SortKey};
use cubeplan::{Aggregation, Column, ErrorKind, Expr, Granularity, Relationship};

#[test]
fn test_measure_and_dimension_on_one_cube() {
    let compiler = analytics_compiler();
    let req = request(r#"{"measures": ["orders.count"], "dimensions": ["orders.status"]}"#);

    let plan = compiler.compile_at(&req, Some(&tenant("org-1")), now()).unwrap();

    assert_eq!(plan.from.cube, "orders");
    assert_eq!(plan.from.table, "public.orders");
    assert!(plan.joins.is_empty(), "Single-cube query needs no joins");
    assert_eq!(plan.output_columns(), vec!["orders.status", "orders.count"]);
    assert_eq!(plan.aggregates[0].func, Aggregation::Count);
    assert!(plan.aggregates[0].expr.is_none());

    // Default order: first measure descending
    assert_eq!(
        plan.order_by,
        vec![SortKey {
            column: "orders.count".into(),
            direction: SortDirection::Descending,
        }]
    );
}

#[test]
fn test_dimension_on_joined_cube() {
    let compiler = analytics_compiler();
    let req = request(
        r#"{"measures": ["orders.revenue", "orders.buyers"], "dimensions": ["users.country", "products.category"]}"#,
    );

    let plan = compiler.compile_at(&req, Some(&tenant("org-1")), now()).unwrap();

    assert_eq!(plan.from.cube, "orders");
    assert_eq!(plan.referenced_cubes(), vec!["orders", "users", "products"]);

    let users = &plan.joins[0];
    assert_eq!(users.relationship, Relationship::ManyToOne);
    assert_eq!(users.left_key, Column::new("orders", "user_id"));
    assert_eq!(users.right_key, Column::new("users", "id"));

    assert_eq!(plan.aggregates[1].func, Aggregation::CountDistinct);
    assert_eq!(plan.aggregates[1].expr, Some(Expr::column("orders", "user_id")));
}

#[test]
fn test_reverse_join_from_dimension_only_query() {
    let compiler = analytics_compiler();
    // users declares no joins; orders declares users, so the edge is walked backwards
    let req = request(r#"{"measures": ["users.count"], "dimensions": ["orders.status"]}"#);

    let plan = compiler.compile_at(&req, Some(&tenant("org-1")), now()).unwrap();

    assert_eq!(plan.from.cube, "users");
    assert_eq!(plan.joins.len(), 1);
    assert_eq!(plan.joins[0].cube, "orders");
    assert_eq!(plan.joins[0].relationship, Relationship::OneToMany);
    assert_eq!(plan.joins[0].left_key, Column::new("users", "id"));
    assert_eq!(plan.joins[0].right_key, Column::new("orders", "user_id"));
}

#[test]
fn test_time_dimension_grouping_and_range() {
    let compiler = analytics_compiler();
    let req = request(
        r#"{
            "measures": ["orders.revenue"],
            "timeDimensions": [{
                "dimension": "orders.createdAt",
                "granularity": "month",
                "dateRange": ["2024-01-01", "2024-12-31"]
            }]
        }"#,
    );

    let plan = compiler.compile_at(&req, Some(&tenant("org-1")), now()).unwrap();

    assert_eq!(
        plan.group_by,
        vec![GroupKey {
            alias: "orders.createdAt.month".into(),
            expr: Expr::DateTrunc {
                granularity: Granularity::Month,
                expr: Box::new(Expr::column("orders", "created_at")),
            },
            granularity: Some(Granularity::Month),
        }]
    );

    let range = Expr::Between {
        expr: Box::new(Expr::column("orders", "created_at")),
        low: Box::new(Expr::Literal(Literal::Timestamp(utc(2024, 1, 1, 0, 0, 0)))),
        high: Box::new(Expr::Literal(Literal::Timestamp(utc(2024, 12, 31, 23, 59, 59)))),
    };
    assert!(conjuncts(plan.filter.as_ref()).contains(&&range));
}

#[test]
fn test_time_dimension_without_granularity_only_filters() {
    let compiler = analytics_compiler();
    let req = request(
        r#"{
            "measures": ["orders.count"],
            "timeDimensions": [{"dimension": "orders.createdAt", "dateRange": "last 7 days"}]
        }"#,
    );

    let plan = compiler.compile_at(&req, Some(&tenant("org-1")), now()).unwrap();

    assert!(plan.group_by.is_empty());
    let bounded = conjuncts(plan.filter.as_ref())
        .into_iter()
        .any(|e| matches!(e, Expr::Between { expr, .. } if **expr == Expr::column("orders", "created_at")));
    assert!(bounded, "Date range should bound the time column");
}

#[test]
fn test_time_dimensions_alone_are_an_empty_query() {
    let compiler = analytics_compiler();
    let req = request(r#"{"timeDimensions": [{"dimension": "orders.createdAt", "granularity": "day"}]}"#);

    let err = compiler.compile_at(&req, Some(&tenant("org-1")), now()).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::EmptyQuery);
}

#[test]
fn test_dimension_filters_go_to_where_and_measure_filters_to_having() {
    let compiler = analytics_compiler();
    let req = request(
        r#"{
            "measures": ["orders.revenue"],
            "dimensions": ["orders.status"],
            "filters": [
                {"member": "users.country", "operator": "equals", "values": ["US"]},
                {"member": "orders.revenue", "operator": "gt", "values": [1000]}
            ]
        }"#,
    );

    let plan = compiler.compile_at(&req, Some(&tenant("org-1")), now()).unwrap();

    // Filtering on users pulls it into the join tree
    assert_eq!(plan.referenced_cubes(), vec!["orders", "users"]);

    let country = Expr::binary(
        Expr::column("users", "country"),
        BinaryOperator::Eq,
        Expr::Literal(Literal::String("US".into())),
    );
    assert!(conjuncts(plan.filter.as_ref()).contains(&&country));

    let having = plan.having.expect("measure filter should land in HAVING");
    assert!(matches!(having, Expr::BinaryOp { op: BinaryOperator::Gt, .. }));
}

#[test]
fn test_logical_filter_groups() {
    let compiler = analytics_compiler();
    let req = request(
        r#"{
            "measures": ["orders.count"],
            "filters": [{"or": [
                {"member": "orders.status", "operator": "equals", "values": ["shipped", "delivered"]},
                {"and": [
                    {"member": "orders.amount", "operator": "gte", "values": [100]},
                    {"member": "orders.status", "operator": "notSet"}
                ]}
            ]}]
        }"#,
    );

    let plan = compiler.compile_at(&req, Some(&tenant("org-1")), now()).unwrap();

    let group = conjuncts(plan.filter.as_ref())
        .into_iter()
        .find(|e| matches!(e, Expr::Or(_)))
        .expect("OR group should be in WHERE");
    let Expr::Or(children) = group else { unreachable!() };
    assert_eq!(children.len(), 2);
    assert!(matches!(&children[0], Expr::InList { negated: false, values, .. } if values.len() == 2));
    assert!(matches!(&children[1], Expr::And(inner) if inner.len() == 2));
}

#[test]
fn test_explicit_order_limit_and_offset() {
    let compiler = analytics_compiler();
    let req = request(
        r#"{
            "measures": ["orders.count"],
            "dimensions": ["orders.status"],
            "timeDimensions": [{"dimension": "orders.createdAt", "granularity": "week"}],
            "order": {"orders.createdAt": "asc", "orders.status": "desc"},
            "limit": 50,
            "offset": 100
        }"#,
    );

    let plan = compiler.compile_at(&req, Some(&tenant("org-1")), now()).unwrap();

    assert_eq!(
        plan.order_by,
        vec![
            SortKey {
                column: "orders.createdAt.week".into(),
                direction: SortDirection::Ascending,
            },
            SortKey {
                column: "orders.status".into(),
                direction: SortDirection::Descending,
            },
        ]
    );
    assert_eq!(plan.limit, Some(50));
    assert_eq!(plan.offset, Some(100));
}

#[test]
fn test_every_referenced_cube_is_secured() {
    let compiler = analytics_compiler();
    let req = request(
        r#"{"measures": ["orders.count"], "dimensions": ["users.plan", "products.category"]}"#,
    );

    let plan = compiler.compile_at(&req, Some(&tenant("org-7")), now()).unwrap();

    assert!(plan.is_secured());
    for cube in ["orders", "users", "products"] {
        assert!(
            has_tenant_predicate(plan.filter.as_ref(), cube, "org-7"),
            "Missing tenant predicate for {}",
            cube
        );
    }
}

#[test]
fn test_plan_serializes_for_the_engine() {
    let compiler = analytics_compiler();
    let req = request(r#"{"measures": ["orders.count"], "dimensions": ["orders.status"]}"#);

    let plan = compiler.compile_at(&req, Some(&tenant("org-1")), now()).unwrap();
    let json = serde_json::to_value(&plan).unwrap();

    assert_eq!(json["from"]["cube"], "orders");
    assert!(json["tenantPredicates"].is_array());
    assert!(json.get("groupBy").is_some());
}
