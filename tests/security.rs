//! Integration tests for tenant isolation
//!
//! No plan leaves the compiler without a tenant predicate for every cube it
//! reads; anything that cannot be secured is refused.

mod common;

use common::{analytics_compiler, has_tenant_predicate, load_fixture, now, request, tenant};
use cubeplan::plan::Literal;
use cubeplan::{
    inject, normalize_query, plan_query, Compiler, Cube, DateRangeResolver, Dimension,
    ErrorKind, Expr, Measure, Aggregation, Registry, SecurityContext, SecurityError,
    TenantFilter, ValueKind,
};
use proptest::prelude::*;

proptest! {
    #[test]
    fn prop_tenant_predicate_is_never_omitted(org in "[a-z0-9-]{1,24}", cube_ix in 0usize..3) {
        let compiler = analytics_compiler();
        let (measure, dimension, cube) = [
            ("orders.count", "orders.status", "orders"),
            ("users.count", "users.country", "users"),
            ("orders.count", "products.category", "products"),
        ][cube_ix];
        let req = request(&format!(r#"{{"measures": ["{}"], "dimensions": ["{}"]}}"#, measure, dimension));

        let plan = compiler.compile_at(&req, Some(&tenant(&org)), now()).unwrap();
        prop_assert!(plan.is_secured());
        prop_assert!(has_tenant_predicate(plan.filter.as_ref(), cube, &org));

        let refused = compiler.compile_at(&req, None, now()).unwrap_err();
        prop_assert_eq!(refused.kind(), ErrorKind::MissingSecurityContext);
    }
}

#[test]
fn test_cube_without_tenant_filter_is_refused() {
    let compiler = analytics_compiler();
    let req = request(r#"{"measures": ["auditLog.count"]}"#);

    let err = compiler.compile_at(&req, Some(&tenant("org-1")), now()).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::TenantFilter);
}

#[test]
fn test_context_missing_the_tenant_attribute_is_refused() {
    let compiler = analytics_compiler();
    let req = request(r#"{"measures": ["orders.count"]}"#);
    let ctx = SecurityContext::new().with("userId", 42);

    let err = compiler.compile_at(&req, Some(&ctx), now()).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::TenantFilter);
}

#[test]
fn test_list_attribute_becomes_in_predicate() {
    let compiler = analytics_compiler();
    let req = request(r#"{"measures": ["orders.count"]}"#);
    let ctx = SecurityContext::new().with("organizationId", serde_json::json!(["a", "b"]));

    let plan = compiler.compile_at(&req, Some(&ctx), now()).unwrap();

    assert_eq!(
        plan.tenant_predicates[0].predicate,
        Expr::InList {
            expr: Box::new(Expr::column("orders", "org_id")),
            values: vec![Literal::String("a".into()), Literal::String("b".into())],
            negated: false,
        }
    );
}

#[test]
fn test_injection_is_idempotent() {
    let registry = load_fixture("analytics.yaml");
    let resolver = DateRangeResolver::default();
    let req = request(r#"{"measures": ["orders.count"], "dimensions": ["users.country"]}"#);
    let ctx = tenant("org-1");

    let normalized = normalize_query(&registry, &req, &resolver, now()).unwrap();
    let plan = plan_query(&normalized, &registry).unwrap();
    assert!(!plan.is_secured());

    let once = inject(plan, &registry, Some(&ctx)).unwrap();
    let twice = inject(once.clone(), &registry, Some(&ctx)).unwrap();
    assert_eq!(once, twice);
    assert_eq!(twice.tenant_predicates.len(), 2);
}

#[test]
fn test_inject_without_context() {
    let registry = load_fixture("analytics.yaml");
    let resolver = DateRangeResolver::default();
    let req = request(r#"{"measures": ["orders.count"]}"#);
    let normalized = normalize_query(&registry, &req, &resolver, now()).unwrap();
    let plan = plan_query(&normalized, &registry).unwrap();

    assert!(matches!(
        inject(plan, &registry, None),
        Err(SecurityError::MissingSecurityContext)
    ));
}

#[test]
fn test_custom_tenant_filter() {
    let registry = Registry::builder()
        .cube(
            Cube::new("invoices", "billing.invoices")
                .measure(Measure::new("total", Aggregation::Sum).with_sql("amount"))
                .dimension(Dimension::new("region", ValueKind::String))
                .tenant_filter(TenantFilter::custom(|ctx| {
                    let region = ctx
                        .get("region")
                        .and_then(|v| v.as_str())
                        .ok_or_else(|| SecurityError::tenant("invoices", "no region"))?;
                    Ok(Expr::eq(
                        Expr::column("invoices", "region"),
                        Expr::Literal(Literal::String(region.to_string())),
                    ))
                })),
        )
        .build()
        .unwrap();
    let compiler = Compiler::new(registry);
    let req = request(r#"{"measures": ["invoices.total"]}"#);

    let ctx = SecurityContext::new().with("region", "emea");
    let plan = compiler.compile_at(&req, Some(&ctx), now()).unwrap();
    assert!(plan.is_secured());

    let err = compiler
        .compile_at(&req, Some(&SecurityContext::new().with("tenant", "x")), now())
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TenantFilter);
}
