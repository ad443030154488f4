//! Shared test utilities for integration tests

#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use cubeplan::{parser, Compiler, Expr, Registry, SecurityContext};

/// Load a schema fixture from the tests/test_data directory
pub fn load_fixture(name: &str) -> Registry {
    let path = format!("tests/test_data/{}", name);
    parser::parse_file(&path)
        .unwrap_or_else(|e| panic!("Failed to load test data {}: {}", name, e))
}

/// Compiler over the storefront analytics fixture with default config
pub fn analytics_compiler() -> Compiler {
    Compiler::new(load_fixture("analytics.yaml"))
}

/// Security context for tenant `org`
pub fn tenant(org: &str) -> SecurityContext {
    SecurityContext::new().with("organizationId", org)
}

/// Fixed reference instant: Monday 2025-11-17 12:00:00 UTC
pub fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 11, 17, 12, 0, 0).unwrap()
}

pub fn utc(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, h, min, s).unwrap()
}

/// Parse a JSON query descriptor, panicking on malformed test input
pub fn request(json: &str) -> cubeplan::QueryRequest {
    serde_json::from_str(json).unwrap_or_else(|e| panic!("Bad test request {}: {}", json, e))
}

// =============================================================================
// Plan Inspection Utilities
// =============================================================================

/// Flatten a WHERE tree into its top-level conjuncts
pub fn conjuncts(filter: Option<&Expr>) -> Vec<&Expr> {
    match filter {
        None => Vec::new(),
        Some(Expr::And(children)) => children.iter().collect(),
        Some(other) => vec![other],
    }
}

/// Whether the tenant predicate `cube.org_id = org` is among the conjuncts
pub fn has_tenant_predicate(filter: Option<&Expr>, cube: &str, org: &str) -> bool {
    let expected = Expr::eq(
        Expr::column(cube, "org_id"),
        Expr::Literal(cubeplan::Literal::String(org.to_string())),
    );
    conjuncts(filter).into_iter().any(|e| *e == expected)
}
