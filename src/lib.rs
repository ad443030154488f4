//! cubeplan - Compile analytics queries and funnels into tenant-isolated query plans
//!
//! This library provides:
//! - Cube definitions and a sealed, validated registry
//! - Schema and config parsing from YAML
//! - Date range resolution (`last 7 days`, `this quarter`, literal intervals)
//! - Query normalization and predicate building
//! - Logical plan generation with join-path search
//! - Mandatory tenant isolation
//! - Funnel compilation and per-entity sequencing
//!
//! The output is an abstract plan tree; executing it is left to an engine.
//!
//! # Architecture
//!
//! **Noun modules** (data structures):
//! - `semantic_model/` - domain concepts (Cube, Measure, Dimension, Join, Registry)
//! - `query/` - request types (QueryRequest, FilterRequest, FunnelRequest)
//! - `plan/` - plan types (QueryPlan, FunnelPlan, Expr, Column)
//!
//! **Verb modules** (transformations):
//! - `parser/` - YAML → Registry / CompilerConfig
//! - `daterange/` - DateRangeExpr + now → ResolvedDateRange
//! - `predicate/` - MemberFilter → Expr
//! - `normalizer/` - Registry + QueryRequest → NormalizedQuery
//! - `planner/` - NormalizedQuery → QueryPlan
//! - `security/` - Plan + SecurityContext → secured Plan
//! - `funnel/` - FunnelRequest → FunnelPlan, events → FunnelResult
//!
//! # Example
//!
//! ```ignore
//! use cubeplan::{parser, Compiler, QueryRequest, SecurityContext};
//!
//! let registry = parser::parse_file("schema.yaml")?;
//! let compiler = Compiler::new(registry);
//! let request: QueryRequest = serde_json::from_str(r#"{"measures": ["orders.count"]}"#)?;
//! let ctx = SecurityContext::new().with("organizationId", "org-42");
//! let plan = compiler.compile(&request, Some(&ctx))?;
//! ```

pub mod config;
pub mod semantic_model;
pub mod query;
pub mod plan;
pub mod parser;
pub mod daterange;
pub mod predicate;
pub mod normalizer;
pub mod planner;
pub mod security;
pub mod funnel;
pub mod compiler;
pub mod error;

// Re-export commonly used types
pub use config::{CompilerConfig, WeekStart};
pub use semantic_model::{Aggregation, Cube, Dimension, Join, Measure, Registry, RegistryBuilder, Relationship, TenantFilter, ValueKind};
pub use query::{DateRangeExpr, FilterOperator, FilterRequest, FunnelRequest, Granularity, MemberFilter, QueryRequest, TimeDimensionRequest};
pub use plan::{Column, Expr, FunnelPlan, Literal, QueryPlan};
pub use daterange::{DateRangeError, DateRangeResolver, ResolvedDateRange};
pub use predicate::{FilterError, PredicateBuilder};
pub use normalizer::{normalize_query, NormalizeError, NormalizedQuery};
pub use planner::{plan_query, PlanError};
pub use security::{inject, SecurityContext, SecurityError};
pub use funnel::{compile_funnel, run_funnel, CompiledFunnel, FunnelDefinition, FunnelEngine, FunnelError, FunnelEvent, FunnelResult};
pub use compiler::Compiler;
pub use error::{CompileError, ErrorKind, ParseError};
