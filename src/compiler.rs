//! Compiler facade
//!
//! Wires the verb modules together: normalize, plan, then secure. Every
//! request is compiled against one shared, immutable registry, so a
//! `Compiler` can be cloned freely and used from many threads.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::debug;

use crate::config::CompilerConfig;
use crate::daterange::DateRangeResolver;
use crate::error::CompileError;
use crate::funnel::{self, CompiledFunnel};
use crate::normalizer::normalize_query;
use crate::plan::QueryPlan;
use crate::planner::plan_query;
use crate::query::{FunnelRequest, QueryRequest};
use crate::security::{inject, SecurityContext, SecurityError};
use crate::semantic_model::Registry;

#[derive(Debug, Clone)]
pub struct Compiler {
    registry: Arc<Registry>,
    config: CompilerConfig,
}

impl Compiler {
    pub fn new(registry: impl Into<Arc<Registry>>) -> Self {
        Self {
            registry: registry.into(),
            config: CompilerConfig::default(),
        }
    }

    pub fn with_config(mut self, config: CompilerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }

    /// Compile a query against the current wall clock
    pub fn compile(
        &self,
        request: &QueryRequest,
        ctx: Option<&SecurityContext>,
    ) -> Result<QueryPlan, CompileError> {
        self.compile_at(request, ctx, Utc::now())
    }

    /// Compile a query with relative date ranges anchored at `now`.
    ///
    /// # Arguments
    /// * `request` - The declarative query
    /// * `ctx` - The caller's security context; required
    /// * `now` - Reference instant for `today`, `last 7 days` etc.
    pub fn compile_at(
        &self,
        request: &QueryRequest,
        ctx: Option<&SecurityContext>,
        now: DateTime<Utc>,
    ) -> Result<QueryPlan, CompileError> {
        // Refuse early: nothing is compiled for an anonymous caller
        let ctx = ctx.ok_or(SecurityError::MissingSecurityContext)?;
        let resolver = DateRangeResolver::new(&self.config);

        // 1. Validate members and resolve date ranges
        let normalized = normalize_query(&self.registry, request, &resolver, now)?;

        // 2. Pick the primary cube, joins and aggregates
        let plan = plan_query(&normalized, &self.registry)?;

        // 3. Tenant isolation for every cube the plan reads
        let plan = inject(plan, &self.registry, Some(ctx))?;

        debug!(
            primary = %plan.from.cube,
            joins = plan.joins.len(),
            measures = plan.aggregates.len(),
            "Compiled query"
        );
        Ok(plan)
    }

    /// Compile a funnel against the current wall clock
    pub fn compile_funnel(
        &self,
        request: &FunnelRequest,
        ctx: Option<&SecurityContext>,
    ) -> Result<CompiledFunnel, CompileError> {
        self.compile_funnel_at(request, ctx, Utc::now())
    }

    /// Compile a funnel into its definition and secured event-selection plan
    pub fn compile_funnel_at(
        &self,
        request: &FunnelRequest,
        ctx: Option<&SecurityContext>,
        now: DateTime<Utc>,
    ) -> Result<CompiledFunnel, CompileError> {
        let ctx = ctx.ok_or(SecurityError::MissingSecurityContext)?;
        let resolver = DateRangeResolver::new(&self.config);

        let CompiledFunnel { definition, plan } =
            funnel::compile_funnel(&request.funnel, &self.registry, &resolver, now)?;
        let plan = inject(plan, &self.registry, Some(ctx))?;

        debug!(
            primary = %plan.from.cube,
            steps = definition.len(),
            joins = plan.joins.len(),
            "Compiled funnel"
        );
        Ok(CompiledFunnel { definition, plan })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::semantic_model::{Aggregation, Cube, Dimension, Measure, TenantFilter, ValueKind};

    fn compiler() -> Compiler {
        let registry = Registry::builder()
            .cube(
                Cube::new("orders", "public.orders")
                    .measure(Measure::new("count", Aggregation::Count))
                    .dimension(Dimension::new("status", ValueKind::String))
                    .tenant_filter(TenantFilter::attribute("org_id", "organizationId")),
            )
            .build()
            .unwrap();
        Compiler::new(registry)
    }

    fn request() -> QueryRequest {
        QueryRequest {
            measures: vec!["orders.count".into()],
            dimensions: vec!["orders.status".into()],
            ..Default::default()
        }
    }

    #[test]
    fn test_compile_secures_plan() {
        let ctx = SecurityContext::new().with("organizationId", "org-1");
        let plan = compiler().compile(&request(), Some(&ctx)).unwrap();
        assert!(plan.is_secured());
        assert_eq!(plan.tenant_predicates.len(), 1);
    }

    #[test]
    fn test_missing_context_is_refused() {
        let err = compiler().compile(&request(), None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingSecurityContext);
    }

    #[test]
    fn test_errors_surface_with_kind() {
        let ctx = SecurityContext::new().with("organizationId", "org-1");
        let err = compiler()
            .compile(&QueryRequest::default(), Some(&ctx))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::EmptyQuery);
    }
}
