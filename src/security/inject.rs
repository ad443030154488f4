//! Tenant predicate injection

use super::context::SecurityContext;
use super::error::SecurityError;
use crate::plan::{Expr, FunnelPlan, QueryPlan, TenantPredicate};
use crate::semantic_model::Registry;

/// A compiled plan that can carry tenant predicates
pub trait Securable {
    /// Every cube the plan reads, primary cube first
    fn cubes(&self) -> Vec<String>;

    fn tenant_predicates(&self) -> &[TenantPredicate];

    /// AND `predicates` into the plan's WHERE tree and record them
    fn attach(&mut self, predicates: Vec<TenantPredicate>);
}

/// Secure `plan` for the tenant described by `ctx`.
///
/// Every referenced cube must declare a tenant filter and that filter must
/// accept `ctx`; otherwise no plan is returned. Cubes that already carry a
/// predicate are left alone, so injecting twice is harmless.
pub fn inject<P: Securable>(
    mut plan: P,
    registry: &Registry,
    ctx: Option<&SecurityContext>,
) -> Result<P, SecurityError> {
    let Some(ctx) = ctx else {
        tracing::warn!("Refusing to build a plan without a security context");
        return Err(SecurityError::MissingSecurityContext);
    };

    let mut predicates = Vec::new();
    for cube_name in plan.cubes() {
        if plan.tenant_predicates().iter().any(|t| t.cube == cube_name) {
            continue;
        }
        let predicate = tenant_predicate(registry, &cube_name, ctx).map_err(|e| {
            tracing::warn!(cube = %cube_name, error = %e, "Refusing to build an unsecured plan");
            e
        })?;
        predicates.push(TenantPredicate {
            cube: cube_name,
            predicate,
        });
    }

    tracing::debug!(predicates = predicates.len(), "Injected tenant predicates");
    plan.attach(predicates);
    Ok(plan)
}

fn tenant_predicate(
    registry: &Registry,
    cube_name: &str,
    ctx: &SecurityContext,
) -> Result<Expr, SecurityError> {
    let cube = registry
        .get_cube(cube_name)
        .ok_or_else(|| SecurityError::tenant(cube_name, "cube is not registered"))?;
    let filter = cube
        .tenant_filter
        .as_ref()
        .ok_or_else(|| SecurityError::tenant(cube_name, "cube declares no tenant filter"))?;
    filter.apply(cube_name, ctx)
}

fn and_into(filter: &mut Option<Expr>, predicates: &[TenantPredicate]) {
    *filter = Expr::and_all(
        filter
            .take()
            .into_iter()
            .chain(predicates.iter().map(|t| t.predicate.clone())),
    );
}

impl Securable for QueryPlan {
    fn cubes(&self) -> Vec<String> {
        self.referenced_cubes().into_iter().map(String::from).collect()
    }

    fn tenant_predicates(&self) -> &[TenantPredicate] {
        &self.tenant_predicates
    }

    fn attach(&mut self, predicates: Vec<TenantPredicate>) {
        and_into(&mut self.filter, &predicates);
        self.tenant_predicates.extend(predicates);
    }
}

impl Securable for FunnelPlan {
    fn cubes(&self) -> Vec<String> {
        self.referenced_cubes().into_iter().map(String::from).collect()
    }

    fn tenant_predicates(&self) -> &[TenantPredicate] {
        &self.tenant_predicates
    }

    fn attach(&mut self, predicates: Vec<TenantPredicate>) {
        and_into(&mut self.filter, &predicates);
        self.tenant_predicates.extend(predicates);
    }
}
