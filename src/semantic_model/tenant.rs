//! Per-cube tenant filters

use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

use crate::plan::{Expr, Literal};
use crate::security::{SecurityContext, SecurityError};

type TenantFn = dyn Fn(&SecurityContext) -> Result<Expr, SecurityError> + Send + Sync;

/// Builds the tenant predicate for one cube from a security context.
///
/// Declarative filters compare a column with one context attribute; custom
/// filters are arbitrary functions registered in code.
#[derive(Clone)]
pub enum TenantFilter {
    /// `cube.column = context[context_key]` (or IN for array attributes)
    Attribute(AttributeFilter),
    /// Caller-provided function
    Custom(Arc<TenantFn>),
}

/// Declarative `{ column, contextKey }` tenant filter
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributeFilter {
    pub column: String,
    pub context_key: String,
}

impl TenantFilter {
    pub fn attribute(column: impl Into<String>, context_key: impl Into<String>) -> Self {
        TenantFilter::Attribute(AttributeFilter {
            column: column.into(),
            context_key: context_key.into(),
        })
    }

    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(&SecurityContext) -> Result<Expr, SecurityError> + Send + Sync + 'static,
    {
        TenantFilter::Custom(Arc::new(f))
    }

    /// Produce the predicate for `cube` under `ctx`
    pub fn apply(&self, cube: &str, ctx: &SecurityContext) -> Result<Expr, SecurityError> {
        match self {
            TenantFilter::Attribute(attr) => attr.apply(cube, ctx),
            TenantFilter::Custom(f) => f(ctx),
        }
    }
}

impl AttributeFilter {
    fn apply(&self, cube: &str, ctx: &SecurityContext) -> Result<Expr, SecurityError> {
        let value = ctx.get(&self.context_key).ok_or_else(|| {
            SecurityError::tenant(
                cube,
                format!("security context has no '{}' attribute", self.context_key),
            )
        })?;
        let column = Expr::column(cube, &self.column);

        match value {
            Value::Array(items) => {
                if items.is_empty() {
                    return Err(SecurityError::tenant(
                        cube,
                        format!("security context attribute '{}' is an empty list", self.context_key),
                    ));
                }
                let values = items
                    .iter()
                    .map(|v| scalar_literal(cube, &self.context_key, v))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Expr::InList {
                    expr: Box::new(column),
                    values,
                    negated: false,
                })
            }
            scalar => {
                let literal = scalar_literal(cube, &self.context_key, scalar)?;
                Ok(Expr::eq(column, Expr::Literal(literal)))
            }
        }
    }
}

fn scalar_literal(cube: &str, key: &str, value: &Value) -> Result<Literal, SecurityError> {
    match value {
        Value::String(s) => Ok(Literal::String(s.clone())),
        Value::Bool(b) => Ok(Literal::Bool(*b)),
        Value::Number(n) => match n.as_i64() {
            Some(i) => Ok(Literal::Int(i)),
            None => n.as_f64().map(Literal::Float).ok_or_else(|| {
                SecurityError::tenant(cube, format!("attribute '{}' is not a finite number", key))
            }),
        },
        Value::Null | Value::Array(_) | Value::Object(_) => Err(SecurityError::tenant(
            cube,
            format!("attribute '{}' must be a string, number or boolean", key),
        )),
    }
}

impl fmt::Debug for TenantFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TenantFilter::Attribute(attr) => f.debug_tuple("Attribute").field(attr).finish(),
            TenantFilter::Custom(_) => f.write_str("Custom(<fn>)"),
        }
    }
}

// Schema files can only declare attribute filters
impl<'de> Deserialize<'de> for TenantFilter {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        AttributeFilter::deserialize(deserializer).map(TenantFilter::Attribute)
    }
}
