use thiserror::Error;

/// Errors raised while securing a plan
#[derive(Debug, Error)]
pub enum SecurityError {
    /// No security context was supplied
    #[error("a security context is required to compile a query")]
    MissingSecurityContext,

    /// A referenced cube has no tenant filter, or its filter could not be built
    #[error("tenant filter for cube '{cube}' failed: {reason}")]
    TenantFilter { cube: String, reason: String },
}

impl SecurityError {
    pub fn tenant(cube: impl Into<String>, reason: impl Into<String>) -> Self {
        SecurityError::TenantFilter {
            cube: cube.into(),
            reason: reason.into(),
        }
    }
}
