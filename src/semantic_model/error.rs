use thiserror::Error;

/// Errors found while sealing a registry
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("cube '{0}' is registered more than once")]
    DuplicateCube(String),

    #[error("cube '{cube}' declares member '{member}' more than once")]
    DuplicateMember { cube: String, member: String },

    #[error("cube '{cube}' has an invalid name '{name}' (must be non-empty and contain no '.')")]
    InvalidName { cube: String, name: String },

    #[error("cube '{cube}' joins unknown cube '{target}'")]
    UnknownJoinTarget { cube: String, target: String },

    #[error("measure '{cube}.{measure}' needs a source column")]
    MissingMeasureColumn { cube: String, measure: String },

    #[error("cube '{cube}' has invalid event stream metadata: {reason}")]
    InvalidEventStream { cube: String, reason: String },
}
