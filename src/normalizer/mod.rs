//! Query Normalizer (verb module)
//!
//! Validates a request against the registry and produces the canonical
//! [`NormalizedQuery`] the planner consumes.

mod error;
mod normalize;
mod types;

pub use error::NormalizeError;
pub use normalize::normalize_query;
pub use types::{Clause, NormalizedQuery, NormalizedTimeDimension};
