//! Security Injector (verb module)
//!
//! Appends a tenant predicate for every cube a plan reads. A plan is never
//! returned unless every referenced cube was secured.

mod context;
mod error;
mod inject;

pub use context::SecurityContext;
pub use error::SecurityError;
pub use inject::{inject, Securable};
