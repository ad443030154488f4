//! Predicate Builder (verb module)
//!
//! Converts one member filter into a boolean predicate node, checking
//! operator/value arity and operator/member type compatibility first.

mod build;
mod error;

pub use build::{between, PredicateBuilder};
pub use error::FilterError;
