//! Semantic model types (nouns)
//!
//! Cube definitions and the sealed registry that holds them.

mod cube;
mod error;
mod registry;
mod tenant;
mod types;

pub use cube::{Cube, Dimension, EventStream, Join, Measure, Relationship};
pub use error::RegistryError;
pub use registry::{split_path, Member, MemberKind, Registry, RegistryBuilder};
pub use tenant::{AttributeFilter, TenantFilter};
pub use types::{Aggregation, ParseAggregationError, ParseValueKindError, ValueKind};
