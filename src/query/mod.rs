//! Query request types (noun module)
//!
//! The declarative descriptors callers send: analytics queries and funnels.

mod filter;
mod funnel;
mod granularity;
mod request;

pub use filter::{FilterOperator, FilterRequest, MemberFilter};
pub use funnel::{FunnelRequest, FunnelSpec, FunnelStepSpec};
pub use granularity::{Granularity, ParseGranularityError};
pub use request::{DateRangeExpr, Order, QueryRequest, TimeDimensionRequest};
