//! Funnel engine (verb module)
//!
//! Compiles a funnel descriptor into an event-selection plan and sequences
//! the selected events per entity into step counts.

mod definition;
mod duration;
mod engine;
mod error;

pub use definition::{compile_funnel, CompiledFunnel, FunnelDefinition, FunnelStep};
pub use duration::parse_duration;
pub use engine::{
    advance, run_funnel, EntityProgress, FunnelEngine, FunnelEvent, FunnelResult,
    FunnelStepResult, FunnelTally, StepState, TimeToConvert,
};
pub use error::FunnelError;
