pub mod dispatcher;
pub mod scheduler;

pub use dispatcher::{
    DispatchEngine, DispatchEngineConfig, DispatchOutcome, PassOutcome, PassSummary, SkipReason,
};
pub use scheduler::PriorityScheduler;
