pub mod context;
pub mod processors;

pub use context::SchedulerContext;
