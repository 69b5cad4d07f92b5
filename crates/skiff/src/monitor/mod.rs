pub mod context;
pub mod engine;

pub use context::MonitorContext;
pub use engine::{TaskMonitor, TaskOutcome, MIN_POLL_INTERVAL};
