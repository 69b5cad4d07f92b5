pub mod agent;
pub mod query;
pub mod task;

pub use agent::{AgentClient, LogStream, SandboxReader};
pub use query::{TaskQuery, TaskSource, PAGE_SIZE};
pub use task::{RemoteTask, StateTransition, TaskSet, TaskState};
