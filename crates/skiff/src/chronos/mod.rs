pub mod client;
pub mod descriptor;

pub use client::{ChronosClient, JobScheduler};
pub use descriptor::{ChronosJob, DescriptorBuilder, TaskRequest};
