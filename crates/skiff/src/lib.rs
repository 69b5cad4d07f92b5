pub mod backend;
pub mod chronos;
pub mod config;
pub mod logging;
pub mod mesos;
pub mod monitor;
pub mod naming;
pub mod run;
pub mod schedule;
pub mod spinner;
pub mod viewer;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("{0}")]
    Validation(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Template error: {0}")]
    Template(String),
    #[error("failed to launch command: {0}")]
    Submission(String),
    #[error("failed to query scheduler tasks: {0}")]
    Query(String),
    #[error("cannot fetch logs: {0}")]
    LogUnavailable(String),
    #[error("task incomplete: {0}")]
    IncompleteTask(String),
    #[error("could not clean up task: {0}")]
    CleanupNotFound(String),
    #[error("failed to delete job: {0}")]
    Cleanup(String),
    #[error("task failed: {duration:.2} seconds")]
    TaskFailed { duration: f64 },
    #[error("task killed: {duration:.2} seconds")]
    TaskKilled { duration: f64 },
    #[error("task state unhandled: {0}")]
    UnhandledState(String),
    #[error("could not fetch current release tag: {0}")]
    TagLookup(String),
    #[error("Kubernetes error: {0}")]
    Kubernetes(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    SerdeJson(#[from] serde_json::Error),
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
