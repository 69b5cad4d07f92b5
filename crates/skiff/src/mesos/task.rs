use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

use crate::{Error, Result};

/// Lifecycle state of a Mesos task as reported by the master.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TaskState {
    Staging,
    Running,
    Finished,
    Failed,
    Killed,
    Unknown(String),
}

impl TaskState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskState::Finished | TaskState::Failed | TaskState::Killed)
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskState::Staging => write!(f, "TASK_STAGING"),
            TaskState::Running => write!(f, "TASK_RUNNING"),
            TaskState::Finished => write!(f, "TASK_FINISHED"),
            TaskState::Failed => write!(f, "TASK_FAILED"),
            TaskState::Killed => write!(f, "TASK_KILLED"),
            TaskState::Unknown(other) => write!(f, "{}", other),
        }
    }
}

impl From<&str> for TaskState {
    fn from(s: &str) -> Self {
        match s {
            "TASK_STAGING" => TaskState::Staging,
            "TASK_RUNNING" => TaskState::Running,
            "TASK_FINISHED" => TaskState::Finished,
            "TASK_FAILED" => TaskState::Failed,
            "TASK_KILLED" => TaskState::Killed,
            other => TaskState::Unknown(other.to_string()),
        }
    }
}

impl From<String> for TaskState {
    fn from(s: String) -> Self {
        TaskState::from(s.as_str())
    }
}

impl From<TaskState> for String {
    fn from(state: TaskState) -> Self {
        state.to_string()
    }
}

/// A task as listed by the Mesos master. Read-only; fetched fresh on every poll.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteTask {
    pub id: String,
    #[serde(default)]
    pub framework_id: String,
    #[serde(default)]
    pub slave_id: String,
    pub state: TaskState,
    #[serde(default)]
    pub statuses: Vec<StateTransition>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateTransition {
    pub state: TaskState,
    pub timestamp: f64,
    #[serde(default, rename = "container_status", skip_serializing_if = "Option::is_none")]
    pub container: Option<ContainerStatus>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContainerStatus {
    #[serde(default)]
    pub network_infos: Vec<NetworkInfo>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NetworkInfo {
    #[serde(default)]
    pub ip_addresses: Vec<IpAddress>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IpAddress {
    #[serde(rename = "ip_address")]
    pub ip: String,
}

impl RemoteTask {
    /// The job name encoded in the id (`prefix:timestamp:index:NAME:`).
    pub fn task_name(&self) -> Option<&str> {
        let parts: Vec<&str> = self.id.split(':').collect();
        if parts.len() > 2 {
            Some(parts[parts.len() - 2])
        } else {
            None
        }
    }

    pub fn last_transition(&self) -> Option<&StateTransition> {
        self.statuses.last()
    }

    /// IP of the agent running the task; later transitions win.
    pub fn host_ip(&self) -> Result<String> {
        let mut found = None;
        for status in &self.statuses {
            let Some(container) = &status.container else {
                continue;
            };
            for info in &container.network_infos {
                for address in &info.ip_addresses {
                    found = Some(address.ip.clone());
                }
            }
        }
        found
            .filter(|ip| !ip.is_empty())
            .ok_or_else(|| Error::LogUnavailable(format!("could not find agent IP for task {}", self.id)))
    }

    /// Seconds between the final RUNNING transition and the terminal one.
    pub fn duration(&self) -> Result<f64> {
        let statuses = &self.statuses;
        if statuses.len() < 2 {
            return Err(Error::IncompleteTask(format!("task {} did not run properly", self.id)));
        }
        let end = &statuses[statuses.len() - 1];
        let start = &statuses[statuses.len() - 2];
        if !end.state.is_terminal() || start.state != TaskState::Running {
            return Err(Error::IncompleteTask(format!(
                "task {} went {} -> {}",
                self.id, start.state, end.state
            )));
        }
        Ok(end.timestamp - start.timestamp)
    }
}

/// Tasks listed by the master, in scheduler order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskSet {
    #[serde(default)]
    pub tasks: Vec<RemoteTask>,
}

impl TaskSet {
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn filter_by_name(&self, name: &str) -> TaskSet {
        TaskSet {
            tasks: self
                .tasks
                .iter()
                .filter(|task| task.task_name() == Some(name))
                .cloned()
                .collect(),
        }
    }

    /// The most recently active task.
    ///
    /// Ordered by last transition timestamp; tasks with no transitions yet
    /// count as newest, and ties go to the later entry in the listing.
    pub fn newest(&self) -> Option<&RemoteTask> {
        self.tasks.iter().max_by(|a, b| compare_last_seen(a, b))
    }
}

fn compare_last_seen(a: &RemoteTask, b: &RemoteTask) -> Ordering {
    match (a.last_transition(), b.last_transition()) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(x), Some(y)) => x.timestamp.partial_cmp(&y.timestamp).unwrap_or(Ordering::Equal),
    }
}
