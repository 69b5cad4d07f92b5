use crate::mesos::TaskState;

/// Per-invocation bookkeeping for [`super::TaskMonitor`].
///
/// Owned by the caller of a single run so nothing leaks between runs when
/// the monitor is used as a library.
#[derive(Debug, Clone, Default)]
pub struct MonitorContext {
    pub(crate) viewer_opened: bool,
    pub(crate) last_state: Option<TaskState>,
    /// (task id, sandbox directory) of the task being followed.
    pub(crate) sandbox: Option<(String, String)>,
    pub(crate) crowded_reported: bool,
}

impl MonitorContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Context for runs that must never open a browser.
    pub fn without_viewer() -> Self {
        Self {
            viewer_opened: true,
            ..Self::default()
        }
    }

    pub fn viewer_opened(&self) -> bool {
        self.viewer_opened
    }

    pub fn last_state(&self) -> Option<&TaskState> {
        self.last_state.as_ref()
    }

    /// Record `state`; true when it differs from the previous observation.
    pub fn observe(&mut self, state: &TaskState) -> bool {
        if self.last_state.as_ref() == Some(state) {
            return false;
        }
        self.last_state = Some(state.clone());
        true
    }

    pub(crate) fn cached_sandbox(&self, task_id: &str) -> Option<&str> {
        match &self.sandbox {
            Some((id, directory)) if id == task_id => Some(directory.as_str()),
            _ => None,
        }
    }
}
