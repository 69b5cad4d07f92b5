//! Lifecycle monitor for a submitted one-off task.
//!
//! The scheduler offers no push channel, so the monitor re-lists the tasks
//! matching the job name on a fixed interval. The run's task is the one that
//! shows up beyond the baseline count captured before submission; from then
//! on its state drives what happens:
//!
//! ```text
//! STAGING -> RUNNING -> FINISHED | FAILED -> cleaned up
//!            RUNNING -> KILLED            -> cleaned up
//! anything else                           -> unhandled, left alone
//! ```

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::context::MonitorContext;
use crate::chronos::JobScheduler;
use crate::mesos::{LogStream, RemoteTask, SandboxReader, TaskSource, TaskState};
use crate::spinner::Spinner;
use crate::viewer::LogViewer;
use crate::{Error, Result};

/// Polling faster than this only hammers the master.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Result of a task that ran to successful completion.
#[derive(Debug, Clone)]
pub struct TaskOutcome {
    pub task_id: String,
    pub state: TaskState,
    pub duration: f64,
    pub logs: String,
}

pub struct TaskMonitor {
    tasks: Arc<dyn TaskSource>,
    scheduler: Arc<dyn JobScheduler>,
    sandbox: Arc<dyn SandboxReader>,
    viewer: Arc<dyn LogViewer>,
    poll_interval: Duration,
    show_progress: bool,
}

impl TaskMonitor {
    pub fn new(
        tasks: Arc<dyn TaskSource>,
        scheduler: Arc<dyn JobScheduler>,
        sandbox: Arc<dyn SandboxReader>,
        viewer: Arc<dyn LogViewer>,
    ) -> Self {
        Self {
            tasks,
            scheduler,
            sandbox,
            viewer,
            poll_interval: Duration::from_secs(1),
            show_progress: false,
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval.max(MIN_POLL_INTERVAL);
        self
    }

    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    /// Follow the task named `name` until it reaches a terminal state.
    ///
    /// `baseline` is the number of matching tasks seen before submission.
    /// There is no overall timeout.
    pub async fn watch(&self, name: &str, baseline: usize, ctx: &mut MonitorContext) -> Result<TaskOutcome> {
        println!("scheduling task");
        let spinner = if self.show_progress {
            Spinner::start("waiting for task", self.poll_interval / 2)
        } else {
            Spinner::disabled()
        };

        let result = self.poll(name, baseline, ctx).await;
        spinner.stop().await;
        result
    }

    async fn poll(&self, name: &str, baseline: usize, ctx: &mut MonitorContext) -> Result<TaskOutcome> {
        loop {
            tokio::time::sleep(self.poll_interval).await;

            let matching = self.tasks.matching(name).await?;
            let count = matching.len();
            if count <= baseline {
                debug!("Task {} not visible yet ({} matching)", name, count);
                continue;
            }

            if count > baseline + 1 && !ctx.crowded_reported {
                warn!(
                    "Expected {} tasks named {} but found {}; following the most recent one",
                    baseline + 1,
                    name,
                    count
                );
                ctx.crowded_reported = true;
            }

            let Some(task) = matching.newest() else {
                continue;
            };

            if ctx.observe(&task.state) {
                println!("task state: {}", task.state);
            }

            if let Some(outcome) = self.dispatch(name, task, ctx).await? {
                return Ok(outcome);
            }
        }
    }

    /// Act on the current state. `Ok(None)` means keep polling.
    async fn dispatch(&self, name: &str, task: &RemoteTask, ctx: &mut MonitorContext) -> Result<Option<TaskOutcome>> {
        match &task.state {
            TaskState::Staging => Ok(None),
            TaskState::Running => {
                self.open_viewer(task, ctx).await;
                Ok(None)
            }
            TaskState::Finished => {
                self.open_viewer(task, ctx).await;
                let duration = task.duration()?;
                let logs = self.print_logs(task, ctx).await?;
                self.cleanup(name).await?;
                println!("task finished: {:.2} seconds", duration);
                Ok(Some(TaskOutcome {
                    task_id: task.id.clone(),
                    state: task.state.clone(),
                    duration,
                    logs,
                }))
            }
            TaskState::Failed => {
                self.open_viewer(task, ctx).await;
                self.print_logs(task, ctx).await?;
                let duration = task.duration()?;
                self.cleanup(name).await?;
                Err(Error::TaskFailed { duration })
            }
            TaskState::Killed => {
                let duration = task.duration()?;
                self.cleanup(name).await?;
                Err(Error::TaskKilled { duration })
            }
            // A job in a state we do not understand is left on the scheduler.
            TaskState::Unknown(state) => Err(Error::UnhandledState(state.clone())),
        }
    }

    async fn sandbox_directory(&self, task: &RemoteTask, ctx: &mut MonitorContext) -> Result<String> {
        if let Some(directory) = ctx.cached_sandbox(&task.id) {
            return Ok(directory.to_string());
        }
        let directory = self.sandbox.sandbox_directory(task).await?;
        ctx.sandbox = Some((task.id.clone(), directory.clone()));
        Ok(directory)
    }

    /// Open the sandbox page at most once per run; failures are only logged.
    async fn open_viewer(&self, task: &RemoteTask, ctx: &mut MonitorContext) {
        if ctx.viewer_opened {
            return;
        }
        ctx.viewer_opened = true;

        let directory = match self.sandbox_directory(task, ctx).await {
            Ok(directory) => directory,
            Err(e) => {
                warn!("Could not locate sandbox for log viewer: {}", e);
                return;
            }
        };
        if let Err(e) = self.viewer.open_sandbox(task, &directory).await {
            warn!("Could not open log viewer: {}", e);
        }
    }

    async fn print_logs(&self, task: &RemoteTask, ctx: &mut MonitorContext) -> Result<String> {
        let directory = self.sandbox_directory(task, ctx).await?;
        let stream = LogStream::for_state(&task.state);
        let logs = self.sandbox.read_logs(task, &directory, stream).await?;
        println!("{}", logs);
        Ok(logs)
    }

    async fn cleanup(&self, name: &str) -> Result<()> {
        self.scheduler.delete(name).await?;
        info!("Cleaned up job {}", name);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chronos::client::MockJobScheduler;
    use crate::mesos::agent::MockSandboxReader;
    use crate::mesos::query::MockTaskSource;
    use crate::mesos::{StateTransition, TaskSet};
    use crate::viewer::MockLogViewer;
    use async_trait::async_trait;
    use mockall::Sequence;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    const NAME: &str = "dogfood-stage-echo-hi";

    /// Replays snapshots in order, repeating the last one forever.
    struct Script {
        snapshots: Mutex<VecDeque<TaskSet>>,
    }

    impl Script {
        fn new(snapshots: Vec<Vec<RemoteTask>>) -> Arc<Self> {
            Arc::new(Self {
                snapshots: Mutex::new(snapshots.into_iter().map(|tasks| TaskSet { tasks }).collect()),
            })
        }
    }

    #[async_trait]
    impl TaskSource for Script {
        async fn matching(&self, name: &str) -> Result<TaskSet> {
            assert_eq!(name, NAME);
            let mut snapshots = self.snapshots.lock().unwrap();
            if snapshots.len() > 1 {
                Ok(snapshots.pop_front().unwrap())
            } else {
                Ok(snapshots.front().cloned().unwrap_or_default())
            }
        }
    }

    fn task(index: u32, transitions: &[(&str, f64)]) -> RemoteTask {
        let state = transitions
            .last()
            .map(|(s, _)| TaskState::from(*s))
            .unwrap_or(TaskState::Staging);
        RemoteTask {
            id: format!("ct:1485292701088:{}:{}:", index, NAME),
            framework_id: "F1".to_string(),
            slave_id: "S1".to_string(),
            state,
            statuses: transitions
                .iter()
                .map(|(s, t)| StateTransition {
                    state: TaskState::from(*s),
                    timestamp: *t,
                    container: None,
                })
                .collect(),
        }
    }

    fn staging() -> RemoteTask {
        task(0, &[("TASK_STAGING", 99.0)])
    }

    fn running() -> RemoteTask {
        task(0, &[("TASK_STAGING", 99.0), ("TASK_RUNNING", 100.0)])
    }

    fn ended(state: &str) -> RemoteTask {
        task(0, &[("TASK_STAGING", 99.0), ("TASK_RUNNING", 100.0), (state, 107.5)])
    }

    fn monitor(
        tasks: Arc<dyn TaskSource>,
        scheduler: MockJobScheduler,
        sandbox: MockSandboxReader,
        viewer: MockLogViewer,
    ) -> TaskMonitor {
        TaskMonitor::new(tasks, Arc::new(scheduler), Arc::new(sandbox), Arc::new(viewer))
    }

    fn expect_cleanup(scheduler: &mut MockJobScheduler) {
        scheduler
            .expect_delete()
            .withf(|name| name == NAME)
            .times(1)
            .returning(|_| Ok(()));
    }

    #[test]
    fn test_poll_interval_has_floor() {
        let m = monitor(
            Script::new(vec![]),
            MockJobScheduler::new(),
            MockSandboxReader::new(),
            MockLogViewer::new(),
        );
        assert_eq!(m.poll_interval, Duration::from_secs(1));
        let m = m.with_poll_interval(Duration::from_millis(1));
        assert_eq!(m.poll_interval, MIN_POLL_INTERVAL);
    }

    #[tokio::test(start_paused = true)]
    async fn test_finished_task_fetches_stdout_and_cleans_up() {
        let script = Script::new(vec![
            vec![],
            vec![staging()],
            vec![running()],
            vec![task(0, &[("TASK_RUNNING", 100.0), ("TASK_FINISHED", 107.5)])],
        ]);

        let mut seq = Sequence::new();
        let mut sandbox = MockSandboxReader::new();
        sandbox
            .expect_sandbox_directory()
            .times(1)
            .returning(|_| Ok("/sandbox".to_string()));
        let mut viewer = MockLogViewer::new();
        viewer
            .expect_open_sandbox()
            .withf(|task, dir| task.state == TaskState::Running && dir == "/sandbox")
            .times(1)
            .returning(|_, _| Ok(()));
        sandbox
            .expect_read_logs()
            .withf(|_, dir, stream| dir == "/sandbox" && *stream == LogStream::Stdout)
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _| Ok("hi".to_string()));
        let mut scheduler = MockJobScheduler::new();
        scheduler
            .expect_delete()
            .withf(|name| name == NAME)
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));

        let mut ctx = MonitorContext::new();
        let outcome = monitor(script, scheduler, sandbox, viewer)
            .watch(NAME, 0, &mut ctx)
            .await
            .unwrap();

        assert_eq!(outcome.state, TaskState::Finished);
        assert_eq!(outcome.duration, 7.5);
        assert_eq!(outcome.logs, "hi");
        assert!(ctx.viewer_opened());
        assert_eq!(ctx.last_state(), Some(&TaskState::Finished));
    }

    #[tokio::test(start_paused = true)]
    async fn test_viewer_opens_once_across_polls() {
        let script = Script::new(vec![
            vec![running()],
            vec![running()],
            vec![running()],
            vec![ended("TASK_FINISHED")],
        ]);

        let mut sandbox = MockSandboxReader::new();
        sandbox
            .expect_sandbox_directory()
            .returning(|_| Ok("/sandbox".to_string()));
        sandbox
            .expect_read_logs()
            .returning(|_, _, _| Ok(String::new()));
        let mut viewer = MockLogViewer::new();
        viewer.expect_open_sandbox().times(1).returning(|_, _| Ok(()));
        let mut scheduler = MockJobScheduler::new();
        expect_cleanup(&mut scheduler);

        let mut ctx = MonitorContext::new();
        let result = monitor(script, scheduler, sandbox, viewer).watch(NAME, 0, &mut ctx).await;
        assert!(result.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_task_reports_duration_after_cleanup() {
        let script = Script::new(vec![vec![running()], vec![ended("TASK_FAILED")]]);

        let mut sandbox = MockSandboxReader::new();
        sandbox
            .expect_sandbox_directory()
            .returning(|_| Ok("/sandbox".to_string()));
        sandbox
            .expect_read_logs()
            .withf(|_, _, stream| *stream == LogStream::Stderr)
            .times(1)
            .returning(|_, _, _| Ok("boom".to_string()));
        let mut scheduler = MockJobScheduler::new();
        expect_cleanup(&mut scheduler);

        let mut ctx = MonitorContext::without_viewer();
        let err = monitor(script, scheduler, sandbox, MockLogViewer::new())
            .watch(NAME, 0, &mut ctx)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::TaskFailed { duration } if duration == 7.5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_killed_task_skips_logs() {
        let script = Script::new(vec![vec![staging()], vec![ended("TASK_KILLED")]]);

        let mut scheduler = MockJobScheduler::new();
        expect_cleanup(&mut scheduler);

        let mut ctx = MonitorContext::without_viewer();
        let err = monitor(script, scheduler, MockSandboxReader::new(), MockLogViewer::new())
            .watch(NAME, 0, &mut ctx)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::TaskKilled { duration } if duration == 7.5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unhandled_state_leaves_job_alone() {
        let script = Script::new(vec![vec![staging()], vec![ended("TASK_LOST")]]);

        let mut ctx = MonitorContext::new();
        let err = monitor(script, MockJobScheduler::new(), MockSandboxReader::new(), MockLogViewer::new())
            .watch(NAME, 0, &mut ctx)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::UnhandledState(ref s) if s == "TASK_LOST"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_query_error_stops_monitor() {
        let mut tasks = MockTaskSource::new();
        let mut seq = Sequence::new();
        tasks
            .expect_matching()
            .times(2)
            .in_sequence(&mut seq)
            .returning(|_| Ok(TaskSet { tasks: vec![staging()] }));
        tasks
            .expect_matching()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Err(Error::Query("connection refused".to_string())));

        let mut ctx = MonitorContext::new();
        let err = monitor(Arc::new(tasks), MockJobScheduler::new(), MockSandboxReader::new(), MockLogViewer::new())
            .watch(NAME, 0, &mut ctx)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Query(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_log_failure_before_cleanup_skips_cleanup() {
        let script = Script::new(vec![vec![ended("TASK_FINISHED")]]);

        let mut sandbox = MockSandboxReader::new();
        sandbox
            .expect_sandbox_directory()
            .times(1)
            .returning(|_| Err(Error::LogUnavailable("agent unreachable".to_string())));

        let mut ctx = MonitorContext::without_viewer();
        let err = monitor(script, MockJobScheduler::new(), sandbox, MockLogViewer::new())
            .watch(NAME, 0, &mut ctx)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::LogUnavailable(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_viewer_failure_does_not_abort() {
        let script = Script::new(vec![vec![running()], vec![ended("TASK_FINISHED")]]);

        let mut sandbox = MockSandboxReader::new();
        sandbox
            .expect_sandbox_directory()
            .returning(|_| Ok("/sandbox".to_string()));
        sandbox
            .expect_read_logs()
            .returning(|_, _, _| Ok("ok".to_string()));
        let mut viewer = MockLogViewer::new();
        viewer
            .expect_open_sandbox()
            .times(1)
            .returning(|_, _| Err(Error::LogUnavailable("no display".to_string())));
        let mut scheduler = MockJobScheduler::new();
        expect_cleanup(&mut scheduler);

        let mut ctx = MonitorContext::new();
        let outcome = monitor(script, scheduler, sandbox, viewer)
            .watch(NAME, 0, &mut ctx)
            .await
            .unwrap();
        assert_eq!(outcome.logs, "ok");
    }

    #[tokio::test(start_paused = true)]
    async fn test_new_task_found_beside_previous_runs() {
        let previous = task(7, &[("TASK_RUNNING", 10.0), ("TASK_FINISHED", 12.0)]);
        let fresh = |transitions: &[(&str, f64)]| task(8, transitions);
        let script = Script::new(vec![
            vec![previous.clone()],
            vec![previous.clone(), fresh(&[])],
            vec![previous.clone(), fresh(&[("TASK_RUNNING", 100.0), ("TASK_FAILED", 101.0)])],
        ]);

        let mut sandbox = MockSandboxReader::new();
        sandbox
            .expect_sandbox_directory()
            .withf(|task| task.id.starts_with("ct:1485292701088:8:"))
            .returning(|_| Ok("/sandbox".to_string()));
        sandbox
            .expect_read_logs()
            .returning(|_, _, _| Ok(String::new()));
        let mut scheduler = MockJobScheduler::new();
        expect_cleanup(&mut scheduler);

        let mut ctx = MonitorContext::without_viewer();
        let err = monitor(script, scheduler, sandbox, MockLogViewer::new())
            .watch(NAME, 1, &mut ctx)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::TaskFailed { duration } if duration == 1.0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_extra_matches_follow_most_recent() {
        let older = task(1, &[("TASK_RUNNING", 50.0)]);
        let newer = task(2, &[("TASK_RUNNING", 100.0), ("TASK_KILLED", 103.0)]);
        let script = Script::new(vec![vec![older, newer]]);

        let mut scheduler = MockJobScheduler::new();
        expect_cleanup(&mut scheduler);

        let mut ctx = MonitorContext::without_viewer();
        let err = monitor(script, scheduler, MockSandboxReader::new(), MockLogViewer::new())
            .watch(NAME, 0, &mut ctx)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::TaskKilled { duration } if duration == 3.0));
        assert!(ctx.crowded_reported);
    }
}
