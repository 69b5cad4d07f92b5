//! The `run` command: launch one ad-hoc command and follow it to completion.

use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::backend::TagResolver;
use crate::chronos::{ChronosClient, DescriptorBuilder, JobScheduler, TaskRequest};
use crate::config::Config;
use crate::mesos::{AgentClient, SandboxReader, TaskQuery, TaskSource};
use crate::monitor::{MonitorContext, TaskMonitor, TaskOutcome};
use crate::schedule::validate_schedule;
use crate::viewer::LogViewer;
use crate::{Error, Result};

#[derive(Debug, Clone)]
pub struct RunArgs {
    pub app: String,
    pub env: String,
    pub command: String,
    pub schedule: Option<String>,
    pub cpu: f64,
    /// Memory in GB.
    pub mem: u32,
    /// Open the sandbox in a browser once the task is running.
    pub follow: bool,
}

impl RunArgs {
    pub fn new(app: &str, env: &str, command: &str) -> Self {
        Self {
            app: app.to_string(),
            env: env.to_string(),
            command: command.to_string(),
            schedule: None,
            cpu: 1.0,
            mem: 1,
            follow: false,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.app.trim().is_empty() {
            return Err(Error::Validation("must supply --app".to_string()));
        }
        if self.env.trim().is_empty() {
            return Err(Error::Validation("must supply --env".to_string()));
        }
        if self.command.trim().is_empty() {
            return Err(Error::Validation("must supply a COMMAND to run".to_string()));
        }
        if let Some(schedule) = self.schedule.as_deref().filter(|s| !s.trim().is_empty()) {
            validate_schedule(schedule)?;
        }
        Ok(())
    }
}

pub struct Runner {
    tags: Arc<dyn TagResolver>,
    builder: DescriptorBuilder,
    tasks: Arc<dyn TaskSource>,
    scheduler: Arc<dyn JobScheduler>,
    sandbox: Arc<dyn SandboxReader>,
    viewer: Arc<dyn LogViewer>,
    poll_interval: Duration,
    show_progress: bool,
}

impl Runner {
    pub fn from_config(config: &Config, tags: Arc<dyn TagResolver>, viewer: Arc<dyn LogViewer>) -> Result<Self> {
        config.validate_for_run()?;

        let builder = DescriptorBuilder::new(
            &config.docker.repo_prefix,
            &config.docker.config_bundle_url,
            &config.chronos.owner,
        )?;
        let sandbox = AgentClient::new(config.mesos.agent_port)
            .with_retry_delay(config.run.sandbox_retry())
            .with_sandbox_timeout(config.run.sandbox_timeout());

        Ok(Self {
            tags,
            builder,
            tasks: Arc::new(TaskQuery::new(&config.mesos.host)),
            scheduler: Arc::new(ChronosClient::new(&config.chronos.host)),
            sandbox: Arc::new(sandbox),
            viewer,
            poll_interval: config.run.poll_interval(),
            show_progress: false,
        })
    }

    /// Assemble a runner from already-built collaborators.
    pub fn with_parts(
        tags: Arc<dyn TagResolver>,
        builder: DescriptorBuilder,
        tasks: Arc<dyn TaskSource>,
        scheduler: Arc<dyn JobScheduler>,
        sandbox: Arc<dyn SandboxReader>,
        viewer: Arc<dyn LogViewer>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            tags,
            builder,
            tasks,
            scheduler,
            sandbox,
            viewer,
            poll_interval,
            show_progress: false,
        }
    }

    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    pub async fn run(&self, args: &RunArgs) -> Result<TaskOutcome> {
        args.validate()?;

        let tag = self.tags.current_tag(&args.app, &args.env).await?;
        let request = TaskRequest::new(&args.app, &args.env, &tag, &args.command)
            .with_resources(args.cpu, args.mem)
            .with_schedule(args.schedule.clone());
        let job = self.builder.render(&request)?;

        // Earlier runs of the same command may still be listed by the master.
        let baseline = self.tasks.matching(&request.task_name).await?.len();

        self.scheduler.submit(&job).await?;
        info!("Submitted job {} (baseline {})", job.name, baseline);
        println!(
            "executing '{}' in instance of {}:{} ({})",
            args.command, args.app, tag, args.env
        );

        let mut ctx = if args.follow {
            MonitorContext::new()
        } else {
            MonitorContext::without_viewer()
        };

        TaskMonitor::new(
            self.tasks.clone(),
            self.scheduler.clone(),
            self.sandbox.clone(),
            self.viewer.clone(),
        )
        .with_poll_interval(self.poll_interval)
        .with_progress(self.show_progress)
        .watch(&request.task_name, baseline, &mut ctx)
        .await
    }
}
