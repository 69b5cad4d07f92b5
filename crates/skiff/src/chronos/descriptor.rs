//! Chronos job documents for one-off tasks, rendered with Tera.
//!
//! The template owns the document layout; Rust only supplies the values and
//! decodes the result back into [`ChronosJob`] so a broken render is caught
//! before anything is submitted.

use serde::{Deserialize, Serialize};
use tera::{Context, Tera};

use crate::naming::derive_task_name;
use crate::schedule::RUN_ONCE;
use crate::{Error, Result};

const TEMPLATE_NAME: &str = "chronos_task.json";

const TASK_TEMPLATE: &str = r#"{% set description = "one-off run (" ~ command ~ ")" -%}
{% set image = repo_prefix ~ "/" ~ app ~ ":" ~ tag -%}
{% set wrapped = "envconsul -config envconsul-" ~ env ~ ".hcl " ~ command -%}
{
  "name": {{ task_name | json_encode() | safe }},
  "description": {{ description | json_encode() | safe }},
  "schedule": {{ schedule | json_encode() | safe }},
  "retries": 0,
  "owner": {{ owner | json_encode() | safe }},
  "container": {
    "type": "DOCKER",
    "network": "HOST",
    "image": {{ image | json_encode() | safe }}
  },
  "command": {{ wrapped | json_encode() | safe }},
  "cpus": {{ cpus }},
  "mem": {{ mem }},
  "fetch": [
    {
      "uri": {{ config_uri | json_encode() | safe }},
      "cache": false,
      "extract": true,
      "executable": false
    }
  ]
}
"#;

/// Everything needed to launch one ad-hoc command. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskRequest {
    pub app: String,
    pub env: String,
    pub tag: String,
    pub command: String,
    pub schedule: Option<String>,
    pub cpus: f64,
    pub mem_gb: u32,
    pub task_name: String,
}

impl TaskRequest {
    pub fn new(app: &str, env: &str, tag: &str, command: &str) -> Self {
        Self {
            app: app.to_string(),
            env: env.to_string(),
            tag: tag.to_string(),
            command: command.to_string(),
            schedule: None,
            cpus: 1.0,
            mem_gb: 1,
            task_name: derive_task_name(app, env, command),
        }
    }

    pub fn with_schedule(mut self, schedule: Option<String>) -> Self {
        self.schedule = schedule.filter(|s| !s.trim().is_empty());
        self
    }

    pub fn with_resources(mut self, cpus: f64, mem_gb: u32) -> Self {
        self.cpus = cpus;
        self.mem_gb = mem_gb;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChronosJob {
    pub name: String,
    pub description: String,
    pub schedule: String,
    pub retries: u32,
    #[serde(default)]
    pub owner: String,
    pub container: JobContainer,
    pub command: String,
    pub cpus: f64,
    /// Megabytes.
    pub mem: u64,
    #[serde(default)]
    pub fetch: Vec<FetchUri>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobContainer {
    #[serde(rename = "type")]
    pub kind: String,
    pub network: String,
    pub image: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchUri {
    pub uri: String,
    pub cache: bool,
    pub extract: bool,
    pub executable: bool,
}

#[derive(Serialize)]
struct TemplateVars<'a> {
    task_name: &'a str,
    app: &'a str,
    env: &'a str,
    tag: &'a str,
    command: &'a str,
    schedule: &'a str,
    owner: &'a str,
    repo_prefix: &'a str,
    config_uri: &'a str,
    cpus: f64,
    mem: u64,
}

pub struct DescriptorBuilder {
    tera: Tera,
    repo_prefix: String,
    config_uri: String,
    owner: String,
}

impl DescriptorBuilder {
    pub fn new(repo_prefix: &str, config_uri: &str, owner: &str) -> Result<Self> {
        Self::with_template(TASK_TEMPLATE, repo_prefix, config_uri, owner)
    }

    pub fn with_template(template: &str, repo_prefix: &str, config_uri: &str, owner: &str) -> Result<Self> {
        let mut tera = Tera::default();
        tera.add_raw_template(TEMPLATE_NAME, template)
            .map_err(|e| Error::Template(format!("Failed to parse template: {}", e)))?;

        Ok(Self {
            tera,
            repo_prefix: repo_prefix.trim_end_matches('/').to_string(),
            config_uri: config_uri.to_string(),
            owner: owner.to_string(),
        })
    }

    /// Render the job document as submitted to Chronos.
    pub fn render_json(&self, request: &TaskRequest) -> Result<String> {
        let vars = TemplateVars {
            task_name: &request.task_name,
            app: &request.app,
            env: &request.env,
            tag: &request.tag,
            command: &request.command,
            schedule: request.schedule.as_deref().unwrap_or(RUN_ONCE),
            owner: &self.owner,
            repo_prefix: &self.repo_prefix,
            config_uri: &self.config_uri,
            cpus: request.cpus,
            mem: u64::from(request.mem_gb) * 1024,
        };
        let context = Context::from_serialize(&vars)
            .map_err(|e| Error::Template(format!("Failed to build template context: {}", e)))?;

        self.tera
            .render(TEMPLATE_NAME, &context)
            .map_err(|e| Error::Template(format!("Failed to render template: {}", e)))
    }

    pub fn render(&self, request: &TaskRequest) -> Result<ChronosJob> {
        let rendered = self.render_json(request)?;
        serde_json::from_str(&rendered)
            .map_err(|e| Error::Template(format!("rendered job is not a valid Chronos job: {}", e)))
    }
}
