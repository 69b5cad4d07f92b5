#![allow(dead_code)]

use async_trait::async_trait;
use axum::Router;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Mutex;
use tokio::net::TcpListener;

use skiff::backend::TagResolver;
use skiff::mesos::RemoteTask;
use skiff::viewer::LogViewer;

/// Serve `app` on an ephemeral local port.
pub async fn spawn(app: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

pub fn task_id(name: &str, index: usize) -> String {
    format!("ct:1485292701088:{}:{}:", index, name)
}

/// A master task entry; every transition carries `ip` when given.
pub fn task_json(name: &str, index: usize, transitions: &[(&str, f64)], ip: Option<&str>) -> Value {
    let state = transitions.last().map_or("TASK_STAGING", |(s, _)| *s);
    let statuses: Vec<Value> = transitions
        .iter()
        .map(|(s, t)| match ip {
            Some(ip) => json!({
                "state": s,
                "timestamp": t,
                "container_status": {
                    "network_infos": [{ "ip_addresses": [{ "ip_address": ip }] }]
                }
            }),
            None => json!({ "state": s, "timestamp": t }),
        })
        .collect();

    json!({
        "id": task_id(name, index),
        "framework_id": "chronos-fw",
        "slave_id": "S1",
        "state": state,
        "statuses": statuses,
    })
}

pub struct StaticTag(pub &'static str);

#[async_trait]
impl TagResolver for StaticTag {
    async fn current_tag(&self, _app: &str, _env: &str) -> skiff::Result<String> {
        Ok(self.0.to_string())
    }
}

/// Records sandbox directories instead of launching a browser.
#[derive(Default)]
pub struct RecordingViewer {
    pub opened: Mutex<Vec<String>>,
}

#[async_trait]
impl LogViewer for RecordingViewer {
    async fn open_sandbox(&self, _task: &RemoteTask, directory: &str) -> skiff::Result<()> {
        self.opened.lock().unwrap().push(directory.to_string());
        Ok(())
    }
}
