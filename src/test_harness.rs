//! In-memory collaborators for exercising deploy cycles without a Docker engine.

use async_trait::async_trait;
use futures::StreamExt;
use serde_json::Value as JsonValue;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::error::{DeployError, RuntimeError};
use crate::launcher::ServiceLauncher;
use crate::notify::{ErrorReporter, Notifier};
use crate::runtime::{ContainerRuntime, PullEvent, PullStream, RunningContainer};
use crate::{
    COMPOSE_CONFIG_FILES_LABEL, COMPOSE_SERVICE_LABEL, PULL_STATUS_UPDATED, PULL_STATUS_UP_TO_DATE,
};

/// Ordered record of side effects shared between runtime and launcher
pub type Journal = Arc<Mutex<Vec<String>>>;

type StopHook = Box<dyn Fn(&str) + Send + Sync>;

/// Scripted pull stream items; `Err` items surface as stream failures
pub type PullScript = Vec<Result<PullEvent, String>>;

pub fn updated_pull(image: &str) -> PullScript {
    vec![
        Ok(PullEvent::status(format!("Pulling from {image}"))),
        Ok(PullEvent::status("Digest: sha256:0123")),
        Ok(PullEvent::status(format!("Status: {PULL_STATUS_UPDATED} {image}"))),
    ]
}

pub fn up_to_date_pull(image: &str) -> PullScript {
    vec![
        Ok(PullEvent::status(format!("Pulling from {image}"))),
        Ok(PullEvent::status(format!("Status: {PULL_STATUS_UP_TO_DATE} {image}"))),
    ]
}

pub fn container(id: &str, name: &str, image: &str) -> RunningContainer {
    RunningContainer {
        id: id.to_string(),
        names: vec![format!("/{name}")],
        image: image.to_string(),
        labels: HashMap::new(),
    }
}

/// Container as the compose tool would label it
pub fn compose_container(id: &str, service: &str, image: &str, compose_file: &Path) -> RunningContainer {
    let mut container = container(id, &format!("stack-{service}-1"), image);
    container
        .labels
        .insert(COMPOSE_SERVICE_LABEL.to_string(), service.to_string());
    container.labels.insert(
        COMPOSE_CONFIG_FILES_LABEL.to_string(),
        compose_file.display().to_string(),
    );
    container
}

pub fn write_compose(dir: &Path, file_name: &str, yaml: &str) -> PathBuf {
    let path = dir.join(file_name);
    std::fs::write(&path, yaml).expect("failed to write compose fixture");
    path
}

#[derive(Default)]
struct RuntimeState {
    containers: Vec<RunningContainer>,
    pulls: HashMap<String, PullScript>,
    stop_failures: HashSet<String>,
    list_error: Option<String>,
    pulled: Vec<String>,
    stopped: Vec<String>,
    removed: Vec<String>,
}

/// Container runtime backed by a scripted in-memory state.
/// Images without a pull script report "up to date".
#[derive(Default)]
pub struct MockRuntime {
    state: Mutex<RuntimeState>,
    on_stop: Mutex<Option<StopHook>>,
    journal: Journal,
}

impl MockRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn journal(&self) -> Journal {
        self.journal.clone()
    }

    pub fn add_container(&self, container: RunningContainer) {
        self.state.lock().unwrap().containers.push(container);
    }

    pub fn script_pull(&self, image: &str, script: PullScript) {
        self.state
            .lock()
            .unwrap()
            .pulls
            .insert(image.to_string(), script);
    }

    pub fn fail_stop(&self, id: &str) {
        self.state
            .lock()
            .unwrap()
            .stop_failures
            .insert(id.to_string());
    }

    pub fn fail_list(&self, message: &str) {
        self.state.lock().unwrap().list_error = Some(message.to_string());
    }

    /// Run `hook` after every successful stop, e.g. to edit a compose file mid-cycle
    pub fn on_stop(&self, hook: impl Fn(&str) + Send + Sync + 'static) {
        *self.on_stop.lock().unwrap() = Some(Box::new(hook));
    }

    pub fn pulled(&self) -> Vec<String> {
        self.state.lock().unwrap().pulled.clone()
    }

    pub fn stopped(&self) -> Vec<String> {
        self.state.lock().unwrap().stopped.clone()
    }

    pub fn removed(&self) -> Vec<String> {
        self.state.lock().unwrap().removed.clone()
    }

    pub fn running_ids(&self) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .containers
            .iter()
            .map(|c| c.id.clone())
            .collect()
    }
}

#[async_trait]
impl ContainerRuntime for MockRuntime {
    async fn ping(&self) -> Result<String, RuntimeError> {
        Ok("mock".to_string())
    }

    async fn list_containers(&self) -> Result<Vec<RunningContainer>, RuntimeError> {
        let state = self.state.lock().unwrap();
        if let Some(message) = &state.list_error {
            return Err(RuntimeError::msg(message.clone()));
        }
        Ok(state.containers.clone())
    }

    async fn stop_container(&self, id: &str) -> Result<(), RuntimeError> {
        {
            let mut state = self.state.lock().unwrap();
            self.journal.lock().unwrap().push(format!("stop {id}"));
            if state.stop_failures.contains(id) {
                return Err(RuntimeError::msg(format!("cannot stop {id}")));
            }
            state.containers.retain(|c| c.id != id);
            state.stopped.push(id.to_string());
        }
        if let Some(hook) = self.on_stop.lock().unwrap().as_ref() {
            hook(id);
        }
        Ok(())
    }

    fn pull_image<'a>(&'a self, image: &'a str) -> PullStream<'a> {
        let script = {
            let mut state = self.state.lock().unwrap();
            state.pulled.push(image.to_string());
            state
                .pulls
                .get(image)
                .cloned()
                .unwrap_or_else(|| up_to_date_pull(image))
        };
        futures::stream::iter(
            script
                .into_iter()
                .map(|item| item.map_err(RuntimeError::Message)),
        )
        .boxed()
    }

    async fn remove_image(&self, image: &str) -> Result<(), RuntimeError> {
        self.state.lock().unwrap().removed.push(image.to_string());
        Ok(())
    }
}

/// Records bring-up requests instead of spawning the compose tool
#[derive(Default)]
pub struct MockLauncher {
    started: Mutex<Vec<(PathBuf, String)>>,
    failures: Mutex<HashSet<String>>,
    journal: Journal,
}

impl MockLauncher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_journal(journal: Journal) -> Self {
        Self {
            journal,
            ..Default::default()
        }
    }

    pub fn fail_service(&self, service: &str) {
        self.failures.lock().unwrap().insert(service.to_string());
    }

    pub fn started(&self) -> Vec<(PathBuf, String)> {
        self.started.lock().unwrap().clone()
    }

    pub fn started_services(&self) -> Vec<String> {
        let mut names: Vec<_> = self
            .started()
            .into_iter()
            .map(|(_, service)| service)
            .collect();
        names.sort();
        names
    }
}

#[async_trait]
impl ServiceLauncher for MockLauncher {
    async fn up(&self, compose_file: &Path, service: &str) -> Result<(), DeployError> {
        self.journal.lock().unwrap().push(format!("up {service}"));
        if self.failures.lock().unwrap().contains(service) {
            return Err(DeployError::Start {
                service: service.to_string(),
                compose_file: compose_file.to_path_buf(),
                reason: "scripted failure".to_string(),
            });
        }
        self.started
            .lock()
            .unwrap()
            .push((compose_file.to_path_buf(), service.to_string()));
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    messages: Mutex<Vec<String>>,
    fail: bool,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, message: &str) -> Result<(), DeployError> {
        self.messages.lock().unwrap().push(message.to_string());
        if self.fail {
            return Err(DeployError::Notification("scripted failure".to_string()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct Report {
    pub kind: &'static str,
    pub message: String,
    pub context: JsonValue,
}

#[derive(Default)]
pub struct RecordingReporter {
    reports: Mutex<Vec<Report>>,
}

impl RecordingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reports(&self) -> Vec<Report> {
        self.reports.lock().unwrap().clone()
    }

    pub fn kinds(&self) -> Vec<&'static str> {
        self.reports().iter().map(|r| r.kind).collect()
    }
}

#[async_trait]
impl ErrorReporter for RecordingReporter {
    async fn report(&self, error: &DeployError, context: JsonValue) {
        self.reports.lock().unwrap().push(Report {
            kind: error.kind(),
            message: error.to_string(),
            context,
        });
    }
}

/// Accept one HTTP request on an ephemeral port, answer `status`,
/// and hand back the raw request text.
pub async fn serve_http_once(status: u16) -> (String, tokio::task::JoinHandle<String>) {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("failed to bind test listener");
    let url = format!(
        "http://{}/hook",
        listener.local_addr().expect("listener has no address")
    );

    let handle = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.expect("accept failed");
        let mut request = Vec::new();
        let mut buf = [0u8; 4096];
        loop {
            let n = socket.read(&mut buf).await.unwrap_or(0);
            if n == 0 {
                break;
            }
            request.extend_from_slice(&buf[..n]);
            let text = String::from_utf8_lossy(&request).to_string();
            if let Some(header_end) = text.find("\r\n\r\n") {
                let content_length = text[..header_end]
                    .lines()
                    .find_map(|line| {
                        let (name, value) = line.split_once(':')?;
                        if name.eq_ignore_ascii_case("content-length") {
                            value.trim().parse::<usize>().ok()
                        } else {
                            None
                        }
                    })
                    .unwrap_or(0);
                if request.len() >= header_end + 4 + content_length {
                    break;
                }
            }
        }
        let response =
            format!("HTTP/1.1 {status} Test\r\ncontent-length: 0\r\nconnection: close\r\n\r\n");
        let _ = socket.write_all(response.as_bytes()).await;
        String::from_utf8_lossy(&request).to_string()
    });

    (url, handle)
}
