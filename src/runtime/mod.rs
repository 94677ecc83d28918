//! Container runtime seam.
//!
//! `ContainerRuntime` is the narrow set of engine operations the deploy cycle
//! needs. `DockerRuntime` talks to the local Docker engine; tests use the
//! in-memory runtime from `test_harness`.

pub mod docker;

use async_trait::async_trait;
use futures::stream::BoxStream;
use std::collections::HashMap;

use crate::error::RuntimeError;
use crate::{WATCH_DISABLED, WATCH_LABEL};

pub use docker::DockerRuntime;

/// Snapshot of a running container, read fresh every cycle
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunningContainer {
    pub id: String,
    pub names: Vec<String>,
    pub image: String,
    pub labels: HashMap<String, String>,
}

impl RunningContainer {
    /// First recorded name without the engine's leading slash
    pub fn name(&self) -> Option<&str> {
        self.names
            .first()
            .map(|name| name.trim_start_matches('/'))
            .filter(|name| !name.is_empty())
    }

    pub fn label(&self, key: &str) -> Option<&str> {
        self.labels.get(key).map(String::as_str)
    }

    /// Containers inherit service labels, so the opt-out applies here too
    pub fn is_watched(&self) -> bool {
        self.label(WATCH_LABEL) != Some(WATCH_DISABLED)
    }
}

/// One status/progress message from an image pull
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PullEvent {
    pub status: Option<String>,
    pub progress: Option<String>,
    pub error: Option<String>,
}

impl PullEvent {
    pub fn status(status: impl Into<String>) -> Self {
        Self {
            status: Some(status.into()),
            ..Default::default()
        }
    }
}

pub type PullStream<'a> = BoxStream<'a, Result<PullEvent, RuntimeError>>;

#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Check the engine is reachable, returning its version
    async fn ping(&self) -> Result<String, RuntimeError>;

    async fn list_containers(&self) -> Result<Vec<RunningContainer>, RuntimeError>;

    async fn stop_container(&self, id: &str) -> Result<(), RuntimeError>;

    /// Pull `image`, yielding progress events until the registry is done
    fn pull_image<'a>(&'a self, image: &'a str) -> PullStream<'a>;

    async fn remove_image(&self, image: &str) -> Result<(), RuntimeError>;
}
