use async_trait::async_trait;
use bollard::auth::DockerCredentials;
use bollard::container::ListContainersOptions;
use bollard::image::CreateImageOptions;
use bollard::models::{ContainerSummary, CreateImageInfo};
use bollard::Docker;
use futures::StreamExt;
use std::time::Duration;

use crate::error::RuntimeError;
use crate::runtime::{ContainerRuntime, PullEvent, PullStream, RunningContainer};

/// Runtime backed by the Docker engine API
#[derive(Clone)]
pub struct DockerRuntime {
    docker: Docker,
    credentials: Option<DockerCredentials>,
}

impl DockerRuntime {
    pub fn new(docker: Docker) -> Self {
        Self {
            docker,
            credentials: None,
        }
    }

    /// Connect through `socket`, or the platform default when unset
    pub fn connect(socket: Option<&str>, timeout: Duration) -> Result<Self, RuntimeError> {
        let docker = match socket {
            Some(socket) => {
                Docker::connect_with_socket(socket, timeout.as_secs(), bollard::API_DEFAULT_VERSION)?
            }
            None => Docker::connect_with_local_defaults()?.with_timeout(timeout),
        };
        Ok(Self::new(docker))
    }

    /// Registry credentials sent with every pull
    pub fn with_credentials(mut self, username: String, password: String) -> Self {
        self.credentials = Some(DockerCredentials {
            username: Some(username),
            password: Some(password),
            ..Default::default()
        });
        self
    }
}

impl From<ContainerSummary> for RunningContainer {
    fn from(summary: ContainerSummary) -> Self {
        Self {
            id: summary.id.unwrap_or_default(),
            names: summary.names.unwrap_or_default(),
            image: summary.image.unwrap_or_default(),
            labels: summary.labels.unwrap_or_default(),
        }
    }
}

impl From<CreateImageInfo> for PullEvent {
    fn from(info: CreateImageInfo) -> Self {
        Self {
            status: info.status,
            progress: info.progress,
            error: info.error,
        }
    }
}

#[async_trait]
impl ContainerRuntime for DockerRuntime {
    async fn ping(&self) -> Result<String, RuntimeError> {
        self.docker.ping().await?;
        let version = self.docker.version().await?;
        Ok(version.version.unwrap_or_else(|| "unknown".to_string()))
    }

    async fn list_containers(&self) -> Result<Vec<RunningContainer>, RuntimeError> {
        let options = ListContainersOptions::<String> {
            all: false,
            ..Default::default()
        };
        let containers = self.docker.list_containers(Some(options)).await?;
        Ok(containers.into_iter().map(RunningContainer::from).collect())
    }

    async fn stop_container(&self, id: &str) -> Result<(), RuntimeError> {
        self.docker.stop_container(id, None).await?;
        Ok(())
    }

    fn pull_image<'a>(&'a self, image: &'a str) -> PullStream<'a> {
        let options = CreateImageOptions {
            from_image: image.to_string(),
            ..Default::default()
        };
        self.docker
            .create_image(Some(options), None, self.credentials.clone())
            .map(|item| item.map(PullEvent::from).map_err(RuntimeError::from))
            .boxed()
    }

    async fn remove_image(&self, image: &str) -> Result<(), RuntimeError> {
        self.docker.remove_image(image, None, None).await?;
        Ok(())
    }
}
