use std::path::PathBuf;
use thiserror::Error;

/// Failure talking to the container runtime
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("docker engine error: {0}")]
    Docker(#[from] bollard::errors::Error),

    #[error("{0}")]
    Message(String),
}

impl RuntimeError {
    pub fn msg(message: impl Into<String>) -> Self {
        RuntimeError::Message(message.into())
    }
}

/// A descriptor could not be read or parsed
#[derive(Debug, Error)]
pub enum ConfigLoadError {
    #[error("unable to read compose file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unable to parse compose file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

impl ConfigLoadError {
    pub fn path(&self) -> &PathBuf {
        match self {
            ConfigLoadError::Io { path, .. } | ConfigLoadError::Parse { path, .. } => path,
        }
    }
}

/// Why an image could not be classified as updated or unchanged
#[derive(Debug, Error)]
pub enum DetectionError {
    #[error("pull stream failed: {0}")]
    Stream(#[source] RuntimeError),

    #[error("pull reported an error: {0}")]
    Pull(String),

    #[error("pull stream ended without any event")]
    EmptyStream,

    #[error("unexpected terminal pull status: {0:?}")]
    UnexpectedStatus(String),
}

/// Per-item failures of a deployment cycle
#[derive(Debug, Error)]
pub enum DeployError {
    #[error(transparent)]
    ConfigLoad(#[from] ConfigLoadError),

    #[error("unable to check {image} for updates: {source}")]
    Detection {
        image: String,
        #[source]
        source: DetectionError,
    },

    #[error("unable to list docker containers: {0}")]
    RuntimeQuery(#[source] RuntimeError),

    #[error("unable to stop container {container}: {source}")]
    Stop {
        container: String,
        #[source]
        source: RuntimeError,
    },

    #[error("unable to start {service} from {compose_file}: {reason}")]
    Start {
        service: String,
        compose_file: PathBuf,
        reason: String,
    },

    #[error("webhook error: {0}")]
    Notification(String),
}

impl DeployError {
    /// Short machine-friendly tag used in reporter payloads
    pub fn kind(&self) -> &'static str {
        match self {
            DeployError::ConfigLoad(_) => "config_load",
            DeployError::Detection { .. } => "detection",
            DeployError::RuntimeQuery(_) => "runtime_query",
            DeployError::Stop { .. } => "stop",
            DeployError::Start { .. } => "start",
            DeployError::Notification(_) => "notification",
        }
    }
}
