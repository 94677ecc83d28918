pub mod agent;
pub mod compose;
pub mod error;
pub mod launcher;
pub mod notify;
pub mod runtime;

#[cfg(any(test, feature = "test-harness"))]
pub mod test_harness;

pub use error::{ConfigLoadError, DeployError, DetectionError, RuntimeError};

// Service label that opts a service (and its containers) out of auto-update
pub const WATCH_LABEL: &str = "com.fastdeployserver.enable";
pub const WATCH_DISABLED: &str = "false";

// Labels stamped on containers by the compose tool
pub const COMPOSE_SERVICE_LABEL: &str = "com.docker.compose.service";
pub const COMPOSE_CONFIG_FILES_LABEL: &str = "com.docker.compose.project.config_files";

// Terminal pull statuses reported by the registry pull stream
pub const PULL_STATUS_UPDATED: &str = "Downloaded newer image for";
pub const PULL_STATUS_UP_TO_DATE: &str = "Image is up to date for";

pub const DEFAULT_COMPOSE_FILE: &str = "docker-compose.yml";
pub const RELEASE: &str = env!("CARGO_PKG_VERSION");
