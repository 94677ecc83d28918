use log::{debug, info, warn};
use std::path::PathBuf;
use std::sync::Arc;

use crate::compose::{ComposeConfig, ConfigStore, ImageReference, UpdateSet};
use crate::error::DeployError;
use crate::launcher::ServiceLauncher;
use crate::runtime::{ContainerRuntime, RunningContainer};
use crate::{COMPOSE_CONFIG_FILES_LABEL, COMPOSE_SERVICE_LABEL};

/// A container taken down because its image was updated
#[derive(Debug, Clone, PartialEq)]
pub struct StoppedContainer {
    pub id: String,
    pub name: String,
    pub image: String,
    /// Compose service and config files recorded on the container, if any
    pub service: Option<String>,
    pub config_files: Option<String>,
}

impl StoppedContainer {
    fn new(container: &RunningContainer, name: &str) -> Self {
        Self {
            id: container.id.clone(),
            name: name.to_string(),
            image: container.image.clone(),
            service: container.label(COMPOSE_SERVICE_LABEL).map(str::to_string),
            config_files: container
                .label(COMPOSE_CONFIG_FILES_LABEL)
                .map(str::to_string),
        }
    }

    /// Whether this container was created for `service` of `config`
    pub fn belongs_to(&self, config: &ComposeConfig, service: &str) -> bool {
        self.service.as_deref() == Some(service)
            && self
                .config_files
                .as_deref()
                .is_some_and(|files| config.is_source_of(files))
    }
}

/// A service brought back up from its compose file
#[derive(Debug, Clone, PartialEq)]
pub struct RestartedService {
    pub compose_file: PathBuf,
    pub service: String,
    pub image: Option<ImageReference>,
}

#[derive(Debug, Default)]
pub struct RestartReport {
    pub stopped: Vec<StoppedContainer>,
    pub restarted: Vec<RestartedService>,
    pub errors: Vec<DeployError>,
}

/// Stops containers on updated images and relaunches the affected services
#[derive(Clone)]
pub struct RestartOrchestrator {
    runtime: Arc<dyn ContainerRuntime>,
    launcher: Arc<dyn ServiceLauncher>,
}

impl RestartOrchestrator {
    pub fn new(runtime: Arc<dyn ContainerRuntime>, launcher: Arc<dyn ServiceLauncher>) -> Self {
        Self { runtime, launcher }
    }

    /// Stop, reload, start. Only a failure to list containers aborts;
    /// every other failure is recorded in the report and skipped.
    pub async fn apply(
        &self,
        store: &mut ConfigStore,
        updates: &UpdateSet,
    ) -> Result<RestartReport, DeployError> {
        let containers = self
            .runtime
            .list_containers()
            .await
            .map_err(DeployError::RuntimeQuery)?;

        if containers.is_empty() {
            debug!("there are no containers running");
        }

        let mut report = RestartReport::default();
        self.stop_matching(&containers, updates, &mut report).await;

        // Reload after stopping so edits made since the last cycle take effect now
        report
            .errors
            .extend(store.reload_all().into_iter().map(DeployError::from));

        self.start_matching(store, updates, &mut report).await;

        Ok(report)
    }

    async fn stop_matching(
        &self,
        containers: &[RunningContainer],
        updates: &UpdateSet,
        report: &mut RestartReport,
    ) {
        for container in containers {
            let Some(name) = container.name() else {
                debug!("container {} has no names", container.id);
                continue;
            };

            debug!(
                "checking container: {} {} {}",
                container.id, container.image, name
            );
            if !updates.contains(&container.image) {
                continue;
            }
            if !container.is_watched() {
                info!("leaving {name} running: watching disabled");
                continue;
            }

            info!(
                "[>] stopping {name} ({}) because of {} ...",
                container.id, container.image
            );
            match self.runtime.stop_container(&container.id).await {
                Ok(()) => {
                    info!("container {name} stopped");
                    report.stopped.push(StoppedContainer::new(container, name));
                }
                Err(source) => {
                    warn!("unable to stop container {name} ({}): {source}", container.id);
                    report.errors.push(DeployError::Stop {
                        container: name.to_string(),
                        source,
                    });
                }
            }
        }

        info!("stopped {} containers", report.stopped.len());
    }

    async fn start_matching(
        &self,
        store: &ConfigStore,
        updates: &UpdateSet,
        report: &mut RestartReport,
    ) {
        for config in store.configs() {
            info!("starting containers from {}", config.path().display());

            for service in config.services() {
                let by_image = service
                    .image
                    .as_ref()
                    .is_some_and(|image| updates.contains(image.as_str()));
                let by_container = report
                    .stopped
                    .iter()
                    .any(|stopped| stopped.belongs_to(config, &service.name));

                if !(by_image || by_container) {
                    continue;
                }
                if !service.is_watched() {
                    debug!("skipping {}: watching disabled", service.name);
                    continue;
                }

                let reason = service
                    .image
                    .as_ref()
                    .map(ToString::to_string)
                    .unwrap_or_else(|| "its stopped container".to_string());
                info!("  [>] starting {} because of {reason} ...", service.name);

                match self.launcher.up(config.path(), &service.name).await {
                    Ok(()) => {
                        info!("  [+] {} is up", service.name);
                        report.restarted.push(RestartedService {
                            compose_file: config.path().to_path_buf(),
                            service: service.name.clone(),
                            image: service.image.clone(),
                        });
                    }
                    Err(e) => {
                        warn!("  [x] unable to start {}: {e}", service.name);
                        report.errors.push(e);
                    }
                }
            }
        }
    }
}
