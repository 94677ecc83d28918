use anyhow::{bail, Context, Result};
use serde_json::json;
use std::sync::Arc;

use crate::agent::engine::Engine;
use crate::agent::scheduler::Scheduler;
use crate::agent::settings::Settings;
use crate::compose::ConfigStore;
use crate::error::DeployError;
use crate::launcher::{ComposeLauncher, ServiceLauncher};
use crate::notify::{ErrorReporter, HttpErrorReporter, LogReporter, WebhookNotifier};
use crate::runtime::docker::DockerRuntime;
use crate::runtime::ContainerRuntime;

/// Builder for creating agent engines from validated settings
pub struct EngineBuilder {
    settings: Settings,
    reporter: Option<Arc<dyn ErrorReporter>>,
}

impl EngineBuilder {
    pub fn new(settings: Settings) -> Self {
        Self {
            settings,
            reporter: None,
        }
    }

    /// Use `reporter` instead of the one derived from settings
    pub fn with_reporter(mut self, reporter: Arc<dyn ErrorReporter>) -> Self {
        self.reporter = Some(reporter);
        self
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Connect to the Docker engine and the compose tool, then assemble
    pub async fn build(&self) -> Result<Engine> {
        let docker = &self.settings.docker;
        let mut runtime = DockerRuntime::connect(docker.socket.as_deref(), docker.timeout())
            .context("Failed to connect to the Docker engine")?;
        if let Some((username, password)) = self.settings.registry.credentials() {
            runtime = runtime.with_credentials(username.to_string(), password.to_string());
        }

        let launcher = ComposeLauncher::new(&self.settings.compose.command)
            .context("compose.command must name a program")?;

        self.assemble(Arc::new(runtime), Arc::new(launcher)).await
    }

    pub async fn build_scheduler(&self) -> Result<Scheduler> {
        let engine = self.build().await?;
        Ok(Scheduler::new(engine, self.settings.interval()?))
    }

    /// Wire an engine around the given collaborators.
    /// Fails when the runtime is unreachable or no compose file could be loaded.
    pub async fn assemble(
        &self,
        runtime: Arc<dyn ContainerRuntime>,
        launcher: Arc<dyn ServiceLauncher>,
    ) -> Result<Engine> {
        let version = runtime
            .ping()
            .await
            .context("Container runtime is not reachable")?;
        log::info!("Connected to container runtime {version}");

        let reporter = self.reporter()?;

        let (store, load_errors) = ConfigStore::load(&self.settings.compose_paths());
        for e in load_errors {
            let context = json!({ "path": e.path().display().to_string(), "phase": "startup" });
            reporter.report(&DeployError::from(e), context).await;
        }
        if store.is_empty() {
            bail!(
                "No compose file could be loaded from {}",
                self.settings.compose_files.join(", ")
            );
        }

        let mut engine = Engine::new(store, runtime, launcher)
            .with_reporter(reporter)
            .with_deployment_name(self.settings.name.clone());

        if let Some(url) = &self.settings.webhook {
            let notifier = WebhookNotifier::new(url.clone())?;
            log::info!("Deployments will be announced to {url}");
            engine = engine.with_notifier(Arc::new(notifier));
        }

        log::info!(
            "Engine ready: {} compose files, {} watched images",
            engine.store().len(),
            engine.store().unique_images().len()
        );
        Ok(engine)
    }

    fn reporter(&self) -> Result<Arc<dyn ErrorReporter>> {
        if let Some(reporter) = &self.reporter {
            return Ok(reporter.clone());
        }
        match &self.settings.error_report.url {
            Some(url) => {
                let reporter = HttpErrorReporter::new(url.clone(), self.settings.error_report.token.clone())
                    .context("Failed to create error reporter")?;
                Ok(Arc::new(reporter))
            }
            None => Ok(Arc::new(LogReporter)),
        }
    }
}
