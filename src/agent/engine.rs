use chrono::{DateTime, Utc};
use log::{debug, error, info};
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

use crate::agent::detector::{ImageStatus, UpdateDetector};
use crate::agent::restart::{RestartOrchestrator, RestartedService, StoppedContainer};
use crate::compose::{ConfigStore, ImageReference, UpdateSet};
use crate::error::DeployError;
use crate::launcher::ServiceLauncher;
use crate::notify::{deploy_message, ErrorReporter, LogReporter, Notifier};
use crate::runtime::ContainerRuntime;

/// What one detection-and-restart pass did
#[derive(Debug)]
pub struct CycleResult {
    pub id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub checked: Vec<(ImageReference, ImageStatus)>,
    pub updates: UpdateSet,
    pub stopped: Vec<StoppedContainer>,
    pub restarted: Vec<RestartedService>,
    /// Message delivered to the notifier, if one was sent
    pub notification: Option<String>,
    pub errors: Vec<DeployError>,
}

impl CycleResult {
    fn begin() -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            started_at: now,
            finished_at: now,
            checked: Vec::new(),
            updates: UpdateSet::new(),
            stopped: Vec::new(),
            restarted: Vec::new(),
            notification: None,
            errors: Vec::new(),
        }
    }

    pub fn restarted_services(&self) -> Vec<String> {
        self.restarted.iter().map(|r| r.service.clone()).collect()
    }

    pub fn duration(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }
}

/// Running totals across cycles
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EngineStats {
    pub cycles: u64,
    pub cycles_with_updates: u64,
    pub containers_stopped: u64,
    pub services_restarted: u64,
    pub errors: u64,
}

/// The deploy engine: owns the watched configs and every collaborator.
/// Cycles take `&mut self`, so at most one runs at a time.
pub struct Engine {
    store: ConfigStore,
    detector: UpdateDetector,
    orchestrator: RestartOrchestrator,
    notifier: Option<Arc<dyn Notifier>>,
    reporter: Arc<dyn ErrorReporter>,
    deployment_name: String,
    stats: EngineStats,
}

impl Engine {
    pub fn new(
        store: ConfigStore,
        runtime: Arc<dyn ContainerRuntime>,
        launcher: Arc<dyn ServiceLauncher>,
    ) -> Self {
        Self {
            store,
            detector: UpdateDetector::new(runtime.clone()),
            orchestrator: RestartOrchestrator::new(runtime, launcher),
            notifier: None,
            reporter: Arc::new(LogReporter),
            deployment_name: "default".to_string(),
            stats: EngineStats::default(),
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn with_reporter(mut self, reporter: Arc<dyn ErrorReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn with_deployment_name(mut self, name: impl Into<String>) -> Self {
        self.deployment_name = name.into();
        self
    }

    pub fn store(&self) -> &ConfigStore {
        &self.store
    }

    pub fn stats(&self) -> &EngineStats {
        &self.stats
    }

    pub fn deployment_name(&self) -> &str {
        &self.deployment_name
    }

    /// One full pass: detect updates, restart affected services, notify.
    /// Never fails as a whole; per-item failures land in `errors`.
    pub async fn run_cycle(&mut self) -> CycleResult {
        let mut result = CycleResult::begin();
        debug!("new sync interval {}", result.id);

        let images = self.store.unique_images();
        debug!("extracted unique images: {images}");

        let detection = self.detector.detect(&images).await;
        result.updates = detection.updates();
        let (checked, detection_errors) = detection.into_parts();
        result.checked = checked;
        for e in detection_errors {
            let context = json!({ "cycle": result.id });
            self.record(&mut result, e, context).await;
        }

        if result.updates.is_empty() {
            return self.finish(result);
        }

        info!("images to be pulled from registry: {}", result.updates);
        let updated_images: Vec<String> = result
            .updates
            .to_sorted_vec()
            .iter()
            .map(ToString::to_string)
            .collect();

        match self.orchestrator.apply(&mut self.store, &result.updates).await {
            Ok(report) => {
                result.stopped = report.stopped;
                result.restarted = report.restarted;
                for e in report.errors {
                    let context = json!({ "cycle": result.id, "updated_images": updated_images });
                    self.record(&mut result, e, context).await;
                }
            }
            Err(e) => {
                error!("error during restart: {e}");
                let context = json!({ "cycle": result.id, "updated_images": updated_images });
                self.record(&mut result, e, context).await;
            }
        }

        self.notify(&mut result).await;
        self.finish(result)
    }

    async fn notify(&self, result: &mut CycleResult) {
        let Some(notifier) = &self.notifier else {
            return;
        };
        if result.restarted.is_empty() {
            return;
        }

        let message = deploy_message(&self.deployment_name, &result.restarted_services());
        match notifier.notify(&message).await {
            Ok(()) => {
                info!("notification sent: {message}");
                result.notification = Some(message);
            }
            Err(e) => {
                let context = json!({ "cycle": result.id, "message": message });
                self.reporter.report(&e, context).await;
                result.errors.push(e);
            }
        }
    }

    async fn record(&self, result: &mut CycleResult, error: DeployError, context: serde_json::Value) {
        self.reporter.report(&error, context).await;
        result.errors.push(error);
    }

    fn finish(&mut self, mut result: CycleResult) -> CycleResult {
        result.finished_at = Utc::now();

        self.stats.cycles += 1;
        if !result.updates.is_empty() {
            self.stats.cycles_with_updates += 1;
        }
        self.stats.containers_stopped += result.stopped.len() as u64;
        self.stats.services_restarted += result.restarted.len() as u64;
        self.stats.errors += result.errors.len() as u64;

        if result.updates.is_empty() {
            debug!(
                "cycle {} finished in {}ms: nothing to update",
                result.id,
                result.duration().num_milliseconds()
            );
        } else {
            info!(
                "cycle {} finished in {}ms: {} updated images, {} stopped, {} restarted, {} errors",
                result.id,
                result.duration().num_milliseconds(),
                result.updates.len(),
                result.stopped.len(),
                result.restarted.len(),
                result.errors.len()
            );
        }
        result
    }
}
