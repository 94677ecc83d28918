use anyhow::Result;
use log::{debug, info};
use std::time::Duration;
use tokio::sync::watch;

use crate::agent::engine::{CycleResult, Engine};

/// Drives one deploy cycle per interval.
///
/// Each iteration joins the cycle with the interval timer, so the next cycle
/// starts only after both have completed: the effective period is
/// `max(cycle duration, interval)` and cycles never overlap.
pub struct Scheduler {
    engine: Engine,
    interval: Duration,
}

impl Scheduler {
    pub fn new(engine: Engine, interval: Duration) -> Self {
        Self { engine, interval }
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn into_engine(self) -> Engine {
        self.engine
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub async fn run_once(&mut self) -> CycleResult {
        self.engine.run_cycle().await
    }

    /// Run until `shutdown` turns true or its sender is dropped.
    /// A cycle in flight when shutdown arrives is allowed to finish.
    pub async fn run(&mut self, shutdown: watch::Receiver<bool>) {
        info!(
            "watching {} compose files every {:?}",
            self.engine.store().len(),
            self.interval
        );

        loop {
            if shutdown_requested(&shutdown) {
                break;
            }

            let interval = self.interval;
            let mut tick_shutdown = shutdown.clone();
            let work = self.engine.run_cycle();
            let tick = async move {
                tokio::select! {
                    _ = tokio::time::sleep(interval) => {}
                    _ = wait_for_shutdown(&mut tick_shutdown) => {
                        debug!("interval wait abandoned: shutdown requested");
                    }
                }
            };

            let (_result, ()) = tokio::join!(work, tick);
        }

        info!(
            "scheduler stopped after {} cycles",
            self.engine.stats().cycles
        );
    }

    /// Run on a background task, controlled through the returned handle
    pub fn spawn(mut self) -> SchedulerHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(async move {
            self.run(shutdown_rx).await;
            self
        });
        SchedulerHandle {
            shutdown_tx,
            handle,
        }
    }
}

fn shutdown_requested(rx: &watch::Receiver<bool>) -> bool {
    *rx.borrow() || rx.has_changed().is_err()
}

async fn wait_for_shutdown(rx: &mut watch::Receiver<bool>) {
    loop {
        if *rx.borrow_and_update() {
            return;
        }
        if rx.changed().await.is_err() {
            return;
        }
    }
}

/// Handle to a spawned scheduler
pub struct SchedulerHandle {
    shutdown_tx: watch::Sender<bool>,
    handle: tokio::task::JoinHandle<Scheduler>,
}

impl SchedulerHandle {
    /// Ask the scheduler to stop without waiting for it
    pub fn stop(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    /// Stop and wait for the in-flight cycle (if any) to drain
    pub async fn shutdown(self) -> Result<Scheduler> {
        self.stop();
        Ok(self.handle.await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compose::ConfigStore;
    use crate::runtime::PullEvent;
    use crate::test_harness::{updated_pull, write_compose, MockLauncher, MockRuntime};
    use futures::StreamExt;
    use std::sync::Arc;
    use tokio::time::Instant;

    fn engine(runtime: Arc<dyn crate::runtime::ContainerRuntime>) -> (tempfile::TempDir, Engine) {
        let dir = tempfile::tempdir().unwrap();
        let path = write_compose(dir.path(), "stack.yml", "services:\n  web:\n    image: app:1\n");
        let (store, _) = ConfigStore::load(&[path]);
        let engine = Engine::new(store, runtime, Arc::new(MockLauncher::new()));
        (dir, engine)
    }

    /// Runtime whose pulls take `delay` of (paused) time
    struct SlowRuntime {
        inner: MockRuntime,
        delay: Duration,
    }

    #[async_trait::async_trait]
    impl crate::runtime::ContainerRuntime for SlowRuntime {
        async fn ping(&self) -> Result<String, crate::RuntimeError> {
            self.inner.ping().await
        }

        async fn list_containers(
            &self,
        ) -> Result<Vec<crate::runtime::RunningContainer>, crate::RuntimeError> {
            self.inner.list_containers().await
        }

        async fn stop_container(&self, id: &str) -> Result<(), crate::RuntimeError> {
            self.inner.stop_container(id).await
        }

        fn pull_image<'a>(&'a self, image: &'a str) -> crate::runtime::PullStream<'a> {
            let delay = futures::stream::once(tokio::time::sleep(self.delay))
                .filter_map(|_| async { None::<Result<PullEvent, crate::RuntimeError>> });
            delay.chain(self.inner.pull_image(image)).boxed()
        }

        async fn remove_image(&self, image: &str) -> Result<(), crate::RuntimeError> {
            self.inner.remove_image(image).await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_one_cycle_per_interval() {
        let runtime = Arc::new(MockRuntime::new());
        let (_dir, engine) = engine(runtime.clone());

        let handle = Scheduler::new(engine, Duration::from_secs(15)).spawn();
        tokio::time::sleep(Duration::from_secs(46)).await;

        let scheduler = handle.shutdown().await.unwrap();
        // Cycles at 0s, 15s, 30s, 45s
        assert_eq!(scheduler.engine().stats().cycles, 4);
        assert_eq!(runtime.pulled().len(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_overrunning_cycle_delays_next_tick() {
        let runtime = Arc::new(SlowRuntime {
            inner: MockRuntime::new(),
            delay: Duration::from_secs(20),
        });
        let (_dir, engine) = engine(runtime.clone());

        let handle = Scheduler::new(engine, Duration::from_secs(15)).spawn();
        tokio::time::sleep(Duration::from_secs(61)).await;

        // Cycles start at 0s, 20s, 40s, 60s; the last one is still pulling
        assert_eq!(runtime.inner.pulled().len(), 4);

        let started = Instant::now();
        let scheduler = handle.shutdown().await.unwrap();
        assert_eq!(scheduler.engine().stats().cycles, 4);
        // The in-flight cycle drained before the scheduler returned
        assert!(started.elapsed() >= Duration::from_secs(19));
        assert_eq!(runtime.inner.pulled().len(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_does_not_wait_for_interval() {
        let runtime = Arc::new(MockRuntime::new());
        let (_dir, engine) = engine(runtime.clone());

        let handle = Scheduler::new(engine, Duration::from_secs(3600)).spawn();
        tokio::time::sleep(Duration::from_secs(1)).await;

        let started = Instant::now();
        let scheduler = handle.shutdown().await.unwrap();
        assert!(started.elapsed() < Duration::from_secs(1));
        assert_eq!(scheduler.engine().stats().cycles, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_sender_stops_scheduler() {
        let runtime = Arc::new(MockRuntime::new());
        let (_dir, engine) = engine(runtime.clone());
        let mut scheduler = Scheduler::new(engine, Duration::from_secs(15));

        let (tx, rx) = watch::channel(false);
        drop(tx);
        scheduler.run(rx).await;

        assert_eq!(scheduler.engine().stats().cycles, 0);
    }

    #[tokio::test]
    async fn test_run_once_restarts_updated_services() {
        let runtime = Arc::new(MockRuntime::new());
        runtime.script_pull("app:1", updated_pull("app:1"));
        let (_dir, engine) = engine(runtime.clone());
        let mut scheduler = Scheduler::new(engine, Duration::from_secs(15));

        let result = scheduler.run_once().await;
        assert_eq!(result.restarted_services(), vec!["web"]);
        assert_eq!(scheduler.interval(), Duration::from_secs(15));
    }
}
