use std::path::PathBuf;
use std::sync::Arc;

use fastdeploy::agent::Engine;
use fastdeploy::compose::ConfigStore;
use fastdeploy::test_harness::{
    compose_container, write_compose, MockLauncher, MockRuntime, RecordingNotifier,
    RecordingReporter,
};

pub const STACK_A: &str = r#"
version: "3.8"
services:
  web:
    image: app:1
    labels:
      com.example.team: frontend
  db:
    image: postgres:12
volumes:
  data: {}
"#;

pub const STACK_B: &str = r#"
services:
  cache:
    image: app:1
"#;

/// Two compose files sharing `app:1`, with one running container per service
pub struct Stack {
    pub dir: tempfile::TempDir,
    pub a: PathBuf,
    pub b: PathBuf,
    pub runtime: Arc<MockRuntime>,
    pub launcher: Arc<MockLauncher>,
    pub notifier: Arc<RecordingNotifier>,
    pub reporter: Arc<RecordingReporter>,
}

impl Stack {
    pub fn new() -> Self {
        Self::with_files(STACK_A, STACK_B)
    }

    pub fn with_files(a_yaml: &str, b_yaml: &str) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let a = write_compose(dir.path(), "a.yml", a_yaml);
        let b = write_compose(dir.path(), "b.yml", b_yaml);

        let runtime = Arc::new(MockRuntime::new());
        let launcher = Arc::new(MockLauncher::with_journal(runtime.journal()));
        runtime.add_container(compose_container("c-web", "web", "app:1", &a));
        runtime.add_container(compose_container("c-db", "db", "postgres:12", &a));
        runtime.add_container(compose_container("c-cache", "cache", "app:1", &b));

        Self {
            dir,
            a,
            b,
            runtime,
            launcher,
            notifier: Arc::new(RecordingNotifier::new()),
            reporter: Arc::new(RecordingReporter::new()),
        }
    }

    pub fn engine(&self) -> Engine {
        let (store, errors) = ConfigStore::load(&[&self.a, &self.b]);
        assert!(errors.is_empty(), "fixture failed to load: {errors:?}");
        Engine::new(store, self.runtime.clone(), self.launcher.clone())
            .with_notifier(self.notifier.clone())
            .with_reporter(self.reporter.clone())
            .with_deployment_name("prod")
    }

    pub fn journal(&self) -> Vec<String> {
        self.runtime.journal().lock().unwrap().clone()
    }
}
