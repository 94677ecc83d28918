use fastdeploy::test_harness::updated_pull;

use crate::common::Stack;

#[tokio::test]
async fn test_edit_between_stop_and_start_is_picked_up() {
    let stack = Stack::new();
    stack.runtime.script_pull("app:1", updated_pull("app:1"));

    let a = stack.a.clone();
    stack.runtime.on_stop(move |_| {
        std::fs::write(
            &a,
            "services:\n  web:\n    image: app:1\n  worker:\n    image: app:1\n  db:\n    image: postgres:12\n",
        )
        .unwrap();
    });

    let mut engine = stack.engine();
    let result = engine.run_cycle().await;

    assert_eq!(
        stack.launcher.started_services(),
        vec!["cache", "web", "worker"]
    );
    assert_eq!(
        stack.notifier.messages(),
        vec!["prod has been deployed: web, worker, cache"]
    );
    assert!(result.errors.is_empty());

    // The reloaded snapshot is what the next cycle watches
    let a_config = &engine.store().configs()[0];
    assert!(a_config.service("worker").is_some());
}

#[tokio::test]
async fn test_broken_edit_keeps_previous_snapshot() {
    let stack = Stack::new();
    stack.runtime.script_pull("app:1", updated_pull("app:1"));

    let b = stack.b.clone();
    stack.runtime.on_stop(move |_| {
        std::fs::write(&b, "services: [cache\n").unwrap();
    });

    let mut engine = stack.engine();
    let result = engine.run_cycle().await;

    assert_eq!(stack.launcher.started_services(), vec!["cache", "web"]);
    assert_eq!(stack.reporter.kinds(), vec!["config_load"]);
    assert_eq!(result.errors.len(), 1);
    assert_eq!(engine.store().len(), 2);
}
