use fastdeploy::agent::ImageStatus;
use fastdeploy::test_harness::{up_to_date_pull, updated_pull};

use crate::common::Stack;

#[tokio::test]
async fn test_shared_image_update_restarts_every_user() {
    let stack = Stack::new();
    stack.runtime.script_pull("app:1", updated_pull("app:1"));
    stack.runtime.script_pull("postgres:12", up_to_date_pull("postgres:12"));
    let mut engine = stack.engine();

    let result = engine.run_cycle().await;

    assert!(result.errors.is_empty(), "{:?}", result.errors);
    assert_eq!(result.updates.to_sorted_vec().len(), 1);
    assert!(result.updates.contains("app:1"));

    let mut stopped = stack.runtime.stopped();
    stopped.sort();
    assert_eq!(stopped, vec!["c-cache", "c-web"]);
    assert_eq!(stack.runtime.running_ids(), vec!["c-db"]);

    assert_eq!(stack.launcher.started_services(), vec!["cache", "web"]);
    let started = stack.launcher.started();
    assert!(started.contains(&(stack.a.clone(), "web".to_string())));
    assert!(started.contains(&(stack.b.clone(), "cache".to_string())));

    assert_eq!(
        stack.notifier.messages(),
        vec!["prod has been deployed: web, cache"]
    );
    assert_eq!(
        result.notification.as_deref(),
        Some("prod has been deployed: web, cache")
    );
}

#[tokio::test]
async fn test_every_stop_precedes_every_start() {
    let stack = Stack::new();
    stack.runtime.script_pull("app:1", updated_pull("app:1"));
    let mut engine = stack.engine();

    engine.run_cycle().await;

    let journal = stack.journal();
    let last_stop = journal.iter().rposition(|e| e.starts_with("stop ")).unwrap();
    let first_up = journal.iter().position(|e| e.starts_with("up ")).unwrap();
    assert!(last_stop < first_up, "{journal:?}");
}

#[tokio::test]
async fn test_quiet_cycle_touches_nothing() {
    let stack = Stack::new();
    let mut engine = stack.engine();

    let result = engine.run_cycle().await;

    assert!(result.updates.is_empty());
    assert!(result
        .checked
        .iter()
        .all(|(_, status)| *status == ImageStatus::Unchanged));
    assert_eq!(result.checked.len(), 2);
    assert!(stack.runtime.stopped().is_empty());
    assert!(stack.launcher.started().is_empty());
    assert!(stack.notifier.messages().is_empty());
    assert_eq!(stack.runtime.running_ids().len(), 3);
}

#[tokio::test]
async fn test_each_image_pulled_once_per_cycle() {
    let stack = Stack::new();
    let mut engine = stack.engine();

    engine.run_cycle().await;

    let mut pulled = stack.runtime.pulled();
    pulled.sort();
    assert_eq!(pulled, vec!["app:1", "postgres:12"]);
}

#[tokio::test]
async fn test_only_the_updated_image_is_acted_on() {
    let stack = Stack::new();
    stack.runtime.script_pull("postgres:12", updated_pull("postgres:12"));
    let mut engine = stack.engine();

    let result = engine.run_cycle().await;

    assert_eq!(stack.runtime.stopped(), vec!["c-db"]);
    assert_eq!(stack.launcher.started_services(), vec!["db"]);
    assert_eq!(result.restarted_services(), vec!["db"]);
    assert_eq!(stack.notifier.messages(), vec!["prod has been deployed: db"]);
}

#[tokio::test]
async fn test_stop_failure_does_not_block_the_rest() {
    let stack = Stack::new();
    stack.runtime.script_pull("app:1", updated_pull("app:1"));
    stack.runtime.fail_stop("c-web");
    let mut engine = stack.engine();

    let result = engine.run_cycle().await;

    assert_eq!(stack.runtime.stopped(), vec!["c-cache"]);
    assert_eq!(stack.launcher.started_services(), vec!["cache", "web"]);
    assert_eq!(stack.reporter.kinds(), vec!["stop"]);
    assert_eq!(result.errors.len(), 1);
    assert_eq!(engine.stats().errors, 1);
}

#[tokio::test]
async fn test_start_failure_leaves_service_out_of_notification() {
    let stack = Stack::new();
    stack.runtime.script_pull("app:1", updated_pull("app:1"));
    stack.launcher.fail_service("web");
    let mut engine = stack.engine();

    let result = engine.run_cycle().await;

    assert_eq!(result.restarted_services(), vec!["cache"]);
    assert_eq!(stack.notifier.messages(), vec!["prod has been deployed: cache"]);
    assert_eq!(stack.reporter.kinds(), vec!["start"]);
}

#[tokio::test]
async fn test_failed_detection_is_reported_and_treated_as_unchanged() {
    let stack = Stack::new();
    stack
        .runtime
        .script_pull("app:1", vec![Err("registry unreachable".to_string())]);
    stack.runtime.script_pull("postgres:12", updated_pull("postgres:12"));
    let mut engine = stack.engine();

    let result = engine.run_cycle().await;

    assert!(!result.updates.contains("app:1"));
    assert_eq!(stack.launcher.started_services(), vec!["db"]);
    let reports = stack.reporter.reports();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].kind, "detection");
    assert!(reports[0].message.contains("app:1"));
}

#[tokio::test]
async fn test_list_failure_aborts_restart_but_not_the_engine() {
    let stack = Stack::new();
    stack.runtime.script_pull("app:1", updated_pull("app:1"));
    stack.runtime.fail_list("daemon gone");
    let mut engine = stack.engine();

    let result = engine.run_cycle().await;
    assert!(stack.launcher.started().is_empty());
    assert!(stack.notifier.messages().is_empty());
    assert_eq!(stack.reporter.kinds(), vec!["runtime_query"]);
    assert!(result.notification.is_none());

    // The engine keeps cycling; the failure is per cycle
    let again = engine.run_cycle().await;
    assert_eq!(again.errors.len(), 1);
    assert_eq!(engine.stats().cycles, 2);
}

#[tokio::test]
async fn test_repeat_cycles_accumulate_stats() {
    let stack = Stack::new();
    stack.runtime.script_pull("app:1", updated_pull("app:1"));
    let mut engine = stack.engine();

    engine.run_cycle().await;
    stack.runtime.script_pull("app:1", up_to_date_pull("app:1"));
    engine.run_cycle().await;

    let stats = engine.stats();
    assert_eq!(stats.cycles, 2);
    assert_eq!(stats.cycles_with_updates, 1);
    assert_eq!(stats.containers_stopped, 2);
    assert_eq!(stats.services_restarted, 2);
    assert_eq!(stats.errors, 0);
}
