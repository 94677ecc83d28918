use std::time::Duration;

use fastdeploy::agent::Scheduler;
use fastdeploy::test_harness::updated_pull;

use crate::common::Stack;

#[tokio::test(start_paused = true)]
async fn test_scheduler_runs_cycles_until_shutdown() {
    let stack = Stack::new();
    stack.runtime.script_pull("app:1", updated_pull("app:1"));

    let handle = Scheduler::new(stack.engine(), Duration::from_secs(15)).spawn();
    tokio::time::sleep(Duration::from_secs(31)).await;
    let scheduler = handle.shutdown().await.unwrap();

    let stats = scheduler.engine().stats();
    assert_eq!(stats.cycles, 3);
    // app:1 keeps reporting a newer image, so every cycle redeploys
    assert_eq!(stats.cycles_with_updates, 3);
    assert_eq!(stack.notifier.messages().len(), 3);
    assert_eq!(stack.launcher.started().len(), 6);
}

#[tokio::test(start_paused = true)]
async fn test_handle_stop_is_idempotent() {
    let stack = Stack::new();

    let handle = Scheduler::new(stack.engine(), Duration::from_secs(60)).spawn();
    tokio::time::sleep(Duration::from_secs(1)).await;
    handle.stop();
    handle.stop();
    let scheduler = handle.shutdown().await.unwrap();

    assert_eq!(scheduler.into_engine().stats().cycles, 1);
}
