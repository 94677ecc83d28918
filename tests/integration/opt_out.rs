use fastdeploy::test_harness::{compose_container, updated_pull};

use crate::common::{Stack, STACK_B};

const STACK_A_PINNED_DB: &str = r#"
services:
  web:
    image: app:1
  db:
    image: postgres:12
    labels:
      - "com.fastdeployserver.enable=false"
"#;

#[tokio::test]
async fn test_opted_out_service_is_never_pulled() {
    let stack = Stack::with_files(STACK_A_PINNED_DB, STACK_B);
    let mut engine = stack.engine();

    let images = engine.store().unique_images();
    assert_eq!(images.to_sorted_vec().len(), 1);
    assert!(images.contains("app:1"));

    engine.run_cycle().await;
    assert_eq!(stack.runtime.pulled(), vec!["app:1"]);
}

#[tokio::test]
async fn test_opted_out_service_sharing_an_updated_image_is_left_alone() {
    let pinned_cache = r#"
services:
  cache:
    image: app:1
    labels:
      com.fastdeployserver.enable: false
"#;
    let stack = Stack::with_files(crate::common::STACK_A, pinned_cache);
    stack.runtime.script_pull("app:1", updated_pull("app:1"));

    // Containers carry the service labels of their compose file
    let mut pinned = compose_container("c-pinned", "cache", "app:1", &stack.b);
    pinned
        .labels
        .insert("com.fastdeployserver.enable".to_string(), "false".to_string());
    stack.runtime.add_container(pinned);

    let mut engine = stack.engine();
    let result = engine.run_cycle().await;

    assert!(!stack.runtime.stopped().contains(&"c-pinned".to_string()));
    assert_eq!(stack.launcher.started_services(), vec!["web"]);
    assert_eq!(stack.notifier.messages(), vec!["prod has been deployed: web"]);
    assert!(result.errors.is_empty());
}
