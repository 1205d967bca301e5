//! Loading consumer configuration files

use ackgate::consumer::api::{ConsumerConfig, ConsumerError};
use std::time::Duration;

#[tokio::test]
async fn test_load_consumer_config_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("consumer.toml");
    std::fs::write(
        &path,
        r#"
consumer-tag = "orders"
batch-size = 16
auto-ack = false
drain-poll-interval-ms = 250
"#,
    )
    .unwrap();

    let config = ConsumerConfig::load(&path).await.unwrap();

    assert_eq!(config.consumer_tag, "orders");
    assert_eq!(config.batch_size, 16);
    assert!(!config.auto_ack);
    assert_eq!(config.drain_poll_interval(), Duration::from_millis(250));
    assert_eq!(config.dispose_timeout(), Duration::from_secs(30));
    assert_eq!(config.end_of_stream_backoff(), Duration::from_millis(100));
}

#[tokio::test]
async fn test_load_reports_the_failing_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("consumer.toml");
    std::fs::write(&path, "batch-size = 0\n").unwrap();

    match ConsumerConfig::load(&path).await {
        Err(ConsumerError::ConfigLoad { path: failed, message }) => {
            assert_eq!(failed, path);
            assert!(message.contains("batch-size"));
        }
        other => panic!("expected ConfigLoad, got {:?}", other),
    }
}

#[tokio::test]
async fn test_load_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let result = ConsumerConfig::load(dir.path().join("absent.toml")).await;

    assert!(matches!(result, Err(ConsumerError::ConfigLoad { .. })));
}
