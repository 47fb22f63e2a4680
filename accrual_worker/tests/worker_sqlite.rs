use std::time::Duration;

use accrual_worker::{config::WorkerConfig, errors::WorkerError, worker::run_worker_until};
use loyalty_common::Secret;
use loyalty_engine::{accrual::EngineConfig, AccountManagement, PendingOrders, SqliteDatabase};

fn temp_db_url(name: &str) -> String {
    format!("sqlite://{}/{name}_{}.db", std::env::temp_dir().display(), rand::random::<u64>())
}

fn worker_config(url: &str) -> WorkerConfig {
    WorkerConfig {
        database_url: Secret::new(url.to_string()),
        shutdown_timeout: Duration::from_secs(5),
        engine: EngineConfig::new("127.0.0.1:1")
            .with_workers(2)
            .with_discovery_interval(Duration::from_millis(10))
            .with_request_timeout(Duration::from_millis(200)),
        ..WorkerConfig::default()
    }
}

#[tokio::test]
async fn worker_migrates_and_stops_cleanly() {
    let _ = env_logger::try_init();
    let url = temp_db_url("accrual_worker");
    let result = run_worker_until(worker_config(&url), tokio::time::sleep(Duration::from_millis(300))).await;
    assert!(result.is_ok(), "worker failed: {result:?}");

    let db = SqliteDatabase::new_with_url(&url, 2).await.expect("database");
    assert!(db.create_user("alice").await.expect("users table exists"));
    assert!(db.list_pending_orders().await.expect("orders table exists").is_empty());
}

#[tokio::test]
async fn unreachable_database_fails_start_up() {
    let _ = env_logger::try_init();
    let url = format!(
        "sqlite://{}/missing_dir_{}/loyalty.db",
        std::env::temp_dir().display(),
        rand::random::<u64>()
    );
    let result = run_worker_until(worker_config(&url), std::future::pending()).await;
    assert!(matches!(result, Err(WorkerError::InitializeError(_))));
}
