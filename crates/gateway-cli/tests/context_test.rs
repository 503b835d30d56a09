//! Integration tests for the CLI's shared adapter wiring
//!
//! Each test points `Config::database.data_dir` at a fresh tempdir so the
//! SQLite state and audit databases `context::open_store`/`open_audit`
//! create are isolated per test, the same way `gateway-store`'s own
//! repository tests isolate themselves with an in-memory pool.

use gateway_core::config::Config;
use gateway_core::domain::{Drive, DriveId, DriveKind, RemoteItemId, Task, TaskId};
use gateway_core::ports::TaskRegistry;

#[path = "../src/context.rs"]
mod context;

fn test_config(data_dir: &std::path::Path) -> Config {
    let mut config = Config::default();
    config.database.data_dir = data_dir.to_path_buf();
    config
}

#[tokio::test]
async fn open_store_creates_data_dir_and_tables() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());

    let store = context::open_store(&config).await.expect("open_store should succeed");

    let drives = store.drives.list().await.expect("list should succeed on a fresh database");
    assert!(drives.is_empty());

    assert!(dir.path().join("state.db").exists());
}

#[tokio::test]
async fn open_audit_creates_separate_database_from_state() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());

    let _store = context::open_store(&config).await.unwrap();
    let _audit = context::open_audit(&config).await.expect("open_audit should succeed");

    assert!(dir.path().join("state.db").exists());
    assert!(dir.path().join("audit.db").exists());
}

#[tokio::test]
async fn drive_and_task_round_trip_through_the_store() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    let store = context::open_store(&config).await.unwrap();

    let drive_id = DriveId::new("drive115", 1_700_000_000_000);
    let drive = store
        .drives
        .create(Drive::new(drive_id.clone(), "test drive", DriveKind::Drive115))
        .await
        .expect("drive creation should succeed");
    assert_eq!(drive.id, drive_id);

    let task = Task::new(
        TaskId::new(),
        "movies".to_string(),
        drive_id.clone(),
        RemoteItemId::from("0".to_string()),
        dir.path().join("out"),
    )
    .expect("task construction should succeed");
    let task_id = task.task_id;

    store.tasks.create(task).await.expect("task creation should succeed");

    let loaded = store.tasks.get(&task_id).await.expect("task should be found");
    assert_eq!(loaded.drive_id, drive_id);
    assert_eq!(loaded.name, "movies");
}
