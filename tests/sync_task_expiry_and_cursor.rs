use msgstore::config::{StoreConfig, DAY_MS};
use msgstore::db::{self, DequeueSyncTasks, SyncTask};
use msgstore::store::Store;

fn task(id: &str, attempts: i64, created_at: i64) -> SyncTask {
    SyncTask {
        id: id.to_string(),
        task_type: "delete-message".to_string(),
        data: serde_json::json!({ "target": id }),
        attempts,
        created_at,
        envelope_id: format!("env-{id}"),
        sent_at: created_at,
    }
}

fn ids(tasks: &[SyncTask]) -> Vec<&str> {
    tasks.iter().map(|t| t.id.as_str()).collect()
}

#[tokio::test]
async fn expired_tasks_stay_stored_but_are_never_dequeued() {
    let temp = tempfile::tempdir().expect("tempdir");
    let config = StoreConfig::for_test();
    let max_attempts = config.max_sync_task_attempts;
    let store = Store::initialize(temp.path(), "pw", config)
        .await
        .expect("initialize");

    let now = db::now_ms();
    store
        .save_sync_tasks(vec![
            task("old-and-failing", max_attempts, now - 10 * DAY_MS),
            task("recent-and-failing", max_attempts, now),
            task("old-but-fresh", 0, now - 10 * DAY_MS),
        ])
        .await
        .expect("save");

    let first = store
        .dequeue_oldest_sync_tasks(DequeueSyncTasks::default())
        .await
        .expect("dequeue");
    assert_eq!(ids(&first.tasks), vec!["recent-and-failing", "old-but-fresh"]);
    assert_eq!(first.tasks[1].attempts, 1);

    let again = store
        .dequeue_oldest_sync_tasks(DequeueSyncTasks {
            after_row_id: first.last_row_id,
            ..DequeueSyncTasks::default()
        })
        .await
        .expect("dequeue after cursor");
    assert!(again.tasks.is_empty());
    assert_eq!(again.last_row_id, None);

    store
        .save_sync_tasks(vec![task("late", 0, now)])
        .await
        .expect("save late");
    let late = store
        .dequeue_oldest_sync_tasks(DequeueSyncTasks {
            after_row_id: first.last_row_id,
            increment_attempts: false,
            ..DequeueSyncTasks::default()
        })
        .await
        .expect("dequeue late");
    assert_eq!(ids(&late.tasks), vec!["late"]);
    assert_eq!(late.tasks[0].attempts, 0);

    assert_eq!(store.delete_expired_sync_tasks().await.expect("cleanup"), 1);
    assert_eq!(
        store.remove_sync_task_by_id("late").await.expect("remove"),
        1
    );
    assert_eq!(
        store
            .remove_sync_tasks(vec!["recent-and-failing".to_string(), "old-but-fresh".to_string()])
            .await
            .expect("remove rest"),
        2
    );

    store.close().await.expect("close");
}

#[tokio::test]
async fn crash_recovery_increment_counts_every_task() {
    let temp = tempfile::tempdir().expect("tempdir");
    let store = Store::initialize(temp.path(), "pw", StoreConfig::for_test())
        .await
        .expect("initialize");

    let now = db::now_ms();
    store
        .save_sync_tasks(vec![task("a", 0, now), task("b", 3, now)])
        .await
        .expect("save");
    assert_eq!(
        store.increment_all_sync_task_attempts().await.expect("increment"),
        2
    );

    let read = store
        .dequeue_oldest_sync_tasks(DequeueSyncTasks {
            increment_attempts: false,
            ..DequeueSyncTasks::default()
        })
        .await
        .expect("dequeue");
    let attempts: Vec<i64> = read.tasks.iter().map(|t| t.attempts).collect();
    assert_eq!(attempts, vec![1, 4]);

    store.close().await.expect("close");
}
