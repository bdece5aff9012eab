use super::*;

fn open_test_db() -> (tempfile::TempDir, Connection) {
    let dir = tempfile::tempdir().expect("tempdir");
    let conn = open(dir.path(), None, &StoreConfig::for_test()).expect("open");
    (dir, conn)
}

fn task(id: &str, task_type: &str, attempts: i64, created_at: i64) -> SyncTask {
    SyncTask {
        id: id.to_string(),
        task_type: task_type.to_string(),
        data: json!({ "type": task_type, "target": id }),
        attempts,
        created_at,
        envelope_id: format!("env-{id}"),
        sent_at: created_at,
    }
}

const NOW: i64 = 100 * crate::config::DAY_MS;

fn expiry() -> SyncTaskExpiry {
    SyncTaskExpiry::from_config(&StoreConfig::for_test())
}

fn ids(tasks: &[SyncTask]) -> Vec<&str> {
    tasks.iter().map(|t| t.id.as_str()).collect()
}

#[test]
fn dequeue_follows_insertion_order_and_counts_attempts() {
    let (_dir, conn) = open_test_db();
    // created_at deliberately out of order: insertion order wins.
    save_sync_tasks(
        &conn,
        &[task("a", "read", 0, NOW - 1), task("b", "read", 2, NOW - 5), task("c", "delete", 0, NOW)],
    )
    .expect("save");

    let first = dequeue_oldest_sync_tasks(&conn, &DequeueSyncTasks::default(), NOW, &expiry())
        .expect("dequeue");
    assert_eq!(ids(&first.tasks), vec!["a", "b", "c"]);
    let attempts: Vec<i64> = first.tasks.iter().map(|t| t.attempts).collect();
    assert_eq!(attempts, vec![1, 3, 1]);
    assert_eq!(first.tasks[0].data["target"], json!("a"));

    let stored = get_all_sync_tasks(&conn).expect("all");
    assert_eq!(stored[1].attempts, 3);

    let rest = dequeue_oldest_sync_tasks(
        &conn,
        &DequeueSyncTasks {
            after_row_id: first.last_row_id,
            ..DequeueSyncTasks::default()
        },
        NOW,
        &expiry(),
    )
    .expect("dequeue");
    assert!(rest.tasks.is_empty());
    assert_eq!(rest.last_row_id, None);
}

#[test]
fn cursor_picks_up_tasks_saved_after_removals() {
    let (_dir, conn) = open_test_db();
    save_sync_tasks(&conn, &[task("a", "read", 0, NOW), task("b", "read", 0, NOW)]).expect("save");
    let first = dequeue_oldest_sync_tasks(&conn, &DequeueSyncTasks::default(), NOW, &expiry())
        .expect("dequeue");
    remove_sync_tasks(&conn, &["a".to_string(), "b".to_string()]).expect("remove");

    save_sync_task(&conn, &task("c", "read", 0, NOW - 10)).expect("save");
    let next = dequeue_oldest_sync_tasks(
        &conn,
        &DequeueSyncTasks {
            after_row_id: first.last_row_id,
            ..DequeueSyncTasks::default()
        },
        NOW,
        &expiry(),
    )
    .expect("dequeue");
    assert_eq!(ids(&next.tasks), vec!["c"]);
}

#[test]
fn type_filter_and_no_increment() {
    let (_dir, conn) = open_test_db();
    save_sync_tasks(
        &conn,
        &[task("a", "read", 0, NOW), task("b", "delete", 0, NOW), task("c", "read", 0, NOW)],
    )
    .expect("save");

    let dequeued = dequeue_oldest_sync_tasks(
        &conn,
        &DequeueSyncTasks {
            increment_attempts: false,
            types: vec!["read".to_string()],
            ..DequeueSyncTasks::default()
        },
        NOW,
        &expiry(),
    )
    .expect("dequeue");
    assert_eq!(ids(&dequeued.tasks), vec!["a", "c"]);
    assert!(get_all_sync_tasks(&conn)
        .expect("all")
        .iter()
        .all(|t| t.attempts == 0));
}

#[test]
fn expired_tasks_are_skipped_then_deleted() {
    let (_dir, conn) = open_test_db();
    let expiry = expiry();
    let old = NOW - expiry.retention_ms - 1;
    save_sync_tasks(
        &conn,
        &[
            task("worn-out-and-old", "read", expiry.max_attempts, old),
            task("worn-out-but-recent", "read", expiry.max_attempts, NOW),
            task("old-but-fresh", "read", 0, old),
        ],
    )
    .expect("save");

    let dequeued = dequeue_oldest_sync_tasks(&conn, &DequeueSyncTasks::default(), NOW, &expiry)
        .expect("dequeue");
    assert_eq!(ids(&dequeued.tasks), vec!["worn-out-but-recent", "old-but-fresh"]);

    let expired_attempts = get_all_sync_tasks(&conn).expect("all")[0].attempts;
    assert_eq!(expired_attempts, expiry.max_attempts);

    assert_eq!(delete_expired_sync_tasks(&conn, NOW, &expiry).expect("delete"), 1);
    assert_eq!(get_all_sync_tasks(&conn).expect("all").len(), 2);
}

#[test]
fn bulk_increment_and_single_removal() {
    let (_dir, conn) = open_test_db();
    save_sync_tasks(&conn, &[task("a", "read", 0, NOW), task("b", "read", 4, NOW)]).expect("save");
    assert_eq!(increment_all_sync_task_attempts(&conn).expect("increment"), 2);
    assert_eq!(remove_sync_task_by_id(&conn, "a").expect("remove"), 1);

    let all = get_all_sync_tasks(&conn).expect("all");
    assert_eq!(ids(&all), vec!["b"]);
    assert_eq!(all[0].attempts, 5);
}
