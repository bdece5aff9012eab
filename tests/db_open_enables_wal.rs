use msgstore::config::StoreConfig;
use msgstore::db;

#[test]
fn db_open_enables_wal_and_foreign_keys() {
    let temp = tempfile::tempdir().expect("tempdir");
    let store_dir = temp.path().join("store");
    let conn = db::open(&store_dir, None, &StoreConfig::for_test()).expect("open db");

    let journal_mode: String = conn
        .query_row("PRAGMA journal_mode;", [], |row| row.get(0))
        .expect("read journal_mode");
    assert_eq!(journal_mode.to_lowercase(), "wal");

    let busy_timeout_ms: i64 = conn
        .query_row("PRAGMA busy_timeout;", [], |row| row.get(0))
        .expect("read busy_timeout");
    assert!(
        busy_timeout_ms >= 5_000,
        "expected busy_timeout >= 5000ms, got {busy_timeout_ms}"
    );

    let foreign_keys: i64 = conn
        .query_row("PRAGMA foreign_keys;", [], |row| row.get(0))
        .expect("read foreign_keys");
    assert_eq!(foreign_keys, 1);

    assert!(db::db_path(&store_dir).exists());
}
