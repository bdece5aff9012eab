#![cfg(feature = "sqlcipher")]

use msgstore::config::StoreConfig;
use msgstore::db;
use msgstore::error::StoreError;
use msgstore::model::MessageAttributes;
use msgstore::store::Store;

#[tokio::test]
async fn database_file_is_unreadable_without_the_key() {
    let temp = tempfile::tempdir().expect("tempdir");
    let dir = temp.path().join("store");

    let store = Store::initialize(&dir, "pw", StoreConfig::for_test())
        .await
        .expect("initialize");
    store
        .save_message(MessageAttributes {
            id: "m1".to_string(),
            conversation_id: "c1".to_string(),
            message_type: "incoming".to_string(),
            body: Some("top secret lunch plans".to_string()),
            ..MessageAttributes::default()
        })
        .await
        .expect("save");
    store.close().await.expect("close");

    let bytes = std::fs::read(db::db_path(&dir)).expect("read db file");
    assert!(!bytes.starts_with(b"SQLite format 3\0"));
    assert!(!bytes
        .windows(b"top secret".len())
        .any(|window| window == b"top secret"));

    let err = db::open(&dir, None, &StoreConfig::for_test()).expect_err("no key");
    assert!(matches!(
        err.downcast_ref::<StoreError>(),
        Some(StoreError::InvalidKey)
    ));

    let plain = rusqlite::Connection::open(db::db_path(&dir)).expect("open file");
    assert!(plain
        .query_row("SELECT count(*) FROM sqlite_master", [], |row| {
            row.get::<_, i64>(0)
        })
        .is_err());
}
