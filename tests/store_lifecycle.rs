use msgstore::auth;
use msgstore::config::StoreConfig;
use msgstore::db;
use msgstore::error::StoreError;
use msgstore::migrate;
use msgstore::model::MessageAttributes;
use msgstore::store::Store;

fn message(id: &str, body: &str) -> MessageAttributes {
    MessageAttributes {
        id: id.to_string(),
        conversation_id: "c1".to_string(),
        message_type: "incoming".to_string(),
        sent_at: 1,
        received_at: 1,
        body: Some(body.to_string()),
        ..MessageAttributes::default()
    }
}

#[tokio::test]
async fn store_reopens_with_its_passphrase_and_rejects_others() {
    let temp = tempfile::tempdir().expect("tempdir");
    let dir = temp.path().join("store");

    let store = Store::initialize(&dir, "pw", StoreConfig::for_test())
        .await
        .expect("initialize");
    store.save_message(message("m1", "hello")).await.expect("save");
    let (user_version, _) = store.schema_versions().await.expect("schema versions");
    assert_eq!(user_version, migrate::max_version());
    store.close().await.expect("close");

    let Err(err) = Store::initialize(&dir, "not-pw", StoreConfig::for_test()).await else {
        panic!("wrong passphrase was accepted");
    };
    assert!(matches!(
        err.downcast_ref::<StoreError>(),
        Some(StoreError::InvalidKey)
    ));

    let reopened = Store::initialize(&dir, "pw", StoreConfig::for_test())
        .await
        .expect("reopen");
    let stored = reopened
        .get_message_by_id("m1")
        .await
        .expect("get")
        .expect("message survives reopen");
    assert_eq!(stored.body.as_deref(), Some("hello"));
    reopened.close().await.expect("close");
}

#[tokio::test]
async fn remove_db_deletes_database_and_key_file() {
    let temp = tempfile::tempdir().expect("tempdir");
    let dir = temp.path().join("store");

    let store = Store::initialize(&dir, "pw", StoreConfig::for_test())
        .await
        .expect("initialize");
    store.save_message(message("m1", "hello")).await.expect("save");
    store.remove_db().await.expect("remove db");

    assert!(!db::db_path(&dir).exists());
    assert!(!auth::is_initialized(&dir));
    let err = store.get_message_count(None).await.expect_err("store is gone");
    assert!(matches!(err.downcast_ref::<StoreError>(), Some(StoreError::Closed)));

    let fresh = Store::initialize(&dir, "another-pw", StoreConfig::for_test())
        .await
        .expect("initialize fresh store");
    assert_eq!(fresh.get_message_count(None).await.expect("count"), 0);
    fresh.close().await.expect("close");
}
