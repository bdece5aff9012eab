use super::*;

fn open_test_db() -> (tempfile::TempDir, Connection) {
    let dir = tempfile::tempdir().expect("tempdir");
    let conn = open(dir.path(), None, &StoreConfig::for_test()).expect("open");
    (dir, conn)
}

fn message(id: &str, conversation_id: &str, received_at: i64, body: &str) -> MessageAttributes {
    MessageAttributes {
        id: id.to_string(),
        conversation_id: conversation_id.to_string(),
        message_type: "incoming".to_string(),
        sent_at: received_at - 1,
        received_at,
        body: Some(body.to_string()),
        ..MessageAttributes::default()
    }
}

#[test]
fn open_enables_foreign_keys_and_reaches_latest_version() {
    let (_dir, conn) = open_test_db();
    let foreign_keys: i64 = conn
        .query_row("PRAGMA foreign_keys", [], |row| row.get(0))
        .expect("foreign_keys");
    assert_eq!(foreign_keys, 1);
    assert_eq!(
        user_version(&conn).expect("user_version"),
        crate::migrate::max_version()
    );
}

#[test]
fn save_assigns_an_id_when_missing() {
    let (_dir, conn) = open_test_db();
    let id = save_message(&conn, &message("", "c1", 10, "hello")).expect("save");
    assert!(!id.is_empty());

    let stored = get_message_by_id(&conn, &id).expect("get").expect("exists");
    assert_eq!(stored.id, id);
    assert_eq!(stored.body.as_deref(), Some("hello"));
}

#[test]
fn numeric_looking_ids_read_back_as_text() {
    let (_dir, conn) = open_test_db();
    save_message(&conn, &message("42", "c1", 10, "numeric")).expect("save 42");
    save_message(&conn, &message("m2", "c1", 20, "plain")).expect("save m2");

    let stored_type: String = conn
        .query_row("SELECT typeof(id) FROM messages WHERE id = '42'", [], |row| {
            row.get(0)
        })
        .expect("typeof");
    assert_eq!(stored_type, "integer");

    let stored = get_message_by_id(&conn, "42").expect("get").expect("exists");
    assert_eq!(stored.id, "42");

    let page = get_messages_by_conversation(&conn, "c1", 10, None).expect("page");
    let ids: Vec<&str> = page.iter().map(|m| m.id.as_str()).collect();
    assert_eq!(ids, ["m2", "42"]);

    let by_id = get_messages_by_id(&conn, &["42".to_string()]).expect("by id");
    assert_eq!(by_id.len(), 1);
    let found = search_messages(&conn, "numeric", None, 10).expect("search");
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].id, "42");
}

#[test]
fn resaving_a_message_keeps_its_download_jobs() {
    let (_dir, conn) = open_test_db();
    save_message(&conn, &message("m1", "c1", 10, "first")).expect("save");
    conn.execute(
        r#"INSERT INTO attachment_downloads (
             messageId, attachmentType, attachmentJson, digest, contentType, size,
             receivedAt, sentAt, active, attempts, source, originalSource, ciphertextSize
           ) VALUES ('m1', 'attachment', '{}', 'd1', 'image/png', 1, 10, 9, 0, 0,
                     'standard', 'standard', 1)"#,
        [],
    )
    .expect("insert job");

    save_message(&conn, &message("m1", "c1", 10, "edited")).expect("resave");

    let jobs: i64 = conn
        .query_row("SELECT count(*) FROM attachment_downloads", [], |row| row.get(0))
        .expect("count");
    assert_eq!(jobs, 1);
    let stored = get_message_by_id(&conn, "m1").expect("get").expect("exists");
    assert_eq!(stored.body.as_deref(), Some("edited"));
}

#[test]
fn conversation_listing_is_newest_first_and_pages_backwards() {
    let (_dir, conn) = open_test_db();
    for (id, at) in [("a", 10), ("b", 30), ("c", 20)] {
        save_message(&conn, &message(id, "c1", at, id)).expect("save");
    }
    save_message(&conn, &message("other", "c2", 40, "x")).expect("save");

    let page = get_messages_by_conversation(&conn, "c1", 2, None).expect("page");
    let ids: Vec<&str> = page.iter().map(|m| m.id.as_str()).collect();
    assert_eq!(ids, vec!["b", "c"]);

    let older = get_messages_by_conversation(&conn, "c1", 2, Some(20)).expect("older");
    let ids: Vec<&str> = older.iter().map(|m| m.id.as_str()).collect();
    assert_eq!(ids, vec!["a"]);

    assert_eq!(get_message_count(&conn, Some("c1")).expect("count"), 3);
    assert_eq!(get_message_count(&conn, None).expect("count"), 4);
}

#[test]
fn search_matches_prefixes_and_skips_view_once() {
    let (_dir, conn) = open_test_db();
    save_message(&conn, &message("m1", "c1", 10, "lunch tomorrow?")).expect("save");
    save_message(&conn, &message("m2", "c2", 20, "lunchbox")).expect("save");
    let mut secret = message("m3", "c1", 30, "lunch secret");
    secret.is_view_once = Some(true);
    save_message(&conn, &secret).expect("save");

    let found = search_messages(&conn, "lunch", None, 10).expect("search");
    let ids: Vec<&str> = found.iter().map(|m| m.id.as_str()).collect();
    assert_eq!(ids, vec!["m2", "m1"]);

    let scoped = search_messages(&conn, "lunch", Some("c1"), 10).expect("search");
    assert_eq!(scoped.len(), 1);
    assert_eq!(scoped[0].id, "m1");

    assert!(search_messages(&conn, "   ", None, 10).expect("search").is_empty());
    // Quotes and operators in the input are matched literally.
    assert!(search_messages(&conn, "\"lunch OR", None, 10).is_ok());
}

#[test]
fn remove_messages_cascades_to_attachment_rows() {
    let (_dir, conn) = open_test_db();
    let mut m1 = message("m1", "c1", 10, "with file");
    m1.attachments = Some(vec![Attachment {
        content_type: Some("application/pdf".to_string()),
        path: Some("aa/bb".to_string()),
        ..Attachment::default()
    }]);
    save_message(&conn, &m1).expect("save");
    save_message(&conn, &message("m2", "c1", 20, "plain")).expect("save");

    let removed = remove_messages(&conn, &["m1".to_string(), "m2".to_string()]).expect("remove");
    assert_eq!(removed, 2);

    let rows: i64 = conn
        .query_row("SELECT count(*) FROM message_attachments", [], |row| row.get(0))
        .expect("count");
    assert_eq!(rows, 0);
    assert!(get_message_by_id(&conn, "m1").expect("get").is_none());
}

#[test]
fn reenabling_insert_triggers_indexes_messages_saved_while_disabled() {
    let (_dir, conn) = open_test_db();
    disable_message_insert_triggers(&conn).expect("disable");
    save_message(&conn, &message("m1", "c1", 10, "imported quietly")).expect("save");
    assert!(search_messages(&conn, "quietly", None, 10).expect("search").is_empty());

    ensure_message_insert_triggers_are_enabled(&conn).expect("enable");
    let found = search_messages(&conn, "quietly", None, 10).expect("search");
    assert_eq!(found.len(), 1);

    save_message(&conn, &message("m2", "c1", 20, "quietly live")).expect("save");
    let found = search_messages(&conn, "quietly", None, 10).expect("search");
    assert_eq!(found.len(), 2);
    let flag = get_item_by_id(&conn, "messageInsertTriggersDisabled")
        .expect("item")
        .expect("exists");
    assert_eq!(flag["value"], Value::Bool(false));
}

#[test]
fn fts_secure_delete_is_on_after_open() {
    let (_dir, conn) = open_test_db();
    let value: i64 = conn
        .query_row(
            "SELECT v FROM messages_fts_config WHERE k = 'secure-delete'",
            [],
            |row| row.get(0),
        )
        .expect("config");
    assert_eq!(value, 1);
}
