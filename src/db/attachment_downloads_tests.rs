use super::*;

fn open_test_db() -> (tempfile::TempDir, Connection) {
    let dir = tempfile::tempdir().expect("tempdir");
    let conn = open(dir.path(), None, &StoreConfig::for_test()).expect("open");
    (dir, conn)
}

fn save_parent(conn: &Connection, id: &str) {
    let message = MessageAttributes {
        id: id.to_string(),
        conversation_id: "c1".to_string(),
        message_type: "incoming".to_string(),
        ..MessageAttributes::default()
    };
    save_message(conn, &message).expect("save message");
}

fn job(message_id: &str, digest: &str, received_at: i64) -> AttachmentDownloadJob {
    AttachmentDownloadJob {
        message_id: message_id.to_string(),
        attachment_type: AttachmentType::Attachment,
        digest: digest.to_string(),
        attachment: Attachment {
            digest: Some(digest.to_string()),
            content_type: Some("image/png".to_string()),
            ..Attachment::default()
        },
        content_type: "image/png".to_string(),
        size: 10,
        ciphertext_size: 16,
        received_at,
        sent_at: received_at,
        active: false,
        attempts: 0,
        retry_after: None,
        last_attempt_timestamp: None,
        source: AttachmentDownloadSource::Standard,
        original_source: AttachmentDownloadSource::Standard,
    }
}

fn digests(jobs: &[AttachmentDownloadJob]) -> Vec<&str> {
    jobs.iter().map(|j| j.digest.as_str()).collect()
}

#[test]
fn jobs_for_missing_messages_are_not_saved() {
    let (_dir, conn) = open_test_db();
    assert!(!save_attachment_download_job(&conn, &job("nope", "d1", 1)).expect("save"));
    let stored = get_attachment_download_job(&conn, &job("nope", "d1", 1).key()).expect("get");
    assert!(stored.is_none());
}

#[test]
fn resave_updates_in_place_and_keeps_original_source() {
    let (_dir, conn) = open_test_db();
    save_parent(&conn, "m1");
    let mut first = job("m1", "d1", 1);
    first.source = AttachmentDownloadSource::BackupImport;
    first.original_source = AttachmentDownloadSource::BackupImport;
    assert!(save_attachment_download_job(&conn, &first).expect("save"));

    let mut second = first.clone();
    second.source = AttachmentDownloadSource::Standard;
    second.original_source = AttachmentDownloadSource::Standard;
    second.attempts = 2;
    assert!(save_attachment_download_job(&conn, &second).expect("save"));

    let stored = get_attachment_download_job(&conn, &first.key())
        .expect("get")
        .expect("exists");
    assert_eq!(stored.attempts, 2);
    assert_eq!(stored.source, AttachmentDownloadSource::Standard);
    assert_eq!(stored.original_source, AttachmentDownloadSource::BackupImport);

    let count: i64 = conn
        .query_row("SELECT count(*) FROM attachment_downloads", [], |row| row.get(0))
        .expect("count");
    assert_eq!(count, 1);
}

#[test]
fn prioritized_jobs_come_first_then_newest_standard_jobs() {
    let (_dir, conn) = open_test_db();
    for id in ["m1", "m2", "m3"] {
        save_parent(&conn, id);
    }
    let now = 10_000_000;
    save_attachment_download_job(&conn, &job("m1", "old", 1)).expect("save");
    save_attachment_download_job(&conn, &job("m2", "new", 3)).expect("save");
    save_attachment_download_job(&conn, &job("m3", "mid", 2)).expect("save");
    let mut waiting = job("m3", "waiting", 4);
    waiting.retry_after = Some(now + 1);
    save_attachment_download_job(&conn, &waiting).expect("save");

    let query = NextDownloadJobsQuery {
        limit: Some(3),
        prioritized_message_ids: vec!["m1".to_string()],
        ..NextDownloadJobsQuery::default()
    };
    let jobs = get_next_attachment_download_jobs(&conn, &query, now, crate::config::HOUR_MS)
        .expect("next");
    assert_eq!(digests(&jobs), vec!["old", "new", "mid"]);

    // A prioritized message also matching the standard phase is not repeated.
    let query = NextDownloadJobsQuery {
        limit: Some(5),
        prioritized_message_ids: vec!["m2".to_string()],
        ..NextDownloadJobsQuery::default()
    };
    let jobs = get_next_attachment_download_jobs(&conn, &query, now, crate::config::HOUR_MS)
        .expect("next");
    assert_eq!(digests(&jobs), vec!["new", "mid", "old"]);
}

#[test]
fn long_prioritized_id_lists_are_queried_in_batches() {
    let (_dir, conn) = open_test_db();
    for id in ["m1", "m2"] {
        save_parent(&conn, id);
    }
    save_attachment_download_job(&conn, &job("m1", "late", 5)).expect("save");
    save_attachment_download_job(&conn, &job("m2", "early", 1)).expect("save");

    // The two real ids sit in different batches, behind padding.
    let mut prioritized: Vec<String> = (0..MAX_VARIABLE_COUNT)
        .map(|i| format!("absent-{i}"))
        .collect();
    prioritized.insert(3, "m1".to_string());
    prioritized.push("m2".to_string());

    let query = NextDownloadJobsQuery {
        limit: Some(1),
        prioritized_message_ids: prioritized,
        ..NextDownloadJobsQuery::default()
    };
    let jobs = get_next_attachment_download_jobs(&conn, &query, 10_000_000, crate::config::HOUR_MS)
        .expect("next");
    assert_eq!(digests(&jobs), vec!["early"]);
}

#[test]
fn prioritized_jobs_ignore_retry_after_but_respect_last_attempt() {
    let (_dir, conn) = open_test_db();
    save_parent(&conn, "m1");
    let now = 10_000_000;
    let mut recent = job("m1", "recent", 1);
    recent.retry_after = Some(now + 1_000);
    recent.last_attempt_timestamp = Some(now - 10);
    save_attachment_download_job(&conn, &recent).expect("save");
    let mut stale = job("m1", "stale", 2);
    stale.retry_after = Some(now + 1_000);
    stale.last_attempt_timestamp = Some(now - 2 * crate::config::HOUR_MS);
    save_attachment_download_job(&conn, &stale).expect("save");

    let query = NextDownloadJobsQuery {
        prioritized_message_ids: vec!["m1".to_string()],
        ..NextDownloadJobsQuery::default()
    };
    let jobs = get_next_attachment_download_jobs(&conn, &query, now, crate::config::HOUR_MS)
        .expect("next");
    assert_eq!(digests(&jobs), vec!["stale"]);
}

#[test]
fn source_filter_limits_both_phases() {
    let (_dir, conn) = open_test_db();
    save_parent(&conn, "m1");
    let mut backup = job("m1", "backup", 1);
    backup.source = AttachmentDownloadSource::BackupImport;
    save_attachment_download_job(&conn, &backup).expect("save");
    save_attachment_download_job(&conn, &job("m1", "standard", 2)).expect("save");

    let query = NextDownloadJobsQuery {
        prioritized_message_ids: vec!["m1".to_string()],
        sources: vec![AttachmentDownloadSource::BackupImport],
        ..NextDownloadJobsQuery::default()
    };
    let jobs = get_next_attachment_download_jobs(&conn, &query, 5, crate::config::HOUR_MS)
        .expect("next");
    assert_eq!(digests(&jobs), vec!["backup"]);
}

#[test]
fn malformed_rows_are_deleted_and_skipped() {
    let (_dir, conn) = open_test_db();
    save_parent(&conn, "m1");
    save_attachment_download_job(&conn, &job("m1", "good", 1)).expect("save");
    save_attachment_download_job(&conn, &job("m1", "bad", 2)).expect("save");
    conn.execute(
        "UPDATE attachment_downloads SET attachmentJson = 'not json' WHERE digest = 'bad'",
        [],
    )
    .expect("corrupt");

    let jobs = get_next_attachment_download_jobs(
        &conn,
        &NextDownloadJobsQuery::default(),
        5,
        crate::config::HOUR_MS,
    )
    .expect("next");
    assert_eq!(digests(&jobs), vec!["good"]);
    let remaining: i64 = conn
        .query_row("SELECT count(*) FROM attachment_downloads", [], |row| row.get(0))
        .expect("count");
    assert_eq!(remaining, 1);
}

#[test]
fn retryable_failures_back_off_until_attempts_run_out() {
    let (_dir, conn) = open_test_db();
    save_parent(&conn, "m1");
    let config = StoreConfig {
        max_download_attempts: 2,
        ..StoreConfig::for_test()
    };
    let pending = job("m1", "d1", 1);
    save_attachment_download_job(&conn, &pending).expect("save");
    let key = pending.key();

    assert!(mark_attachment_download_job_active(&conn, &key, 100).expect("mark"));
    let state = finish_attachment_download_job(
        &conn,
        &key,
        AttachmentDownloadResult::FailedRetryable,
        100,
        &config,
    )
    .expect("finish");
    assert_eq!(
        state,
        AttachmentDownloadJobState::Retrying {
            attempts: 1,
            retry_after: 100 + config.download_backoff_for(1),
        }
    );
    let stored = get_attachment_download_job(&conn, &key).expect("get").expect("exists");
    assert!(!stored.active);
    assert_eq!(stored.last_attempt_timestamp, Some(100));

    let state = finish_attachment_download_job(
        &conn,
        &key,
        AttachmentDownloadResult::FailedRetryable,
        200,
        &config,
    )
    .expect("finish");
    assert_eq!(state, AttachmentDownloadJobState::Failed);
    assert!(get_attachment_download_job(&conn, &key).expect("get").is_none());

    let state = finish_attachment_download_job(
        &conn,
        &key,
        AttachmentDownloadResult::Succeeded,
        300,
        &config,
    )
    .expect("finish");
    assert_eq!(state, AttachmentDownloadJobState::Missing);
}

#[test]
fn backup_progress_tracks_inserted_and_finished_jobs() {
    let (_dir, conn) = open_test_db();
    save_parent(&conn, "m1");
    reset_backup_attachment_download_stats(&conn).expect("reset");

    let mut backup = job("m1", "d1", 1);
    backup.source = AttachmentDownloadSource::BackupImport;
    backup.original_source = AttachmentDownloadSource::BackupImport;
    backup.ciphertext_size = 1_000;
    save_attachment_download_job(&conn, &backup).expect("save");
    save_attachment_download_job(&conn, &job("m1", "d2", 1)).expect("save");

    let progress = get_backup_attachment_download_progress(&conn).expect("progress");
    assert_eq!(
        progress,
        BackupDownloadProgress {
            total_bytes: 1_000,
            completed_bytes: 0
        }
    );

    finish_attachment_download_job(
        &conn,
        &backup.key(),
        AttachmentDownloadResult::Succeeded,
        10,
        &StoreConfig::for_test(),
    )
    .expect("finish");
    let progress = get_backup_attachment_download_progress(&conn).expect("progress");
    assert_eq!(progress.completed_bytes, 1_000);

    reset_backup_attachment_download_stats(&conn).expect("reset");
    assert_eq!(
        get_backup_attachment_download_progress(&conn).expect("progress"),
        BackupDownloadProgress::default()
    );
}

#[test]
fn bulk_resets_touch_only_their_rows() {
    let (_dir, conn) = open_test_db();
    save_parent(&conn, "m1");
    let mut backup = job("m1", "backup", 1);
    backup.source = AttachmentDownloadSource::BackupImport;
    backup.original_source = AttachmentDownloadSource::BackupImport;
    backup.retry_after = Some(99);
    backup.active = true;
    save_attachment_download_job(&conn, &backup).expect("save");
    let mut standard = job("m1", "standard", 2);
    standard.retry_after = Some(99);
    save_attachment_download_job(&conn, &standard).expect("save");

    assert_eq!(reset_attachment_download_active(&conn).expect("reset"), 1);
    assert_eq!(
        reset_backup_attachment_download_jobs_retry_after(&conn).expect("reset"),
        1
    );
    let stored = get_attachment_download_job(&conn, &standard.key())
        .expect("get")
        .expect("exists");
    assert_eq!(stored.retry_after, Some(99));

    assert_eq!(remove_all_backup_attachment_download_jobs(&conn).expect("remove"), 1);
    assert_eq!(
        remove_attachment_download_jobs_for_message(&conn, "m1").expect("remove"),
        1
    );
}

#[test]
fn removing_the_message_removes_its_jobs() {
    let (_dir, conn) = open_test_db();
    save_parent(&conn, "m1");
    save_attachment_download_job(&conn, &job("m1", "d1", 1)).expect("save");
    remove_message(&conn, "m1").expect("remove");
    assert!(get_attachment_download_job(&conn, &job("m1", "d1", 1).key())
        .expect("get")
        .is_none());
}
