const V1060_SYNC_TASKS: &str = r#"
CREATE TABLE syncTasks(
  id TEXT PRIMARY KEY NOT NULL,
  attempts INTEGER NOT NULL,
  createdAt INTEGER NOT NULL,
  data TEXT NOT NULL,
  envelopeId TEXT NOT NULL,
  sentAt INTEGER NOT NULL,
  type TEXT NOT NULL
) STRICT;

CREATE INDEX syncTasks_order ON syncTasks (createdAt, sentAt, id);
"#;

const V1180_DOWNLOAD_SOURCE: &str = r#"
ALTER TABLE attachment_downloads
  ADD COLUMN source TEXT NOT NULL DEFAULT 'standard';
ALTER TABLE attachment_downloads
  ADD COLUMN ciphertextSize INTEGER NOT NULL DEFAULT 0;
"#;

const V1200_DOWNLOAD_SOURCE_INDEX: &str = r#"
CREATE INDEX attachment_downloads_source_ciphertextSize
  ON attachment_downloads (source, ciphertextSize);
"#;

// v1260: an AUTOINCREMENT rowid never reuses values, so a dequeue cursor
// can't skip a task inserted after older tasks were removed.
const V1260_SYNC_TASKS_ROWID: &str = r#"
DROP INDEX IF EXISTS syncTasks_order;
ALTER TABLE syncTasks RENAME TO syncTasks_old;

CREATE TABLE syncTasks(
  rowid INTEGER PRIMARY KEY AUTOINCREMENT,
  id TEXT NOT NULL UNIQUE,
  attempts INTEGER NOT NULL,
  createdAt INTEGER NOT NULL,
  data TEXT NOT NULL,
  envelopeId TEXT NOT NULL,
  sentAt INTEGER NOT NULL,
  type TEXT NOT NULL
) STRICT;

INSERT INTO syncTasks (id, attempts, createdAt, data, envelopeId, sentAt, type)
SELECT id, attempts, createdAt, data, envelopeId, sentAt, type
FROM syncTasks_old
ORDER BY createdAt ASC, sentAt ASC, id ASC;

DROP TABLE syncTasks_old;
"#;

fn v1260_sync_tasks_rowid(conn: &Connection, _ctx: &StepContext) -> Result<StepOutcome> {
    conn.execute_batch(V1260_SYNC_TASKS_ROWID)?;
    Ok(StepOutcome::NeedsVacuum)
}

const V1330_SYNC_TASKS_TYPE_INDEX: &str = "CREATE INDEX syncTasks_type ON syncTasks (type);";

const V1360_MESSAGE_ATTACHMENTS: &str = r#"
CREATE TABLE message_attachments (
  messageId TEXT NOT NULL REFERENCES messages(id) ON DELETE CASCADE,
  messageType TEXT NOT NULL,
  editHistoryIndex INTEGER NOT NULL,
  attachmentType TEXT NOT NULL,
  orderInMessage INTEGER NOT NULL,
  conversationId TEXT NOT NULL,
  sentAt INTEGER NOT NULL,
  receivedAt INTEGER NOT NULL,
  receivedAtMs INTEGER,
  clientUuid TEXT,
  size INTEGER,
  duration REAL,
  contentType TEXT,
  path TEXT,
  localKey TEXT,
  plaintextHash TEXT,
  caption TEXT,
  blurHash TEXT,
  height INTEGER,
  width INTEGER,
  digest TEXT,
  key TEXT,
  fileName TEXT,
  downloadPath TEXT,
  transitCdnKey TEXT,
  transitCdnNumber INTEGER,
  transitCdnUploadTimestamp INTEGER,
  backupCdnNumber INTEGER,
  incrementalMac TEXT,
  incrementalMacChunkSize INTEGER,
  thumbnailPath TEXT,
  thumbnailSize INTEGER,
  thumbnailContentType TEXT,
  thumbnailLocalKey TEXT,
  thumbnailVersion INTEGER,
  screenshotPath TEXT,
  screenshotSize INTEGER,
  screenshotContentType TEXT,
  screenshotLocalKey TEXT,
  screenshotVersion INTEGER,
  backupThumbnailPath TEXT,
  backupThumbnailSize INTEGER,
  backupThumbnailContentType TEXT,
  backupThumbnailLocalKey TEXT,
  backupThumbnailVersion INTEGER,
  storyTextAttachmentJson TEXT,
  localBackupPath TEXT,
  flags INTEGER,
  error INTEGER,
  wasTooBig INTEGER,
  backfillError INTEGER,
  isCorrupted INTEGER,
  isViewOnce INTEGER,
  copiedFromQuotedAttachment INTEGER,
  version INTEGER,
  pending INTEGER,

  PRIMARY KEY (messageId, editHistoryIndex, attachmentType, orderInMessage)
) STRICT;
"#;

const V1370_MESSAGE_ATTACHMENT_INDICES: &str = r#"
CREATE INDEX message_attachments_plaintextHash ON message_attachments (plaintextHash);
CREATE INDEX message_attachments_path ON message_attachments (path);
CREATE INDEX message_attachments_digest ON message_attachments (digest);
CREATE INDEX message_attachments_all_thumbnailPath
  ON message_attachments (thumbnailPath);
CREATE INDEX message_attachments_all_screenshotPath
  ON message_attachments (screenshotPath);
CREATE INDEX message_attachments_all_backupThumbnailPath
  ON message_attachments (backupThumbnailPath);
"#;

const V1420_BACKUP_IMPORT_SOURCE: &str = "backup_import";

/// Adds `originalSource` and a single-row byte counter for backup-import
/// downloads. Triggers keep the counter current on every write path.
fn v1420_backup_download_stats(conn: &Connection, _ctx: &StepContext) -> Result<StepOutcome> {
    conn.execute_batch(
        r#"
        ALTER TABLE attachment_downloads
          ADD COLUMN originalSource TEXT NOT NULL DEFAULT 'standard';
        UPDATE attachment_downloads SET originalSource = source;

        CREATE TABLE attachment_downloads_backup_stats (
          id INTEGER PRIMARY KEY CHECK (id = 0),
          totalBytes INTEGER NOT NULL,
          completedBytes INTEGER NOT NULL
        ) STRICT;
        "#,
    )?;

    let backup = || crate::sql::sql_constant(V1420_BACKUP_IMPORT_SOURCE);

    crate::sql!(
        "INSERT INTO attachment_downloads_backup_stats (id, totalBytes, completedBytes)
         SELECT 0, COALESCE(SUM(ciphertextSize), 0), 0
         FROM attachment_downloads WHERE originalSource = ",
        backup()
    )
    .execute(conn)?;

    let triggers = [
        crate::sql_fragment!(
            "CREATE TRIGGER attachment_downloads_backup_job_insert
             AFTER INSERT ON attachment_downloads
             WHEN NEW.originalSource = ",
            backup(),
            " BEGIN
               UPDATE attachment_downloads_backup_stats
               SET totalBytes = totalBytes + NEW.ciphertextSize
               WHERE id = 0;
             END;"
        ),
        crate::sql_fragment!(
            "CREATE TRIGGER attachment_downloads_backup_job_update
             AFTER UPDATE OF ciphertextSize ON attachment_downloads
             WHEN NEW.originalSource = ",
            backup(),
            " BEGIN
               UPDATE attachment_downloads_backup_stats
               SET totalBytes = MAX(0, totalBytes - OLD.ciphertextSize + NEW.ciphertextSize)
               WHERE id = 0;
             END;"
        ),
        crate::sql_fragment!(
            "CREATE TRIGGER attachment_downloads_backup_job_delete
             AFTER DELETE ON attachment_downloads
             WHEN OLD.originalSource = ",
            backup(),
            " BEGIN
               UPDATE attachment_downloads_backup_stats
               SET completedBytes = completedBytes + OLD.ciphertextSize
               WHERE id = 0;
             END;"
        ),
    ];
    for trigger in triggers {
        conn.execute_batch(trigger.text())?;
    }

    Ok(StepOutcome::Done)
}
