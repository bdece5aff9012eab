// v1040: the JSON-blob download queue becomes a typed table keyed by
// (messageId, attachmentType, digest) that is removed with its message.

const V1040_CREATE_ATTACHMENT_DOWNLOADS: &str = r#"
ALTER TABLE attachment_downloads RENAME TO legacy_attachment_downloads;
DROP INDEX IF EXISTS attachment_downloads_timestamp;
DROP INDEX IF EXISTS attachment_downloads_pending;

CREATE TABLE attachment_downloads (
  messageId TEXT NOT NULL REFERENCES messages(id) ON DELETE CASCADE,
  attachmentType TEXT NOT NULL,
  attachmentJson TEXT NOT NULL,
  digest TEXT NOT NULL,
  contentType TEXT NOT NULL,
  size INTEGER NOT NULL,
  receivedAt INTEGER NOT NULL,
  sentAt INTEGER NOT NULL,
  active INTEGER NOT NULL,
  attempts INTEGER NOT NULL,
  retryAfter INTEGER,
  lastAttemptTimestamp INTEGER,

  PRIMARY KEY (messageId, attachmentType, digest)
) STRICT;

CREATE INDEX attachment_downloads_active_receivedAt
  ON attachment_downloads (active, receivedAt);
CREATE INDEX attachment_downloads_active_messageId
  ON attachment_downloads (active, messageId);
"#;

/// A legacy row, as far as it can be carried over.
#[derive(Clone, Debug, PartialEq)]
struct LegacyDownload {
    message_id: String,
    attachment_type: String,
    attachment_json: String,
    digest: String,
    content_type: String,
    size: i64,
    timestamp: i64,
    attempts: i64,
}

impl LegacyDownload {
    fn from_json(json: &Map<String, Value>) -> Option<Self> {
        let attachment = json.get("attachment")?.as_object()?;
        let text = |obj: &Map<String, Value>, key: &str| {
            obj.get(key)
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };
        Some(Self {
            message_id: text(json, "messageId")?,
            attachment_type: text(json, "type").unwrap_or_else(|| "attachment".to_string()),
            attachment_json: Value::Object(attachment.clone()).to_string(),
            digest: text(attachment, "digest")?,
            content_type: text(attachment, "contentType")?,
            size: attachment.get("size").and_then(Value::as_i64).unwrap_or(0),
            timestamp: json.get("timestamp").and_then(Value::as_i64).unwrap_or(0),
            attempts: json.get("attempts").and_then(Value::as_i64).unwrap_or(0),
        })
    }
}

fn v1040_attachment_downloads(conn: &Connection, _ctx: &StepContext) -> Result<StepOutcome> {
    conn.execute_batch(V1040_CREATE_ATTACHMENT_DOWNLOADS)?;

    let mut legacy = Vec::new();
    {
        let mut stmt =
            conn.prepare("SELECT json FROM legacy_attachment_downloads ORDER BY rowid ASC")?;
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            legacy.push(row.get::<_, Option<String>>(0)?);
        }
    }

    let total = legacy.len();
    let mut migrated = 0usize;
    {
        let mut message_exists = conn.prepare("SELECT 1 FROM messages WHERE id = ?1")?;
        // First row wins for duplicate keys.
        let mut insert = conn.prepare(
            "INSERT OR IGNORE INTO attachment_downloads (
               messageId, attachmentType, attachmentJson, digest, contentType,
               size, receivedAt, sentAt, active, attempts, retryAfter, lastAttemptTimestamp
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7, 0, ?8, NULL, NULL)",
        )?;
        for json_text in legacy {
            let Some(job) = parse_json_object(json_text.as_deref())
                .as_ref()
                .and_then(LegacyDownload::from_json)
            else {
                continue;
            };
            if !message_exists.exists(params![job.message_id])? {
                continue;
            }
            migrated += insert.execute(params![
                job.message_id,
                job.attachment_type,
                job.attachment_json,
                job.digest,
                job.content_type,
                job.size,
                job.timestamp,
                job.attempts
            ])?;
        }
    }

    conn.execute_batch("DROP TABLE legacy_attachment_downloads;")?;
    tracing::info!(
        legacy = total,
        migrated,
        dropped = total - migrated,
        "migrated attachment download jobs"
    );
    Ok(StepOutcome::Done)
}
