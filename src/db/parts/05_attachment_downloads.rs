#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AttachmentDownloadSource {
    Standard,
    BackupImport,
    BackupImportNoMedia,
    Backfill,
}

impl AttachmentDownloadSource {
    pub const fn as_str(self) -> &'static str {
        match self {
            AttachmentDownloadSource::Standard => "standard",
            AttachmentDownloadSource::BackupImport => "backup_import",
            AttachmentDownloadSource::BackupImportNoMedia => "backup_import_no_media",
            AttachmentDownloadSource::Backfill => "backfill",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        [
            AttachmentDownloadSource::Standard,
            AttachmentDownloadSource::BackupImport,
            AttachmentDownloadSource::BackupImportNoMedia,
            AttachmentDownloadSource::Backfill,
        ]
        .into_iter()
        .find(|s| s.as_str() == value)
    }

    pub fn is_backup(self) -> bool {
        matches!(
            self,
            AttachmentDownloadSource::BackupImport | AttachmentDownloadSource::BackupImportNoMedia
        )
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct AttachmentDownloadJobKey {
    pub message_id: String,
    pub attachment_type: AttachmentType,
    pub digest: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct AttachmentDownloadJob {
    pub message_id: String,
    pub attachment_type: AttachmentType,
    pub digest: String,
    pub attachment: Attachment,
    pub content_type: String,
    pub size: i64,
    pub ciphertext_size: i64,
    pub received_at: i64,
    pub sent_at: i64,
    pub active: bool,
    pub attempts: i64,
    pub retry_after: Option<i64>,
    pub last_attempt_timestamp: Option<i64>,
    pub source: AttachmentDownloadSource,
    /// Source at first insert. Later saves never change it.
    pub original_source: AttachmentDownloadSource,
}

impl AttachmentDownloadJob {
    pub fn key(&self) -> AttachmentDownloadJobKey {
        AttachmentDownloadJobKey {
            message_id: self.message_id.clone(),
            attachment_type: self.attachment_type,
            digest: self.digest.clone(),
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct NextDownloadJobsQuery {
    /// Defaults to [`DEFAULT_DOWNLOAD_JOB_LIMIT`].
    pub limit: Option<usize>,
    /// Messages on screen. Their jobs come first and ignore `retryAfter`.
    pub prioritized_message_ids: Vec<String>,
    /// Empty means every source.
    pub sources: Vec<AttachmentDownloadSource>,
    /// Overrides `timestamp - priority window` for prioritized jobs.
    pub max_last_attempt_for_prioritized: Option<i64>,
}

pub const DEFAULT_DOWNLOAD_JOB_LIMIT: usize = 3;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AttachmentDownloadResult {
    Succeeded,
    FailedRetryable,
    FailedFatal,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AttachmentDownloadJobState {
    Completed,
    Retrying { attempts: i64, retry_after: i64 },
    Failed,
    Missing,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BackupDownloadProgress {
    pub total_bytes: i64,
    pub completed_bytes: i64,
}

const DOWNLOAD_JOB_COLUMNS: &str = "messageId, attachmentType, digest, attachmentJson, \
     contentType, size, ciphertextSize, receivedAt, sentAt, active, attempts, retryAfter, \
     lastAttemptTimestamp, source, originalSource";

/// A row as stored, before its JSON and enum columns are checked.
#[derive(Clone, Debug)]
struct StoredDownloadJob {
    message_id: String,
    attachment_type: String,
    digest: String,
    attachment_json: String,
    content_type: String,
    size: i64,
    ciphertext_size: i64,
    received_at: i64,
    sent_at: i64,
    active: i64,
    attempts: i64,
    retry_after: Option<i64>,
    last_attempt_timestamp: Option<i64>,
    source: String,
    original_source: String,
}

impl StoredDownloadJob {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            message_id: row.get(0)?,
            attachment_type: row.get(1)?,
            digest: row.get(2)?,
            attachment_json: row.get(3)?,
            content_type: row.get(4)?,
            size: row.get(5)?,
            ciphertext_size: row.get(6)?,
            received_at: row.get(7)?,
            sent_at: row.get(8)?,
            active: row.get(9)?,
            attempts: row.get(10)?,
            retry_after: row.get(11)?,
            last_attempt_timestamp: row.get(12)?,
            source: row.get(13)?,
            original_source: row.get(14)?,
        })
    }

    fn raw_key(&self) -> (String, String, String) {
        (
            self.message_id.clone(),
            self.attachment_type.clone(),
            self.digest.clone(),
        )
    }

    fn parse(&self) -> Result<AttachmentDownloadJob> {
        let attachment: Attachment = serde_json::from_str(&self.attachment_json)?;
        let attachment_type = AttachmentType::parse(&self.attachment_type)
            .ok_or_else(|| anyhow!("unknown attachment type {:?}", self.attachment_type))?;
        let source = |value: &str| {
            AttachmentDownloadSource::parse(value)
                .ok_or_else(|| anyhow!("unknown download source {value:?}"))
        };
        Ok(AttachmentDownloadJob {
            message_id: self.message_id.clone(),
            attachment_type,
            digest: self.digest.clone(),
            attachment,
            content_type: self.content_type.clone(),
            size: self.size,
            ciphertext_size: self.ciphertext_size,
            received_at: self.received_at,
            sent_at: self.sent_at,
            active: self.active != 0,
            attempts: self.attempts,
            retry_after: self.retry_after,
            last_attempt_timestamp: self.last_attempt_timestamp,
            source: source(&self.source)?,
            original_source: source(&self.original_source)?,
        })
    }
}

/// Inserts or updates `job`. Returns `false` without writing when its
/// message no longer exists.
pub fn save_attachment_download_job(conn: &Connection, job: &AttachmentDownloadJob) -> Result<bool> {
    in_transaction(conn, |conn| {
        let message_exists: bool = conn.query_row(
            "SELECT EXISTS (SELECT 1 FROM messages WHERE id = ?1)",
            params![job.message_id],
            |row| row.get(0),
        )?;
        if !message_exists {
            tracing::warn!(message_id = %job.message_id, "download job for a missing message");
            return Ok(false);
        }

        let attachment_json = serde_json::to_string(&job.attachment)?;
        conn.prepare_cached(
            r#"
INSERT INTO attachment_downloads (
  messageId, attachmentType, digest, attachmentJson, contentType, size,
  ciphertextSize, receivedAt, sentAt, active, attempts, retryAfter,
  lastAttemptTimestamp, source, originalSource
) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
ON CONFLICT (messageId, attachmentType, digest) DO UPDATE SET
  attachmentJson = excluded.attachmentJson,
  contentType = excluded.contentType,
  size = excluded.size,
  ciphertextSize = excluded.ciphertextSize,
  receivedAt = excluded.receivedAt,
  sentAt = excluded.sentAt,
  active = excluded.active,
  attempts = excluded.attempts,
  retryAfter = excluded.retryAfter,
  lastAttemptTimestamp = excluded.lastAttemptTimestamp,
  source = excluded.source
"#,
        )?
        .execute(params![
            job.message_id,
            job.attachment_type.as_str(),
            job.digest,
            attachment_json,
            job.content_type,
            job.size,
            job.ciphertext_size,
            job.received_at,
            job.sent_at,
            job.active,
            job.attempts,
            job.retry_after,
            job.last_attempt_timestamp,
            job.source.as_str(),
            job.original_source.as_str(),
        ])?;
        Ok(true)
    })
}

pub fn save_attachment_download_jobs(
    conn: &Connection,
    jobs: &[AttachmentDownloadJob],
) -> Result<usize> {
    in_transaction(conn, |conn| {
        let mut saved = 0;
        for job in jobs {
            if save_attachment_download_job(conn, job)? {
                saved += 1;
            }
        }
        Ok(saved)
    })
}

pub fn get_attachment_download_job(
    conn: &Connection,
    key: &AttachmentDownloadJobKey,
) -> Result<Option<AttachmentDownloadJob>> {
    let stored = crate::sql!(
        "SELECT ",
        download_job_columns(),
        " FROM attachment_downloads WHERE messageId = ",
        bind(key.message_id.as_str()),
        " AND attachmentType = ",
        bind(key.attachment_type.as_str()),
        " AND digest = ",
        bind(key.digest.as_str())
    )
    .query_optional(conn, StoredDownloadJob::from_row)?;
    stored.map(|s| s.parse()).transpose()
}

fn download_job_columns() -> crate::sql::SqlFragment {
    crate::sql_fragment!(DOWNLOAD_JOB_COLUMNS)
}

fn source_predicate(sources: &[AttachmentDownloadSource]) -> crate::sql::SqlFragment {
    if sources.is_empty() {
        return crate::sql_fragment!("1");
    }
    crate::sql_fragment!(
        "source IN (",
        sql_join(sources.iter().map(|s| s.as_str())),
        ")"
    )
}

fn select_next_download_jobs(
    conn: &Connection,
    query: &NextDownloadJobsQuery,
    timestamp: i64,
    priority_retry_window_ms: i64,
) -> Result<Vec<StoredDownloadJob>> {
    let limit = query.limit.unwrap_or(DEFAULT_DOWNLOAD_JOB_LIMIT);
    if limit == 0 {
        return Ok(Vec::new());
    }

    let mut selected: Vec<StoredDownloadJob> = Vec::new();
    if !query.prioritized_message_ids.is_empty() {
        let max_last_attempt = query
            .max_last_attempt_for_prioritized
            .unwrap_or(timestamp - priority_retry_window_ms);
        // Each batch leaves room for the other bound values.
        let batch_size = MAX_VARIABLE_COUNT.saturating_sub(2 + query.sources.len());
        selected = batch_multi_var_query(&query.prioritized_message_ids, batch_size, |ids| {
            crate::sql!(
                "SELECT ",
                download_job_columns(),
                " FROM attachment_downloads
                  INDEXED BY attachment_downloads_active_messageId
                  WHERE active = 0
                    AND (lastAttemptTimestamp IS NULL OR lastAttemptTimestamp <= ",
                bind(max_last_attempt),
                ") AND messageId IN (",
                sql_join(ids),
                ") AND ",
                source_predicate(&query.sources),
                " ORDER BY receivedAt ASC LIMIT ",
                bind(limit)
            )
            .query_map(conn, StoredDownloadJob::from_row)
        })?;
        selected.sort_by_key(|job| job.received_at);
        selected.truncate(limit);
    }

    let remaining = limit.saturating_sub(selected.len());
    if remaining == 0 {
        return Ok(selected);
    }

    let seen: HashSet<(String, String, String)> =
        selected.iter().map(StoredDownloadJob::raw_key).collect();
    let standard = crate::sql!(
        "SELECT ",
        download_job_columns(),
        " FROM attachment_downloads
          WHERE active = 0
            AND (retryAfter IS NULL OR retryAfter <= ",
        bind(timestamp),
        ") AND ",
        source_predicate(&query.sources),
        " ORDER BY receivedAt DESC LIMIT ",
        bind(remaining + selected.len())
    )
    .query_map(conn, StoredDownloadJob::from_row)?;

    selected.extend(
        standard
            .into_iter()
            .filter(|job| !seen.contains(&job.raw_key()))
            .take(remaining),
    );
    Ok(selected)
}

/// Prioritized jobs (oldest first) followed by the newest eligible jobs, up
/// to `query.limit` in total. Rows that no longer parse are deleted and the
/// selection is retried.
pub fn get_next_attachment_download_jobs(
    conn: &Connection,
    query: &NextDownloadJobsQuery,
    timestamp: i64,
    priority_retry_window_ms: i64,
) -> Result<Vec<AttachmentDownloadJob>> {
    loop {
        let stored = select_next_download_jobs(conn, query, timestamp, priority_retry_window_ms)?;
        let mut jobs = Vec::with_capacity(stored.len());
        let mut malformed = false;
        for row in &stored {
            match row.parse() {
                Ok(job) => jobs.push(job),
                Err(e) => {
                    tracing::error!(
                        message_id = %row.message_id,
                        attachment_type = %row.attachment_type,
                        error = %e,
                        "removing malformed download job"
                    );
                    conn.execute(
                        "DELETE FROM attachment_downloads
                         WHERE messageId = ?1 AND attachmentType = ?2 AND digest = ?3",
                        params![row.message_id, row.attachment_type, row.digest],
                    )?;
                    malformed = true;
                }
            }
        }
        if !malformed {
            return Ok(jobs);
        }
    }
}

pub fn mark_attachment_download_job_active(
    conn: &Connection,
    key: &AttachmentDownloadJobKey,
    timestamp: i64,
) -> Result<bool> {
    let updated = conn.execute(
        "UPDATE attachment_downloads SET active = 1, lastAttemptTimestamp = ?4
         WHERE messageId = ?1 AND attachmentType = ?2 AND digest = ?3",
        params![key.message_id, key.attachment_type.as_str(), key.digest, timestamp],
    )?;
    Ok(updated > 0)
}

/// Records the outcome of a download attempt. A retryable failure that uses
/// up the last allowed attempt is treated as fatal.
pub fn finish_attachment_download_job(
    conn: &Connection,
    key: &AttachmentDownloadJobKey,
    result: AttachmentDownloadResult,
    timestamp: i64,
    config: &StoreConfig,
) -> Result<AttachmentDownloadJobState> {
    in_transaction(conn, |conn| {
        let attempts: Option<i64> = conn
            .query_row(
                "SELECT attempts FROM attachment_downloads
                 WHERE messageId = ?1 AND attachmentType = ?2 AND digest = ?3",
                params![key.message_id, key.attachment_type.as_str(), key.digest],
                |row| row.get(0),
            )
            .optional()?;
        let Some(attempts) = attempts else {
            return Ok(AttachmentDownloadJobState::Missing);
        };

        let attempts = attempts + 1;
        let state = match result {
            AttachmentDownloadResult::Succeeded => AttachmentDownloadJobState::Completed,
            AttachmentDownloadResult::FailedFatal => AttachmentDownloadJobState::Failed,
            AttachmentDownloadResult::FailedRetryable
                if attempts >= config.max_download_attempts =>
            {
                AttachmentDownloadJobState::Failed
            }
            AttachmentDownloadResult::FailedRetryable => AttachmentDownloadJobState::Retrying {
                attempts,
                retry_after: timestamp + config.download_backoff_for(attempts),
            },
        };

        match state {
            AttachmentDownloadJobState::Retrying {
                attempts,
                retry_after,
            } => {
                conn.execute(
                    "UPDATE attachment_downloads
                     SET active = 0, attempts = ?4, retryAfter = ?5, lastAttemptTimestamp = ?6
                     WHERE messageId = ?1 AND attachmentType = ?2 AND digest = ?3",
                    params![
                        key.message_id,
                        key.attachment_type.as_str(),
                        key.digest,
                        attempts,
                        retry_after,
                        timestamp
                    ],
                )?;
            }
            _ => {
                remove_attachment_download_job(conn, key)?;
            }
        }
        tracing::debug!(message_id = %key.message_id, ?state, "download job finished");
        Ok(state)
    })
}

pub fn remove_attachment_download_job(
    conn: &Connection,
    key: &AttachmentDownloadJobKey,
) -> Result<usize> {
    Ok(conn.execute(
        "DELETE FROM attachment_downloads
         WHERE messageId = ?1 AND attachmentType = ?2 AND digest = ?3",
        params![key.message_id, key.attachment_type.as_str(), key.digest],
    )?)
}

pub fn remove_attachment_download_jobs_for_message(
    conn: &Connection,
    message_id: &str,
) -> Result<usize> {
    Ok(conn.execute(
        "DELETE FROM attachment_downloads WHERE messageId = ?1",
        params![message_id],
    )?)
}

pub fn remove_all_backup_attachment_download_jobs(conn: &Connection) -> Result<usize> {
    Ok(conn.execute(
        "DELETE FROM attachment_downloads
         WHERE source = 'backup_import' OR source = 'backup_import_no_media'",
        [],
    )?)
}

/// Clears `active` on every job. Run at startup, when no download can
/// still be in flight.
pub fn reset_attachment_download_active(conn: &Connection) -> Result<usize> {
    Ok(conn.execute(
        "UPDATE attachment_downloads SET active = 0 WHERE active != 0",
        [],
    )?)
}

pub fn reset_backup_attachment_download_jobs_retry_after(conn: &Connection) -> Result<usize> {
    Ok(conn.execute(
        "UPDATE attachment_downloads SET retryAfter = NULL
         WHERE originalSource = 'backup_import'",
        [],
    )?)
}

pub fn reset_backup_attachment_download_stats(conn: &Connection) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO attachment_downloads_backup_stats
           (id, totalBytes, completedBytes)
         VALUES (0, 0, 0)",
        [],
    )?;
    Ok(())
}

pub fn get_backup_attachment_download_progress(conn: &Connection) -> Result<BackupDownloadProgress> {
    let progress = conn
        .query_row(
            "SELECT totalBytes, completedBytes FROM attachment_downloads_backup_stats WHERE id = 0",
            [],
            |row| {
                Ok(BackupDownloadProgress {
                    total_bytes: row.get(0)?,
                    completed_bytes: row.get(1)?,
                })
            },
        )
        .optional()?;
    Ok(progress.unwrap_or_default())
}
